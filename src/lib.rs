pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod ledger;
pub mod metadata;
pub mod params;
pub mod pool;
pub mod queue;
pub mod service;
pub mod shutdown;
pub mod store;
