use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use auction_relayer::config::{credentials_from_vars, load_env_file, ServiceConfig};
use auction_relayer::ledger::{
    Address, ContractAddresses, SimulatedLedger, DEFAULT_MODIFIER_NFT_ADDRESS,
    DEFAULT_REVERSE_AUCTION_ADDRESS, DEFAULT_TICKET_NFT_ADDRESS,
};
use auction_relayer::queue::QueueConfig;
use auction_relayer::service::Service;
use auction_relayer::shutdown::install_shutdown_handler;
use auction_relayer::store::{ContentStore, IpfsConfig, IpfsStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(name = "auction-relayer")]
#[command(version)]
#[command(about = "Relays reverse-auction ledger writes through a pool of signing credentials")]
struct Args {
    /// Port for the HTTP API
    #[arg(long, default_value = "3002")]
    port: u16,

    // === Credential pool ===
    /// Settle delay before a released credential is reused (milliseconds)
    #[arg(long, default_value = "1000")]
    cooldown_ms: u64,

    /// Maximum concurrent jobs (defaults to the number of credentials)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Abort ledger operations that take longer than this (milliseconds).
    /// Unset means wait indefinitely.
    #[arg(long)]
    operation_timeout_ms: Option<u64>,

    /// Number of job records kept for /api/jobs
    #[arg(long, default_value = "1000")]
    history_capacity: usize,

    // === Metadata store ===
    /// Where NFT metadata is published. Ledger writes are simulated, so
    /// publishing to IPFS is opt-in.
    #[arg(long, value_enum, default_value = "memory")]
    store: StoreKind,

    /// IPFS HTTP API base URL
    #[arg(long, default_value = "https://ipfs.infura.io:5001")]
    ipfs_url: String,

    /// IPFS project id (basic-auth user)
    #[arg(long, env = "INFURA_KEY")]
    ipfs_project_id: Option<String>,

    /// IPFS project secret (basic-auth password)
    #[arg(long, env = "INFURA_SECRET", hide_env_values = true)]
    ipfs_project_secret: Option<String>,

    /// Base URL for NFT images
    #[arg(long, default_value = auction_relayer::metadata::DEFAULT_ASSET_BASE_URL)]
    asset_base_url: String,

    // === Ledger ===
    /// Reverse auction contract address
    #[arg(long, default_value = DEFAULT_REVERSE_AUCTION_ADDRESS)]
    reverse_auction_address: Address,

    /// Ticket NFT contract address
    #[arg(long, default_value = DEFAULT_TICKET_NFT_ADDRESS)]
    ticket_nft_address: Address,

    /// Modifier NFT contract address
    #[arg(long, default_value = DEFAULT_MODIFIER_NFT_ADDRESS)]
    modifier_nft_address: Address,

    /// Block time of the in-process ledger (milliseconds)
    #[arg(long, default_value = "500")]
    confirm_latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Ipfs,
    Memory,
}

fn build_config(args: &Args) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    Ok(ServiceConfig {
        listen_addr,
        credentials: credentials_from_vars(std::env::vars()),
        cooldown: Duration::from_millis(args.cooldown_ms),
        queue: QueueConfig {
            max_concurrency: args.max_concurrency,
            operation_timeout: args.operation_timeout_ms.map(Duration::from_millis),
            history_capacity: args.history_capacity,
        },
        ipfs: IpfsConfig {
            api_url: args.ipfs_url.clone(),
            project_id: args.ipfs_project_id.clone(),
            project_secret: args.ipfs_project_secret.clone(),
        },
        asset_base_url: args.asset_base_url.clone(),
        contracts: ContractAddresses {
            reverse_auction: args.reverse_auction_address.clone(),
            ticket_nft: args.ticket_nft_address.clone(),
            modifier_nft: args.modifier_nft_address.clone(),
        },
        confirm_latency: Duration::from_millis(args.confirm_latency_ms),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before parsing, so env fallbacks see values from the file.
    let env_file_loaded = load_env_file(".env");
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = build_config(&args)?;
    tracing::info!(
        addr = %config.listen_addr,
        credentials = config.credentials.len(),
        cooldown_ms = args.cooldown_ms,
        env_file = env_file_loaded,
        "Starting auction relayer"
    );

    let store: Arc<dyn ContentStore> = match args.store {
        StoreKind::Ipfs => {
            if config.ipfs.project_id.is_none() {
                tracing::warn!("No IPFS project id configured, uploads will be unauthenticated");
            }
            Arc::new(IpfsStore::new(config.ipfs.clone()))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory metadata store, content is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    tracing::warn!(
        confirm_latency_ms = args.confirm_latency_ms,
        "Ledger writes are simulated in-process and never reach a chain"
    );
    let ledger = Arc::new(
        SimulatedLedger::new(config.confirm_latency).with_contracts(config.contracts.clone()),
    );

    let service = Service::new(config, ledger, store)?;
    let cancel = install_shutdown_handler()?;
    service.run(cancel).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_metadata_local() {
        let args = Args::parse_from(["auction-relayer"]);
        assert_eq!(args.store, StoreKind::Memory);
        assert_eq!(args.port, 3002);
        assert_eq!(args.cooldown_ms, 1000);
    }

    #[test]
    fn ipfs_store_is_opt_in() {
        let args = Args::parse_from(["auction-relayer", "--store", "ipfs"]);
        assert_eq!(args.store, StoreKind::Ipfs);
    }
}
