//! Signal handling for the relayer process.
//!
//! The first SIGTERM or SIGINT cancels the returned token and the service
//! drains in this order:
//!
//! 1. the HTTP server stops accepting and finishes in-flight requests
//! 2. the event dispatcher drops its ledger subscription
//! 3. the submission queue closes, failing jobs still waiting for a credential
//! 4. running ledger writes finish and their credentials check back in
//!
//! A second signal exits immediately. Without an operation timeout a stuck
//! write would otherwise hold the process open indefinitely.

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Exit status for a forced stop, as a shell reports SIGINT.
const FORCED_EXIT_CODE: i32 = 130;

pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let drain = token.clone();
    tokio::spawn(async move {
        let name = next_signal(&mut sigterm, &mut sigint).await;
        tracing::info!(signal = name, "Shutdown requested, draining relayer");
        drain.cancel();

        let name = next_signal(&mut sigterm, &mut sigint).await;
        tracing::warn!(signal = name, "Second signal received, exiting without draining");
        std::process::exit(FORCED_EXIT_CODE);
    });

    Ok(token)
}

async fn next_signal(sigterm: &mut Signal, sigint: &mut Signal) -> &'static str {
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
