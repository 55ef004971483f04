//! Signal handling for graceful server shutdown.
//!
//! The first SIGINT/SIGTERM (Ctrl+C on Windows) starts the phased shutdown
//! in [`crate::app`]; the application then arms a second, silent handler
//! that exits immediately if another signal arrives.

use interest_engine::ShutdownState;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal and returns a shutdown state that has
/// already been initiated.
pub async fn setup_signal_handlers() -> Result<ShutdownState, std::io::Error> {
    let shutdown_state = setup_signal_handlers_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(shutdown_state)
}

/// Same as [`setup_signal_handlers`] without logging.
pub async fn setup_signal_handlers_silent() -> Result<ShutdownState, std::io::Error> {
    wait_for_signal().await?;
    let shutdown_state = ShutdownState::new();
    shutdown_state.initiate_shutdown();
    Ok(shutdown_state)
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<(), std::io::Error> {
    use signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => (),
        _ = sigterm.recv() => ()
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<(), std::io::Error> {
    signal::ctrl_c().await
}
