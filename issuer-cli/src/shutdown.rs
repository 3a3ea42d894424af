//! Ctrl+C handling
//!
//! The first Ctrl+C sets the shared flag: the GitHub client finishes the call
//! in flight and refuses to start another. A second Ctrl+C exits at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Spawn the signal handler and return the flag it sets
pub fn install() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let requested = flag.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            return;
        }
        tracing::warn!("Shutdown requested, finishing current request. Press Ctrl+C again to force quit");
        requested.store(true, Ordering::Release);

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Force quit!");
            std::process::exit(130);
        }
    });

    flag
}
