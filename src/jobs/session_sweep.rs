//! Periodic physical deletion of expired sessions.
//!
//! Expired rows are never a correctness issue (verification rejects them);
//! the sweep only keeps the table from growing without bound. Runs hourly by
//! default and exits on the shutdown token.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::auth::CredentialStore;

pub async fn run(
    store: Arc<CredentialStore>,
    interval: Duration,
    grace: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so startup stays quiet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Session sweeper shutting down");
                return;
            }
            _ = ticker.tick() => {
                match store.sweep_sessions(grace).await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(removed, "Swept expired sessions");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Session sweep failed");
                    }
                }
            }
        }
    }
}
