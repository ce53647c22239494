use crate::application_impl::RefreshTokenEngine;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically deletes expired refresh-token records.
pub struct RefreshTokenSweeper {
    refresh_tokens: Arc<RefreshTokenEngine>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl RefreshTokenSweeper {
    pub fn new(
        refresh_tokens: Arc<RefreshTokenEngine>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            refresh_tokens,
            interval,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> u64 {
        match self.refresh_tokens.purge_expired(Utc::now()).await {
            Ok(purged) => purged,
            Err(e) => {
                error!("refresh token purge failed: {e}");
                0
            }
        }
    }

    /// Sweeps once right away, then every `interval` until cancelled.
    pub async fn run(&self) {
        loop {
            self.tick_once().await;
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("refresh token sweeper shutting down...");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
