// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Refresh Store Sweeper
//!
//! Background task that periodically drops expired refresh-token entries.
//! Expired entries are already rejected on `verify`; the sweep only bounds
//! memory and disk use for users who never come back.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::store::TokenStore;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct StoreSweeper {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl StoreSweeper {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            backend = self.store.backend(),
            "Refresh store sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Refresh store sweeper shutting down");
                    return;
                }
            }

            self.sweep_once().await;
        }
    }

    /// Execute one sweep. Returns the number of entries removed.
    pub async fn sweep_once(&self) -> usize {
        match self.store.purge_expired(self.clock.unix_now()).await {
            Ok(0) => {
                debug!("Sweeper: nothing to purge");
                0
            }
            Ok(removed) => {
                info!(removed, "Sweeper: purged expired refresh tokens");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Sweeper: purge failed");
                0
            }
        }
    }
}
