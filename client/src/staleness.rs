//! Fallback refresh for a push stream that is connected but silent.
//!
//! A stream can stay open while events stop arriving, for instance behind a
//! proxy that buffers. While connected, the store is re-fetched whenever it
//! has gone [`STALE_AFTER`] without an update. A failed refresh is logged and
//! counts as an update, so an unreachable server is retried every
//! [`STALE_AFTER`] rather than on every tick.

use crate::store::SupportStore;
use crate::transport::ConnectionState;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const STALE_AFTER: Duration = Duration::from_secs(10);
pub const CHECK_INTERVAL: Duration = Duration::from_secs(1);

pub fn is_stale(connected: bool, last_update: Instant, now: Instant) -> bool {
    connected && now.saturating_duration_since(last_update) >= STALE_AFTER
}

/// Runs until the transport's state channel closes.
pub fn spawn_staleness_watch(
    store: Arc<SupportStore>,
    mut state_rx: watch::Receiver<ConnectionState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(CHECK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        debug!("Connection state closed, stopping staleness watch");
                        return;
                    }
                    continue;
                }
            }

            let connected = state_rx.borrow().is_connected();
            if !is_stale(connected, store.last_update(), Instant::now()) {
                continue;
            }

            debug!("No updates for {}s, refreshing", STALE_AFTER.as_secs());
            if let Err(e) = store.refresh().await {
                warn!("Background refresh failed: {e}");
                store.touch();
            }
        }
    })
}
