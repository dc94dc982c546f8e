//! Poll Cycle
//!
//! Fixed-interval subsystem driving the engine: fetch the position feed,
//! classify violations, issue pilot lookups for new violators, then age
//! out stale state. Lookups run as detached tasks so a slow registry
//! never stalls position polling; their completions re-enter the engine
//! through [`SharedEngine`] whenever they land.
//!
//! Failure policy is retry-via-next-cycle throughout: a failed fetch
//! degrades the cycle to eviction-only, a failed lookup leaves the record
//! unresolved for the next cycle's observe to re-enqueue.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_graceful_shutdown::SubsystemHandle;

use skywatch_core::LookupCompletion;

use crate::feed::DroneFeed;
use crate::pilots::PilotResolver;
use crate::shared::SharedEngine;
use crate::ServerError;

pub struct PollCycle {
    engine: SharedEngine,
    feed: Arc<dyn DroneFeed + Send + Sync>,
    resolver: Arc<dyn PilotResolver + Send + Sync>,
    interval: Duration,
}

impl PollCycle {
    pub fn new(
        engine: SharedEngine,
        feed: Arc<dyn DroneFeed + Send + Sync>,
        resolver: Arc<dyn PilotResolver + Send + Sync>,
        interval: Duration,
    ) -> Self {
        PollCycle {
            engine,
            feed,
            resolver,
            interval,
        }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        log::info!("poll: every {}ms", self.interval.as_millis());

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    log::debug!("poll: shutdown");
                    return Ok(());
                },

                _ = ticker.tick() => {
                    self.run_cycle().await;
                },
            }
        }
    }

    /// One cycle: fetch, classify, spawn lookups, evict. Never fails;
    /// every error is logged and deferred to the next tick.
    pub async fn run_cycle(&self) {
        match self.feed.fetch().await {
            Ok(snapshots) => {
                let needs_lookup = self.engine.observe_batch(&snapshots);
                log::debug!(
                    "poll: {} entries, {} tracked, {} new lookups",
                    snapshots.len(),
                    self.engine.tracked(),
                    needs_lookup.len()
                );
                for serial in needs_lookup {
                    self.spawn_lookup(serial);
                }
            }
            Err(e) => {
                // Degrade to eviction-only; stale data still ages out
                log::warn!("poll: feed fetch failed: {}", e);
            }
        }

        for serial in self.engine.evict() {
            log::info!("{}: no longer tracked", serial);
        }
    }

    fn spawn_lookup(&self, serial: String) {
        let engine = self.engine.clone();
        let resolver = Arc::clone(&self.resolver);

        tokio::spawn(async move {
            let pilot = match resolver.resolve(&serial).await {
                Ok(pilot) => {
                    log::info!("{}: pilot {}", serial, pilot.full_name());
                    Some(pilot)
                }
                Err(e) => {
                    log::warn!("{}: pilot lookup failed: {}", serial, e);
                    None
                }
            };

            match engine.complete_lookup(&serial, pilot) {
                LookupCompletion::Discarded => {
                    log::debug!("{}: lookup result for evicted record dropped", serial)
                }
                LookupCompletion::Resolved | LookupCompletion::Failed => {}
            }
        });
    }
}
