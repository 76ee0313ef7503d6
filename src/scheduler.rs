//! Fixed-interval driver for the ingestion cycle.
//!
//! A single periodic timer triggers `fetch → extract → normalize →
//! persist`. The five stages run sequentially inside one cycle;
//! concurrency only arises across cycles, capped by a semaphore. Ticks
//! that fire while every slot is busy are dropped, never queued. No
//! failure inside a cycle escapes it: each path logs and the driver
//! returns to idle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::time::MissedTickBehavior;

use crate::config::TrackerConfig;
use crate::domain::{extract, normalize};
use crate::persistence::Store;
use crate::upstream::TrainsClient;

/// Periodic driver owning the cycle timer, the overlap gate, and the
/// shutdown signal.
#[derive(Debug)]
pub struct Scheduler {
    client: Arc<TrainsClient>,
    store: Store,
    period: Duration,
    gate: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    /// Creates a scheduler from configuration. The store handle is
    /// cloned into each cycle; nothing is held in global state.
    #[must_use]
    pub fn new(
        client: Arc<TrainsClient>,
        store: Store,
        config: &TrackerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            store,
            period: Duration::from_secs(config.poll_interval_secs),
            gate: Arc::new(Semaphore::new(config.max_overlapping_cycles)),
            shutdown,
        }
    }

    /// Claims a cycle slot, or `None` when the overlap cap is reached.
    fn try_start(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.gate).try_acquire_owned().ok()
    }

    /// Runs cycles at the fixed interval until the shutdown flag flips.
    ///
    /// The first tick fires immediately, so one cycle runs at startup.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(period_secs = self.period.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(permit) = self.try_start() else {
                        tracing::warn!("all cycle slots busy; dropping this tick");
                        continue;
                    };
                    let client = Arc::clone(&self.client);
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        run_cycle(&client, &store).await;
                        drop(permit);
                    });
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("shutdown signal received; scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// One full ingestion cycle. Every failure path logs and returns; the
/// scheduler keeps running regardless of the outcome.
async fn run_cycle(client: &TrainsClient, store: &Store) {
    let raw = match client.fetch().await {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(%error, "failed to fetch data from the API");
            return;
        }
    };

    // extract() logs the reason when the payload carries no snapshot.
    let Some(snapshot) = extract(&raw) else {
        return;
    };

    let outcome = match normalize(&snapshot) {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::warn!(%error, "snapshot discarded");
            return;
        }
    };
    for (index, reason) in &outcome.skipped {
        tracing::warn!(index = *index, %reason, "train entry skipped");
    }

    let started = Instant::now();
    match store.persist(&outcome.records).await {
        Ok(rows) => tracing::info!(
            rows,
            skipped = outcome.skipped.len(),
            elapsed = ?started.elapsed(),
            "records saved to database"
        ),
        Err(error) => tracing::warn!(%error, "failed to persist cycle"),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config(max_overlapping_cycles: usize) -> TrackerConfig {
        TrackerConfig {
            db_path: PathBuf::from(":memory:"),
            sync_url: None,
            sync_auth_token: None,
            schema_path: PathBuf::from("schema.sql"),
            upstream_url: "http://127.0.0.1:9/getData".to_string(),
            fetch_timeout_secs: 1,
            poll_interval_secs: 10,
            max_overlapping_cycles,
            shutdown_after_secs: None,
            file_server_port: 0,
            file_server_user: "admin".to_string(),
            file_server_pass: "password".to_string(),
            archive_name: "database.zip".to_string(),
        }
    }

    async fn test_scheduler(
        max_overlapping_cycles: usize,
    ) -> (Scheduler, watch::Sender<bool>) {
        let config = test_config(max_overlapping_cycles);
        let Ok(client) = TrainsClient::new(&config) else {
            panic!("client construction failed");
        };
        let Ok(store) = Store::connect(&config).await else {
            panic!("store connection failed");
        };
        let (tx, rx) = watch::channel(false);
        (Scheduler::new(Arc::new(client), store, &config, rx), tx)
    }

    #[tokio::test]
    async fn overlap_cap_drops_excess_ticks() {
        let (scheduler, _tx) = test_scheduler(1).await;

        let first = scheduler.try_start();
        assert!(first.is_some());
        assert!(
            scheduler.try_start().is_none(),
            "a tick beyond the cap must be dropped, not queued"
        );

        drop(first);
        assert!(scheduler.try_start().is_some());
    }

    #[tokio::test]
    async fn cap_of_two_allows_one_overlap() {
        let (scheduler, _tx) = test_scheduler(2).await;

        let first = scheduler.try_start();
        let second = scheduler.try_start();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(scheduler.try_start().is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let (scheduler, tx) = test_scheduler(1).await;

        let handle = tokio::spawn(scheduler.run());
        let _ = tx.send(true);

        let finished = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(finished.is_ok(), "scheduler did not stop after shutdown");
    }
}
