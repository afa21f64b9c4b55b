//! Debounced, single-flight refresh.
//!
//! The controller owns a [`TravelEngine`] and a [`TravelDataSource`]. A
//! refresh fetches a complete snapshot and swaps it into the engine:
//! - at most one fetch is in flight; a request arriving meanwhile is dropped
//! - change notifications are debounced, each one resetting the timer, so a
//!   burst inside the window causes a single refetch
//! - a failed fetch keeps the previous snapshot
//! - after [`RefreshController::shutdown`] any in-flight result is discarded
//!
//! The derivations themselves stay synchronous and know nothing about any
//! of this.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::error::TravelStatsError;
use crate::source::{fetch_snapshot, ChangeNotice, TravelDataSource};
use crate::{CountrySummary, GroupedTripStats, Reconciliation, TravelEngine, TravelStats};

/// Configuration for the refresh controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Quiet period after the last change notice before refetching.
    /// Default: 300ms
    pub debounce: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
        }
    }
}

impl RefreshConfig {
    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

/// What happened to one refresh request.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new snapshot was applied
    Applied { snapshot_version: u64 },
    /// Another refresh was already in flight
    Skipped,
    /// The fetch failed; the previous snapshot is still in use
    Failed(TravelStatsError),
    /// The controller shut down while fetching; the result was discarded
    Cancelled,
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }
}

/// Releases the single-flight flag when dropped, including when the
/// refresh future itself is dropped mid-fetch.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    source: Arc<dyn TravelDataSource>,
    engine: Mutex<TravelEngine>,
    config: RefreshConfig,
    in_flight: AtomicBool,
    loading: AtomicBool,
    /// Bumped on shutdown; a fetch whose generation is stale is discarded
    generation: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Inner {
    fn lock_engine(&self) -> MutexGuard<'_, TravelEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch-and-recompute orchestration around a [`TravelEngine`].
///
/// Cheap to clone; clones share the same engine and flags.
#[derive(Clone)]
pub struct RefreshController {
    inner: Arc<Inner>,
}

impl RefreshController {
    /// Create a controller with default configuration and an empty engine.
    pub fn new(source: Arc<dyn TravelDataSource>) -> Self {
        Self::with_config(source, TravelEngine::new(), RefreshConfig::default())
    }

    /// Create a controller around an existing engine.
    pub fn with_config(
        source: Arc<dyn TravelDataSource>,
        engine: TravelEngine,
        config: RefreshConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                source,
                engine: Mutex::new(engine),
                config,
                in_flight: AtomicBool::new(false),
                loading: AtomicBool::new(true),
                generation: AtomicU64::new(0),
                shutdown,
            }),
        }
    }

    /// True until the first successful load. Later refreshes never set it
    /// again.
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::Acquire)
    }

    /// True while a fetch is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// True after [`shutdown`](Self::shutdown).
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Run `f` against the engine.
    pub fn with_engine<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut TravelEngine) -> R,
    {
        let mut engine = self.inner.lock_engine();
        f(&mut engine)
    }

    /// Fetch a fresh snapshot and recompute.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without fetching when a refresh
    /// is already in flight.
    pub async fn refetch(&self) -> RefreshOutcome {
        let inner = &self.inner;
        if self.is_shut_down() {
            return RefreshOutcome::Cancelled;
        }

        let Some(_guard) = InFlightGuard::acquire(&inner.in_flight) else {
            debug!("[Refresh] Refresh already in flight, dropping request");
            return RefreshOutcome::Skipped;
        };

        let generation = inner.generation.load(Ordering::Acquire);
        let result = fetch_snapshot(inner.source.as_ref()).await;

        if inner.generation.load(Ordering::Acquire) != generation {
            info!("[Refresh] Controller shut down during fetch, discarding result");
            return RefreshOutcome::Cancelled;
        }

        match result {
            Ok(snapshot) => {
                let snapshot_version = {
                    let mut engine = inner.lock_engine();
                    engine.replace_snapshot(snapshot);
                    engine.snapshot_version()
                };
                if inner.loading.swap(false, Ordering::AcqRel) {
                    info!("[Refresh] Initial load complete");
                }
                RefreshOutcome::Applied { snapshot_version }
            }
            Err(e) => {
                warn!("[Refresh] Fetch failed, keeping previous snapshot: {}", e);
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Spawn the debounce loop that turns change notices into refetches.
    ///
    /// Every notice pushes the deadline out by the debounce window; when the
    /// window passes quietly, one refetch runs. The task ends when the
    /// controller shuts down, or when the notice channel closes and any
    /// pending refetch has run.
    pub fn spawn_listener(&self, mut notices: mpsc::Receiver<ChangeNotice>) -> JoinHandle<()> {
        let controller = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let window = self.inner.config.debounce;

        tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            let mut pending = 0u32;
            let mut open = true;

            while !*shutdown.borrow() {
                let timer = async move {
                    match deadline {
                        Some(at) => time::sleep_until(at).await,
                        None => futures::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    notice = notices.recv(), if open => match notice {
                        Some(notice) => {
                            pending += 1;
                            debug!("[Refresh] Change on {:?}, rescheduling", notice.table);
                            deadline = Some(Instant::now() + window);
                        }
                        None => {
                            open = false;
                            if deadline.is_none() {
                                break;
                            }
                            debug!("[Refresh] Notice channel closed, flushing pending refresh");
                        }
                    },
                    _ = timer => {
                        deadline = None;
                        debug!("[Refresh] Debounce elapsed after {} notices", pending);
                        pending = 0;
                        let outcome = controller.refetch().await;
                        debug!("[Refresh] Notification refresh: {:?}", outcome);
                        if !open {
                            break;
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }

            debug!("[Refresh] Listener stopped");
        })
    }

    /// Stop accepting results. An in-flight fetch completes but is not
    /// applied, and the listener task exits.
    pub fn shutdown(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.shutdown.send_replace(true);
        info!("[Refresh] Shut down");
    }

    // ========================================================================
    // Engine Pass-throughs
    // ========================================================================

    pub fn get_country_summary(&self, country_id: &str) -> CountrySummary {
        self.with_engine(|e| e.get_country_summary(country_id))
    }

    pub fn get_all_summaries(&self) -> BTreeMap<String, CountrySummary> {
        self.with_engine(|e| e.get_all_summaries().clone())
    }

    pub fn get_grouped_trip_stats(&self) -> GroupedTripStats {
        self.with_engine(|e| e.get_grouped_trip_stats())
    }

    pub fn visited_by(&self, country_id: &str) -> BTreeSet<String> {
        self.with_engine(|e| e.visited_by(country_id))
    }

    pub fn visited_countries(&self, member_id: &str) -> BTreeSet<String> {
        self.with_engine(|e| e.visited_countries(member_id))
    }

    pub fn reconciliation(&self) -> Reconciliation {
        self.with_engine(|e| e.reconciliation().clone())
    }

    pub fn travel_stats(&self, today: NaiveDate) -> TravelStats {
        self.with_engine(|e| e.travel_stats(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard() {
        let flag = AtomicBool::new(false);
        {
            let guard = InFlightGuard::acquire(&flag);
            assert!(guard.is_some());
            assert!(InFlightGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_default_config() {
        assert_eq!(RefreshConfig::default().debounce, Duration::from_millis(300));
        let config = RefreshConfig::default().with_debounce(Duration::from_secs(1));
        assert_eq!(config.debounce, Duration::from_secs(1));
    }
}
