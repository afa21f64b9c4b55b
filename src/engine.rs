//! # Travel Engine
//!
//! Stateful wrapper around one [`TravelSnapshot`] and everything derived
//! from it.
//!
//! ## Architecture
//!
//! The engine owns:
//! - The current snapshot of fetched rows
//! - Reconciled membership (`visited_by` / `visited_countries`)
//! - Per-country summaries
//! - Trip groups and their aggregates
//! - Merged abroad periods
//!
//! Derived state is computed lazily and cached until the snapshot or config
//! is replaced; a new snapshot always triggers full recomputation. Values
//! that depend on the current date (open abroad period, current streak) are
//! recomputed on every call from the `today` the caller passes in.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::intervals::{currently_abroad_days, longest_continuous_days};
use crate::trips::stats_from_trips;
use crate::{
    all_summaries, country_summary, group_trips, member_summaries, merge_periods, reconcile,
    streak_stats, travel_totals, AbroadPeriod, BestMultiCountryTrip, BestYear, CountrySummary,
    GroupedTripStats, MemberSummary, Reconciliation, StatsConfig, TravelSnapshot, TravelTotals,
    Trip,
};

// ============================================================================
// Result Types
// ============================================================================

/// Time-based travel statistics for one `today`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelStats {
    pub current_year_streak: u32,
    pub max_year_streak: u32,
    pub longest_continuous_days: u32,
    pub currently_abroad_days: u32,
    pub best_year: Option<BestYear>,
    pub best_multi_country_trip: Option<BestMultiCountryTrip>,
    /// Years with at least one visit, ascending
    pub distinct_years: Vec<i32>,
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub snapshot_version: u64,
    pub visit_count: u32,
    pub edge_count: u32,
    pub city_visit_count: u32,
    pub trip_count: u32,
    pub period_count: u32,
}

// ============================================================================
// Travel Engine
// ============================================================================

/// The main stateful travel engine.
pub struct TravelEngine {
    // Core state
    snapshot: TravelSnapshot,
    snapshot_version: u64,

    // Derived state
    reconciliation: Reconciliation,
    summaries: BTreeMap<String, CountrySummary>,
    trips: Vec<Trip>,
    trip_stats: GroupedTripStats,
    periods: Vec<AbroadPeriod>,

    // Dirty tracking
    reconciliation_dirty: bool,
    summaries_dirty: bool,
    trips_dirty: bool,
    periods_dirty: bool,

    // Configuration
    config: StatsConfig,
}

impl TravelEngine {
    /// Create a new engine with default configuration and an empty snapshot.
    pub fn new() -> Self {
        Self {
            snapshot: TravelSnapshot::default(),
            snapshot_version: 0,
            reconciliation: Reconciliation::default(),
            summaries: BTreeMap::new(),
            trips: Vec::new(),
            trip_stats: GroupedTripStats::default(),
            periods: Vec::new(),
            reconciliation_dirty: false,
            summaries_dirty: false,
            trips_dirty: false,
            periods_dirty: false,
            config: StatsConfig::default(),
        }
    }

    /// Create a new engine with custom configuration.
    pub fn with_config(config: StatsConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    // ========================================================================
    // Snapshot Management
    // ========================================================================

    /// Replace the snapshot. All derived state is invalidated.
    pub fn replace_snapshot(&mut self, snapshot: TravelSnapshot) {
        info!(
            "[TravelEngine] New snapshot: {} visits, {} legacy edges, {} visit edges, {} cities",
            snapshot.visits.len(),
            snapshot.legacy_edges.len(),
            snapshot.visit_edges.len(),
            snapshot.city_visits.len()
        );

        self.snapshot = snapshot;
        self.snapshot_version += 1;
        self.invalidate_all();
    }

    /// The snapshot currently in use.
    pub fn snapshot(&self) -> &TravelSnapshot {
        &self.snapshot
    }

    /// Number of snapshots applied so far.
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    /// Drop the snapshot and all derived state.
    pub fn clear(&mut self) {
        self.snapshot = TravelSnapshot::default();
        self.reconciliation = Reconciliation::default();
        self.summaries.clear();
        self.trips.clear();
        self.trip_stats = GroupedTripStats::default();
        self.periods.clear();
        self.reconciliation_dirty = false;
        self.summaries_dirty = false;
        self.trips_dirty = false;
        self.periods_dirty = false;
    }

    fn invalidate_all(&mut self) {
        self.reconciliation_dirty = true;
        self.summaries_dirty = true;
        self.trips_dirty = true;
        self.periods_dirty = true;
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    fn ensure_reconciliation(&mut self) {
        if !self.reconciliation_dirty {
            return;
        }
        self.reconciliation = reconcile(&self.snapshot);
        self.reconciliation_dirty = false;
        debug!(
            "[TravelEngine] Reconciled {} countries, {} members",
            self.reconciliation.visited_by.len(),
            self.reconciliation.visited_countries.len()
        );
    }

    /// The reconciled membership view.
    pub fn reconciliation(&mut self) -> &Reconciliation {
        self.ensure_reconciliation();
        &self.reconciliation
    }

    /// Names of members who visited a country.
    pub fn visited_by(&mut self, country_id: &str) -> BTreeSet<String> {
        self.ensure_reconciliation();
        self.reconciliation.members_for(country_id)
    }

    /// Countries a member visited.
    pub fn visited_countries(&mut self, member_id: &str) -> BTreeSet<String> {
        self.ensure_reconciliation();
        self.reconciliation.countries_for(member_id)
    }

    /// One summary per family member.
    pub fn member_summaries(&mut self) -> Vec<MemberSummary> {
        self.ensure_reconciliation();
        member_summaries(&self.snapshot, &self.reconciliation)
    }

    /// Headline totals.
    pub fn travel_totals(&mut self) -> TravelTotals {
        self.ensure_reconciliation();
        travel_totals(&self.snapshot, &self.reconciliation)
    }

    // ========================================================================
    // Summaries
    // ========================================================================

    fn ensure_summaries(&mut self) {
        if !self.summaries_dirty {
            return;
        }
        self.summaries = all_summaries(&self.snapshot);
        self.summaries_dirty = false;
    }

    /// Summary for one country; all zeros for a country with no rows.
    pub fn get_country_summary(&mut self, country_id: &str) -> CountrySummary {
        self.ensure_summaries();
        self.summaries
            .get(country_id)
            .cloned()
            .unwrap_or_else(|| country_summary(&self.snapshot, country_id))
    }

    /// Summaries for every country with visits or city visits.
    pub fn get_all_summaries(&mut self) -> &BTreeMap<String, CountrySummary> {
        self.ensure_summaries();
        &self.summaries
    }

    // ========================================================================
    // Trips
    // ========================================================================

    fn ensure_trips(&mut self) {
        if !self.trips_dirty {
            return;
        }
        self.trips = group_trips(&self.snapshot.visits);
        self.trip_stats = stats_from_trips(&self.trips);
        self.trips_dirty = false;
    }

    /// All trips, in order of each trip's first record.
    pub fn get_trips(&mut self) -> &[Trip] {
        self.ensure_trips();
        &self.trips
    }

    /// Trip count, durations, longest and average.
    pub fn get_grouped_trip_stats(&mut self) -> GroupedTripStats {
        self.ensure_trips();
        self.trip_stats.clone()
    }

    // ========================================================================
    // Time-based Statistics
    // ========================================================================

    fn ensure_periods(&mut self) {
        if !self.periods_dirty {
            return;
        }
        self.periods = merge_periods(&self.snapshot.visits, &self.config);
        self.periods_dirty = false;
    }

    /// Merged abroad periods, ascending.
    pub fn get_abroad_periods(&mut self) -> &[AbroadPeriod] {
        self.ensure_periods();
        &self.periods
    }

    /// Streak and interval statistics as of `today`.
    ///
    /// Never cached: the open abroad period and current streak change with
    /// the date even when the snapshot does not.
    pub fn travel_stats(&mut self, today: NaiveDate) -> TravelStats {
        self.ensure_periods();
        let streaks = streak_stats(&self.snapshot.visits, today, &self.config);

        TravelStats {
            current_year_streak: streaks.current_year_streak,
            max_year_streak: streaks.max_year_streak,
            longest_continuous_days: longest_continuous_days(&self.periods),
            currently_abroad_days: currently_abroad_days(&self.periods, today),
            best_year: streaks.best_year,
            best_multi_country_trip: streaks.best_multi_country_trip,
            distinct_years: streaks.distinct_years,
        }
    }

    // ========================================================================
    // JSON Output
    // ========================================================================

    /// Summaries as JSON (for host bindings).
    pub fn get_all_summaries_json(&mut self) -> String {
        serde_json::to_string(self.get_all_summaries()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Trip stats as JSON.
    pub fn get_grouped_trip_stats_json(&mut self) -> String {
        self.ensure_trips();
        serde_json::to_string(&self.trip_stats).unwrap_or_else(|_| "{}".to_string())
    }

    /// Reconciled membership as JSON.
    pub fn get_reconciliation_json(&mut self) -> String {
        serde_json::to_string(self.reconciliation()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Travel stats for `today` as JSON.
    pub fn get_travel_stats_json(&mut self, today: NaiveDate) -> String {
        serde_json::to_string(&self.travel_stats(today)).unwrap_or_else(|_| "{}".to_string())
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Update configuration. Invalidates config-dependent state.
    pub fn set_config(&mut self, config: StatsConfig) {
        self.config = config;
        self.periods_dirty = true;
    }

    /// Current configuration.
    pub fn get_config(&self) -> &StatsConfig {
        &self.config
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Get engine statistics.
    pub fn stats(&mut self) -> EngineStats {
        self.ensure_trips();
        self.ensure_periods();

        EngineStats {
            snapshot_version: self.snapshot_version,
            visit_count: self.snapshot.visits.len() as u32,
            edge_count: (self.snapshot.legacy_edges.len() + self.snapshot.visit_edges.len())
                as u32,
            city_visit_count: self.snapshot.city_visits.len() as u32,
            trip_count: self.trips.len() as u32,
            period_count: self.periods.len() as u32,
        }
    }
}

impl Default for TravelEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
