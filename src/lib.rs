//! # Travel Stats
//!
//! Travel-history reconciliation and analytics for family travel trackers.
//!
//! This library provides:
//! - Reconciliation of legacy and current "member visited country" edges
//! - Per-country summaries (days, visits, cities)
//! - Trip grouping, including multi-country trips
//! - Continuous-abroad periods via date-interval merging
//! - Year-over-year travel streaks and best-year rankings
//! - A debounced, single-flight refresh controller around all of the above
//!
//! ## Features
//!
//! - **`http`** - Enable the REST data source for PostgREST-style backends
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use travel_stats::{TravelEngine, TravelSnapshot, VisitRecord};
//!
//! let snapshot = TravelSnapshot {
//!     visits: vec![
//!         VisitRecord::new("v1", "FR")
//!             .with_dates("2023-04-10", Some("2023-04-20"))
//!             .with_days(10),
//!         VisitRecord::new("v2", "IT")
//!             .with_dates("2023-04-21", Some("2023-04-25"))
//!             .with_days(4),
//!     ],
//!     ..Default::default()
//! };
//!
//! let mut engine = TravelEngine::new();
//! engine.replace_snapshot(snapshot);
//!
//! let trips = engine.get_grouped_trip_stats();
//! assert_eq!(trips.longest_trip_days, 10);
//! assert_eq!(trips.avg_trip_duration, 7);
//!
//! let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! assert_eq!(engine.travel_stats(today).longest_continuous_days, 16);
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TravelStatsError};

// Date parsing and effective-date resolution
pub mod dates;

// Legacy/current membership edge reconciliation
pub mod reconcile;
pub use reconcile::{
    member_summaries, reconcile, MemberSummary, MembershipEdge, Reconciliation, ResolvedEdge,
};

// Per-country summaries and overall totals
pub mod summary;
pub use summary::{all_summaries, country_summary, travel_totals, CountrySummary, TravelTotals};

// Trip grouping
pub mod trips;
pub use trips::{group_trips, grouped_trip_stats, GroupedTripStats, Trip, TripKey};

// Abroad-period interval merging
pub mod intervals;
pub use intervals::{interval_stats, merge_periods, AbroadPeriod, IntervalStats};

// Year streaks and best-year rankings
pub mod streaks;
pub use streaks::{streak_stats, BestMultiCountryTrip, BestYear, StreakStats};

// Stateful engine over one snapshot
pub mod engine;
pub use engine::{EngineStats, TravelEngine, TravelStats};

// Storage collaborator interface
pub mod source;
pub use source::{fetch_snapshot, ChangeNotice, TravelDataSource, WatchedTable};

// Debounced single-flight refresh
pub mod refresh;
pub use refresh::{RefreshConfig, RefreshController, RefreshOutcome};

// REST data source
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{RestConfig, RestSource, TableNames};

// ============================================================================
// Core Types
// ============================================================================

/// A recorded visit to a country.
///
/// Every column except `id` is nullable in storage, so everything else is
/// optional here too. See [`VisitRecord::effective_date`] for how partial
/// dates are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitRecord {
    pub id: String,
    pub country_id: Option<String>,
    /// Exact start date (`YYYY-MM-DD` or RFC 3339)
    pub visit_date: Option<String>,
    /// Exact end date, inclusive
    pub end_date: Option<String>,
    /// Used only when `visit_date` is absent
    pub approximate_year: Option<i32>,
    /// 1-12, used only when `visit_date` is absent
    pub approximate_month: Option<i32>,
    /// Length of the visit in days
    pub number_of_days: Option<i64>,
    pub trip_name: Option<String>,
    /// Groups the legs of one multi-country trip
    pub trip_group_id: Option<String>,
    pub highlight: Option<String>,
    pub why_it_mattered: Option<String>,
    pub notes: Option<String>,
}

impl VisitRecord {
    /// Create a visit with only an id and a country.
    pub fn new(id: &str, country_id: &str) -> Self {
        Self {
            id: id.to_string(),
            country_id: Some(country_id.to_string()),
            ..Default::default()
        }
    }

    /// Set exact start and optional end dates.
    pub fn with_dates(mut self, visit_date: &str, end_date: Option<&str>) -> Self {
        self.visit_date = Some(visit_date.to_string());
        self.end_date = end_date.map(str::to_string);
        self
    }

    /// Set an approximate year and optional month.
    pub fn with_approximate(mut self, year: i32, month: Option<i32>) -> Self {
        self.approximate_year = Some(year);
        self.approximate_month = month;
        self
    }

    /// Set the number of days.
    pub fn with_days(mut self, days: i64) -> Self {
        self.number_of_days = Some(days);
        self
    }

    /// Set the trip name.
    pub fn with_trip_name(mut self, name: &str) -> Self {
        self.trip_name = Some(name.to_string());
        self
    }

    /// Set the trip group id.
    pub fn with_trip_group(mut self, group_id: &str) -> Self {
        self.trip_group_id = Some(group_id.to_string());
        self
    }

    /// The resolved date of this visit.
    ///
    /// `visit_date` when present and parseable, otherwise the first day of
    /// `approximate_year`/`approximate_month` (January when the month is
    /// missing or out of range), otherwise `None`.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        if let Some(date) = self.visit_date.as_deref().and_then(dates::parse_date) {
            return Some(date);
        }
        self.approximate_year
            .and_then(|year| dates::approximate_date(year, self.approximate_month))
    }

    /// The inclusive end of this visit: `end_date` if parseable, else the
    /// start. Never earlier than the start.
    pub fn effective_end(&self) -> Option<NaiveDate> {
        let start = self.effective_date()?;
        let end = self
            .end_date
            .as_deref()
            .and_then(dates::parse_date)
            .unwrap_or(start);
        Some(end.max(start))
    }

    /// Recorded duration in days; absent or negative counts as 0.
    pub fn duration_days(&self) -> u32 {
        self.number_of_days
            .map(|d| d.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0)
    }

    /// Country id, if present and non-blank.
    pub fn country(&self) -> Option<&str> {
        non_blank(self.country_id.as_deref())
    }

    /// Trip group id, if present and non-blank.
    pub fn group_id(&self) -> Option<&str> {
        non_blank(self.trip_group_id.as_deref())
    }

    /// Trip name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.trip_name.as_deref())
    }
}

/// Legacy direct edge: a member visited a country, no date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyMemberEdge {
    pub country_id: Option<String>,
    pub family_member_id: Option<String>,
    pub member_name: Option<String>,
}

/// Current edge: a member took part in a specific visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitMemberEdge {
    pub visit_id: Option<String>,
    pub family_member_id: Option<String>,
    pub member_name: Option<String>,
}

/// A city visited within a country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityVisit {
    pub id: String,
    pub country_id: Option<String>,
    pub city_name: Option<String>,
    pub visit_date: Option<String>,
}

/// A family member. Display attributes are carried but never read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub role: Option<String>,
    pub avatar: Option<String>,
    pub color: Option<String>,
}

/// A country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Country {
    pub id: String,
    pub name: String,
    pub continent: Option<String>,
    pub flag: Option<String>,
}

/// A point-in-time copy of every row the engine derives from.
///
/// Each fetch produces a complete snapshot; there are no partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelSnapshot {
    pub visits: Vec<VisitRecord>,
    pub legacy_edges: Vec<LegacyMemberEdge>,
    pub visit_edges: Vec<VisitMemberEdge>,
    pub city_visits: Vec<CityVisit>,
    pub countries: Vec<Country>,
    pub members: Vec<FamilyMember>,
}

impl TravelSnapshot {
    /// True when no rows of any kind are present.
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
            && self.legacy_edges.is_empty()
            && self.visit_edges.is_empty()
            && self.city_visits.is_empty()
            && self.countries.is_empty()
            && self.members.is_empty()
    }

    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.visits.len()
            + self.legacy_edges.len()
            + self.visit_edges.len()
            + self.city_visits.len()
            + self.countries.len()
            + self.members.len()
    }
}

/// Configuration for the derivation components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// How many years back the current-streak walk looks before giving up.
    /// Default: 20
    pub streak_lookback_years: u32,

    /// Largest gap in days between a visit start and the running period end
    /// that still merges into one abroad period. 1 means next-day visits
    /// join. Default: 1
    pub adjacency_gap_days: i64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            streak_lookback_years: 20,
            adjacency_gap_days: 1,
        }
    }
}

impl StatsConfig {
    /// Set the current-streak lookback bound.
    pub fn with_streak_lookback_years(mut self, years: u32) -> Self {
        self.streak_lookback_years = years;
        self
    }

    /// Set the merge gap for abroad periods.
    pub fn with_adjacency_gap_days(mut self, days: i64) -> Self {
        self.adjacency_gap_days = days;
        self
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
