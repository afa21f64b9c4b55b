//! Trip grouping.
//!
//! Visit records are partitioned into logical trips. Records sharing a
//! `trip_group_id` form one (possibly multi-country) trip; every other dated
//! record is a standalone trip of its own. A record with a group id is never
//! grouped by name, even when unrelated records share a `trip_name`.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::VisitRecord;

/// What makes a set of records one trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TripKey {
    /// Explicit `trip_group_id`
    Group(String),
    /// A single record without a group id, by visit id
    Standalone(String),
}

/// A logical trip built from one or more visit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub key: TripKey,
    /// First non-empty `trip_name` among the records
    pub trip_name: Option<String>,
    /// Display label: the trip name, else the start date
    pub label: String,
    /// Member visit ids, fetch order
    pub visit_ids: Vec<String>,
    /// Distinct countries, first-seen order
    pub country_ids: Vec<String>,
    /// Sum of member records' durations
    pub total_days: u32,
    /// Earliest effective date among the records
    pub start_date: NaiveDate,
}

impl Trip {
    fn from_visit(key: TripKey, visit: &VisitRecord, date: NaiveDate) -> Self {
        let mut trip = Self {
            key,
            trip_name: None,
            label: String::new(),
            visit_ids: Vec::new(),
            country_ids: Vec::new(),
            total_days: 0,
            start_date: date,
        };
        trip.push(visit, date);
        trip
    }

    fn push(&mut self, visit: &VisitRecord, date: NaiveDate) {
        self.visit_ids.push(visit.id.clone());
        self.total_days = self.total_days.saturating_add(visit.duration_days());
        self.start_date = self.start_date.min(date);
        if let Some(country) = visit.country() {
            if !self.country_ids.iter().any(|c| c == country) {
                self.country_ids.push(country.to_string());
            }
        }
        if self.trip_name.is_none() {
            self.trip_name = visit.name().map(str::to_string);
        }
        self.label = self
            .trip_name
            .clone()
            .unwrap_or_else(|| self.start_date.format("%Y-%m-%d").to_string());
    }

    /// True when this trip spans more than one country.
    pub fn is_multi_country(&self) -> bool {
        self.country_ids.len() > 1
    }
}

/// Group dated visits into trips, in order of each trip's first record.
///
/// Records without an effective date are left out entirely.
pub fn group_trips(visits: &[VisitRecord]) -> Vec<Trip> {
    let mut trips: Vec<Trip> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();

    for visit in visits {
        let Some(date) = visit.effective_date() else {
            continue;
        };

        match visit.group_id() {
            Some(group_id) => {
                if let Some(&idx) = group_index.get(group_id) {
                    trips[idx].push(visit, date);
                } else {
                    group_index.insert(group_id, trips.len());
                    trips.push(Trip::from_visit(
                        TripKey::Group(group_id.to_string()),
                        visit,
                        date,
                    ));
                }
            }
            None => trips.push(Trip::from_visit(
                TripKey::Standalone(visit.id.clone()),
                visit,
                date,
            )),
        }
    }

    trips
}

/// Trip aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedTripStats {
    /// Distinct trip groups plus standalone records
    pub total_trip_count: u32,
    /// Trips with a positive duration, in trip order
    pub trip_durations: Vec<Trip>,
    /// 0 when no trip has a duration
    pub longest_trip_days: u32,
    /// Rounded mean over `trip_durations`; 0 when empty
    pub avg_trip_duration: u32,
    /// The longest trip; on ties, the first in fetch order
    pub longest_trip: Option<TripKey>,
}

/// Compute trip aggregates over all dated visits.
pub fn grouped_trip_stats(visits: &[VisitRecord]) -> GroupedTripStats {
    stats_from_trips(&group_trips(visits))
}

pub(crate) fn stats_from_trips(trips: &[Trip]) -> GroupedTripStats {
    let trip_durations: Vec<Trip> = trips
        .iter()
        .filter(|t| t.total_days > 0)
        .cloned()
        .collect();

    let mut longest: Option<&Trip> = None;
    for trip in &trip_durations {
        if longest.map_or(true, |best| trip.total_days > best.total_days) {
            longest = Some(trip);
        }
    }

    let avg_trip_duration = if trip_durations.is_empty() {
        0
    } else {
        let total: u64 = trip_durations.iter().map(|t| t.total_days as u64).sum();
        (total as f64 / trip_durations.len() as f64).round() as u32
    };

    GroupedTripStats {
        total_trip_count: trips.len() as u32,
        longest_trip_days: longest.map(|t| t.total_days).unwrap_or(0),
        longest_trip: longest.map(|t| t.key.clone()),
        avg_trip_duration,
        trip_durations,
    }
}
