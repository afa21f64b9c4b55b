//! Year streaks and travel records.
//!
//! ## Features
//! - Current consecutive-year streak, walking back from today's year
//! - Longest consecutive-year run ever
//! - Best year by distinct countries visited
//! - Most countries covered by a single trip
//!
//! Only visits with an effective date take part.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{StatsConfig, VisitRecord};

/// The year with the most distinct countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestYear {
    pub year: i32,
    pub country_count: u32,
    pub visit_count: u32,
}

/// The trip that covered the most distinct countries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestMultiCountryTrip {
    /// Group id, trip name or ISO date, whichever keyed the trip
    pub label: String,
    pub country_count: u32,
    pub country_ids: Vec<String>,
}

/// Streak and record results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    /// Years with at least one visit, ascending
    pub distinct_years: Vec<i32>,
    pub current_year_streak: u32,
    pub max_year_streak: u32,
    pub best_year: Option<BestYear>,
    pub best_multi_country_trip: Option<BestMultiCountryTrip>,
}

/// Key used to bucket visits into trips for the multi-country record.
///
/// Variants never collide: a group id equal to some trip name is still a
/// different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RecordKey {
    Group(String),
    Name(String),
    Date(NaiveDate),
}

impl RecordKey {
    fn for_visit(visit: &VisitRecord, date: NaiveDate) -> Self {
        if let Some(group) = visit.group_id() {
            RecordKey::Group(group.to_string())
        } else if let Some(name) = visit.name() {
            RecordKey::Name(name.to_string())
        } else {
            RecordKey::Date(date)
        }
    }

    fn label(&self) -> String {
        match self {
            RecordKey::Group(id) => id.clone(),
            RecordKey::Name(name) => name.clone(),
            RecordKey::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Compute streaks and records for `today`.
pub fn streak_stats(visits: &[VisitRecord], today: NaiveDate, config: &StatsConfig) -> StreakStats {
    let dated: Vec<(&VisitRecord, NaiveDate)> = visits
        .iter()
        .filter_map(|v| Some((v, v.effective_date()?)))
        .collect();

    if dated.is_empty() {
        return StreakStats::default();
    }

    let years: BTreeSet<i32> = dated.iter().map(|(_, d)| d.year()).collect();
    let current = current_year_streak(&years, today.year(), config.streak_lookback_years);
    let max = longest_year_run(&years).max(current);

    StreakStats {
        distinct_years: years.into_iter().collect(),
        current_year_streak: current,
        max_year_streak: max,
        best_year: best_year(&dated),
        best_multi_country_trip: best_multi_country_trip(&dated),
    }
}

/// Consecutive years with visits, counting back from `this_year` and looking
/// at most `lookback` years.
pub fn current_year_streak(years: &BTreeSet<i32>, this_year: i32, lookback: u32) -> u32 {
    let mut streak = 0;
    for offset in 0..lookback {
        if years.contains(&(this_year - offset as i32)) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Longest run of consecutive years.
pub fn longest_year_run(years: &BTreeSet<i32>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<i32> = None;

    for &year in years {
        run = match previous {
            Some(prev) if year == prev + 1 => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(year);
    }

    best
}

fn best_year(dated: &[(&VisitRecord, NaiveDate)]) -> Option<BestYear> {
    let mut by_year: BTreeMap<i32, (BTreeSet<&str>, u32)> = BTreeMap::new();
    for (visit, date) in dated {
        let entry = by_year.entry(date.year()).or_default();
        if let Some(country) = visit.country() {
            entry.0.insert(country);
        }
        entry.1 += 1;
    }

    // Ascending iteration with a strict comparison keeps the earliest year on ties
    let mut best: Option<BestYear> = None;
    for (year, (countries, visit_count)) in by_year {
        let country_count = countries.len() as u32;
        if best
            .as_ref()
            .map_or(true, |b| country_count > b.country_count)
        {
            best = Some(BestYear {
                year,
                country_count,
                visit_count,
            });
        }
    }
    best
}

fn best_multi_country_trip(dated: &[(&VisitRecord, NaiveDate)]) -> Option<BestMultiCountryTrip> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut countries: HashMap<RecordKey, Vec<String>> = HashMap::new();

    for (visit, date) in dated {
        let key = RecordKey::for_visit(visit, *date);
        let entry = countries.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        if let Some(country) = visit.country() {
            if !entry.iter().any(|c| c == country) {
                entry.push(country.to_string());
            }
        }
    }

    let mut best: Option<BestMultiCountryTrip> = None;
    for key in order {
        let country_ids = countries.remove(&key).unwrap_or_default();
        let country_count = country_ids.len() as u32;
        if best
            .as_ref()
            .map_or(true, |b| country_count > b.country_count)
        {
            best = Some(BestMultiCountryTrip {
                label: key.label(),
                country_count,
                country_ids,
            });
        }
    }
    best
}
