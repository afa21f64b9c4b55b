//! Per-country summaries and overall totals.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::reconcile::Reconciliation;
use crate::{non_blank, TravelSnapshot};

/// Aggregates for one country.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub country_id: String,
    /// Sum of `number_of_days` over visits (absent counts as 0), saturating
    /// at `u32::MAX`
    pub total_days: u32,
    /// Number of visit records, including zero-length ones
    pub times_visited: u32,
    pub cities_count: u32,
    /// City names in fetch order
    pub cities: Vec<String>,
}

impl CountrySummary {
    fn empty(country_id: &str) -> Self {
        Self {
            country_id: country_id.to_string(),
            ..Default::default()
        }
    }
}

/// Summary for a single country. Unknown countries yield an all-zero summary.
pub fn country_summary(snapshot: &TravelSnapshot, country_id: &str) -> CountrySummary {
    let mut summary = CountrySummary::empty(country_id);

    for visit in snapshot
        .visits
        .iter()
        .filter(|v| v.country() == Some(country_id))
    {
        summary.total_days = summary.total_days.saturating_add(visit.duration_days());
        summary.times_visited += 1;
    }

    summary.cities = snapshot
        .city_visits
        .iter()
        .filter(|c| non_blank(c.country_id.as_deref()) == Some(country_id))
        .filter_map(|c| non_blank(c.city_name.as_deref()))
        .map(str::to_string)
        .collect();
    summary.cities_count = summary.cities.len() as u32;

    summary
}

/// Summaries for every country that appears in visits or city visits.
pub fn all_summaries(snapshot: &TravelSnapshot) -> BTreeMap<String, CountrySummary> {
    let mut summaries: BTreeMap<String, CountrySummary> = BTreeMap::new();

    for visit in &snapshot.visits {
        let Some(country_id) = visit.country() else {
            continue;
        };
        let summary = summaries
            .entry(country_id.to_string())
            .or_insert_with(|| CountrySummary::empty(country_id));
        summary.total_days = summary.total_days.saturating_add(visit.duration_days());
        summary.times_visited += 1;
    }

    for city in &snapshot.city_visits {
        let Some(country_id) = non_blank(city.country_id.as_deref()) else {
            continue;
        };
        let summary = summaries
            .entry(country_id.to_string())
            .or_insert_with(|| CountrySummary::empty(country_id));
        if let Some(name) = non_blank(city.city_name.as_deref()) {
            summary.cities.push(name.to_string());
            summary.cities_count += 1;
        }
    }

    summaries
}

/// Headline totals across the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelTotals {
    /// Countries with a visit record or a member edge
    pub countries_visited: u32,
    pub continents_visited: u32,
    pub total_visits: u32,
    pub total_days: u32,
    /// Distinct (country, city) pairs
    pub cities_visited: u32,
}

/// Compute headline totals.
pub fn travel_totals(snapshot: &TravelSnapshot, reconciliation: &Reconciliation) -> TravelTotals {
    let visited: BTreeSet<&str> = snapshot
        .visits
        .iter()
        .filter_map(|v| v.country())
        .chain(reconciliation.visited_country_ids())
        .collect();

    let continents: HashMap<&str, &str> = snapshot
        .countries
        .iter()
        .filter_map(|c| Some((c.id.as_str(), non_blank(c.continent.as_deref())?)))
        .collect();
    let visited_continents: BTreeSet<&str> = visited
        .iter()
        .filter_map(|id| continents.get(id).copied())
        .collect();

    let cities: BTreeSet<(&str, String)> = snapshot
        .city_visits
        .iter()
        .filter_map(|c| {
            let country = non_blank(c.country_id.as_deref())?;
            let name = non_blank(c.city_name.as_deref())?;
            Some((country, name.to_lowercase()))
        })
        .collect();

    TravelTotals {
        countries_visited: visited.len() as u32,
        continents_visited: visited_continents.len() as u32,
        total_visits: snapshot.visits.len() as u32,
        total_days: snapshot
            .visits
            .iter()
            .map(|v| v.duration_days())
            .fold(0, u32::saturating_add),
        cities_visited: cities.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile;
    use crate::{CityVisit, Country, LegacyMemberEdge, VisitRecord};

    fn city(id: &str, country: &str, name: &str) -> CityVisit {
        CityVisit {
            id: id.to_string(),
            country_id: Some(country.to_string()),
            city_name: Some(name.to_string()),
            visit_date: None,
        }
    }

    fn sample_snapshot() -> TravelSnapshot {
        TravelSnapshot {
            visits: vec![
                VisitRecord::new("v1", "FR").with_days(10),
                VisitRecord::new("v2", "FR"),
                VisitRecord::new("v3", "IT").with_days(4),
            ],
            city_visits: vec![
                city("c1", "FR", "Paris"),
                city("c2", "FR", "Lyon"),
                city("c3", "ES", "Madrid"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_country_summary() {
        let summary = country_summary(&sample_snapshot(), "FR");
        assert_eq!(summary.total_days, 10);
        assert_eq!(summary.times_visited, 2);
        assert_eq!(summary.cities_count, 2);
        assert_eq!(summary.cities, vec!["Paris", "Lyon"]);
    }

    #[test]
    fn test_country_summary_unknown_country() {
        let summary = country_summary(&sample_snapshot(), "BR");
        assert_eq!(summary, CountrySummary::empty("BR"));
    }

    #[test]
    fn test_all_summaries_cover_union_of_ids() {
        let snapshot = sample_snapshot();
        let summaries = all_summaries(&snapshot);

        let ids: Vec<&str> = summaries.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["ES", "FR", "IT"]);
        assert_eq!(summaries["ES"].times_visited, 0);
        assert_eq!(summaries["ES"].cities_count, 1);
        assert_eq!(summaries["IT"].total_days, 4);

        // Agrees with the single-country projection
        for (id, summary) in &summaries {
            assert_eq!(summary, &country_summary(&snapshot, id));
        }
    }

    #[test]
    fn test_all_summaries_empty() {
        assert!(all_summaries(&TravelSnapshot::default()).is_empty());
    }

    #[test]
    fn test_travel_totals() {
        let mut snapshot = sample_snapshot();
        snapshot.city_visits.push(city("c4", "FR", "paris"));
        snapshot.countries = vec![
            Country {
                id: "FR".to_string(),
                continent: Some("Europe".to_string()),
                ..Default::default()
            },
            Country {
                id: "JP".to_string(),
                continent: Some("Asia".to_string()),
                ..Default::default()
            },
        ];
        snapshot.legacy_edges = vec![LegacyMemberEdge {
            country_id: Some("JP".to_string()),
            family_member_id: Some("m1".to_string()),
            member_name: Some("Alice".to_string()),
        }];

        let totals = travel_totals(&snapshot, &reconcile(&snapshot));
        assert_eq!(totals.countries_visited, 3); // FR, IT, JP
        assert_eq!(totals.continents_visited, 2);
        assert_eq!(totals.total_visits, 3);
        assert_eq!(totals.total_days, 14);
        assert_eq!(totals.cities_visited, 3); // Paris, Lyon, Madrid
    }

    #[test]
    fn test_huge_day_counts_saturate() {
        let snapshot = TravelSnapshot {
            visits: vec![
                VisitRecord::new("v1", "FR").with_days(3_000_000_000),
                VisitRecord::new("v2", "FR").with_days(3_000_000_000),
            ],
            ..Default::default()
        };

        assert_eq!(all_summaries(&snapshot)["FR"].total_days, u32::MAX);
        assert_eq!(country_summary(&snapshot, "FR").total_days, u32::MAX);

        let totals = travel_totals(&snapshot, &reconcile(&snapshot));
        assert_eq!(totals.total_days, u32::MAX);
        assert_eq!(totals.total_visits, 2);
    }
}
