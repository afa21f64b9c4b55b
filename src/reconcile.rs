//! Membership reconciliation.
//!
//! Two schemas record who visited a country: legacy edges point straight at
//! a country, current edges point at a visit record which in turn points at
//! a country. Both are normalized into [`ResolvedEdge`] and unioned, so a
//! member/country pair recorded in either system shows up in the result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::{non_blank, LegacyMemberEdge, TravelSnapshot, VisitMemberEdge};

/// Either kind of "member visited country" edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipEdge {
    /// Direct country edge, no date
    Legacy(LegacyMemberEdge),
    /// Edge through a dated visit record
    Current(VisitMemberEdge),
}

/// An edge after country resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEdge {
    pub country_id: String,
    pub member_id: Option<String>,
    pub member_name: String,
}

impl MembershipEdge {
    /// Resolve this edge to a country.
    ///
    /// `visit_countries` maps visit id to country id. Returns `None` for
    /// orphaned edges: unknown visit, or missing country or member name.
    pub fn resolve(&self, visit_countries: &HashMap<&str, &str>) -> Option<ResolvedEdge> {
        let (country_id, member_id, member_name) = match self {
            MembershipEdge::Legacy(edge) => (
                non_blank(edge.country_id.as_deref())?,
                edge.family_member_id.as_deref(),
                edge.member_name.as_deref(),
            ),
            MembershipEdge::Current(edge) => {
                let visit_id = non_blank(edge.visit_id.as_deref())?;
                (
                    *visit_countries.get(visit_id)?,
                    edge.family_member_id.as_deref(),
                    edge.member_name.as_deref(),
                )
            }
        };

        Some(ResolvedEdge {
            country_id: country_id.to_string(),
            member_id: non_blank(member_id).map(str::to_string),
            member_name: non_blank(member_name)?.to_string(),
        })
    }
}

/// Canonical membership view of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// country_id -> names of members who visited it
    pub visited_by: BTreeMap<String, BTreeSet<String>>,
    /// member_id -> countries the member visited
    pub visited_countries: BTreeMap<String, BTreeSet<String>>,
}

impl Reconciliation {
    /// Members who visited `country_id`; empty if none or unknown.
    pub fn members_for(&self, country_id: &str) -> BTreeSet<String> {
        self.visited_by.get(country_id).cloned().unwrap_or_default()
    }

    /// Countries visited by `member_id`; empty if none or unknown.
    pub fn countries_for(&self, member_id: &str) -> BTreeSet<String> {
        self.visited_countries
            .get(member_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Countries with at least one member edge.
    pub fn visited_country_ids(&self) -> impl Iterator<Item = &str> {
        self.visited_by
            .iter()
            .filter(|(_, names)| !names.is_empty())
            .map(|(id, _)| id.as_str())
    }

    fn add(&mut self, edge: ResolvedEdge) {
        if let Some(member_id) = edge.member_id {
            self.visited_countries
                .entry(member_id)
                .or_default()
                .insert(edge.country_id.clone());
        }
        self.visited_by
            .entry(edge.country_id)
            .or_default()
            .insert(edge.member_name);
    }
}

/// Collect both edge kinds of a snapshot as [`MembershipEdge`]s.
pub fn membership_edges(snapshot: &TravelSnapshot) -> Vec<MembershipEdge> {
    snapshot
        .visit_edges
        .iter()
        .cloned()
        .map(MembershipEdge::Current)
        .chain(
            snapshot
                .legacy_edges
                .iter()
                .cloned()
                .map(MembershipEdge::Legacy),
        )
        .collect()
}

/// Merge legacy and current membership edges into one view.
///
/// Every country and member in the snapshot gets an entry, empty when they
/// have no edges.
pub fn reconcile(snapshot: &TravelSnapshot) -> Reconciliation {
    let visit_countries: HashMap<&str, &str> = snapshot
        .visits
        .iter()
        .filter_map(|v| Some((v.id.as_str(), v.country()?)))
        .collect();

    let mut result = Reconciliation::default();
    for country in &snapshot.countries {
        result.visited_by.entry(country.id.clone()).or_default();
    }
    for member in &snapshot.members {
        result
            .visited_countries
            .entry(member.id.clone())
            .or_default();
    }

    let mut dropped = 0usize;
    for edge in membership_edges(snapshot) {
        match edge.resolve(&visit_countries) {
            Some(resolved) => result.add(resolved),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("[Reconcile] Dropped {} orphaned membership edges", dropped);
    }

    result
}

/// Per-member travel summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub member_id: String,
    pub name: String,
    pub country_count: u32,
    /// Distinct continents, sorted
    pub continents: Vec<String>,
}

/// One summary per family member, in snapshot order.
pub fn member_summaries(
    snapshot: &TravelSnapshot,
    reconciliation: &Reconciliation,
) -> Vec<MemberSummary> {
    let continents: HashMap<&str, &str> = snapshot
        .countries
        .iter()
        .filter_map(|c| Some((c.id.as_str(), non_blank(c.continent.as_deref())?)))
        .collect();

    snapshot
        .members
        .iter()
        .map(|member| {
            let countries = reconciliation.countries_for(&member.id);
            let member_continents: BTreeSet<String> = countries
                .iter()
                .filter_map(|id| continents.get(id.as_str()))
                .map(|c| c.to_string())
                .collect();

            MemberSummary {
                member_id: member.id.clone(),
                name: member.name.clone(),
                country_count: countries.len() as u32,
                continents: member_continents.into_iter().collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Country, FamilyMember, VisitRecord};

    fn legacy(country: &str, member: &str, name: &str) -> LegacyMemberEdge {
        LegacyMemberEdge {
            country_id: Some(country.to_string()),
            family_member_id: Some(member.to_string()),
            member_name: Some(name.to_string()),
        }
    }

    fn current(visit: &str, member: &str, name: &str) -> VisitMemberEdge {
        VisitMemberEdge {
            visit_id: Some(visit.to_string()),
            family_member_id: Some(member.to_string()),
            member_name: Some(name.to_string()),
        }
    }

    fn country(id: &str, continent: &str) -> Country {
        Country {
            id: id.to_string(),
            name: id.to_string(),
            continent: Some(continent.to_string()),
            ..Default::default()
        }
    }

    fn member(id: &str, name: &str) -> FamilyMember {
        FamilyMember {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_of_both_edge_kinds() {
        let snapshot = TravelSnapshot {
            visits: vec![
                VisitRecord::new("v1", "FR"),
                VisitRecord::new("v2", "JP"),
            ],
            legacy_edges: vec![legacy("FR", "m1", "Alice"), legacy("IT", "m2", "Bob")],
            visit_edges: vec![current("v1", "m2", "Bob"), current("v2", "m1", "Alice")],
            ..Default::default()
        };

        let result = reconcile(&snapshot);

        assert_eq!(result.members_for("FR"), names(&["Alice", "Bob"]));
        assert_eq!(result.members_for("IT"), names(&["Bob"]));
        assert_eq!(result.members_for("JP"), names(&["Alice"]));
        assert_eq!(result.countries_for("m1"), names(&["FR", "JP"]));
        assert_eq!(result.countries_for("m2"), names(&["FR", "IT"]));
    }

    #[test]
    fn test_duplicate_facts_are_deduplicated() {
        let snapshot = TravelSnapshot {
            visits: vec![VisitRecord::new("v1", "FR"), VisitRecord::new("v2", "FR")],
            legacy_edges: vec![legacy("FR", "m1", "Alice")],
            visit_edges: vec![current("v1", "m1", "Alice"), current("v2", "m1", "Alice")],
            ..Default::default()
        };

        let result = reconcile(&snapshot);
        assert_eq!(result.members_for("FR"), names(&["Alice"]));
        assert_eq!(result.countries_for("m1"), names(&["FR"]));
    }

    #[test]
    fn test_orphaned_edges_are_dropped() {
        let snapshot = TravelSnapshot {
            visits: vec![VisitRecord::new("v1", "FR")],
            legacy_edges: vec![
                LegacyMemberEdge {
                    country_id: None,
                    ..legacy("", "m1", "Alice")
                },
                LegacyMemberEdge {
                    member_name: None,
                    ..legacy("DE", "m1", "Alice")
                },
            ],
            visit_edges: vec![current("missing", "m1", "Alice"), current("v1", "m2", "Bob")],
            ..Default::default()
        };

        let result = reconcile(&snapshot);
        assert_eq!(result.visited_by.len(), 1);
        assert_eq!(result.members_for("FR"), names(&["Bob"]));
        assert!(result.countries_for("m1").is_empty());
    }

    #[test]
    fn test_edge_without_member_id_counts_for_country_only() {
        let snapshot = TravelSnapshot {
            legacy_edges: vec![LegacyMemberEdge {
                family_member_id: None,
                ..legacy("FR", "", "Grandma")
            }],
            ..Default::default()
        };

        let result = reconcile(&snapshot);
        assert_eq!(result.members_for("FR"), names(&["Grandma"]));
        assert!(result.visited_countries.is_empty());
    }

    #[test]
    fn test_unvisited_entities_get_empty_entries() {
        let snapshot = TravelSnapshot {
            countries: vec![country("FR", "Europe"), country("BR", "South America")],
            members: vec![member("m1", "Alice")],
            legacy_edges: vec![legacy("FR", "m1", "Alice")],
            ..Default::default()
        };

        let result = reconcile(&snapshot);
        assert_eq!(result.visited_by.get("BR"), Some(&BTreeSet::new()));
        assert_eq!(result.visited_country_ids().collect::<Vec<_>>(), vec!["FR"]);
        assert_eq!(result.visited_countries.len(), 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let result = reconcile(&TravelSnapshot::default());
        assert!(result.visited_by.is_empty());
        assert!(result.visited_countries.is_empty());
        assert!(result.members_for("FR").is_empty());
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let snapshot = TravelSnapshot {
            visits: vec![VisitRecord::new("v1", "FR")],
            legacy_edges: vec![legacy("IT", "m1", "Alice")],
            visit_edges: vec![current("v1", "m1", "Alice")],
            ..Default::default()
        };
        assert_eq!(reconcile(&snapshot), reconcile(&snapshot));
    }

    #[test]
    fn test_member_summaries() {
        let snapshot = TravelSnapshot {
            countries: vec![
                country("FR", "Europe"),
                country("IT", "Europe"),
                country("JP", "Asia"),
            ],
            members: vec![member("m1", "Alice"), member("m2", "Bob")],
            legacy_edges: vec![
                legacy("FR", "m1", "Alice"),
                legacy("IT", "m1", "Alice"),
                legacy("JP", "m1", "Alice"),
            ],
            ..Default::default()
        };

        let reconciliation = reconcile(&snapshot);
        let summaries = member_summaries(&snapshot, &reconciliation);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Alice");
        assert_eq!(summaries[0].country_count, 3);
        assert_eq!(summaries[0].continents, vec!["Asia", "Europe"]);
        assert_eq!(summaries[1].country_count, 0);
        assert!(summaries[1].continents.is_empty());
    }
}
