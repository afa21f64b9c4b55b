//! Storage collaborator interface.
//!
//! The engine never talks to storage itself. A [`TravelDataSource`] hands
//! back rows for each table, and change notifications arrive as bare
//! [`ChangeNotice`] signals telling the refresh controller to refetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{
    CityVisit, Country, FamilyMember, LegacyMemberEdge, TravelSnapshot, VisitMemberEdge,
    VisitRecord,
};

/// Row fetches the engine depends on. Each call returns the full,
/// possibly empty, current contents of one table.
#[async_trait]
pub trait TravelDataSource: Send + Sync {
    async fn fetch_visits(&self) -> Result<Vec<VisitRecord>>;

    async fn fetch_legacy_edges(&self) -> Result<Vec<LegacyMemberEdge>>;

    async fn fetch_visit_edges(&self) -> Result<Vec<VisitMemberEdge>>;

    async fn fetch_city_visits(&self) -> Result<Vec<CityVisit>>;

    async fn fetch_countries(&self) -> Result<Vec<Country>>;

    async fn fetch_members(&self) -> Result<Vec<FamilyMember>>;
}

/// Fetch every table concurrently into one snapshot.
///
/// Fails as a whole if any single fetch fails, so callers never see a
/// partially refreshed snapshot.
pub async fn fetch_snapshot(source: &dyn TravelDataSource) -> Result<TravelSnapshot> {
    let (visits, legacy_edges, visit_edges, city_visits, countries, members) = futures::try_join!(
        source.fetch_visits(),
        source.fetch_legacy_edges(),
        source.fetch_visit_edges(),
        source.fetch_city_visits(),
        source.fetch_countries(),
        source.fetch_members()
    )?;

    Ok(TravelSnapshot {
        visits,
        legacy_edges,
        visit_edges,
        city_visits,
        countries,
        members,
    })
}

/// Tables whose changes trigger a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchedTable {
    Visits,
    LegacyEdges,
    VisitEdges,
    CityVisits,
    Countries,
    Members,
}

impl WatchedTable {
    pub const ALL: [WatchedTable; 6] = [
        WatchedTable::Visits,
        WatchedTable::LegacyEdges,
        WatchedTable::VisitEdges,
        WatchedTable::CityVisits,
        WatchedTable::Countries,
        WatchedTable::Members,
    ];
}

/// An insert, update or delete happened on `table`. Carries no row data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub table: WatchedTable,
}

impl ChangeNotice {
    pub fn new(table: WatchedTable) -> Self {
        Self { table }
    }
}
