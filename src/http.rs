//! REST data source for PostgREST-style backends.
//!
//! Each table is read with a single `GET {base}/rest/v1/{table}?select=*`.
//! Requests carry the project API key plus an optional user access token,
//! and back off exponentially on 429.
//!
//! The backoff is transport behaviour of this source only. Derivations and
//! the refresh controller never retry; a failed fetch just keeps the
//! previous snapshot until the next trigger.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result, TravelStatsError};
use crate::source::TravelDataSource;
use crate::{CityVisit, Country, FamilyMember, LegacyMemberEdge, VisitMemberEdge, VisitRecord};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;

/// Table names on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub visits: String,
    pub legacy_edges: String,
    pub visit_edges: String,
    pub city_visits: String,
    pub countries: String,
    pub members: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            visits: "country_visit_details".to_string(),
            legacy_edges: "country_visits".to_string(),
            visit_edges: "visit_family_members".to_string(),
            city_visits: "city_visits".to_string(),
            countries: "countries".to_string(),
            members: "family_members".to_string(),
        }
    }
}

/// Connection settings for [`RestSource`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    /// Project URL, e.g. `https://project.example.co`
    pub base_url: String,
    /// Sent as the `apikey` header
    pub api_key: String,
    /// User session token; falls back to `api_key` for the bearer header
    pub access_token: Option<String>,
    pub tables: TableNames,
}

impl RestConfig {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    pub fn with_access_token(mut self, token: &str) -> Self {
        self.access_token = Some(token.to_string());
        self
    }

    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    fn validate(&self) -> Result<()> {
        crate::non_blank(Some(&self.base_url)).ok_or_config("base_url is empty")?;
        crate::non_blank(Some(&self.api_key)).ok_or_config("api_key is empty")?;
        Ok(())
    }

    /// Full URL for reading every row of `table`.
    pub fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}?select=*",
            self.base_url.trim_end_matches('/'),
            table
        )
    }

    fn bearer(&self) -> String {
        let token = crate::non_blank(self.access_token.as_deref()).unwrap_or(&self.api_key);
        format!("Bearer {}", token)
    }
}

/// Reads travel tables over HTTP.
pub struct RestSource {
    client: Client,
    config: RestConfig,
}

impl RestSource {
    pub fn new(config: RestConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TravelStatsError::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    async fn fetch_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let url = self.config.table_url(table);
        let bearer = self.config.bearer();
        let mut retries = 0;

        loop {
            let resp = self
                .client
                .get(&url)
                .header("apikey", &self.config.api_key)
                .header("Authorization", &bearer)
                .send()
                .await
                .map_err(|e| TravelStatsError::fetch(table, e.to_string()))?;

            let status = resp.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                // 1s, 2s, 4s
                let backoff = Duration::from_millis(500 * (1 << retries));
                warn!(
                    "[RestSource] 429 for {}, retry {} after {:?}",
                    table, retries, backoff
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            if !status.is_success() {
                return Err(TravelStatsError::Http {
                    message: format!("GET {} returned {}", table, status),
                    status_code: Some(status.as_u16()),
                });
            }

            let rows: Vec<T> = resp.json().await.map_err(|e| TravelStatsError::Decode {
                table: table.to_string(),
                message: e.to_string(),
            })?;

            debug!("[RestSource] {} rows from {}", rows.len(), table);
            return Ok(rows);
        }
    }
}

#[async_trait]
impl TravelDataSource for RestSource {
    async fn fetch_visits(&self) -> Result<Vec<VisitRecord>> {
        self.fetch_table(&self.config.tables.visits).await
    }

    async fn fetch_legacy_edges(&self) -> Result<Vec<LegacyMemberEdge>> {
        self.fetch_table(&self.config.tables.legacy_edges).await
    }

    async fn fetch_visit_edges(&self) -> Result<Vec<VisitMemberEdge>> {
        self.fetch_table(&self.config.tables.visit_edges).await
    }

    async fn fetch_city_visits(&self) -> Result<Vec<CityVisit>> {
        self.fetch_table(&self.config.tables.city_visits).await
    }

    async fn fetch_countries(&self) -> Result<Vec<Country>> {
        self.fetch_table(&self.config.tables.countries).await
    }

    async fn fetch_members(&self) -> Result<Vec<FamilyMember>> {
        self.fetch_table(&self.config.tables.members).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url() {
        let config = RestConfig::new("https://db.example.com/", "anon");
        assert_eq!(
            config.table_url("country_visits"),
            "https://db.example.com/rest/v1/country_visits?select=*"
        );
    }

    #[test]
    fn test_bearer_prefers_access_token() {
        let config = RestConfig::new("https://db.example.com", "anon");
        assert_eq!(config.bearer(), "Bearer anon");

        let config = config.with_access_token("user-jwt");
        assert_eq!(config.bearer(), "Bearer user-jwt");
    }

    #[test]
    fn test_new_rejects_blank_config() {
        let err = RestSource::new(RestConfig::new("  ", "anon")).err().unwrap();
        assert!(matches!(err, TravelStatsError::Config { .. }));

        let err = RestSource::new(RestConfig::new("https://db.example.com", ""))
            .err()
            .unwrap();
        assert!(matches!(err, TravelStatsError::Config { .. }));
    }

    #[test]
    fn test_default_table_names() {
        let tables = TableNames::default();
        assert_eq!(tables.visits, "country_visit_details");
        assert_eq!(tables.legacy_edges, "country_visits");
        assert_eq!(tables.visit_edges, "visit_family_members");
    }
}
