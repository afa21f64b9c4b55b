//! Unified error handling for the travel-stats library.
//!
//! Derivations never fail: missing or malformed data degrades to empty
//! results. Errors only come from the storage collaborator and are caught at
//! the fetch boundary by the refresh controller.

use thiserror::Error;

/// Unified error type for travel-stats operations.
#[derive(Debug, Clone, Error)]
pub enum TravelStatsError {
    /// A row fetch from the storage collaborator failed
    #[error("Failed to fetch {table}: {message}")]
    Fetch { table: String, message: String },
    /// HTTP/API error
    #[error("HTTP error{}: {message}", .status_code.map(|c| format!(" ({})", c)).unwrap_or_default())]
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Rows came back but could not be decoded
    #[error("Failed to decode {table} rows: {message}")]
    Decode { table: String, message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TravelStatsError {
    /// Shorthand for a fetch failure on `table`.
    pub fn fetch(table: &str, message: impl Into<String>) -> Self {
        TravelStatsError::Fetch {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for travel-stats operations.
pub type Result<T> = std::result::Result<T, TravelStatsError>;

/// Extension trait for converting Option to TravelStatsError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a configuration error.
    fn ok_or_config(self, message: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TravelStatsError::Config {
            message: message.to_string(),
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TravelStatsError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TravelStatsError::fetch("city_visits", "connection reset");
        assert_eq!(
            err.to_string(),
            "Failed to fetch city_visits: connection reset"
        );

        let err = TravelStatsError::Http {
            message: "unauthorized".to_string(),
            status_code: Some(401),
        };
        assert_eq!(err.to_string(), "HTTP error (401): unauthorized");

        let err = TravelStatsError::Http {
            message: "timed out".to_string(),
            status_code: None,
        };
        assert_eq!(err.to_string(), "HTTP error: timed out");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_config("base_url is empty"),
            Err(TravelStatsError::Config { .. })
        ));
        assert_eq!(Some(3).ok_or_internal("unused").ok(), Some(3));
    }
}
