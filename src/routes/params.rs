//! Query parameter types shared by route handlers.
//!
//! They follow Rocket's `FromForm` conventions and derive `JsonSchema` so the
//! generated OpenAPI document lists each parameter and its default.

use rocket::form::FromForm;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const DEFAULT_HISTORY_DAYS: i64 = 30;
const MAX_HISTORY_DAYS: i64 = 365;

/// Optional filters for the topic listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, FromForm)]
pub struct TopicFilter {
    /// Restrict the listing to one category (uuid).
    pub category_id: Option<String>,
}

/// Trailing window for the daily download histogram.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromForm)]
pub struct HistoryParams {
    /// Number of days to include (default 30, clamped to 1..=365).
    #[field(default = 30)]
    pub days: i64,
}

impl Default for HistoryParams {
    fn default() -> Self {
        Self {
            days: DEFAULT_HISTORY_DAYS,
        }
    }
}

impl HistoryParams {
    pub fn days(&self) -> i64 {
        self.days.clamp(1, MAX_HISTORY_DAYS)
    }
}

/// Free-text topic search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, FromForm)]
pub struct SearchParams {
    /// Case-insensitive substring matched against topic titles.
    #[field(default = "")]
    pub q: String,
}
