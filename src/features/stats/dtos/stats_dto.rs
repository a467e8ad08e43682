use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Storage and activity summary for the current UTC month
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserStatsDto {
    /// Sum of declared sizes over live files, in bytes
    pub storage_used: i64,
    /// Configured per-user quota, in bytes
    pub storage_total: i64,
    /// `storage_used / storage_total * 100`; may exceed 100
    pub percentage: f64,
    pub monthly_uploads: i64,
    pub monthly_downloads: i64,
    /// Distinct tag names added this month
    pub monthly_tags_created: i64,
    /// Month the counters cover, `YYYY-MM`
    pub month: String,
}

/// Activity on a single UTC day
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyHistoryDto {
    pub uploads: i64,
    pub downloads: i64,
    /// Tags on files created that day plus tags added that day, de-duplicated
    pub tags: Vec<String>,
}

/// Per-day activity for one month, keyed by `YYYY-MM-DD`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityHistoryDto {
    pub month: String,
    pub days: BTreeMap<String, DailyHistoryDto>,
}

/// Query params for the activity history
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityHistoryQuery {
    /// `YYYY-MM`; defaults to the current UTC month
    pub month: Option<String>,
}
