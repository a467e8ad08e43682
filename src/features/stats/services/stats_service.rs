use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::debug;

use crate::core::config::MediaConfig;
use crate::core::deadline::with_deadline;
use crate::core::error::{AppError, Result};
use crate::features::files::models::UserId;
use crate::features::stats::dtos::{ActivityHistoryDto, DailyHistoryDto, UserStatsDto};
use crate::modules::metadata::MetadataStore;
use crate::shared::validation::{month_bounds, parse_month};

/// Storage usage and activity aggregation
pub struct StatsService {
    store: Arc<dyn MetadataStore>,
    config: Arc<MediaConfig>,
}

fn first_of_month(now: DateTime<Utc>) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .ok_or_else(|| AppError::Internal("Failed to resolve current month".to_string()))
}

impl StatsService {
    pub fn new(store: Arc<dyn MetadataStore>, config: Arc<MediaConfig>) -> Self {
        Self { store, config }
    }

    pub async fn get_user_stats(&self, user_id: UserId) -> Result<UserStatsDto> {
        self.get_user_stats_at(user_id, Utc::now()).await
    }

    /// Stats for the UTC month containing `now`
    pub async fn get_user_stats_at(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<UserStatsDto> {
        with_deadline(self.config.request_timeout, "get_user_stats", async {
            let first_day = first_of_month(now)?;
            let (from, until) = month_bounds(first_day);

            let storage_used = self.store.storage_used(user_id).await?;
            let counts = self.store.activity_counts(user_id, from, until).await?;

            let storage_total = self.config.storage_quota_bytes;
            let percentage = if storage_total > 0 {
                storage_used as f64 / storage_total as f64 * 100.0
            } else {
                0.0
            };

            Ok(UserStatsDto {
                storage_used,
                storage_total,
                percentage,
                monthly_uploads: counts.uploads,
                monthly_downloads: counts.downloads,
                monthly_tags_created: counts.distinct_tags,
                month: first_day.format("%Y-%m").to_string(),
            })
        })
        .await
    }

    /// Per-day history for `month` (`YYYY-MM`), or the current month when absent
    pub async fn get_activity_history(
        &self,
        user_id: UserId,
        month: Option<&str>,
    ) -> Result<ActivityHistoryDto> {
        self.get_activity_history_at(user_id, month, Utc::now())
            .await
    }

    pub async fn get_activity_history_at(
        &self,
        user_id: UserId,
        month: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ActivityHistoryDto> {
        let first_day = match month {
            Some(m) => parse_month(m)?,
            None => first_of_month(now)?,
        };

        with_deadline(self.config.request_timeout, "get_activity_history", async {
            let (from, until) = month_bounds(first_day);

            let activity = self.store.daily_activity(user_id, from, until).await?;
            let tags = self.store.daily_tags(user_id, from, until).await?;

            let mut tag_sets: BTreeMap<NaiveDate, BTreeSet<String>> = BTreeMap::new();
            for entry in tags {
                tag_sets.entry(entry.day).or_default().insert(entry.name);
            }

            let mut days: BTreeMap<NaiveDate, DailyHistoryDto> = BTreeMap::new();
            for row in activity {
                let day = days.entry(row.day).or_default();
                day.uploads = row.uploads;
                day.downloads = row.downloads;
            }
            for (date, names) in tag_sets {
                days.entry(date).or_default().tags = names.into_iter().collect();
            }

            debug!(
                "Activity history for user {} in {}: {} active days",
                user_id,
                first_day.format("%Y-%m"),
                days.len()
            );

            Ok(ActivityHistoryDto {
                month: first_day.format("%Y-%m").to_string(),
                days: days
                    .into_iter()
                    .map(|(date, day)| (date.format("%Y-%m-%d").to_string(), day))
                    .collect(),
            })
        })
        .await
    }
}
