use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};

use crate::{
    store::{FeedbackCounts, SectionCount, Store},
    Result,
};

pub const DEFAULT_POPULAR_LIMIT: i64 = 5;
const POPULAR_WINDOW_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserStats {
    pub total: i64,
    /// Last activity on the current local calendar date.
    pub active_today: i64,
    /// Last activity within the trailing 7 days.
    pub active_week: i64,
    /// Last activity within the trailing 30 days.
    pub active_month: i64,
}

/// Read-only aggregates over users, section events and feedback.
///
/// Nothing is pre-aggregated; every window is evaluated against the clock at
/// query time. "Today" is a calendar day while week and month are trailing
/// windows, so `active_today <= active_week` is typical but not guaranteed
/// around midnight in far-off timezones.
pub struct StatsAggregator {
    store: Arc<dyn Store>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn user_stats(&self) -> Result<UserStats> {
        self.user_stats_at(Local::now()).await
    }

    pub async fn user_stats_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<UserStats> {
        let (day_start, day_end) = calendar_day_bounds(&now);
        let now = now.with_timezone(&Utc);

        Ok(UserStats {
            total: self.store.count_users().await?,
            active_today: self.store.count_active_between(day_start, day_end).await?,
            active_week: self
                .store
                .count_active_since(now - Duration::days(7))
                .await?,
            active_month: self
                .store
                .count_active_since(now - Duration::days(30))
                .await?,
        })
    }

    pub async fn popular_sections(&self, limit: i64) -> Result<Vec<SectionCount>> {
        let since = Utc::now() - Duration::days(POPULAR_WINDOW_DAYS);
        self.store.popular_sections(since, limit.max(0)).await
    }

    pub async fn feedback_stats(&self) -> Result<FeedbackCounts> {
        self.store.feedback_counts().await
    }

    /// Users a broadcast would currently reach.
    pub async fn recipient_count(&self) -> Result<i64> {
        self.store.count_active_users().await
    }
}

/// `[local midnight, next local midnight)` of `now`'s date, in UTC.
fn calendar_day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let midnight = now.date_naive().and_hms_opt(0, 0, 0);
    let start = midnight
        .and_then(|m| tz.from_local_datetime(&m).earliest())
        .map(|d| d.with_timezone(&Utc))
        // Midnight skipped by a DST jump: fall back to a trailing day.
        .unwrap_or_else(|| now.with_timezone(&Utc) - Duration::days(1));
    (start, start + Duration::days(1))
}
