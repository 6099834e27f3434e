//! Download analytics: recording events and the aggregates behind the admin
//! dashboard.
//!
//! Calendar boundaries (start of day, week, month) are computed in the
//! server's local time zone; weeks start on Sunday. The daily histogram groups
//! by `DATE(created_at)` in the database session's time zone.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{DailyCount, Download, DownloadStats};

const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Edition {
    Cosmic,
    Plasma,
}

impl Edition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Edition::Cosmic => "COSMIC",
            Edition::Plasma => "PLASMA",
        }
    }
}

impl FromStr for Edition {
    type Err = String;

    /// Exact, case-sensitive match.
    fn from_str(edition: &str) -> Result<Self, Self::Err> {
        match edition {
            "COSMIC" => Ok(Edition::Cosmic),
            "PLASMA" => Ok(Edition::Plasma),
            _ => Err("invalid edition, must be COSMIC or PLASMA".to_string()),
        }
    }
}

/// One download to record.
#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub edition: Edition,
    pub ip_address: String,
    pub user_agent: String,
    pub user_id: Option<i32>,
}

/// Instants from which "today", "this week" and "this month" are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStarts {
    pub day: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

/// Midnight of today, of the most recent Sunday and of the first of the month,
/// all in `now`'s time zone.
pub fn period_starts<Tz: TimeZone>(now: &DateTime<Tz>) -> PeriodStarts {
    let tz = now.timezone();
    let today = now.date_naive();
    let week = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
    let month = today.with_day(1).unwrap_or(today);

    let midnight = |date: NaiveDate| -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            // Midnight skipped by a DST jump; fall back to the UTC reading.
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    };

    PeriodStarts {
        day: midnight(today),
        week: midnight(week),
        month: midnight(month),
    }
}

pub async fn record_download(pool: &PgPool, event: &DownloadEvent) -> Result<Download, sqlx::Error> {
    sqlx::query_as(
        r#"INSERT INTO downloads (edition, ip_address, user_agent, user_id)
           VALUES ($1, $2, $3, $4)
           RETURNING id, edition, ip_address, user_agent, user_id, created_at"#,
    )
    .bind(event.edition.as_str())
    .bind(&event.ip_address)
    .bind(&event.user_agent)
    .bind(event.user_id)
    .fetch_one(pool)
    .await
}

#[derive(Debug, FromRow)]
struct PeriodCounts {
    total: i64,
    today: i64,
    this_week: i64,
    this_month: i64,
}

#[derive(Debug, FromRow)]
struct EditionCount {
    edition: String,
    count: i64,
}

pub async fn download_stats(pool: &PgPool, starts: PeriodStarts) -> Result<DownloadStats, sqlx::Error> {
    let counts: PeriodCounts = sqlx::query_as(
        r#"SELECT
               COUNT(*) AS total,
               COUNT(*) FILTER (WHERE created_at >= $1) AS today,
               COUNT(*) FILTER (WHERE created_at >= $2) AS this_week,
               COUNT(*) FILTER (WHERE created_at >= $3) AS this_month
           FROM downloads"#,
    )
    .bind(starts.day)
    .bind(starts.week)
    .bind(starts.month)
    .fetch_one(pool)
    .await?;

    let by_edition: Vec<EditionCount> = sqlx::query_as(
        "SELECT edition, COUNT(*) AS count FROM downloads GROUP BY edition",
    )
    .fetch_all(pool)
    .await?;

    let recent: Vec<Download> = sqlx::query_as(
        r#"SELECT id, edition, ip_address, user_agent, user_id, created_at
           FROM downloads
           ORDER BY created_at DESC, id DESC
           LIMIT $1"#,
    )
    .bind(RECENT_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(DownloadStats {
        total_downloads: counts.total,
        downloads_by_edition: by_edition
            .into_iter()
            .map(|row| (row.edition, row.count))
            .collect::<BTreeMap<_, _>>(),
        downloads_today: counts.today,
        downloads_this_week: counts.this_week,
        downloads_this_month: counts.this_month,
        recent_downloads: recent,
    })
}

/// Daily counts over the trailing `days`, oldest day first. Days without
/// downloads are absent, so an empty table yields an empty histogram.
pub async fn download_history(
    pool: &PgPool,
    now: DateTime<Utc>,
    days: i64,
) -> Result<Vec<DailyCount>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT DATE(created_at) AS date, COUNT(*) AS count
           FROM downloads
           WHERE created_at >= $1
           GROUP BY DATE(created_at)
           ORDER BY date ASC"#,
    )
    .bind(now - Duration::days(days))
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(tz: FixedOffset, y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        tz.with_ymd_and_hms(y, m, d, h, 30, 0)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn editions_parse_exactly() {
        assert_eq!("COSMIC".parse::<Edition>(), Ok(Edition::Cosmic));
        assert_eq!("PLASMA".parse::<Edition>(), Ok(Edition::Plasma));
        assert!("cosmic".parse::<Edition>().is_err());
        assert!("GNOME".parse::<Edition>().is_err());
    }

    #[test]
    fn week_starts_on_sunday() {
        let utc = FixedOffset::east_opt(0).expect("offset");
        // Wednesday 2025-03-12
        let starts = period_starts(&at(utc, 2025, 3, 12, 15));
        assert_eq!(starts.day, Utc.with_ymd_and_hms(2025, 3, 12, 0, 0, 0).unwrap());
        assert_eq!(starts.week, Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(starts.month, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn sunday_is_its_own_week_start() {
        let utc = FixedOffset::east_opt(0).expect("offset");
        let starts = period_starts(&at(utc, 2025, 3, 9, 8));
        assert_eq!(starts.week, starts.day);
    }

    #[test]
    fn week_can_begin_in_previous_month() {
        let utc = FixedOffset::east_opt(0).expect("offset");
        // Saturday 2025-03-01; the week began Sunday 2025-02-23.
        let starts = period_starts(&at(utc, 2025, 3, 1, 10));
        assert_eq!(starts.week, Utc.with_ymd_and_hms(2025, 2, 23, 0, 0, 0).unwrap());
        assert_eq!(starts.month, starts.day);
    }

    #[test]
    fn boundaries_follow_local_offset() {
        let jakarta = FixedOffset::east_opt(7 * 3600).expect("offset");
        let starts = period_starts(&at(jakarta, 2025, 3, 12, 5));
        // Local midnight in UTC+7 is 17:00 UTC on the previous day.
        assert_eq!(starts.day, Utc.with_ymd_and_hms(2025, 3, 11, 17, 0, 0).unwrap());
    }
}
