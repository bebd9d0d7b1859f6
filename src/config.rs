use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Offset, Timelike, Utc};
use clap::Parser;

/// Fuel-card management service.
#[derive(Parser, Debug, Clone)]
#[command(name = "fuelcard")]
#[command(about = "Fuel-card management service with a 1C integration surface")]
#[command(version)]
pub struct Config {
    /// SQLite database URL (e.g. "sqlite:fuelcard.db"). When unset the
    /// server still starts, but every endpoint answers with a
    /// configuration error.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: String,

    /// Business timezone as a fixed offset from UTC, in hours. Daily
    /// quotas reset at midnight of this timezone.
    #[arg(long, env = "BUSINESS_UTC_OFFSET", default_value_t = 3,
          value_parser = clap::value_parser!(i32).range(-12..=14))]
    pub utc_offset_hours: i32,
}

impl Config {
    pub fn database_url(&self) -> Option<String> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
    }

    pub fn business_time(&self) -> BusinessTime {
        BusinessTime::from_offset_hours(self.utc_offset_hours)
    }
}

/// The business-local clock. Operation timestamps and the "today" window
/// for daily quotas are expressed in this fixed-offset timezone.
#[derive(Debug, Clone, Copy)]
pub struct BusinessTime {
    offset: FixedOffset,
}

impl BusinessTime {
    pub fn from_offset_hours(hours: i32) -> Self {
        // clap validates the ±14h range; fall back to UTC for direct callers
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    /// Current business-local wall-clock time, truncated to whole seconds
    /// to match the ledger's stored timestamp precision.
    pub fn now(&self) -> NaiveDateTime {
        let now = self.local_at(Utc::now());
        now.with_nanosecond(0).unwrap_or(now)
    }

    pub fn local_at(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    /// Half-open window `[local midnight, next local midnight)` of the
    /// current business-local calendar day.
    pub fn today_window(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.day_window_at(Utc::now())
    }

    pub fn day_window_at(&self, instant: DateTime<Utc>) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.local_at(instant).date().and_time(NaiveTime::MIN);
        (start, start + Duration::days(1))
    }
}
