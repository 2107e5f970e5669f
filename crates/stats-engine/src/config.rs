//! # Statistics Configuration
//!
//! Engine configuration and the query span accepted by the read API.

use crate::algorithms::SupplySchedule;
use crate::domain::{
    DEFAULT_LIVE_WINDOW_SECS, DEFAULT_SPAN_DAYS, MAX_SPAN_DAYS, STATISTIC_WATERMARK,
};
use serde::{Deserialize, Serialize};

/// Statistics engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Watermark kind the catch-up persists under.
    pub watermark_kind: String,

    /// Seconds a block stays in the live cache after its timestamp.
    pub live_window_secs: u64,

    /// Days served when the caller does not ask for a span.
    pub default_days: u32,

    /// Largest span served.
    pub max_days: u32,

    /// Issuance schedule used for supply snapshots.
    pub supply: SupplySchedule,

    /// Capacity of the catch-up report channel.
    pub report_channel_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            watermark_kind: STATISTIC_WATERMARK.to_string(),
            live_window_secs: DEFAULT_LIVE_WINDOW_SECS,
            default_days: DEFAULT_SPAN_DAYS,
            max_days: MAX_SPAN_DAYS,
            supply: SupplySchedule::default(),
            report_channel_capacity: 64,
        }
    }
}

impl StatsConfig {
    /// Create a config for testing (short window, small spans).
    pub fn for_testing() -> Self {
        Self {
            watermark_kind: STATISTIC_WATERMARK.to_string(),
            live_window_secs: 3_600,
            default_days: 7,
            max_days: 30,
            supply: SupplySchedule::default(),
            report_channel_capacity: 16,
        }
    }

    /// Builder: set the live window.
    pub fn with_live_window_secs(mut self, secs: u64) -> Self {
        self.live_window_secs = secs;
        self
    }

    /// Builder: set the watermark kind.
    pub fn with_watermark_kind(mut self, kind: impl Into<String>) -> Self {
        self.watermark_kind = kind.into();
        self
    }

    /// Builder: set the supply schedule.
    pub fn with_supply(mut self, supply: SupplySchedule) -> Self {
        self.supply = supply;
        self
    }

    /// Builder: set default and maximum spans.
    pub fn with_spans(mut self, default_days: u32, max_days: u32) -> Self {
        self.default_days = default_days;
        self.max_days = max_days;
        self
    }

    /// Span for an optional day count.
    pub fn span(&self, days: Option<u32>) -> TimeSpan {
        TimeSpan::clamp(days, self.default_days, self.max_days)
    }
}

/// Number of days a range query covers, already clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan(u32);

impl Default for TimeSpan {
    fn default() -> Self {
        TimeSpan(DEFAULT_SPAN_DAYS)
    }
}

impl TimeSpan {
    /// Exact span (clamped to the global maximum).
    pub fn days(days: u32) -> Self {
        TimeSpan(days.min(MAX_SPAN_DAYS))
    }

    /// Clamp an optional day count against a default and a maximum.
    pub fn clamp(days: Option<u32>, default_days: u32, max_days: u32) -> Self {
        match days {
            Some(days) if days > 0 => TimeSpan(days.min(max_days)),
            _ => TimeSpan(default_days.min(max_days)),
        }
    }

    /// Query-string form: `"all"` is the maximum, a positive integer is
    /// clamped, anything else is the default.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("all") => TimeSpan(MAX_SPAN_DAYS),
            Some(value) => TimeSpan::clamp(value.parse().ok(), DEFAULT_SPAN_DAYS, MAX_SPAN_DAYS),
            None => TimeSpan::default(),
        }
    }

    /// Day count.
    pub fn as_days(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StatsConfig::default();
        assert_eq!(config.watermark_kind, "STATISTIC");
        assert_eq!(config.live_window_secs, 86_400);
        assert_eq!(config.default_days, 365);
        assert_eq!(config.max_days, 730);
    }

    #[test]
    fn test_testing_config() {
        let config = StatsConfig::for_testing().with_live_window_secs(60);
        assert_eq!(config.live_window_secs, 60);
        assert_eq!(config.span(None).as_days(), 7);
        assert_eq!(config.span(Some(1_000)).as_days(), 30);
    }

    #[test]
    fn test_time_span_parse() {
        assert_eq!(TimeSpan::parse(Some("all")).as_days(), 730);
        assert_eq!(TimeSpan::parse(Some("30")).as_days(), 30);
        assert_eq!(TimeSpan::parse(Some("5000")).as_days(), 730);
        assert_eq!(TimeSpan::parse(Some("0")).as_days(), 365);
        assert_eq!(TimeSpan::parse(Some("-3")).as_days(), 365);
        assert_eq!(TimeSpan::parse(Some("week")).as_days(), 365);
        assert_eq!(TimeSpan::parse(None).as_days(), 365);
    }

    #[test]
    fn test_config_serde() {
        let config = StatsConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: StatsConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.supply, config.supply);
        assert_eq!(back.watermark_kind, config.watermark_kind);
    }
}
