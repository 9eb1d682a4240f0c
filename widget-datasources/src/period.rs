//! Normalization of the "period" argument into an absolute time window.

use crate::{error::PeriodError, settings::Settings, types::ArgValue};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Numeric period value meaning "use the dashboard's time range".
pub const INHERIT_PERIOD: i64 = 1;

/// Sampling granularities supported by the metric backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Precision {
    Second,
    TenSeconds,
    Minute,
    FiveMinutes,
    Hour,
    Day,
}

impl Precision {
    /// Finest first.
    pub const ALL: [Precision; 6] = [
        Precision::Second,
        Precision::TenSeconds,
        Precision::Minute,
        Precision::FiveMinutes,
        Precision::Hour,
        Precision::Day,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            Precision::Second => 1,
            Precision::TenSeconds => 10,
            Precision::Minute => 60,
            Precision::FiveMinutes => 300,
            Precision::Hour => 3600,
            Precision::Day => 86400,
        }
    }

    pub fn from_seconds(seconds: i64) -> Result<Self, PeriodError> {
        Self::ALL
            .into_iter()
            .find(|p| p.seconds() == seconds)
            .ok_or(PeriodError::UnsupportedPrecision(seconds))
    }
}

impl From<Precision> for i64 {
    fn from(value: Precision) -> Self {
        value.seconds()
    }
}

impl TryFrom<i64> for Precision {
    type Error = PeriodError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_seconds(value)
    }
}

/// Absolute time range in unix milliseconds, `start_ms` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, PeriodError> {
        if start_ms >= end_ms {
            return Err(PeriodError::EmptyWindow { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub fn width_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Like [`TimeRange::new`], but both bounds must also be valid
    /// calendar timestamps.
    pub fn representable(start_ms: i64, end_ms: i64) -> Result<Self, PeriodError> {
        if let Some(ms) = [start_ms, end_ms]
            .into_iter()
            .find(|ms| DateTime::from_timestamp_millis(*ms).is_none())
        {
            return Err(PeriodError::OutOfRange(ms));
        }
        Self::new(start_ms, end_ms)
    }
}

/// Resolved query window. `start_ms < end_ms` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start_ms: i64,
    pub end_ms: i64,
    pub precision: Precision,
}

impl PeriodWindow {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start_ms: self.start_ms,
            end_ms: self.end_ms,
        }
    }

    pub fn start_secs(&self) -> i64 {
        self.start_ms.div_euclid(1000)
    }

    pub fn end_secs(&self) -> i64 {
        self.end_ms.div_euclid(1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeRange {
    /// The given duration back from now.
    Past(Duration),
    /// Local midnight until now.
    Today,
    /// The whole previous local day.
    Yesterday,
}

impl RelativeRange {
    pub fn from_token(token: &str) -> Option<Self> {
        let past = |d: Duration| Some(RelativeRange::Past(d));
        match token {
            "past5minutes" => past(Duration::minutes(5)),
            "past15minutes" => past(Duration::minutes(15)),
            "past30minutes" => past(Duration::minutes(30)),
            "past1hour" => past(Duration::hours(1)),
            "past3hours" => past(Duration::hours(3)),
            "past6hours" => past(Duration::hours(6)),
            "past12hours" => past(Duration::hours(12)),
            "past24hours" | "past1day" => past(Duration::days(1)),
            "past2days" => past(Duration::days(2)),
            "past7days" | "past1week" => past(Duration::days(7)),
            "past30days" | "past1month" => past(Duration::days(30)),
            "today" => Some(RelativeRange::Today),
            "yesterday" => Some(RelativeRange::Yesterday),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodValue {
    /// Milliseconds back from now.
    Duration(i64),
    Inherit,
    Relative(RelativeRange),
}

impl PeriodValue {
    pub fn parse(value: &ArgValue) -> Result<Self, PeriodError> {
        match value {
            ArgValue::Number(n) => Self::from_millis(*n),
            ArgValue::Text(s) => match s.trim().parse::<i64>() {
                Ok(n) => Self::from_millis(n),
                Err(_) => RelativeRange::from_token(s.trim())
                    .map(PeriodValue::Relative)
                    .ok_or_else(|| PeriodError::UnknownRange(s.clone())),
            },
            ArgValue::List(_) => Err(PeriodError::InvalidType),
        }
    }

    fn from_millis(value: i64) -> Result<Self, PeriodError> {
        match value {
            INHERIT_PERIOD => Ok(PeriodValue::Inherit),
            d if d > 0 => Ok(PeriodValue::Duration(d)),
            d => Err(PeriodError::NonPositiveDuration(d)),
        }
    }
}

/// Turns period values into windows with a bounded number of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodResolver {
    max_samples: i64,
    offset: FixedOffset,
}

impl PeriodResolver {
    pub fn new(max_samples: u32, offset: FixedOffset) -> Self {
        Self {
            max_samples: i64::from(max_samples.max(1)),
            offset,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.max_samples, settings.utc_offset())
    }

    /// Finest supported precision that keeps the window within
    /// `max_samples` samples; the coarsest one if none does.
    pub fn derive_precision(&self, range: TimeRange) -> Precision {
        let width = range.width_ms();
        Precision::ALL
            .into_iter()
            .find(|p| {
                let step = p.seconds() * 1000;
                let samples = width / step + i64::from(width % step != 0);
                samples <= self.max_samples
            })
            .unwrap_or(Precision::Day)
    }

    pub fn resolve(
        &self,
        period: PeriodValue,
        ambient: Option<TimeRange>,
        precision: Option<Precision>,
        now: DateTime<Utc>,
    ) -> Result<PeriodWindow, PeriodError> {
        let range = match period {
            PeriodValue::Duration(d) => {
                let end = now.timestamp_millis();
                TimeRange::representable(end.saturating_sub(d), end)?
            }
            PeriodValue::Inherit => {
                let ambient = ambient.ok_or(PeriodError::MissingAmbient)?;
                TimeRange::representable(ambient.start_ms, ambient.end_ms)?
            }
            PeriodValue::Relative(relative) => self.relative_range(relative, now)?,
        };
        let precision = precision.unwrap_or_else(|| self.derive_precision(range));
        Ok(PeriodWindow {
            start_ms: range.start_ms,
            end_ms: range.end_ms,
            precision,
        })
    }

    fn relative_range(
        &self,
        relative: RelativeRange,
        now: DateTime<Utc>,
    ) -> Result<TimeRange, PeriodError> {
        let end = now.timestamp_millis();
        match relative {
            RelativeRange::Past(d) => TimeRange::new(end - d.num_milliseconds(), end),
            RelativeRange::Today => TimeRange::new(self.local_midnight(now), end),
            RelativeRange::Yesterday => {
                let midnight = self.local_midnight(now);
                TimeRange::new(midnight - Duration::days(1).num_milliseconds(), midnight)
            }
        }
    }

    fn local_midnight(&self, now: DateTime<Utc>) -> i64 {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let midnight = local_date.and_time(NaiveTime::default());
        // fixed offsets have no gaps, so the mapping is always unique
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    const T: i64 = 1_700_000_000_000;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[fixture]
    fn resolver() -> PeriodResolver {
        PeriodResolver::new(720, FixedOffset::east_opt(8 * 3600).unwrap())
    }

    #[rstest]
    fn duration_window_ends_now(resolver: PeriodResolver) {
        let window = resolver
            .resolve(PeriodValue::Duration(300000), None, None, at(T))
            .unwrap();
        assert_eq!((window.start_ms, window.end_ms), (T - 300000, T));
        assert_eq!(window.precision, Precision::Second);
    }

    #[rstest]
    fn inherit_copies_ambient_range(resolver: PeriodResolver) {
        let ambient = TimeRange::new(T - 86_400_000, T - 3_600_000).unwrap();
        let window = resolver
            .resolve(
                PeriodValue::parse(&ArgValue::Number(1)).unwrap(),
                Some(ambient),
                None,
                at(T),
            )
            .unwrap();
        assert_eq!(window.range(), ambient);

        assert_eq!(
            resolver.resolve(PeriodValue::Inherit, None, None, at(T)),
            Err(PeriodError::MissingAmbient)
        );
    }

    #[rstest]
    fn named_tokens(resolver: PeriodResolver) {
        let window = resolver
            .resolve(
                PeriodValue::parse(&ArgValue::text("past1hour")).unwrap(),
                None,
                None,
                at(T),
            )
            .unwrap();
        assert_eq!((window.start_ms, window.end_ms), (T - 3_600_000, T));
        assert_eq!(window.precision, Precision::TenSeconds);

        assert_eq!(
            PeriodValue::parse(&ArgValue::text("past1fortnight")),
            Err(PeriodError::UnknownRange("past1fortnight".into()))
        );
        assert_eq!(
            PeriodValue::parse(&ArgValue::text("600000")),
            Ok(PeriodValue::Duration(600000))
        );
    }

    #[rstest]
    fn calendar_tokens_use_local_midnight(resolver: PeriodResolver) {
        // 2023-11-14T22:13:20Z is 2023-11-15T06:13:20+08:00
        let local_midnight = 1_699_977_600_000; // 2023-11-15T00:00:00+08:00
        let today = resolver
            .resolve(PeriodValue::Relative(RelativeRange::Today), None, None, at(T))
            .unwrap();
        assert_eq!((today.start_ms, today.end_ms), (local_midnight, T));

        let yesterday = resolver
            .resolve(
                PeriodValue::Relative(RelativeRange::Yesterday),
                None,
                None,
                at(T),
            )
            .unwrap();
        assert_eq!(
            (yesterday.start_ms, yesterday.end_ms),
            (local_midnight - 86_400_000, local_midnight)
        );
    }

    #[rstest]
    #[case(300_000, Precision::Second)]
    #[case(3_600_000, Precision::TenSeconds)]
    #[case(43_200_000, Precision::Minute)]
    #[case(86_400_000, Precision::FiveMinutes)]
    #[case(30 * 86_400_000, Precision::Hour)]
    #[case(365 * 86_400_000, Precision::Day)]
    #[case(5000 * 86_400_000, Precision::Day)]
    #[case(i64::MAX, Precision::Day)]
    fn precision_keeps_samples_bounded(
        resolver: PeriodResolver,
        #[case] width: i64,
        #[case] expected: Precision,
    ) {
        let range = TimeRange::new(T.saturating_sub(width), T).unwrap();
        assert_eq!(resolver.derive_precision(range), expected);
    }

    #[rstest]
    fn extreme_windows_are_rejected(resolver: PeriodResolver) {
        let widest = TimeRange::new(-1, i64::MAX - 10).unwrap();
        assert_eq!(resolver.derive_precision(widest), Precision::Day);
        assert_eq!(
            resolver.resolve(PeriodValue::Inherit, Some(widest), None, at(T)),
            Err(PeriodError::OutOfRange(i64::MAX - 10))
        );

        let far_back = PeriodValue::parse(&ArgValue::text(i64::MAX.to_string())).unwrap();
        assert_eq!(far_back, PeriodValue::Duration(i64::MAX));
        assert_eq!(
            resolver.resolve(far_back, None, None, at(T)),
            Err(PeriodError::OutOfRange(T - i64::MAX))
        );
    }

    #[rstest]
    fn explicit_precision_wins(resolver: PeriodResolver) {
        let window = resolver
            .resolve(
                PeriodValue::Duration(300000),
                None,
                Some(Precision::Minute),
                at(T),
            )
            .unwrap();
        assert_eq!(window.precision, Precision::Minute);
        assert_eq!(
            Precision::from_seconds(42),
            Err(PeriodError::UnsupportedPrecision(42))
        );
    }

    #[rstest]
    #[case(ArgValue::Number(0), PeriodError::NonPositiveDuration(0))]
    #[case(ArgValue::Number(-5), PeriodError::NonPositiveDuration(-5))]
    #[case(ArgValue::list(["1"]), PeriodError::InvalidType)]
    fn invalid_periods(#[case] value: ArgValue, #[case] expected: PeriodError) {
        assert_eq!(PeriodValue::parse(&value), Err(expected));
    }

    #[test]
    fn precision_serializes_as_seconds() {
        assert_eq!(serde_json::to_value(Precision::FiveMinutes).unwrap(), 300);
        let parsed: Precision = serde_json::from_value(serde_json::json!(3600)).unwrap();
        assert_eq!(parsed, Precision::Hour);
    }
}
