//! Display units and value formatting.

use chrono::{DateTime, FixedOffset};
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal, RoundingStrategy,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    Bytes,
    BitsPerSecond,
    Count,
    Milliseconds,
    Percent,
}

/// A unit a series is rendered in. `raw = displayed * proportion`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayUnit {
    pub name: &'static str,
    pub proportion: f64,
}

const fn unit(name: &'static str, proportion: f64) -> DisplayUnit {
    DisplayUnit { name, proportion }
}

const KIB: f64 = 1024.0;

const BYTES: [DisplayUnit; 5] = [
    unit("B", 1.0),
    unit("KB", KIB),
    unit("MB", KIB * KIB),
    unit("GB", KIB * KIB * KIB),
    unit("TB", KIB * KIB * KIB * KIB),
];
const BITS_PER_SECOND: [DisplayUnit; 4] = [
    unit("bps", 1.0),
    unit("Kbps", 1e3),
    unit("Mbps", 1e6),
    unit("Gbps", 1e9),
];
const COUNT: [DisplayUnit; 4] = [unit("", 1.0), unit("K", 1e3), unit("M", 1e6), unit("B", 1e9)];
const MILLISECONDS: [DisplayUnit; 4] = [
    unit("ms", 1.0),
    unit("s", 1e3),
    unit("min", 6e4),
    unit("h", 3.6e6),
];
const PERCENT: [DisplayUnit; 1] = [unit("%", 1.0)];

impl UnitFamily {
    /// Units of the family, smallest first.
    pub fn ladder(self) -> &'static [DisplayUnit] {
        match self {
            UnitFamily::Bytes => &BYTES,
            UnitFamily::BitsPerSecond => &BITS_PER_SECOND,
            UnitFamily::Count => &COUNT,
            UnitFamily::Milliseconds => &MILLISECONDS,
            UnitFamily::Percent => &PERCENT,
        }
    }

    pub fn base(self) -> DisplayUnit {
        self.ladder()[0]
    }

    /// Largest unit whose proportion does not exceed `max`, so that the
    /// scaled maximum lands in `[1, next step)`.
    pub fn fit(self, max: f64) -> DisplayUnit {
        let max = if max.is_finite() { max.abs() } else { 0.0 };
        self.ladder()
            .iter()
            .rev()
            .find(|u| max >= u.proportion)
            .copied()
            .unwrap_or_else(|| self.base())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampUnit {
    Seconds,
    #[default]
    Milliseconds,
}

impl TimestampUnit {
    pub fn to_millis(self, value: i64) -> i64 {
        match self {
            TimestampUnit::Seconds => value.saturating_mul(1000),
            TimestampUnit::Milliseconds => value,
        }
    }

    pub fn from_millis(self, millis: i64) -> i64 {
        match self {
            TimestampUnit::Seconds => millis.div_euclid(1000),
            TimestampUnit::Milliseconds => millis,
        }
    }

    pub fn convert(self, value: i64, into: TimestampUnit) -> i64 {
        into.from_millis(self.to_millis(value))
    }
}

/// Round half away from zero to `decimals` places.
pub fn round(value: f64, decimals: u32) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Round half away from zero to `decimals` places and drop trailing zeros:
/// `5.0 -> "5"`, `1.256 -> "1.26"`.
pub fn format_number(value: f64, decimals: u32) -> String {
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string(),
        None => value.to_string(),
    }
}

/// `850 -> "850ms"`, `1500 -> "1.5s"`, `125000 -> "2min 5s"`, `7260000 -> "2h 1min"`.
pub fn format_duration_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return ms.to_string();
    }
    // tiers are chosen on the value as it will be printed
    let rounded = round(ms.abs(), 2);
    let sign = if ms < 0.0 && rounded > 0.0 { "-" } else { "" };
    if rounded < 1e3 {
        return format!("{sign}{}ms", format_number(rounded, 2));
    }
    let secs = round(rounded / 1e3, 2);
    if secs < 60.0 {
        return format!("{sign}{}s", format_number(secs, 2));
    }
    let total_secs = secs.floor() as i64;
    if total_secs < 3600 {
        format!("{sign}{}min {}s", total_secs / 60, total_secs % 60)
    } else {
        let total_mins = total_secs / 60;
        format!("{sign}{}h {}min", total_mins / 60, total_mins % 60)
    }
}

/// Render a unix timestamp in the given offset. Out-of-range values are
/// returned as the raw number.
pub fn format_timestamp(
    value: i64,
    unit: TimestampUnit,
    offset: FixedOffset,
    format: &str,
) -> String {
    match DateTime::from_timestamp_millis(unit.to_millis(value)) {
        Some(dt) => dt.with_timezone(&offset).format(format).to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(UnitFamily::Bytes, 0.0, "B")]
    #[case(UnitFamily::Bytes, 1000.0, "B")]
    #[case(UnitFamily::Bytes, 2048.0, "KB")]
    #[case(UnitFamily::Bytes, 2_000_000.0, "MB")]
    #[case(UnitFamily::Bytes, 5e12, "TB")]
    #[case(UnitFamily::BitsPerSecond, 1.2e9, "Gbps")]
    #[case(UnitFamily::Count, 999.0, "")]
    #[case(UnitFamily::Milliseconds, 90_000.0, "min")]
    #[case(UnitFamily::Percent, 99.5, "%")]
    #[case(UnitFamily::Bytes, f64::NAN, "B")]
    fn unit_fitting(#[case] family: UnitFamily, #[case] max: f64, #[case] expected: &str) {
        assert_eq!(family.fit(max).name, expected);
    }

    #[rstest]
    #[case(5.0, 2, "5")]
    #[case(1.256, 2, "1.26")]
    #[case(0.1 + 0.2, 2, "0.3")]
    #[case(-3.14159, 3, "-3.142")]
    #[case(1e6, 0, "1000000")]
    fn numbers(#[case] value: f64, #[case] decimals: u32, #[case] expected: &str) {
        assert_eq!(format_number(value, decimals), expected);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round(2.5, 0), 3.0);
        assert_eq!(round(-2.5, 0), -3.0);
        assert_eq!(round(1.005, 1), 1.0);
    }

    #[rstest]
    #[case(0.0, "0ms")]
    #[case(850.0, "850ms")]
    #[case(12.5, "12.5ms")]
    #[case(1500.0, "1.5s")]
    #[case(125_000.0, "2min 5s")]
    #[case(7_260_000.0, "2h 1min")]
    #[case(-1500.0, "-1.5s")]
    #[case(999.994, "999.99ms")]
    #[case(999.999, "1s")]
    #[case(59_999.9, "1min 0s")]
    #[case(3_599_999.9, "1h 0min")]
    #[case(-0.001, "0ms")]
    fn durations(#[case] ms: f64, #[case] expected: &str) {
        assert_eq!(format_duration_ms(ms), expected);
    }

    #[test]
    fn timestamps_use_offset() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(
            format_timestamp(
                1_700_000_000,
                TimestampUnit::Seconds,
                offset,
                "%Y-%m-%d %H:%M:%S"
            ),
            "2023-11-15 06:13:20"
        );
        assert_eq!(
            format_timestamp(
                1_700_000_000_000,
                TimestampUnit::Milliseconds,
                offset,
                "%H:%M"
            ),
            "06:13"
        );
        assert_eq!(
            TimestampUnit::Seconds.convert(100, TimestampUnit::Milliseconds),
            100_000
        );
    }
}
