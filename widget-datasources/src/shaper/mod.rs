//! Reshaping of raw backend payloads into the contracts consumed by charts.
//!
//! Every shaper is a pure function of the payload and the [`ShapeContext`];
//! missing or malformed values degrade to `0` or `""` instead of failing.

mod aggregate;
mod raw_table;
mod time_series;

pub use aggregate::{AggregateResult, AggregateSlot, AggregateValues, PARTITION_KEYS, Partition};
pub use raw_table::RawRow;
pub use time_series::{Point, Series};

use crate::{
    catalog::{LabelLookups, MetricCatalog},
    settings::Settings,
    units::TimestampUnit,
};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    TimeSeries,
    PartitionedAggregate,
    RawTable,
}

/// Exactly one of the canonical chart shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShapedResult {
    TimeSeries(Vec<Series>),
    PartitionedAggregate(AggregateResult),
    RawTable(Vec<RawRow>),
}

impl ShapedResult {
    pub fn empty(kind: OutputKind) -> Self {
        match kind {
            OutputKind::TimeSeries => ShapedResult::TimeSeries(vec![]),
            OutputKind::PartitionedAggregate => {
                ShapedResult::PartitionedAggregate(AggregateResult::default())
            }
            OutputKind::RawTable => ShapedResult::RawTable(vec![]),
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            ShapedResult::TimeSeries(_) => OutputKind::TimeSeries,
            ShapedResult::PartitionedAggregate(_) => OutputKind::PartitionedAggregate,
            ShapedResult::RawTable(_) => OutputKind::RawTable,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ShapedResult::TimeSeries(series) => series.is_empty(),
            ShapedResult::PartitionedAggregate(aggregate) => aggregate.is_empty(),
            ShapedResult::RawTable(rows) => rows.is_empty(),
        }
    }
}

/// Where the timestamp of a raw row lives and in which unit it is on
/// either side of the shaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAxis {
    pub field: String,
    pub raw_unit: TimestampUnit,
    pub output_unit: TimestampUnit,
    /// The backend returns one row per timestamp with every metric in it,
    /// so series share one axis and gaps are filled with `0`.
    pub aligned: bool,
}

impl TimeAxis {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            raw_unit: TimestampUnit::Milliseconds,
            output_unit: TimestampUnit::Milliseconds,
            aligned: true,
        }
    }

    pub fn raw_unit(mut self, unit: TimestampUnit) -> Self {
        self.raw_unit = unit;
        self
    }

    pub fn output_unit(mut self, unit: TimestampUnit) -> Self {
        self.output_unit = unit;
        self
    }

    pub fn unaligned(mut self) -> Self {
        self.aligned = false;
        self
    }
}

impl Default for TimeAxis {
    fn default() -> Self {
        Self::new("ts")
    }
}

/// Static inputs of one shaping call.
#[derive(Debug, Clone, Copy)]
pub struct ShapeContext<'a> {
    pub catalog: &'a MetricCatalog,
    pub lookups: &'a LabelLookups,
    pub time: &'a TimeAxis,
    pub decimals: u32,
    pub offset: FixedOffset,
    pub timestamp_format: &'a str,
}

impl<'a> ShapeContext<'a> {
    pub fn new(
        catalog: &'a MetricCatalog,
        lookups: &'a LabelLookups,
        time: &'a TimeAxis,
        settings: &'a Settings,
    ) -> Self {
        Self {
            catalog,
            lookups,
            time,
            decimals: settings.decimals,
            offset: settings.utc_offset(),
            timestamp_format: &settings.timestamp_format,
        }
    }

    /// Display name for `raw` if `field` declares a lookup table holding it.
    fn enrich(&self, field: &str, raw: &Value) -> Option<Value> {
        let table = self.catalog.get(field)?.lookup.as_deref()?;
        let id = value_key(raw)?;
        self.lookups
            .display_name(table, &id)
            .map(|name| Value::String(name.to_owned()))
    }
}

/// Shape `data` (the `data` member of a successful backend response).
///
/// `fields` are the requested fields, `group_by` the requested dimensions.
pub fn shape(
    kind: OutputKind,
    data: &Value,
    fields: &[String],
    group_by: &[String],
    context: &ShapeContext<'_>,
) -> ShapedResult {
    match kind {
        OutputKind::TimeSeries => {
            ShapedResult::TimeSeries(time_series::shape(data, fields, context))
        }
        OutputKind::PartitionedAggregate => ShapedResult::PartitionedAggregate(
            aggregate::shape(data, fields, group_by, context),
        ),
        OutputKind::RawTable => ShapedResult::RawTable(raw_table::shape(data, fields, context)),
    }
}

/// Row objects of a payload: an array of rows, an object wrapping one under
/// `rows`, or a single row object.
fn rows(data: &Value) -> Vec<&Map<String, Value>> {
    match data {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(object) => match object.get("rows") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            _ => vec![object],
        },
        _ => vec![],
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integral values become JSON integers, so `3.0` renders as `3`.
fn json_number(value: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
