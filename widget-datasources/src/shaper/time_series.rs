use super::{as_f64, as_i64, json_number, rows, ShapeContext};
use crate::{catalog::MetricDefinition, units::DisplayUnit};
use serde::{ser::SerializeTuple, Serialize, Serializer};
use serde_json::{Map, Value};

/// `[timestamp, value]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp: i64,
    pub value: f64,
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&json_number(self.value))?;
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub label: String,
    /// Unit the values are scaled to; `raw = value * unit.proportion`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<DisplayUnit>,
    pub data: Vec<Point>,
}

impl Series {
    pub fn timestamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.data.iter().map(|p| p.timestamp)
    }
}

/// Requested fields that can be charted over time.
fn metrics<'f>(fields: &'f [String], context: &ShapeContext<'_>) -> Vec<&'f String> {
    fields
        .iter()
        .filter(|name| *name != &context.time.field)
        .filter(|name| {
            context
                .catalog
                .get(name)
                .map_or(true, MetricDefinition::is_numeric)
        })
        .collect()
}

pub(super) fn shape(data: &Value, fields: &[String], context: &ShapeContext<'_>) -> Vec<Series> {
    let metrics = metrics(fields, context);
    let raw_points: Vec<(&String, Vec<Point>)> = match per_metric_map(data, &metrics) {
        Some(map) => metrics
            .iter()
            .map(|metric| (*metric, map_points(map.get(metric.as_str()), context)))
            .collect(),
        None => {
            let rows = rows(data);
            metrics
                .iter()
                .map(|metric| (*metric, row_points(&rows, metric, context)))
                .collect()
        }
    };

    raw_points
        .into_iter()
        .map(|(metric, points)| scale(metric, points, context))
        .collect()
}

/// `{metric: [...]}` payloads where each metric carries its own points.
fn per_metric_map<'d>(data: &'d Value, metrics: &[&String]) -> Option<&'d Map<String, Value>> {
    let object = data.as_object()?;
    let is_map = !object.contains_key("rows")
        && metrics
            .iter()
            .any(|metric| matches!(object.get(metric.as_str()), Some(Value::Array(_))));
    is_map.then_some(object)
}

fn timestamp(raw: &Value, context: &ShapeContext<'_>) -> Option<i64> {
    let axis = context.time;
    as_i64(raw).map(|ts| axis.raw_unit.convert(ts, axis.output_unit))
}

fn row_points(
    rows: &[&Map<String, Value>],
    metric: &str,
    context: &ShapeContext<'_>,
) -> Vec<Point> {
    rows.iter()
        .filter_map(|row| {
            let timestamp = timestamp(row.get(&context.time.field)?, context)?;
            let value = match row.get(metric).and_then(as_f64) {
                Some(value) => value,
                None if context.time.aligned => 0.0,
                None => return None,
            };
            Some(Point { timestamp, value })
        })
        .collect()
}

/// Entries are either `{<time field>: ts, value: v}` objects or `[ts, v]` pairs.
fn map_points(entries: Option<&Value>, context: &ShapeContext<'_>) -> Vec<Point> {
    let Some(Value::Array(entries)) = entries else {
        return vec![];
    };
    entries
        .iter()
        .filter_map(|entry| {
            let (raw_ts, raw_value) = match entry {
                Value::Array(pair) if pair.len() == 2 => (&pair[0], Some(&pair[1])),
                Value::Object(object) => (object.get(&context.time.field)?, object.get("value")),
                _ => return None,
            };
            let timestamp = timestamp(raw_ts, context)?;
            let value = match raw_value.and_then(as_f64) {
                Some(value) => value,
                None if context.time.aligned => 0.0,
                None => return None,
            };
            Some(Point { timestamp, value })
        })
        .collect()
}

/// Pick one display unit from the series maximum and scale every point by it.
fn scale(metric: &str, points: Vec<Point>, context: &ShapeContext<'_>) -> Series {
    let definition = context.catalog.get(metric);
    let unit = definition.and_then(|d| d.unit).map(|family| {
        let max = points
            .iter()
            .map(|p| p.value.abs())
            .fold(0.0_f64, f64::max);
        family.fit(max)
    });
    let data = match unit {
        Some(unit) if unit.proportion != 1.0 => points
            .into_iter()
            .map(|p| Point {
                timestamp: p.timestamp,
                value: p.value / unit.proportion,
            })
            .collect(),
        _ => points,
    };
    Series {
        name: metric.to_owned(),
        label: context.catalog.label(metric).to_owned(),
        unit,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{test_utils::*, TimeAxis},
        *,
    };
    use crate::{
        catalog::{LabelLookups, MetricCatalog},
        units::{TimestampUnit, UnitFamily},
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            MetricDefinition::metric("total", "Total").with_unit(UnitFamily::Bytes),
            MetricDefinition::metric("count", "Count"),
            MetricDefinition::dimension("site", "Site"),
        ])
    }

    #[test]
    fn one_unit_per_series_from_its_maximum() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::new("utc");
        let context = context(&catalog, &lookups, &time);
        let raw = [1000.0, 2_000_000.0];
        let data = json!([{"utc": 1, "total": 1000}, {"utc": 2, "total": 2_000_000}]);

        let series = shape(&data, &names(&["total"]), &context);

        assert_eq!(series.len(), 1);
        let unit = series[0].unit.unwrap();
        assert_eq!(unit.name, "MB");
        for (point, raw) in series[0].data.iter().zip(raw) {
            assert!((point.value * unit.proportion - raw).abs() < 1e-6);
        }
        assert_eq!(series[0].timestamps().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn aligned_rows_fill_gaps_with_zero() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::default();
        let context = context(&catalog, &lookups, &time);
        let data = json!([
            {"ts": 100, "total": 3, "count": 1},
            {"ts": 200, "count": "2"},
            {"total": 9},
        ]);

        let series = shape(&data, &names(&["total", "count", "site"]), &context);

        assert_eq!(
            serde_json::to_value(&series).unwrap(),
            json!([
                {"name": "total", "label": "Total", "unit": {"name": "B", "proportion": 1.0}, "data": [[100, 3], [200, 0]]},
                {"name": "count", "label": "Count", "data": [[100, 1], [200, 2]]},
            ])
        );
    }

    #[test]
    fn unaligned_metrics_keep_their_own_points() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::default()
            .raw_unit(TimestampUnit::Seconds)
            .output_unit(TimestampUnit::Milliseconds)
            .unaligned();
        let context = context(&catalog, &lookups, &time);
        let data = json!({
            "total": [{"ts": 1, "value": 10}, {"ts": 2, "value": null}, {"ts": 3, "value": 30}],
            "count": [[2, 5]],
        });

        let series = shape(&data, &names(&["total", "count"]), &context);

        assert_eq!(
            series[0].timestamps().collect::<Vec<_>>(),
            vec![1000, 3000]
        );
        assert_eq!(
            series[1].data,
            vec![Point {
                timestamp: 2000,
                value: 5.0
            }]
        );
    }

    #[test]
    fn end_to_end_point_renders_as_pair() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::default();
        let context = context(&catalog, &lookups, &time);

        let series = shape(&json!([{"ts": 100, "total": 3}]), &names(&["total"]), &context);

        assert_eq!(
            serde_json::to_value(&series[0].data).unwrap(),
            json!([[100, 3]])
        );
    }

    #[test]
    fn garbage_payload_yields_empty_series() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::default();
        let context = context(&catalog, &lookups, &time);

        let series = shape(&json!("oops"), &names(&["total"]), &context);
        assert_eq!(series.len(), 1);
        assert!(series[0].data.is_empty());
        assert_eq!(series[0].unit.map(|u| u.name), Some("B"));
    }
}
