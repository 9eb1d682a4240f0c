use super::{as_f64, as_i64, rows, ShapeContext};
use crate::{
    catalog::FieldKind,
    units::{format_duration_ms, format_timestamp},
};
use serde_json::{Map, Value};

pub type RawRow = Map<String, Value>;

/// Rows restricted to `fields` (all fields when none are requested) with
/// timestamps, durations and identifiers rendered for display.
pub(super) fn shape(data: &Value, fields: &[String], context: &ShapeContext<'_>) -> Vec<RawRow> {
    rows(data)
        .into_iter()
        .map(|row| {
            if fields.is_empty() {
                row.iter()
                    .map(|(field, raw)| (field.clone(), render(field, Some(raw), context)))
                    .collect()
            } else {
                fields
                    .iter()
                    .map(|field| (field.clone(), render(field, row.get(field), context)))
                    .collect()
            }
        })
        .collect()
}

fn render(field: &str, raw: Option<&Value>, context: &ShapeContext<'_>) -> Value {
    let kind = context.catalog.get(field).map(|d| d.kind);
    match kind {
        Some(FieldKind::Timestamp) => match raw.and_then(as_i64) {
            Some(ts) => Value::String(format_timestamp(
                ts,
                context.time.raw_unit,
                context.offset,
                context.timestamp_format,
            )),
            None => Value::String(String::new()),
        },
        Some(FieldKind::Duration) => {
            Value::String(format_duration_ms(raw.and_then(as_f64).unwrap_or_default()))
        }
        Some(FieldKind::Metric) => match raw {
            Some(value) if as_f64(value).is_some() => value.clone(),
            _ => Value::from(0),
        },
        Some(FieldKind::Dimension | FieldKind::Text) | None => match raw {
            Some(Value::Null) | None => Value::String(String::new()),
            Some(value) => context.enrich(field, value).unwrap_or_else(|| value.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        super::{test_utils::*, TimeAxis},
        *,
    };
    use crate::{
        catalog::{LabelLookups, MetricCatalog, MetricDefinition},
        units::TimestampUnit,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            MetricDefinition::timestamp("ts", "Time"),
            MetricDefinition::text("appsysid", "System").with_lookup("appsys"),
            MetricDefinition::duration("duration", "Duration"),
            MetricDefinition::metric("bytes", "Bytes"),
            MetricDefinition::text("status", "Status"),
        ])
    }

    #[test]
    fn rows_are_enriched() {
        let catalog = catalog();
        let lookups = LabelLookups::new().with_table("appsys", [("S1", "Payments")]);
        let time = TimeAxis::default().raw_unit(TimestampUnit::Seconds);
        let context = context(&catalog, &lookups, &time);
        let data = json!({"rows": [
            {"ts": 1_700_000_000, "appsysid": "S1", "duration": 850, "bytes": 10, "status": "ok"},
            {"ts": "bad", "appsysid": "S9", "duration": 125_000, "status": null},
        ]});

        let rows = shape(
            &data,
            &names(&["ts", "appsysid", "duration", "bytes", "status"]),
            &context,
        );

        assert_eq!(
            serde_json::to_value(&rows).unwrap(),
            json!([
                {"ts": "2023-11-15 06:13:20", "appsysid": "Payments", "duration": "850ms", "bytes": 10, "status": "ok"},
                {"ts": "", "appsysid": "S9", "duration": "2min 5s", "bytes": 0, "status": ""},
            ])
        );
    }

    #[test]
    fn no_requested_fields_keeps_every_field() {
        let catalog = catalog();
        let lookups = LabelLookups::new();
        let time = TimeAxis::default();
        let context = context(&catalog, &lookups, &time);

        let rows = shape(&json!([{"extra": true, "duration": 1500}]), &[], &context);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["extra"], json!(true));
        assert_eq!(rows[0]["duration"], json!("1.5s"));
    }
}
