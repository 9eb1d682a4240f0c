use super::{as_f64, json_number, rows, ShapeContext};
use crate::{
    catalog::FieldKind,
    units::{format_duration_ms, format_number, round},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateValues {
    pub names: Vec<String>,
    pub data: Vec<Value>,
}

/// Serializes as `{}` when empty, otherwise as `{names, data}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateSlot {
    #[serde(flatten)]
    pub values: Option<AggregateValues>,
}

/// Keys every [`Partition`] carries next to its dimensions.
pub const PARTITION_KEYS: [&str; 2] = ["names", "data"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Partition {
    /// Dimension field to (possibly enriched) dimension value.
    #[serde(flatten)]
    pub dimensions: Map<String, Value>,
    pub names: Vec<String>,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateResult {
    pub default: AggregateSlot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<Partition>>,
}

impl AggregateResult {
    pub fn is_empty(&self) -> bool {
        self.default.values.is_none() && self.group_by.as_ref().map_or(true, Vec::is_empty)
    }
}

pub(super) fn shape(
    data: &Value,
    fields: &[String],
    group_by: &[String],
    context: &ShapeContext<'_>,
) -> AggregateResult {
    let rows = rows(data);
    let names: Vec<String> = fields
        .iter()
        .filter(|field| !group_by.contains(field))
        .cloned()
        .collect();

    if group_by.is_empty() {
        let values = rows.first().map(|row| AggregateValues {
            names: names.clone(),
            data: render_values(row, &names, context),
        });
        return AggregateResult {
            default: AggregateSlot { values },
            group_by: None,
        };
    }

    let mut seen = HashSet::new();
    let partitions = rows
        .into_iter()
        .filter(|row| {
            let tuple: Vec<String> = group_by
                .iter()
                .map(|dimension| row.get(dimension).map(Value::to_string).unwrap_or_default())
                .collect();
            // a repeated tuple keeps its first row
            seen.insert(tuple)
        })
        .map(|row| Partition {
            dimensions: group_by
                .iter()
                .map(|dimension| {
                    let raw = row.get(dimension).cloned().unwrap_or(Value::Null);
                    let value = context.enrich(dimension, &raw).unwrap_or(raw);
                    (dimension.clone(), value)
                })
                .collect(),
            names: names.clone(),
            data: render_values(row, &names, context),
        })
        .collect();

    AggregateResult {
        default: AggregateSlot::default(),
        group_by: Some(partitions),
    }
}

/// Values in `names` order. Missing numbers count as `0` before any
/// suffix is appended.
fn render_values(
    row: &Map<String, Value>,
    names: &[String],
    context: &ShapeContext<'_>,
) -> Vec<Value> {
    names
        .iter()
        .map(|name| {
            let definition = context.catalog.get(name);
            let kind = definition.map_or(FieldKind::Metric, |d| d.kind);
            let raw = row.get(name);
            match kind {
                FieldKind::Metric => {
                    let value = raw.and_then(as_f64).unwrap_or_default();
                    match definition.and_then(|d| d.suffix.as_deref()) {
                        Some(suffix) => Value::String(format!(
                            "{}{suffix}",
                            format_number(value, context.decimals)
                        )),
                        None => json_number(round(value, context.decimals)),
                    }
                }
                FieldKind::Duration => {
                    Value::String(format_duration_ms(raw.and_then(as_f64).unwrap_or_default()))
                }
                FieldKind::Dimension | FieldKind::Text | FieldKind::Timestamp => {
                    let raw = raw.cloned().unwrap_or_else(|| Value::String(String::new()));
                    context.enrich(name, &raw).unwrap_or(raw)
                }
            }
        })
        .collect()
}
