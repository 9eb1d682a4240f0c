//! Response time, throughput and error rate of applications over time.
//!
//! Points are `[unix millis, value]`; the backend reports millisecond
//! timestamps in a `ts` field, one row per sample with every metric in it.

use super::{InventoryProvider, InventoryQuery, InventorySource};
use crate::{
    catalog::{MetricCatalog, MetricDefinition},
    descriptor::Descriptor,
    error::SchemaError,
    period::Precision,
    query::RequestOptionBuilder,
    schema::{ArgumentDefinition, ArgumentSchema},
    shaper::{OutputKind, TimeAxis},
    units::UnitFamily,
};
use std::sync::Arc;

pub const NAME: &str = "app_performance";
pub const TARGET: &str = "apm/metrics";

pub fn schema(source: Arc<dyn InventorySource>) -> Result<ArgumentSchema, SchemaError> {
    let definitions = vec![
        ArgumentDefinition::list("appsysid")
            .required()
            .options(InventoryProvider::new(source.clone(), InventoryQuery::AppSystems).shared()),
        ArgumentDefinition::list("appid")
            .depends_on(["appsysid"])
            .options(
                InventoryProvider::new(source, InventoryQuery::Applications)
                    .with_all()
                    .shared(),
            ),
        ArgumentDefinition::text("period")
            .required()
            .default_value("past1hour"),
        ArgumentDefinition::number("precision")
            .validate_with(|value| {
                value
                    .as_i64()
                    .is_some_and(|seconds| Precision::from_seconds(seconds).is_ok())
            }),
    ];
    ArgumentSchema::new(definitions)
}

pub fn catalog() -> MetricCatalog {
    MetricCatalog::new(vec![
        MetricDefinition::timestamp("ts", "Time"),
        MetricDefinition::metric("total", "Transactions")
            .with_unit(UnitFamily::Count)
            .default_field(),
        MetricDefinition::duration("response_time", "Response time")
            .with_unit(UnitFamily::Milliseconds)
            .default_field(),
        MetricDefinition::metric("throughput", "Throughput").with_unit(UnitFamily::BitsPerSecond),
        MetricDefinition::metric("error_rate", "Error rate").with_unit(UnitFamily::Percent),
    ])
}

pub fn descriptor(source: Arc<dyn InventorySource>) -> Result<Descriptor, SchemaError> {
    let descriptor = Descriptor::new(
        NAME,
        1,
        TARGET,
        OutputKind::TimeSeries,
        schema(source)?,
        catalog(),
    )
    .with_request(
        RequestOptionBuilder::new()
            .filter_by("appsysid")
            .filter_by("appid")
            .supersedes("appid", "appsysid"),
    )
    .with_time_axis(TimeAxis::new("ts"))
    .with_precision_argument("precision");
    Ok(descriptor)
}
