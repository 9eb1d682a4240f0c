//! Individual transactions of applications, one page at a time.

use super::{
    InventoryProvider, InventoryQuery, InventorySource, APPLICATION_TABLE, APP_SYSTEM_TABLE,
};
use crate::{
    catalog::{MetricCatalog, MetricDefinition},
    descriptor::Descriptor,
    error::SchemaError,
    query::RequestOptionBuilder,
    schema::{provider_fn, ArgumentDefinition, ArgumentSchema},
    shaper::{OutputKind, TimeAxis},
    types::OptionItem,
    units::TimestampUnit,
};
use std::sync::Arc;

pub const NAME: &str = "transaction_log";
pub const TARGET: &str = "apm/transactions";

pub const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 1000;

pub fn schema(source: Arc<dyn InventorySource>) -> Result<ArgumentSchema, SchemaError> {
    ArgumentSchema::new(vec![
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
        ArgumentDefinition::text("status").options(provider_fn(|_| async {
            Ok::<_, anyhow::Error>(vec![
                OptionItem::all(),
                OptionItem::new("Success", "success"),
                OptionItem::new("Failed", "failed"),
            ])
        })),
        ArgumentDefinition::text("period")
            .required()
            .default_value("past15minutes"),
        ArgumentDefinition::text("sort"),
        ArgumentDefinition::number("limit")
            .default_value(DEFAULT_PAGE_SIZE)
            .validate_with(|value| {
                value
                    .as_i64()
                    .is_some_and(|limit| (1..=MAX_PAGE_SIZE).contains(&limit))
            }),
        ArgumentDefinition::number("skip")
            .default_value(0)
            .validate_with(|value| value.as_i64().is_some_and(|skip| skip >= 0)),
    ])
}

pub fn catalog() -> MetricCatalog {
    MetricCatalog::new(vec![
        MetricDefinition::timestamp("ts", "Time").default_field(),
        MetricDefinition::text("appsysid", "Application system")
            .with_lookup(APP_SYSTEM_TABLE)
            .default_field(),
        MetricDefinition::text("appid", "Application")
            .with_lookup(APPLICATION_TABLE)
            .default_field(),
        MetricDefinition::text("trans_type", "Transaction type").default_field(),
        MetricDefinition::duration("duration", "Duration").default_field(),
        MetricDefinition::text("status", "Status").default_field(),
        MetricDefinition::metric("bytes", "Bytes"),
        MetricDefinition::text("client_ip", "Client"),
    ])
}

pub fn descriptor(source: Arc<dyn InventorySource>) -> Result<Descriptor, SchemaError> {
    let descriptor = Descriptor::new(
        NAME,
        1,
        TARGET,
        OutputKind::RawTable,
        schema(source)?,
        catalog(),
    )
    .with_request(
        RequestOptionBuilder::new()
            .filter_by("appsysid")
            .filter_by("appid")
            .filter_by("status")
            .supersedes("appid", "appsysid")
            .sort_argument("sort")
            .default_sort("-ts")
            .pagination("limit", "skip"),
    )
    .with_time_axis(TimeAxis::new("ts").raw_unit(TimestampUnit::Seconds));
    Ok(descriptor)
}
