//! Traffic totals of a capture interface, optionally split by VLAN or site.
//!
//! Selectors cascade control node -> probe -> interface -> VLAN / site.
//! The traffic backend takes split `start_time`/`end_time` windows.

use super::{InventoryProvider, InventoryQuery, InventorySource};
use crate::{
    catalog::{MetricCatalog, MetricDefinition},
    descriptor::Descriptor,
    error::SchemaError,
    query::{RequestOptionBuilder, WindowConvention},
    schema::{ArgumentDefinition, ArgumentSchema},
    shaper::OutputKind,
    types::{ArgValue, ResolvedArgs},
};
use std::sync::Arc;

pub const NAME: &str = "network_traffic";
pub const TARGET: &str = "npm/traffic";

fn no_interface(resolved: &ResolvedArgs, _: Option<&ArgValue>) -> bool {
    resolved.get("interface").map_or(true, ArgValue::is_unfiltered)
}

pub fn schema(source: Arc<dyn InventorySource>) -> Result<ArgumentSchema, SchemaError> {
    let provider = |query| InventoryProvider::new(source.clone(), query);
    ArgumentSchema::new(vec![
        ArgumentDefinition::text("ctrl_node")
            .required()
            .options(provider(InventoryQuery::ControlNodes).shared()),
        ArgumentDefinition::text("probe")
            .depends_on(["ctrl_node"])
            .options(provider(InventoryQuery::Probes).with_all().shared()),
        ArgumentDefinition::text("interface")
            .depends_on(["ctrl_node", "probe"])
            .hide_when(|resolved, _| resolved.get("probe").map_or(true, ArgValue::is_unfiltered))
            .options(provider(InventoryQuery::Interfaces).with_all().shared()),
        ArgumentDefinition::list("vlan")
            .depends_on(["interface"])
            .hide_when(no_interface)
            .options(provider(InventoryQuery::Vlans).with_all().shared()),
        ArgumentDefinition::list("site")
            .depends_on(["interface"])
            .hide_when(no_interface)
            .options(provider(InventoryQuery::Sites).with_all().shared()),
        ArgumentDefinition::text("period")
            .required()
            .default_value("past1hour"),
    ])
}

pub fn catalog() -> MetricCatalog {
    MetricCatalog::new(vec![
        MetricDefinition::dimension("vlan", "VLAN"),
        MetricDefinition::dimension("site", "Site"),
        MetricDefinition::dimension("probe", "Probe"),
        MetricDefinition::metric("bytes", "Traffic")
            .with_suffix("B")
            .default_field(),
        MetricDefinition::metric("packets", "Packets").default_field(),
        MetricDefinition::metric("retrans_rate", "Retransmission rate").with_suffix("%"),
        MetricDefinition::duration("rtt", "Round trip time"),
    ])
}

pub fn descriptor(source: Arc<dyn InventorySource>) -> Result<Descriptor, SchemaError> {
    let descriptor = Descriptor::new(
        NAME,
        1,
        TARGET,
        OutputKind::PartitionedAggregate,
        schema(source)?,
        catalog(),
    )
    .with_request(
        RequestOptionBuilder::new()
            .window_convention(WindowConvention::Split)
            .filter_by("ctrl_node")
            .filter_by("probe")
            .filter_by("interface")
            .filter_by("vlan")
            .filter_by("site")
            .default_sort("-bytes"),
    );
    Ok(descriptor)
}
