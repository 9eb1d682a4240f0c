//! Built-in datasources and the inventory their selectors are filled from.

pub mod app_performance;
pub mod network_traffic;
pub mod transaction_log;

use crate::{
    catalog::LabelLookups,
    descriptor::Descriptor,
    error::{RegistryError, SchemaError},
    registry::DescriptorRegistry,
    schema::OptionProvider,
    types::{OptionItem, UpstreamValues},
};
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lookup table of application system names, keyed by system id.
pub const APP_SYSTEM_TABLE: &str = "appsys";
/// Lookup table of application names, keyed by application id.
pub const APPLICATION_TABLE: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Inventory of monitored systems and network capture points.
#[automock]
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn app_systems(&self) -> Result<Vec<Entity>, anyhow::Error>;
    async fn applications(&self, app_systems: &[String]) -> Result<Vec<Entity>, anyhow::Error>;
    async fn control_nodes(&self) -> Result<Vec<Entity>, anyhow::Error>;
    async fn probes(&self, ctrl_node: &str) -> Result<Vec<Entity>, anyhow::Error>;
    async fn interfaces(&self, ctrl_node: &str, probe: &str)
        -> Result<Vec<Entity>, anyhow::Error>;
    async fn vlans(&self, interface: &str) -> Result<Vec<Entity>, anyhow::Error>;
    async fn sites(&self, interface: &str) -> Result<Vec<Entity>, anyhow::Error>;
}

/// Which inventory listing a selector shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryQuery {
    AppSystems,
    /// upstream: application system ids
    Applications,
    ControlNodes,
    /// upstream: control node
    Probes,
    /// upstream: control node, probe
    Interfaces,
    /// upstream: interface
    Vlans,
    /// upstream: interface
    Sites,
}

/// [`OptionProvider`] backed by an [`InventorySource`].
pub struct InventoryProvider {
    source: Arc<dyn InventorySource>,
    query: InventoryQuery,
    with_all: bool,
}

impl InventoryProvider {
    pub fn new(source: Arc<dyn InventorySource>, query: InventoryQuery) -> Self {
        Self {
            source,
            query,
            with_all: false,
        }
    }

    /// Offer the "全部" option in front of the listing.
    pub fn with_all(mut self) -> Self {
        self.with_all = true;
        self
    }

    pub fn shared(self) -> Arc<dyn OptionProvider> {
        Arc::new(self)
    }

    async fn entities(&self, upstream: &UpstreamValues) -> Result<Vec<Entity>, anyhow::Error> {
        // a selector below an unset one has nothing to offer yet
        let required = |index: usize| {
            let value = upstream.text(index);
            (!value.is_empty()).then(|| value.into_owned())
        };
        match self.query {
            InventoryQuery::AppSystems => self.source.app_systems().await,
            InventoryQuery::Applications => {
                let systems = upstream
                    .get(0)
                    .map(|value| value.to_strings())
                    .unwrap_or_default();
                if systems.is_empty() {
                    return Ok(vec![]);
                }
                self.source.applications(&systems).await
            }
            InventoryQuery::ControlNodes => self.source.control_nodes().await,
            InventoryQuery::Probes => match required(0) {
                Some(node) => self.source.probes(&node).await,
                None => Ok(vec![]),
            },
            InventoryQuery::Interfaces => match (required(0), required(1)) {
                (Some(node), Some(probe)) => self.source.interfaces(&node, &probe).await,
                _ => Ok(vec![]),
            },
            InventoryQuery::Vlans => match required(0) {
                Some(interface) => self.source.vlans(&interface).await,
                None => Ok(vec![]),
            },
            InventoryQuery::Sites => match required(0) {
                Some(interface) => self.source.sites(&interface).await,
                None => Ok(vec![]),
            },
        }
    }
}

#[async_trait]
impl OptionProvider for InventoryProvider {
    async fn options(&self, upstream: &UpstreamValues) -> Result<Vec<OptionItem>, anyhow::Error> {
        let entities = self.entities(upstream).await?;
        if entities.is_empty() {
            return Ok(vec![]);
        }
        let all = self.with_all.then(OptionItem::all);
        Ok(all
            .into_iter()
            .chain(
                entities
                    .into_iter()
                    .map(|Entity { id, name }| OptionItem::new(name, id)),
            )
            .collect())
    }
}

/// Display names of application systems and applications.
pub async fn load_lookups(source: &dyn InventorySource) -> Result<LabelLookups, anyhow::Error> {
    let systems = source.app_systems().await?;
    let system_ids: Vec<String> = systems.iter().map(|s| s.id.clone()).collect();
    let applications = if system_ids.is_empty() {
        vec![]
    } else {
        source.applications(&system_ids).await?
    };
    Ok(LabelLookups::new()
        .with_table(APP_SYSTEM_TABLE, systems.into_iter().map(|e| (e.id, e.name)))
        .with_table(
            APPLICATION_TABLE,
            applications.into_iter().map(|e| (e.id, e.name)),
        ))
}

pub fn all(source: Arc<dyn InventorySource>) -> Result<Vec<Descriptor>, SchemaError> {
    Ok(vec![
        app_performance::descriptor(source.clone())?,
        network_traffic::descriptor(source.clone())?,
        transaction_log::descriptor(source)?,
    ])
}

pub fn register_all(
    registry: &mut DescriptorRegistry,
    source: Arc<dyn InventorySource>,
) -> Result<(), RegistryError> {
    for descriptor in all(source)? {
        registry.register(descriptor)?;
    }
    Ok(())
}
