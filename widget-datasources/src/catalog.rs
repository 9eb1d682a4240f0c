use crate::units::UnitFamily;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a field of a backend row is, which decides how it is
/// requested and how it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Numeric value aggregated by the backend.
    Metric,
    /// Field the backend can group by.
    Dimension,
    /// Unix timestamp.
    Timestamp,
    /// Milliseconds, rendered as `Xms`/`Xs`/...
    Duration,
    /// Anything else, passed through.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    /// Family used for unit fitting of time series.
    pub unit: Option<UnitFamily>,
    /// Suffix appended to rendered aggregate values, e.g. `"%"`.
    pub suffix: Option<String>,
    /// Name of the [`LabelLookups`] table used to replace ids with names.
    pub lookup: Option<String>,
    /// Requested when the caller selects no fields.
    pub is_default: bool,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            unit: None,
            suffix: None,
            lookup: None,
            is_default: false,
        }
    }

    pub fn metric(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Metric)
    }

    pub fn dimension(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Dimension)
    }

    pub fn timestamp(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Timestamp)
    }

    pub fn duration(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Duration)
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn with_unit(mut self, unit: UnitFamily) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_lookup(mut self, table: impl Into<String>) -> Self {
        self.lookup = Some(table.into());
        self
    }

    pub fn default_field(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn is_dimension(&self) -> bool {
        self.kind == FieldKind::Dimension
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Metric | FieldKind::Duration)
    }
}

/// Static description of every field a datasource can return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(definitions: Vec<MetricDefinition>) -> Self {
        Self { definitions }
    }

    pub fn get(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn is_dimension(&self, name: &str) -> bool {
        self.get(name).is_some_and(MetricDefinition::is_dimension)
    }

    /// Non-dimension fields flagged as defaults, in declaration order.
    pub fn default_fields(&self) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|d| d.is_default && !d.is_dimension())
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(|d| d.label.as_str()).unwrap_or(name)
    }
}

/// Side tables mapping raw ids to display names, e.g. system id to system name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelLookups {
    tables: HashMap<String, HashMap<String, String>>,
}

impl LabelLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        table: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> &mut Self {
        self.tables
            .entry(table.into())
            .or_default()
            .insert(id.into(), name.into());
        self
    }

    pub fn with_table<I, K, V>(mut self, table: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.tables
            .entry(table.into())
            .or_default()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn display_name(&self, table: &str, id: &str) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|entries| entries.get(id))
            .map(String::as_str)
    }
}
