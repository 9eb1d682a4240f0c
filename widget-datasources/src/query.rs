//! Backend-agnostic query options assembled from bound arguments.

use crate::{
    catalog::MetricCatalog, period::PeriodWindow, shaper::PARTITION_KEYS, types::ResolvedArgs,
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keys [`QueryOptions`] writes itself. Filter fields must not reuse them.
pub const RESERVED_OPTION_KEYS: [&str; 9] = [
    "time",
    "start_time",
    "end_time",
    "precision",
    "fields",
    "group_by",
    "sort",
    "skip",
    "limit",
];

/// How a backend expects the time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowConvention {
    /// `time: "startSec,endSec"`
    #[default]
    Combined,
    /// `start_time: startSec, end_time: endSec`
    Split,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WindowFilter {
    Combined { time: String },
    Split { start_time: i64, end_time: i64 },
}

impl WindowFilter {
    pub fn new(convention: WindowConvention, window: &PeriodWindow) -> Self {
        match convention {
            WindowConvention::Combined => WindowFilter::Combined {
                time: format!("{},{}", window.start_secs(), window.end_secs()),
            },
            WindowConvention::Split => WindowFilter::Split {
                start_time: window.start_secs(),
                end_time: window.end_secs(),
            },
        }
    }
}

/// Options handed to the backend query client. Empty parts are not serialized.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryOptions {
    #[serde(flatten)]
    pub window: WindowFilter,
    /// Sampling step in seconds.
    pub precision: i64,
    /// Backend field to comma-separated filter values.
    #[serde(flatten)]
    pub filters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Empty means an ungrouped aggregate.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    pub sort: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Maps a bound argument onto a backend filter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub argument: String,
    pub field: String,
}

/// Per-datasource recipe for turning bound arguments into [`QueryOptions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptionBuilder {
    convention: Option<WindowConvention>,
    filters: Vec<FilterField>,
    /// `(preferred, superseded)`: when `preferred` filters, `superseded` does not.
    exclusive: Vec<(String, String)>,
    sort_argument: Option<String>,
    default_sort: Option<String>,
    limit_argument: String,
    skip_argument: String,
}

impl Default for RequestOptionBuilder {
    fn default() -> Self {
        Self {
            convention: None,
            filters: vec![],
            exclusive: vec![],
            sort_argument: None,
            default_sort: None,
            limit_argument: "limit".to_owned(),
            skip_argument: "skip".to_owned(),
        }
    }
}

impl RequestOptionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the window convention instead of using the runtime default.
    pub fn window_convention(mut self, convention: WindowConvention) -> Self {
        self.convention = Some(convention);
        self
    }

    /// Filter backend `field` by the value of `argument`.
    pub fn filter(mut self, argument: impl Into<String>, field: impl Into<String>) -> Self {
        self.filters.push(FilterField {
            argument: argument.into(),
            field: field.into(),
        });
        self
    }

    /// Filter the backend field named like the argument.
    pub fn filter_by(self, argument: impl Into<String>) -> Self {
        let argument = argument.into();
        self.filter(argument.clone(), argument)
    }

    /// A bound `preferred` filter drops the `superseded` one, e.g. an
    /// application id filter replaces the application system filter that
    /// covers the same entities.
    pub fn supersedes(
        mut self,
        preferred: impl Into<String>,
        superseded: impl Into<String>,
    ) -> Self {
        self.exclusive.push((preferred.into(), superseded.into()));
        self
    }

    pub fn sort_argument(mut self, argument: impl Into<String>) -> Self {
        self.sort_argument = Some(argument.into());
        self
    }

    pub fn default_sort(mut self, sort: impl Into<String>) -> Self {
        self.default_sort = Some(sort.into());
        self
    }

    pub fn pagination(mut self, limit: impl Into<String>, skip: impl Into<String>) -> Self {
        self.limit_argument = limit.into();
        self.skip_argument = skip.into();
        self
    }

    /// Arguments this recipe reads, used to check descriptors on registration.
    pub fn referenced_arguments(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(|f| f.argument.as_str())
            .chain(self.sort_argument.as_deref())
    }

    /// Backend fields the filters write into.
    pub fn filter_fields(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|f| f.field.as_str())
    }

    pub fn convention(&self, fallback: WindowConvention) -> WindowConvention {
        self.convention.unwrap_or(fallback)
    }

    pub fn build(
        &self,
        resolved: &ResolvedArgs,
        window: &PeriodWindow,
        selected_metrics: &[String],
        selected_dimensions: &[String],
        catalog: &MetricCatalog,
        fallback_convention: WindowConvention,
    ) -> QueryOptions {
        let group_by: Vec<String> = selected_dimensions
            .iter()
            .filter(|name| !PARTITION_KEYS.contains(&name.as_str()))
            .chain(
                selected_metrics
                    .iter()
                    .filter(|name| catalog.is_dimension(name)),
            )
            .unique()
            .cloned()
            .collect();

        let mut fields: Vec<String> = selected_metrics
            .iter()
            .filter(|name| !group_by.contains(name))
            .unique()
            .cloned()
            .collect();
        if fields.is_empty() {
            fields = catalog
                .default_fields()
                .into_iter()
                .filter(|name| !group_by.contains(name))
                .collect();
        }

        let limit = resolved
            .number(&self.limit_argument)
            .filter(|limit| *limit > 0)
            .map(|limit| limit as u64);
        let skip = limit.and_then(|_| {
            resolved
                .number(&self.skip_argument)
                .filter(|skip| *skip >= 0)
                .map(|skip| skip as u64)
        });

        let sort = self
            .sort_argument
            .as_deref()
            .and_then(|argument| resolved.filter_value(argument))
            .map(ToString::to_string)
            .or_else(|| self.default_sort.clone());

        QueryOptions {
            window: WindowFilter::new(self.convention(fallback_convention), window),
            precision: window.precision.seconds(),
            filters: self.filters(resolved),
            fields,
            group_by,
            sort,
            skip,
            limit,
        }
    }

    fn filters(&self, resolved: &ResolvedArgs) -> BTreeMap<String, String> {
        let is_superseded = |argument: &str| {
            self.exclusive.iter().any(|(preferred, superseded)| {
                superseded == argument && resolved.filter_value(preferred).is_some()
            })
        };
        self.filters
            .iter()
            .filter(|filter| !is_superseded(&filter.argument))
            .filter_map(|filter| {
                let values = resolved.filter_value(&filter.argument)?.to_strings();
                (!values.is_empty()).then(|| (filter.field.clone(), values.join(",")))
            })
            .collect()
    }
}
