pub mod binder;
pub mod cache;
pub mod catalog;
pub mod client;
mod descriptor;
pub mod descriptors;
pub mod error;
pub mod period;
pub mod query;
mod registry;
pub mod resolver;
pub mod schema;
mod session;
pub mod settings;
pub mod shaper;
pub mod types;
pub mod units;

pub use binder::{bind, validate};
pub use catalog::{LabelLookups, MetricCatalog, MetricDefinition};
pub use client::{BackendResponse, BackendStatus, QueryClient};
pub use descriptor::{
    Descriptor, RefreshContext, RefreshOutcome, RefreshRequest, VALIDATION_FAILED,
};
pub use error::{PeriodError, RegistryError, ResolveError, SchemaError, ValidationError};
pub use period::{PeriodResolver, PeriodWindow, Precision, TimeRange};
pub use query::{QueryOptions, RequestOptionBuilder, WindowConvention};
pub use registry::DescriptorRegistry;
pub use resolver::resolve_options;
pub use schema::{ArgumentDefinition, ArgumentSchema, OptionProvider};
pub use session::DescriptorSession;
pub use settings::Settings;
pub use shaper::{shape, OutputKind, ShapedResult};
pub use types::{ArgBinding, ArgValue, OptionItem, ResolvedArgs};
