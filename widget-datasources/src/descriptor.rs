//! Datasource descriptors and the refresh pipeline shared by all of them.

use crate::{
    binder::{bind, check},
    catalog::{LabelLookups, MetricCatalog},
    client::{BackendStatus, QueryClient, STATUS_API_ERROR},
    error::ValidationError,
    period::{PeriodResolver, PeriodValue, PeriodWindow, Precision, TimeRange},
    query::{QueryOptions, RequestOptionBuilder},
    schema::ArgumentSchema,
    settings::Settings,
    shaper::{shape, OutputKind, ShapeContext, ShapedResult, TimeAxis},
    types::{ArgBinding, ResolvedArgs},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tracing::instrument;

pub const VALIDATION_FAILED: &str = "Validation Failed";

/// A named, versioned datasource: what it asks for, what it can return and
/// how its backend is queried. Immutable and shared by every widget using it.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub name: String,
    pub version: u32,
    /// Backend target id handed to the [`QueryClient`].
    pub target: String,
    pub kind: OutputKind,
    pub schema: Arc<ArgumentSchema>,
    pub catalog: Arc<MetricCatalog>,
    pub request: RequestOptionBuilder,
    pub time: TimeAxis,
    pub period_argument: String,
    pub precision_argument: Option<String>,
}

impl Descriptor {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        target: impl Into<String>,
        kind: OutputKind,
        schema: ArgumentSchema,
        catalog: MetricCatalog,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            target: target.into(),
            kind,
            schema: Arc::new(schema),
            catalog: Arc::new(catalog),
            request: RequestOptionBuilder::default(),
            time: TimeAxis::default(),
            period_argument: "period".to_owned(),
            precision_argument: None,
        }
    }

    pub fn with_request(mut self, request: RequestOptionBuilder) -> Self {
        self.request = request;
        self
    }

    pub fn with_time_axis(mut self, time: TimeAxis) -> Self {
        self.time = time;
        self
    }

    pub fn with_period_argument(mut self, name: impl Into<String>) -> Self {
        self.period_argument = name.into();
        self
    }

    pub fn with_precision_argument(mut self, name: impl Into<String>) -> Self {
        self.precision_argument = Some(name.into());
        self
    }

    /// Argument names the descriptor reads outside of its schema.
    pub fn referenced_arguments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.period_argument.as_str())
            .chain(self.precision_argument.as_deref())
            .chain(self.request.referenced_arguments())
    }

    /// Bind, default and validate the submitted arguments.
    pub fn bind(&self, args: Vec<ArgBinding>) -> Result<ResolvedArgs, ValidationError> {
        let resolved = self.schema.apply_defaults(bind(args));
        check(&self.schema, &resolved)?;
        Ok(resolved)
    }

    pub fn window(
        &self,
        resolved: &ResolvedArgs,
        ambient: Option<TimeRange>,
        settings: &Settings,
        now: DateTime<Utc>,
    ) -> Result<PeriodWindow, ValidationError> {
        let period_error = |source| ValidationError::Period {
            argument: self.period_argument.clone(),
            source,
        };
        let period = resolved
            .get(&self.period_argument)
            .ok_or_else(|| ValidationError::Missing(self.period_argument.clone()))?;
        let period = PeriodValue::parse(period).map_err(period_error)?;
        let precision = self
            .precision_argument
            .as_deref()
            .and_then(|argument| resolved.number(argument))
            .map(Precision::from_seconds)
            .transpose()
            .map_err(period_error)?;
        PeriodResolver::from_settings(settings)
            .resolve(period, ambient, precision, now)
            .map_err(period_error)
    }

    pub fn query_options(
        &self,
        resolved: &ResolvedArgs,
        window: &PeriodWindow,
        request: &RefreshRequest,
        settings: &Settings,
    ) -> QueryOptions {
        self.request.build(
            resolved,
            window,
            &request.metrics,
            &request.dimensions,
            &self.catalog,
            settings.default_window_convention,
        )
    }

    /// Run one widget refresh. Every failure ends up as a value of
    /// [`RefreshOutcome`]; nothing here is fatal to the caller.
    #[instrument(
        skip_all,
        level = "info",
        fields(descriptor = %self.name, version = self.version)
    )]
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        context: &RefreshContext<'_>,
    ) -> RefreshOutcome {
        let settings = context.settings;
        let resolved = match self.bind(request.args.clone()) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::warn!(err = %err, "argument validation failed");
                return RefreshOutcome::ValidationFailed(err);
            }
        };
        let window = match self.window(&resolved, request.ambient, settings, context.now) {
            Ok(window) => window,
            Err(err) => {
                tracing::warn!(err = %err, "period could not be resolved");
                return RefreshOutcome::ValidationFailed(err);
            }
        };
        let options = self.query_options(&resolved, &window, &request, settings);
        tracing::debug!(?window, ?options, "querying backend");

        let response = match context.client.query(&self.target, &options).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(err = ?err, backend = %self.target, "backend query failed");
                return RefreshOutcome::Shaped(ShapedResult::empty(self.kind));
            }
        };

        match response.result {
            BackendStatus::Ok => {
                let shape_context =
                    ShapeContext::new(&self.catalog, context.lookups, &self.time, settings);
                let shaped = shape(
                    self.kind,
                    &response.data,
                    &options.fields,
                    &options.group_by,
                    &shape_context,
                );
                RefreshOutcome::Shaped(shaped)
            }
            BackendStatus::ApiError => {
                tracing::warn!(backend = %self.target, "backend reported an api error");
                RefreshOutcome::ApiError
            }
            status => {
                tracing::warn!(
                    ?status,
                    backend = %self.target,
                    "backend returned no usable result"
                );
                RefreshOutcome::Shaped(ShapedResult::empty(self.kind))
            }
        }
    }
}

/// What the dashboard submits for one widget refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub args: Vec<ArgBinding>,
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    /// Window of the surrounding dashboard, used by inheriting periods.
    pub ambient: Option<TimeRange>,
}

impl RefreshRequest {
    pub fn new(args: impl IntoIterator<Item = ArgBinding>) -> Self {
        Self {
            args: args.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn dimensions<I, S>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions = dimensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn ambient(mut self, ambient: TimeRange) -> Self {
        self.ambient = Some(ambient);
        self
    }
}

/// Collaborators of a refresh.
#[derive(Clone, Copy)]
pub struct RefreshContext<'a> {
    pub settings: &'a Settings,
    pub client: &'a dyn QueryClient,
    pub lookups: &'a LabelLookups,
    pub now: DateTime<Utc>,
}

impl<'a> RefreshContext<'a> {
    pub fn new(
        settings: &'a Settings,
        client: &'a dyn QueryClient,
        lookups: &'a LabelLookups,
    ) -> Self {
        Self {
            settings,
            client,
            lookups,
            now: Utc::now(),
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

/// Result of a refresh as delivered to the chart layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Shaped(ShapedResult),
    /// Arguments did not validate; the backend was not called.
    ValidationFailed(ValidationError),
    /// The backend reported `"Api Error"`.
    ApiError,
}

impl RefreshOutcome {
    pub fn shaped(&self) -> Option<&ShapedResult> {
        match self {
            RefreshOutcome::Shaped(shaped) => Some(shaped),
            _ => None,
        }
    }
}

impl Serialize for RefreshOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RefreshOutcome::Shaped(shaped) => shaped.serialize(serializer),
            RefreshOutcome::ValidationFailed(_) => serializer.serialize_str(VALIDATION_FAILED),
            RefreshOutcome::ApiError => serializer.serialize_str(STATUS_API_ERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::MetricDefinition,
        client::{BackendResponse, MockQueryClient},
        error::PeriodError,
        query::WindowConvention,
        schema::ArgumentDefinition,
        types::ArgValue,
    };
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use serde_json::json;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MS).unwrap()
    }

    #[fixture]
    fn descriptor() -> Descriptor {
        let schema = ArgumentSchema::new(vec![
            ArgumentDefinition::text("site").required(),
            ArgumentDefinition::number("period").default_value(300_000),
            ArgumentDefinition::number("precision"),
        ])
        .unwrap();
        let catalog = MetricCatalog::new(vec![
            MetricDefinition::metric("total", "Total").default_field(),
            MetricDefinition::dimension("vlan", "VLAN"),
        ]);
        Descriptor::new(
            "traffic",
            1,
            "npm/traffic",
            OutputKind::PartitionedAggregate,
            schema,
            catalog,
        )
        .with_request(RequestOptionBuilder::new().filter_by("site"))
        .with_precision_argument("precision")
    }

    #[rstest]
    fn defaults_fill_the_period(descriptor: Descriptor) {
        let resolved = descriptor
            .bind(vec![ArgBinding::new("site", "s1")])
            .unwrap();
        let window = descriptor
            .window(&resolved, None, &Settings::default(), now())
            .unwrap();
        assert_eq!(
            (window.start_ms, window.end_ms, window.precision),
            (NOW_MS - 300_000, NOW_MS, Precision::Second)
        );
    }

    #[rstest]
    fn unsupported_precision_is_a_validation_error(descriptor: Descriptor) {
        let resolved = descriptor
            .bind(vec![
                ArgBinding::new("site", "s1"),
                ArgBinding::new("precision", 42),
            ])
            .unwrap();
        let err = descriptor
            .window(&resolved, None, &Settings::default(), now())
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Period {
                argument: "period".into(),
                source: PeriodError::UnsupportedPrecision(42),
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn query_options_follow_settings(descriptor: Descriptor) {
        let settings = Settings {
            default_window_convention: WindowConvention::Split,
            ..Default::default()
        };
        let lookups = LabelLookups::new();
        let mut client = MockQueryClient::new();
        client
            .expect_query()
            .withf(|target, options| {
                target.to_string() == "npm/traffic"
                    && serde_json::to_value(options).unwrap()
                        == json!({
                            "start_time": 1_699_999_700,
                            "end_time": 1_700_000_000,
                            "precision": 60,
                            "site": "s1",
                            "fields": ["total"],
                            "group_by": ["vlan"],
                        })
            })
            .times(1)
            .returning(|_, _| {
                Ok(BackendResponse::ok(json!([{"vlan": 10, "total": 4}])))
            });
        let context = RefreshContext::new(&settings, &client, &lookups).at(now());

        let request = RefreshRequest::new([
            ArgBinding::new("site", "s1"),
            ArgBinding::new("precision", 60),
        ])
        .dimensions(["vlan"]);
        let outcome = descriptor.refresh(request, &context).await;

        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "default": {},
                "group_by": [{"vlan": 10, "names": ["total"], "data": [4]}],
            })
        );
    }

    #[rstest]
    #[tokio::test]
    async fn missing_required_argument_skips_backend(descriptor: Descriptor) {
        let settings = Settings::default();
        let lookups = LabelLookups::new();
        let mut client = MockQueryClient::new();
        client.expect_query().never();
        let context = RefreshContext::new(&settings, &client, &lookups).at(now());

        let outcome = descriptor
            .refresh(
                RefreshRequest::new([ArgBinding::new("site", ArgValue::text(""))]),
                &context,
            )
            .await;

        assert_eq!(
            outcome,
            RefreshOutcome::ValidationFailed(ValidationError::Missing("site".into()))
        );
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!("Validation Failed"));
    }

    #[rstest]
    #[case::api_error(Ok(BackendResponse::api_error()), json!("Api Error"))]
    #[case::other_status(
        Ok(serde_json::from_value(json!({"result": "busy"})).unwrap()),
        json!({"default": {}})
    )]
    #[case::transport(Err(anyhow::anyhow!("connection reset")), json!({"default": {}}))]
    #[tokio::test]
    async fn backend_failures(
        descriptor: Descriptor,
        #[case] response: Result<BackendResponse, anyhow::Error>,
        #[case] expected: serde_json::Value,
    ) {
        let _ = tracing_subscriber::fmt::try_init();
        let settings = Settings::default();
        let lookups = LabelLookups::new();
        let mut client = MockQueryClient::new();
        client.expect_query().return_once(move |_, _| response);
        let context = RefreshContext::new(&settings, &client, &lookups).at(now());

        let outcome = descriptor
            .refresh(
                RefreshRequest::new([ArgBinding::new("site", "s1")]),
                &context,
            )
            .await;

        assert_eq!(serde_json::to_value(&outcome).unwrap(), expected);
    }
}
