//! Static argument declarations shared by every widget of a datasource type.

use crate::{
    error::SchemaError,
    types::{ArgValue, OptionItem, ResolvedArgs, UpstreamValues},
};
use async_trait::async_trait;
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    future::Future,
    sync::Arc,
};

/// Produces the option list of a selector from the values of the
/// selector's upstream arguments (positional, in `depends_on` order).
///
/// Implementations must tolerate absent upstream values and answer with an
/// empty list rather than an error in that case.
#[async_trait]
pub trait OptionProvider: Send + Sync {
    async fn options(&self, upstream: &UpstreamValues) -> Result<Vec<OptionItem>, anyhow::Error>;
}

/// Adapts an async closure into an [`OptionProvider`].
pub struct FnProvider<F>(F);

#[async_trait]
impl<F, Fut> OptionProvider for FnProvider<F>
where
    F: Fn(UpstreamValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<OptionItem>, anyhow::Error>> + Send + 'static,
{
    async fn options(&self, upstream: &UpstreamValues) -> Result<Vec<OptionItem>, anyhow::Error> {
        (self.0)(upstream.clone()).await
    }
}

pub fn provider_fn<F, Fut>(f: F) -> Arc<dyn OptionProvider>
where
    F: Fn(UpstreamValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<OptionItem>, anyhow::Error>> + Send + 'static,
{
    Arc::new(FnProvider(f))
}

/// `(resolved arguments, own value) -> hidden?`
pub type HideRule = Arc<dyn Fn(&ResolvedArgs, Option<&ArgValue>) -> bool + Send + Sync>;
/// `value -> accepted?`
pub type Validator = Arc<dyn Fn(&ArgValue) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    Number,
    /// Multi-valued selection (e.g. several application ids).
    List,
}

#[derive(Clone)]
pub struct ArgumentDefinition {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub depends_on: Vec<String>,
    pub hide_rule: Option<HideRule>,
    pub option_provider: Option<Arc<dyn OptionProvider>>,
    pub validator: Option<Validator>,
}

impl fmt::Debug for ArgumentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("depends_on", &self.depends_on)
            .field("hide_rule", &self.hide_rule.is_some())
            .field("option_provider", &self.option_provider.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ArgumentDefinition {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            depends_on: vec![],
            hide_rule: None,
            option_provider: None,
            validator: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::Number)
    }

    pub fn list(name: impl Into<String>) -> Self {
        Self::new(name, ArgKind::List)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn hide_when<F>(mut self, rule: F) -> Self
    where
        F: Fn(&ResolvedArgs, Option<&ArgValue>) -> bool + Send + Sync + 'static,
    {
        self.hide_rule = Some(Arc::new(rule));
        self
    }

    pub fn options(mut self, provider: Arc<dyn OptionProvider>) -> Self {
        self.option_provider = Some(provider);
        self
    }

    pub fn validate_with<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ArgValue) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn is_hidden(&self, resolved: &ResolvedArgs) -> bool {
        self.hide_rule
            .as_ref()
            .is_some_and(|rule| rule(resolved, resolved.get(&self.name)))
    }
}

/// Ordered set of argument definitions. Every `depends_on` entry refers to an
/// argument declared earlier, so the declaration order is a valid
/// resolution order and the graph has no cycles.
#[derive(Debug, Clone)]
pub struct ArgumentSchema {
    definitions: Vec<ArgumentDefinition>,
    positions: HashMap<String, usize>,
    /// Transitive dependents of each argument, in declaration order.
    dependents: HashMap<String, Vec<String>>,
}

impl ArgumentSchema {
    pub fn new(definitions: Vec<ArgumentDefinition>) -> Result<Self, SchemaError> {
        let mut positions = HashMap::with_capacity(definitions.len());
        for (i, definition) in definitions.iter().enumerate() {
            if positions.insert(definition.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateArgument(definition.name.clone()));
            }
        }

        // ancestors[i]: every argument `i` transitively depends on
        let mut ancestors: Vec<BTreeSet<usize>> = Vec::with_capacity(definitions.len());
        for (i, definition) in definitions.iter().enumerate() {
            let mut own = BTreeSet::new();
            for dependency in &definition.depends_on {
                let position = match positions.get(dependency) {
                    Some(&p) if p == i => {
                        return Err(SchemaError::SelfDependency(definition.name.clone()))
                    }
                    Some(&p) if p > i => {
                        return Err(SchemaError::ForwardDependency {
                            argument: definition.name.clone(),
                            dependency: dependency.clone(),
                        })
                    }
                    Some(&p) => p,
                    None => {
                        return Err(SchemaError::UnknownDependency {
                            argument: definition.name.clone(),
                            dependency: dependency.clone(),
                        })
                    }
                };
                own.insert(position);
                own.extend(ancestors[position].iter().copied());
            }
            ancestors.push(own);
        }

        let dependents = definitions
            .iter()
            .enumerate()
            .map(|(i, definition)| {
                let downstream = ancestors
                    .iter()
                    .enumerate()
                    .filter(|(_, ancestors)| ancestors.contains(&i))
                    .map(|(j, _)| definitions[j].name.clone())
                    .collect();
                (definition.name.clone(), downstream)
            })
            .collect();

        Ok(Self {
            definitions,
            positions,
            dependents,
        })
    }

    pub fn definitions(&self) -> &[ArgumentDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentDefinition> {
        self.positions.get(name).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Arguments whose `depends_on` includes `name` directly or transitively.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fill absent arguments with their declared defaults.
    pub fn apply_defaults(&self, resolved: ResolvedArgs) -> ResolvedArgs {
        let mut values = resolved.into_map();
        for definition in &self.definitions {
            if let Some(default) = &definition.default {
                values
                    .entry(definition.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        ResolvedArgs::from_map(values)
    }

    /// Definitions whose hide rule (if any) does not hide them.
    pub fn visible_arguments(&self, resolved: &ResolvedArgs) -> Vec<&ArgumentDefinition> {
        self.definitions
            .iter()
            .filter(|definition| !definition.is_hidden(resolved))
            .collect()
    }
}
