//! Lazy option resolution along the argument dependency graph.
//!
//! Resolution is split in two phases so that a caller running several
//! resolutions on one cooperative scheduler can re-check the upstream
//! selection after the provider returns:
//!
//! 1. [`begin`] computes the cache key from the current values and either
//!    answers from the [`OptionCache`] or hands out a [`PendingFetch`];
//! 2. [`finish`] stores the fetched list, but only if the key computed from
//!    the values current *at completion time* still matches. Otherwise the
//!    result is dropped as [`ResolveError::Superseded`], so the last relevant
//!    result wins no matter in which order providers complete.

use crate::{
    cache::{CacheEntry, CacheKey, OptionCache},
    error::ResolveError,
    schema::{ArgumentDefinition, ArgumentSchema, OptionProvider},
    types::{OptionItem, ResolvedArgs, UpstreamValues, ALL_OPTION_LABEL},
};
use std::sync::Arc;
use tracing::instrument;

/// A provider call that has to happen before the options are known.
pub struct PendingFetch {
    pub argument: String,
    pub key: CacheKey,
    provider: Arc<dyn OptionProvider>,
}

impl std::fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("argument", &self.argument)
            .field("key", &self.key)
            .finish()
    }
}

impl PendingFetch {
    pub async fn fetch(&self) -> Result<Vec<OptionItem>, anyhow::Error> {
        self.provider.options(&self.key).await
    }
}

#[derive(Debug)]
pub enum Lookup {
    Hit(Vec<OptionItem>),
    Miss(PendingFetch),
}

/// Current values of `definition.depends_on`, in declared order.
pub fn cache_key(definition: &ArgumentDefinition, current: &ResolvedArgs) -> CacheKey {
    UpstreamValues::new(
        definition
            .depends_on
            .iter()
            .map(|dependency| current.get(dependency).cloned())
            .collect(),
    )
}

fn definition_with_provider<'a>(
    schema: &'a ArgumentSchema,
    argument: &str,
) -> Result<(&'a ArgumentDefinition, &'a Arc<dyn OptionProvider>), ResolveError> {
    let definition = schema
        .get(argument)
        .ok_or_else(|| ResolveError::UnknownArgument(argument.to_owned()))?;
    let provider = definition
        .option_provider
        .as_ref()
        .ok_or_else(|| ResolveError::NoProvider(argument.to_owned()))?;
    Ok((definition, provider))
}

pub fn begin(
    schema: &ArgumentSchema,
    argument: &str,
    current: &ResolvedArgs,
    cache: &OptionCache,
) -> Result<Lookup, ResolveError> {
    let (definition, provider) = definition_with_provider(schema, argument)?;
    let key = cache_key(definition, current);
    if let Some(entry) = cache.get(argument, &key) {
        tracing::debug!(argument, ?key, "option cache hit");
        return Ok(Lookup::Hit(entry.options.clone()));
    }
    tracing::debug!(argument, ?key, "option cache miss");
    Ok(Lookup::Miss(PendingFetch {
        argument: argument.to_owned(),
        key,
        provider: provider.clone(),
    }))
}

pub fn finish(
    schema: &ArgumentSchema,
    pending: PendingFetch,
    fetched: Result<Vec<OptionItem>, anyhow::Error>,
    current: &ResolvedArgs,
    cache: &mut OptionCache,
) -> Result<Vec<OptionItem>, ResolveError> {
    let PendingFetch { argument, key, .. } = pending;
    let options = fetched.map_err(|source| ResolveError::Provider {
        argument: argument.clone(),
        source,
    })?;

    let definition = schema
        .get(&argument)
        .ok_or_else(|| ResolveError::UnknownArgument(argument.clone()))?;
    let current_key = cache_key(definition, current);
    if current_key != key {
        tracing::warn!(
            argument = %argument,
            requested = ?key,
            current = ?current_key,
            "dropping options fetched for a stale upstream selection"
        );
        return Err(ResolveError::Superseded(argument));
    }

    let options = normalize_options(options);
    cache.insert(
        &argument,
        key,
        CacheEntry {
            options: options.clone(),
        },
    );
    Ok(options)
}

/// Resolve the option list of `argument` given the current values of the
/// other arguments, calling its provider only on a cache miss.
#[instrument(skip(schema, current, cache), level = "debug")]
pub async fn resolve_options(
    schema: &ArgumentSchema,
    argument: &str,
    current: &ResolvedArgs,
    cache: &mut OptionCache,
) -> Result<Vec<OptionItem>, ResolveError> {
    match begin(schema, argument, current, cache)? {
        Lookup::Hit(options) => Ok(options),
        Lookup::Miss(pending) => {
            let fetched = pending.fetch().await;
            finish(schema, pending, fetched, current, cache)
        }
    }
}

/// Put the "all values" option (if any) first, keep only one of it and
/// drop duplicate values.
pub fn normalize_options(options: Vec<OptionItem>) -> Vec<OptionItem> {
    let has_all = options.iter().any(OptionItem::is_all);
    let mut seen = std::collections::HashSet::new();
    let rest = options
        .into_iter()
        .filter(|option| !option.is_all())
        .filter(|option| seen.insert(option.value.clone()));

    let mut normalized = Vec::new();
    if has_all {
        normalized.push(OptionItem::new(ALL_OPTION_LABEL, ""));
    }
    normalized.extend(rest);
    normalized
}
