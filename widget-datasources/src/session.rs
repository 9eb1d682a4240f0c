//! Configuration session of one widget: the user's working selection plus the
//! option lists already fetched for it.

use crate::{
    cache::OptionCache,
    descriptor::{Descriptor, RefreshRequest},
    error::ResolveError,
    resolver::{begin, finish, Lookup},
    schema::ArgumentDefinition,
    types::{ArgBinding, ArgValue, OptionItem, ResolvedArgs, Selection},
};
use std::{cell::RefCell, sync::Arc};
use tracing::instrument;

/// Runs on a single-threaded scheduler: state lives in [`RefCell`]s that are
/// never borrowed across an `await`, so several option requests of the same
/// session may be in flight at once.
#[derive(Debug)]
pub struct DescriptorSession {
    descriptor: Arc<Descriptor>,
    selection: RefCell<Selection>,
    cache: RefCell<OptionCache>,
}

impl DescriptorSession {
    pub fn new(descriptor: Arc<Descriptor>) -> Self {
        Self::with_bindings(descriptor, [])
    }

    /// Resume a session from previously saved bindings.
    pub fn with_bindings(
        descriptor: Arc<Descriptor>,
        bindings: impl IntoIterator<Item = ArgBinding>,
    ) -> Self {
        Self {
            descriptor,
            selection: RefCell::new(Selection::from_bindings(bindings)),
            cache: RefCell::new(OptionCache::new()),
        }
    }

    pub fn descriptor(&self) -> &Arc<Descriptor> {
        &self.descriptor
    }

    fn current(&self) -> ResolvedArgs {
        let selection = self.selection.borrow().to_resolved();
        self.descriptor.schema.apply_defaults(selection)
    }

    pub fn value(&self, name: &str) -> Option<ArgValue> {
        self.current().get(name).cloned()
    }

    /// Option list of `name` for the current upstream selection.
    ///
    /// If an upstream value changes while the provider runs, the result is
    /// dropped with [`ResolveError::Superseded`] and nothing is cached.
    #[instrument(skip(self), level = "debug")]
    pub async fn options(&self, name: &str) -> Result<Vec<OptionItem>, ResolveError> {
        let schema = &self.descriptor.schema;
        let lookup = begin(schema, name, &self.current(), &self.cache.borrow())?;
        match lookup {
            Lookup::Hit(options) => Ok(options),
            Lookup::Miss(pending) => {
                let fetched = pending.fetch().await;
                let current = self.current();
                finish(
                    schema,
                    pending,
                    fetched,
                    &current,
                    &mut self.cache.borrow_mut(),
                )
            }
        }
    }

    /// Set `name` and clear everything downstream of it, both the values and
    /// the cached option lists. Returns the names whose values were cleared.
    pub fn select(
        &self,
        name: &str,
        value: impl Into<ArgValue>,
    ) -> Result<Vec<String>, ResolveError> {
        let schema = &self.descriptor.schema;
        if !schema.contains(name) {
            return Err(ResolveError::UnknownArgument(name.to_owned()));
        }
        let value = value.into();
        if self.selection.borrow().get(name) == Some(&value) {
            return Ok(vec![]);
        }
        let cleared = self.selection.borrow_mut().select(schema, name, value);
        let dropped = self.cache.borrow_mut().invalidate_dependents(schema, name);
        tracing::debug!(
            argument = name,
            ?cleared,
            dropped_option_lists = dropped,
            "selection changed"
        );
        Ok(cleared)
    }

    pub fn unset(&self, name: &str) -> Vec<String> {
        let schema = &self.descriptor.schema;
        let cleared = self.selection.borrow_mut().unset(schema, name);
        self.cache.borrow_mut().invalidate_dependents(schema, name);
        cleared
    }

    /// Selectors the dashboard should currently show.
    pub fn visible_arguments(&self) -> Vec<&ArgumentDefinition> {
        self.descriptor.schema.visible_arguments(&self.current())
    }

    pub fn bindings(&self) -> Vec<ArgBinding> {
        self.selection.borrow().to_bindings()
    }

    /// Refresh request for the current selection.
    pub fn request(&self) -> RefreshRequest {
        RefreshRequest::new(self.bindings())
    }

    pub fn cached_option_lists(&self) -> usize {
        self.cache.borrow().len()
    }
}
