use crate::{
    descriptor::Descriptor, error::RegistryError, query::RESERVED_OPTION_KEYS,
    shaper::PARTITION_KEYS,
};
use std::{collections::BTreeMap, sync::Arc};

/// Registered descriptors by name and version.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<(String, u32), Arc<Descriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: Descriptor) -> Result<Arc<Descriptor>, RegistryError> {
        let key = (descriptor.name.clone(), descriptor.version);
        if self.descriptors.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                name: key.0,
                version: key.1,
            });
        }
        if let Some(argument) = descriptor
            .referenced_arguments()
            .find(|argument| !descriptor.schema.contains(argument))
        {
            return Err(RegistryError::UndeclaredArgument {
                descriptor: descriptor.name.clone(),
                argument: argument.to_owned(),
            });
        }
        if let Some(key) = reserved_key(&descriptor) {
            return Err(RegistryError::ReservedKey {
                descriptor: descriptor.name.clone(),
                key: key.to_owned(),
            });
        }

        tracing::debug!(
            name = %descriptor.name,
            version = descriptor.version,
            "registered datasource descriptor"
        );
        let descriptor = Arc::new(descriptor);
        self.descriptors.insert(key, descriptor.clone());
        Ok(descriptor)
    }

    pub fn get(&self, name: &str, version: u32) -> Option<Arc<Descriptor>> {
        self.descriptors.get(&(name.to_owned(), version)).cloned()
    }

    /// Highest registered version of `name`.
    pub fn latest(&self, name: &str) -> Option<Arc<Descriptor>> {
        self.descriptors
            .range((name.to_owned(), 0)..=(name.to_owned(), u32::MAX))
            .next_back()
            .map(|(_, descriptor)| descriptor.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self
            .descriptors
            .keys()
            .map(|(name, _)| name.as_str())
            .collect();
        names.dedup();
        names.into_iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Names that would collide with the fixed keys of query options or
/// aggregate partitions once flattened next to them.
fn reserved_key(descriptor: &Descriptor) -> Option<&str> {
    let dimensions = descriptor
        .catalog
        .iter()
        .filter(|definition| definition.is_dimension())
        .map(|definition| definition.name.as_str())
        .filter(|name| PARTITION_KEYS.contains(name));
    let filters = descriptor
        .request
        .filter_fields()
        .filter(|field| RESERVED_OPTION_KEYS.contains(field));
    dimensions.chain(filters).next()
}
