use crate::{
    error::ValidationError,
    schema::{ArgKind, ArgumentSchema},
    types::{ArgBinding, ResolvedArgs},
};
use std::collections::BTreeMap;

/// Fold the flat `{arg, val}` list into a name to value map.
/// Later duplicates overwrite earlier ones.
pub fn bind(args: impl IntoIterator<Item = ArgBinding>) -> ResolvedArgs {
    let values: BTreeMap<_, _> = args
        .into_iter()
        .map(|ArgBinding { arg, val }| (arg, val))
        .collect();
    ResolvedArgs::from_map(values)
}

/// `true` iff every required argument is bound (lists non-empty) and every
/// bound argument with a validator is accepted by it.
pub fn validate(schema: &ArgumentSchema, resolved: &ResolvedArgs) -> bool {
    check(schema, resolved).is_ok()
}

/// Same as [`validate`], reporting the first failing argument.
pub fn check(schema: &ArgumentSchema, resolved: &ResolvedArgs) -> Result<(), ValidationError> {
    for definition in schema.definitions() {
        let value = resolved.get(&definition.name);
        if definition.required {
            let missing = match value {
                None => true,
                Some(value) if definition.kind == ArgKind::List => value.to_strings().is_empty(),
                Some(value) => value.is_blank(),
            };
            if missing {
                return Err(ValidationError::Missing(definition.name.clone()));
            }
        }
        if let (Some(validator), Some(value)) = (&definition.validator, value) {
            if !validator(value) {
                return Err(ValidationError::Rejected(definition.name.clone()));
            }
        }
    }
    Ok(())
}
