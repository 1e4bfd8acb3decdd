use tracing::error;

use super::{CollectionSchema, ElementSchema, FieldKind};
use crate::core::{EngineError, Result};

/// Guards against engine misuse: every mutating array operation first
/// proves that the targeted field is declared as an array in its owning
/// schema. A failure here is a programming mistake in the calling domain
/// service, never a user-input problem, so it surfaces as a fatal
/// `Configuration` error and is logged at error level.
pub struct FieldTypeGuard;

impl FieldTypeGuard {
    /// Asserts that `field` exists on `schema` and is an array, returning
    /// the declared element schema for further nesting checks.
    pub fn assert_array_field<'a>(
        schema: &'a CollectionSchema,
        field: &str,
    ) -> Result<&'a ElementSchema> {
        match schema.field(field) {
            None => Err(Self::missing(schema.name(), field)),
            Some(def) => match &def.kind {
                FieldKind::Array(element) => Ok(element),
                other => Err(Self::not_array(schema.name(), field, other.type_name())),
            },
        }
    }

    /// Same check one level down, against the element schema of an
    /// already-validated array field.
    pub fn assert_element_array_field<'a>(
        owner: &str,
        element: &'a ElementSchema,
        field: &str,
    ) -> Result<&'a ElementSchema> {
        match element.field(field) {
            None => Err(Self::missing(owner, field)),
            Some(def) => match &def.kind {
                FieldKind::Array(inner) => Ok(inner),
                other => Err(Self::not_array(owner, field, other.type_name())),
            },
        }
    }

    /// Validates an `outer` array on the collection and an `inner` array
    /// declared on its elements.
    pub fn assert_nested_array_field<'a>(
        schema: &'a CollectionSchema,
        outer: &str,
        inner: &str,
    ) -> Result<&'a ElementSchema> {
        let element = Self::assert_array_field(schema, outer)?;
        let owner = format!("{}.{}", schema.name(), outer);
        Self::assert_element_array_field(&owner, element, inner)
    }

    /// Validates the full three-level chain `outer -> mid -> inner`.
    pub fn assert_double_nested_array_field<'a>(
        schema: &'a CollectionSchema,
        outer: &str,
        mid: &str,
        inner: &str,
    ) -> Result<&'a ElementSchema> {
        let sub = Self::assert_nested_array_field(schema, outer, mid)?;
        let owner = format!("{}.{}.{}", schema.name(), outer, mid);
        Self::assert_element_array_field(&owner, sub, inner)
    }

    fn missing(owner: &str, field: &str) -> EngineError {
        error!(owner, field, "array operation targets an undeclared field");
        EngineError::Configuration(format!("Field '{field}' does not exist on '{owner}'"))
    }

    fn not_array(owner: &str, field: &str, actual: &str) -> EngineError {
        error!(owner, field, actual, "array operation targets a non-array field");
        EngineError::Configuration(format!(
            "Field '{field}' on '{owner}' is declared as {actual}, expected an array"
        ))
    }
}
