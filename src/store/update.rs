use serde_json::{Value as JsonValue, json};

use super::path::FieldPath;
use crate::core::DocumentId;

/// Element predicate for a pull: removes the array items whose `field`
/// equals `equals`.
#[derive(Debug, Clone)]
pub struct PullMatch {
    pub field: String,
    pub equals: JsonValue,
}

impl PullMatch {
    pub fn new(field: impl Into<String>, equals: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn id_eq(id: DocumentId) -> Self {
        Self::new("id", json!(id))
    }

    pub fn matches(&self, element: &JsonValue) -> bool {
        element.get(&self.field) == Some(&self.equals)
    }
}

/// One mutation of an atomic update. Mirrors the store operators the
/// engines rely on: `$set`, `$push` and `$pull` on dynamic paths.
#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set { path: FieldPath, value: JsonValue },
    Push { path: FieldPath, value: JsonValue },
    Pull { path: FieldPath, matching: PullMatch },
}

/// An ordered list of mutations applied as one atomic document update.
#[derive(Debug, Clone, Default)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: FieldPath, value: impl Into<JsonValue>) -> Self {
        self.ops.push(UpdateOp::Set {
            path,
            value: value.into(),
        });
        self
    }

    pub fn push(mut self, path: FieldPath, value: impl Into<JsonValue>) -> Self {
        self.ops.push(UpdateOp::Push {
            path,
            value: value.into(),
        });
        self
    }

    pub fn pull(mut self, path: FieldPath, matching: PullMatch) -> Self {
        self.ops.push(UpdateOp::Pull { path, matching });
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// A named `$[placeholder]` bound to an equality predicate over the
/// elements of whichever array the placeholder is applied to.
#[derive(Debug, Clone)]
pub struct ArrayFilter {
    pub placeholder: String,
    pub field: String,
    pub equals: JsonValue,
}

impl ArrayFilter {
    pub fn new(
        placeholder: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<JsonValue>,
    ) -> Self {
        Self {
            placeholder: placeholder.into(),
            field: field.into(),
            equals: equals.into(),
        }
    }

    /// The common case: bind the placeholder to an element id.
    pub fn id_eq(placeholder: impl Into<String>, id: DocumentId) -> Self {
        Self::new(placeholder, "id", json!(id))
    }

    pub fn matches(&self, element: &JsonValue) -> bool {
        element.get(&self.field) == Some(&self.equals)
    }
}

/// Options for `find_one_and_update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub array_filters: Vec<ArrayFilter>,
    pub return_updated: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the post-update document instead of the pre-update one.
    pub fn returning_updated() -> Self {
        Self {
            return_updated: true,
            ..Self::default()
        }
    }

    pub fn array_filter(mut self, filter: ArrayFilter) -> Self {
        self.array_filters.push(filter);
        self
    }
}
