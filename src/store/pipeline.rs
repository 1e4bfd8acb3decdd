use serde_json::Value as JsonValue;

use super::filter::Filter;

/// One stage of an aggregation pass.
#[derive(Debug, Clone)]
pub enum Stage {
    /// Keep only documents matching the selector.
    Match(Filter),
    /// Replace `array` with the subset of its elements whose `field`
    /// equals `equals`.
    FilterArray {
        array: String,
        field: String,
        equals: JsonValue,
    },
    /// Map over the surviving elements of `outer`, merging into each one
    /// its `inner` array filtered by the same predicate.
    MapMergeFiltered {
        outer: String,
        inner: String,
        field: String,
        equals: JsonValue,
    },
}

/// A small aggregation pipeline: enough to produce a document whose
/// nested arrays have been filtered by a boolean field at two levels in
/// a single pass, and nothing more.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn match_doc(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn filter_array(
        mut self,
        array: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<JsonValue>,
    ) -> Self {
        self.stages.push(Stage::FilterArray {
            array: array.into(),
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn map_merge_filtered(
        mut self,
        outer: impl Into<String>,
        inner: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<JsonValue>,
    ) -> Self {
        self.stages.push(Stage::MapMergeFiltered {
            outer: outer.into(),
            inner: inner.into(),
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}
