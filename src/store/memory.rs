use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tokio::sync::RwLock;
use tracing::debug;

use super::driver::DocumentStore;
use super::filter::Filter;
use super::path::Segment;
use super::pipeline::{Pipeline, Stage};
use super::update::{ArrayFilter, PullMatch, Update, UpdateOp, UpdateOptions};
use crate::core::{Document, DocumentId, EngineError, Result};
use crate::schema::CollectionSchema;

/// Upper bound on independent positional filters per update, matching
/// what the engines ever issue.
const MAX_ARRAY_FILTERS: usize = 2;

struct Collection {
    schema: CollectionSchema,
    documents: Vec<Document>,
}

impl Collection {
    fn position(&self, filter: &Filter) -> Option<usize> {
        self.documents.iter().position(|doc| filter.matches(doc))
    }
}

/// In-memory `DocumentStore`.
///
/// Collections sit behind individual locks, so operations on different
/// collections never contend. One `find_one_and_update` call applies the
/// whole update under a single write lock; that is the document-level
/// atomicity unit the engines rely on.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<RwLock<Collection>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a collection. Registering the same name twice is a
    /// configuration mistake.
    pub async fn register_collection(&self, schema: CollectionSchema) -> Result<()> {
        let mut map = self.collections.write().await;
        let name = schema.name().to_string();
        if map.contains_key(&name) {
            return Err(EngineError::Configuration(format!(
                "Collection '{name}' is already registered"
            )));
        }
        map.insert(
            name,
            Arc::new(RwLock::new(Collection {
                schema,
                documents: Vec::new(),
            })),
        );
        Ok(())
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }

    async fn handle(&self, name: &str) -> Result<Arc<RwLock<Collection>>> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| {
                EngineError::Configuration(format!("Collection '{name}' is not registered"))
            })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn schema(&self, collection: &str) -> Result<CollectionSchema> {
        let handle = self.handle(collection).await?;
        let guard = handle.read().await;
        Ok(guard.schema.clone())
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<()> {
        let handle = self.handle(collection).await?;
        let mut guard = handle.write().await;
        guard.documents.push(document);
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let handle = self.handle(collection).await?;
        let guard = handle.read().await;
        Ok(guard
            .position(&Filter::by_id(id))
            .map(|pos| guard.documents[pos].clone()))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        options: UpdateOptions,
    ) -> Result<Option<Document>> {
        if options.array_filters.len() > MAX_ARRAY_FILTERS {
            return Err(EngineError::Store(format!(
                "at most {MAX_ARRAY_FILTERS} positional filters per update, got {}",
                options.array_filters.len()
            )));
        }

        let handle = self.handle(collection).await?;
        let mut guard = handle.write().await;
        let Some(pos) = guard.position(&filter) else {
            return Ok(None);
        };

        let before = guard.documents[pos].clone();
        let document = &mut guard.documents[pos];
        for op in update.ops() {
            apply_op(document, op, &options.array_filters)?;
        }
        debug!(collection, ops = update.ops().len(), "applied update");

        Ok(Some(if options.return_updated {
            document.clone()
        } else {
            before
        }))
    }

    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> Result<Option<Document>> {
        let handle = self.handle(collection).await?;
        let guard = handle.read().await;

        let mut current: Vec<Document> = guard.documents.clone();
        for stage in pipeline.stages() {
            match stage {
                Stage::Match(filter) => current.retain(|doc| filter.matches(doc)),
                Stage::FilterArray {
                    array,
                    field,
                    equals,
                } => {
                    for doc in &mut current {
                        filter_array(doc, array, field, equals);
                    }
                }
                Stage::MapMergeFiltered {
                    outer,
                    inner,
                    field,
                    equals,
                } => {
                    for doc in &mut current {
                        map_merge_filtered(doc, outer, inner, field, equals);
                    }
                }
            }
        }
        Ok(current.into_iter().next())
    }

    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool> {
        let handle = self.handle(collection).await?;
        let mut guard = handle.write().await;
        match guard.position(&Filter::by_id(id)) {
            Some(pos) => {
                guard.documents.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

enum WriteKind<'a> {
    Set(&'a JsonValue),
    Push(&'a JsonValue),
    Pull(&'a PullMatch),
}

fn apply_op(document: &mut Document, op: &UpdateOp, filters: &[ArrayFilter]) -> Result<usize> {
    match op {
        UpdateOp::Set { path, value } => {
            apply_write(document, path.segments(), filters, &WriteKind::Set(value))
        }
        UpdateOp::Push { path, value } => {
            apply_write(document, path.segments(), filters, &WriteKind::Push(value))
        }
        UpdateOp::Pull { path, matching } => apply_write(
            document,
            path.segments(),
            filters,
            &WriteKind::Pull(matching),
        ),
    }
}

/// Walks the path segments down into the document and applies the write
/// at the final field. A positional segment fans out to every element
/// matching its bound filter. Missing intermediate fields make the write
/// a no-op (the caller detects that when it re-locates the target).
fn apply_write(
    value: &mut JsonValue,
    segments: &[Segment],
    filters: &[ArrayFilter],
    kind: &WriteKind<'_>,
) -> Result<usize> {
    match segments {
        [] => Err(EngineError::Store("empty update path".into())),
        [Segment::Field(name)] => {
            let obj = value
                .as_object_mut()
                .ok_or_else(|| EngineError::Store(format!("'{name}' parent is not an object")))?;
            match kind {
                WriteKind::Set(v) => {
                    obj.insert(name.clone(), (*v).clone());
                    Ok(1)
                }
                WriteKind::Push(v) => {
                    let slot = obj.entry(name.clone()).or_insert_with(|| json!([]));
                    let array = slot.as_array_mut().ok_or_else(|| {
                        EngineError::Store(format!("cannot push: '{name}' is not an array"))
                    })?;
                    array.push((*v).clone());
                    Ok(1)
                }
                WriteKind::Pull(matching) => {
                    let Some(slot) = obj.get_mut(name) else {
                        return Ok(0);
                    };
                    let array = slot.as_array_mut().ok_or_else(|| {
                        EngineError::Store(format!("cannot pull: '{name}' is not an array"))
                    })?;
                    let before = array.len();
                    array.retain(|element| !matching.matches(element));
                    Ok(before - array.len())
                }
            }
        }
        [Segment::Field(name), rest @ ..] => match value.get_mut(name.as_str()) {
            Some(child) => apply_write(child, rest, filters, kind),
            None => Ok(0),
        },
        [Segment::Positional(placeholder), rest @ ..] => {
            let filter = filters
                .iter()
                .find(|f| f.placeholder == *placeholder)
                .ok_or_else(|| {
                    EngineError::Store(format!("no array filter bound to '$[{placeholder}]'"))
                })?;
            let array = value.as_array_mut().ok_or_else(|| {
                EngineError::Store(format!(
                    "positional '$[{placeholder}]' applied to a non-array"
                ))
            })?;
            let mut applied = 0;
            for element in array.iter_mut() {
                if filter.matches(element) {
                    applied += apply_write(element, rest, filters, kind)?;
                }
            }
            Ok(applied)
        }
    }
}

fn filter_array(document: &mut Document, array: &str, field: &str, equals: &JsonValue) {
    if let Some(elements) = document.get_mut(array).and_then(JsonValue::as_array_mut) {
        elements.retain(|element| element.get(field) == Some(equals));
    }
}

fn map_merge_filtered(
    document: &mut Document,
    outer: &str,
    inner: &str,
    field: &str,
    equals: &JsonValue,
) {
    let Some(elements) = document.get_mut(outer).and_then(JsonValue::as_array_mut) else {
        return;
    };
    for element in elements.iter_mut() {
        if let Some(sub) = element.get_mut(inner).and_then(JsonValue::as_array_mut) {
            sub.retain(|item| item.get(field) == Some(equals));
        }
    }
}
