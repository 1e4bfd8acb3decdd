use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use super::lifecycle::{self, DELETED, DELETED_BY, ElementState, UPDATED_BY};
use crate::core::{ActorId, Document, DocumentId, EngineError, Result};
use crate::schema::FieldTypeGuard;
use crate::store::{
    ArrayField, ArrayFilter, DocumentStore, FieldPath, Filter, Pipeline, PullMatch, Update,
    UpdateOptions,
};

const DOCUMENT: &str = "document";
const ELEMENT: &str = "element";
const SUB_ELEMENT: &str = "sub-element";
const SOFT_DELETED_SUB_ELEMENTS: &str = "soft-deleted sub-elements";

/// Positional placeholder binding the outer element by id.
const ELEM: &str = "elem";

/// Depth-2 engine: lifecycle operations for sub-elements living in an
/// array field of an element, which itself lives in an array field of
/// the parent document (`parent -> outer[] -> inner[]`).
///
/// Writes address the outer element through a single positional filter;
/// the update path embeds the inner array name
/// (`outer.$[elem].inner`), so one atomic update lands on the inner
/// array belonging to that specific element.
pub struct NestedArrayEngine<S, E> {
    store: Arc<S>,
    collection: String,
    _element: PhantomData<fn() -> E>,
}

impl<S, E> NestedArrayEngine<S, E>
where
    S: DocumentStore,
    E: DeserializeOwned,
{
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _element: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Appends `data` to the inner array of the element addressed by
    /// `element_id`, returning the new sub-element re-located by its
    /// client-side generated id.
    pub async fn append(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        actor: ActorId,
        data: impl Serialize + Send,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, inner).await?;
        let (sub_id, envelope) = lifecycle::new_element(data, actor)?;

        let path = FieldPath::field(outer.name())
            .positional(ELEM)
            .then(inner.name());
        let update = Update::new().push(path, envelope);
        let options = UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM, element_id));
        let updated = self
            .store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            outer = outer.name(),
            inner = inner.name(),
            %sub_id,
            "appended sub-element"
        );

        let element = self.outer_element(&updated, outer, element_id)?;
        let sub = lifecycle::find_element(array_of(element, inner.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        decode(sub)
    }

    /// Active view: the owner chain must be active at both levels and
    /// the sub-element itself not soft-deleted.
    pub async fn find_by_id(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        if lifecycle::is_deleted(element) {
            return Err(EngineError::not_found(ELEMENT, element_id));
        }
        let sub = lifecycle::find_element(array_of(element, inner.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        if lifecycle::is_deleted(sub) {
            return Err(EngineError::not_found(SUB_ELEMENT, sub_id));
        }
        decode(sub)
    }

    /// Includes soft-deleted sub-elements (and soft-deleted owners).
    pub async fn find_by_id_any(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        let sub = lifecycle::find_element(array_of(element, inner.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        decode(sub)
    }

    /// All active sub-elements under one element, in insertion order.
    pub async fn list(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        array_of(element, inner.name())
            .iter()
            .filter(|sub| !lifecycle::is_deleted(sub))
            .map(decode)
            .collect()
    }

    /// All soft-deleted sub-elements under one element.
    pub async fn find_soft_deleted(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        array_of(element, inner.name())
            .iter()
            .filter(|sub| lifecycle::is_deleted(sub))
            .map(decode)
            .collect()
    }

    /// Recursive deleted-state read: one aggregation pass returning the
    /// parent with the outer array filtered to `deleted` and, for each
    /// surviving element, its inner array filtered to the same value.
    pub async fn find_with_deleted_filter(
        &self,
        parent_id: DocumentId,
        deleted: bool,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Document> {
        self.guard(outer, inner).await?;
        let pipeline = Pipeline::new()
            .match_doc(Filter::by_id(parent_id).eq(DELETED, false))
            .filter_array(outer.name(), DELETED, deleted)
            .map_merge_filtered(outer.name(), inner.name(), DELETED, deleted);
        self.store
            .aggregate(&self.collection, pipeline)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))
    }

    /// Sets each key of `patch` on the addressed sub-element. The
    /// sub-element must be active.
    pub async fn update_in_place(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        actor: ActorId,
        patch: JsonValue,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = lifecycle::patch_entries(patch)?;
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_sub_fields(
            parent_id,
            element_id,
            sub_id,
            entries,
            ElementState::Active,
            outer,
            inner,
        )
        .await
    }

    /// Active -> SoftDeleted.
    pub async fn soft_delete(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        actor: ActorId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(true));
        entries.insert(DELETED_BY.into(), json!(actor));
        self.set_sub_fields(
            parent_id,
            element_id,
            sub_id,
            entries,
            ElementState::Active,
            outer,
            inner,
        )
        .await
    }

    /// SoftDeleted -> Active.
    pub async fn restore(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        actor: ActorId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(false));
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_sub_fields(
            parent_id,
            element_id,
            sub_id,
            entries,
            ElementState::SoftDeleted,
            outer,
            inner,
        )
        .await
    }

    /// SoftDeleted -> Purged. Returns the pre-purge snapshot.
    pub async fn purge_one(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        let sub = lifecycle::find_element(array_of(element, inner.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        lifecycle::ensure_state(sub, SUB_ELEMENT, ElementState::SoftDeleted)?;
        let snapshot = decode(sub)?;

        let path = FieldPath::field(outer.name())
            .positional(ELEM)
            .then(inner.name());
        let update = Update::new().pull(path, PullMatch::id_eq(sub_id));
        let options = UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM, element_id));
        self.store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, %sub_id, "purged sub-element");
        Ok(snapshot)
    }

    /// Removes every soft-deleted sub-element under one element in one
    /// atomic pull, returning their snapshots. `NotFound` when there is
    /// nothing to purge.
    pub async fn purge_all_soft_deleted(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        self.guard(outer, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        let snapshots: Vec<E> = array_of(element, inner.name())
            .iter()
            .filter(|sub| lifecycle::is_deleted(sub))
            .map(decode)
            .collect::<Result<_>>()?;
        if snapshots.is_empty() {
            return Err(EngineError::not_found(SOFT_DELETED_SUB_ELEMENTS, element_id));
        }

        let path = FieldPath::field(outer.name())
            .positional(ELEM)
            .then(inner.name());
        let update = Update::new().pull(path, PullMatch::new(DELETED, true));
        let options = UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM, element_id));
        self.store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            %element_id,
            purged = snapshots.len(),
            "purged all soft-deleted sub-elements"
        );
        Ok(snapshots)
    }

    /// Shared write path for the set-style transitions. The inner array
    /// is rewritten with the target sub-element patched, through the one
    /// positional filter binding its owner; the whole write is a single
    /// atomic update. The pre-read is the same read-then-write
    /// precondition window every engine operation has.
    async fn set_sub_fields(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        entries: serde_json::Map<String, JsonValue>,
        required: ElementState,
        outer: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let element = self.outer_element(&parent, outer, element_id)?;
        let subs = array_of(element, inner.name());
        let sub = lifecycle::find_element(subs, sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        lifecycle::ensure_state(sub, SUB_ELEMENT, required)?;

        let mut rebuilt = subs.to_vec();
        for candidate in rebuilt.iter_mut() {
            if lifecycle::element_id(candidate) == Some(sub_id) {
                let object = candidate
                    .as_object_mut()
                    .ok_or_else(|| EngineError::Store("sub-element is not an object".into()))?;
                for (key, value) in &entries {
                    object.insert(key.clone(), value.clone());
                }
            }
        }

        let path = FieldPath::field(outer.name())
            .positional(ELEM)
            .then(inner.name());
        let update = Update::new().set(path, JsonValue::Array(rebuilt));
        let options = UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM, element_id));
        let updated = self
            .store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, %element_id, %sub_id, "updated sub-element");

        let element = self.outer_element(&updated, outer, element_id)?;
        let sub = lifecycle::find_element(array_of(element, inner.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        decode(sub)
    }

    fn outer_element<'a>(
        &self,
        parent: &'a Document,
        outer: &ArrayField,
        element_id: DocumentId,
    ) -> Result<&'a JsonValue> {
        lifecycle::find_element(array_of(parent, outer.name()), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))
    }

    async fn guard(&self, outer: &ArrayField, inner: &ArrayField) -> Result<()> {
        let schema = self.store.schema(&self.collection).await?;
        FieldTypeGuard::assert_nested_array_field(&schema, outer.name(), inner.name())?;
        Ok(())
    }

    async fn load_parent(&self, parent_id: DocumentId) -> Result<Document> {
        self.store
            .find_by_id(&self.collection, parent_id)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))
    }

    async fn load_parent_active(&self, parent_id: DocumentId) -> Result<Document> {
        let parent = self.load_parent(parent_id).await?;
        if lifecycle::is_deleted(&parent) {
            return Err(EngineError::not_found(DOCUMENT, parent_id));
        }
        Ok(parent)
    }
}

fn array_of<'a>(value: &'a JsonValue, name: &str) -> &'a [JsonValue] {
    value
        .get(name)
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn decode<E: DeserializeOwned>(element: &JsonValue) -> Result<E> {
    Ok(serde_json::from_value(element.clone())?)
}
