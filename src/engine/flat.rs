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
    ArrayField, ArrayFilter, DocumentStore, FieldPath, Filter, PullMatch, Update, UpdateOptions,
};

const DOCUMENT: &str = "document";
const ELEMENT: &str = "element";
const SOFT_DELETED_ELEMENTS: &str = "soft-deleted elements";

/// Positional placeholder binding the targeted element by id.
const ELEM: &str = "elem";

/// Depth-1 engine: lifecycle operations for elements living in an array
/// field directly on a parent document.
///
/// `E` is the typed view of an element; reads and writes return it
/// deserialized from the stored envelope. The engine is reusable across
/// any number of array fields of the collection; the field is selected
/// per call.
pub struct FlatArrayEngine<S, E> {
    store: Arc<S>,
    collection: String,
    _element: PhantomData<fn() -> E>,
}

impl<S, E> FlatArrayEngine<S, E>
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

    /// Appends `data` to `field`, stamping the envelope, and returns the
    /// new element re-located by its client-side generated id.
    pub async fn append(
        &self,
        parent_id: DocumentId,
        actor: ActorId,
        data: impl Serialize + Send,
        field: &ArrayField,
    ) -> Result<E> {
        self.guard(field).await?;
        let (element_id, envelope) = lifecycle::new_element(data, actor)?;

        let update = Update::new().push(FieldPath::field(field.name()), envelope);
        let updated = self
            .store
            .find_one_and_update(
                &self.collection,
                Filter::by_id(parent_id),
                update,
                UpdateOptions::returning_updated(),
            )
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            field = field.name(),
            %element_id,
            "appended element"
        );

        let element = lifecycle::find_element(elements(&updated, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        decode(element)
    }

    /// Active view: soft-deleted elements read as absent.
    pub async fn find_by_id(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        field: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = lifecycle::find_element(elements(&parent, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        if lifecycle::is_deleted(element) {
            return Err(EngineError::not_found(ELEMENT, element_id));
        }
        decode(element)
    }

    /// Like [`find_by_id`](Self::find_by_id) but includes soft-deleted
    /// elements.
    pub async fn find_by_id_any(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        field: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let element = lifecycle::find_element(elements(&parent, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        decode(element)
    }

    /// All active elements of `field`, in insertion order.
    pub async fn list(&self, parent_id: DocumentId, field: &ArrayField) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        elements(&parent, field)
            .iter()
            .filter(|el| !lifecycle::is_deleted(el))
            .map(decode)
            .collect()
    }

    /// All soft-deleted elements of `field`, in insertion order.
    pub async fn find_soft_deleted(
        &self,
        parent_id: DocumentId,
        field: &ArrayField,
    ) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        elements(&parent, field)
            .iter()
            .filter(|el| lifecycle::is_deleted(el))
            .map(decode)
            .collect()
    }

    /// Sets each key of `patch` on the addressed element in one atomic
    /// positional-filter update. The element must be active.
    pub async fn update_in_place(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        actor: ActorId,
        patch: JsonValue,
        field: &ArrayField,
    ) -> Result<E> {
        let mut entries = lifecycle::patch_entries(patch)?;
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_element_fields(parent_id, element_id, entries, ElementState::Active, field)
            .await
    }

    /// Active -> SoftDeleted.
    pub async fn soft_delete(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        actor: ActorId,
        field: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(true));
        entries.insert(DELETED_BY.into(), json!(actor));
        self.set_element_fields(parent_id, element_id, entries, ElementState::Active, field)
            .await
    }

    /// SoftDeleted -> Active.
    pub async fn restore(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        actor: ActorId,
        field: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(false));
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_element_fields(parent_id, element_id, entries, ElementState::SoftDeleted, field)
            .await
    }

    /// SoftDeleted -> Purged. Returns the pre-purge snapshot. Purging an
    /// active element is a `Conflict`; it must be soft-deleted first.
    pub async fn purge_one(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        field: &ArrayField,
    ) -> Result<E> {
        self.guard(field).await?;
        let parent = self.load_parent(parent_id).await?;
        let element = lifecycle::find_element(elements(&parent, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        lifecycle::ensure_state(element, ELEMENT, ElementState::SoftDeleted)?;
        let snapshot = decode(element)?;

        let update =
            Update::new().pull(FieldPath::field(field.name()), PullMatch::id_eq(element_id));
        self.store
            .find_one_and_update(
                &self.collection,
                Filter::by_id(parent_id),
                update,
                UpdateOptions::returning_updated(),
            )
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, field = field.name(), %element_id, "purged element");
        Ok(snapshot)
    }

    /// Removes every soft-deleted element of `field` in one atomic pull,
    /// returning their pre-purge snapshots. `NotFound` when there is
    /// nothing to purge.
    pub async fn purge_all_soft_deleted(
        &self,
        parent_id: DocumentId,
        field: &ArrayField,
    ) -> Result<Vec<E>> {
        self.guard(field).await?;
        let parent = self.load_parent(parent_id).await?;
        let snapshots: Vec<E> = elements(&parent, field)
            .iter()
            .filter(|el| lifecycle::is_deleted(el))
            .map(decode)
            .collect::<Result<_>>()?;
        if snapshots.is_empty() {
            return Err(EngineError::not_found(SOFT_DELETED_ELEMENTS, parent_id));
        }

        let update =
            Update::new().pull(FieldPath::field(field.name()), PullMatch::new(DELETED, true));
        self.store
            .find_one_and_update(
                &self.collection,
                Filter::by_id(parent_id),
                update,
                UpdateOptions::returning_updated(),
            )
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            field = field.name(),
            purged = snapshots.len(),
            "purged all soft-deleted elements"
        );
        Ok(snapshots)
    }

    /// Shared write path for the set-style transitions: checks the state
    /// machine, then issues one atomic `$set` per entry through the
    /// positional filter binding the element by id.
    async fn set_element_fields(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        entries: serde_json::Map<String, JsonValue>,
        required: ElementState,
        field: &ArrayField,
    ) -> Result<E> {
        self.guard(field).await?;
        let parent = self.load_parent(parent_id).await?;
        let element = lifecycle::find_element(elements(&parent, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        lifecycle::ensure_state(element, ELEMENT, required)?;

        let mut update = Update::new();
        for (key, value) in entries {
            update = update.set(
                FieldPath::field(field.name()).positional(ELEM).then(key),
                value,
            );
        }
        let options = UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM, element_id));
        let updated = self
            .store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, field = field.name(), %element_id, "updated element");

        let element = lifecycle::find_element(elements(&updated, field), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        decode(element)
    }

    async fn guard(&self, field: &ArrayField) -> Result<()> {
        let schema = self.store.schema(&self.collection).await?;
        FieldTypeGuard::assert_array_field(&schema, field.name())?;
        Ok(())
    }

    async fn load_parent(&self, parent_id: DocumentId) -> Result<Document> {
        self.store
            .find_by_id(&self.collection, parent_id)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))
    }

    /// Reads require the parent itself to be active.
    async fn load_parent_active(&self, parent_id: DocumentId) -> Result<Document> {
        let parent = self.load_parent(parent_id).await?;
        if lifecycle::is_deleted(&parent) {
            return Err(EngineError::not_found(DOCUMENT, parent_id));
        }
        Ok(parent)
    }
}

fn elements<'a>(parent: &'a Document, field: &ArrayField) -> &'a [JsonValue] {
    parent
        .get(field.name())
        .and_then(JsonValue::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn decode<E: DeserializeOwned>(element: &JsonValue) -> Result<E> {
    Ok(serde_json::from_value(element.clone())?)
}
