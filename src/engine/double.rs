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
const SUB_ELEMENT: &str = "sub-element";
const SUB_SUB_ELEMENT: &str = "sub-sub-element";
const SOFT_DELETED_SUB_SUB_ELEMENTS: &str = "soft-deleted sub-sub-elements";

/// Positional placeholders binding the outer element and the middle
/// sub-element by id.
const ELEM1: &str = "elem1";
const ELEM2: &str = "elem2";

/// Depth-3 engine: lifecycle operations for items three arrays deep
/// (`parent -> outer[] -> mid[] -> inner[]`).
///
/// Writes carry two independent positional filters, one per owner level,
/// so a single atomic update lands on the innermost array of one
/// specific sub-element: `outer.$[elem1].mid.$[elem2].inner`. Every
/// write therefore re-derives the full owner chain parent id ->
/// element id -> sub-element id.
pub struct DoubleNestedArrayEngine<S, E> {
    store: Arc<S>,
    collection: String,
    _element: PhantomData<fn() -> E>,
}

impl<S, E> DoubleNestedArrayEngine<S, E>
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

    /// Appends `data` to the innermost array addressed by the owner
    /// chain, returning the new item re-located by its generated id.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        actor: ActorId,
        data: impl Serialize + Send,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, mid, inner).await?;
        let (item_id, envelope) = lifecycle::new_element(data, actor)?;

        let update = Update::new().push(self.inner_path(outer, mid, inner), envelope);
        let options = self.owner_filters(element_id, sub_id);
        let updated = self
            .store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            outer = outer.name(),
            mid = mid.name(),
            inner = inner.name(),
            %item_id,
            "appended sub-sub-element"
        );

        let (_, sub) = self.owner_chain(&updated, outer, mid, element_id, sub_id)?;
        let item = lifecycle::find_element(array_of(sub, inner.name()), item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        decode(item)
    }

    /// Active view: the whole owner chain must be active and the item
    /// itself not soft-deleted.
    #[allow(clippy::too_many_arguments)]
    pub async fn find_by_id(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let (element, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        if lifecycle::is_deleted(element) {
            return Err(EngineError::not_found(ELEMENT, element_id));
        }
        if lifecycle::is_deleted(sub) {
            return Err(EngineError::not_found(SUB_ELEMENT, sub_id));
        }
        let item = lifecycle::find_element(array_of(sub, inner.name()), item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        if lifecycle::is_deleted(item) {
            return Err(EngineError::not_found(SUB_SUB_ELEMENT, item_id));
        }
        decode(item)
    }

    /// Includes soft-deleted items (and soft-deleted owners).
    #[allow(clippy::too_many_arguments)]
    pub async fn find_by_id_any(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let parent = self.load_parent_active(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        let item = lifecycle::find_element(array_of(sub, inner.name()), item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        decode(item)
    }

    /// All active items of the innermost array, in insertion order.
    pub async fn list(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        array_of(sub, inner.name())
            .iter()
            .filter(|item| !lifecycle::is_deleted(item))
            .map(decode)
            .collect()
    }

    /// All soft-deleted items of the innermost array.
    pub async fn find_soft_deleted(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        let parent = self.load_parent_active(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        array_of(sub, inner.name())
            .iter()
            .filter(|item| lifecycle::is_deleted(item))
            .map(decode)
            .collect()
    }

    /// Sets each key of `patch` on the addressed item. The item must be
    /// active.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_in_place(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        actor: ActorId,
        patch: JsonValue,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = lifecycle::patch_entries(patch)?;
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_item_fields(
            parent_id,
            element_id,
            sub_id,
            item_id,
            entries,
            ElementState::Active,
            outer,
            mid,
            inner,
        )
        .await
    }

    /// Active -> SoftDeleted.
    #[allow(clippy::too_many_arguments)]
    pub async fn soft_delete(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        actor: ActorId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(true));
        entries.insert(DELETED_BY.into(), json!(actor));
        self.set_item_fields(
            parent_id,
            element_id,
            sub_id,
            item_id,
            entries,
            ElementState::Active,
            outer,
            mid,
            inner,
        )
        .await
    }

    /// SoftDeleted -> Active.
    #[allow(clippy::too_many_arguments)]
    pub async fn restore(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        actor: ActorId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        let mut entries = serde_json::Map::new();
        entries.insert(DELETED.into(), json!(false));
        entries.insert(UPDATED_BY.into(), json!(actor));
        self.set_item_fields(
            parent_id,
            element_id,
            sub_id,
            item_id,
            entries,
            ElementState::SoftDeleted,
            outer,
            mid,
            inner,
        )
        .await
    }

    /// SoftDeleted -> Purged. Returns the pre-purge snapshot.
    #[allow(clippy::too_many_arguments)]
    pub async fn purge_one(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, mid, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        let item = lifecycle::find_element(array_of(sub, inner.name()), item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        lifecycle::ensure_state(item, SUB_SUB_ELEMENT, ElementState::SoftDeleted)?;
        let snapshot = decode(item)?;

        let update =
            Update::new().pull(self.inner_path(outer, mid, inner), PullMatch::id_eq(item_id));
        let options = self.owner_filters(element_id, sub_id);
        self.store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, %item_id, "purged sub-sub-element");
        Ok(snapshot)
    }

    /// Removes every soft-deleted item inside one identified sub-element
    /// in a single atomic pull, returning their snapshots. `NotFound`
    /// when there is nothing to purge.
    pub async fn purge_all_soft_deleted(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<Vec<E>> {
        self.guard(outer, mid, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        let snapshots: Vec<E> = array_of(sub, inner.name())
            .iter()
            .filter(|item| lifecycle::is_deleted(item))
            .map(decode)
            .collect::<Result<_>>()?;
        if snapshots.is_empty() {
            return Err(EngineError::not_found(SOFT_DELETED_SUB_SUB_ELEMENTS, sub_id));
        }

        let update =
            Update::new().pull(self.inner_path(outer, mid, inner), PullMatch::new(DELETED, true));
        let options = self.owner_filters(element_id, sub_id);
        self.store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(
            collection = %self.collection,
            %sub_id,
            purged = snapshots.len(),
            "purged all soft-deleted sub-sub-elements"
        );
        Ok(snapshots)
    }

    /// Shared write path for the set-style transitions: rewrites the
    /// innermost array with the target item patched, addressed through
    /// both owner filters in one atomic update.
    #[allow(clippy::too_many_arguments)]
    async fn set_item_fields(
        &self,
        parent_id: DocumentId,
        element_id: DocumentId,
        sub_id: DocumentId,
        item_id: DocumentId,
        entries: serde_json::Map<String, JsonValue>,
        required: ElementState,
        outer: &ArrayField,
        mid: &ArrayField,
        inner: &ArrayField,
    ) -> Result<E> {
        self.guard(outer, mid, inner).await?;
        let parent = self.load_parent(parent_id).await?;
        let (_, sub) = self.owner_chain(&parent, outer, mid, element_id, sub_id)?;
        let items = array_of(sub, inner.name());
        let item = lifecycle::find_element(items, item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        lifecycle::ensure_state(item, SUB_SUB_ELEMENT, required)?;

        let mut rebuilt = items.to_vec();
        for candidate in rebuilt.iter_mut() {
            if lifecycle::element_id(candidate) == Some(item_id) {
                let object = candidate
                    .as_object_mut()
                    .ok_or_else(|| EngineError::Store("sub-sub-element is not an object".into()))?;
                for (key, value) in &entries {
                    object.insert(key.clone(), value.clone());
                }
            }
        }

        let update =
            Update::new().set(self.inner_path(outer, mid, inner), JsonValue::Array(rebuilt));
        let options = self.owner_filters(element_id, sub_id);
        let updated = self
            .store
            .find_one_and_update(&self.collection, Filter::by_id(parent_id), update, options)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, parent_id))?;
        debug!(collection = %self.collection, %sub_id, %item_id, "updated sub-sub-element");

        let (_, sub) = self.owner_chain(&updated, outer, mid, element_id, sub_id)?;
        let item = lifecycle::find_element(array_of(sub, inner.name()), item_id)
            .ok_or_else(|| EngineError::not_found(SUB_SUB_ELEMENT, item_id))?;
        decode(item)
    }

    /// `outer.$[elem1].mid.$[elem2].inner`
    fn inner_path(&self, outer: &ArrayField, mid: &ArrayField, inner: &ArrayField) -> FieldPath {
        FieldPath::field(outer.name())
            .positional(ELEM1)
            .then(mid.name())
            .positional(ELEM2)
            .then(inner.name())
    }

    fn owner_filters(&self, element_id: DocumentId, sub_id: DocumentId) -> UpdateOptions {
        UpdateOptions::returning_updated()
            .array_filter(ArrayFilter::id_eq(ELEM1, element_id))
            .array_filter(ArrayFilter::id_eq(ELEM2, sub_id))
    }

    /// Walks parent -> element -> sub-element, failing with `NotFound`
    /// at the first missing link.
    fn owner_chain<'a>(
        &self,
        parent: &'a Document,
        outer: &ArrayField,
        mid: &ArrayField,
        element_id: DocumentId,
        sub_id: DocumentId,
    ) -> Result<(&'a JsonValue, &'a JsonValue)> {
        let element = lifecycle::find_element(array_of(parent, outer.name()), element_id)
            .ok_or_else(|| EngineError::not_found(ELEMENT, element_id))?;
        let sub = lifecycle::find_element(array_of(element, mid.name()), sub_id)
            .ok_or_else(|| EngineError::not_found(SUB_ELEMENT, sub_id))?;
        Ok((element, sub))
    }

    async fn guard(&self, outer: &ArrayField, mid: &ArrayField, inner: &ArrayField) -> Result<()> {
        let schema = self.store.schema(&self.collection).await?;
        FieldTypeGuard::assert_double_nested_array_field(
            &schema,
            outer.name(),
            mid.name(),
            inner.name(),
        )?;
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
