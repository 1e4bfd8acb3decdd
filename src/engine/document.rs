use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::debug;
use uuid::Uuid;

use super::lifecycle::{self, CREATED_BY, DELETED, DELETED_BY, ElementState, ID, UPDATED_BY};
use crate::core::{ActorId, Document, DocumentId, EngineError, Result, types::now_rfc3339};
use crate::store::{DocumentStore, FieldPath, Filter, Update, UpdateOptions};

const DOCUMENT: &str = "document";

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Depth-0 service: top-level document CRUD with audit fields, the base
/// case the array engines build on. Domain services typically hold one
/// of these for the parent model next to the array engines for its
/// nested collections.
///
/// `P` is the typed view of a parent document.
pub struct DocumentService<S, P> {
    store: Arc<S>,
    collection: String,
    _parent: PhantomData<fn() -> P>,
}

impl<S, P> DocumentService<S, P>
where
    S: DocumentStore,
    P: DeserializeOwned,
{
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            _parent: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Creates a document from `data`, stamping the envelope and both
    /// audit timestamps.
    pub async fn create(&self, actor: ActorId, data: impl Serialize + Send) -> Result<P> {
        let mut value = serde_json::to_value(data)?;
        let Some(object) = value.as_object_mut() else {
            return Err(EngineError::Configuration(
                "document data must serialize to a JSON object".into(),
            ));
        };
        let id = Uuid::new_v4();
        let now = now_rfc3339();
        object.insert(ID.into(), json!(id));
        object.insert(DELETED.into(), json!(false));
        object.insert(CREATED_BY.into(), json!(actor));
        object.insert(CREATED_AT.into(), json!(now));
        object.insert(UPDATED_AT.into(), json!(now));

        self.store.insert(&self.collection, value.clone()).await?;
        debug!(collection = %self.collection, %id, "created document");
        decode(&value)
    }

    /// Active view: a soft-deleted document reads as absent.
    pub async fn find_by_id(&self, id: DocumentId) -> Result<P> {
        let document = self.load(id).await?;
        if lifecycle::is_deleted(&document) {
            return Err(EngineError::not_found(DOCUMENT, id));
        }
        decode(&document)
    }

    /// Includes soft-deleted documents.
    pub async fn find_by_id_any(&self, id: DocumentId) -> Result<P> {
        decode(&self.load(id).await?)
    }

    /// Sets each key of `patch` plus `updatedBy`/`updatedAt` in one
    /// atomic update. The document must be active.
    pub async fn update(&self, id: DocumentId, actor: ActorId, patch: JsonValue) -> Result<P> {
        let entries = lifecycle::patch_entries(patch)?;
        let current = self.load(id).await?;
        lifecycle::ensure_state(&current, DOCUMENT, ElementState::Active)?;

        let mut update = Update::new();
        for (key, value) in entries {
            update = update.set(FieldPath::field(key), value);
        }
        update = update
            .set(FieldPath::field(UPDATED_BY), json!(actor))
            .set(FieldPath::field(UPDATED_AT), json!(now_rfc3339()));
        self.write(id, update).await
    }

    /// Active -> SoftDeleted.
    pub async fn soft_delete(&self, id: DocumentId, actor: ActorId) -> Result<P> {
        let current = self.load(id).await?;
        lifecycle::ensure_state(&current, DOCUMENT, ElementState::Active)?;

        let update = Update::new()
            .set(FieldPath::field(DELETED), json!(true))
            .set(FieldPath::field(DELETED_BY), json!(actor))
            .set(FieldPath::field(UPDATED_AT), json!(now_rfc3339()));
        self.write(id, update).await
    }

    /// SoftDeleted -> Active.
    pub async fn restore(&self, id: DocumentId, actor: ActorId) -> Result<P> {
        let current = self.load(id).await?;
        lifecycle::ensure_state(&current, DOCUMENT, ElementState::SoftDeleted)?;

        let update = Update::new()
            .set(FieldPath::field(DELETED), json!(false))
            .set(FieldPath::field(UPDATED_BY), json!(actor))
            .set(FieldPath::field(UPDATED_AT), json!(now_rfc3339()));
        self.write(id, update).await
    }

    /// SoftDeleted -> Purged: physical removal, returning the pre-purge
    /// snapshot. Purging an active document is a `Conflict`.
    pub async fn purge(&self, id: DocumentId) -> Result<P> {
        let current = self.load(id).await?;
        lifecycle::ensure_state(&current, DOCUMENT, ElementState::SoftDeleted)?;
        let snapshot = decode(&current)?;

        if !self.store.delete_by_id(&self.collection, id).await? {
            return Err(EngineError::not_found(DOCUMENT, id));
        }
        debug!(collection = %self.collection, %id, "purged document");
        Ok(snapshot)
    }

    async fn write(&self, id: DocumentId, update: Update) -> Result<P> {
        let updated = self
            .store
            .find_one_and_update(
                &self.collection,
                Filter::by_id(id),
                update,
                UpdateOptions::returning_updated(),
            )
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, id))?;
        debug!(collection = %self.collection, %id, "updated document");
        decode(&updated)
    }

    async fn load(&self, id: DocumentId) -> Result<Document> {
        self.store
            .find_by_id(&self.collection, id)
            .await?
            .ok_or_else(|| EngineError::not_found(DOCUMENT, id))
    }
}

fn decode<P: DeserializeOwned>(document: &JsonValue) -> Result<P> {
    Ok(serde_json::from_value(document.clone())?)
}
