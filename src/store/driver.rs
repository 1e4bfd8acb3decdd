use async_trait::async_trait;

use super::filter::Filter;
use super::pipeline::Pipeline;
use super::update::{Update, UpdateOptions};
use crate::core::{Document, DocumentId, Result};
use crate::schema::CollectionSchema;

/// The document-store capabilities the engines consume. Implementations
/// must make each `find_one_and_update` call atomic at the document
/// level and serialized against other writes to the same document; the
/// engines rely on nothing stronger.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Schema introspection for the field-type guard.
    async fn schema(&self, collection: &str) -> Result<CollectionSchema>;

    /// Inserts a complete document.
    async fn insert(&self, collection: &str, document: Document) -> Result<()>;

    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>>;

    /// Applies `update` to the first document matching `filter`, binding
    /// the positional placeholders in update paths to
    /// `options.array_filters` (at most two independent filters).
    /// Returns `None` when nothing matched.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Filter,
        update: Update,
        options: UpdateOptions,
    ) -> Result<Option<Document>>;

    /// Runs a pipeline and returns the first resulting document.
    async fn aggregate(&self, collection: &str, pipeline: Pipeline) -> Result<Option<Document>>;

    /// Physically removes a document. Returns whether one was removed.
    async fn delete_by_id(&self, collection: &str, id: DocumentId) -> Result<bool>;
}
