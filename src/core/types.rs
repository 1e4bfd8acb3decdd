use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A stored document. Always a JSON object at rest; the alias exists so
/// signatures say what they mean.
pub type Document = JsonValue;

/// Identifier of a parent document or of an element at any nesting depth.
/// Generated client-side (v4) before insertion, never by the store.
pub type DocumentId = Uuid;

/// Identifier of the user performing an operation, recorded in the
/// `createdBy`/`updatedBy`/`deletedBy` audit fields.
pub type ActorId = Uuid;

/// Current UTC time as an RFC 3339 string, the format audit timestamps
/// are stored in.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
