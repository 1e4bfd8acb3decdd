// ============================================================================
// docnest Library
// ============================================================================

//! Generic nested-array document lifecycle engine.
//!
//! Items living at one, two, or three levels of array nesting inside a
//! JSON parent document get uniform create / read / update /
//! soft-delete / restore / hard-delete semantics, driven through
//! dynamically built field paths and positional array filters against a
//! pluggable document store.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use docnest::{
//!     ArrayField, CollectionSchema, DocumentService, ElementSchema, FlatArrayEngine,
//!     MemoryStore,
//! };
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store
//!     .register_collection(
//!         CollectionSchema::new("courses")
//!             .scalar_field("title")
//!             .array_field("modules", ElementSchema::new().scalar_field("name")),
//!     )
//!     .await
//!     .unwrap();
//!
//! let actor = uuid::Uuid::new_v4();
//!
//! let courses: DocumentService<_, Value> = DocumentService::new(store.clone(), "courses");
//! let course = courses.create(actor, json!({ "title": "Rust" })).await.unwrap();
//! let course_id = course["id"].as_str().unwrap().parse().unwrap();
//!
//! const MODULES: ArrayField = ArrayField::new("modules");
//! let modules: FlatArrayEngine<_, Value> = FlatArrayEngine::new(store, "courses");
//!
//! let module = modules
//!     .append(course_id, actor, json!({ "name": "Intro" }), &MODULES)
//!     .await
//!     .unwrap();
//! assert_eq!(module["name"], "Intro");
//! assert_eq!(module["deleted"], false);
//! # });
//! ```

pub mod core;
pub mod engine;
pub mod schema;
pub mod store;

// Re-export main types for convenience
pub use self::core::{ActorId, Document, DocumentId, EngineError, Result};
pub use engine::{
    DocumentService, DoubleNestedArrayEngine, ElementState, FlatArrayEngine, NestedArrayEngine,
};
pub use schema::{CollectionSchema, ElementSchema, FieldKind, FieldTypeGuard};
pub use store::{
    ArrayField, ArrayFilter, DocumentStore, FieldPath, Filter, MemoryStore, Pipeline, PullMatch,
    Update, UpdateOptions,
};
