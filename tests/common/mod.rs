#![allow(dead_code)]

use std::sync::Arc;

use docnest::{ArrayField, CollectionSchema, DocumentService, ElementSchema, MemoryStore};
use serde_json::{Value, json};
use uuid::Uuid;

pub const QUESTIONS: ArrayField = ArrayField::new("questions");
pub const OPTIONS: ArrayField = ArrayField::new("options");
pub const TAGS: ArrayField = ArrayField::new("tags");

/// quizzes -> questions[] -> options[] -> tags[]
pub fn quiz_schema() -> CollectionSchema {
    CollectionSchema::new("quizzes").scalar_field("title").array_field(
        "questions",
        ElementSchema::new().scalar_field("text").array_field(
            "options",
            ElementSchema::new()
                .scalar_field("label")
                .array_field("tags", ElementSchema::new().scalar_field("name")),
        ),
    )
}

pub async fn quiz_store() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.register_collection(quiz_schema()).await.unwrap();
    Arc::new(store)
}

pub async fn create_quiz(store: &Arc<MemoryStore>, actor: Uuid) -> Uuid {
    let service: DocumentService<_, Value> = DocumentService::new(store.clone(), "quizzes");
    let quiz = service
        .create(actor, json!({ "title": "sample quiz" }))
        .await
        .unwrap();
    id_of(&quiz)
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}
