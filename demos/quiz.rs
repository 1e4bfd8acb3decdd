//! Quiz Domain Service Demo
//!
//! Shows the pattern domain services follow: own a parent collection,
//! instantiate the engines once, and expose narrow named methods that
//! forward to them with fixed field selectors. Quizzes own questions,
//! questions own options, options own tags.
//!
//! Run with: cargo run --example quiz_demo

use std::sync::Arc;

use docnest::{
    ArrayField, CollectionSchema, DocumentService, DoubleNestedArrayEngine, ElementSchema,
    FlatArrayEngine, MemoryStore, NestedArrayEngine, Result,
};
use serde_json::{Value, json};
use uuid::Uuid;

const QUESTIONS: ArrayField = ArrayField::new("questions");
const OPTIONS: ArrayField = ArrayField::new("options");
const TAGS: ArrayField = ArrayField::new("tags");

/// The narrow, named surface a transport layer would call. Everything
/// forwards to the generic engines with the field selectors above.
struct QuizService {
    quizzes: DocumentService<MemoryStore, Value>,
    questions: FlatArrayEngine<MemoryStore, Value>,
    options: NestedArrayEngine<MemoryStore, Value>,
    tags: DoubleNestedArrayEngine<MemoryStore, Value>,
}

impl QuizService {
    fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            quizzes: DocumentService::new(store.clone(), "quizzes"),
            questions: FlatArrayEngine::new(store.clone(), "quizzes"),
            options: NestedArrayEngine::new(store.clone(), "quizzes"),
            tags: DoubleNestedArrayEngine::new(store, "quizzes"),
        }
    }

    async fn create_quiz(&self, actor: Uuid, title: &str) -> Result<Value> {
        self.quizzes.create(actor, json!({ "title": title })).await
    }

    async fn add_question(&self, quiz: Uuid, actor: Uuid, text: &str) -> Result<Value> {
        self.questions
            .append(quiz, actor, json!({ "text": text }), &QUESTIONS)
            .await
    }

    async fn add_option(
        &self,
        quiz: Uuid,
        question: Uuid,
        actor: Uuid,
        label: &str,
    ) -> Result<Value> {
        self.options
            .append(quiz, question, actor, json!({ "label": label }), &QUESTIONS, &OPTIONS)
            .await
    }

    async fn add_tag(
        &self,
        quiz: Uuid,
        question: Uuid,
        option: Uuid,
        actor: Uuid,
        name: &str,
    ) -> Result<Value> {
        self.tags
            .append(
                quiz,
                question,
                option,
                actor,
                json!({ "name": name }),
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await
    }

    async fn remove_option(
        &self,
        quiz: Uuid,
        question: Uuid,
        option: Uuid,
        actor: Uuid,
    ) -> Result<Value> {
        self.options
            .soft_delete(quiz, question, option, actor, &QUESTIONS, &OPTIONS)
            .await
    }

    async fn restore_option(
        &self,
        quiz: Uuid,
        question: Uuid,
        option: Uuid,
        actor: Uuid,
    ) -> Result<Value> {
        self.options
            .restore(quiz, question, option, actor, &QUESTIONS, &OPTIONS)
            .await
    }

    async fn empty_option_trash(&self, quiz: Uuid, question: Uuid) -> Result<Vec<Value>> {
        self.options
            .purge_all_soft_deleted(quiz, question, &QUESTIONS, &OPTIONS)
            .await
    }
}

fn id_of(value: &Value) -> Uuid {
    value["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== docnest Quiz Demo ===\n");

    let store = Arc::new(MemoryStore::new());
    store
        .register_collection(
            CollectionSchema::new("quizzes").scalar_field("title").array_field(
                "questions",
                ElementSchema::new().scalar_field("text").array_field(
                    "options",
                    ElementSchema::new()
                        .scalar_field("label")
                        .array_field("tags", ElementSchema::new().scalar_field("name")),
                ),
            ),
        )
        .await?;
    let service = QuizService::new(store);
    let teacher = Uuid::new_v4();

    println!("1. Creating a quiz...");
    let quiz = service.create_quiz(teacher, "Ownership basics").await?;
    let quiz_id = id_of(&quiz);
    println!("✓ Quiz {} created\n", quiz_id);

    println!("2. Adding a question with three options...");
    let question = service.add_question(quiz_id, teacher, "Who owns a moved value?").await?;
    let question_id = id_of(&question);
    let mut option_ids = Vec::new();
    for label in ["The caller", "The callee", "Both"] {
        let option = service.add_option(quiz_id, question_id, teacher, label).await?;
        option_ids.push(id_of(&option));
    }
    println!("✓ Question {} has {} options\n", question_id, option_ids.len());

    println!("3. Tagging the correct answer (depth 3)...");
    let tag = service
        .add_tag(quiz_id, question_id, option_ids[1], teacher, "correct")
        .await?;
    println!("✓ Tag {} on option {}\n", id_of(&tag), option_ids[1]);

    println!("4. Soft-deleting the joke option...");
    let removed = service
        .remove_option(quiz_id, question_id, option_ids[2], teacher)
        .await?;
    println!("✓ Option {} is now {}\n", id_of(&removed), removed["deleted"]);

    println!("5. Changing our mind: restore, then delete again...");
    service.restore_option(quiz_id, question_id, option_ids[2], teacher).await?;
    service.remove_option(quiz_id, question_id, option_ids[2], teacher).await?;
    println!("✓ Restored and re-deleted\n");

    println!("6. Emptying the trash for this question...");
    let purged = service.empty_option_trash(quiz_id, question_id).await?;
    println!("✓ Purged {} option(s)\n", purged.len());

    println!("7. Trying to purge again...");
    match service.empty_option_trash(quiz_id, question_id).await {
        Err(err) => println!("✓ Rejected as expected: {err}\n"),
        Ok(_) => println!("✗ unexpectedly purged something\n"),
    }

    println!("=== Demo complete ===");
    Ok(())
}
