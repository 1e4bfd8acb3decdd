mod common;

use common::{OPTIONS, QUESTIONS, TAGS, create_quiz, id_of, quiz_store};
use docnest::{DoubleNestedArrayEngine, FlatArrayEngine, MemoryStore, NestedArrayEngine};
use serde_json::{Value, json};
use uuid::Uuid;

struct Fixture {
    tags: DoubleNestedArrayEngine<MemoryStore, Value>,
    quiz_id: Uuid,
    question_id: Uuid,
    option_id: Uuid,
    actor: Uuid,
}

impl Fixture {
    async fn append_tag(&self, name: &str) -> Value {
        self.tags
            .append(
                self.quiz_id,
                self.question_id,
                self.option_id,
                self.actor,
                json!({ "name": name }),
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await
            .unwrap()
    }
}

async fn setup() -> Fixture {
    let store = quiz_store().await;
    let actor = Uuid::new_v4();
    let quiz_id = create_quiz(&store, actor).await;

    let questions: FlatArrayEngine<_, Value> = FlatArrayEngine::new(store.clone(), "quizzes");
    let question = questions
        .append(quiz_id, actor, json!({ "text": "q" }), &QUESTIONS)
        .await
        .unwrap();
    let question_id = id_of(&question);

    let options: NestedArrayEngine<_, Value> = NestedArrayEngine::new(store.clone(), "quizzes");
    let option = options
        .append(quiz_id, question_id, actor, json!({ "label": "A" }), &QUESTIONS, &OPTIONS)
        .await
        .unwrap();

    Fixture {
        tags: DoubleNestedArrayEngine::new(store, "quizzes"),
        quiz_id,
        question_id,
        option_id: id_of(&option),
        actor,
    }
}

#[tokio::test]
async fn append_then_find_at_depth_three() -> anyhow::Result<()> {
    let fx = setup().await;

    let tag = fx.append_tag("rust").await;
    assert_eq!(tag["name"], "rust");
    assert_eq!(tag["deleted"], false);
    assert_eq!(tag["createdBy"], json!(fx.actor));

    let found = fx
        .tags
        .find_by_id(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            id_of(&tag),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(found, tag);
    Ok(())
}

#[tokio::test]
async fn broken_owner_chain_is_not_found() {
    let fx = setup().await;

    let err = fx
        .tags
        .append(
            fx.quiz_id,
            fx.question_id,
            Uuid::new_v4(),
            fx.actor,
            json!({ "name": "x" }),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = fx
        .tags
        .append(
            fx.quiz_id,
            Uuid::new_v4(),
            fx.option_id,
            fx.actor,
            json!({ "name": "x" }),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn ordering_holds_at_depth_three() -> anyhow::Result<()> {
    let fx = setup().await;
    for name in ["a", "b", "c"] {
        let tag = fx.append_tag(name).await;
        assert_eq!(tag["name"], name);
    }

    let listed = fx
        .tags
        .list(fx.quiz_id, fx.question_id, fx.option_id, &QUESTIONS, &OPTIONS, &TAGS)
        .await?;
    let names: Vec<&str> = listed.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["a", "b", "c"]);
    Ok(())
}

#[tokio::test]
async fn update_in_place_at_depth_three() -> anyhow::Result<()> {
    let fx = setup().await;
    let a = fx.append_tag("a").await;
    let b = fx.append_tag("b").await;

    let editor = Uuid::new_v4();
    let updated = fx
        .tags
        .update_in_place(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            id_of(&b),
            editor,
            json!({ "name": "b2" }),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(updated["name"], "b2");
    assert_eq!(updated["updatedBy"], json!(editor));

    let untouched = fx
        .tags
        .find_by_id(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            id_of(&a),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(untouched["name"], "a");
    Ok(())
}

#[tokio::test]
async fn state_machine_parity_at_depth_three() -> anyhow::Result<()> {
    let fx = setup().await;
    let tag = fx.append_tag("t").await;
    let tid = id_of(&tag);

    let err = fx
        .tags
        .purge_one(fx.quiz_id, fx.question_id, fx.option_id, tid, &QUESTIONS, &OPTIONS, &TAGS)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let remover = Uuid::new_v4();
    let deleted = fx
        .tags
        .soft_delete(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            tid,
            remover,
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["deletedBy"], json!(remover));

    assert!(
        fx.tags
            .find_by_id(fx.quiz_id, fx.question_id, fx.option_id, tid, &QUESTIONS, &OPTIONS, &TAGS)
            .await
            .unwrap_err()
            .is_not_found()
    );
    let soft_deleted = fx
        .tags
        .find_soft_deleted(fx.quiz_id, fx.question_id, fx.option_id, &QUESTIONS, &OPTIONS, &TAGS)
        .await?;
    assert_eq!(soft_deleted.len(), 1);

    let restored = fx
        .tags
        .restore(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            tid,
            fx.actor,
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(restored["deleted"], false);
    assert!(
        fx.tags
            .restore(
                fx.quiz_id,
                fx.question_id,
                fx.option_id,
                tid,
                fx.actor,
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await
            .unwrap_err()
            .is_conflict()
    );

    fx.tags
        .soft_delete(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            tid,
            fx.actor,
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    let snapshot = fx
        .tags
        .purge_one(fx.quiz_id, fx.question_id, fx.option_id, tid, &QUESTIONS, &OPTIONS, &TAGS)
        .await?;
    assert_eq!(id_of(&snapshot), tid);
    assert!(
        fx.tags
            .find_by_id_any(
                fx.quiz_id,
                fx.question_id,
                fx.option_id,
                tid,
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await
            .unwrap_err()
            .is_not_found()
    );
    Ok(())
}

#[tokio::test]
async fn purge_all_inside_one_sub_element() -> anyhow::Result<()> {
    let fx = setup().await;

    let mut deleted_ids = Vec::new();
    for name in ["x", "y", "z"] {
        let tag = fx.append_tag(name).await;
        let tid = id_of(&tag);
        fx.tags
            .soft_delete(
                fx.quiz_id,
                fx.question_id,
                fx.option_id,
                tid,
                fx.actor,
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await?;
        deleted_ids.push(tid);
    }
    let keep = fx.append_tag("keep").await;

    let purged = fx
        .tags
        .purge_all_soft_deleted(
            fx.quiz_id,
            fx.question_id,
            fx.option_id,
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    let purged_ids: Vec<Uuid> = purged.iter().map(id_of).collect();
    assert_eq!(purged_ids, deleted_ids);

    let remaining = fx
        .tags
        .list(fx.quiz_id, fx.question_id, fx.option_id, &QUESTIONS, &OPTIONS, &TAGS)
        .await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(id_of(&remaining[0]), id_of(&keep));

    assert!(
        fx.tags
            .purge_all_soft_deleted(
                fx.quiz_id,
                fx.question_id,
                fx.option_id,
                &QUESTIONS,
                &OPTIONS,
                &TAGS,
            )
            .await
            .unwrap_err()
            .is_not_found()
    );
    Ok(())
}

#[tokio::test]
async fn sibling_sub_elements_are_untouched_by_depth_three_writes() -> anyhow::Result<()> {
    // two options under the same question, each with a tag; a depth-3
    // write addressed to one option must not touch the other's tags
    let store = quiz_store().await;
    let actor = Uuid::new_v4();
    let quiz_id = create_quiz(&store, actor).await;

    let questions: FlatArrayEngine<_, Value> = FlatArrayEngine::new(store.clone(), "quizzes");
    let question = questions.append(quiz_id, actor, json!({ "text": "q" }), &QUESTIONS).await?;
    let question_id = id_of(&question);

    let options: NestedArrayEngine<_, Value> = NestedArrayEngine::new(store.clone(), "quizzes");
    let first = options
        .append(quiz_id, question_id, actor, json!({ "label": "first" }), &QUESTIONS, &OPTIONS)
        .await?;
    let second = options
        .append(quiz_id, question_id, actor, json!({ "label": "second" }), &QUESTIONS, &OPTIONS)
        .await?;

    let tags: DoubleNestedArrayEngine<_, Value> = DoubleNestedArrayEngine::new(store, "quizzes");
    let first_tag = tags
        .append(
            quiz_id,
            question_id,
            id_of(&first),
            actor,
            json!({ "name": "one" }),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    let second_tag = tags
        .append(
            quiz_id,
            question_id,
            id_of(&second),
            actor,
            json!({ "name": "two" }),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;

    tags.update_in_place(
        quiz_id,
        question_id,
        id_of(&first),
        id_of(&first_tag),
        actor,
        json!({ "name": "renamed" }),
        &QUESTIONS,
        &OPTIONS,
        &TAGS,
    )
    .await?;

    let other = tags
        .find_by_id(
            quiz_id,
            question_id,
            id_of(&second),
            id_of(&second_tag),
            &QUESTIONS,
            &OPTIONS,
            &TAGS,
        )
        .await?;
    assert_eq!(other["name"], "two");
    Ok(())
}
