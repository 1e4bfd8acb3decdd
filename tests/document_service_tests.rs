mod common;

use common::{id_of, quiz_store};
use docnest::{DocumentService, MemoryStore};
use serde_json::{Value, json};
use uuid::Uuid;

async fn setup() -> (DocumentService<MemoryStore, Value>, Uuid) {
    let store = quiz_store().await;
    (DocumentService::new(store, "quizzes"), Uuid::new_v4())
}

#[tokio::test]
async fn create_stamps_envelope_and_audit() -> anyhow::Result<()> {
    let (service, actor) = setup().await;

    let quiz = service.create(actor, json!({ "title": "intro" })).await?;
    assert_eq!(quiz["title"], "intro");
    assert_eq!(quiz["deleted"], false);
    assert_eq!(quiz["createdBy"], json!(actor));
    assert!(quiz["createdAt"].is_string());
    assert_eq!(quiz["createdAt"], quiz["updatedAt"]);

    let found = service.find_by_id(id_of(&quiz)).await?;
    assert_eq!(found, quiz);
    Ok(())
}

#[tokio::test]
async fn find_missing_document_is_not_found() {
    let (service, _) = setup().await;
    assert!(service.find_by_id(Uuid::new_v4()).await.unwrap_err().is_not_found());
    assert!(service.find_by_id_any(Uuid::new_v4()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn update_sets_patch_and_audit() -> anyhow::Result<()> {
    let (service, actor) = setup().await;
    let quiz = service.create(actor, json!({ "title": "old" })).await?;
    let quiz_id = id_of(&quiz);

    let editor = Uuid::new_v4();
    let updated = service.update(quiz_id, editor, json!({ "title": "new" })).await?;
    assert_eq!(updated["title"], "new");
    assert_eq!(updated["updatedBy"], json!(editor));
    assert_eq!(updated["createdBy"], json!(actor));
    assert!(updated["updatedAt"].is_string());
    Ok(())
}

#[tokio::test]
async fn update_on_soft_deleted_document_conflicts() -> anyhow::Result<()> {
    let (service, actor) = setup().await;
    let quiz = service.create(actor, json!({ "title": "t" })).await?;
    let quiz_id = id_of(&quiz);

    service.soft_delete(quiz_id, actor).await?;
    let err = service
        .update(quiz_id, actor, json!({ "title": "x" }))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[tokio::test]
async fn soft_delete_hides_from_active_view_only() -> anyhow::Result<()> {
    let (service, actor) = setup().await;
    let quiz = service.create(actor, json!({ "title": "t" })).await?;
    let quiz_id = id_of(&quiz);

    let remover = Uuid::new_v4();
    let deleted = service.soft_delete(quiz_id, remover).await?;
    assert_eq!(deleted["deleted"], true);
    assert_eq!(deleted["deletedBy"], json!(remover));

    assert!(service.find_by_id(quiz_id).await.unwrap_err().is_not_found());
    let any = service.find_by_id_any(quiz_id).await?;
    assert_eq!(id_of(&any), quiz_id);

    // a second soft delete conflicts
    let err = service.soft_delete(quiz_id, remover).await.unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[tokio::test]
async fn restore_is_inverse_of_soft_delete() -> anyhow::Result<()> {
    let (service, actor) = setup().await;
    let quiz = service.create(actor, json!({ "title": "t" })).await?;
    let quiz_id = id_of(&quiz);

    service.soft_delete(quiz_id, actor).await?;
    let restorer = Uuid::new_v4();
    let restored = service.restore(quiz_id, restorer).await?;
    assert_eq!(restored["deleted"], false);
    assert_eq!(restored["updatedBy"], json!(restorer));
    assert_eq!(restored["title"], "t");

    // visible again in the active view
    assert_eq!(id_of(&service.find_by_id(quiz_id).await?), quiz_id);

    // restoring an active document conflicts
    let err = service.restore(quiz_id, restorer).await.unwrap_err();
    assert!(err.is_conflict());
    Ok(())
}

#[tokio::test]
async fn purge_requires_soft_delete_first() -> anyhow::Result<()> {
    let (service, actor) = setup().await;
    let quiz = service.create(actor, json!({ "title": "t" })).await?;
    let quiz_id = id_of(&quiz);

    let err = service.purge(quiz_id).await.unwrap_err();
    assert!(err.is_conflict());

    service.soft_delete(quiz_id, actor).await?;
    let snapshot = service.purge(quiz_id).await?;
    assert_eq!(id_of(&snapshot), quiz_id);
    assert_eq!(snapshot["deleted"], true);

    // gone from every view
    assert!(service.find_by_id(quiz_id).await.unwrap_err().is_not_found());
    assert!(service.find_by_id_any(quiz_id).await.unwrap_err().is_not_found());
    Ok(())
}
