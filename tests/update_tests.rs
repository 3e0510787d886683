mod common;

use common::*;
use crud_pipeline::{AuditAction, BatchWriteMode, Criteria, CrudError, PipelineConfig};

#[tokio::test]
async fn test_update_by_id_replaces_and_reloads() {
    let fx = fixture();
    seed(&fx, &["A"]).await;

    let updated = fx
        .service
        .update_by_id(1, sample("B"), None)
        .await
        .unwrap();

    assert_eq!(updated.id, Some(1));
    assert_eq!(updated.name, "B");
    assert_eq!(
        actions(&updated),
        vec![AuditAction::Create, AuditAction::Update]
    );
    assert_eq!(fx.service.get_one_by_id(&1, None).await.unwrap(), updated);
}

#[tokio::test]
async fn test_update_hooks_see_previous_and_reloaded_state() {
    let fx = fixture();
    seed(&fx, &["A"]).await;

    fx.service
        .update_by_id(1, sample("B"), None)
        .await
        .unwrap();

    assert_eq!(
        fx.recorder.mutations(),
        vec!["before_update", "pre_update", "post_update", "after_update"]
    );
    let updates = fx.recorder.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0.name, "A");
    assert_eq!(updates[0].1.name, "B");
}

#[tokio::test]
async fn test_update_takes_identifier_from_dto() {
    let fx = fixture();
    let saved = seed(&fx, &["A"]).await.remove(0);

    let mut changed = saved.clone();
    changed.name = "B".to_string();
    let updated = fx.service.update(changed, None).await.unwrap();
    assert_eq!(updated.name, "B");

    let err = fx.service.update(sample("C"), None).await.unwrap_err();
    assert!(matches!(err, CrudError::BadRequest(_)));
}

#[tokio::test]
async fn test_update_of_missing_entity_is_not_found() {
    let fx = fixture();
    let err = fx
        .service
        .update_by_id(42, sample("B"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CrudError::DomainNotFound(_)));
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_invalid_update_leaves_entity_untouched() {
    let fx = fixture();
    seed(&fx, &["A"]).await;

    let err = fx
        .service
        .update_by_id(1, sample(""), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CrudError::Validation(_)));
    assert_eq!(fx.service.get_one_by_id(&1, None).await.unwrap().name, "A");
    assert_eq!(fx.repo.write_counts().updates, 0);
}

#[tokio::test]
async fn test_update_with_previous_checks_identifiers() {
    let fx = fixture();
    let stored = seed(&fx, &["A", "B"]).await;

    let mut mismatched = stored[1].clone();
    mismatched.name = "C".to_string();
    let err = fx
        .service
        .update_with_previous(stored[0].clone(), mismatched, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::BadRequest(_)));

    let updated = fx
        .service
        .update_with_previous(stored[0].clone(), sample("A2"), None)
        .await
        .unwrap();
    assert_eq!(updated.id, Some(1));
    assert_eq!(updated.name, "A2");
}

#[tokio::test]
async fn test_update_many_follows_submission_order() {
    let fx = fixture();
    let stored = seed(&fx, &["A", "B", "C"]).await;

    let mut c = stored[2].clone();
    c.name = "C2".to_string();
    let mut a = stored[0].clone();
    a.name = "A2".to_string();
    let updated = fx.service.update_many(vec![c, a], None).await.unwrap();

    let names: Vec<_> = updated.iter().map(|dto| dto.name.as_str()).collect();
    assert_eq!(names, vec!["C2", "A2"]);
    assert_eq!(fx.repo.write_counts().updates, 2);
    assert_eq!(fx.service.get_one_by_id(&2, None).await.unwrap().name, "B");

    let before = fx
        .recorder
        .mutations()
        .iter()
        .filter(|event| event.as_str() == "before_update")
        .count();
    assert_eq!(before, 2);
}

#[tokio::test]
async fn test_update_many_per_item_mode() {
    let fx = fixture_with(PipelineConfig::new().update_many_mode(BatchWriteMode::PerItem));
    let stored = seed(&fx, &["A", "B"]).await;

    let renamed: Vec<_> = stored
        .iter()
        .map(|dto| {
            let mut dto = dto.clone();
            dto.name.push('!');
            dto
        })
        .collect();
    let updated = fx.service.update_many(renamed, None).await.unwrap();

    assert_eq!(updated[0].name, "A!");
    assert_eq!(updated[1].name, "B!");
    assert!(
        updated
            .iter()
            .all(|dto| actions(dto) == vec![AuditAction::Create, AuditAction::Update])
    );
}

#[tokio::test]
async fn test_update_many_unmatched_identifier_fails_without_mutation() {
    let fx = fixture();
    let stored = seed(&fx, &["A"]).await;

    let mut a = stored[0].clone();
    a.name = "A2".to_string();
    let mut ghost = sample("ghost");
    ghost.id = Some(99);
    let err = fx
        .service
        .update_many(vec![a, ghost], None)
        .await
        .unwrap_err();

    assert!(matches!(err, CrudError::DomainNotFound(_)));
    assert_eq!(fx.repo.write_counts().updates, 0);
    assert!(fx.recorder.mutations().is_empty());
    assert_eq!(fx.service.get_one_by_id(&1, None).await.unwrap().name, "A");
}

#[tokio::test]
async fn test_update_many_rejects_malformed_batches() {
    let fx = fixture();
    let stored = seed(&fx, &["A"]).await;

    let err = fx
        .service
        .update_many(vec![stored[0].clone(), stored[0].clone()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::BadRequest(_)));

    let err = fx
        .service
        .update_many(vec![sample("no id")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrudError::BadRequest(_)));
}

#[tokio::test]
async fn test_update_many_with_previous_snapshots() {
    let fx = fixture();
    seed(&fx, &["A", "B"]).await;

    let previous = fx
        .service
        .get_many(&Criteria::all(), None)
        .await
        .unwrap();
    let incoming: Vec<_> = previous
        .iter()
        .map(|dto| {
            let mut dto = dto.clone();
            dto.name = dto.name.to_lowercase();
            dto
        })
        .collect();

    let updated = fx
        .service
        .update_many_with_previous(previous, incoming, None)
        .await
        .unwrap();
    let names: Vec<_> = updated.iter().map(|dto| dto.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_failing_batch_hook_rolls_back_every_update() {
    let fx = fixture();
    let stored = seed(&fx, &["A", "B"]).await;
    let service = failing_service(fx.repo.clone(), FailAt::new("post_update"));

    let renamed: Vec<_> = stored
        .iter()
        .map(|dto| {
            let mut dto = dto.clone();
            dto.name = "Z".to_string();
            dto
        })
        .collect();
    assert!(service.update_many(renamed, None).await.is_err());

    let names: Vec<_> = fx
        .repo
        .entities()
        .await
        .into_iter()
        .map(|domain| domain.name)
        .collect();
    assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_empty_update_batches_return_empty_lists() {
    for mode in [BatchWriteMode::Bulk, BatchWriteMode::PerItem] {
        let fx = fixture_with(PipelineConfig::new().update_many_mode(mode));
        seed(&fx, &["A"]).await;

        let updated = fx.service.update_many(Vec::new(), None).await.unwrap();
        assert!(updated.is_empty());

        let updated = fx
            .service
            .update_many_with_previous(Vec::new(), Vec::new(), None)
            .await
            .unwrap();
        assert!(updated.is_empty());

        assert!(fx.recorder.events().is_empty());
        assert_eq!(fx.repo.write_counts().updates, 0);
    }
}
