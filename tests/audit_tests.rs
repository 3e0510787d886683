mod common;

use common::*;
use crud_pipeline::{AuditAction, AuditEntry, JsonPatch, PipelineConfig, User};
use serde_json::json;

#[tokio::test]
async fn test_each_mutation_appends_exactly_one_entry() {
    let fx = fixture();
    let user = User::new("u-7").with_name("Ops");

    let saved = fx.service.save(sample("A"), Some(&user)).await.unwrap();
    assert_eq!(actions(&saved), vec![AuditAction::Create]);

    let updated = fx
        .service
        .update_by_id(1, sample("B"), Some(&user))
        .await
        .unwrap();
    assert_eq!(
        actions(&updated),
        vec![AuditAction::Create, AuditAction::Update]
    );

    let patch = JsonPatch::from_value(json!([{"op": "replace", "path": "/name", "value": "C"}])).unwrap();
    let edited = fx.service.edit(1, &patch, Some(&user)).await.unwrap();
    assert_eq!(
        actions(&edited),
        vec![AuditAction::Create, AuditAction::Update, AuditAction::Update]
    );
    assert_eq!(edited.audits[..2], updated.audits[..]);

    fx.service.delete(1, Some(&user)).await.unwrap();
    let removed = fx.recorder.removed.lock().unwrap().clone();
    assert_eq!(
        actions(&removed[0]),
        vec![
            AuditAction::Create,
            AuditAction::Update,
            AuditAction::Update,
            AuditAction::Delete
        ]
    );
}

#[tokio::test]
async fn test_entries_carry_actor_and_timestamp() {
    let fx = fixture();
    let user = User::new("u-1");

    let with_user = fx.service.save(sample("A"), Some(&user)).await.unwrap();
    let anonymous = fx.service.save(sample("B"), None).await.unwrap();

    assert_eq!(with_user.audits[0].actor_id.as_deref(), Some("u-1"));
    assert_eq!(with_user.audits[0].action_date, FixedClock::instant());
    assert_eq!(anonymous.audits[0].actor_id, None);
}

#[tokio::test]
async fn test_client_supplied_trail_cannot_rewrite_history() {
    let fx = fixture();
    seed(&fx, &["A"]).await;

    let mut forged = sample("B");
    forged.audits = Vec::new();
    let updated = fx.service.update_by_id(1, forged, None).await.unwrap();

    assert_eq!(
        actions(&updated),
        vec![AuditAction::Create, AuditAction::Update]
    );
}

#[tokio::test]
async fn test_audit_can_be_disabled() {
    let fx = fixture_with(PipelineConfig::new().audit_enabled(false));

    let saved = fx.service.save(sample("A"), None).await.unwrap();
    let updated = fx
        .service
        .update_by_id(1, sample("B"), None)
        .await
        .unwrap();

    assert!(saved.audits.is_empty());
    assert!(updated.audits.is_empty());

    fx.service.delete(1, None).await.unwrap();
    let removed = fx.recorder.removed.lock().unwrap().clone();
    assert!(removed[0].audits.is_empty());
}

#[tokio::test]
async fn test_disabled_audit_leaves_client_trail_untouched() {
    let fx = fixture_with(PipelineConfig::new().audit_enabled(false));
    seed(&fx, &["A"]).await;

    let mut incoming = sample("B");
    incoming.audits = vec![AuditEntry {
        action_type: AuditAction::Create,
        action_date: FixedClock::instant(),
        actor_id: Some("importer".to_string()),
    }];
    let updated = fx.service.update_by_id(1, incoming, None).await.unwrap();

    assert_eq!(actions(&updated), vec![AuditAction::Create]);
    assert_eq!(updated.audits[0].actor_id.as_deref(), Some("importer"));
}
