use std::time::Duration;

use axum::http::{Method, StatusCode};
use revpurge_core::couchdb::{
    CouchError, DesignIndex, DocumentDeletion, IndexClearance, RevisionPurgeClient, Step,
};
use revpurge_common::document::{Revision, RevisionId};
use serde_json::json;

use super::fake::FakeCouch;

const DB: &str = "inventory";
const HIGH_GENERATION_MAP: &str = "function(doc) { \
    var gen = parseInt(doc._rev.split(\"-\")[0], 10); \
    if (gen > 100000) { \
    emit(doc._id, { _id: doc._id, _rev: doc._rev, generation: gen, \
    _deleted_conflicts: doc._deleted_conflicts || [] }); } }";

async fn couch() -> FakeCouch {
    FakeCouch::start(DB).await.unwrap()
}

fn client(couch: &FakeCouch) -> RevisionPurgeClient {
    RevisionPurgeClient::new(couch.base_url(), DB, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn reset_recreates_document_with_identical_fields() {
    let couch = couch().await;
    couch.seed(
        "doc1",
        &["3-c", "2-b", "1-a"],
        json!({ "name": "sensor", "nested": { "readings": [1, 2, 3], "unit": "C" } }),
    );

    let client = client(&couch);
    let report = client.run("doc1").await.unwrap();

    assert_eq!(report.revisions.deleted, 3);
    assert_eq!(report.revisions.already_gone, 0);
    assert_eq!(report.document, DocumentDeletion::AlreadyAbsent);
    assert_eq!(report.recreated_rev, RevisionId::from("5-recreated"));

    let doc = couch.document("doc1").unwrap();
    assert_eq!(doc["_rev"], "5-recreated");
    assert_eq!(doc["name"], "sensor");
    assert_eq!(doc["nested"], json!({ "readings": [1, 2, 3], "unit": "C" }));
    assert_eq!(
        doc.keys().collect::<Vec<_>>(),
        ["_id", "_rev", "name", "nested"]
    );

    // The generation continues from the tombstone, but nothing before it is reachable.
    assert_eq!(couch.available_revisions("doc1"), ["5-recreated"]);
    let history = client.fetch_revision_history("doc1").await.unwrap();
    assert_eq!(history[0], RevisionId::from("5-recreated"));
    let prior = client.delete_revisions("doc1", &history[1..]).await.unwrap();
    assert_eq!(prior.deleted, 0);
    assert_eq!(prior.already_gone, history.len() - 1);
}

#[tokio::test]
async fn revision_already_gone_does_not_stop_the_batch() {
    let couch = couch().await;
    couch.seed("doc1", &["3-c", "2-b", "1-a"], json!({ "v": 1 }));
    couch.mark_purged("doc1", "2-b");

    let report = client(&couch).run("doc1").await.unwrap();

    assert_eq!(report.revisions.deleted, 2);
    assert_eq!(report.revisions.already_gone, 1);
    assert_eq!(couch.deleted_revisions("doc1"), ["3-c", "1-a"]);
}

#[tokio::test]
async fn revision_delete_server_error_aborts_at_step_three() {
    let couch = couch().await;
    couch.seed("doc1", &["3-c", "2-b", "1-a"], json!({ "v": 1 }));
    couch.fail(
        Method::DELETE,
        "doc1",
        Some("2-b"),
        StatusCode::INTERNAL_SERVER_ERROR,
    );

    let err = client(&couch).run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::DeleteRevisions);
    assert_eq!(err.document_id(), Some("doc1"));
    assert_eq!(couch.deleted_revisions("doc1"), ["3-c"]);
    assert!(couch.requests().iter().all(|r| r.rev.as_deref() != Some("1-a")));
}

#[tokio::test]
async fn document_still_live_is_deleted_at_its_current_revision() {
    let couch = couch().await;
    couch.seed("doc1", &["2-b", "1-a"], json!({ "v": 1 }));
    let client = client(&couch);

    client.delete_revisions("doc1", &[]).await.unwrap();
    let deletion = client.delete_document("doc1").await.unwrap();

    assert_eq!(
        deletion,
        DocumentDeletion::Deleted {
            rev: RevisionId::from("2-b")
        }
    );
    assert!(couch.document("doc1").is_none());
}

#[tokio::test]
async fn missing_document_fails_at_step_one() {
    let couch = couch().await;

    let err = client(&couch).run("ghost").await.unwrap_err();

    assert_eq!(err.step, Step::FetchDocument);
    assert!(err.source.is_not_found());
    assert_eq!(couch.requests().len(), 1);
}

#[tokio::test]
async fn prior_index_is_replaced() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed(
        "_design/rev_filter",
        &["4-old"],
        json!({ "views": { "stale": { "map": "function(doc) {}" } } }),
    );

    let report = client(&couch).run("doc1").await.unwrap();

    assert_eq!(
        report.index_clearance,
        IndexClearance::Deleted {
            rev: RevisionId::from("4-old")
        }
    );
    let design = couch.document("_design/rev_filter").unwrap();
    assert_eq!(design["views"]["high_rev_gen"]["map"], HIGH_GENERATION_MAP);
    assert!(design["views"].get("stale").is_none());
}

#[tokio::test]
async fn index_selects_strictly_above_the_threshold() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed("above", &["100001-abc"], json!({}));
    couch.seed("at", &["100000-xyz"], json!({}));
    couch.seed("low", &["7-def"], json!({}));
    let client = client(&couch);
    let index = DesignIndex::high_revision_generation();

    client.install_design_index(&index).await.unwrap();
    let rows = client.query_design_index(&index).await.unwrap();

    let ids: Vec<&str> = rows.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ids, ["above"]);
    assert_eq!(rows[0].current_rev, Some(RevisionId::from("100001-abc")));
    assert!(!rows[0].has_conflicts());
}

#[tokio::test]
async fn deleted_conflicts_are_each_deleted_once() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed_conflicted("hot", "200000-zzz", &["2-aaa", "3-bbb"]);

    let report = client(&couch).run("doc1").await.unwrap();

    assert_eq!(report.high_generation_docs, 1);
    assert_eq!(report.conflicts_deleted, 2);
    assert_eq!(couch.deleted_revisions("hot"), ["2-aaa", "3-bbb"]);
    assert_eq!(couch.document("hot").unwrap()["_rev"], "200000-zzz");
}

#[tokio::test]
async fn failed_conflict_delete_aborts_before_compaction() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed_conflicted("hot", "200000-zzz", &["2-aaa", "3-bbb"]);
    couch.fail(Method::DELETE, "hot", Some("2-aaa"), StatusCode::CONFLICT);

    let err = client(&couch).run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::ResolveConflicts);
    assert_eq!(err.document_id(), Some("hot"));
    assert!(matches!(
        err.source,
        CouchError::Status { status, .. } if status == StatusCode::CONFLICT
    ));
    assert!(couch.deleted_revisions("hot").is_empty());
    assert!(couch.compactions().is_empty());
}

#[tokio::test]
async fn failed_second_conflict_delete_keeps_the_first() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed_conflicted("hot", "200000-zzz", &["2-aaa", "3-bbb"]);
    couch.fail(
        Method::DELETE,
        "hot",
        Some("3-bbb"),
        StatusCode::INTERNAL_SERVER_ERROR,
    );

    let err = client(&couch).run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::ResolveConflicts);
    assert_eq!(err.revision, Some(Revision::new("hot", "3-bbb")));
    assert_eq!(couch.deleted_revisions("hot"), ["2-aaa"]);
    assert!(couch.compactions().is_empty());
}

#[tokio::test]
async fn conflict_already_gone_still_aborts() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.seed_conflicted("hot", "200000-zzz", &["2-aaa", "3-bbb"]);
    couch.mark_purged("hot", "2-aaa");

    let err = client(&couch).run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::ResolveConflicts);
    assert_eq!(err.document_id(), Some("hot"));
    assert!(err.source.is_not_found());
    assert!(
        couch
            .requests()
            .iter()
            .all(|r| r.rev.as_deref() != Some("3-bbb"))
    );
    assert!(couch.compactions().is_empty());
}

#[tokio::test]
async fn compaction_posts_json_and_expects_accepted() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));

    let report = client(&couch).run("doc1").await.unwrap();

    assert!(report.compaction.contains("\"ok\":true"));
    assert_eq!(
        couch.compactions(),
        [Some(String::from("application/json"))]
    );
}

#[tokio::test]
async fn compaction_without_accepted_status_is_an_error() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));
    couch.fail(Method::POST, "_compact", None, StatusCode::OK);

    let err = client(&couch).run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::Compact);
    assert!(matches!(
        err.source,
        CouchError::Status { status, .. } if status == StatusCode::OK
    ));
}

#[tokio::test]
async fn unknown_database_fails_at_step_one() {
    let couch = couch().await;
    couch.seed("doc1", &["1-a"], json!({ "v": 1 }));

    let client = RevisionPurgeClient::new(couch.base_url(), "elsewhere", Duration::from_secs(5)).unwrap();
    let err = client.run("doc1").await.unwrap_err();

    assert_eq!(err.step, Step::FetchDocument);
}
