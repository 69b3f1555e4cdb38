mod common;

use std::time::Duration;

use common::{blob_sha, FakeStore};
use pagesmith_core::contract::MockObjectStore;
use pagesmith_core::error::{ErrorKind, PublishStage, StoreError};
use pagesmith_core::model::{FileEntry, Snapshot};
use pagesmith_core::publish::SnapshotPublisher;
use pagesmith_core::settings::PublishSettings;

fn snapshot(files: &[(&str, &str)]) -> Snapshot {
    Snapshot::new(
        files
            .iter()
            .map(|(path, content)| FileEntry::text(*path, *content))
            .collect(),
    )
    .expect("valid snapshot")
}

#[tokio::test(start_paused = true)]
async fn single_entry_point_against_empty_tree() {
    let store = FakeStore::new();
    let repo = store.seed_repo("site-n1", &[]);
    let prior_tip = store.tip("site-n1").unwrap();
    let settings = PublishSettings::default();

    let result = SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snapshot(&[("index.html", "<html></html>")]), 1, true)
        .await
        .expect("publish should succeed");

    assert_eq!(store.tip("site-n1").as_deref(), Some(result.commit_sha.as_str()));
    let commit = store.commit(&result.commit_sha);
    assert_eq!(commit.parent.as_deref(), Some(prior_tip.as_str()));
    assert_eq!(commit.message, "Round 1: Add 1 file(s)");

    let tree = store.tree_of(&result.commit_sha);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree["index.html"], blob_sha(b"<html></html>"));
}

#[tokio::test(start_paused = true)]
async fn overlay_preserves_unrelated_paths() {
    let store = FakeStore::new();
    let repo = store.seed_repo(
        "site-n2",
        &[("index.html", "old"), ("LICENSE", "MIT"), ("js/app.js", "1")],
    );
    let settings = PublishSettings::default();

    let result = SnapshotPublisher::new(&store, &settings)
        .publish(
            &repo,
            &snapshot(&[("index.html", "new"), ("css/site.css", "body{}")]),
            2,
            false,
        )
        .await
        .unwrap();

    let files = store.files_at_tip("site-n2");
    assert_eq!(files.len(), 4);
    assert_eq!(files["index.html"], "new");
    assert_eq!(files["css/site.css"], "body{}");
    assert_eq!(files["LICENSE"], "MIT");
    assert_eq!(files["js/app.js"], "1");
    assert_eq!(store.commit(&result.commit_sha).message, "Round 2: Update 2 file(s)");
}

#[tokio::test(start_paused = true)]
async fn binary_content_is_stored_byte_for_byte() {
    let store = FakeStore::new();
    let repo = store.seed_repo("site-bin", &[]);
    let settings = PublishSettings::default();
    let png = vec![0x89, 0x50, 0x4e, 0x47, 0x00, 0xff];
    let snap = Snapshot::new(vec![
        FileEntry::text("index.html", "x"),
        FileEntry::binary("logo.png", png.clone()),
    ])
    .unwrap();

    let result = SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snap, 1, true)
        .await
        .unwrap();

    let tree = store.tree_of(&result.commit_sha);
    assert_eq!(store.lock().blobs[&tree["logo.png"]], png);
}

#[tokio::test(start_paused = true)]
async fn tip_visible_on_third_read() {
    let store = FakeStore::new();
    let repo = store.seed_repo("fresh-n3", &[]);
    store.lock().tip_misses = 2;
    let settings = PublishSettings::default();

    let started = tokio::time::Instant::now();
    SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snapshot(&[("index.html", "hi")]), 1, true)
        .await
        .expect("tip becomes visible in time");

    assert_eq!(store.calls_named("get_branch_tip"), 3);
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn tip_never_visible_fails_after_five_reads() {
    let store = FakeStore::new();
    let repo = store.seed_repo("fresh-n4", &[]);
    store.lock().tip_misses = 100;
    let settings = PublishSettings::default();

    let err = SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snapshot(&[("index.html", "hi")]), 1, true)
        .await
        .unwrap_err();

    assert_eq!(err.stage, PublishStage::BranchTip);
    assert_eq!(err.source.kind, ErrorKind::NotFound);
    assert_eq!(store.calls_named("get_branch_tip"), 5);
    assert_eq!(store.calls_named("create_blob"), 0);
}

#[tokio::test(start_paused = true)]
async fn blob_failure_leaves_branch_untouched() {
    let store = FakeStore::new();
    let repo = store.seed_repo("site-n5", &[("index.html", "old")]);
    let before = store.tip("site-n5");
    store.lock().fail_blob_at = Some(2);
    let settings = PublishSettings::default();

    let err = SnapshotPublisher::new(&store, &settings)
        .publish(
            &repo,
            &snapshot(&[("a.js", "1"), ("b.js", "2"), ("index.html", "new")]),
            1,
            true,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage, PublishStage::Blob);
    assert_eq!(err.source.kind, ErrorKind::Transient);
    assert_eq!(store.tip("site-n5"), before);
    assert_eq!(store.calls_named("create_tree"), 0);
    assert_eq!(store.calls_named("update_ref"), 0);
}

#[tokio::test(start_paused = true)]
async fn ref_conflict_is_not_retried() {
    let store = FakeStore::new();
    let repo = store.seed_repo("site-n6", &[]);
    store.lock().race_ref_update = true;
    let settings = PublishSettings::default();

    let err = SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snapshot(&[("index.html", "x")]), 1, true)
        .await
        .unwrap_err();

    assert_eq!(err.stage, PublishStage::RefUpdate);
    assert_eq!(err.source.kind, ErrorKind::Conflict);
    assert_eq!(store.calls_named("update_ref"), 1);
    assert_eq!(store.tip("site-n6").as_deref(), Some("concurrent"));
}

#[tokio::test]
async fn unauthorized_tip_read_fails_immediately() {
    let mut store = MockObjectStore::new();
    store
        .expect_get_branch_tip()
        .times(1)
        .returning(|_, _| Err(StoreError::from_status("get branch tip", 401, "Bad credentials")));
    store.expect_create_blob().never();
    let settings = PublishSettings::default();
    let repo = pagesmith_core::model::RepositoryRef {
        owner: "octo".into(),
        name: "r".into(),
        default_branch: "main".into(),
        html_url: String::new(),
    };

    let err = SnapshotPublisher::new(&store, &settings)
        .publish(&repo, &snapshot(&[("index.html", "x")]), 1, true)
        .await
        .unwrap_err();
    assert_eq!(err.stage, PublishStage::BranchTip);
    assert_eq!(err.source.kind, ErrorKind::Unauthorized);
}
