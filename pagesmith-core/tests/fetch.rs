mod common;

use common::FakeStore;
use pagesmith_core::fetch::fetch_all_files;

#[tokio::test]
async fn walks_nested_directories() {
    let store = FakeStore::new();
    store.seed_repo(
        "deep",
        &[
            ("index.html", "<html></html>"),
            ("js/app.js", "run()"),
            ("js/lib/util.js", "util()"),
            ("assets/img/readme.txt", "pic"),
        ],
    );

    let files = fetch_all_files(&store, "deep").await.unwrap();

    assert_eq!(files.len(), 4);
    assert_eq!(files["js/lib/util.js"], "util()");
    assert_eq!(files["assets/img/readme.txt"], "pic");
    assert_eq!(store.calls_named("list_directory"), 5);
}

#[tokio::test]
async fn unreadable_file_is_skipped() {
    let store = FakeStore::new();
    store.seed_repo("flaky", &[("index.html", "x"), ("broken.js", "y")]);
    store.lock().unreadable.insert("broken.js".into());

    let files = fetch_all_files(&store, "flaky").await.unwrap();

    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["index.html"]);
}

#[tokio::test]
async fn missing_repository_fails() {
    let store = FakeStore::new();
    let err = fetch_all_files(&store, "missing").await.unwrap_err();
    assert!(err.is_not_found());
}
