//! Integration tests for resilient loading and atomic writes.

use serde::{Deserialize, Serialize};
use skein_jsonl::{read_jsonl_resilient, write_jsonl_atomic, Error, Warning};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id: String,
    title: String,
}

fn task(id: &str, title: &str) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
    }
}

#[tokio::test]
async fn atomic_write_then_resilient_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("issues.jsonl");
    let tasks = vec![task("bd-1", "First"), task("bd-2", "Second")];

    write_jsonl_atomic(&path, &tasks).await.unwrap();

    let (loaded, warnings): (Vec<Task>, _) = read_jsonl_resilient(&path).await.unwrap();
    assert_eq!(loaded, tasks);
    assert!(warnings.is_empty());
    assert!(!dir.path().join("issues.jsonl.tmp").exists());
}

#[tokio::test]
async fn atomic_write_replaces_existing_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("issues.jsonl");

    write_jsonl_atomic(&path, &[task("bd-1", "Old")]).await.unwrap();
    write_jsonl_atomic(&path, &[task("bd-9", "New")]).await.unwrap();

    let (loaded, _): (Vec<Task>, _) = read_jsonl_resilient(&path).await.unwrap();
    assert_eq!(loaded, vec![task("bd-9", "New")]);
}

#[tokio::test]
async fn corrupt_lines_are_skipped_with_warnings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("issues.jsonl");
    tokio::fs::write(
        &path,
        "{\"id\":\"bd-1\",\"title\":\"ok\"}\n{\"id\":\"bd-2\",\n\n{\"id\":\"bd-3\",\"title\":\"ok\"}\n",
    )
    .await
    .unwrap();

    let (loaded, warnings): (Vec<Task>, _) = read_jsonl_resilient(&path).await.unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        warnings[0],
        Warning::MalformedJson { line_number: 2, .. }
    ));
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let result = read_jsonl_resilient::<Task, _>(dir.path().join("absent.jsonl")).await;
    assert!(matches!(result, Err(Error::Io(_))));
}
