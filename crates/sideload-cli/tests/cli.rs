use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::io::Write;

fn sideload() -> Command {
    Command::cargo_bin("sideload").unwrap()
}

fn stdout_json(command: &mut Command) -> Value {
    let output = command.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_encode_sample() {
    let document = stdout_json(sideload().args([
        "encode",
        "--root",
        "sites:1",
        "--query",
        "include=posts.author&fields[people]=first_name",
    ]));

    assert_eq!(document["data"]["id"], json!("1"));
    assert_eq!(
        document["included"][1],
        json!({
            "type": "people",
            "id": "123",
            "attributes": { "first_name": "John" },
            "relationships": { "comments": { "data": [
                { "type": "comments", "id": "456" },
                { "type": "comments", "id": "789" }
            ] } },
            "links": { "profile": "/people/123/profile" }
        })
    );
}

#[test]
fn test_encode_dataset_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "people": [{{ "id": "7", "first_name": "Ada", "last_name": "Lovelace" }}] }}"#
    )
    .unwrap();

    sideload()
        .args(["encode", "--root", "people:7", "--url-prefix", "http://example.com"])
        .arg("--dataset")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""self":"http://example.com/people/7""#))
        .stdout(predicate::str::contains(r#""first_name":"Ada""#));
}

#[test]
fn test_encode_bad_dataset() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "posts": [{{ "id": "1", "title": "x", "author": "9" }}] }}"#).unwrap();

    sideload()
        .args(["encode", "--root", "posts:1"])
        .arg("--dataset")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown person '9'"));
}

#[test]
fn test_encode_rejects_bad_query() {
    sideload()
        .args(["encode", "--root", "sites:1", "--query", "include[posts]=x"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status":"400""#))
        .stdout(predicate::str::contains(r#""parameter":"include""#));
}

#[test]
fn test_params() {
    let params = stdout_json(sideload().args(["params", "-q", "?include=posts&sort=title"]));
    assert_eq!(
        params,
        json!({
            "include_paths": ["posts"],
            "sort": [{ "field": "title", "ascending": true }]
        })
    );
}

#[test]
fn test_negotiate_not_acceptable() {
    sideload()
        .args(["negotiate", "--accept", "application/vnd.api+json; ext=bulk"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""status":"406""#));

    sideload()
        .args([
            "negotiate",
            "--accept",
            "application/vnd.api+json; ext=bulk",
            "--ext",
            "bulk",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("bulk"));
}

#[test]
fn test_sample_is_a_dataset() {
    let sample = stdout_json(sideload().arg("sample"));
    assert_eq!(sample["posts"][0]["title"], json!("Included objects"));
}
