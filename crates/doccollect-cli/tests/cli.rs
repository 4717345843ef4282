#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::doccollect_cmd;
use predicates::prelude::*;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: &'static str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[test]
fn help_lists_commands() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    doccollect_cmd(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("fetch")
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("config")),
        );
    Ok(())
}

#[test]
fn fetch_without_urls_is_usage_error() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    doccollect_cmd(tmp.path())
        .arg("fetch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("URL"));
    Ok(())
}

#[test]
fn config_reflects_overrides() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let custom = tmp.path().join("elsewhere");
    doccollect_cmd(tmp.path())
        .arg("--data-dir")
        .arg(&custom)
        .arg("config")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("max_retries = 1")
                .and(predicate::str::contains("elsewhere"))
                .and(predicate::str::contains("oversize = \"truncate\"")),
        );
    Ok(())
}

#[tokio::test]
async fn fetch_then_refetch_reports_duplicate() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let server = MockServer::start().await;
    serve(&server, "/notice.txt", "public notice").await;
    let url = format!("{}/notice.txt", server.uri());

    doccollect_cmd(tmp.path())
        .args(["fetch", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("new").and(predicate::str::contains("1 collected, 0 failed")));

    doccollect_cmd(tmp.path())
        .args(["fetch", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate"));

    let data = tmp.path().join("data");
    assert_eq!(std::fs::read_dir(data.join("raw"))?.count(), 1);
    assert_eq!(std::fs::read_dir(data.join("metadata"))?.count(), 2);
    assert!(data.join("version_index.json").exists());
    Ok(())
}

#[tokio::test]
async fn fetch_json_and_failure_exit_code() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let server = MockServer::start().await;
    serve(&server, "/ok.txt", "fine").await;
    Mock::given(method("GET"))
        .and(path("/missing.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output = doccollect_cmd(tmp.path())
        .args([
            "fetch",
            &format!("{}/ok.txt", server.uri()),
            &format!("{}/missing.txt", server.uri()),
            "--concurrency",
            "2",
            "--format",
            "json",
        ])
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let reports: serde_json::Value = serde_json::from_slice(&output)?;
    let reports = reports.as_array().expect("array of reports");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["outcome"]["metadata"]["dedup_decision"], "new");
    assert_eq!(reports[1]["outcome"]["error"]["category"], "http_status");
    Ok(())
}

#[tokio::test]
async fn status_shows_lineage() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    let server = MockServer::start().await;
    serve(&server, "/doc.txt", "v1").await;
    let url = format!("{}/doc.txt", server.uri());

    doccollect_cmd(tmp.path()).args(["fetch", &url]).assert().success();

    server.reset().await;
    serve(&server, "/doc.txt", "v2").await;
    doccollect_cmd(tmp.path())
        .args(["fetch", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("new-version"));

    let output = doccollect_cmd(tmp.path())
        .args(["status", &url, "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let status: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(status["version"], 2);
    assert_eq!(status["blob_present"], true);
    assert_eq!(status["records"], 1);
    Ok(())
}

#[test]
fn status_unknown_key_fails() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    doccollect_cmd(tmp.path())
        .args(["status", "https://never.test/doc.pdf"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No versions recorded"));
    assert!(!tmp.path().join("data").exists());
    Ok(())
}

#[test]
fn malformed_config_is_reported() -> anyhow::Result<()> {
    let tmp = tempdir()?;
    std::fs::write(tmp.path().join("config.toml"), "[fetch\n")?;
    doccollect_cmd(tmp.path())
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
    Ok(())
}
