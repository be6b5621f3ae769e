//! End-to-end tests for the threater-collect binary
//!
//! These tests validate:
//! - Events on stdout, summaries and logs on stderr
//! - Checkpoint persistence between invocations
//! - Exit codes (0 success, 2 API failure, 1 anything else)
//! - Settings file and stream toggles

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Binary with an isolated environment and working directory
fn collector(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("threater-collect").unwrap();
    cmd.env_clear()
        .current_dir(dir.path())
        .env("THREATER_STATE_DIR", dir.path().join("state"))
        .env("LOG_LEVEL", "warn");
    cmd
}

fn page(records: serde_json::Value, next_cursor: Option<&str>) -> serde_json::Value {
    json!({ "data": records, "meta": { "next_cursor": next_cursor } })
}

// ============================================================================
// Collection Runs
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_run_emits_events_and_commits_checkpoint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/events/block"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            json!([{ "id": 3, "timestamp": "2024-01-03T00:00:00Z" }]),
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/events/block"))
        .and(header("x-api-key", "secret"))
        .and(query_param("limit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            json!([
                { "id": 1, "timestamp": "2024-01-02T00:00:00Z" },
                { "id": 2, "timestamp": "2024-01-01T00:00:00Z" }
            ]),
            Some("c2"),
        )))
        .mount(&server)
        .await;

    let output = collector(&dir)
        .env("THREATER_BASE_URL", server.uri())
        .env("THREATER_API_KEY", "secret")
        .args(["run", "block_events"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|l| l["sourcetype"] == "threater:block_event"));
    assert_eq!(lines[2]["event"]["id"], 3);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(r#""records_emitted":3"#));

    collector(&dir)
        .args(["checkpoint", "show", "block_events"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-01-03T00:00:00Z"))
        .stdout(predicate::str::contains("checkpoints.db"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_exits_2_without_events() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    collector(&dir)
        .env("THREATER_BASE_URL", server.uri())
        .env("THREATER_API_KEY", "secret")
        .args(["run", "ports"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("HTTP 500"));

    collector(&dir)
        .args(["checkpoint", "show", "ports"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no checkpoint"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_exits_2() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    collector(&dir)
        .env("THREATER_BASE_URL", server.uri())
        .env("THREATER_API_KEY", "wrong")
        .args(["run", "enforcers"])
        .assert()
        .code(2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_body_exits_1() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    collector(&dir)
        .env("THREATER_BASE_URL", server.uri())
        .env("THREATER_API_KEY", "secret")
        .args(["run", "ports"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unexpected response"));
}

#[test]
fn test_unreachable_host_exits_2() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .env("THREATER_BASE_URL", "http://127.0.0.1:9")
        .env("THREATER_API_KEY", "secret")
        .env("THREATER_TIMEOUT_SECS", "2")
        .args(["run", "ports"])
        .assert()
        .code(2);
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_api_key_exits_1() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .env("THREATER_BASE_URL", "http://127.0.0.1:9")
        .args(["run", "ports"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("API key is not configured"));
}

#[test]
fn test_missing_base_url_exits_1() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .env("THREATER_API_KEY", "secret")
        .args(["run", "ports"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("base URL"));
}

#[test]
fn test_unknown_stream_exits_1() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .args(["checkpoint", "reset", "plugins"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown stream"));
}

#[test]
fn test_explicit_config_file_must_exist() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .args(["--config", "missing.toml", "streams"])
        .assert()
        .code(1);
}

// ============================================================================
// Catalog and Health
// ============================================================================

#[test]
fn test_streams_lists_catalog() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .env("NO_COLOR", "1")
        .arg("streams")
        .assert()
        .success()
        .stdout(predicate::str::contains("threater_list_entries"))
        .stdout(predicate::str::contains("/lists -> /lists/{id}/entries"))
        .stdout(predicate::str::contains("Total streams: 14"));
}

#[test]
fn test_health_honours_settings_file_toggles() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("threater.toml"),
        "[settings]\napi_base_url = \"https://portal.threater.com/api/v3\"\n\n[collect]\nevents = false\nreports = \"0\"\n",
    )
    .unwrap();

    let output = collector(&dir).arg("health").output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let line: serde_json::Value =
        serde_json::from_str(String::from_utf8(output.stdout).unwrap().trim()).unwrap();
    assert_eq!(line["sourcetype"], "threater:ingestion_health");
    assert_eq!(line["event"]["status"], "ok");
    let inputs = line["event"]["details"]["inputs_checked"].as_array().unwrap();
    assert_eq!(inputs.len(), 10);
    assert!(!inputs.iter().any(|i| i == "threater_reports"));
}

#[test]
fn test_no_subcommand_prints_help() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_usage_errors_do_not_use_api_exit_code() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("<STREAM>"));

    collector(&dir)
        .args(["run", "ports", "--max-pages", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--max-pages"));

    collector(&dir)
        .args(["checkpoint", "wipe", "ports"])
        .assert()
        .code(1);
}

#[test]
fn test_help_and_version_succeed() {
    let dir = TempDir::new().unwrap();
    collector(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run-enabled"));

    collector(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
