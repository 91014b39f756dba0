//! Integration tests for the sign-in, status, logout and profile commands.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn afflyt(home: &Path, server: &MockServer) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("afflyt");
    cmd.env("AFFLYT_HOME", home)
        .env("AFFLYT_API_URL", server.uri())
        .env("AFFLYT_NO_BROWSER", "1")
        .env_remove("AFFLYT_PASSWORD")
        .env_remove("AFFLYT_LOG");
    cmd
}

fn read_storage(home: &Path) -> BTreeMap<String, String> {
    match fs::read_to_string(home.join("storage.json")) {
        Ok(contents) => serde_json::from_str(&contents).unwrap(),
        Err(_) => BTreeMap::new(),
    }
}

fn write_session(home: &Path, token: &str) {
    let entries = BTreeMap::from([
        ("afflyt_token".to_string(), token.to_string()),
        (
            "afflyt_user".to_string(),
            json!({ "id": "u1", "email": "mario@example.it", "name": "Mario" }).to_string(),
        ),
    ]);
    fs::write(
        home.join("storage.json"),
        serde_json::to_string(&entries).unwrap(),
    )
    .unwrap();
}

fn user_json() -> serde_json::Value {
    json!({
        "id": "u1",
        "email": "mario@example.it",
        "name": "Mario",
        "role": "affiliate",
        "amazonAssociateTag": "mario-21"
    })
}

async fn mount_me(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/api/user/me"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "user": user_json() })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_saves_session() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "email": "mario@example.it", "password": "secret" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "user": user_json(), "token": "tok-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["login", "--email", "Mario@Example.it", "--password", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Mario"))
        .stdout(predicate::str::contains("storage.json"));

    let storage = read_storage(home.path());
    assert_eq!(storage.get("afflyt_token").map(String::as_str), Some("tok-1"));
    assert!(storage["afflyt_user"].contains("mario-21"));
}

#[tokio::test]
async fn test_login_failure_shows_backend_message() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["login", "--email", "mario@example.it", "--password", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid credentials"));

    assert!(!read_storage(home.path()).contains_key("afflyt_token"));
}

#[tokio::test]
async fn test_login_rejects_malformed_email_locally() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["login", "--email", "mario"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid email"));
}

#[tokio::test]
async fn test_login_with_active_session_asks_before_replacing() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-old");
    mount_me(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["login", "--email", "other@example.it"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Already signed in as Mario"))
        .stdout(predicate::str::contains("Login cancelled."));

    assert_eq!(
        read_storage(home.path()).get("afflyt_token").map(String::as_str),
        Some("tok-old")
    );
}

#[tokio::test]
async fn test_status_with_valid_session() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-1234567890abcdef");
    mount_me(&server, 200).await;

    afflyt(home.path(), &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Mario <mario@example.it>"))
        .stdout(predicate::str::contains("Role: affiliate"))
        .stdout(predicate::str::contains("tok-1234..."))
        .stdout(predicate::str::contains("abcdef").not());
}

#[tokio::test]
async fn test_status_with_rejected_token_clears_session() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "expired");
    mount_me(&server, 401).await;

    afflyt(home.path(), &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));

    let storage = read_storage(home.path());
    assert!(!storage.contains_key("afflyt_token"));
    assert!(!storage.contains_key("afflyt_user"));
}

#[tokio::test]
async fn test_status_without_session_makes_no_requests() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

#[tokio::test]
async fn test_logout_clears_session_and_notifies_backend() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-1");
    mount_me(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    assert!(read_storage(home.path()).is_empty());

    afflyt(home.path(), &server)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[tokio::test]
async fn test_logout_succeeds_when_backend_fails() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-1");
    mount_me(&server, 200).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out"));

    assert!(read_storage(home.path()).is_empty());
}

#[tokio::test]
async fn test_magic_link_rate_limit_shows_wait_time() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/magic-link"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "42"))
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["magic-link", "send", "--email", "mario@example.it"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("42 seconds"));
}

#[tokio::test]
async fn test_magic_link_send_confirms() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/magic-link"))
        .and(body_json(json!({ "email": "mario@example.it" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["magic-link", "send", "--email", "mario@example.it"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Magic link sent"));

    assert!(read_storage(home.path()).is_empty());
}

#[tokio::test]
async fn test_magic_link_verify_accepts_full_link() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/magic-link/verify"))
        .and(body_json(json!({ "token": "ml-123" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": user_json(), "token": "tok-ml" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args([
            "magic-link",
            "verify",
            "https://app.afflyt.io/auth/magic-link?token=ml-123",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as Mario"));

    assert_eq!(
        read_storage(home.path()).get("afflyt_token").map(String::as_str),
        Some("tok-ml")
    );
}

#[tokio::test]
async fn test_magic_link_verify_expired() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/magic-link/verify"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["magic-link", "verify", "old-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expired"));
}

#[tokio::test]
async fn test_profile_show_requires_session() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    afflyt(home.path(), &server)
        .args(["profile", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[tokio::test]
async fn test_profile_show_json() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-1");
    mount_me(&server, 200).await;

    let output = afflyt(home.path(), &server)
        .args(["profile", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let profile: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(profile["email"], "mario@example.it");
    assert_eq!(profile["amazonAssociateTag"], "mario-21");
}

#[tokio::test]
async fn test_profile_update_merges_fields() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;
    write_session(home.path(), "tok-1");
    mount_me(&server, 200).await;
    Mock::given(method("PUT"))
        .and(path("/api/user/me"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({ "name": "Luigi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": { "name": "Luigi" } })))
        .expect(1)
        .mount(&server)
        .await;

    afflyt(home.path(), &server)
        .args(["profile", "update", "--name", "Luigi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile updated"))
        .stdout(predicate::str::contains("Luigi"))
        .stdout(predicate::str::contains("mario@example.it"));

    let storage = read_storage(home.path());
    let user: serde_json::Value = serde_json::from_str(&storage["afflyt_user"]).unwrap();
    assert_eq!(user["name"], "Luigi");
    assert_eq!(user["amazonAssociateTag"], "mario-21");
    assert_eq!(storage.get("afflyt_token").map(String::as_str), Some("tok-1"));
}

#[tokio::test]
async fn test_profile_update_without_fields_fails() {
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    afflyt(home.path(), &server)
        .args(["profile", "update"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}
