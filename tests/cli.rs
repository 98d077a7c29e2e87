use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::cargo_bin("apibundle").expect("binary exists");
    cmd.env("NO_COLOR", "1").env_remove("APIBUNDLE_LOG");
    cmd
}

fn bundle_for(server: &MockServer) -> String {
    format!(
        r#"
common:
  baseUrl: {base}
  method: GET
  headers:
    accept: application/json
requests:
  login:
    url: /login
    method: POST
    body: {{user: ada}}
    setvars:
      token: $.token
    tests:
      status: 200
      $.token: {{$type: string}}
  profile:
    url: /profile
    headers:
      authorization: Bearer {{{{token}}}}
    tests:
      status: 200
      $.name: "{{{{expectedName}}}}"
"#,
        base = server.base_url()
    )
}

#[test]
fn displays_help() {
    let mut cmd = cargo_bin();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Run bundles of HTTP requests"));
}

#[test]
fn displays_version() {
    let mut cmd = cargo_bin();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn errors_when_bundle_missing() {
    let mut cmd = cargo_bin();
    cmd.arg("run").arg("missing.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing.yaml"));
}

#[test]
fn runs_a_bundle_with_an_environment() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = MockServer::start();
    let login = server.mock(|when, then| {
        when.method(POST).path("/login").json_body(serde_json::json!({"user": "ada"}));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"token":"t-1"}"#);
    });
    let profile = server.mock(|when, then| {
        when.method(GET)
            .path("/profile")
            .header("authorization", "Bearer t-1");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"name":"Ada"}"#);
    });

    temp.child("api.yaml").write_str(&bundle_for(&server)).unwrap();
    temp.child("apibundle.json")
        .write_str(r#"{"environments": {"dev": {"variables": {"expectedName": "Ada"}}}}"#)
        .unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["run", "api.yaml", "--env", "dev"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("PASS login"))
        .stdout(predicate::str::contains("PASS profile"))
        .stdout(predicate::str::contains("Tests: 4 passed, 0 failed"));

    login.assert();
    profile.assert();
}

#[test]
fn failing_assertions_exit_with_one() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/login");
        then.status(500).body("boom");
    });

    temp.child("api.yaml").write_str(&bundle_for(&server)).unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["run", "api.yaml", "-r", "login", "--json"]);

    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("\"outcome\": \"completed\""))
        .stdout(predicate::str::contains("\"status\": 500"));
}

#[test]
fn lists_requests_in_order() {
    let temp = assert_fs::TempDir::new().unwrap();
    let server = MockServer::start();
    temp.child("api.yaml").write_str(&bundle_for(&server)).unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["list", "api.yaml"]);

    cmd.assert().success().stdout(
        predicate::str::is_match(r"(?s)login POST .*/login.*profile GET .*/profile").unwrap(),
    );
}

#[test]
fn lists_environments_with_the_default() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("apibundle.json")
        .write_str(r#"{"defaultEnvironment": "dev", "environments": {"dev": {}, "prod": {}}}"#)
        .unwrap();
    temp.child("api.yaml")
        .write_str("varsets:\n  local: {host: localhost}\nrequests: {}\n")
        .unwrap();

    let mut cmd = cargo_bin();
    cmd.current_dir(temp.path());
    cmd.args(["envs", "api.yaml"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("dev (default)"))
        .stdout(predicate::str::contains("prod"))
        .stdout(predicate::str::contains("local"));
}
