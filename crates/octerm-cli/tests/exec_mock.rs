use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create an SSE response from `data:` payloads
fn sse_response(events: &[String]) -> ResponseTemplate {
    let body: String = events.iter().map(|e| format!("data: {e}\n\n")).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn message_event(id: &str, completed: bool) -> String {
    let time = if completed {
        json!({"created": 1, "completed": 2})
    } else {
        json!({"created": 1})
    };
    json!({
        "type": "message.updated",
        "properties": {"info": {"id": id, "role": "assistant", "time": time}}
    })
    .to_string()
}

fn part_event(message_id: &str, part_id: &str, part_type: &str, text: &str, delta: &str) -> String {
    json!({
        "type": "message.part.updated",
        "properties": {
            "part": {"id": part_id, "messageID": message_id, "type": part_type, "text": text},
            "delta": delta
        }
    })
    .to_string()
}

/// Mounts the catalog routes shared by every exec test.
async fn mount_session(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "ses_1", "title": "work"}])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/ses_1/prompt_async"))
        .and(body_json(json!({"parts": [{"type": "text", "text": "hello"}]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(server)
        .await;
}

fn exec_cmd(server: &MockServer) -> assert_cmd::Command {
    let home = tempdir().unwrap();
    let mut cmd = cargo_bin_cmd!("octerm");
    cmd.env("OCTERM_HOME", home.keep())
        .env_remove("OCTERM_CONFIG")
        .env_remove("OCTERM_LOG")
        .args(["--host", "127.0.0.1", "--port"])
        .arg(server.address().port().to_string())
        .args(["--session", "ses_1"]);
    cmd
}

#[tokio::test]
async fn test_exec_streams_answer() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    let events = vec![
        message_event("m1", false),
        part_event("m1", "p1", "text", "Hello", "Hello"),
        part_event("m1", "p1", "text", "Hello, world!", ", world!"),
        message_event("m1", true),
    ];
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(sse_response(&events))
        .mount(&server)
        .await;

    exec_cmd(&server)
        .args(["exec", "-p", "hello"])
        .assert()
        .success()
        .stdout("Hello, world!\n");
}

#[tokio::test]
async fn test_exec_hides_reasoning_by_default() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    let events = vec![
        message_event("m1", false),
        part_event("m1", "r1", "reasoning", "pondering", "pondering"),
        part_event("m1", "p1", "text", "Answer", "Answer"),
        message_event("m1", true),
    ];
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(sse_response(&events))
        .mount(&server)
        .await;

    exec_cmd(&server)
        .args(["exec", "-p", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Answer"))
        .stdout(predicate::str::contains("pondering").not());
}

#[tokio::test]
async fn test_exec_shows_reasoning_when_asked() {
    let server = MockServer::start().await;
    mount_session(&server).await;

    let events = vec![
        message_event("m1", false),
        part_event("m1", "r1", "reasoning", "pondering", "pondering"),
        part_event("m1", "p1", "text", "Answer", "Answer"),
        message_event("m1", true),
    ];
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(sse_response(&events))
        .mount(&server)
        .await;

    exec_cmd(&server)
        .args(["exec", "-p", "hello", "--show-thinking"])
        .assert()
        .success()
        .stdout("[thinking] pondering\nAnswer\n");
}

#[tokio::test]
async fn test_exec_feed_unavailable_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "ses_1"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    exec_cmd(&server)
        .args(["exec", "-p", "hello"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to connect to the event feed"));
}

#[tokio::test]
async fn test_exec_prompt_rejected_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "ses_1"}])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/event"))
        .respond_with(sse_response(&[]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/ses_1/prompt_async"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"message":"busy"}"#))
        .mount(&server)
        .await;

    exec_cmd(&server)
        .args(["exec", "-p", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to send prompt"))
        .stderr(predicate::str::contains("busy"));
}
