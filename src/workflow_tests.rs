//! Unit tests for event parsing and git data extraction.

use std::io::Write;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};

use super::{GitData, TriggerEvent, WorkflowContext, WorkflowContextError};

fn pull_request_payload() -> String {
    serde_json::json!({
        "action": "synchronize",
        "pull_request": {
            "number": 42,
            "base": { "ref": "main", "sha": "abc123" },
            "head": { "ref": "feature", "sha": "def456" }
        }
    })
    .to_string()
}

#[fixture]
fn pull_request_event() -> TriggerEvent {
    TriggerEvent::from_payload("pull_request", &pull_request_payload())
        .expect("payload should parse")
}

#[rstest]
fn pull_request_payload_parses_refs_and_number(pull_request_event: TriggerEvent) {
    let TriggerEvent::PullRequest(pull_request) = pull_request_event else {
        panic!("expected pull request variant");
    };

    assert_eq!(pull_request.base.ref_name.as_deref(), Some("main"));
    assert_eq!(pull_request.base.sha, "abc123");
    assert_eq!(pull_request.head.sha, "def456");
    assert_eq!(pull_request.number, Some(42));
}

#[rstest]
#[case::push("push")]
#[case::schedule("schedule")]
#[case::workflow_dispatch("workflow_dispatch")]
fn other_events_do_not_inspect_the_payload(#[case] event_name: &str) {
    let event = TriggerEvent::from_payload(event_name, "this is not even JSON")
        .expect("non-PR events should never fail");

    assert_eq!(
        event,
        TriggerEvent::Other {
            event_name: event_name.to_owned(),
        }
    );
    assert_eq!(GitData::from_event(&event), None);
}

#[test]
fn malformed_pull_request_payload_is_an_error() {
    let result = TriggerEvent::from_payload("pull_request", "{\"pull_request\": 7}");

    assert!(
        matches!(result, Err(WorkflowContextError::EventPayload { .. })),
        "expected payload error, got {result:?}"
    );
}

#[rstest]
fn git_data_extracts_the_history_window(pull_request_event: TriggerEvent) {
    let git_data =
        GitData::from_event(&pull_request_event).expect("pull request should yield git data");

    assert_eq!(git_data.base_branch, "main");
    assert_eq!(git_data.base_commit, "abc123");
    assert_eq!(git_data.head_commit, "def456");
    assert_eq!(git_data.pull_request_number, Some(42));
}

#[test]
fn git_data_is_absent_without_a_base_branch() {
    let payload = serde_json::json!({
        "pull_request": {
            "base": { "sha": "abc123" },
            "head": { "sha": "def456" }
        }
    })
    .to_string();
    let event =
        TriggerEvent::from_payload("pull_request", &payload).expect("payload should parse");

    assert_eq!(GitData::from_event(&event), None);
}

#[test]
fn repository_url_joins_server_and_repo() {
    let context = WorkflowContext::new(
        TriggerEvent::Other {
            event_name: "push".to_owned(),
        },
        "octocat",
        "hello-world",
        7,
        "https://github.com",
        Utf8PathBuf::from("/workspace"),
    );

    assert_eq!(
        context.repository_url(),
        "https://github.com/octocat/hello-world"
    );
}

#[test]
fn from_env_reads_the_actions_surface() {
    let mut event_file =
        tempfile::NamedTempFile::new().expect("temp event file should be created");
    event_file
        .write_all(pull_request_payload().as_bytes())
        .expect("payload should be written");
    let event_path = event_file
        .path()
        .to_str()
        .expect("temp path should be UTF-8")
        .to_owned();

    let _guard = env_lock::lock_env([
        ("GITHUB_EVENT_NAME", Some("pull_request")),
        ("GITHUB_EVENT_PATH", Some(event_path.as_str())),
        ("GITHUB_REPOSITORY", Some("octocat/hello-world")),
        ("GITHUB_RUN_ID", Some("1234")),
        ("GITHUB_SERVER_URL", Some("https://github.com")),
        ("GITHUB_WORKSPACE", Some("/workspace")),
    ]);

    let context = WorkflowContext::from_env().expect("context should load");
    assert_eq!(context.owner(), "octocat");
    assert_eq!(context.repo(), "hello-world");
    assert_eq!(context.run_id(), 1234);
    assert_eq!(context.workspace().as_str(), "/workspace");
    assert!(matches!(context.event(), TriggerEvent::PullRequest(_)));
}

#[test]
fn from_env_names_the_missing_variable() {
    let _guard = env_lock::lock_env([
        ("GITHUB_EVENT_NAME", None::<&str>),
        ("GITHUB_EVENT_PATH", None::<&str>),
    ]);

    let result = WorkflowContext::from_env();
    assert_eq!(
        result,
        Err(WorkflowContextError::MissingVariable {
            name: "GITHUB_EVENT_NAME".to_owned(),
        })
    );
}

#[test]
fn from_env_rejects_a_malformed_repository() {
    let mut event_file =
        tempfile::NamedTempFile::new().expect("temp event file should be created");
    event_file
        .write_all(b"{}")
        .expect("payload should be written");
    let event_path = event_file
        .path()
        .to_str()
        .expect("temp path should be UTF-8")
        .to_owned();

    let _guard = env_lock::lock_env([
        ("GITHUB_EVENT_NAME", Some("push")),
        ("GITHUB_EVENT_PATH", Some(event_path.as_str())),
        ("GITHUB_REPOSITORY", Some("not-a-repo-identifier")),
        ("GITHUB_RUN_ID", Some("1234")),
        ("GITHUB_SERVER_URL", Some("https://github.com")),
        ("GITHUB_WORKSPACE", Some("/workspace")),
    ]);

    let result = WorkflowContext::from_env();
    assert_eq!(
        result,
        Err(WorkflowContextError::InvalidRepository {
            value: "not-a-repo-identifier".to_owned(),
        })
    );
}
