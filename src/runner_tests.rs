//! Unit tests for runner command construction and exit classification.

use camino::Utf8PathBuf;
use rstest::rstest;

use super::{
    ExitClass, FAILURE_DESCRIPTION, RunnerRequest, SUCCESS_DESCRIPTION, classify_exit, details_url,
};
use crate::api::RunState;

fn sample_request() -> RunnerRequest {
    RunnerRequest {
        project_path: "services/api".to_owned(),
        project_id: "proj-1".to_owned(),
        client_id: "client-1".to_owned(),
        secret_key: "secret-1".to_owned(),
        run_id: 7,
        cloned_project_dir: Utf8PathBuf::from("/tmp/snow-x/services/api"),
        project_root_dir: Utf8PathBuf::from("/workspace/services/api"),
        details_url: "https://app.snowmate.io/regressions/proj-1/7".to_owned(),
        pull_request_number: 42,
        additional_flags: None,
        api_url_override: None,
        auth_url_override: None,
        workspace: Utf8PathBuf::from("/workspace"),
    }
}

#[rstest]
#[case::passed(Some(0), ExitClass::Passed)]
#[case::no_tests(Some(5), ExitClass::NoTests)]
#[case::project_missing(Some(255), ExitClass::ProjectMissing)]
#[case::single_failure(Some(1), ExitClass::TestsFailed)]
#[case::arbitrary_failure(Some(137), ExitClass::TestsFailed)]
#[case::signal_termination(None, ExitClass::TestsFailed)]
fn exit_codes_classify_per_the_contract(#[case] code: Option<i32>, #[case] expected: ExitClass) {
    assert_eq!(classify_exit(code), expected);
}

#[test]
fn details_url_targets_the_regressions_route() {
    assert_eq!(
        details_url("https://app.snowmate.io", "proj-1", 7),
        "https://app.snowmate.io/regressions/proj-1/7"
    );
    assert_eq!(
        details_url("https://app.example.test/", "proj-2", 99),
        "https://app.example.test/regressions/proj-2/99"
    );
}

#[test]
fn command_line_keeps_the_contract_flag_order() {
    let command = sample_request().command_line("snowmate_runner");

    assert_eq!(
        command,
        "cd services/api && snowmate_runner run --project-id proj-1 \
         --client-id client-1 --secret-key secret-1 --workflow-run-id 7 \
         --cloned-repo-dir /tmp/snow-x/services/api \
         --project-root-path /workspace/services/api \
         --details-url https://app.snowmate.io/regressions/proj-1/7 \
         --pull-request-number 42 "
    );
}

#[test]
fn command_line_appends_additional_flags_verbatim() {
    let request = RunnerRequest {
        additional_flags: Some("--verbose --tag nightly".to_owned()),
        ..sample_request()
    };

    let command = request.command_line("snowmate_runner");
    assert!(
        command.ends_with("--pull-request-number 42 --verbose --tag nightly"),
        "additional flags should trail the fixed flags: {command}"
    );
}

#[test]
fn command_line_appends_url_overrides_only_when_configured() {
    let without_overrides = sample_request().command_line("snowmate_runner");
    assert!(!without_overrides.contains("--api-url"));
    assert!(!without_overrides.contains("--auth-url"));

    let request = RunnerRequest {
        api_url_override: Some("https://api.example.test".to_owned()),
        auth_url_override: Some("https://auth.example.test".to_owned()),
        ..sample_request()
    };
    let command = request.command_line("snowmate_runner");
    assert!(
        command.ends_with(" --api-url https://api.example.test --auth-url https://auth.example.test"),
        "overrides should trail the invocation: {command}"
    );
}

#[cfg(unix)]
mod invocation {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::{
        FAILURE_DESCRIPTION, RunState, RunnerRequest, SUCCESS_DESCRIPTION, sample_request,
    };
    use crate::runner::{RunnerInvoker, SystemRunnerInvoker};

    struct InvocationFixture {
        workspace: TempDir,
    }

    impl InvocationFixture {
        fn workspace_path(&self) -> Utf8PathBuf {
            Utf8PathBuf::from_path_buf(self.workspace.path().to_path_buf())
                .expect("workspace path should be UTF-8")
        }

        /// Writes an executable fake runner that exits with `exit_code`.
        fn fake_runner(&self, exit_code: i32) -> String {
            let script_path = self.workspace.path().join("fake_runner.sh");
            fs::write(
                &script_path,
                format!("#!/bin/sh\necho \"runner diagnostics\"\nexit {exit_code}\n"),
            )
            .expect("script should write");
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))
                .expect("script should be marked executable");
            script_path
                .to_str()
                .expect("script path should be UTF-8")
                .to_owned()
        }

        fn request(&self) -> RunnerRequest {
            RunnerRequest {
                project_path: "proj".to_owned(),
                workspace: self.workspace_path(),
                ..sample_request()
            }
        }

        fn report_path(&self) -> Utf8PathBuf {
            Utf8PathBuf::from_path_buf(self.workspace.path().join("snowmate_result.md"))
                .expect("report path should be UTF-8")
        }
    }

    #[fixture]
    fn invocation_fixture() -> InvocationFixture {
        let workspace = TempDir::new().expect("workspace should create");
        fs::create_dir(workspace.path().join("proj")).expect("project dir should create");
        InvocationFixture { workspace }
    }

    #[rstest]
    fn zero_exit_reads_the_summary_and_succeeds(invocation_fixture: InvocationFixture) {
        let report_path = invocation_fixture.report_path();
        fs::write(&report_path, "## 2 tests passed\n").expect("report should write");
        let invoker = SystemRunnerInvoker::new()
            .with_command_path(invocation_fixture.fake_runner(0))
            .with_report_path(report_path);

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("invocation should run");

        assert!(report.project_exists);
        assert_eq!(report.outcome.state, RunState::Success);
        assert_eq!(report.outcome.description, SUCCESS_DESCRIPTION);
        assert_eq!(report.outcome.summary, "## 2 tests passed\n");
    }

    #[rstest]
    fn no_tests_exit_is_still_a_success(invocation_fixture: InvocationFixture) {
        let invoker = SystemRunnerInvoker::new()
            .with_command_path(invocation_fixture.fake_runner(5))
            .with_report_path(invocation_fixture.report_path());

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("invocation should run");

        assert!(report.project_exists);
        assert_eq!(report.outcome.state, RunState::Success);
        assert_eq!(report.outcome.description, SUCCESS_DESCRIPTION);
    }

    #[rstest]
    fn missing_project_skips_the_summary(invocation_fixture: InvocationFixture) {
        let report_path = invocation_fixture.report_path();
        fs::write(&report_path, "## stale summary\n").expect("report should write");
        let invoker = SystemRunnerInvoker::new()
            .with_command_path(invocation_fixture.fake_runner(255))
            .with_report_path(report_path);

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("invocation should run");

        assert!(!report.project_exists);
        assert_eq!(report.outcome.summary, "");
    }

    #[rstest]
    fn other_failures_map_to_the_failure_description(invocation_fixture: InvocationFixture) {
        let invoker = SystemRunnerInvoker::new()
            .with_command_path(invocation_fixture.fake_runner(2))
            .with_report_path(invocation_fixture.report_path());

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("invocation should run");

        assert!(report.project_exists);
        assert_eq!(report.outcome.state, RunState::Failure);
        assert_eq!(report.outcome.description, FAILURE_DESCRIPTION);
    }

    #[rstest]
    fn missing_report_file_yields_an_empty_summary(invocation_fixture: InvocationFixture) {
        let invoker = SystemRunnerInvoker::new()
            .with_command_path(invocation_fixture.fake_runner(0))
            .with_report_path(invocation_fixture.report_path());

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("invocation should run");

        assert_eq!(report.outcome.summary, "");
    }

    #[rstest]
    fn absent_runner_binary_counts_as_a_test_failure(invocation_fixture: InvocationFixture) {
        // `sh -c` reports 127 for an unknown command, which the contract
        // folds into the generic failure class.
        let invoker = SystemRunnerInvoker::new()
            .with_command_path("/nonexistent/snowmate_runner".to_owned())
            .with_report_path(invocation_fixture.report_path());

        let report = invoker
            .invoke(&invocation_fixture.request())
            .expect("the hosting shell still runs");

        assert_eq!(report.outcome.state, RunState::Failure);
    }
}
