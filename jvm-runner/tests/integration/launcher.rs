// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use jvm_runner::{
    descriptor::JunitDescriptor,
    errors::LaunchError,
    launcher::{CancellationFlag, JvmLauncher, LaunchTarget, ProgramLaunch},
    reports::Verdict,
    session::SessionId,
};
use junit_outcomes::OutcomeKind;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[test]
fn launch_main_class() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(false)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;
    let session = SessionId::new("echo", 1);
    let cancel = CancellationFlag::new();

    let mut launch = ProgramLaunch::new(
        LaunchTarget::parse("myorg.Echo"),
        workspace.output_dir("echo"),
    );
    launch.args = vec!["first arg".to_owned(), "second".to_owned()];
    launch
        .system_properties
        .insert("greeting".to_owned(), "hello".to_owned());

    let outcome = launcher.launch(&launch, &session, &cancel)?;
    assert_eq!(outcome.process.exit_code, Some(0));
    assert_eq!(outcome.output.stdout, workspace.output_dir("echo").join("Echo.out"));
    assert_eq!(outcome.coverage_snapshot, None);

    let stdout = std::fs::read_to_string(&outcome.output.stdout)?;
    let lines: Vec<_> = stdout.lines().collect();
    ensure!(lines.contains(&"-Dgreeting=hello"), "system property passed: {stdout}");
    ensure!(
        lines.ends_with(&["myorg.Echo", "first arg", "second"]),
        "main class and program arguments come last: {stdout}"
    );
    assert_eq!(
        std::fs::read_to_string(&outcome.output.stderr)?,
        "stderr from echo\n"
    );

    // A second launch with the same name gets its own output files.
    let outcome = launcher.launch(&launch, &session, &cancel)?;
    assert_eq!(
        outcome.output.stdout,
        workspace.output_dir("echo").join("Echo.1.out")
    );
    Ok(())
}

#[test]
fn unexpected_exit_code() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(false)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;

    let mut launch = ProgramLaunch::new(
        LaunchTarget::parse("myorg.Echo"),
        workspace.output_dir("exit"),
    );
    launch
        .env
        .insert("FAKE_JAVA_EXIT".to_owned(), "3".to_owned());

    let err = launcher
        .launch(&launch, &SessionId::new("exit", 1), &CancellationFlag::new())
        .unwrap_err();
    match err {
        LaunchError::UnexpectedExit { exit_code, .. } => assert_eq!(exit_code, Some(3)),
        other => panic!("unexpected error: {other:?}"),
    }

    // Exit code 3 is fine if it's expected.
    launch.expected_exit_codes = vec![0, 3];
    launcher.launch(&launch, &SessionId::new("exit", 2), &CancellationFlag::new())?;
    Ok(())
}

#[test]
fn timeout_kills_jvm() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(false)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;

    let mut launch = ProgramLaunch::new(
        LaunchTarget::parse("myorg.Sleeper"),
        workspace.output_dir("sleeper"),
    );
    launch.timeout = Some(Duration::from_millis(300));

    let start = Instant::now();
    let err = launcher
        .launch(&launch, &SessionId::new("sleeper", 1), &CancellationFlag::new())
        .unwrap_err();
    ensure!(err.is_timeout(), "expected a timeout: {err:?}");
    ensure!(
        start.elapsed() < Duration::from_secs(20),
        "the JVM was killed rather than waited for"
    );
    Ok(())
}

#[test]
fn junit_run_parses_reports() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(false)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;
    let session = SessionId::new("MyTests", 4000);

    let mut descriptor = JunitDescriptor::new(
        "MyTests",
        workspace.root().join("classes"),
        workspace.output_dir("MyTests"),
    );
    descriptor.selection_args = vec!["--select-class".to_owned(), "myorg.MyTests".to_owned()];

    let run = launcher.run_junit(&descriptor, &session, &CancellationFlag::new())?;
    assert_eq!(run.launch.process.exit_code, Some(1));
    assert_eq!(
        run.reports_dir,
        workspace.output_dir("MyTests").join("junit-reports.MyTests.4000")
    );
    assert_eq!(run.parse_errors().count(), 0);

    let outcomes: Vec<_> = run
        .parsed_reports()
        .flat_map(|report| &report.outcomes)
        .map(|outcome| (outcome.id.as_str(), outcome.kind, outcome.duration_secs))
        .collect();
    assert_eq!(
        outcomes,
        [
            ("myorg.MyTests.passes()", OutcomeKind::Passed, 0.5),
            ("myorg.MyTests.fails()", OutcomeKind::Failed, 1.2),
        ]
    );

    let verdict = run.verdict(false);
    assert_eq!(verdict.verdict, Verdict::Failed);
    ensure!(
        verdict.reason.contains("[in myorg.MyTests.fails()]"),
        "reason names the failed test: {}",
        verdict.reason
    );
    Ok(())
}

#[test]
fn missing_launcher_jar_is_a_configuration_error() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(false)?;
    let mut config = workspace.config()?;
    config.junit.classpath = vec!["lib/jacoco/*.jar".to_owned()];
    let launcher = JvmLauncher::new(&config)?;

    let descriptor = JunitDescriptor::new(
        "MyTests",
        workspace.root().join("classes"),
        workspace.output_dir("MyTests"),
    );
    let err = launcher
        .run_junit(&descriptor, &SessionId::new("MyTests", 1), &CancellationFlag::new())
        .unwrap_err();
    ensure!(err.is_configuration(), "{err:?}");
    ensure!(
        !workspace.output_dir("MyTests").exists(),
        "nothing was written before the error"
    );
    Ok(())
}
