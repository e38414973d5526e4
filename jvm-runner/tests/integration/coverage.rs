// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use jvm_runner::{
    coverage::{MERGED_FILE_NAME, XML_REPORT_FILE_NAME, parse_agent_jvm_arg},
    launcher::{CancellationFlag, JvmLauncher, LaunchTarget, ProgramLaunch},
    session::SessionId,
};
use pretty_assertions::assert_eq;

#[test]
fn concurrent_sessions_write_distinct_snapshots() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(true)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;
    let builder = launcher.coverage().expect("coverage is enabled");
    let cancel = CancellationFlag::new();

    let sessions = [SessionId::allocate("first")?, SessionId::allocate("second")?];
    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = sessions
            .iter()
            .map(|session| {
                let launcher = &launcher;
                let cancel = &cancel;
                let output_dir = workspace.output_dir(session.label());
                scope.spawn(move || {
                    let launch = ProgramLaunch::new(LaunchTarget::parse("myorg.Echo"), output_dir);
                    launcher.launch(&launch, session, cancel)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("launch thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    for (outcome, session) in outcomes.iter().zip(&sessions) {
        let snapshot = outcome
            .coverage_snapshot
            .as_ref()
            .expect("coverage snapshot is expected");
        assert_eq!(snapshot.path, builder.snapshot_path(session));
        ensure!(snapshot.written, "{} was written", snapshot.path);

        // The agent argument passed to the JVM points at the same file.
        let stdout = std::fs::read_to_string(&outcome.output.stdout)?;
        let agent_arg = stdout
            .lines()
            .find(|line| line.starts_with("-javaagent:"))
            .expect("agent argument was passed");
        let parsed = parse_agent_jvm_arg(agent_arg)?;
        assert_eq!(parsed.dest_file(), Some(snapshot.path.as_path()));
        assert_eq!(parsed.session_id(), Some(session.to_string().as_str()));
    }

    let snapshots = builder.discover_snapshots()?;
    assert_eq!(snapshots.len(), 2, "one snapshot per session: {snapshots:?}");
    Ok(())
}

#[test]
fn finalize_merges_reports_and_archives() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(true)?;
    let mut launcher = JvmLauncher::new(&workspace.config()?)?;
    let cancel = CancellationFlag::new();

    let launch = ProgramLaunch::new(
        LaunchTarget::parse("myorg.Echo"),
        workspace.output_dir("echo"),
    );
    launcher.launch(&launch, &SessionId::new("echo", 1), &cancel)?;

    // Without an archive the report directory is kept.
    let builder = launcher.coverage().expect("coverage is enabled").clone();
    let summary = builder
        .finalize(&launcher, &cancel)?
        .expect("there is a snapshot");
    assert_eq!(summary.snapshots.len(), 1);
    assert_eq!(summary.report_dir, workspace.root().join("coverage-report"));
    ensure!(summary.report_dir.join(MERGED_FILE_NAME).is_file(), "merged file written");
    ensure!(summary.report_dir.join(XML_REPORT_FILE_NAME).is_file(), "XML report written");
    ensure!(summary.report_dir.join("index.html").is_file(), "HTML report written");
    ensure!(
        builder.dest_dir().join("jacoco-merge.out").is_file(),
        "tool output is kept next to the snapshots"
    );

    let mut builder = builder;
    let archive = workspace.root().join("archives/java-coverage.tar.zst");
    builder
        .set_archive(Some(archive.clone()))
        .set_remove_report_dir_after_archive(true);
    launcher.set_coverage(Some(builder.clone()));
    let summary = builder
        .finalize(&launcher, &cancel)?
        .expect("there is a snapshot");
    assert_eq!(summary.archive.as_ref(), Some(&archive));
    ensure!(summary.report_dir_removed, "report dir removed");
    ensure!(!summary.report_dir.exists(), "report dir no longer exists");
    ensure!(std::fs::metadata(&archive)?.len() > 0, "archive is not empty");
    Ok(())
}

#[test]
fn finalize_without_snapshots() -> Result<()> {
    test_init();
    let workspace = TempWorkspace::new(true)?;
    let launcher = JvmLauncher::new(&workspace.config()?)?;
    let builder = launcher.coverage().expect("coverage is enabled");
    let summary = builder.finalize(&launcher, &CancellationFlag::new())?;
    assert_eq!(summary, None);
    ensure!(
        !builder.report_dir().exists(),
        "no report directory without snapshots"
    );
    Ok(())
}
