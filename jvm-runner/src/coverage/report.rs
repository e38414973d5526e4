// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::CoverageBuilder;
use crate::config::ReportFormat;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

/// The file the merged snapshots are written to, within the report directory.
pub const MERGED_FILE_NAME: &str = "jacoco-merged-java-coverage.exec";

/// The XML report, within the report directory.
pub const XML_REPORT_FILE_NAME: &str = "java-coverage.xml";

/// The CSV report, within the report directory.
pub const CSV_REPORT_FILE_NAME: &str = "java-coverage.csv";

/// The steps needed to turn per-process snapshots into a coverage report.
///
/// `merge_args` and `report_args` are JVM arguments (starting with `-jar`) for the JaCoCo CLI.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportPlan {
    /// The snapshots being merged.
    pub snapshots: Vec<Utf8PathBuf>,

    /// The directory the report is written into.
    pub report_dir: Utf8PathBuf,

    /// The merged snapshot.
    pub merged_file: Utf8PathBuf,

    /// Arguments for the merge step.
    pub merge_args: Vec<String>,

    /// Arguments for the report step.
    pub report_args: Vec<String>,

    /// What to do with the report directory afterwards.
    pub archive: Option<ArchiveStep>,
}

/// Archives the report directory once the report has been written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchiveStep {
    /// The `.tar.zst` file to write.
    pub archive_path: Utf8PathBuf,

    /// Whether to remove the report directory once it has been archived.
    pub remove_report_dir: bool,
}

pub(super) fn build_plan(builder: &CoverageBuilder, snapshots: &[Utf8PathBuf]) -> Option<ReportPlan> {
    if snapshots.is_empty() {
        return None;
    }

    let report_dir = builder.report_dir.clone();
    let merged_file = report_dir.join(MERGED_FILE_NAME);
    let cli_jar = builder.cli_jar.as_str();

    let mut merge_args: Vec<String> = vec!["-jar".into(), cli_jar.into(), "merge".into()];
    merge_args.extend(snapshots.iter().map(|snapshot| snapshot.to_string()));
    merge_args.extend(["--destfile".into(), merged_file.to_string()]);
    merge_args.extend(builder.merge_args.iter().cloned());

    let mut report_args: Vec<String> = vec![
        "-jar".into(),
        cli_jar.into(),
        "report".into(),
        merged_file.to_string(),
    ];
    for class_dir in existing_dirs(&builder.class_dirs, "class") {
        report_args.extend(["--classfiles".into(), class_dir.to_string()]);
    }
    for source_dir in existing_dirs(&builder.source_dirs, "source") {
        report_args.extend(["--sourcefiles".into(), source_dir.to_string()]);
    }
    report_args.extend(["--name".into(), builder.report_title.clone()]);
    if let Some(encoding) = &builder.source_encoding {
        report_args.extend(["--encoding".into(), encoding.clone()]);
    }
    for format in &builder.report_formats {
        let (flag, dest) = match format {
            ReportFormat::Html => ("--html", report_dir.clone()),
            ReportFormat::Xml => ("--xml", report_dir.join(XML_REPORT_FILE_NAME)),
            ReportFormat::Csv => ("--csv", report_dir.join(CSV_REPORT_FILE_NAME)),
        };
        report_args.extend([flag.into(), dest.to_string()]);
    }
    report_args.extend(builder.report_args.iter().cloned());

    let archive = builder.archive.as_ref().map(|archive_path| ArchiveStep {
        archive_path: archive_path.clone(),
        remove_report_dir: builder.remove_report_dir_after_archive,
    });

    Some(ReportPlan {
        snapshots: snapshots.to_vec(),
        report_dir,
        merged_file,
        merge_args,
        report_args,
        archive,
    })
}

fn existing_dirs<'a>(
    dirs: &'a [Utf8PathBuf],
    kind: &'a str,
) -> impl Iterator<Item = &'a Utf8Path> + 'a {
    dirs.iter().filter_map(move |dir| {
        if dir.is_dir() {
            Some(dir.as_path())
        } else {
            warn!("skipping coverage {kind} directory {dir}, which does not exist");
            None
        }
    })
}
