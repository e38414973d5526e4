// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CoverageBuilder, archive};
use crate::{
    errors::{ArchiveError, CoverageError},
    helpers::plural,
    launcher::{CancellationFlag, JvmLauncher},
};
use camino::Utf8PathBuf;
use tracing::info;

/// What [`CoverageBuilder::finalize`] produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoverageSummary {
    /// The snapshots that were merged.
    pub snapshots: Vec<Utf8PathBuf>,

    /// The directory the report was written into. It no longer exists if it was removed after
    /// archiving.
    pub report_dir: Utf8PathBuf,

    /// The archive, if one was written.
    pub archive: Option<Utf8PathBuf>,

    /// Whether the report directory was removed after archiving.
    pub report_dir_removed: bool,
}

impl CoverageBuilder {
    /// Merges every snapshot in the destination directory and writes the coverage report, using
    /// `launcher` to run the JaCoCo CLI.
    ///
    /// Returns `None` without running anything if there are no snapshots. Call this once every
    /// JVM has exited: snapshots are only written at JVM shutdown.
    pub fn finalize(
        &self,
        launcher: &JvmLauncher,
        cancel: &CancellationFlag,
    ) -> Result<Option<CoverageSummary>, CoverageError> {
        let snapshots = self.discover_snapshots()?;
        let Some(plan) = self.report_plan(&snapshots) else {
            info!("no coverage snapshots in {}, skipping report", self.dest_dir);
            return Ok(None);
        };

        info!(
            "merging {} coverage {}",
            plan.snapshots.len(),
            plural::snapshots_str(plan.snapshots.len())
        );
        std::fs::create_dir_all(&plan.report_dir).map_err(|err| CoverageError::DestDir {
            path: plan.report_dir.clone(),
            err,
        })?;

        // Tool output goes next to the snapshots, so that it survives removal of the report
        // directory.
        launcher
            .run_java_tool("jacoco-merge", plan.merge_args.clone(), &self.dest_dir, cancel)
            .map_err(|err| CoverageError::ToolFailed {
                step: "merge",
                err: Box::new(err),
            })?;
        launcher
            .run_java_tool("jacoco-report", plan.report_args.clone(), &self.dest_dir, cancel)
            .map_err(|err| CoverageError::ToolFailed {
                step: "report",
                err: Box::new(err),
            })?;
        info!("wrote coverage report to {}", plan.report_dir);

        let mut summary = CoverageSummary {
            snapshots: plan.snapshots,
            report_dir: plan.report_dir,
            archive: None,
            report_dir_removed: false,
        };
        if let Some(step) = plan.archive {
            if let Some(parent) = step.archive_path.parent() {
                std::fs::create_dir_all(parent).map_err(|error| {
                    ArchiveError::OutputArchiveIo {
                        path: step.archive_path.clone(),
                        error,
                    }
                })?;
            }
            archive::archive_report_dir(&summary.report_dir, &step.archive_path)?;
            if step.remove_report_dir {
                archive::remove_report_dir(&summary.report_dir)?;
                summary.report_dir_removed = true;
            }
            summary.archive = Some(step.archive_path);
        }
        Ok(Some(summary))
    }
}
