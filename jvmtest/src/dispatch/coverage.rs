// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ExpectedError, JvmTestExitCode, Result, output::OutputWriter};
use camino::Utf8PathBuf;
use clap::Args;
use jvm_runner::{
    config::JvmTestConfig,
    coverage::CoverageBuilder,
    helpers::plural,
    launcher::{CancellationFlag, JvmLauncher},
};
use std::io::Write;

#[derive(Debug, Args)]
pub(super) struct CoverageReportOpts {
    /// Write the report directory into this `.tar.zst` archive
    #[arg(long, value_name = "PATH")]
    archive: Option<Utf8PathBuf>,

    /// Remove the report directory once it has been archived
    #[arg(long, requires = "archive")]
    remove_report_dir: bool,
}

impl CoverageReportOpts {
    pub(super) fn exec(
        self,
        mut config: JvmTestConfig,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        // The JaCoCo CLI runs without the agent.
        config.coverage.enabled = false;
        let launcher = JvmLauncher::new(&config)?;

        let mut builder = CoverageBuilder::from_config(&config.coverage, config.workspace_root())?;
        if let Some(archive) = self.archive {
            builder
                .set_archive(Some(archive))
                .set_remove_report_dir_after_archive(self.remove_report_dir);
        }

        let mut writer = output_writer.stdout_writer();
        match builder.finalize(&launcher, &CancellationFlag::new())? {
            Some(summary) => {
                writeln!(
                    writer,
                    "merged {} coverage {} into {}",
                    summary.snapshots.len(),
                    plural::snapshots_str(summary.snapshots.len()),
                    summary.report_dir,
                )
                .map_err(ExpectedError::write_output)?;
                if let Some(archive) = &summary.archive {
                    writeln!(writer, "archived coverage report to {archive}")
                        .map_err(ExpectedError::write_output)?;
                }
            }
            None => {
                writeln!(
                    writer,
                    "no coverage snapshots found in {}",
                    builder.dest_dir()
                )
                .map_err(ExpectedError::write_output)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output)?;
        Ok(JvmTestExitCode::OK)
    }
}
