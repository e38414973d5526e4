// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, JvmTestExitCode, Result,
    output::{OutputContext, OutputWriter, ResultStyles},
};
use camino::Utf8PathBuf;
use clap::Args;
use jvm_runner::{
    classpath::split_classpath,
    config::JvmTestConfig,
    descriptor::{JunitDescriptor, discover_test_classes},
    helpers::plural,
    launcher::{CancellationFlag, JvmLauncher},
    reports::{RunVerdict, Verdict},
    session::SessionId,
};
use owo_colors::OwoColorize;
use std::{io::Write, time::Duration};
use tracing::{error, info};

#[derive(Debug, Args)]
pub(super) struct JunitOpts {
    /// Directory holding the compiled test classes
    #[arg(long, value_name = "DIR")]
    classes: Utf8PathBuf,

    /// Directory that output files and XML reports are written into
    #[arg(long, value_name = "DIR")]
    output: Utf8PathBuf,

    /// Run each test class found in this source directory separately
    #[arg(long, value_name = "SRC_DIR", conflicts_with = "select")]
    discover: Option<Utf8PathBuf>,

    /// JUnit selection argument, for example `--select=--select-class=myorg.MyTests`
    ///
    /// If no selection is given, every package in the classes directory is scanned.
    #[arg(long = "select", value_name = "ARG", allow_hyphen_values = true)]
    select: Vec<String>,

    /// Only run tests with this tag
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Extra classpath entries or globs, added after the test classes
    ///
    /// Entries may be separated with `;` or the platform's path separator, as with `java -cp`.
    #[arg(long = "classpath", value_name = "ENTRIES")]
    classpath: Vec<String>,

    /// Extra argument for the JUnit console launcher
    #[arg(long = "junit-arg", value_name = "ARG", allow_hyphen_values = true)]
    junit_args: Vec<String>,

    /// Extra JVM argument
    #[arg(long = "jvm-arg", value_name = "ARG", allow_hyphen_values = true)]
    jvm_args: Vec<String>,

    /// How long each JUnit run may take, for example `10m`
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Collect coverage, even if it isn't enabled in the config
    #[arg(long)]
    coverage: bool,
}

impl JunitOpts {
    pub(super) fn exec(
        self,
        mut config: JvmTestConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        if self.coverage {
            config.coverage.enabled = true;
        }
        let launcher = JvmLauncher::new(&config)?;
        let descriptors = self.descriptors(&config)?;
        let custom_selection = !self.tags.is_empty()
            || !config.junit.include_tags.is_empty()
            || !self.junit_args.is_empty();

        let cancel = CancellationFlag::new();
        let styles = output.stdout_styles();
        let mut writer = output_writer.stdout_writer();
        let mut worst = Verdict::Passed;
        let mut failed_runs = 0;

        for descriptor in &descriptors {
            let session = SessionId::allocate(&descriptor.id)
                .map_err(|err| ExpectedError::SessionAllocate { err })?;
            let verdict = match launcher.run_junit(descriptor, &session, &cancel) {
                Ok(run) => run.verdict(custom_selection),
                // A broken configuration would break every other run the same way.
                Err(err) if err.is_configuration() => return Err(err.into()),
                Err(err) => {
                    error!("JUnit run for {} failed: {err}", descriptor.id);
                    let verdict = if err.is_timeout() {
                        Verdict::TimedOut
                    } else {
                        Verdict::Blocked
                    };
                    RunVerdict::for_launch_failure(verdict, err.to_string())
                }
            };

            write_verdict(&mut writer, &descriptor.id, &verdict, &styles)
                .map_err(ExpectedError::write_output)?;
            if verdict.verdict > Verdict::Skipped {
                failed_runs += 1;
            }
            worst = worst.max(verdict.verdict);
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        if let Some(builder) = launcher.coverage()
            && let Some(summary) = builder.finalize(&launcher, &cancel)?
        {
            info!(
                "coverage report from {} {} written to {}",
                summary.snapshots.len(),
                plural::snapshots_str(summary.snapshots.len()),
                summary.report_dir,
            );
        }

        if failed_runs > 0 {
            return Err(ExpectedError::TestRunFailed {
                verdict: worst,
                failed_runs,
            });
        }
        Ok(JvmTestExitCode::OK)
    }

    fn descriptors(&self, config: &JvmTestConfig) -> Result<Vec<JunitDescriptor>> {
        let mut descriptors = match &self.discover {
            Some(source_dir) => discover_test_classes(source_dir, &config.junit)?
                .iter()
                .map(|class| class.to_descriptor(&self.classes, &self.output))
                .collect(),
            None => {
                let id = self
                    .classes
                    .file_name()
                    .unwrap_or("junit")
                    .to_owned();
                let mut descriptor = JunitDescriptor::new(id, &self.classes, &self.output);
                descriptor.selection_args = self.select.clone();
                vec![descriptor]
            }
        };

        for descriptor in &mut descriptors {
            descriptor
                .classpath
                .extend(self.classpath.iter().flat_map(|entries| split_classpath(entries)));
            descriptor.jvm_args.extend(self.jvm_args.iter().cloned());
            descriptor.include_tags.extend(self.tags.iter().cloned());
            descriptor.extra_args.extend(self.junit_args.iter().cloned());
            descriptor.timeout = self.timeout;
        }
        Ok(descriptors)
    }
}

fn write_verdict(
    writer: &mut dyn Write,
    id: &str,
    verdict: &RunVerdict,
    styles: &ResultStyles,
) -> std::io::Result<()> {
    let style = match verdict.verdict {
        Verdict::Passed => styles.pass,
        Verdict::Skipped => styles.skip,
        Verdict::Failed | Verdict::TimedOut | Verdict::Blocked => styles.fail,
    };
    write!(
        writer,
        "{:>10} {}: {}",
        verdict.verdict.as_str().to_uppercase().style(style),
        id.style(styles.path),
        verdict.counts,
    )?;
    if verdict.duplicates > 0 {
        write!(writer, ", {} duplicates ignored", verdict.duplicates)?;
    }
    writeln!(writer)?;
    if !verdict.reason.is_empty() {
        writeln!(writer, "{:>10} {}", "", verdict.reason)?;
    }
    Ok(())
}
