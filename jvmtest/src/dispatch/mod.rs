// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

mod compile;
mod coverage;
mod junit;
mod parse;

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Subcommand};
use jvm_runner::config::JvmTestConfig;

/// Runs JUnit tests on the JVM, collects JaCoCo coverage and reads JUnit XML reports.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct JvmTestApp {
    #[clap(flatten)]
    config: ConfigOpts,

    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl JvmTestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = self.config.load()?;
        match self.command {
            Command::Parse(opts) => opts.exec(&config, output, output_writer),
            Command::Junit(opts) => opts.exec(config, output, output_writer),
            Command::CoverageReport(opts) => opts.exec(config, output_writer),
            Command::Compile(opts) => opts.exec(&config, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse JUnit XML reports and print the outcomes they record
    Parse(parse::ParseOpts),
    /// Run JUnit tests with the JUnit Platform console launcher
    ///
    /// Each run writes its output and XML reports into its own directory, and ends with a
    /// verdict aggregated from the reports. With coverage enabled, every JVM gets the JaCoCo
    /// agent and the snapshots are merged into a report once all runs are done.
    Junit(Box<junit::JunitOpts>),
    /// Merge coverage snapshots and write the coverage report
    CoverageReport(coverage::CoverageReportOpts),
    /// Compile Java sources with javac
    Compile(compile::CompileOpts),
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: .config/jvmtest.toml in the workspace root]
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Directory relative paths in the config are resolved against [default: current directory]
    #[arg(long, global = true, value_name = "DIR", env = "JVMTEST_WORKSPACE_ROOT")]
    workspace_root: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn load(&self) -> Result<JvmTestConfig> {
        let current_dir = current_dir()?;
        let workspace_root = match &self.workspace_root {
            Some(root) => absolute(&current_dir, root),
            None => current_dir.clone(),
        };
        let config_file = self
            .config_file
            .as_deref()
            .map(|file| absolute(&current_dir, file));
        Ok(JvmTestConfig::from_sources(
            config_file.as_deref(),
            workspace_root,
        )?)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let current_dir =
        std::env::current_dir().map_err(|err| ExpectedError::CurrentDir { err })?;
    Utf8PathBuf::try_from(current_dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 {
        path: err.into_path_buf(),
    })
}

fn absolute(current_dir: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        current_dir.join(path)
    }
}
