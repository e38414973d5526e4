// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use itertools::Itertools;
use jvm_runner::{
    errors::{CompileError, ConfigReadError, CoverageError, DiscoveryError, LaunchError},
    reports::Verdict,
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes returned by jvmtest.
pub enum JvmTestExitCode {}

impl JvmTestExitCode {
    /// No errors occurred and jvmtest exited normally.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a jvmtest invocation, for example invalid
    /// configuration or a missing jar.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests failed, timed out or were blocked.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// One or more JUnit XML reports could not be parsed.
    pub const REPORT_PARSE_FAILED: i32 = 101;

    /// A JVM could not be started, or exited unexpectedly.
    pub const LAUNCH_FAILED: i32 = 102;

    /// A JVM timed out and was killed.
    pub const TIMED_OUT: i32 = 103;

    /// Merging, reporting or archiving coverage failed.
    pub const COVERAGE_FAILED: i32 = 104;

    /// Compiling Java sources failed.
    pub const COMPILE_FAILED: i32 = 105;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders: display_to_stderr is the expected way to print these
// errors, since it colorizes them.

/// An error that jvmtest reports to the user, mapped to an exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDir {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config read error")]
    ConfigRead {
        #[from]
        err: ConfigReadError,
    },
    #[error("invalid regex")]
    InvalidRegex {
        option: &'static str,
        #[source]
        err: regex::Error,
    },
    #[error("{count} reports failed to parse")]
    ReportParseFailed { count: usize },
    #[error("test discovery failed")]
    Discovery {
        #[from]
        err: DiscoveryError,
    },
    #[error("session allocation failed")]
    SessionAllocate {
        #[source]
        err: std::io::Error,
    },
    #[error("launch failed")]
    Launch {
        #[from]
        err: LaunchError,
    },
    #[error("coverage failed")]
    Coverage {
        #[from]
        err: CoverageError,
    },
    #[error("compile failed")]
    Compile {
        #[from]
        err: CompileError,
    },
    #[error("test run failed")]
    TestRunFailed { verdict: Verdict, failed_runs: usize },
    #[error("error writing output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing JSON")]
    Json {
        #[source]
        err: serde_json::Error,
    },
    #[error("failed to read input")]
    ReadInput {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("no JUnit XML files found")]
    NoReportFiles { inputs: Vec<Utf8PathBuf> },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDir { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigRead { .. }
            | Self::InvalidRegex { .. }
            | Self::Discovery { .. }
            | Self::SessionAllocate { .. }
            | Self::ReadInput { .. }
            | Self::NoReportFiles { .. } => JvmTestExitCode::SETUP_ERROR,
            Self::ReportParseFailed { .. } => JvmTestExitCode::REPORT_PARSE_FAILED,
            Self::Launch { err } if err.is_configuration() => JvmTestExitCode::SETUP_ERROR,
            Self::Launch { err } if err.is_timeout() => JvmTestExitCode::TIMED_OUT,
            Self::Launch { .. } => JvmTestExitCode::LAUNCH_FAILED,
            Self::Coverage { .. } => JvmTestExitCode::COVERAGE_FAILED,
            Self::Compile { .. } => JvmTestExitCode::COMPILE_FAILED,
            Self::TestRunFailed { .. } => JvmTestExitCode::TEST_RUN_FAILED,
            Self::WriteOutput { .. } | Self::Json { .. } => JvmTestExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDir { err } => {
                tracing::error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                tracing::error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigRead { err } => {
                tracing::error!(
                    "failed to read config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::InvalidRegex { option, err } => {
                tracing::error!("invalid regex for `{}`", option.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ReportParseFailed { count } => {
                tracing::error!(
                    "{} could not be parsed",
                    format!("{count} {}", if *count == 1 { "report" } else { "reports" })
                        .style(styles.bold)
                );
                None
            }
            Self::Discovery { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::SessionAllocate { err } => {
                tracing::error!("failed to allocate a session ID");
                Some(err as &dyn Error)
            }
            Self::Launch { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::Coverage { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::Compile { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TestRunFailed {
                verdict,
                failed_runs,
            } => {
                tracing::error!(
                    "test run {} ({} {} did not pass)",
                    verdict.style(styles.warning_text),
                    failed_runs.style(styles.bold),
                    if *failed_runs == 1 { "run" } else { "runs" },
                );
                None
            }
            Self::WriteOutput { err } => {
                tracing::error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::Json { err } => {
                tracing::error!("error serializing JSON");
                Some(err as &dyn Error)
            }
            Self::ReadInput { path, err } => {
                tracing::error!("failed to read `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::NoReportFiles { inputs } => {
                tracing::error!(
                    "no JUnit XML files found in {}",
                    inputs.iter().join(", ").style(styles.bold)
                );
                None
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: "jvmtest::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_classify_launch_errors() {
        let timeout = ExpectedError::from(LaunchError::TimedOut {
            program: "java".to_owned(),
            timeout: std::time::Duration::from_secs(1),
            stdout: "java.out".into(),
            stderr: "java.err".into(),
        });
        assert_eq!(timeout.process_exit_code(), JvmTestExitCode::TIMED_OUT);

        let configuration = ExpectedError::from(LaunchError::LauncherJarNotFound {
            classpath: Vec::new(),
        });
        assert_eq!(
            configuration.process_exit_code(),
            JvmTestExitCode::SETUP_ERROR
        );

        let exit = ExpectedError::from(LaunchError::UnexpectedExit {
            program: "java".to_owned(),
            exit_code: Some(3),
            stdout: "java.out".into(),
            stderr: "java.err".into(),
        });
        assert_eq!(exit.process_exit_code(), JvmTestExitCode::LAUNCH_FAILED);
    }
}
