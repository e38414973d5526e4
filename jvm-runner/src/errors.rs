// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by jvm-runner.

use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use itertools::Itertools;
use std::{fmt, time::Duration};
use thiserror::Error;

/// An error that occurred while reading jvmtest configuration.
#[derive(Debug, Error)]
#[error("failed to read jvmtest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigReadError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigReadErrorKind,
}

impl ConfigReadError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigReadErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to be read.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigReadErrorKind {
        &self.kind
    }
}

/// The kind of a [`ConfigReadError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigReadErrorKind {
    /// The layered configuration could not be built, e.g. because a file is not valid TOML.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The configuration could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurred while resolving a classpath.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClasspathError {
    /// A glob pattern did not match any files.
    #[error("classpath pattern `{pattern}` did not match any files")]
    NoMatches {
        /// The pattern.
        pattern: String,
    },

    /// A glob pattern is invalid.
    #[error("invalid classpath pattern `{pattern}`")]
    InvalidGlob {
        /// The pattern.
        pattern: String,

        /// The underlying error.
        #[source]
        err: globset::Error,
    },

    /// A directory could not be read while expanding a pattern.
    #[error("error reading `{path}` while expanding classpath pattern")]
    ReadDir {
        /// The directory being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// A path found while expanding a pattern is not valid UTF-8.
    #[error("classpath entry `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path.
        path: std::path::PathBuf,
    },
}

/// An error related to code coverage.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoverageError {
    /// The coverage classpath could not be resolved.
    #[error(transparent)]
    Classpath(#[from] ClasspathError),

    /// A JaCoCo jar could not be found on the coverage classpath.
    #[error(
        "could not find `{jar_prefix}*.jar` on the coverage classpath ({})",
        DisplayPaths(.classpath)
    )]
    JarNotFound {
        /// The prefix of the jar being looked for.
        jar_prefix: &'static str,

        /// The classpath that was searched.
        classpath: Vec<Utf8PathBuf>,
    },

    /// The agent jar path contains `=`, which JaCoCo would misinterpret.
    #[error("coverage agent path `{path}` contains `=`, which the JVM cannot represent")]
    AgentPathHasEquals {
        /// The agent path.
        path: Utf8PathBuf,
    },

    /// An agent option can't be represented in the agent argument.
    #[error("coverage agent option `{key}={value}` cannot be represented: {reason}")]
    UnrepresentableOption {
        /// The option key.
        key: String,

        /// The option value.
        value: String,

        /// Why it cannot be represented.
        reason: &'static str,
    },

    /// A `-javaagent` argument could not be parsed.
    #[error("malformed coverage agent argument `{arg}`: {reason}")]
    MalformedAgentArg {
        /// The argument.
        arg: String,

        /// What was wrong with it.
        reason: &'static str,
    },

    /// The destination directory could not be created or read.
    #[error("error accessing coverage directory `{path}`")]
    DestDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// A merge or report step failed.
    #[error("coverage {step} step failed")]
    ToolFailed {
        /// The step that failed.
        step: &'static str,

        /// The underlying error.
        #[source]
        err: Box<LaunchError>,
    },

    /// The report could not be archived.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// An error that occurred while archiving a coverage report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    /// The archive path does not end with `.tar.zst`.
    #[error("archive path `{path}` must end with `.tar.zst`")]
    UnsupportedExtension {
        /// The archive path.
        path: Utf8PathBuf,
    },

    /// An error occurred while reading data from a file on disk.
    #[error("error writing {} `{path}` to archive", kind_str(*.is_dir))]
    InputFileRead {
        /// The name of the file that could not be read.
        path: Utf8PathBuf,

        /// Whether this is a directory. `None` means the status was unknown.
        is_dir: Option<bool>,

        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while writing data to the output file.
    #[error("error writing to archive `{path}`")]
    OutputArchiveIo {
        /// The archive path.
        path: Utf8PathBuf,

        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },

    /// The report directory could not be removed after archiving.
    #[error("error removing report directory `{path}` after archiving")]
    RemoveReportDir {
        /// The report directory.
        path: Utf8PathBuf,

        /// The error that occurred.
        #[source]
        error: std::io::Error,
    },
}

fn kind_str(is_dir: Option<bool>) -> &'static str {
    match is_dir {
        Some(true) => "directory",
        Some(false) => "file",
        None => "path",
    }
}

/// An error that occurred while launching a JVM or another tool.
///
/// Errors fall into three broad groups, distinguished by [`LaunchError::is_configuration`] and
/// [`LaunchError::is_timeout`]: problems found before anything is spawned, timeouts, and
/// failures of the process itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LaunchError {
    /// The classpath could not be resolved.
    #[error(transparent)]
    Classpath(#[from] ClasspathError),

    /// The coverage agent argument could not be built.
    #[error(transparent)]
    Coverage(#[from] CoverageError),

    /// A `.jar` pattern did not match exactly one file.
    #[error("jar pattern `{pattern}` matched {} files, expected exactly one", .matches.len())]
    JarPattern {
        /// The pattern.
        pattern: String,

        /// The files it matched.
        matches: Vec<Utf8PathBuf>,
    },

    /// A classpath was given for a `.jar` launch.
    #[error("cannot specify a classpath when launching jar `{jar}`")]
    ClasspathWithJar {
        /// The jar.
        jar: Utf8PathBuf,
    },

    /// The JUnit console launcher is not on the classpath.
    #[error(
        "could not find `junit-platform-console-standalone` on the JUnit classpath ({})",
        DisplayPaths(.classpath)
    )]
    LauncherJarNotFound {
        /// The classpath that was searched.
        classpath: Vec<Utf8PathBuf>,
    },

    /// A directory needed by the launch could not be created.
    #[error("error creating directory `{path}`")]
    CreateDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// An output file could not be created.
    #[error("error creating output file `{path}`")]
    OutputFile {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The argument file could not be written.
    #[error("error writing argument file `{path}`")]
    Argfile {
        /// The file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The executable could not be found.
    #[error("executable `{program}` not found")]
    ExecutableNotFound {
        /// The program.
        program: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The process could not be spawned or waited for.
    #[error("error running `{program}`")]
    Spawn {
        /// The program.
        program: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The process exited with a code that isn't expected.
    #[error(
        "`{program}` exited with {}, see `{stderr}` for details",
        DisplayExitCode(*.exit_code)
    )]
    UnexpectedExit {
        /// The program.
        program: String,

        /// The exit code, or `None` if the process was terminated by a signal.
        exit_code: Option<i32>,

        /// The file stdout was written to.
        stdout: Utf8PathBuf,

        /// The file stderr was written to.
        stderr: Utf8PathBuf,
    },

    /// The process didn't exit before its timeout, and was killed.
    #[error("`{program}` timed out after {timeout:?} and was killed")]
    TimedOut {
        /// The program.
        program: String,

        /// The timeout.
        timeout: Duration,

        /// The file stdout was written to.
        stdout: Utf8PathBuf,

        /// The file stderr was written to.
        stderr: Utf8PathBuf,
    },

    /// Cancellation was requested while the process was running, and it was killed.
    #[error("`{program}` was cancelled")]
    Cancelled {
        /// The program.
        program: String,
    },

    /// A directory the launch reads from, such as the JUnit reports directory, could not be
    /// listed.
    #[error("error listing directory `{path}`")]
    ReadDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

impl LaunchError {
    /// Returns true if this error was detected before any process was spawned.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LaunchError::Classpath(_)
                | LaunchError::Coverage(_)
                | LaunchError::JarPattern { .. }
                | LaunchError::ClasspathWithJar { .. }
                | LaunchError::LauncherJarNotFound { .. }
        )
    }

    /// Returns true if the process was killed because it timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LaunchError::TimedOut { .. })
    }
}

/// An error that occurred while compiling Java sources.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// There were no `.java` files to compile.
    #[error("no .java files found in {}", DisplayPaths(.inputs))]
    NoSourceFiles {
        /// The inputs that were searched.
        inputs: Vec<Utf8PathBuf>,
    },

    /// An input directory could not be read.
    #[error("error reading Java sources from `{path}`")]
    ReadDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// An input path doesn't exist.
    #[error("compilation input `{path}` does not exist")]
    InputNotFound {
        /// The input.
        path: Utf8PathBuf,
    },

    /// `javac` could not be run, or reported errors.
    #[error("javac failed: {}", .first_error.as_deref().unwrap_or("see stderr for details"))]
    Javac {
        /// The first error line written by `javac`, if it got far enough to write one.
        first_error: Option<String>,

        /// The underlying error.
        #[source]
        err: LaunchError,
    },
}

/// An error that occurred while discovering JUnit test classes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The input directory could not be read.
    #[error("error discovering test classes in `{path}`")]
    ReadDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },

    /// No test classes were found.
    #[error("no test classes matching `{regex}` found in `{path}`")]
    NoTestClasses {
        /// The directory that was searched.
        path: Utf8PathBuf,

        /// The regex class names must match.
        regex: String,
    },
}

struct DisplayPaths<'a>(&'a [Utf8PathBuf]);

impl fmt::Display for DisplayPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "empty")
        } else {
            write!(f, "{}", self.0.iter().join(", "))
        }
    }
}

struct DisplayExitCode(Option<i32>);

impl fmt::Display for DisplayExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "a signal"),
        }
    }
}
