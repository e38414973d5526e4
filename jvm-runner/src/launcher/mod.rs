// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Launching JVMs.
//!
//! The main structure in this module is [`JvmLauncher`]. It runs either a program (a main class or
//! a jar) or the JUnit console launcher, blocking until the JVM exits. Launches are independent of
//! each other, so a launcher may be shared between threads that each run their own JVM.

mod command;
mod junit;
mod process;

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

#[cfg(windows)]
#[path = "windows.rs"]
mod os;

pub use command::LaunchTarget;
pub(crate) use command::apply_argfile;
pub use junit::{CONSOLE_LAUNCHER_JAR_NAME, JUNIT_EXPECTED_EXIT_CODES};
pub use process::{
    CancellationFlag, DuctSpawner, OutputFiles, ProcessOutcome, ProcessSpawner, SpawnRequest,
};

use crate::{
    classpath::Classpath,
    config::{JavaConfig, JunitConfig, JvmTestConfig},
    coverage::CoverageBuilder,
    descriptor::JunitDescriptor,
    errors::LaunchError,
    reports::{RunVerdict, VerdictAggregator},
    session::SessionId,
};
use camino::{Utf8Path, Utf8PathBuf};
use command::JvmArgs;
use indexmap::IndexMap;
use junit_outcomes::{JunitXmlParser, OutcomeKind, ParseError, ParsedReport};
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// A request to run a Java program.
#[derive(Clone, Debug)]
pub struct ProgramLaunch {
    /// The main class or jar to run.
    pub target: LaunchTarget,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// The classpath for a main class. If empty, the configured classpath is used. Must be empty
    /// for a jar.
    pub classpath: Vec<String>,

    /// Extra JVM arguments.
    pub jvm_args: Vec<String>,

    /// Extra system properties.
    pub system_properties: IndexMap<String, String>,

    /// Extra environment variables.
    pub env: IndexMap<String, String>,

    /// The directory output files are written into.
    pub output_dir: Utf8PathBuf,

    /// The name of the output files. Defaults to the short name of the target.
    pub output_name: Option<String>,

    /// The working directory. Defaults to the output directory.
    pub cwd: Option<Utf8PathBuf>,

    /// How long the program may run. Defaults to the configured timeout.
    pub timeout: Option<Duration>,

    /// The exit codes that count as success.
    pub expected_exit_codes: Vec<i32>,

    /// Run without the coverage agent even if coverage is enabled.
    pub disable_coverage: bool,
}

impl ProgramLaunch {
    /// Creates a launch of `target` that's expected to exit with code 0.
    pub fn new(target: LaunchTarget, output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            target,
            args: Vec::new(),
            classpath: Vec::new(),
            jvm_args: Vec::new(),
            system_properties: IndexMap::new(),
            env: IndexMap::new(),
            output_dir: output_dir.into(),
            output_name: None,
            cwd: None,
            timeout: None,
            expected_exit_codes: vec![0],
            disable_coverage: false,
        }
    }
}

/// The result of a JVM that ran to completion with an expected exit code.
#[derive(Clone, Debug)]
pub struct LaunchOutcome {
    /// The files stdout and stderr were written to.
    pub output: OutputFiles,

    /// How the process exited.
    pub process: ProcessOutcome,

    /// The coverage snapshot the JVM was asked to write, if coverage was enabled.
    pub coverage_snapshot: Option<CoverageSnapshot>,
}

/// A coverage snapshot expected from a JVM.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoverageSnapshot {
    /// Where the snapshot should be.
    pub path: Utf8PathBuf,

    /// Whether the JVM actually wrote it.
    pub written: bool,
}

/// The result of a JUnit run.
#[derive(Debug)]
pub struct JunitRun {
    /// The JVM running the console launcher.
    pub launch: LaunchOutcome,

    /// The directory the XML reports were written into.
    pub reports_dir: Utf8PathBuf,

    /// Every XML report in the reports directory, in file name order.
    pub reports: Vec<(Utf8PathBuf, Result<ParsedReport, ParseError>)>,
}

impl JunitRun {
    /// Returns the reports that were parsed successfully.
    pub fn parsed_reports(&self) -> impl Iterator<Item = &ParsedReport> {
        self.reports.iter().filter_map(|(_, report)| report.as_ref().ok())
    }

    /// Returns the reports that could not be parsed.
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.reports.iter().filter_map(|(_, report)| report.as_ref().err())
    }

    /// Aggregates the reports into a verdict for the run.
    ///
    /// `custom_selection` should be true if the run was filtered in a way that may legitimately
    /// select no tests; see [`VerdictAggregator::new`].
    pub fn verdict(&self, custom_selection: bool) -> RunVerdict {
        let mut aggregator = VerdictAggregator::new(custom_selection);
        for (_, report) in &self.reports {
            match report {
                Ok(report) => aggregator.add_report(report),
                Err(error) => aggregator.add_parse_error(error),
            }
        }
        aggregator.finish()
    }
}

/// Launches JVMs according to the configuration.
#[derive(Clone, Debug)]
pub struct JvmLauncher {
    java: Utf8PathBuf,
    java_config: JavaConfig,
    junit_config: JunitConfig,
    workspace_root: Utf8PathBuf,
    parser: JunitXmlParser,
    coverage: Option<CoverageBuilder>,
    spawner: Arc<dyn ProcessSpawner>,
}

impl JvmLauncher {
    /// Creates a launcher from the configuration.
    ///
    /// If coverage is enabled, the JaCoCo jars must be on the coverage classpath.
    pub fn new(config: &JvmTestConfig) -> Result<Self, LaunchError> {
        let coverage = if config.coverage.enabled {
            Some(CoverageBuilder::from_config(
                &config.coverage,
                config.workspace_root(),
            )?)
        } else {
            None
        };
        Ok(Self {
            java: config.java_executable(),
            java_config: config.java.clone(),
            junit_config: config.junit.clone(),
            workspace_root: config.workspace_root().to_owned(),
            parser: JunitXmlParser::new(config.parser_options()),
            coverage,
            spawner: Arc::new(DuctSpawner::new()),
        })
    }

    /// Replaces the process spawner.
    pub fn with_spawner(mut self, spawner: impl ProcessSpawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Enables or disables coverage.
    pub fn set_coverage(&mut self, coverage: Option<CoverageBuilder>) -> &mut Self {
        self.coverage = coverage;
        self
    }

    /// Returns the coverage builder, if coverage is enabled.
    pub fn coverage(&self) -> Option<&CoverageBuilder> {
        self.coverage.as_ref()
    }

    /// Returns the parser used for JUnit reports.
    pub fn parser(&self) -> &JunitXmlParser {
        &self.parser
    }

    /// Returns the `java` executable.
    pub fn java(&self) -> &Utf8Path {
        &self.java
    }

    /// Runs a Java program to completion.
    pub fn launch(
        &self,
        launch: &ProgramLaunch,
        session: &SessionId,
        cancel: &CancellationFlag,
    ) -> Result<LaunchOutcome, LaunchError> {
        let classpath = Classpath::resolve(&launch.classpath, &self.workspace_root)?;
        let default_classpath = Classpath::resolve(&self.java_config.classpath, &self.workspace_root)?;
        let mut target_args = command::target_args(
            &launch.target,
            &classpath,
            &default_classpath,
            &self.workspace_root,
        )?;
        target_args.extend(launch.args.iter().cloned());

        let output_name = launch
            .output_name
            .as_deref()
            .unwrap_or_else(|| launch.target.short_name());
        self.run_jvm(
            JvmRun {
                output_dir: &launch.output_dir,
                output_name,
                session: (!launch.disable_coverage).then_some(session),
                jvm_args: &launch.jvm_args,
                system_properties: &launch.system_properties,
                target_args,
                env: &launch.env,
                cwd: launch.cwd.as_deref(),
                timeout: launch.timeout.unwrap_or(self.java_config.timeout),
                expected_exit_codes: &launch.expected_exit_codes,
            },
            cancel,
        )
    }

    /// Runs the JUnit console launcher for `descriptor`, then parses the reports it wrote.
    ///
    /// Test failures aren't errors: they show up in the parsed reports.
    pub fn run_junit(
        &self,
        descriptor: &JunitDescriptor,
        session: &SessionId,
        cancel: &CancellationFlag,
    ) -> Result<JunitRun, LaunchError> {
        let junit_classpath = Classpath::resolve(&self.junit_config.classpath, &self.workspace_root)?;
        let (launcher_jar, junit_libraries) = junit::split_launcher_jar(&junit_classpath)?;

        let mut test_classpath = Classpath::new();
        test_classpath.push(descriptor.classes_dir.clone());
        test_classpath.extend(&Classpath::resolve(
            &descriptor.classpath,
            &self.workspace_root,
        )?);
        test_classpath.extend(&Classpath::resolve(
            &self.java_config.classpath,
            &self.workspace_root,
        )?);
        test_classpath.extend(&junit_libraries);
        for (index, entry) in test_classpath.entries().iter().enumerate() {
            let missing = if entry.exists() { "" } else { " (does not exist)" };
            debug!("test classpath #{:<2}: {entry}{missing}", index + 1);
        }

        let reports_dir = descriptor
            .output_dir
            .join(format!("junit-reports.{session}"));
        std::fs::create_dir_all(&reports_dir).map_err(|err| LaunchError::CreateDir {
            path: reports_dir.clone(),
            err,
        })?;

        let mut target_args = vec!["-jar".to_owned(), launcher_jar.into_string()];
        target_args.extend(junit::junit_args(
            descriptor,
            &self.junit_config,
            &test_classpath,
            &reports_dir,
        )?);

        info!("running JUnit for {}: {}", descriptor.id, descriptor.display_selection());
        let launch = self.run_jvm(
            JvmRun {
                output_dir: &descriptor.output_dir,
                output_name: "junit",
                session: Some(session),
                jvm_args: &descriptor.jvm_args,
                system_properties: &descriptor.system_properties,
                target_args,
                env: &IndexMap::new(),
                cwd: None,
                timeout: descriptor.timeout.unwrap_or(self.junit_config.timeout),
                expected_exit_codes: JUNIT_EXPECTED_EXIT_CODES,
            },
            cancel,
        )?;

        let reports = self.parse_reports(&reports_dir)?;
        for (path, report) in &reports {
            match report {
                Ok(report) => debug!(
                    "{path}: {} outcomes, {} failed",
                    report.outcomes.len(),
                    report.outcomes_of_kind(OutcomeKind::Failed).count()
                ),
                Err(err) => warn!("{err}"),
            }
        }

        Ok(JunitRun {
            launch,
            reports_dir,
            reports,
        })
    }

    /// Runs a Java tool such as the JaCoCo CLI, without the coverage agent, expecting exit
    /// code 0. `args` start with `-jar` or a main class.
    pub fn run_java_tool(
        &self,
        name: &str,
        args: Vec<String>,
        output_dir: &Utf8Path,
        cancel: &CancellationFlag,
    ) -> Result<LaunchOutcome, LaunchError> {
        self.run_jvm(
            JvmRun {
                output_dir,
                output_name: name,
                session: None,
                jvm_args: &[],
                system_properties: &IndexMap::new(),
                target_args: args,
                env: &IndexMap::new(),
                cwd: None,
                timeout: self.java_config.timeout,
                expected_exit_codes: &[0],
            },
            cancel,
        )
    }

    // ---
    // Helper methods
    // ---

    fn run_jvm(&self, run: JvmRun<'_>, cancel: &CancellationFlag) -> Result<LaunchOutcome, LaunchError> {
        // Work out the agent argument first, so that configuration errors are reported before
        // anything is written.
        let coverage = match (&self.coverage, run.session) {
            (Some(builder), Some(session)) => {
                let agent_arg = builder.agent_jvm_arg(session)?;
                builder.create_dest_dir()?;
                Some((agent_arg, builder.snapshot_path(session)))
            }
            _ => None,
        };
        let (agent_arg, snapshot_path) = coverage.unzip();

        let output = OutputFiles::allocate(run.output_dir, run.output_name)?;
        let mut args = JvmArgs {
            java: &self.java_config,
            extra_jvm_args: run.jvm_args,
            system_properties: run.system_properties,
            output_dir: run.output_dir,
            agent_arg,
        }
        .build();
        args.extend(run.target_args);
        let args = command::apply_argfile(
            self.java.as_str(),
            args,
            self.java_config.argfile_threshold,
            &output.stdout.with_extension("args"),
        )?;

        let mut request = SpawnRequest::new(self.java.as_str(), &output);
        request.args = args;
        request.cwd = Some(run.cwd.unwrap_or(run.output_dir).to_owned());
        request.env = self.java_config.env.clone();
        for (key, value) in run.env {
            request.env.insert(key.clone(), value.clone());
        }
        request.timeout = Some(run.timeout);

        let process = self.spawner.run(&request, cancel)?;
        debug!(
            "{} exited with {:?} after {:.1}s",
            run.output_name,
            process.exit_code,
            process.elapsed.as_secs_f64()
        );
        if !process.exited_with(run.expected_exit_codes) {
            return Err(LaunchError::UnexpectedExit {
                program: run.output_name.to_owned(),
                exit_code: process.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        let coverage_snapshot = snapshot_path.map(|path| {
            let written = path.is_file();
            if !written {
                warn!(
                    "{} did not write coverage snapshot {path}; was the JVM killed?",
                    run.output_name
                );
            }
            CoverageSnapshot { path, written }
        });

        Ok(LaunchOutcome {
            output,
            process,
            coverage_snapshot,
        })
    }

    fn parse_reports(
        &self,
        reports_dir: &Utf8Path,
    ) -> Result<Vec<(Utf8PathBuf, Result<ParsedReport, ParseError>)>, LaunchError> {
        let read_error = |err: io::Error| LaunchError::ReadDir {
            path: reports_dir.to_owned(),
            err,
        };
        let mut paths = Vec::new();
        for entry in reports_dir.read_dir_utf8().map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            if entry.path().extension() == Some("xml") {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(self.parser.parse_files(paths))
    }
}

struct JvmRun<'a> {
    output_dir: &'a Utf8Path,
    output_name: &'a str,
    // Coverage is only collected for runs with a session.
    session: Option<&'a SessionId>,
    jvm_args: &'a [String],
    system_properties: &'a IndexMap<String, String>,
    target_args: Vec<String>,
    env: &'a IndexMap<String, String>,
    cwd: Option<&'a Utf8Path>,
    timeout: Duration,
    expected_exit_codes: &'a [i32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JvmLauncher>();
        assert_send_sync::<JunitXmlParser>();
    }
}
