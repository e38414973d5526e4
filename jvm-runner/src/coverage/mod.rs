// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code coverage with JaCoCo.
//!
//! Coverage happens in two phases. Before each JVM is launched, [`CoverageBuilder::agent_jvm_arg`]
//! produces a `-javaagent` argument that makes the JVM write a snapshot into the destination
//! directory when it exits. Once every JVM has finished, [`CoverageBuilder::report_plan`] turns the
//! snapshots into the JaCoCo CLI invocations that merge them and write a report, and
//! [`CoverageBuilder::finalize`] runs those invocations.
//!
//! The builder itself doesn't perform any process I/O, so it can be shared freely between threads
//! launching JVMs concurrently.

mod agent;
mod archive;
mod finalize;
mod report;

pub use agent::{AgentArg, parse_agent_jvm_arg};
pub use archive::archive_report_dir;
pub use finalize::CoverageSummary;
pub use report::{
    ArchiveStep, CSV_REPORT_FILE_NAME, MERGED_FILE_NAME, ReportPlan, XML_REPORT_FILE_NAME,
};

use crate::{
    classpath::Classpath,
    config::{CoverageConfig, ReportFormat},
    errors::CoverageError,
    helpers::resolve_path,
    session::SessionId,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::io;
use tracing::debug;

/// The extension of per-process coverage snapshots.
pub const SNAPSHOT_EXTENSION: &str = "javacoverage";

const AGENT_JAR_PREFIX: &str = "jacocoagent";
const CLI_JAR_PREFIX: &str = "jacococli";

/// Builds the arguments needed to collect and report code coverage.
#[derive(Clone, Debug)]
pub struct CoverageBuilder {
    agent_jar: Utf8PathBuf,
    cli_jar: Utf8PathBuf,
    dest_dir: Utf8PathBuf,
    report_dir: Utf8PathBuf,
    archive: Option<Utf8PathBuf>,
    remove_report_dir_after_archive: bool,
    class_dirs: Vec<Utf8PathBuf>,
    source_dirs: Vec<Utf8PathBuf>,
    source_encoding: Option<String>,
    merge_args: Vec<String>,
    report_args: Vec<String>,
    report_formats: Vec<ReportFormat>,
    report_title: String,
    agent_options: IndexMap<String, String>,
}

impl CoverageBuilder {
    /// Creates a builder that writes every report format and doesn't archive.
    pub fn new(
        agent_jar: impl Into<Utf8PathBuf>,
        cli_jar: impl Into<Utf8PathBuf>,
        dest_dir: impl Into<Utf8PathBuf>,
        report_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            agent_jar: agent_jar.into(),
            cli_jar: cli_jar.into(),
            dest_dir: dest_dir.into(),
            report_dir: report_dir.into(),
            archive: None,
            remove_report_dir_after_archive: false,
            class_dirs: Vec::new(),
            source_dirs: Vec::new(),
            source_encoding: None,
            merge_args: Vec::new(),
            report_args: Vec::new(),
            report_formats: vec![ReportFormat::Html, ReportFormat::Xml, ReportFormat::Csv],
            report_title: "Java coverage".to_owned(),
            agent_options: IndexMap::new(),
        }
    }

    /// Creates a builder from the `[coverage]` section of the configuration.
    ///
    /// Relative paths are resolved against `workspace_root`. The JaCoCo jars are looked up on the
    /// configured coverage classpath.
    pub fn from_config(
        config: &CoverageConfig,
        workspace_root: &Utf8Path,
    ) -> Result<Self, CoverageError> {
        let classpath = Classpath::resolve(&config.classpath, workspace_root)?;
        let find = |jar_prefix: &'static str| {
            classpath
                .find_jar(jar_prefix)
                .map(Utf8Path::to_owned)
                .ok_or_else(|| CoverageError::JarNotFound {
                    jar_prefix,
                    classpath: classpath.entries().to_vec(),
                })
        };
        let agent_jar = find(AGENT_JAR_PREFIX)?;
        let cli_jar = find(CLI_JAR_PREFIX)?;

        let resolve = |path: &Utf8PathBuf| resolve_path(workspace_root, path);
        let mut builder = Self::new(
            agent_jar,
            cli_jar,
            resolve(&config.dest_dir),
            resolve(&config.report_dir),
        );
        builder
            .set_archive(config.archive.as_ref().map(resolve))
            .set_remove_report_dir_after_archive(config.remove_report_dir_after_archive)
            .set_class_dirs(config.class_dirs.iter().map(resolve))
            .set_source_dirs(config.source_dirs.iter().map(resolve))
            .set_source_encoding(config.source_encoding.clone())
            .set_merge_args(config.merge_args.iter().cloned())
            .set_report_args(config.report_args.iter().cloned())
            .set_report_formats(config.report_formats.iter().copied())
            .set_report_title(config.report_title.clone());
        for (key, value) in &config.agent_options {
            builder.add_agent_option(key, value);
        }
        Ok(builder)
    }

    /// Sets the `.tar.zst` archive that the report directory is written into.
    pub fn set_archive(&mut self, archive: Option<Utf8PathBuf>) -> &mut Self {
        self.archive = archive;
        self
    }

    /// Sets whether the report directory is removed once it has been archived.
    pub fn set_remove_report_dir_after_archive(&mut self, remove: bool) -> &mut Self {
        self.remove_report_dir_after_archive = remove;
        self
    }

    /// Sets the directories of compiled classes to report on.
    pub fn set_class_dirs(&mut self, dirs: impl IntoIterator<Item = Utf8PathBuf>) -> &mut Self {
        self.class_dirs = dirs.into_iter().collect();
        self
    }

    /// Sets the source directories used to annotate the report.
    pub fn set_source_dirs(&mut self, dirs: impl IntoIterator<Item = Utf8PathBuf>) -> &mut Self {
        self.source_dirs = dirs.into_iter().collect();
        self
    }

    /// Sets the encoding of the source files.
    pub fn set_source_encoding(&mut self, encoding: Option<String>) -> &mut Self {
        self.source_encoding = encoding;
        self
    }

    /// Sets extra arguments for the merge step.
    pub fn set_merge_args(&mut self, args: impl IntoIterator<Item = String>) -> &mut Self {
        self.merge_args = args.into_iter().collect();
        self
    }

    /// Sets extra arguments for the report step.
    pub fn set_report_args(&mut self, args: impl IntoIterator<Item = String>) -> &mut Self {
        self.report_args = args.into_iter().collect();
        self
    }

    /// Sets the report formats to produce.
    pub fn set_report_formats(
        &mut self,
        formats: impl IntoIterator<Item = ReportFormat>,
    ) -> &mut Self {
        self.report_formats = formats.into_iter().collect();
        self
    }

    /// Sets the title shown in the report.
    pub fn set_report_title(&mut self, title: impl Into<String>) -> &mut Self {
        self.report_title = title.into();
        self
    }

    /// Adds an option passed through to the agent, such as `includes`.
    ///
    /// `destfile` and `sessionid` are always set by the builder, so those keys are ignored here.
    pub fn add_agent_option(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        if matches!(key.as_str(), "destfile" | "sessionid") {
            debug!("ignoring coverage agent option `{key}`, which is set per session");
        } else {
            self.agent_options.insert(key, value.into());
        }
        self
    }

    /// Returns the agent jar.
    pub fn agent_jar(&self) -> &Utf8Path {
        &self.agent_jar
    }

    /// Returns the JaCoCo CLI jar.
    pub fn cli_jar(&self) -> &Utf8Path {
        &self.cli_jar
    }

    /// Returns the directory snapshots are written into.
    pub fn dest_dir(&self) -> &Utf8Path {
        &self.dest_dir
    }

    /// Returns the directory the report is written into.
    pub fn report_dir(&self) -> &Utf8Path {
        &self.report_dir
    }

    /// Returns the snapshot file the JVM for `session` writes.
    pub fn snapshot_path(&self, session: &SessionId) -> Utf8PathBuf {
        self.dest_dir
            .join(format!("{session}.{SNAPSHOT_EXTENSION}"))
    }

    /// Returns the `-javaagent` argument for the JVM running as `session`.
    pub fn agent_jvm_arg(&self, session: &SessionId) -> Result<String, CoverageError> {
        let dest_file = self.snapshot_path(session);
        let session_id = session.to_string();
        let options = [
            ("destfile", dest_file.as_str()),
            ("sessionid", session_id.as_str()),
        ]
        .into_iter()
        .chain(
            self.agent_options
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        agent::format_agent_arg(&self.agent_jar, options)
    }

    /// Creates the destination directory, so that JVMs can write snapshots into it.
    pub fn create_dest_dir(&self) -> Result<(), CoverageError> {
        std::fs::create_dir_all(&self.dest_dir).map_err(|err| CoverageError::DestDir {
            path: self.dest_dir.clone(),
            err,
        })
    }

    /// Returns every snapshot in the destination directory, sorted by path.
    ///
    /// A destination directory that doesn't exist has no snapshots.
    pub fn discover_snapshots(&self) -> Result<Vec<Utf8PathBuf>, CoverageError> {
        let map_err = |err| CoverageError::DestDir {
            path: self.dest_dir.clone(),
            err,
        };
        let entries = match self.dest_dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(map_err(err)),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(map_err)?;
            let is_file = entry.file_type().map_err(map_err)?.is_file();
            if is_file && entry.path().extension() == Some(SNAPSHOT_EXTENSION) {
                snapshots.push(entry.into_path());
            }
        }
        snapshots.sort();
        Ok(snapshots)
    }

    /// Returns the steps that turn `snapshots` into a report, or `None` if there are no snapshots.
    ///
    /// Class and source directories that don't exist are left out with a warning.
    pub fn report_plan(&self, snapshots: &[Utf8PathBuf]) -> Option<ReportPlan> {
        report::build_plan(self, snapshots)
    }
}
