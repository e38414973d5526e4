// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for jvmtest.
//!
//! The configuration is layered: the defaults embedded in this crate come first, and a repository
//! configuration file (by default `.config/jvmtest.toml`) is merged on top of them.

use crate::errors::{ConfigReadError, ConfigReadErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use indexmap::IndexMap;
use junit_outcomes::ParserOptions;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Overall configuration for jvmtest.
#[derive(Clone, Debug)]
pub struct JvmTestConfig {
    workspace_root: Utf8PathBuf,

    /// Settings for every JVM launch.
    pub java: JavaConfig,

    /// Settings for JUnit runs.
    pub junit: JunitConfig,

    /// How JUnit XML reports are read.
    pub report: ReportConfig,

    /// Code coverage.
    pub coverage: CoverageConfig,

    /// Compilation of Java sources.
    pub compile: CompileConfig,
}

impl JvmTestConfig {
    /// The location of the repository config, relative to the workspace root.
    pub const CONFIG_PATH: &'static str = ".config/jvmtest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/jvmtest.toml` in
    /// the workspace root.
    ///
    /// If the file isn't specified and the workspace root doesn't have `.config/jvmtest.toml`,
    /// the default config is used.
    pub fn from_sources(
        config_file: Option<&Utf8Path>,
        workspace_root: impl Into<Utf8PathBuf>,
    ) -> Result<Self, ConfigReadError> {
        let workspace_root = workspace_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = workspace_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigReadError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            let keys: Vec<_> = unknown.into_iter().collect();
            warn!(
                "ignoring unknown configuration keys in {config_file}: {}",
                keys.join(", ")
            );
        }

        Ok(deserialized.into_config(workspace_root))
    }

    /// Returns the default config.
    pub fn default_config(workspace_root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigReadError> {
        let (deserialized, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .map_err(|kind| ConfigReadError::new("<default config>", kind))?;
        Ok(deserialized.into_config(workspace_root.into()))
    }

    /// Returns the workspace root that relative paths are resolved against.
    pub fn workspace_root(&self) -> &Utf8Path {
        &self.workspace_root
    }

    /// Returns the parser options described by the `[report]` section.
    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            separator: self.report.separator.clone(),
            id_prefix: self.report.id_prefix.clone(),
            timestamp_local_time: self.report.timestamp_local_time,
            exclude_details: self.report.exclude_details.clone(),
            max_detail_lines: self.report.max_detail_lines,
            full_details: self.report.full_details,
        }
    }

    /// Returns the `java` executable to use.
    pub fn java_executable(&self) -> Utf8PathBuf {
        self.jdk_tool("java")
    }

    /// Returns the `javac` executable to use.
    pub fn javac_executable(&self) -> Utf8PathBuf {
        self.jdk_tool("javac")
    }

    fn jdk_tool(&self, name: &str) -> Utf8PathBuf {
        let java_home = self.java.java_home.clone().or_else(|| {
            std::env::var("JAVA_HOME")
                .ok()
                .filter(|home| !home.is_empty())
                .map(Utf8PathBuf::from)
        });
        match java_home {
            Some(home) => {
                cfg_if::cfg_if! {
                    if #[cfg(windows)] {
                        home.join("bin").join(format!("{name}.exe"))
                    } else {
                        home.join("bin").join(name)
                    }
                }
            }
            // Looked up on PATH.
            None => Utf8PathBuf::from(name),
        }
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ConfigDeserialize, BTreeSet<String>), ConfigReadErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigReadErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ConfigDeserialize =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigReadErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigDeserialize {
    java: JavaConfig,
    junit: JunitConfig,
    report: ReportConfig,
    coverage: CoverageConfig,
    compile: CompileConfig,
}

impl ConfigDeserialize {
    fn into_config(self, workspace_root: Utf8PathBuf) -> JvmTestConfig {
        JvmTestConfig {
            workspace_root,
            java: self.java,
            junit: self.junit,
            report: self.report,
            coverage: self.coverage,
            compile: self.compile,
        }
    }
}

/// Settings for every JVM launch.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct JavaConfig {
    /// The JDK to use.
    #[serde(default)]
    pub java_home: Option<Utf8PathBuf>,

    /// Arguments passed to every JVM before anything else.
    pub jvm_args: Vec<String>,

    /// Whether to write a heap dump into the output directory on `OutOfMemoryError`.
    pub heap_dump_on_oom: bool,

    /// Classpath entries for program launches.
    pub classpath: Vec<String>,

    /// Command lines longer than this are passed in an argument file.
    pub argfile_threshold: usize,

    /// How long a program launch may run.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// System properties, passed as `-Dkey=value`.
    #[serde(default)]
    pub system_properties: IndexMap<String, String>,

    /// Environment variables for every JVM.
    #[serde(default)]
    pub env: IndexMap<String, String>,
}

/// Settings for JUnit runs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct JunitConfig {
    /// The classpath holding the console launcher and test libraries.
    pub classpath: Vec<String>,

    /// Configuration parameters, passed as `--config key=value`.
    pub config_params: Vec<String>,

    /// Arguments appended to the command line.
    pub extra_args: Vec<String>,

    /// Only run tests with these tags.
    pub include_tags: Vec<String>,

    /// How long a JUnit run may take.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Classes whose fully-qualified name matches this are test classes.
    #[serde(deserialize_with = "deserialize_regex")]
    pub test_class_regex: Regex,

    /// Prefixes removed from class names to form test IDs.
    pub strip_id_prefixes: Vec<String>,
}

/// How JUnit XML reports are read.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ReportConfig {
    /// The separator between qualifier and name.
    pub separator: String,

    /// A prefix removed from test identifiers.
    #[serde(default, deserialize_with = "deserialize_optional_regex")]
    pub id_prefix: Option<Regex>,

    /// Whether zoneless timestamps are local time.
    #[serde(default)]
    pub timestamp_local_time: Option<bool>,

    /// Detail lines matching this are hidden.
    #[serde(default, deserialize_with = "deserialize_optional_regex")]
    pub exclude_details: Option<Regex>,

    /// The maximum number of detail lines.
    pub max_detail_lines: usize,

    /// Keep every detail line.
    pub full_details: bool,
}

/// Code coverage settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct CoverageConfig {
    /// Whether JVMs are run with the coverage agent.
    pub enabled: bool,

    /// The classpath holding `jacocoagent.jar` and `jacococli.jar`.
    pub classpath: Vec<String>,

    /// The directory each JVM writes its snapshot into.
    pub dest_dir: Utf8PathBuf,

    /// The directory the merged report is written into.
    pub report_dir: Utf8PathBuf,

    /// The `.tar.zst` file the report is archived into, if any.
    #[serde(default)]
    pub archive: Option<Utf8PathBuf>,

    /// Whether to remove the report directory after archiving it.
    pub remove_report_dir_after_archive: bool,

    /// Directories of compiled classes, for the report.
    pub class_dirs: Vec<Utf8PathBuf>,

    /// Directories of source files, for the report.
    pub source_dirs: Vec<Utf8PathBuf>,

    /// The encoding of the source files.
    #[serde(default)]
    pub source_encoding: Option<String>,

    /// Extra arguments for the merge step.
    pub merge_args: Vec<String>,

    /// Extra arguments for the report step.
    pub report_args: Vec<String>,

    /// The report formats to produce.
    pub report_formats: Vec<ReportFormat>,

    /// The title of the report.
    pub report_title: String,

    /// Extra agent options.
    #[serde(default)]
    pub agent_options: IndexMap<String, String>,
}

/// A coverage report format.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// An HTML site.
    Html,
    /// A single XML file.
    Xml,
    /// A single CSV file.
    Csv,
}

/// Compilation settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct CompileConfig {
    /// Arguments passed to `javac` before the source files.
    pub javac_args: Vec<String>,

    /// Classpath entries for compilation.
    pub classpath: Vec<String>,
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = String::deserialize(deserializer)?;
    Regex::new(&pattern).map_err(serde::de::Error::custom)
}

// An empty string disables the pattern, so that a default can be turned off.
fn deserialize_optional_regex<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = Option::<String>::deserialize(deserializer)?;
    match pattern {
        Some(pattern) if !pattern.is_empty() => Regex::new(&pattern)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
