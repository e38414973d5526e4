// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit run descriptors, and discovery of one descriptor per test class.

use crate::{config::JunitConfig, errors::DiscoveryError, helpers::is_vcs_dir};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use itertools::Itertools;
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

/// Describes one run of the JUnit console launcher.
#[derive(Clone, Debug)]
pub struct JunitDescriptor {
    /// The identifier of this run.
    pub id: String,

    /// The directory holding the compiled test classes.
    pub classes_dir: Utf8PathBuf,

    /// The directory output files and reports are written into.
    pub output_dir: Utf8PathBuf,

    /// Classpath entries added after the test classes.
    pub classpath: Vec<String>,

    /// Extra JVM arguments.
    pub jvm_args: Vec<String>,

    /// Extra system properties.
    pub system_properties: IndexMap<String, String>,

    /// Arguments selecting the tests to run, such as `--select-class myorg.MyTests`.
    ///
    /// If empty, every package in the classes directory is selected.
    pub selection_args: Vec<String>,

    /// Configuration parameters, passed as `--config`.
    pub config_params: Vec<String>,

    /// Only run tests with these tags.
    pub include_tags: Vec<String>,

    /// Arguments appended to the JUnit command line.
    pub extra_args: Vec<String>,

    /// How long the run may take, overriding the configured timeout.
    pub timeout: Option<Duration>,
}

impl JunitDescriptor {
    /// Creates a descriptor that runs every test in `classes_dir`.
    pub fn new(
        id: impl Into<String>,
        classes_dir: impl Into<Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            classes_dir: classes_dir.into(),
            output_dir: output_dir.into(),
            classpath: Vec::new(),
            jvm_args: Vec::new(),
            system_properties: IndexMap::new(),
            selection_args: Vec::new(),
            config_params: Vec::new(),
            include_tags: Vec::new(),
            extra_args: Vec::new(),
            timeout: None,
        }
    }

    /// Returns a short description of what this descriptor selects, for display.
    pub fn display_selection(&self) -> String {
        if self.selection_args.is_empty() {
            "all tests".to_owned()
        } else {
            self.selection_args
                .iter()
                .filter(|arg| !matches!(arg.as_str(), "-p" | "-c" | "--select-class"))
                .join(" ")
        }
    }
}

/// A test class found under a source directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveredClass {
    /// The test identifier: the class name with configured prefixes removed.
    pub id: String,

    /// The fully-qualified class name.
    pub class_name: String,

    /// The `.java` file the class was found in.
    pub source_file: Utf8PathBuf,
}

impl DiscoveredClass {
    /// Returns a descriptor that runs just this class, writing into a subdirectory of
    /// `output_root` named after the class.
    pub fn to_descriptor(&self, classes_dir: &Utf8Path, output_root: &Utf8Path) -> JunitDescriptor {
        let mut descriptor =
            JunitDescriptor::new(&self.id, classes_dir, output_root.join(&self.class_name));
        descriptor.selection_args = vec!["--select-class".to_owned(), self.class_name.clone()];
        descriptor
    }
}

/// Finds the test classes under `source_dir`, one per `.java` file whose class name matches the
/// configured regex.
///
/// Classes are returned sorted by name. Finding none is an error, since it usually means the
/// source directory or the regex is wrong.
pub fn discover_test_classes(
    source_dir: &Utf8Path,
    junit: &JunitConfig,
) -> Result<Vec<DiscoveredClass>, DiscoveryError> {
    let read_error = |err| DiscoveryError::ReadDir {
        path: source_dir.to_owned(),
        err,
    };

    let mut classes = Vec::new();
    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(is_vcs_dir))
        });
    for entry in walker {
        let entry = entry.map_err(read_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            continue;
        };
        if path.extension() != Some("java") {
            continue;
        }
        let Ok(rel_path) = path.strip_prefix(source_dir) else {
            continue;
        };
        let class_name = rel_path
            .with_extension("")
            .components()
            .map(|component| component.as_str())
            .join(".");

        if !junit.test_class_regex.is_match(&class_name) {
            debug!("ignoring {class_name}, which doesn't look like a test class");
            continue;
        }

        classes.push(DiscoveredClass {
            id: strip_id_prefix(&class_name, &junit.strip_id_prefixes),
            class_name,
            source_file: path.to_owned(),
        });
    }

    if classes.is_empty() {
        return Err(DiscoveryError::NoTestClasses {
            path: source_dir.to_owned(),
            regex: junit.test_class_regex.as_str().to_owned(),
        });
    }
    classes.sort_by(|a, b| a.class_name.cmp(&b.class_name));
    Ok(classes)
}

/// Removes the first matching package prefix from a class name.
fn strip_id_prefix(class_name: &str, prefixes: &[String]) -> String {
    for prefix in prefixes {
        let prefix = prefix.trim_end_matches('.');
        match class_name.strip_prefix(prefix) {
            // Only whole package components are stripped.
            Some(rest) if rest.starts_with('.') => return rest[1..].to_owned(),
            _ => {}
        }
    }
    class_name.to_owned()
}
