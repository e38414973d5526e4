// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arguments for the JUnit 5 console launcher.

use crate::{
    classpath::Classpath, config::JunitConfig, descriptor::JunitDescriptor, errors::LaunchError,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// The jar holding the console launcher is found by this part of its name.
pub const CONSOLE_LAUNCHER_JAR_NAME: &str = "junit-platform-console-standalone";

/// Exit codes of the console launcher that mean the tests ran. 1 means some of them failed.
pub const JUNIT_EXPECTED_EXIT_CODES: &[i32] = &[0, 1];

/// Splits the JUnit classpath into the console launcher jar and everything else.
pub(crate) fn split_launcher_jar(
    junit_classpath: &Classpath,
) -> Result<(Utf8PathBuf, Classpath), LaunchError> {
    let launcher = junit_classpath
        .find_containing(CONSOLE_LAUNCHER_JAR_NAME)
        .ok_or_else(|| LaunchError::LauncherJarNotFound {
            classpath: junit_classpath.entries().to_vec(),
        })?
        .to_owned();
    let mut rest = Classpath::new();
    for entry in junit_classpath.entries() {
        if *entry != launcher {
            rest.push(entry.clone());
        }
    }
    Ok((launcher, rest))
}

/// Builds the console launcher's arguments.
///
/// `test_classpath` is the classpath the tests run with, and `reports_dir` is where the XML
/// reports are written.
pub(crate) fn junit_args(
    descriptor: &JunitDescriptor,
    junit: &JunitConfig,
    test_classpath: &Classpath,
    reports_dir: &Utf8Path,
) -> Result<Vec<String>, LaunchError> {
    let mut args = vec![
        format!("--reports-dir={reports_dir}"),
        "--disable-ansi-colors".to_owned(),
        format!("--classpath={}", test_classpath.to_arg()),
        "--config=junit.platform.output.capture.stdout=true".to_owned(),
        "--config=junit.platform.output.capture.stderr=true".to_owned(),
    ];
    args.extend(
        junit
            .config_params
            .iter()
            .chain(&descriptor.config_params)
            .map(|param| format!("--config={param}")),
    );

    if descriptor.selection_args.is_empty() {
        args.extend(default_selection_args(&descriptor.classes_dir)?);
    } else {
        args.extend(descriptor.selection_args.iter().cloned());
    }

    args.extend(
        junit
            .include_tags
            .iter()
            .chain(&descriptor.include_tags)
            .map(|tag| format!("--include-tag={tag}")),
    );
    args.extend(junit.extra_args.iter().cloned());
    args.extend(descriptor.extra_args.iter().cloned());
    Ok(args)
}

/// Selects every top-level package in the classes directory, which is faster than scanning the
/// whole classpath. Classes in the default package can only be found by a scan.
fn default_selection_args(classes_dir: &Utf8Path) -> Result<Vec<String>, LaunchError> {
    let read_error = |err| LaunchError::ReadDir {
        path: classes_dir.to_owned(),
        err,
    };
    let mut packages = Vec::new();
    let mut has_root_classes = false;
    let entries = match classes_dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(vec!["--scan-classpath".to_owned()]);
        }
        Err(err) => return Err(read_error(err)),
    };
    for entry in entries {
        let entry = entry.map_err(read_error)?;
        let file_type = entry.file_type().map_err(read_error)?;
        if file_type.is_dir() {
            packages.push(entry.file_name().to_owned());
        } else if entry.path().extension() == Some("class") {
            has_root_classes = true;
        }
    }

    if packages.is_empty() || has_root_classes {
        return Ok(vec!["--scan-classpath".to_owned()]);
    }
    packages.sort();
    Ok(packages
        .into_iter()
        .flat_map(|package| ["-p".to_owned(), package])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JvmTestConfig;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn launcher_jar_is_split_out() {
        let junit = Classpath::resolve(
            [
                "/lib/junit-platform-console-standalone-1.10.0.jar",
                "/lib/hamcrest.jar",
            ],
            Utf8Path::new("/"),
        )
        .unwrap();
        let (launcher, rest) = split_launcher_jar(&junit).unwrap();
        assert_eq!(launcher.file_name(), Some("junit-platform-console-standalone-1.10.0.jar"));
        assert_eq!(rest.entries().len(), 1);

        let err = split_launcher_jar(&rest).unwrap_err();
        assert!(err.is_configuration(), "{err:?}");
    }

    #[test]
    fn default_selection() {
        let dir = Utf8TempDir::new().unwrap();
        let classes = dir.path().join("classes");
        assert_eq!(default_selection_args(&classes).unwrap(), ["--scan-classpath"]);

        std::fs::create_dir_all(classes.join("myorg2")).unwrap();
        std::fs::create_dir_all(classes.join("myorg")).unwrap();
        assert_eq!(
            default_selection_args(&classes).unwrap(),
            ["-p", "myorg", "-p", "myorg2"]
        );

        std::fs::write(classes.join("RootTests.class"), b"").unwrap();
        assert_eq!(default_selection_args(&classes).unwrap(), ["--scan-classpath"]);
    }

    #[test]
    fn argument_order() {
        let dir = Utf8TempDir::new().unwrap();
        let mut config = JvmTestConfig::default_config(dir.path()).unwrap();
        config.junit.config_params = vec!["junit.jupiter.execution.parallel.enabled=true".to_owned()];
        config.junit.include_tags = vec!["fast".to_owned()];
        config.junit.extra_args = vec!["--details=none".to_owned()];

        let mut descriptor = JunitDescriptor::new("MyTests", dir.path().join("classes"), dir.path());
        descriptor.selection_args = vec!["--select-class".to_owned(), "myorg.MyTests".to_owned()];
        descriptor.include_tags = vec!["smoke".to_owned()];
        descriptor.extra_args = vec!["--fail-if-no-tests".to_owned()];

        let classpath = Classpath::resolve(["/classes"], Utf8Path::new("/")).unwrap();
        let reports_dir = dir.path().join("reports");
        let args = junit_args(&descriptor, &config.junit, &classpath, &reports_dir).unwrap();
        assert_eq!(
            args,
            [
                format!("--reports-dir={reports_dir}"),
                "--disable-ansi-colors".to_owned(),
                format!("--classpath={}", classpath.to_arg()),
                "--config=junit.platform.output.capture.stdout=true".to_owned(),
                "--config=junit.platform.output.capture.stderr=true".to_owned(),
                "--config=junit.jupiter.execution.parallel.enabled=true".to_owned(),
                "--select-class".to_owned(),
                "myorg.MyTests".to_owned(),
                "--include-tag=fast".to_owned(),
                "--include-tag=smoke".to_owned(),
                "--details=none".to_owned(),
                "--fail-if-no-tests".to_owned(),
            ]
        );
    }
}
