// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of JVM command lines.

use crate::{
    classpath::{Classpath, expand_pattern},
    config::JavaConfig,
    errors::{ClasspathError, LaunchError},
    helpers::resolve_path,
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use swrite::{SWrite, swriteln};
use tracing::debug;

/// What a JVM launch runs.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LaunchTarget {
    /// A fully-qualified main class, run with a classpath.
    MainClass(String),

    /// A `.jar` file, or a glob pattern that matches exactly one. Jars carry their own classpath
    /// in their manifest.
    Jar(String),
}

impl LaunchTarget {
    /// Returns a `Jar` target if `target` ends with `.jar`, and a `MainClass` target otherwise.
    pub fn parse(target: impl Into<String>) -> Self {
        let target = target.into();
        if target.ends_with(".jar") {
            LaunchTarget::Jar(target)
        } else {
            LaunchTarget::MainClass(target)
        }
    }

    /// Returns a short name for the target, used to name output files.
    pub fn short_name(&self) -> &str {
        match self {
            LaunchTarget::MainClass(class) => class.rsplit('.').next().unwrap_or(class),
            LaunchTarget::Jar(jar) => {
                let file_name = jar.rsplit(['/', '\\']).next().unwrap_or(jar);
                file_name.strip_suffix(".jar").unwrap_or(file_name)
            }
        }
    }
}

/// The JVM arguments that come before the launch target.
pub(crate) struct JvmArgs<'a> {
    pub(crate) java: &'a JavaConfig,
    pub(crate) extra_jvm_args: &'a [String],
    pub(crate) system_properties: &'a IndexMap<String, String>,
    pub(crate) output_dir: &'a Utf8Path,
    pub(crate) agent_arg: Option<String>,
}

impl JvmArgs<'_> {
    pub(crate) fn build(self) -> Vec<String> {
        let mut args: Vec<String> = self.java.jvm_args.clone();
        args.extend(self.extra_jvm_args.iter().cloned());
        if self.java.heap_dump_on_oom {
            args.push("-XX:+HeapDumpOnOutOfMemoryError".to_owned());
            args.push(format!("-XX:HeapDumpPath={}", self.output_dir));
        }

        // Properties set for the launch override configured ones with the same key.
        let mut properties = self.java.system_properties.clone();
        for (key, value) in self.system_properties {
            properties.insert(key.clone(), value.clone());
        }
        args.extend(
            properties
                .iter()
                .map(|(key, value)| format!("-D{key}={value}")),
        );

        args.extend(self.agent_arg);
        args
    }
}

/// Returns the arguments selecting what the JVM runs.
///
/// `classpath` is the classpath explicitly requested for this launch, and is an error for a jar.
/// `default_classpath` is used for main classes when no classpath was requested.
pub(crate) fn target_args(
    target: &LaunchTarget,
    classpath: &Classpath,
    default_classpath: &Classpath,
    base_dir: &Utf8Path,
) -> Result<Vec<String>, LaunchError> {
    match target {
        LaunchTarget::MainClass(class) => {
            let classpath = if classpath.is_empty() {
                default_classpath
            } else {
                classpath
            };
            let mut args = Vec::new();
            if !classpath.is_empty() {
                args.push("-classpath".to_owned());
                args.push(classpath.to_arg());
            }
            args.push(class.clone());
            Ok(args)
        }
        LaunchTarget::Jar(pattern) => {
            let jar = resolve_jar(pattern, base_dir)?;
            if !classpath.is_empty() {
                return Err(LaunchError::ClasspathWithJar { jar });
            }
            Ok(vec!["-jar".to_owned(), jar.into_string()])
        }
    }
}

fn resolve_jar(pattern: &str, base_dir: &Utf8Path) -> Result<Utf8PathBuf, LaunchError> {
    if !pattern.contains('*') {
        return Ok(resolve_path(base_dir, Utf8Path::new(pattern)));
    }
    let mut matches = match expand_pattern(pattern, base_dir) {
        Ok(matches) => matches,
        Err(ClasspathError::NoMatches { .. }) => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    if matches.len() != 1 {
        return Err(LaunchError::JarPattern {
            pattern: pattern.to_owned(),
            matches,
        });
    }
    Ok(matches.remove(0))
}

/// If the command line is longer than `threshold` characters, moves the arguments into an argument
/// file at `argfile` and returns a single `@argfile` argument in their place.
pub(crate) fn apply_argfile(
    program: &str,
    args: Vec<String>,
    threshold: usize,
    argfile: &Utf8Path,
) -> Result<Vec<String>, LaunchError> {
    let length = program.len() + args.iter().map(|arg| arg.len() + 1).sum::<usize>();
    if length <= threshold {
        return Ok(args);
    }

    let mut contents = String::new();
    for arg in &args {
        swriteln!(contents, "\"{}\"", escape_argfile_arg(arg));
    }
    std::fs::write(argfile, contents).map_err(|err| LaunchError::Argfile {
        path: argfile.to_owned(),
        err,
    })?;
    debug!("command line is {length} characters long, using argument file {argfile}");
    Ok(vec![format!("@{argfile}")])
}

fn escape_argfile_arg(arg: &str) -> String {
    let mut escaped = String::with_capacity(arg.len());
    for c in arg.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JvmTestConfig;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("myorg.myserver.MyServer", "MyServer" ; "main class")]
    #[test_case("target/my-server.jar", "my-server" ; "jar")]
    #[test_case("target/my-server-*.jar", "my-server-*" ; "jar pattern")]
    fn short_names(target: &str, expected: &str) {
        assert_eq!(LaunchTarget::parse(target).short_name(), expected);
    }

    #[test]
    fn jvm_args_order() {
        let mut config = JvmTestConfig::default_config("/workspace").unwrap();
        config
            .java
            .system_properties
            .insert("a".to_owned(), "config".to_owned());
        config
            .java
            .system_properties
            .insert("b".to_owned(), "config".to_owned());
        let mut props = IndexMap::new();
        props.insert("a".to_owned(), "launch".to_owned());

        let args = JvmArgs {
            java: &config.java,
            extra_jvm_args: &["-Xss4m".to_owned()],
            system_properties: &props,
            output_dir: Utf8Path::new("/out"),
            agent_arg: Some("-javaagent:agent.jar".to_owned()),
        }
        .build();
        assert_eq!(
            args,
            [
                "-Xmx512m",
                "-XX:-UsePerfData",
                "-Xss4m",
                "-XX:+HeapDumpOnOutOfMemoryError",
                "-XX:HeapDumpPath=/out",
                "-Da=launch",
                "-Db=config",
                "-javaagent:agent.jar",
            ]
        );
    }

    #[test]
    fn main_class_uses_default_classpath() {
        let default = Classpath::resolve(["lib/a.jar"], Utf8Path::new("/w")).unwrap();
        let args = target_args(
            &LaunchTarget::parse("myorg.Main"),
            &Classpath::new(),
            &default,
            Utf8Path::new("/w"),
        )
        .unwrap();
        assert_eq!(args, ["-classpath", default.to_arg().as_str(), "myorg.Main"]);

        let explicit = Classpath::resolve(["classes"], Utf8Path::new("/w")).unwrap();
        let args = target_args(
            &LaunchTarget::parse("myorg.Main"),
            &explicit,
            &default,
            Utf8Path::new("/w"),
        )
        .unwrap();
        assert_eq!(args[1], explicit.to_arg());
    }

    #[test]
    fn jar_patterns() {
        let dir = Utf8TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/server-1.0.jar"), b"").unwrap();

        let args = target_args(
            &LaunchTarget::parse("target/server-*.jar"),
            &Classpath::new(),
            &Classpath::new(),
            dir.path(),
        )
        .unwrap();
        assert_eq!(
            args,
            ["-jar", dir.path().join("target/server-1.0.jar").as_str()]
        );

        std::fs::write(dir.path().join("target/server-2.0.jar"), b"").unwrap();
        let err = target_args(
            &LaunchTarget::parse("target/server-*.jar"),
            &Classpath::new(),
            &Classpath::new(),
            dir.path(),
        )
        .unwrap_err();
        match err {
            LaunchError::JarPattern { matches, .. } => assert_eq!(matches.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = target_args(
            &LaunchTarget::parse("missing/*.jar"),
            &Classpath::new(),
            &Classpath::new(),
            dir.path(),
        )
        .unwrap_err();
        assert!(err.is_configuration(), "{err:?}");

        let classpath = Classpath::resolve(["classes"], dir.path()).unwrap();
        let err = target_args(
            &LaunchTarget::parse("target/server-1.0.jar"),
            &classpath,
            &Classpath::new(),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, LaunchError::ClasspathWithJar { .. }), "{err:?}");
    }

    #[test]
    fn argfile_above_threshold() {
        let dir = Utf8TempDir::new().unwrap();
        let argfile = dir.path().join("java.args");
        let args = vec![
            "-classpath".to_owned(),
            r"C:\lib\a.jar;C:\lib\b.jar".to_owned(),
            "say \"hi\"".to_owned(),
        ];

        let unchanged = apply_argfile("java", args.clone(), 3000, &argfile).unwrap();
        assert_eq!(unchanged, args);
        assert!(!argfile.exists());

        let replaced = apply_argfile("java", args, 10, &argfile).unwrap();
        assert_eq!(replaced, [format!("@{argfile}")]);
        assert_eq!(
            std::fs::read_to_string(&argfile).unwrap(),
            indoc! {r#"
                "-classpath"
                "C:\\lib\\a.jar;C:\\lib\\b.jar"
                "say \"hi\""
            "#}
        );
    }
}
