// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiling Java sources with `javac`.

use crate::{
    classpath::Classpath,
    config::JvmTestConfig,
    errors::{CompileError, LaunchError},
    helpers::{is_vcs_dir, plural, resolve_path},
    launcher::{
        CancellationFlag, DuctSpawner, OutputFiles, ProcessOutcome, ProcessSpawner, SpawnRequest,
        apply_argfile,
    },
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What to compile.
#[derive(Clone, Debug)]
pub struct CompileRequest {
    /// `.java` files, or directories searched recursively for them.
    pub inputs: Vec<Utf8PathBuf>,

    /// The directory classes are written into.
    pub output_dir: Utf8PathBuf,

    /// The classpath. If empty, the configured compile classpath is used.
    pub classpath: Vec<String>,

    /// Compiler arguments such as `-Werror`. If `None`, the configured arguments are used.
    pub javac_args: Option<Vec<String>>,

    /// The directory `javac`'s output files are written into. Defaults to the parent of the
    /// output directory.
    pub log_dir: Option<Utf8PathBuf>,
}

impl CompileRequest {
    /// Creates a request to compile everything under `inputs` into `output_dir`.
    pub fn new(
        inputs: impl IntoIterator<Item = Utf8PathBuf>,
        output_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            output_dir: output_dir.into(),
            classpath: Vec::new(),
            javac_args: None,
            log_dir: None,
        }
    }
}

/// The result of a successful compilation.
#[derive(Clone, Debug)]
pub struct CompileOutcome {
    /// The directory classes were written into.
    pub output_dir: Utf8PathBuf,

    /// The source files that were compiled.
    pub source_files: Vec<Utf8PathBuf>,

    /// The files `javac` wrote its output into.
    pub output: OutputFiles,

    /// How the compiler exited.
    pub process: ProcessOutcome,
}

/// Runs `javac`.
#[derive(Clone, Debug)]
pub struct JavaCompiler {
    javac: Utf8PathBuf,
    default_args: Vec<String>,
    default_classpath: Vec<String>,
    argfile_threshold: usize,
    timeout: Duration,
    workspace_root: Utf8PathBuf,
    spawner: Arc<dyn ProcessSpawner>,
}

impl JavaCompiler {
    /// Creates a compiler from the configuration.
    pub fn new(config: &JvmTestConfig) -> Self {
        Self {
            javac: config.javac_executable(),
            default_args: config.compile.javac_args.clone(),
            default_classpath: config.compile.classpath.clone(),
            argfile_threshold: config.java.argfile_threshold,
            timeout: config.java.timeout,
            workspace_root: config.workspace_root().to_owned(),
            spawner: Arc::new(DuctSpawner::new()),
        }
    }

    /// Replaces the process spawner.
    pub fn with_spawner(mut self, spawner: impl ProcessSpawner + 'static) -> Self {
        self.spawner = Arc::new(spawner);
        self
    }

    /// Compiles the request's sources, blocking until `javac` exits.
    pub fn compile(
        &self,
        request: &CompileRequest,
        cancel: &CancellationFlag,
    ) -> Result<CompileOutcome, CompileError> {
        let inputs: Vec<_> = request
            .inputs
            .iter()
            .map(|input| resolve_path(&self.workspace_root, input))
            .collect();
        let source_files = find_source_files(&inputs)?;

        let classpath = if request.classpath.is_empty() {
            &self.default_classpath
        } else {
            &request.classpath
        };
        let classpath = Classpath::resolve(classpath, &self.workspace_root)
            .map_err(|err| javac_error(err.into()))?;
        for (index, entry) in classpath.entries().iter().enumerate() {
            let missing = if entry.exists() { "" } else { " (does not exist)" };
            debug!("javac classpath #{:<2}: {entry}{missing}", index + 1);
        }

        let output_dir = resolve_path(&self.workspace_root, &request.output_dir);
        std::fs::create_dir_all(&output_dir).map_err(|err| {
            javac_error(LaunchError::CreateDir {
                path: output_dir.clone(),
                err,
            })
        })?;
        if output_dir
            .read_dir_utf8()
            .is_ok_and(|mut entries| entries.next().is_some())
        {
            warn!("compiling into an output directory that already contains files: {output_dir}");
        }

        let mut args = Vec::new();
        if !classpath.is_empty() {
            args.push("-classpath".to_owned());
            args.push(classpath.to_arg());
        }
        args.extend(
            request
                .javac_args
                .as_ref()
                .unwrap_or(&self.default_args)
                .iter()
                .cloned(),
        );
        args.push("-d".to_owned());
        args.push(output_dir.to_string());
        args.extend(source_files.iter().map(|file| file.to_string()));

        let log_dir = match &request.log_dir {
            Some(dir) => resolve_path(&self.workspace_root, dir),
            None => output_dir.parent().unwrap_or(&output_dir).to_owned(),
        };
        let output_name = format!("javac.{}", output_dir.file_name().unwrap_or("classes"));
        let output = OutputFiles::allocate(&log_dir, &output_name).map_err(javac_error)?;
        let args = apply_argfile(
            self.javac.as_str(),
            args,
            self.argfile_threshold,
            &output.stdout.with_extension("args"),
        )
        .map_err(javac_error)?;

        let mut spawn = SpawnRequest::new(self.javac.as_str(), &output);
        spawn.args = args;
        spawn.timeout = Some(self.timeout);

        info!(
            "compiling {} Java source {} into {output_dir}",
            source_files.len(),
            plural::files_str(source_files.len())
        );
        let process = self.spawner.run(&spawn, cancel).map_err(javac_error)?;

        let stderr = std::fs::read_to_string(&output.stderr).unwrap_or_default();
        if !process.exited_with(&[0]) {
            for line in stderr.lines() {
                warn!("  {line}");
            }
            return Err(CompileError::Javac {
                first_error: first_error_line(&stderr),
                err: LaunchError::UnexpectedExit {
                    program: "javac".to_owned(),
                    exit_code: process.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
            });
        }
        // Warnings are still worth seeing when compilation succeeds.
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            debug!("javac: {line}");
        }

        Ok(CompileOutcome {
            output_dir,
            source_files,
            output,
            process,
        })
    }
}

/// Returns the `.java` files among `inputs`, searching directories recursively and skipping
/// version control directories. Files found in directories are sorted.
pub fn find_source_files(inputs: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>, CompileError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            let mut found = Vec::new();
            let walker = WalkDir::new(input).into_iter().filter_entry(|entry| {
                !(entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(is_vcs_dir))
            });
            for entry in walker {
                let entry = entry.map_err(|err| CompileError::ReadDir {
                    path: input.clone(),
                    err,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match Utf8Path::from_path(entry.path()) {
                    Some(path) if path.extension() == Some("java") => found.push(path.to_owned()),
                    Some(_) => {}
                    None => warn!("ignoring non-UTF-8 path {}", entry.path().display()),
                }
            }
            found.sort();
            files.extend(found);
        } else {
            return Err(CompileError::InputNotFound {
                path: input.clone(),
            });
        }
    }

    if files.is_empty() {
        return Err(CompileError::NoSourceFiles {
            inputs: inputs.to_vec(),
        });
    }
    Ok(files)
}

fn first_error_line(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .find(|line| line.contains("error") || line.contains("invalid"))
        .map(|line| line.trim().to_owned())
}

fn javac_error(err: LaunchError) -> CompileError {
    CompileError::Javac {
        first_error: None,
        err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn touch(path: &Utf8Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"class X {}").unwrap();
    }

    #[test]
    fn source_files_are_found_recursively() {
        let dir = Utf8TempDir::new().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("myorg/b/B.java"));
        touch(&src.join("myorg/a/A.java"));
        touch(&src.join("myorg/a/notes.txt"));
        touch(&src.join(".svn/Hidden.java"));
        let single = dir.path().join("Single.java");
        touch(&single);

        let files = find_source_files(&[single.clone(), src.clone()]).unwrap();
        assert_eq!(
            files,
            [single, src.join("myorg/a/A.java"), src.join("myorg/b/B.java")]
        );
    }

    #[test]
    fn missing_inputs() {
        let dir = Utf8TempDir::new().unwrap();
        let err = find_source_files(&[dir.path().join("missing")]).unwrap_err();
        assert!(matches!(err, CompileError::InputNotFound { .. }), "{err:?}");

        let err = find_source_files(&[dir.path().to_owned()]).unwrap_err();
        assert!(matches!(err, CompileError::NoSourceFiles { .. }), "{err:?}");
    }

    #[test]
    fn first_error() {
        let stderr = indoc! {"
            Note: Some input files use unchecked operations.
            src/myorg/A.java:3: error: ';' expected
                int x = 1
                         ^
            1 error
        "};
        assert_eq!(
            first_error_line(stderr).as_deref(),
            Some("src/myorg/A.java:3: error: ';' expected")
        );
        assert_eq!(first_error_line("all good"), None);
    }
}
