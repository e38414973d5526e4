// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::os;
use crate::{
    errors::LaunchError,
    time::{StopwatchSnapshot, stopwatch},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use std::{
    fmt,
    fs::OpenOptions,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, warn};

/// A request to run a process to completion.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    /// The program to run.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// The working directory, or the current directory if `None`.
    pub cwd: Option<Utf8PathBuf>,

    /// Environment variables set in addition to the inherited environment.
    pub env: IndexMap<String, String>,

    /// The file standard output is written to.
    pub stdout: Utf8PathBuf,

    /// The file standard error is written to.
    pub stderr: Utf8PathBuf,

    /// How long the process may run before it's killed.
    pub timeout: Option<Duration>,
}

impl SpawnRequest {
    /// Creates a request with no arguments, writing output to the given files.
    pub fn new(program: impl Into<String>, output: &OutputFiles) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: IndexMap::new(),
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
            timeout: None,
        }
    }

    /// Returns the command line, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|arg| {
                if arg.is_empty() || arg.contains([' ', '"', '\t']) {
                    format!("\"{}\"", arg.replace('"', "\\\""))
                } else {
                    arg.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The result of a process that ran to completion.
#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    /// The exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,

    /// When the process was started.
    pub start_time: DateTime<Local>,

    /// When the process exited.
    pub end_time: DateTime<Local>,

    /// How long the process ran for.
    pub elapsed: Duration,
}

impl ProcessOutcome {
    pub(crate) fn from_snapshot(exit_code: Option<i32>, snapshot: StopwatchSnapshot) -> Self {
        Self {
            exit_code,
            start_time: snapshot.start_time,
            end_time: snapshot.end_time(),
            elapsed: snapshot.duration,
        }
    }

    /// Returns true if the process exited with one of the given codes.
    pub fn exited_with(&self, codes: &[i32]) -> bool {
        self.exit_code.is_some_and(|code| codes.contains(&code))
    }
}

/// A flag that requests running processes to be killed.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that hasn't been set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs processes to completion.
///
/// Implementations must kill the process along with any processes it started when it times out or
/// is cancelled.
pub trait ProcessSpawner: fmt::Debug + Send + Sync {
    /// Runs the process described by `request`, blocking until it exits.
    fn run(
        &self,
        request: &SpawnRequest,
        cancel: &CancellationFlag,
    ) -> Result<ProcessOutcome, LaunchError>;
}

/// The default [`ProcessSpawner`], backed by `duct`.
///
/// On Unix, each process is started in its own process group, and the whole group is killed on
/// timeout or cancellation. On Windows, each process is assigned to a job object, and the job is
/// terminated instead.
#[derive(Clone, Debug)]
pub struct DuctSpawner {
    poll_interval: Duration,
}

impl DuctSpawner {
    /// Creates a new spawner.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
        }
    }
}

impl Default for DuctSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSpawner for DuctSpawner {
    fn run(
        &self,
        request: &SpawnRequest,
        cancel: &CancellationFlag,
    ) -> Result<ProcessOutcome, LaunchError> {
        let mut expression = duct::cmd(request.program.as_str(), request.args.iter())
            .stdin_null()
            .stdout_path(request.stdout.as_std_path())
            .stderr_path(request.stderr.as_std_path())
            .unchecked()
            .before_spawn(|cmd| {
                os::set_process_group(cmd);
                Ok(())
            });
        if let Some(cwd) = &request.cwd {
            expression = expression.dir(cwd.as_std_path());
        }
        for (key, value) in &request.env {
            expression = expression.env(key, value);
        }

        debug!("running: {}", request.command_line());
        let start = stopwatch();
        let handle = expression.start().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                LaunchError::ExecutableNotFound {
                    program: request.program.clone(),
                    err,
                }
            } else {
                LaunchError::Spawn {
                    program: request.program.clone(),
                    err,
                }
            }
        })?;
        let tree = os::ProcessTree::attach(&handle);
        let spawn_error = |err| LaunchError::Spawn {
            program: request.program.clone(),
            err,
        };

        loop {
            if let Some(output) = handle.try_wait().map_err(spawn_error)? {
                return Ok(ProcessOutcome::from_snapshot(
                    output.status.code(),
                    start.snapshot(),
                ));
            }

            let timed_out = start.is_past(request.timeout);
            if timed_out || cancel.is_cancelled() {
                tree.kill();
                if let Err(err) = handle.kill() {
                    warn!("error killing `{}`: {err}", request.program);
                }
                return Err(if timed_out {
                    LaunchError::TimedOut {
                        program: request.program.clone(),
                        timeout: request.timeout.unwrap_or_default(),
                        stdout: request.stdout.clone(),
                        stderr: request.stderr.clone(),
                    }
                } else {
                    LaunchError::Cancelled {
                        program: request.program.clone(),
                    }
                });
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}

/// The pair of files a process writes its output into.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputFiles {
    /// The file standard output is written to.
    pub stdout: Utf8PathBuf,

    /// The file standard error is written to.
    pub stderr: Utf8PathBuf,
}

impl OutputFiles {
    /// Claims `<name>.out` and `<name>.err` in `dir`, or `<name>.1.out` and so on if those
    /// already exist.
    ///
    /// The files are created here, so concurrent callers never share a pair.
    pub fn allocate(dir: &Utf8Path, name: &str) -> Result<Self, LaunchError> {
        std::fs::create_dir_all(dir).map_err(|err| LaunchError::CreateDir {
            path: dir.to_owned(),
            err,
        })?;

        for suffix in 0u32.. {
            let stem = if suffix == 0 {
                name.to_owned()
            } else {
                format!("{name}.{suffix}")
            };
            let stdout = dir.join(format!("{stem}.out"));
            if !claim(&stdout)? {
                continue;
            }
            let stderr = dir.join(format!("{stem}.err"));
            if !claim(&stderr)? {
                // Leave the claimed .out in place so that nobody else picks this suffix.
                continue;
            }
            return Ok(Self { stdout, stderr });
        }
        unreachable!("ran out of output file suffixes")
    }
}

fn claim(path: &Utf8Path) -> Result<bool, LaunchError> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(LaunchError::OutputFile {
            path: path.to_owned(),
            err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_files_are_unique() {
        let dir = Utf8TempDir::new().unwrap();
        let first = OutputFiles::allocate(dir.path(), "junit").unwrap();
        assert_eq!(first.stdout, dir.path().join("junit.out"));
        assert_eq!(first.stderr, dir.path().join("junit.err"));

        let second = OutputFiles::allocate(dir.path(), "junit").unwrap();
        assert_eq!(second.stdout, dir.path().join("junit.1.out"));

        // A stray .err claimed by someone else is skipped over too.
        std::fs::write(dir.path().join("junit.2.err"), b"").unwrap();
        let third = OutputFiles::allocate(dir.path(), "junit").unwrap();
        assert_eq!(third.stderr, dir.path().join("junit.3.err"));
    }

    #[test]
    fn command_line_quotes() {
        let output = OutputFiles {
            stdout: "a.out".into(),
            stderr: "a.err".into(),
        };
        let mut request = SpawnRequest::new("java", &output);
        request.args = vec!["-cp".to_owned(), "my dir/a.jar".to_owned(), String::new()];
        assert_eq!(request.command_line(), r#"java -cp "my dir/a.jar" """#);
    }

    #[test]
    fn cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[cfg(unix)]
    #[test]
    fn runs_and_times_out() {
        let dir = Utf8TempDir::new().unwrap();
        let spawner = DuctSpawner::new();
        let cancel = CancellationFlag::new();

        let output = OutputFiles::allocate(dir.path(), "echo").unwrap();
        let mut request = SpawnRequest::new("sh", &output);
        request.args = vec!["-c".to_owned(), "echo hello; exit 3".to_owned()];
        let outcome = spawner.run(&request, &cancel).unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert!(outcome.exited_with(&[1, 3]));
        assert!(outcome.end_time >= outcome.start_time);
        assert_eq!(std::fs::read_to_string(&output.stdout).unwrap(), "hello\n");

        let output = OutputFiles::allocate(dir.path(), "sleep").unwrap();
        let mut request = SpawnRequest::new("sh", &output);
        request.args = vec!["-c".to_owned(), "sleep 30".to_owned()];
        request.timeout = Some(Duration::from_millis(200));
        let err = spawner.run(&request, &cancel).unwrap_err();
        assert!(err.is_timeout(), "{err:?}");

        let output = OutputFiles::allocate(dir.path(), "missing").unwrap();
        let request = SpawnRequest::new("definitely-not-a-real-program-jvmtest", &output);
        let err = spawner.run(&request, &cancel).unwrap_err();
        assert!(
            matches!(err, LaunchError::ExecutableNotFound { .. }),
            "{err:?}"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn timeout_kills_descendants() {
        let dir = Utf8TempDir::new().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let output = OutputFiles::allocate(dir.path(), "tree").unwrap();
        let mut request = SpawnRequest::new("sh", &output);
        request.args = vec![
            "-c".to_owned(),
            format!("sleep 30 & echo $! > {pid_file}; wait"),
        ];
        request.timeout = Some(Duration::from_millis(500));
        let err = DuctSpawner::new()
            .run(&request, &CancellationFlag::new())
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let stat = format!("/proc/{}/stat", pid.trim());
        // A killed process may linger as a zombie until it's reaped.
        let running = || {
            std::fs::read_to_string(&stat)
                .is_ok_and(|stat| !stat.rsplit(") ").next().unwrap_or("").starts_with('Z'))
        };
        let start = std::time::Instant::now();
        while running() && start.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!running(), "sleep {} outlived its parent", pid.trim());
    }

    #[cfg(windows)]
    #[test]
    fn timeout_terminates_job() {
        let dir = Utf8TempDir::new().unwrap();
        let output = OutputFiles::allocate(dir.path(), "ping").unwrap();
        let mut request = SpawnRequest::new("cmd", &output);
        request.args = ["/C", "ping", "-n", "30", "127.0.0.1"]
            .map(str::to_owned)
            .to_vec();
        request.timeout = Some(Duration::from_millis(500));
        let start = std::time::Instant::now();
        let err = DuctSpawner::new()
            .run(&request, &CancellationFlag::new())
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        assert!(start.elapsed() < Duration::from_secs(20));
    }
}
