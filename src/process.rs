//! Running the external package manager.

use std::fmt::Display;
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TaskError;

/// What a finished external process left behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Both captured streams, lossily decoded.
    pub fn combined(&self) -> String {
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stderr = String::from_utf8_lossy(&self.stderr);

        match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.into_owned(),
            (true, false) => stderr.into_owned(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Starts a process and blocks until it exits.
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> std::io::Result<ProcessOutput>;
}

/// Runs processes with [`std::process::Command`], capturing their output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Utf8Path) -> std::io::Result<ProcessOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
}

impl PackageManager {
    pub fn new(enable_pnpm: bool) -> Self {
        if enable_pnpm { Self::Pnpm } else { Self::Npm }
    }

    pub fn lock_file(self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Pnpm => "pnpm-lock.yaml",
        }
    }

    /// The lock file written by the *other* package manager.
    pub fn foreign_lock_file(self) -> &'static str {
        match self {
            Self::Npm => Self::Pnpm.lock_file(),
            Self::Pnpm => Self::Npm.lock_file(),
        }
    }

    fn file_name(self) -> &'static str {
        match (self, cfg!(windows)) {
            (Self::Npm, false) => "npm",
            (Self::Npm, true) => "npm.cmd",
            (Self::Pnpm, false) => "pnpm",
            (Self::Pnpm, true) => "pnpm.cmd",
        }
    }

    /// Resolves the executable to run. With `require_home` the executable has
    /// to live in `~/.tsumiki/node`, otherwise it's looked up on `PATH`.
    pub fn executable(self, require_home: bool) -> Result<String, TaskError> {
        if !require_home {
            return Ok(self.file_name().to_string());
        }

        let home = dirs::home_dir().ok_or(TaskError::NoHomeDirectory)?;
        self.home_executable(&Utf8PathBuf::try_from(home)?)
    }

    /// The executable installed under `<home>/.tsumiki/node`.
    pub(crate) fn home_executable(self, home: &Utf8Path) -> Result<String, TaskError> {
        let path = home_node_dir(home).join(self.file_name());

        if path.is_file() {
            Ok(path.into_string())
        } else {
            Err(TaskError::ExecutableNotFound(path))
        }
    }
}

impl Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Npm => write!(f, "npm"),
            Self::Pnpm => write!(f, "pnpm"),
        }
    }
}

pub(crate) fn home_node_dir(home: &Utf8Path) -> Utf8PathBuf {
    home.join(".tsumiki").join("node")
}
