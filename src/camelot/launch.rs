//! Launch command selection for the Camelot child process.
//!
//! The relay runs the Camelot communicator script through an interpreter,
//! optionally wrapped in the platform shell. Which program and argument
//! vector that turns into depends on the host OS; [`LaunchStrategy`] makes
//! that choice explicit and [`LaunchPlan`] carries the result, so both can
//! be checked without spawning anything.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::CamelotConfig;

/// Operating-system family that decides the shell wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    /// `cmd.exe /c`.
    Windows,
    /// `bash -c`.
    Posix,
}

impl TargetOs {
    /// The family this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// How the interpreter invocation is turned into a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// `bash -c "<interpreter> <script> <args…>"`.
    PosixShell,
    /// `cmd.exe /c "<interpreter> <script> <args…>"`.
    WindowsShell,
    /// `<interpreter> <script> <args…>` without a shell.
    Direct,
}

impl LaunchStrategy {
    /// Pick the strategy for `os`, or [`Direct`](Self::Direct) when no shell
    /// wrapper is wanted.
    #[must_use]
    pub fn select(os: TargetOs, shell: bool) -> Self {
        match (shell, os) {
            (false, _) => Self::Direct,
            (true, TargetOs::Windows) => Self::WindowsShell,
            (true, TargetOs::Posix) => Self::PosixShell,
        }
    }

    /// Build the launch plan for `config` under this strategy.
    #[must_use]
    pub fn plan(self, config: &CamelotConfig) -> LaunchPlan {
        let script = config.script.to_string_lossy().into_owned();

        let (program, args) = match self {
            Self::Direct => {
                let mut args = Vec::with_capacity(config.args.len() + 1);
                args.push(script);
                args.extend(config.args.iter().cloned());
                (config.interpreter.clone(), args)
            }
            Self::PosixShell => {
                let line = shell_line(&config.interpreter, &script, &config.args, quote_posix);
                ("bash".to_owned(), vec!["-c".to_owned(), line])
            }
            Self::WindowsShell => {
                let line = shell_line(&config.interpreter, &script, &config.args, quote_windows);
                ("cmd.exe".to_owned(), vec!["/c".to_owned(), line])
            }
        };

        LaunchPlan {
            strategy: self,
            program,
            args,
            working_dir: config.working_dir.clone(),
        }
    }
}

/// Fully resolved command for one child launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Strategy that produced this plan.
    pub strategy: LaunchStrategy,
    /// Program handed to the OS.
    pub program: String,
    /// Argument vector, excluding the program itself.
    pub args: Vec<String>,
    /// Working directory; inherited when `None`.
    pub working_dir: Option<PathBuf>,
}

impl LaunchPlan {
    /// Plan for `config` on the current OS.
    #[must_use]
    pub fn for_current_os(config: &CamelotConfig) -> Self {
        LaunchStrategy::select(TargetOs::current(), config.shell).plan(config)
    }

    /// Program and arguments joined for log output.
    #[must_use]
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A [`Command`] with all three stdio streams piped.
    ///
    /// The child is killed if its handle is dropped.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd
    }
}

fn shell_line(
    interpreter: &str,
    script: &str,
    args: &[String],
    quote: fn(&str) -> String,
) -> String {
    std::iter::once(interpreter)
        .chain(std::iter::once(script))
        .chain(args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a word for `bash -c`; words made only of safe characters pass through.
fn quote_posix(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        word.to_owned()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Quote a word for `cmd.exe /c`; only words with spaces or quotes are wrapped.
fn quote_windows(word: &str) -> String {
    if word.is_empty() || word.contains([' ', '\t', '"']) {
        format!("\"{}\"", word.replace('"', "\"\""))
    } else {
        word.to_owned()
    }
}
