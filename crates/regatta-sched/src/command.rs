//! Execution of the Slurm command-line tools.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{SchedError, SchedResult};

/// Specification of a single command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,

    /// Arguments, one per entry.
    pub args: Vec<String>,

    /// Environment overrides applied to the spawned child only; the parent
    /// process environment is never touched.
    pub envs: Vec<(String, String)>,

    /// Kill the command and fail with [`SchedError::CommandTimeout`] after
    /// this long.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a specification for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the spawned child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The full command line, for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status; -1 when the command was terminated by a signal.
    pub status: i32,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Seam through which every Slurm tool is invoked.
///
/// Production code uses [`SystemRunner`]; tests drive the scheduler with the
/// canned outputs of a [`ScriptedRunner`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and capture its output.
    ///
    /// A non-zero exit status is not an error at this level; strictness is
    /// applied by the caller where the protocol requires it.
    async fn run(&self, spec: &CommandSpec) -> SchedResult<CommandOutput>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> SchedResult<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }

        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| SchedError::CommandTimeout {
                    command: spec.command_line(),
                    timeout: limit,
                })??,
            None => cmd.output().await?,
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
        })
    }
}

/// Runner that replays canned outputs instead of spawning processes.
///
/// Responses are consumed in FIFO order; each one is tagged with the program
/// it is meant for, and a mismatch produces a failed [`CommandOutput`] whose
/// stderr explains what happened. Every issued command line is recorded and
/// can be inspected with [`ScriptedRunner::calls`]. Kept public so client
/// crates can exercise scheduler flows without a Slurm installation.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<VecDeque<(String, CommandOutput)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next invocation of `program`.
    pub fn push(&self, program: &str, output: CommandOutput) {
        self.responses
            .lock()
            .expect("scripted runner lock poisoned")
            .push_back((program.to_string(), output));
    }

    /// Queue a successful response with the given stdout.
    pub fn push_stdout(&self, program: &str, stdout: &str) {
        self.push(
            program,
            CommandOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            },
        );
    }

    /// Queue a failing response with the given exit status and stderr.
    pub fn push_failure(&self, program: &str, status: i32, stderr: &str) {
        self.push(
            program,
            CommandOutput {
                stderr: stderr.to_string(),
                status,
                ..Default::default()
            },
        );
    }

    /// The command lines issued so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("scripted runner lock poisoned")
            .clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> SchedResult<CommandOutput> {
        self.calls
            .lock()
            .expect("scripted runner lock poisoned")
            .push(spec.command_line());

        let next = self
            .responses
            .lock()
            .expect("scripted runner lock poisoned")
            .pop_front();
        match next {
            Some((program, output)) if program == spec.program => Ok(output),
            Some((program, _)) => Ok(CommandOutput {
                stderr: format!(
                    "scripted response was for '{}', but '{}' was invoked",
                    program, spec.program
                ),
                status: 127,
                ..Default::default()
            }),
            None => Ok(CommandOutput {
                stderr: format!("no scripted response left for '{}'", spec.program),
                status: 127,
                ..Default::default()
            }),
        }
    }
}
