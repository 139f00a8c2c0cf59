//! # Process-start primitive.
//!
//! The supervision core never spawns OS processes itself; it goes through a
//! [`Launcher`], which turns a [`CommandSpec`] into a [`RunningProcess`].
//!
//! ```text
//! CommandSpec { program, args, output }
//!      │
//!      ▼
//! Launcher::launch() ──► RunningProcess
//!                           ├─ take_lines()  merged stdout+stderr (Capture only)
//!                           ├─ wait()        exit code
//!                           └─ kill()        used on cancellation
//! ```
//!
//! - [`TokioLauncher`] is the real implementation (`tokio::process`).
//! - [`LineSink`] consumes captured lines, one process instance at a time.
//! - [`RunPlan`] is the per-launch recipe a supervisor replays on every restart.

mod sink;
mod spawn;

pub use sink::{LineSink, LogSink};
pub use spawn::TokioLauncher;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// What to do with a process's standard output and error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Merge both streams into one line channel.
    #[default]
    Capture,
    /// Send both streams to the null device.
    Discard,
    /// Share the parent's terminal, stdin included.
    Inherit,
}

/// Program, arguments and output wiring of one launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<String>,
    output: OutputMode,
}

impl CommandSpec {
    /// Command running `program` with no arguments and captured output.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: OutputMode::default(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the output wiring.
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output
    }
}

/// How a process instance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessExit {
    code: Option<i32>,
}

impl ProcessExit {
    /// Exit with the given code; `None` means terminated by a signal.
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Only an explicit `0` counts as success.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A live process instance, owned exclusively by its supervisor.
#[async_trait]
pub trait RunningProcess: Send {
    /// Takes the captured line stream. `None` unless launched with [`OutputMode::Capture`],
    /// or if already taken. The channel closes once both streams reach EOF.
    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>>;

    /// Waits for the process to exit.
    async fn wait(&mut self) -> io::Result<ProcessExit>;

    /// Kills the process and reaps it.
    async fn kill(&mut self) -> io::Result<()>;
}

/// Starts processes.
#[async_trait]
pub trait Launcher: Send + Sync + 'static {
    /// Spawns `cmd`. An error here means the process never started.
    async fn launch(&self, cmd: &CommandSpec) -> io::Result<Box<dyn RunningProcess>>;
}

/// Shared launcher handle.
pub type LauncherRef = Arc<dyn Launcher>;

/// Recipe for launching one service instance.
///
/// Consulted once per launch, so every restarted instance gets a fresh sink.
pub trait RunPlan: Send + Sync {
    /// Command of the next launch.
    fn command(&self) -> CommandSpec;

    /// Consumer of the next instance's captured output.
    fn sink(&self) -> Box<dyn LineSink>;
}

/// Plan with a fixed command whose captured output goes to the log.
pub struct StaticPlan {
    cmd: CommandSpec,
    service: Arc<str>,
}

impl StaticPlan {
    pub fn new(service: impl Into<Arc<str>>, cmd: CommandSpec) -> Self {
        Self {
            cmd,
            service: service.into(),
        }
    }
}

impl RunPlan for StaticPlan {
    fn command(&self) -> CommandSpec {
        self.cmd.clone()
    }

    fn sink(&self) -> Box<dyn LineSink> {
        Box::new(LogSink::new(Arc::clone(&self.service)))
    }
}

/// Runs `cmd` to completion and collects its captured output lines.
///
/// Used for one-shot helper invocations (e.g. key generation), not for supervised
/// services.
pub async fn run_to_completion(
    launcher: &dyn Launcher,
    cmd: &CommandSpec,
) -> io::Result<(Vec<String>, ProcessExit)> {
    let cmd = cmd.clone().output(OutputMode::Capture);
    let mut child = launcher.launch(&cmd).await?;
    let mut collected = Vec::new();
    if let Some(mut lines) = child.take_lines() {
        while let Some(line) = lines.recv().await {
            collected.push(line);
        }
    }
    let exit = child.wait().await?;
    Ok((collected, exit))
}
