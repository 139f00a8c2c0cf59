//! In-memory fakes for the external collaborators.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::InstallError;
use crate::external::{CertFiles, CertGenerator, Extract, Fetch};
use crate::process::{CommandSpec, Launcher, OutputMode, ProcessExit, RunningProcess};

/// Scripted behaviour of one launch.
#[derive(Clone, Debug)]
pub(crate) enum FakeRun {
    /// Prints `lines` then exits with `code` (`None` = killed by a signal).
    Exit {
        lines: Vec<String>,
        code: Option<i32>,
    },
    /// Prints `lines` then runs until killed.
    Hang { lines: Vec<String> },
    /// Fails to spawn.
    SpawnError,
}

impl FakeRun {
    pub(crate) fn exit(code: i32) -> Self {
        FakeRun::Exit {
            lines: Vec::new(),
            code: Some(code),
        }
    }

    pub(crate) fn print_then_exit(lines: &[&str], code: i32) -> Self {
        FakeRun::Exit {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            code: Some(code),
        }
    }

    pub(crate) fn print_then_hang(lines: &[&str]) -> Self {
        FakeRun::Hang {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Launcher replaying scripted runs, keyed by the program's file name.
///
/// A program with no scripted run left hangs until killed.
#[derive(Default)]
pub(crate) struct FakeLauncher {
    scripts: Mutex<HashMap<String, VecDeque<FakeRun>>>,
    launched: Mutex<Vec<CommandSpec>>,
}

impl FakeLauncher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, program: &str, runs: impl IntoIterator<Item = FakeRun>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .extend(runs);
        self
    }

    pub(crate) fn launched(&self) -> Vec<CommandSpec> {
        self.launched.lock().unwrap().clone()
    }

    pub(crate) fn launch_count(&self, program: &str) -> usize {
        self.launched()
            .iter()
            .filter(|c| program_key(c) == program)
            .count()
    }
}

fn program_key(cmd: &CommandSpec) -> String {
    cmd.program()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self, cmd: &CommandSpec) -> io::Result<Box<dyn RunningProcess>> {
        self.launched.lock().unwrap().push(cmd.clone());
        let run = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&program_key(cmd))
            .and_then(VecDeque::pop_front)
            .unwrap_or(FakeRun::Hang { lines: Vec::new() });

        let (lines, code) = match run {
            FakeRun::SpawnError => {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
            }
            FakeRun::Exit { lines, code } => (lines, Some(code)),
            FakeRun::Hang { lines } => (lines, None),
        };

        let rx = (cmd.output_mode() == OutputMode::Capture).then(|| {
            let (tx, rx) = mpsc::channel(lines.len().max(1));
            for line in lines {
                let _ = tx.try_send(line);
            }
            rx
        });
        Ok(Box::new(FakeProcess {
            lines: rx,
            exit: code,
            killed: CancellationToken::new(),
        }))
    }
}

struct FakeProcess {
    lines: Option<mpsc::Receiver<String>>,
    /// `Some(code)` exits right away, `None` hangs until killed.
    exit: Option<Option<i32>>,
    killed: CancellationToken,
}

#[async_trait]
impl RunningProcess for FakeProcess {
    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>> {
        self.lines.take()
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        if self.killed.is_cancelled() {
            return Ok(ProcessExit::new(None));
        }
        match self.exit {
            Some(code) => Ok(ProcessExit::new(code)),
            None => {
                self.killed.cancelled().await;
                Ok(ProcessExit::new(None))
            }
        }
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.killed.cancel();
        Ok(())
    }
}

/// Fetcher writing fixed bytes and serving fixed template text.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    template: String,
    fail: bool,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_template(mut self, text: &str) -> Self {
        self.template = text.to_string();
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn record(&self, url: &str) -> Result<(), InstallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(InstallError::Download {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), InstallError> {
        self.record(url)?;
        std::fs::write(dest, b"\x7fELF fake").map_err(|e| InstallError::io(dest, e))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, InstallError> {
        self.record(url)?;
        Ok(self.template.clone())
    }
}

/// Extractor that materializes the requested entry as a small file.
#[derive(Default)]
pub(crate) struct FakeExtractor;

#[async_trait]
impl Extract for FakeExtractor {
    async fn extract(
        &self,
        _archive: &Path,
        entry: &str,
        dest_dir: &Path,
    ) -> Result<(), InstallError> {
        let path = dest_dir.join(entry);
        std::fs::write(&path, b"\x7fELF extracted").map_err(|e| InstallError::io(path, e))
    }
}

/// Certificate generator writing placeholder PEM files.
#[derive(Default)]
pub(crate) struct FakeCerts;

#[async_trait]
impl CertGenerator for FakeCerts {
    async fn generate(&self, _common_name: &str, dir: &Path) -> Result<CertFiles, InstallError> {
        let files = CertFiles::in_dir(dir);
        std::fs::write(&files.key, "KEY").map_err(|e| InstallError::io(&files.key, e))?;
        std::fs::write(&files.cert, "CERT").map_err(|e| InstallError::io(&files.cert, e))?;
        Ok(files)
    }
}
