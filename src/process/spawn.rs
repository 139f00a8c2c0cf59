//! `tokio::process` backed [`Launcher`].

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CommandSpec, Launcher, OutputMode, ProcessExit, RunningProcess};

/// Line channel capacity; a full channel applies backpressure to the pipe readers.
const LINE_BUFFER: usize = 256;

/// Spawns real OS processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLauncher;

impl TokioLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Launcher for TokioLauncher {
    async fn launch(&self, spec: &CommandSpec) -> io::Result<Box<dyn RunningProcess>> {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arguments()).kill_on_drop(true);

        match spec.output_mode() {
            OutputMode::Capture => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            OutputMode::Discard => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
            OutputMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }

        debug!("Spawning command: {:?} {:?}", spec.program(), spec.arguments());
        let mut child = cmd.spawn()?;
        debug!("Command spawned with PID {:?}", child.id());

        let lines = if spec.output_mode() == OutputMode::Capture {
            let (tx, rx) = mpsc::channel(LINE_BUFFER);
            spawn_line_reader(child.stdout.take(), tx.clone());
            spawn_line_reader(child.stderr.take(), tx);
            Some(rx)
        } else {
            None
        };

        Ok(Box::new(TokioProcess { child, lines }))
    }
}

/// Reads `stream` line by line into `tx` until EOF.
///
/// Bytes that are not valid UTF-8 are replaced, never fatal. Keeps draining after
/// the receiver is dropped so the child never blocks on a full pipe.
fn spawn_line_reader(
    stream: Option<impl AsyncRead + Unpin + Send + 'static>,
    tx: mpsc::Sender<String>,
) {
    let Some(stream) = stream else {
        return;
    };
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut open = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if open && tx.send(decode_line(&buf)).await.is_err() {
                        open = false;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!(error = %e, "reading process output failed");
                    break;
                }
            }
        }
    });
}

/// Decodes one raw line, dropping the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

struct TokioProcess {
    child: Child,
    lines: Option<mpsc::Receiver<String>>,
}

#[async_trait]
impl RunningProcess for TokioProcess {
    fn take_lines(&mut self) -> Option<mpsc::Receiver<String>> {
        self.lines.take()
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait().await?;
        Ok(ProcessExit::new(status.code()))
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::discovery::StreamFactExtractor;
    use crate::process::run_to_completion;

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let cmd = CommandSpec::new("/bin/sh").args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let (mut lines, exit) = run_to_completion(&TokioLauncher::new(), &cmd)
            .await
            .unwrap();
        lines.sort();
        assert_eq!(lines, vec!["err".to_string(), "out".to_string()]);
        assert_eq!(exit.code(), Some(3));
        assert!(!exit.success());
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_the_stream() {
        let cmd = CommandSpec::new("/bin/sh").args([
            "-c",
            "printf 'INF \\377 banner\\n'; echo 'visit https://foo-bar.trycloudflare.com now'",
        ]);
        let (lines, exit) = run_to_completion(&TokioLauncher::new(), &cmd)
            .await
            .unwrap();
        assert!(exit.success());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "INF \u{FFFD} banner");

        let mut hosts = Vec::new();
        let mut extractor = StreamFactExtractor::new(|host: String| hosts.push(host));
        for line in &lines {
            extractor.observe(line);
        }
        drop(extractor);
        assert_eq!(hosts, vec!["foo-bar.trycloudflare.com".to_string()]);
    }

    #[tokio::test]
    async fn test_child_outlives_invalid_byte_and_exits_cleanly() {
        let script = "printf '\\377\\n'; i=0; \
                      while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done; exit 0";
        let cmd = CommandSpec::new("/bin/sh").args(["-c", script]);
        let (lines, exit) = run_to_completion(&TokioLauncher::new(), &cmd)
            .await
            .unwrap();
        assert_eq!(exit.code(), Some(0));
        assert_eq!(lines.len(), 2001);
        assert_eq!(lines.last().map(String::as_str), Some("line 1999"));
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"ok\r\n"), "ok");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"\xff\n"), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_discard_has_no_line_stream() {
        let cmd = CommandSpec::new("/bin/sh")
            .args(["-c", "echo hidden"])
            .output(OutputMode::Discard);
        let mut child = TokioLauncher::new().launch(&cmd).await.unwrap();
        assert!(child.take_lines().is_none());
        assert!(child.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let cmd = CommandSpec::new("/nonexistent/definitely-not-here");
        assert!(TokioLauncher::new().launch(&cmd).await.is_err());
    }

    #[tokio::test]
    async fn test_kill_terminates_long_running_child() {
        let cmd = CommandSpec::new("/bin/sh")
            .args(["-c", "sleep 30"])
            .output(OutputMode::Discard);
        let mut child = TokioLauncher::new().launch(&cmd).await.unwrap();
        child.kill().await.unwrap();
        let exit = child.wait().await.unwrap();
        assert_eq!(exit.code(), None);
    }
}
