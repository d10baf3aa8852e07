use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{CommandSpawner, LOST_EXIT_CODE, LineSplitter, OutputStream, ProcessEvent, RunningCommand};

const READ_BUFFER_BYTES: usize = 4096;

/// Runs commands through `sh -c` (`cmd /C` on Windows).
///
/// Output is read in raw chunks rather than `lines()` so carriage-return
/// redraws are seen as they happen. The `Exited` event is sent only after
/// both pipes are drained, so no output is ever reported after the exit.
#[derive(Debug, Clone, Default)]
pub struct ShellSpawner {
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl ShellSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl CommandSpawner for ShellSpawner {
    fn spawn(&self, command: &str) -> std::io::Result<RunningCommand> {
        let mut child = self.command(command).spawn()?;
        let pid = child.id();
        tracing::debug!(pid = ?pid, command = %command, "spawned command");

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward(out, OutputStream::Stdout, tx.clone())));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward(err, OutputStream::Stderr, tx.clone())));

        tokio::spawn(async move {
            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(LOST_EXIT_CODE),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to wait for command");
                    LOST_EXIT_CODE
                }
            };
            tracing::debug!(pid = ?pid, exit_code = code, "command exited");
            let _ = tx.send(ProcessEvent::Exited(code));
        });

        Ok(RunningCommand::new(rx).with_pid(pid))
    }
}

async fn forward<R>(mut reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<ProcessEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; READ_BUFFER_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for text in splitter.push(&buf[..n]) {
                    if tx.send(ProcessEvent::Output { stream, text }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, ?stream, "output pipe closed with error");
                break;
            }
        }
    }
    if let Some(text) = splitter.finish() {
        let _ = tx.send(ProcessEvent::Output { stream, text });
    }
}
