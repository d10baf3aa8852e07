use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{CommandSpawner, OutputStream, ProcessEvent, RunningCommand};

#[derive(Debug, Clone)]
enum Beat {
    Wait(Duration),
    Emit(OutputStream, String),
    Exit(i32),
}

/// Canned output for one command, played back on the tokio timer.
///
/// A script without an explicit [`Script::exit`] exits 0 after its last beat.
#[derive(Debug, Clone, Default)]
pub struct Script {
    beats: Vec<Beat>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(mut self, millis: u64) -> Self {
        self.beats.push(Beat::Wait(Duration::from_millis(millis)));
        self
    }

    pub fn stdout(mut self, line: impl Into<String>) -> Self {
        self.beats.push(Beat::Emit(OutputStream::Stdout, line.into()));
        self
    }

    pub fn stderr(mut self, line: impl Into<String>) -> Self {
        self.beats.push(Beat::Emit(OutputStream::Stderr, line.into()));
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.beats.push(Beat::Exit(code));
        self
    }

    async fn play(self, tx: mpsc::UnboundedSender<ProcessEvent>) {
        for beat in self.beats {
            match beat {
                Beat::Wait(duration) => tokio::time::sleep(duration).await,
                Beat::Emit(stream, text) => {
                    if tx.send(ProcessEvent::Output { stream, text }).is_err() {
                        return;
                    }
                }
                Beat::Exit(code) => {
                    let _ = tx.send(ProcessEvent::Exited(code));
                    return;
                }
            }
        }
        let _ = tx.send(ProcessEvent::Exited(0));
    }
}

/// Spawner that answers known commands with a [`Script`].
///
/// Unknown commands fail to spawn with `NotFound`. Every spawn attempt is
/// recorded, including failed ones.
#[derive(Debug, Default)]
pub struct ScriptedSpawner {
    scripts: HashMap<String, Script>,
    spawned: Mutex<Vec<String>>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, command: impl Into<String>, script: Script) -> Self {
        self.scripts.insert(command.into(), script);
        self
    }

    /// Commands passed to `spawn`, in order.
    pub fn spawned(&self) -> Vec<String> {
        self.spawned
            .lock()
            .map(|spawned| spawned.clone())
            .unwrap_or_default()
    }
}

impl CommandSpawner for ScriptedSpawner {
    fn spawn(&self, command: &str) -> io::Result<RunningCommand> {
        if let Ok(mut spawned) = self.spawned.lock() {
            spawned.push(command.to_string());
        }
        let script = self.scripts.get(command).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no script for '{}'", command))
        })?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(script.play(tx));
        Ok(RunningCommand::new(rx))
    }
}
