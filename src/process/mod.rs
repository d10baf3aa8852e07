//! Process transport injected into strategies.
//!
//! A spawned command is observed as a stream of [`ProcessEvent`]s: output
//! chunks from stdout or stderr followed by exactly one `Exited` event.
//!
//! - [`ShellSpawner`] runs commands through the platform shell with `tokio::process`
//! - [`ScriptedSpawner`] replays canned output on the tokio clock, for tests
//!   and rehearsals

mod lines;
mod scripted;
mod shell;

use tokio::sync::mpsc;

pub use lines::LineSplitter;
pub use scripted::{Script, ScriptedSpawner};
pub use shell::ShellSpawner;

/// Exit code reported when a transport drops without reporting one.
pub const LOST_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output { stream: OutputStream, text: String },
    Exited(i32),
}

/// Handle to a command started by a [`CommandSpawner`].
#[derive(Debug)]
pub struct RunningCommand {
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    pid: Option<u32>,
}

impl RunningCommand {
    pub fn new(events: mpsc::UnboundedReceiver<ProcessEvent>) -> Self {
        Self { events, pid: None }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the next event.
    ///
    /// A transport that goes away without reporting an exit is reported as
    /// `Exited(LOST_EXIT_CODE)`. Cancel safe.
    pub async fn next_event(&mut self) -> ProcessEvent {
        self.events
            .recv()
            .await
            .unwrap_or(ProcessEvent::Exited(LOST_EXIT_CODE))
    }
}

/// Starts commands on behalf of strategies.
pub trait CommandSpawner: Send + Sync {
    fn spawn(&self, command: &str) -> std::io::Result<RunningCommand>;
}
