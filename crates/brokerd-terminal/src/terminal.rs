//! The managed-terminal record (spec §3: "Managed terminal").

use tokio::sync::oneshot;

/// The 1 MiB soft cap spec §5 sets for a terminal's output buffer.
pub const DEFAULT_OUTPUT_BYTE_LIMIT: usize = 1024 * 1024;

/// A process's exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExitStatus {
    /// The exit code, or `-1` for a spawn failure or signal-only exit.
    pub exit_code: i32,
    /// The terminating signal number, if the process was killed by one.
    pub signal: Option<i32>,
}

/// Parameters for spawning a managed terminal (spec §4.4 `create`).
#[derive(Debug, Clone)]
pub struct TerminalSpec {
    /// The shell-interpreted command line.
    pub command: String,
    /// Extra positional arguments (appended after `-c command`, rarely
    /// used since `command` is itself shell-interpreted).
    pub args: Vec<String>,
    /// Working directory; defaults to the session's cwd if `None`.
    pub cwd: Option<std::path::PathBuf>,
    /// Environment overrides layered on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Output buffer cap in bytes.
    pub output_byte_limit: usize,
}

impl TerminalSpec {
    /// Build a spec for `command` with every other field defaulted.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), args: Vec::new(), cwd: None, env: Vec::new(), output_byte_limit: DEFAULT_OUTPUT_BYTE_LIMIT }
    }
}

/// Per-terminal state (spec §3's exact invariant: once `exited` is true,
/// the buffer is frozen apart from the single spawn-failure suffix, and
/// every past and future waiter observes the same exit status).
pub struct Terminal {
    /// Combined, chronologically-ordered stdout+stderr bytes.
    pub buffer: Vec<u8>,
    /// Declared byte cap.
    pub output_byte_limit: usize,
    /// Set once the buffer has been cut short by the byte cap.
    pub truncated: bool,
    /// Set once the process has exited.
    pub exited: bool,
    /// The exit outcome, once `exited` is true.
    pub exit_status: Option<ExitStatus>,
    waiters: Vec<oneshot::Sender<ExitStatus>>,
}

impl Terminal {
    /// Create a fresh, not-yet-exited terminal record.
    #[must_use]
    pub fn new(output_byte_limit: usize) -> Self {
        Self { buffer: Vec::new(), output_byte_limit, truncated: false, exited: false, exit_status: None, waiters: Vec::new() }
    }

    /// Append a chunk of output, honouring the byte cap (spec §4.4:
    /// "a partial tail of the new chunk is accepted to reach exactly the
    /// cap").
    pub fn append_output(&mut self, chunk: &[u8]) {
        if self.truncated {
            return;
        }
        let remaining = self.output_byte_limit.saturating_sub(self.buffer.len());
        if chunk.len() <= remaining {
            self.buffer.extend_from_slice(chunk);
        } else {
            self.buffer.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        }
    }

    /// Mark the terminal exited and resolve every queued waiter (spec
    /// §3's invariant: every *current and future* waiter receives the
    /// recorded status, so `exit_status` stays populated afterward).
    pub fn mark_exited(&mut self, status: ExitStatus) {
        self.exited = true;
        self.exit_status = Some(status);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(status);
        }
    }

    /// Mark the terminal exited due to a spawn failure (spec §4.4:
    /// "mark the terminal exited with code -1 and append a single line").
    pub fn mark_spawn_failed(&mut self, message: &str) {
        self.buffer.extend_from_slice(format!("\nProcess error: {message}").as_bytes());
        self.mark_exited(ExitStatus { exit_code: -1, signal: None });
    }

    /// Register a waiter for the exit status; resolves immediately if the
    /// process has already exited.
    pub fn wait_for_exit(&mut self) -> WaitOutcome {
        match self.exit_status {
            Some(status) => WaitOutcome::AlreadyExited(status),
            None => {
                let (tx, rx) = oneshot::channel();
                self.waiters.push(tx);
                WaitOutcome::Pending(rx)
            }
        }
    }
}

/// The result of registering interest in a terminal's exit.
pub enum WaitOutcome {
    /// The process had already exited; here is its status.
    AlreadyExited(ExitStatus),
    /// The caller must await this receiver.
    Pending(oneshot::Receiver<ExitStatus>),
}
