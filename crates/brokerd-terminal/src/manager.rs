//! The managed terminal pool (spec §4.4).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{TerminalError, TerminalResult};
use crate::terminal::{ExitStatus, Terminal, TerminalSpec, WaitOutcome};

/// How long `kill` waits after SIGTERM before escalating to SIGKILL.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

struct Entry {
    terminal: Terminal,
    child: Option<Child>,
}

/// The output and status snapshot returned by `output`.
#[derive(Debug, Clone)]
pub struct TerminalOutput {
    /// Combined stdout+stderr bytes observed so far.
    pub data: Vec<u8>,
    /// Whether the byte cap cut the buffer short.
    pub truncated: bool,
    /// The exit status, if the process has exited.
    pub exit_status: Option<ExitStatus>,
}

struct Pool {
    entries: Mutex<HashMap<String, Entry>>,
    next_id: AtomicU64,
}

/// Owns every spawned terminal for one session (spec §4.4).
///
/// Ids are dense monotonic strings ("0", "1", "2", ...), minted in
/// creation order and never reused within a pool's lifetime.
#[derive(Clone)]
pub struct TerminalManager {
    inner: Arc<Pool>,
}

impl Default for TerminalManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalManager {
    /// Construct an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Pool { entries: Mutex::new(HashMap::new()), next_id: AtomicU64::new(0) }) }
    }

    /// Spawn a shell-interpreted child and register it under a freshly
    /// minted id (spec §4.4 `create`).
    #[tracing::instrument(skip(self, spec), fields(terminal_id))]
    pub async fn create(&self, spec: TerminalSpec) -> TerminalResult<String> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        tracing::Span::current().record("terminal_id", &id.as_str());

        let mut command = Command::new("sh");
        command.arg("-c").arg(&spec.command);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut terminal = Terminal::new(spec.output_byte_limit);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                tracing::warn!(terminal_id = %id, %error, "terminal spawn failed");
                terminal.mark_spawn_failed(&error.to_string());
                self.inner.entries.lock().await.insert(id.clone(), Entry { terminal, child: None });
                return Ok(id);
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        self.inner.entries.lock().await.insert(id.clone(), Entry { terminal, child: Some(child) });

        let pool = Arc::clone(&self.inner);
        let task_id = id.clone();
        tokio::spawn(async move {
            run_terminal(pool, task_id, stdout, stderr).await;
        });

        Ok(id)
    }

    /// Return the current output buffer, truncation flag, and exit status
    /// (spec §4.4 `output`).
    pub async fn output(&self, id: &str) -> TerminalResult<TerminalOutput> {
        let entries = self.inner.entries.lock().await;
        let entry = entries.get(id).ok_or_else(|| TerminalError::NotFound { id: id.to_string() })?;
        Ok(TerminalOutput {
            data: entry.terminal.buffer.clone(),
            truncated: entry.terminal.truncated,
            exit_status: entry.terminal.exit_status,
        })
    }

    /// Send SIGTERM, escalating to SIGKILL after [`KILL_GRACE_PERIOD`]
    /// (spec §4.4 `kill`).
    #[tracing::instrument(skip(self))]
    pub async fn kill(&self, id: &str) -> TerminalResult<()> {
        let pid = {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries.get_mut(id).ok_or_else(|| TerminalError::NotFound { id: id.to_string() })?;
            if entry.terminal.exited {
                return Ok(());
            }
            entry.child.as_ref().and_then(tokio::process::Child::id)
        };

        let Some(pid) = pid else { return Ok(()) };
        send_signal(pid, SIGTERM);

        let pool = Arc::clone(&self.inner);
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE_PERIOD).await;
            let still_running = {
                let entries = pool.entries.lock().await;
                entries.get(&id).is_some_and(|entry| !entry.terminal.exited)
            };
            if still_running {
                tracing::info!(terminal_id = %id, "escalating to SIGKILL after grace period");
                send_signal(pid, SIGKILL);
            }
        });

        Ok(())
    }

    /// Resolve when the process has exited, immediately if it already has
    /// (spec §4.4 `wait_for_exit`).
    pub async fn wait_for_exit(&self, id: &str) -> TerminalResult<ExitStatus> {
        let outcome = {
            let mut entries = self.inner.entries.lock().await;
            let entry = entries.get_mut(id).ok_or_else(|| TerminalError::NotFound { id: id.to_string() })?;
            entry.terminal.wait_for_exit()
        };
        match outcome {
            WaitOutcome::AlreadyExited(status) => Ok(status),
            WaitOutcome::Pending(rx) => Ok(rx.await.unwrap_or(ExitStatus { exit_code: -1, signal: None })),
        }
    }

    /// Kill if still running and forget the record; subsequent references
    /// fail with [`TerminalError::NotFound`] (spec §4.4 `release`).
    pub async fn release(&self, id: &str) -> TerminalResult<()> {
        self.kill(id).await.ok();
        let mut entries = self.inner.entries.lock().await;
        entries.remove(id).ok_or_else(|| TerminalError::NotFound { id: id.to_string() })?;
        Ok(())
    }

    /// Kill every still-running terminal in the pool, used when the
    /// owning session terminates (spec §4.2: "kills all managed
    /// terminals").
    pub async fn kill_all(&self) {
        let ids: Vec<String> = self.inner.entries.lock().await.keys().cloned().collect();
        for id in ids {
            let _ = self.kill(&id).await;
        }
    }
}

/// Drain stdout and stderr to the shared buffer, then record the exit
/// status once the child terminates.
async fn run_terminal(
    pool: Arc<Pool>,
    id: String,
    mut stdout: Option<tokio::process::ChildStdout>,
    mut stderr: Option<tokio::process::ChildStderr>,
) {
    let mut stdout_buf = [0_u8; 4096];
    let mut stderr_buf = [0_u8; 4096];

    loop {
        if stdout.is_none() && stderr.is_none() {
            break;
        }
        tokio::select! {
            result = read_chunk(stdout.as_mut(), &mut stdout_buf), if stdout.is_some() => {
                match result {
                    Some(n) if n > 0 => append(&pool, &id, &stdout_buf[..n]).await,
                    _ => stdout = None,
                }
            }
            result = read_chunk(stderr.as_mut(), &mut stderr_buf), if stderr.is_some() => {
                match result {
                    Some(n) if n > 0 => append(&pool, &id, &stderr_buf[..n]).await,
                    _ => stderr = None,
                }
            }
        }
    }

    let entry = pool.entries.lock().await.remove(&id);
    if let Some(mut entry) = entry {
        let status = match &mut entry.child {
            Some(child) => child.wait().await.ok(),
            None => None,
        };
        let status = status.map_or(ExitStatus { exit_code: -1, signal: None }, |status| ExitStatus {
            exit_code: status.code().unwrap_or(-1),
            signal: unix_signal(&status),
        });
        entry.terminal.mark_exited(status);
        pool.entries.lock().await.insert(id, entry);
    }
}

async fn read_chunk(stream: Option<&mut (impl tokio::io::AsyncRead + Unpin)>, buf: &mut [u8]) -> Option<usize> {
    match stream {
        Some(s) => s.read(buf).await.ok(),
        None => None,
    }
}

async fn append(pool: &Arc<Pool>, id: &str, chunk: &[u8]) {
    let mut entries = pool.entries.lock().await;
    if let Some(entry) = entries.get_mut(id) {
        entry.terminal.append_output(chunk);
    }
}

fn unix_signal(status: &std::process::ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        std::os::unix::process::ExitStatusExt::signal(status)
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}

#[cfg(unix)]
const SIGTERM: i32 = nix::sys::signal::Signal::SIGTERM as i32;
#[cfg(unix)]
const SIGKILL: i32 = nix::sys::signal::Signal::SIGKILL as i32;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;
#[cfg(not(unix))]
const SIGKILL: i32 = 9;

#[cfg(unix)]
fn send_signal(pid: u32, signal: i32) {
    let Ok(signal) = nix::sys::signal::Signal::try_from(signal) else { return };
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal);
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: i32) {}
