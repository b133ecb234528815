// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Long-lived shell sessions (C4): spawn-once, poll-drain, capacity eviction.
//!
//! Pipes are drained with short, bounded polls rather than blocking reads so
//! a single turn never stalls waiting on a child that produces no output.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Output cap per stream, per drain call.
pub const STREAM_CAP_BYTES: usize = 24 * 1024;
/// Maximum number of live sessions before eviction kicks in.
pub const MAX_SESSIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTerm {
    Exited(i32),
    Signaled(i32),
    Stopped(i32),
    Unknown,
}

impl std::fmt::Display for ExitTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitTerm::Exited(c) => write!(f, "exited:{c}"),
            ExitTerm::Signaled(s) => write!(f, "signal:{s}"),
            ExitTerm::Stopped(s) => write!(f, "stopped:{s}"),
            ExitTerm::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(unix)]
fn classify(status: ExitStatus) -> ExitTerm {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        ExitTerm::Exited(code)
    } else if let Some(sig) = status.signal() {
        ExitTerm::Signaled(sig)
    } else {
        // waitpid(WNOHANG) without WUNTRACED never reports a stopped child;
        // the variant exists for completeness but is never constructed here.
        ExitTerm::Unknown
    }
}

#[cfg(not(unix))]
fn classify(status: ExitStatus) -> ExitTerm {
    status.code().map(ExitTerm::Exited).unwrap_or(ExitTerm::Unknown)
}

pub struct CommandSession {
    pub id: u64,
    pub command: String,
    child: Child,
    pub finished: bool,
    pub exit: Option<ExitTerm>,
    pub output_limited_stdout: bool,
    pub output_limited_stderr: bool,
}

/// Result of a single drain pass over a session's stdout/stderr.
pub struct DrainResult {
    pub stdout: String,
    pub stderr: String,
    pub status: String,
}

impl CommandSession {
    fn spawn(id: u64, cmd: &str) -> std::io::Result<Self> {
        let child = Command::new("bash")
            .arg("-lc")
            .arg(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(Self {
            id,
            command: cmd.to_string(),
            child,
            finished: false,
            exit: None,
            output_limited_stdout: false,
            output_limited_stderr: false,
        })
    }

    /// Non-blocking reap: updates `finished`/`exit` if the child has exited.
    fn refresh_status(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(Some(status)) = self.child.try_wait() {
            self.finished = true;
            self.exit = Some(classify(status));
        }
    }

    fn status_text(&self) -> String {
        match self.exit {
            Some(term) => term.to_string(),
            None => "running".to_string(),
        }
    }

    /// Drain stdout and stderr for at most `yield_ms`, in 200ms slices.
    async fn drain(&mut self, yield_ms: u64) -> DrainResult {
        let deadline = Instant::now() + Duration::from_millis(yield_ms);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        loop {
            self.refresh_status();
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(Duration::from_millis(200));

            let mut chunk = [0u8; 2048];
            let mut made_progress = false;

            if stdout_buf.len() < STREAM_CAP_BYTES {
                if let Some(out) = self.child.stdout.as_mut() {
                    if let Ok(Ok(n)) =
                        tokio::time::timeout(slice, out.read(&mut chunk)).await
                    {
                        if n > 0 {
                            made_progress = true;
                            let room = STREAM_CAP_BYTES.saturating_sub(stdout_buf.len());
                            if n > room {
                                self.output_limited_stdout = true;
                            }
                            stdout_buf.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            }
            if stderr_buf.len() < STREAM_CAP_BYTES {
                if let Some(err) = self.child.stderr.as_mut() {
                    if let Ok(Ok(n)) =
                        tokio::time::timeout(Duration::from_millis(20), err.read(&mut chunk)).await
                    {
                        if n > 0 {
                            made_progress = true;
                            let room = STREAM_CAP_BYTES.saturating_sub(stderr_buf.len());
                            if n > room {
                                self.output_limited_stderr = true;
                            }
                            stderr_buf.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            }

            if self.finished && !made_progress {
                break;
            }
        }

        self.refresh_status();
        DrainResult {
            stdout: String::from_utf8_lossy(&stdout_buf).to_string(),
            stderr: String::from_utf8_lossy(&stderr_buf).to_string(),
            status: self.status_text(),
        }
    }

    async fn write_stdin(&mut self, data: &str) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        match self.child.stdin.as_mut() {
            Some(stdin) => stdin.write_all(data.as_bytes()).await,
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin closed",
            )),
        }
    }

    async fn kill(&mut self) {
        let _ = self.child.kill().await;
        self.finished = true;
        if self.exit.is_none() {
            self.exit = Some(ExitTerm::Signaled(9));
        }
    }
}

/// Owns all live shell sessions. Nothing outside this type may touch child fds.
#[derive(Default)]
pub struct SessionManager {
    sessions: Vec<CommandSession>,
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            next_id: 1,
        }
    }

    /// Sweep finished sessions first; if still at capacity, kill the oldest.
    async fn evict_if_needed(&mut self) {
        if self.sessions.len() < MAX_SESSIONS {
            return;
        }
        for s in self.sessions.iter_mut() {
            s.refresh_status();
        }
        self.sessions.retain(|s| !s.finished);
        if self.sessions.len() >= MAX_SESSIONS && !self.sessions.is_empty() {
            let mut oldest = self.sessions.remove(0);
            oldest.kill().await;
        }
    }

    pub async fn spawn(&mut self, cmd: &str, yield_ms: u64) -> std::io::Result<(u64, DrainResult)> {
        self.evict_if_needed().await;
        let id = self.next_id;
        self.next_id += 1;
        let mut session = CommandSession::spawn(id, cmd)?;
        let result = session.drain(yield_ms).await;
        self.sessions.push(session);
        Ok((id, result))
    }

    pub async fn write_stdin(
        &mut self,
        id: u64,
        data: &str,
        yield_ms: u64,
    ) -> Result<DrainResult, String> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| format!("unknown session id: {id}"))?;
        session
            .write_stdin(data)
            .await
            .map_err(|e| format!("stdin write failed: {e}"))?;
        Ok(session.drain(yield_ms).await)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
