// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Interrupt / Suspend Controller (C11).
//!
//! Invoked from the token callback while a stream is in flight. Performs a
//! zero-timeout poll on stdin and feeds whatever bytes are available
//! through a small state machine: Ctrl-Z requests a suspend, two ESC bytes
//! within [`DOUBLE_ESC_WINDOW_MS`] raise [`PollOutcome::StreamInterrupted`].

use std::time::{Duration, Instant};

/// Window within which a second ESC must arrive to count as "double-ESC".
pub const DOUBLE_ESC_WINDOW_MS: u64 = 1200;

const ESC: u8 = 0x1B;
const CTRL_Z: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing of note happened.
    Continue,
    /// First ESC seen — show the one-time hint ("press Esc again to stop").
    HintFirstEsc,
    /// Second ESC arrived inside the window: abort the stream.
    StreamInterrupted,
}

/// Tracks ESC/Ctrl-Z state across repeated polls during one stream.
#[derive(Debug, Default)]
pub struct InterruptController {
    esc_count: u32,
    first_esc_at: Option<Instant>,
    suspend_requested: bool,
    hint_shown: bool,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend_requested(&self) -> bool {
        self.suspend_requested
    }

    /// Reset all state; call at the start of every new stream.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Feed freshly-read stdin bytes through the state machine. The caller
    /// is responsible for actually obtaining those bytes via a zero-timeout
    /// poll ([`poll_stdin_nonblocking`] on unix).
    pub fn observe_bytes(&mut self, bytes: &[u8]) -> PollOutcome {
        let mut outcome = PollOutcome::Continue;
        for &b in bytes {
            match b {
                CTRL_Z => self.suspend_requested = true,
                ESC => {
                    let now = Instant::now();
                    let within_window = self
                        .first_esc_at
                        .is_some_and(|at| now.duration_since(at) <= Duration::from_millis(DOUBLE_ESC_WINDOW_MS));
                    if within_window {
                        self.esc_count += 1;
                        if self.esc_count >= 2 {
                            return PollOutcome::StreamInterrupted;
                        }
                    } else {
                        self.first_esc_at = Some(now);
                        self.esc_count = 1;
                        if !self.hint_shown {
                            self.hint_shown = true;
                            outcome = PollOutcome::HintFirstEsc;
                        }
                    }
                }
                _ => {
                    self.esc_count = 0;
                    self.first_esc_at = None;
                }
            }
        }
        outcome
    }
}

/// The in-flight assistant message text appended when a stream is aborted
/// by double-ESC.
pub const INTERRUPT_NOTICE: &str = "[local] Generation interrupted by user (Esc Esc).";

/// Zero-timeout poll of stdin; returns whatever bytes are immediately
/// available without blocking, or an empty vector if none are ready.
#[cfg(unix)]
pub fn poll_stdin_nonblocking() -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let mut fds = [libc::pollfd { fd: 0, events: libc::POLLIN, revents: 0 }];
    let ready = unsafe { libc::poll(fds.as_mut_ptr(), 1, 0) };
    if ready <= 0 || fds[0].revents & libc::POLLIN == 0 {
        return Ok(Vec::new());
    }
    let mut buf = [0u8; 256];
    let n = std::io::stdin().read(&mut buf)?;
    Ok(buf[..n].to_vec())
}

#[cfg(not(unix))]
pub fn poll_stdin_nonblocking() -> std::io::Result<Vec<u8>> {
    Ok(Vec::new())
}
