// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Headless-mode observer events: an observer callback receives typed
//! events for token, tool_call, tool_result and final.
//!
//! In interactive mode the TUI renders the conversation directly and never
//! subscribes to these; they exist for the `zolt run` one-shot path and for
//! any future non-interactive driver.

use zolt_tools::ToolKind;

/// One event in a turn's observer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A streamed text chunk appended to the trailing assistant message.
    Token(String),
    /// A tool call was parsed out of the assistant's completed message and
    /// is about to be dispatched.
    ToolCall { kind: ToolKind, payload: String },
    /// The tool finished; `result` is the full `[NAME-result]` envelope text.
    ToolResult { kind: ToolKind, result: String },
    /// The turn is over. `text` is the final user-facing (or fallback)
    /// assistant message.
    Final { text: String },
}
