// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Compaction engine (C9): detect a low-context condition, summarise older
//! history, and rewrite the conversation while preserving the recent tail
//! and any pinned workspace-context message.

use crate::extract::is_tool_call;
use crate::session::{Conversation, Message, Role, TokenUsage};

/// Number of trailing messages never touched by compaction.
pub const KEEP_RECENT: usize = 8;
/// Minimum number of eligible source messages required to trigger compaction.
pub const COMPACTION_SOURCE_MIN: usize = 4;

pub const COMPACT_SYSTEM_PROMPT: &str = "\
You are a context compaction assistant. Summarise the conversation history \
below. Preserve user goals, constraints, decisions, and unresolved \
questions and pending tasks. Do not call any tools. Respond with short \
bullet points only.";

pub const COMPACT_USER_PROMPT: &str =
    "Summarise the conversation above per the instructions you were given.";

/// How a compaction was triggered; recorded in the `[compact]` note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionTrigger {
    Manual,
    Auto,
}

impl CompactionTrigger {
    fn label(self) -> &'static str {
        match self {
            CompactionTrigger::Manual => "manual",
            CompactionTrigger::Auto => "auto",
        }
    }
}

/// Whether the summary came from the model or the deterministic fallback;
/// recorded in the `[compact]` note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Model,
    LocalFallback,
}

impl SummaryKind {
    fn label(self) -> &'static str {
        match self {
            SummaryKind::Model => "model",
            SummaryKind::LocalFallback => "local fallback",
        }
    }
}

const AGENTS_CONTEXT_MARKER: &str = "[agents-context]";
const COMPACT_MARKER: &str = "[compact]";
const COMPACT_SUMMARY_MARKER: &str = "[compact-summary]";

/// `true` when the message count alone rules out compaction.
pub fn below_keep_recent(messages: &[Message]) -> bool {
    messages.len() <= KEEP_RECENT
}

/// A message eligible to feed the summary: non-empty, not itself a compaction
/// marker, and not a tool-call/audit message.
fn is_compaction_source(msg: &Message) -> bool {
    if msg.content.trim().is_empty() {
        return false;
    }
    if msg.content.starts_with(COMPACT_MARKER) || msg.content.starts_with(COMPACT_SUMMARY_MARKER) {
        return false;
    }
    if matches!(msg.role, Role::User | Role::Assistant) && is_tool_call(&msg.content) {
        return false;
    }
    matches!(msg.role, Role::User | Role::Assistant)
}

/// Build the `head`/`tail` partition and the filtered source slice, or
/// `None` if compaction should not run (steps 1-3).
fn plan(messages: &[Message]) -> Option<(Vec<Message>, Vec<Message>)> {
    if below_keep_recent(messages) {
        return None;
    }
    let split = messages.len() - KEEP_RECENT;
    let head = &messages[..split];
    let tail = &messages[split..];
    let sources: Vec<Message> = head.iter().filter(|m| is_compaction_source(m)).cloned().collect();
    if sources.len() < COMPACTION_SOURCE_MIN {
        return None;
    }
    Some((sources, tail.to_vec()))
}

/// Render up to the 8 most recent source messages as a local fallback
/// summary, used when no model-assisted summary is available.
pub fn local_fallback_summary(sources: &[Message]) -> String {
    let recent = if sources.len() > 8 { &sources[sources.len() - 8..] } else { sources };
    let bullets: Vec<String> = recent
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("- {role}: {}", preview_trim(&m.content, 200))
        })
        .collect();
    format!("Local fallback summary:\n{}", bullets.join("\n"))
}

/// Normalize whitespace, drop control characters, collapse runs, and cap at
/// `max_chars` printable characters, appending `…` if truncated.
fn preview_trim(text: &str, max_chars: usize) -> String {
    let mut normalized = String::new();
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        if ch.is_whitespace() {
            if !last_was_space {
                normalized.push(' ');
            }
            last_was_space = true;
        } else {
            normalized.push(ch);
            last_was_space = false;
        }
    }
    let trimmed = normalized.trim();
    let char_count = trimmed.chars().count();
    if char_count <= max_chars {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// Rewrite `conversation` in place using a pre-computed `summary`.
///
/// Returns `false` without modifying anything if compaction does not apply
/// (message count too low, or too few eligible source messages).
pub fn apply_compaction(
    conversation: &mut Conversation,
    summary: &str,
    trigger: CompactionTrigger,
    kind: SummaryKind,
    now_ms: i64,
) -> bool {
    let Some((_sources, tail)) = plan(&conversation.messages) else {
        return false;
    };

    let pinned_context = conversation
        .messages
        .first()
        .filter(|m| m.role == Role::System && m.content.starts_with(AGENTS_CONTEXT_MARKER))
        .cloned();

    let mut rewritten = Vec::new();
    if let Some(pinned) = pinned_context {
        rewritten.push(pinned);
    }
    rewritten.push(Message::system(
        format!("{COMPACT_MARKER} ({}) ... ({} summary)", trigger.label(), kind.label()),
        now_ms,
    ));
    rewritten.push(Message::system(format!("{COMPACT_SUMMARY_MARKER}\n{summary}"), now_ms));
    rewritten.extend(tail);

    conversation.messages = rewritten;
    conversation.last_token_usage = TokenUsage::default();
    conversation.updated_ms = now_ms;
    true
}

/// Full compaction pipeline given an already-produced model summary (the
/// caller is responsible for actually streaming the model request using
/// [`COMPACT_SYSTEM_PROMPT`]/[`COMPACT_USER_PROMPT`] against the filtered
/// source messages from [`compaction_sources`]).
pub fn compact_with_model_summary(
    conversation: &mut Conversation,
    model_summary: Option<&str>,
    trigger: CompactionTrigger,
    now_ms: i64,
) -> bool {
    let Some((sources, _tail)) = plan(&conversation.messages) else {
        return false;
    };
    match model_summary.map(str::trim).filter(|s| !s.is_empty()) {
        Some(summary) => apply_compaction(conversation, summary, trigger, SummaryKind::Model, now_ms),
        None => {
            let fallback = local_fallback_summary(&sources);
            apply_compaction(conversation, &fallback, trigger, SummaryKind::LocalFallback, now_ms)
        }
    }
}

/// The filtered source messages a model-assisted compaction request would
/// be built from, or `None` if compaction does not apply yet.
pub fn compaction_sources(messages: &[Message]) -> Option<Vec<Message>> {
    plan(messages).map(|(sources, _)| sources)
}
