// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The persisted data model: [`Conversation`], [`Message`], [`TokenUsage`],
//! and the top-level [`AppState`] document.
//!
//! This is deliberately independent of [`zolt_model::Message`] — that type is
//! the wire-format shape exchanged with a provider during a single request;
//! this one is the append-only log that survives across sessions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A role in the persisted conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in a [`Conversation`]'s message log.
///
/// Append-only, except that the trailing streaming assistant message is
/// grown token-by-token, and [`crate::compact`] replaces the whole vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// UTF-8 text. May be empty while a stream is in flight.
    pub content: String,
    pub timestamp_ms: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self { role, content: content.into(), timestamp_ms }
    }

    pub fn user(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self::new(Role::User, content, timestamp_ms)
    }

    pub fn assistant(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self::new(Role::Assistant, content, timestamp_ms)
    }

    pub fn system(content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self::new(Role::System, content, timestamp_ms)
    }
}

/// Five-counter token accounting for a single turn or a conversation total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub cached_input: u64,
    pub output: u64,
    pub reasoning_output: u64,
    pub total: u64,
}

impl TokenUsage {
    /// Reserved baseline subtracted from the context window before computing
    /// a percentage-remaining figure.
    pub const WINDOW_BASELINE: u64 = 12_000;

    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.cached_input += other.cached_input;
        self.output += other.output;
        self.reasoning_output += other.reasoning_output;
        self.total += other.total;
    }

    /// `max(0, input - cached) + max(0, output)`.
    pub fn blended(&self) -> u64 {
        self.input.saturating_sub(self.cached_input) + self.output
    }

    /// Percent of the context window remaining, clamped to `[0, 100]`.
    ///
    /// Returns `0` whenever `window <= WINDOW_BASELINE`. Otherwise computed
    /// against `window - WINDOW_BASELINE` usable tokens.
    pub fn percent_of_window_remaining(&self, window: u64) -> u8 {
        if window <= Self::WINDOW_BASELINE {
            return 0;
        }
        let usable = window - Self::WINDOW_BASELINE;
        let used = self.blended().min(usable);
        let remaining_fraction = (usable - used) as f64 / usable as f64;
        (remaining_fraction * 100.0).clamp(0.0, 100.0).round() as u8
    }
}

/// One saved conversation: an ordered message log plus token accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// 16 lowercase hex chars, randomly generated.
    pub id: String,
    pub title: String,
    pub created_ms: i64,
    pub updated_ms: i64,
    pub messages: Vec<Message>,
    pub last_token_usage: TokenUsage,
    pub total_token_usage: TokenUsage,
    pub model_context_window: Option<u64>,
}

/// Placeholder title assigned to a freshly created conversation. Recognised
/// by the auto-title step so it is only ever derived once.
pub const DEFAULT_TITLE: &str = "New conversation";

impl Conversation {
    pub fn new(now_ms: i64) -> Self {
        Self {
            id: generate_id(),
            title: DEFAULT_TITLE.to_string(),
            created_ms: now_ms,
            updated_ms: now_ms,
            messages: Vec::new(),
            last_token_usage: TokenUsage::default(),
            total_token_usage: TokenUsage::default(),
            model_context_window: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }

    pub fn push(&mut self, msg: Message, now_ms: i64) {
        self.messages.push(msg);
        self.updated_ms = now_ms;
    }

    /// Apply a turn's usage: it becomes the last-turn figure and accumulates
    /// into the conversation total.
    pub fn record_usage(&mut self, turn: TokenUsage) {
        self.last_token_usage = turn;
        self.total_token_usage.add(&turn);
    }

    /// Percent of context window remaining, based on the last turn's usage.
    pub fn percent_context_remaining(&self) -> u8 {
        match self.model_context_window {
            Some(w) => self.last_token_usage.percent_of_window_remaining(w),
            None => 100,
        }
    }
}

/// 16 lowercase hex chars taken from a fresh v4 UUID.
fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

/// The full persisted document (`state.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    pub version: u32,
    pub current_conversation_id: String,
    pub selected_provider_id: String,
    pub selected_model_id: String,
    pub conversations: Vec<Conversation>,
}

const STATE_VERSION: u32 = 1;

impl AppState {
    pub fn new_with_conversation(
        now_ms: i64,
        selected_provider_id: impl Into<String>,
        selected_model_id: impl Into<String>,
    ) -> Self {
        let conv = Conversation::new(now_ms);
        let id = conv.id.clone();
        Self {
            version: STATE_VERSION,
            current_conversation_id: id,
            selected_provider_id: selected_provider_id.into(),
            selected_model_id: selected_model_id.into(),
            conversations: vec![conv],
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.conversations
            .iter()
            .position(|c| c.id == self.current_conversation_id)
    }

    pub fn current(&self) -> Option<&Conversation> {
        self.current_index().map(|i| &self.conversations[i])
    }

    pub fn current_mut(&mut self) -> Option<&mut Conversation> {
        let i = self.current_index()?;
        Some(&mut self.conversations[i])
    }

    /// Select a conversation by id. Returns `false` if not found, leaving the
    /// current selection unchanged.
    pub fn select(&mut self, id: &str) -> bool {
        if self.conversations.iter().any(|c| c.id == id) {
            self.current_conversation_id = id.to_string();
            true
        } else {
            false
        }
    }

    pub fn new_conversation(&mut self, now_ms: i64) -> &Conversation {
        let conv = Conversation::new(now_ms);
        self.current_conversation_id = conv.id.clone();
        self.conversations.push(conv);
        self.conversations.last().unwrap()
    }

    /// Load `path`, creating a fresh single-conversation document if the file
    /// does not exist yet. Guarantees at least one conversation exists and
    /// that `current_conversation_id` always resolves afterwards.
    pub fn load_or_create(
        path: &Path,
        now_ms: i64,
        default_provider: impl Into<String>,
        default_model: impl Into<String>,
    ) -> io::Result<Self> {
        match fs::read(path) {
            Ok(bytes) => {
                let mut state: AppState = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                if state.conversations.is_empty() {
                    state.conversations.push(Conversation::new(now_ms));
                    state.current_conversation_id = state.conversations[0].id.clone();
                } else if state.current_index().is_none() {
                    state.current_conversation_id = state.conversations[0].id.clone();
                }
                Ok(state)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(Self::new_with_conversation(now_ms, default_provider, default_model))
            }
            Err(e) => Err(e),
        }
    }

    /// Truncate + write + close. No strict atomic-rename requirement.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, bytes)
    }
}

/// Resolve the default state-file path under the platform data dir, falling
/// back to a workspace-local `.zolt-ai` directory if that is not writable.
pub fn default_state_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("zolt");
        if fs::create_dir_all(&dir).is_ok() {
            return dir.join("state.json");
        }
    }
    PathBuf::from(".zolt-ai").join("state.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TokenUsage ────────────────────────────────────────────────────────

    #[test]
    fn blended_subtracts_cached_input() {
        let u = TokenUsage { input: 100, cached_input: 40, output: 10, reasoning_output: 0, total: 0 };
        assert_eq!(u.blended(), 70);
    }

    #[test]
    fn percent_remaining_zero_when_window_at_or_below_baseline() {
        let u = TokenUsage::default();
        assert_eq!(u.percent_of_window_remaining(12_000), 0);
        assert_eq!(u.percent_of_window_remaining(5_000), 0);
    }

    #[test]
    fn percent_remaining_is_100_when_no_usage() {
        let u = TokenUsage::default();
        assert_eq!(u.percent_of_window_remaining(112_000), 100);
    }

    #[test]
    fn percent_remaining_is_clamped_and_monotonic() {
        let window = 112_000u64; // 100_000 usable
        let low = TokenUsage { input: 1000, cached_input: 0, output: 0, reasoning_output: 0, total: 0 };
        let high = TokenUsage { input: 90_000, cached_input: 0, output: 0, reasoning_output: 0, total: 0 };
        let p_low = low.percent_of_window_remaining(window);
        let p_high = high.percent_of_window_remaining(window);
        assert!(p_low <= 100 && p_high <= 100);
        assert!(p_high <= p_low, "more usage must not increase remaining percent");
    }

    #[test]
    fn percent_remaining_never_underflows_past_full_usage() {
        let window = 20_000u64;
        let huge = TokenUsage { input: 1_000_000, cached_input: 0, output: 0, reasoning_output: 0, total: 0 };
        assert_eq!(huge.percent_of_window_remaining(window), 0);
    }

    // ── Conversation ────────────────────────────────────────────────────────

    #[test]
    fn new_conversation_has_16_hex_char_id() {
        let c = Conversation::new(0);
        assert_eq!(c.id.len(), 16);
        assert!(c.id.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn new_conversation_ids_are_unique() {
        let a = Conversation::new(0);
        let b = Conversation::new(0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn new_conversation_has_default_title_and_is_empty() {
        let c = Conversation::new(1000);
        assert!(c.has_default_title());
        assert!(c.is_empty());
    }

    #[test]
    fn push_updates_timestamp() {
        let mut c = Conversation::new(0);
        c.push(Message::user("hi", 5), 5);
        assert_eq!(c.updated_ms, 5);
        assert_eq!(c.messages.len(), 1);
    }

    #[test]
    fn record_usage_accumulates_cumulative_but_replaces_last() {
        let mut c = Conversation::new(0);
        c.record_usage(TokenUsage { input: 10, cached_input: 0, output: 5, reasoning_output: 0, total: 15 });
        c.record_usage(TokenUsage { input: 20, cached_input: 0, output: 5, reasoning_output: 0, total: 25 });
        assert_eq!(c.last_token_usage.total, 25);
        assert_eq!(c.total_token_usage.total, 40);
    }

    // ── AppState round trip ─────────────────────────────────────────────────

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = AppState::new_with_conversation(0, "openai", "gpt-4o");
        state
            .current_mut()
            .unwrap()
            .push(Message::user("hello", 1), 1);
        state.save(&path).unwrap();

        let loaded = AppState::load_or_create(&path, 0, "openai", "gpt-4o").unwrap();
        assert_eq!(loaded.conversations.len(), 1);
        assert_eq!(loaded.current_conversation_id, state.current_conversation_id);
        assert_eq!(loaded.conversations[0].messages.len(), 1);
        assert_eq!(loaded.selected_provider_id, "openai");
    }

    #[test]
    fn load_or_create_builds_fresh_state_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist").join("state.json");
        let state = AppState::load_or_create(&path, 1234, "openai", "gpt-4o").unwrap();
        assert_eq!(state.conversations.len(), 1);
        assert!(state.current().is_some());
    }

    #[test]
    fn select_unknown_id_returns_false_and_leaves_current_unchanged() {
        let mut state = AppState::new_with_conversation(0, "openai", "gpt-4o");
        let original = state.current_conversation_id.clone();
        assert!(!state.select("0000000000000000"));
        assert_eq!(state.current_conversation_id, original);
    }

    #[test]
    fn new_conversation_becomes_current() {
        let mut state = AppState::new_with_conversation(0, "openai", "gpt-4o");
        let first_id = state.current_conversation_id.clone();
        let second = state.new_conversation(10).id.clone();
        assert_ne!(first_id, second);
        assert_eq!(state.current_conversation_id, second);
        assert_eq!(state.conversations.len(), 2);
    }
}
