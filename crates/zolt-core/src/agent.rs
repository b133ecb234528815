// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Agent Orchestrator (C10): the turn procedure that drives one user
//! prompt through context injection, a model stream, an inline tool-call
//! loop, and persistence.
//!
//! This module deliberately has no concept of native function-calling: the
//! model is always asked with an empty tool schema (see [`crate::prompts`])
//! and tool calls are recovered from its completed text by
//! [`crate::extract::find_tool_call`]. Everything else — interrupts,
//! compaction, credential resolution — is delegated to the sibling modules
//! and composed here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use tokio::sync::Mutex as AsyncMutex;

use zolt_config::Config;
use zolt_model::{CompletionRequest, Message as ModelMessage, ResponseEvent};
use zolt_tools::{dispatch, SessionManager, SkillInfo, ToolContext, ToolKind, VisionConfig};

use crate::compact::{
    compact_with_model_summary, compaction_sources, CompactionTrigger, COMPACT_SYSTEM_PROMPT,
    COMPACT_USER_PROMPT,
};
use crate::events::AgentEvent;
use crate::extract::{audit_line, find_tool_call, is_tool_call};
use crate::inject::{agents_context_message, default_skill_roots, enrich_prompt, skills_context_message};
use crate::prompts::system_prompt;
use crate::session::{AppState, Conversation, Message, Role, TokenUsage};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Why the tool loop stopped without a normal, tool-call-free answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardReason {
    /// The model stopped calling tools on its own.
    None,
    /// The same (tool, payload, result) triple was seen twice in this turn.
    RepeatedToolCall,
    /// `max_tool_rounds` was reached and a tool call was still pending.
    MaxIterations,
}

impl GuardReason {
    fn label(self) -> &'static str {
        match self {
            GuardReason::None => "completed",
            GuardReason::RepeatedToolCall => "repeated_tool_call",
            GuardReason::MaxIterations => "max_iterations",
        }
    }
}

enum StreamOnceOutcome {
    Completed,
    Interrupted,
    Failed(String),
}

enum DrainOutcome {
    Done(TokenUsage),
    Interrupted,
    Error(anyhow::Error),
}

/// Classification of a stream-level failure, adapted to the
/// error text real drivers actually produce (`"{driver} error {status}:
/// {text}"`) rather than the literal `status=TAG body=PREVIEW` form the
/// wire protocol description uses — see DESIGN.md.
struct StreamFailureInfo {
    code: String,
    message: String,
    retryable: bool,
    context_related: bool,
}

fn is_context_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    let has_context_keyword =
        lower.contains("context") && (lower.contains("length") || lower.contains("window") || lower.contains("token"));
    has_context_keyword
        || lower.contains("maximum context length")
        || lower.contains("context window")
        || lower.contains("too many tokens")
        || lower.contains("prompt is too long")
}

fn classify_stream_failure(raw: &str) -> StreamFailureInfo {
    let context_related = is_context_related(raw);

    if let Some(after) = raw.split(" error ").nth(1) {
        if let Some((status_str, _rest)) = after.split_once(':') {
            if let Ok(status) = status_str.trim().parse::<u16>() {
                let retryable = matches!(status, 408 | 409 | 429 | 502 | 503 | 504) || context_related;
                return StreamFailureInfo {
                    code: status.to_string(),
                    message: raw.to_string(),
                    retryable,
                    context_related,
                };
            }
        }
    }

    let lower = raw.to_lowercase();
    let retryable = ["timedout", "timeout", "connection", "network", "brokenpipe", "wouldblock"]
        .iter()
        .any(|k| lower.contains(k))
        || context_related;
    StreamFailureInfo { code: raw.to_string(), message: raw.to_string(), retryable, context_related }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max).collect();
        t.push('…');
        t
    }
}

/// First meaningful (non-empty, non-header) line of a tool result, reduced
/// to a one-line summary for fallback synthesis.
fn summarize_result(result: &str) -> String {
    let first_meaningful = result
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !(l.starts_with('[') && l.ends_with(']')));
    let Some(line) = first_meaningful else {
        return "no output".to_string();
    };
    let (prefix, body) = if let Some(rest) = line.strip_prefix("state:") {
        ("state:", rest.trim())
    } else if let Some(rest) = line.strip_prefix("error:") {
        ("error:", rest.trim())
    } else {
        ("", line)
    };
    format!("{prefix}{}", truncate_chars(body, 120))
}

fn synthesize_fallback(reason: GuardReason, last: Option<&(ToolKind, String)>) -> String {
    match last {
        Some((kind, result)) => format!(
            "I completed `{}`. Last tool result: {}. I stopped further tool calls ({}).",
            audit_line(*kind),
            summarize_result(result),
            reason.label(),
        ),
        None => format!("No user-facing response was produced ({}).", reason.label()),
    }
}

fn missing_credential_hint(provider: &str) -> String {
    match zolt_model::get_driver(provider).and_then(|d| d.default_api_key_env) {
        Some(env) => format!("[local] Missing credentials for provider \"{provider}\" (set {env})."),
        None => format!("[local] Missing credentials for provider \"{provider}\"."),
    }
}

/// Overwrite the trailing assistant message's content, or append one if the
/// conversation somehow doesn't end on one.
fn set_trailing_assistant(conv: &mut Conversation, text: &str, now: i64) {
    if let Some(last) = conv.messages.last_mut() {
        if last.role == Role::Assistant {
            last.content = text.to_string();
            conv.updated_ms = now;
            return;
        }
    }
    conv.push(Message::assistant(text, now), now);
}

fn append_interrupt_notice(conv: &mut Conversation) {
    let now = now_ms();
    if let Some(last) = conv.messages.last_mut() {
        if last.role == Role::Assistant {
            last.content.push_str(crate::interrupt::INTERRUPT_NOTICE);
            conv.updated_ms = now;
            return;
        }
    }
    conv.push(Message::assistant(crate::interrupt::INTERRUPT_NOTICE, now), now);
}

fn to_model_message(m: &Message) -> ModelMessage {
    match m.role {
        Role::User => ModelMessage::user(m.content.clone()),
        Role::Assistant => ModelMessage::assistant(m.content.clone()),
        Role::System => ModelMessage::system(m.content.clone()),
    }
}

/// Drives one conversation's turns: context injection, the model stream,
/// the inline tool-call loop, and persistence.
pub struct Agent {
    config: Config,
    state_path: PathBuf,
    project_root: PathBuf,
    sessions: Arc<AsyncMutex<SessionManager>>,
    skills: Vec<SkillInfo>,
    provider: Arc<dyn zolt_model::ModelProvider>,
    missing_credential_hint: Option<String>,
}

impl Agent {
    pub fn new(config: Config, state_path: PathBuf, project_root: PathBuf) -> anyhow::Result<Self> {
        let provider = Arc::from(Self::build_provider(&config)?);
        let missing_credential_hint = Self::credential_hint(&config);
        let skill_roots = default_skill_roots(Some(&project_root));
        let skills = zolt_tools::discover_skills(&skill_roots);
        Ok(Self {
            config,
            state_path,
            project_root,
            sessions: Arc::new(AsyncMutex::new(SessionManager::new())),
            skills,
            provider,
            missing_credential_hint,
        })
    }

    /// Construct an `Agent` with a pre-built provider (for tests), skipping
    /// credential resolution entirely.
    #[cfg(test)]
    pub(crate) fn with_provider(
        config: Config,
        state_path: PathBuf,
        project_root: PathBuf,
        provider: Arc<dyn zolt_model::ModelProvider>,
    ) -> Self {
        let skill_roots = default_skill_roots(Some(&project_root));
        let skills = zolt_tools::discover_skills(&skill_roots);
        Self {
            config,
            state_path,
            project_root,
            sessions: Arc::new(AsyncMutex::new(SessionManager::new())),
            skills,
            provider,
            missing_credential_hint: None,
        }
    }

    pub fn project_root(&self) -> &PathBuf {
        &self.project_root
    }

    fn tool_context(&self) -> ToolContext {
        let mut ctx = ToolContext::new(self.project_root.clone(), self.sessions.clone());
        ctx.skill_roots = default_skill_roots(Some(&self.project_root));
        ctx.vision = self.vision_config();
        ctx
    }

    /// Vision captioning config for `view-image`: the user-selected model,
    /// then `VISION_MODEL`, then a fixed default, tried in that order.
    fn vision_config(&self) -> Option<VisionConfig> {
        if self.config.model.provider != "openai" {
            return None;
        }
        let resolved = crate::auth::resolve(&self.config.model);
        let api_key = resolved.api_key.or_else(|| self.config.model.api_key.clone())?;
        let api_base = self
            .config
            .model
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let mut model_candidates = vec![self.config.model.name.clone()];
        if let Ok(v) = std::env::var("VISION_MODEL") {
            model_candidates.push(v);
        }
        model_candidates.push("gpt-4o".to_string());
        Some(VisionConfig { api_base, api_key, model_candidates })
    }

    /// Build a `ModelConfig` with credentials folded in from [`crate::auth`],
    /// then construct the provider from it.
    fn build_provider(config: &Config) -> anyhow::Result<Box<dyn zolt_model::ModelProvider>> {
        let resolved = crate::auth::resolve(&config.model);
        let mut effective = config.model.clone();
        if let Some(key) = resolved.api_key {
            effective.api_key = Some(key);
        }
        if let Some(base) = resolved.base_url_override {
            effective.base_url = Some(base);
        }
        zolt_model::from_config(&effective)
    }

    /// `Some(hint)` if the configured provider requires an API key and none
    /// could be resolved.
    fn credential_hint(config: &Config) -> Option<String> {
        let resolved = crate::auth::resolve(&config.model);
        let requires_key = zolt_model::get_driver(&config.model.provider).map(|d| d.requires_api_key).unwrap_or(true);
        if requires_key && resolved.api_key.is_none() {
            Some(missing_credential_hint(&config.model.provider))
        } else {
            None
        }
    }

    fn save(&self, state: &AppState) -> anyhow::Result<()> {
        state.save(&self.state_path).map_err(Into::into)
    }

    /// Run one user turn to completion: context injection, the tool loop,
    /// finalization, and persistence.
    pub async fn run_turn(
        &self,
        state: &mut AppState,
        prompt: &str,
        on_event: &mut dyn FnMut(AgentEvent),
        should_interrupt: &mut dyn FnMut() -> bool,
    ) -> anyhow::Result<String> {
        let prompt = prompt.trim();
        if state.current_index().is_none() {
            anyhow::bail!("no current conversation selected");
        }

        // Step 1: pre-flight compaction.
        self.maybe_preflight_compact(state).await;

        let now = now_ms();
        {
            let conv = state.current_mut().expect("current conversation exists");

            // Step 2: auto-title from the first prompt.
            if conv.is_empty() && conv.has_default_title() {
                let title = normalize_whitespace(prompt);
                if !title.is_empty() {
                    conv.title = title;
                }
            }

            // Step 3: first-turn context injection.
            if conv.is_empty() {
                if let Some(msg) = agents_context_message(&self.project_root) {
                    conv.push(Message::system(msg, now), now);
                }
                if let Some(msg) = skills_context_message(&self.skills) {
                    conv.push(Message::system(msg, now), now);
                }
            }
        }

        // Step 4: per-prompt @path/$skill enrichment.
        let enrichment = enrich_prompt(prompt, &self.project_root, &self.skills);

        // Step 5: append the user message, enrichment, and a trailing empty
        // assistant placeholder that the stream will fill in.
        {
            let conv = state.current_mut().expect("current conversation exists");
            conv.push(Message::user(prompt, now), now);
            if let Some(m) = &enrichment.file_message {
                conv.push(Message::system(m.clone(), now), now);
            }
            if let Some(m) = &enrichment.skill_message {
                conv.push(Message::system(m.clone(), now), now);
            }
            conv.push(Message::assistant(String::new(), now), now);
        }

        // Step 6: short-circuit if credentials are missing for a provider
        // that requires them.
        if let Some(hint) = &self.missing_credential_hint {
            let conv = state.current_mut().expect("current conversation exists");
            set_trailing_assistant(conv, hint, now_ms());
            self.save(state)?;
            on_event(AgentEvent::Final { text: hint.clone() });
            return Ok(hint.clone());
        }

        let provider = self.provider.as_ref();
        let ctx = self.tool_context();

        // Step 7: the tool loop, up to `max_tool_rounds` iterations.
        let max_rounds = self.config.agent.max_tool_rounds.max(1);
        let mut compacted_this_turn = false;
        let mut seen_signatures: std::collections::HashSet<(String, String, String)> = Default::default();
        let mut guard_reason = GuardReason::None;
        let mut tool_executed = false;
        let mut last_tool: Option<(ToolKind, String)> = None;
        let mut stream_failed: Option<String> = None;
        let mut interrupted = false;
        let mut round = 0u32;

        loop {
            round += 1;
            match self
                .stream_once(state, provider, true, on_event, should_interrupt, &mut compacted_this_turn)
                .await
            {
                StreamOnceOutcome::Interrupted => {
                    interrupted = true;
                    break;
                }
                StreamOnceOutcome::Failed(msg) => {
                    stream_failed = Some(msg);
                    break;
                }
                StreamOnceOutcome::Completed => {}
            }

            let text = {
                let conv = state.current().expect("current conversation exists");
                conv.messages.last().map(|m| m.content.clone()).unwrap_or_default()
            };
            let Some((kind, payload)) = find_tool_call(&text) else {
                break;
            };

            if round > max_rounds {
                guard_reason = GuardReason::MaxIterations;
                break;
            }

            let audit = audit_line(kind);
            let tnow = now_ms();
            {
                let conv = state.current_mut().expect("current conversation exists");
                set_trailing_assistant(conv, &audit, tnow);
            }

            on_event(AgentEvent::ToolCall { kind, payload: payload.clone() });
            let result = dispatch(kind, &payload, &ctx).await;
            on_event(AgentEvent::ToolResult { kind, result: result.clone() });

            let signature = (kind.name().to_string(), payload.clone(), result.clone());
            let repeated = !seen_signatures.insert(signature);

            tool_executed = true;
            last_tool = Some((kind, result.clone()));

            let tnow = now_ms();
            {
                let conv = state.current_mut().expect("current conversation exists");
                conv.push(Message::system(result, tnow), tnow);
                conv.push(Message::assistant(String::new(), tnow), tnow);
            }

            if repeated {
                guard_reason = GuardReason::RepeatedToolCall;
                break;
            }
        }

        if interrupted {
            let text = {
                let conv = state.current().expect("current conversation exists");
                conv.messages.last().map(|m| m.content.clone()).unwrap_or_default()
            };
            self.save(state)?;
            on_event(AgentEvent::Final { text: text.clone() });
            return Ok(text);
        }
        if let Some(msg) = stream_failed {
            self.save(state)?;
            on_event(AgentEvent::Final { text: msg.clone() });
            return Ok(msg);
        }

        // Step 8: post-loop finalization re-stream, asked without the tool
        // system prompt so the model commits to a user-facing answer.
        if tool_executed {
            let note = match guard_reason {
                GuardReason::None => {
                    "Tool execution is complete. Provide a final user-facing answer now; do not call another tool."
                }
                GuardReason::RepeatedToolCall => {
                    "A repeated tool call was detected. Stop calling tools and answer directly with what you already know."
                }
                GuardReason::MaxIterations => {
                    "The tool-call limit for this turn was reached. Stop calling tools and answer directly with what you already know."
                }
            };
            let tnow = now_ms();
            {
                let conv = state.current_mut().expect("current conversation exists");
                conv.push(Message::system(format!("[tool-result] {note}"), tnow), tnow);
                conv.push(Message::assistant(String::new(), tnow), tnow);
            }

            match self
                .stream_once(state, provider, false, on_event, should_interrupt, &mut compacted_this_turn)
                .await
            {
                StreamOnceOutcome::Interrupted => {
                    let text = {
                        let conv = state.current().expect("current conversation exists");
                        conv.messages.last().map(|m| m.content.clone()).unwrap_or_default()
                    };
                    self.save(state)?;
                    on_event(AgentEvent::Final { text: text.clone() });
                    return Ok(text);
                }
                StreamOnceOutcome::Failed(msg) => {
                    self.save(state)?;
                    on_event(AgentEvent::Final { text: msg.clone() });
                    return Ok(msg);
                }
                StreamOnceOutcome::Completed => {}
            }
        }

        // Step 9: sanitize the final answer, synthesizing a fallback if it
        // is empty or still parses as a tool-call envelope.
        let final_text = {
            let conv = state.current_mut().expect("current conversation exists");
            let text = conv.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if text.trim().is_empty() || is_tool_call(&text) {
                let fallback = synthesize_fallback(guard_reason, last_tool.as_ref());
                set_trailing_assistant(conv, &fallback, now_ms());
                fallback
            } else {
                text
            }
        };

        // Step 10: persist.
        self.save(state)?;
        on_event(AgentEvent::Final { text: final_text.clone() });
        Ok(final_text)
    }

    /// Assemble the request, stream it, retry once on a retryable failure
    /// (compacting first if the failure was context-related and
    /// auto-compact is enabled), and write deltas into the trailing
    /// assistant message as they arrive.
    async fn stream_once(
        &self,
        state: &mut AppState,
        provider: &dyn zolt_model::ModelProvider,
        include_tool_prompt: bool,
        on_event: &mut dyn FnMut(AgentEvent),
        should_interrupt: &mut dyn FnMut() -> bool,
        compacted_this_turn: &mut bool,
    ) -> StreamOnceOutcome {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let messages = self.build_request_messages(state, include_tool_prompt);
            let req = CompletionRequest { messages, tools: vec![], stream: true, system_dynamic_suffix: None };

            let stream = match provider.complete(req).await {
                Ok(s) => s,
                Err(e) => {
                    if self.maybe_retry(state, &e.to_string(), attempt, compacted_this_turn).await {
                        continue;
                    }
                    return self.fail_stream(state, &e.to_string());
                }
            };

            match self.drain_stream(state, stream, on_event, should_interrupt).await {
                DrainOutcome::Done(usage) => {
                    let conv = state.current_mut().expect("current conversation exists");
                    conv.record_usage(usage);
                    return StreamOnceOutcome::Completed;
                }
                DrainOutcome::Interrupted => {
                    let conv = state.current_mut().expect("current conversation exists");
                    append_interrupt_notice(conv);
                    return StreamOnceOutcome::Interrupted;
                }
                DrainOutcome::Error(e) => {
                    if self.maybe_retry(state, &e.to_string(), attempt, compacted_this_turn).await {
                        continue;
                    }
                    return self.fail_stream(state, &e.to_string());
                }
            }
        }
    }

    /// `true` to retry once, `false` to give up.
    async fn maybe_retry(
        &self,
        state: &mut AppState,
        raw_error: &str,
        attempt: u32,
        compacted_this_turn: &mut bool,
    ) -> bool {
        if attempt > 1 {
            return false;
        }
        let info = classify_stream_failure(raw_error);
        if !info.retryable {
            return false;
        }
        if info.context_related && self.config.agent.auto_compact && !*compacted_this_turn {
            self.compact_now(state, CompactionTrigger::Auto).await;
            *compacted_this_turn = true;
        }
        true
    }

    fn fail_stream(&self, state: &mut AppState, raw_error: &str) -> StreamOnceOutcome {
        let info = classify_stream_failure(raw_error);
        let line = format!("[local] Request failed ({}): {}", info.code, info.message);
        let conv = state.current_mut().expect("current conversation exists");
        set_trailing_assistant(conv, &line, now_ms());
        StreamOnceOutcome::Failed(line)
    }

    async fn drain_stream(
        &self,
        state: &mut AppState,
        mut stream: zolt_model::ResponseStream,
        on_event: &mut dyn FnMut(AgentEvent),
        should_interrupt: &mut dyn FnMut() -> bool,
    ) -> DrainOutcome {
        let mut usage = TokenUsage::default();
        while let Some(item) = stream.next().await {
            if should_interrupt() {
                return DrainOutcome::Interrupted;
            }
            match item {
                Ok(ResponseEvent::TextDelta(text)) => {
                    let tnow = now_ms();
                    {
                        let conv = state.current_mut().expect("current conversation exists");
                        if let Some(last) = conv.messages.last_mut() {
                            last.content.push_str(&text);
                        }
                        conv.updated_ms = tnow;
                    }
                    on_event(AgentEvent::Token(text));
                }
                Ok(ResponseEvent::Usage { input_tokens, output_tokens, cache_read_tokens, .. }) => {
                    usage.input += input_tokens as u64;
                    usage.cached_input += cache_read_tokens as u64;
                    usage.output += output_tokens as u64;
                    usage.total += (input_tokens + output_tokens) as u64;
                }
                Ok(ResponseEvent::Done) => return DrainOutcome::Done(usage),
                Ok(ResponseEvent::Error(msg)) => return DrainOutcome::Error(anyhow::anyhow!(msg)),
                // Native tool-calling and extended-thinking deltas are not
                // part of this system's contract (inline markers only).
                Ok(ResponseEvent::ToolCall { .. }) | Ok(ResponseEvent::ThinkingDelta(_)) => {}
                Err(e) => return DrainOutcome::Error(e),
            }
        }
        DrainOutcome::Done(usage)
    }

    /// `[tool-system-prompt if requested] + conversation prefix excluding
    /// the trailing empty-assistant placeholder`.
    fn build_request_messages(&self, state: &AppState, include_tool_prompt: bool) -> Vec<ModelMessage> {
        let conv = state.current().expect("current conversation exists");
        let mut out = Vec::with_capacity(conv.messages.len());
        if include_tool_prompt {
            out.push(ModelMessage::system(system_prompt()));
        }
        let body_len = conv.messages.len().saturating_sub(1);
        out.extend(conv.messages[..body_len].iter().map(to_model_message));
        out
    }

    async fn maybe_preflight_compact(&self, state: &mut AppState) {
        if !self.config.agent.auto_compact {
            return;
        }
        let threshold_pct = (self.config.agent.compaction_threshold * 100.0).round() as u8;
        let should = match state.current() {
            Some(conv) => conv.messages.len() >= 10 && conv.percent_context_remaining() <= threshold_pct,
            None => false,
        };
        if should {
            self.compact_now(state, CompactionTrigger::Auto).await;
        }
    }

    async fn compact_now(&self, state: &mut AppState, trigger: CompactionTrigger) {
        let sources = match state.current() {
            Some(conv) => compaction_sources(&conv.messages),
            None => None,
        };
        let Some(sources) = sources else {
            return;
        };
        let summary = self.request_compaction_summary(&sources).await;
        let now = now_ms();
        if let Some(conv) = state.current_mut() {
            compact_with_model_summary(conv, summary.as_deref(), trigger, now);
        }
    }

    /// Stream a model-assisted compaction summary. `None` on any failure,
    /// letting the caller fall back to the deterministic local summary.
    async fn request_compaction_summary(&self, sources: &[Message]) -> Option<String> {
        let provider = self.provider.as_ref();

        let mut messages = vec![ModelMessage::system(COMPACT_SYSTEM_PROMPT)];
        messages.extend(sources.iter().map(to_model_message));
        messages.push(ModelMessage::user(COMPACT_USER_PROMPT));

        let req = CompletionRequest { messages, tools: vec![], stream: true, system_dynamic_suffix: None };
        let mut stream = provider.complete(req).await.ok()?;

        let mut buf = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(ResponseEvent::TextDelta(t)) => buf.push_str(&t),
                Ok(ResponseEvent::Done) => break,
                Ok(ResponseEvent::Error(_)) => return None,
                Err(_) => return None,
                _ => {}
            }
        }
        if buf.trim().is_empty() {
            None
        } else {
            Some(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_result_normalizes_state_line() {
        assert_eq!(summarize_result("[exec-command-result]\nstate: exited:0\nmore"), "state:exited:0");
    }

    #[test]
    fn summarize_result_normalizes_error_line() {
        assert_eq!(summarize_result("[read-file-result]\nerror: not found"), "error:not found");
    }

    #[test]
    fn summarize_result_truncates_long_plain_line() {
        let long = "x".repeat(200);
        let summary = summarize_result(&long);
        assert!(summary.ends_with('…'));
        assert_eq!(summary.chars().count(), 121);
    }

    #[test]
    fn summarize_result_falls_back_when_no_meaningful_line() {
        assert_eq!(summarize_result("[tool-result]\n"), "no output");
    }

    #[test]
    fn synthesize_fallback_matches_repeated_tool_call_pattern() {
        let last = (ToolKind::ExecCommand, "state: exited:0".to_string());
        let msg = synthesize_fallback(GuardReason::RepeatedToolCall, Some(&last));
        assert!(msg.starts_with("I completed `[tool] EXEC_COMMAND`. Last tool result: state:exited:0."));
        assert!(msg.ends_with("(repeated_tool_call)."));
    }

    #[test]
    fn synthesize_fallback_without_tool_states_no_response() {
        let msg = synthesize_fallback(GuardReason::MaxIterations, None);
        assert_eq!(msg, "No user-facing response was produced (max_iterations).");
    }

    #[test]
    fn classify_stream_failure_marks_rate_limit_retryable() {
        let info = classify_stream_failure("openai error 429: rate limited, slow down");
        assert_eq!(info.code, "429");
        assert!(info.retryable);
        assert!(!info.context_related);
    }

    #[test]
    fn classify_stream_failure_marks_context_overflow_retryable() {
        let info = classify_stream_failure("openai error 400: This model's maximum context length is 128000 tokens");
        assert!(info.retryable);
        assert!(info.context_related);
    }

    #[test]
    fn classify_stream_failure_non_retryable_client_error() {
        let info = classify_stream_failure("openai error 401: invalid api key");
        assert!(!info.retryable);
        assert!(!info.context_related);
    }

    #[test]
    fn classify_stream_failure_network_error_without_status_is_retryable() {
        let info = classify_stream_failure("error sending request: operation timed out");
        assert!(info.retryable);
    }

    #[test]
    fn set_trailing_assistant_overwrites_empty_placeholder() {
        let mut conv = Conversation::new(0);
        conv.push(Message::assistant("", 0), 0);
        set_trailing_assistant(&mut conv, "hello", 1);
        assert_eq!(conv.messages.last().unwrap().content, "hello");
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn normalize_whitespace_collapses_runs() {
        assert_eq!(normalize_whitespace("  fix   the   bug\n\tplease  "), "fix the bug please");
    }
}
