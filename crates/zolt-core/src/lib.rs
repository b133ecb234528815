// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod auth;
mod compact;
mod events;
mod extract;
mod inject;
mod interrupt;
mod prompts;
mod session;

pub use agent::Agent;
pub use auth::{resolve as resolve_credential, ResolvedCredential};
pub use compact::{
    apply_compaction, below_keep_recent, compact_with_model_summary, compaction_sources,
    local_fallback_summary, CompactionTrigger, SummaryKind, COMPACTION_SOURCE_MIN,
    COMPACT_SYSTEM_PROMPT, COMPACT_USER_PROMPT, KEEP_RECENT,
};
pub use events::AgentEvent;
pub use extract::{audit_line, find_tool_call, is_tool_call, wrap as wrap_tool_call};
pub use inject::{
    agents_context_message, default_skill_roots, enrich_prompt, find_agents_md,
    skills_context_message, Enrichment, PromptToken, AGENTS_CONTEXT_HEADER, FILE_INJECT_HEADER,
    SKILLS_CONTEXT_HEADER, SKILL_INJECT_HEADER,
};
pub use interrupt::{
    poll_stdin_nonblocking, InterruptController, PollOutcome, DOUBLE_ESC_WINDOW_MS, INTERRUPT_NOTICE,
};
pub use prompts::system_prompt;
pub use session::{
    default_state_path, AppState, Conversation, Message, Role, TokenUsage, DEFAULT_TITLE,
};
