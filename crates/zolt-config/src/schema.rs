// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// Used for config fields that should be enabled unless the user explicitly
/// sets them to `false`.  `#[serde(default)]` on a `bool` always falls back
/// to `bool::default()` (i.e. `false`), so a named function is required.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Named provider configurations.
    ///
    /// Define custom endpoints, local models, or additional accounts here and
    /// reference them by name with `--model <key>` or `--model <key>/<model>`.
    ///
    /// ```yaml
    /// providers:
    ///   my_ollama:
    ///     provider: openai        # uses the OpenAI-compatible wire format
    ///     base_url: http://localhost:11434/v1
    ///     name: llama3.2          # default model for this provider
    ///   work_anthropic:
    ///     provider: anthropic
    ///     api_key_env: WORK_ANTHROPIC_KEY
    ///     name: claude-opus-4-5
    /// ```
    #[serde(default)]
    pub providers: std::collections::HashMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier.  Run `zolt list-providers` for the full list.
    /// Common values: "openai" | "anthropic" | "google" | "azure" |
    /// "openrouter" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override.  Useful for local proxies or gateways.
    /// For most hosted providers the correct default is auto-selected.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,

    // ── Azure OpenAI ─────────────────────────────────────────────────────────
    /// Azure resource name (the subdomain of `.openai.azure.com`).
    /// Required when provider = "azure" and base_url is not set.
    pub azure_resource: Option<String>,
    /// Azure deployment name.  Defaults to `model.name` when not set.
    pub azure_deployment: Option<String>,
    /// Azure REST API version string, e.g. `"2024-02-01"`.
    pub azure_api_version: Option<String>,

    /// Subscription-token auth mode for the `openai` provider.
    #[serde(default)]
    pub auth_mode: OpenAiAuthMode,

    // ── Prompt caching ────────────────────────────────────────────────────────
    /// Attach an explicit cache-control marker to the system message.
    ///
    /// Anthropic: adds `"cache_control": {"type": "ephemeral"}` to the system
    /// block, telling the API to cache the prefix up to and including that
    /// block.  No effect for providers that cache automatically.
    #[serde(default = "default_true")]
    pub cache_system_prompt: bool,
    /// Use the extended (1-hour) cache TTL instead of the default 5-minute
    /// window.  Only meaningful for the Anthropic provider.
    #[serde(default)]
    pub extended_cache_time: bool,
    /// Cache tool definitions (Anthropic only).
    #[serde(default = "default_true")]
    pub cache_tools: bool,
    /// Enable automatic conversation caching (Anthropic only).
    #[serde(default = "default_true")]
    pub cache_conversation: bool,
    /// Cache image content blocks in conversation history (Anthropic only).
    #[serde(default = "default_true")]
    pub cache_images: bool,
    /// Cache large tool results in conversation history (Anthropic only).
    #[serde(default = "default_true")]
    pub cache_tool_results: bool,

    // ── Provider-specific extras ──────────────────────────────────────────────
    /// Free-form provider-specific options forwarded as-is to the driver.
    #[serde(default)]
    pub driver_options: serde_json::Value,

    // ── Mock provider ─────────────────────────────────────────────────────────
    /// Path to YAML mock-responses file (used when provider = "mock").
    /// Can also be set via the ZOLT_MOCK_RESPONSES environment variable.
    pub mock_responses_file: Option<String>,
}

/// Auth strategy for the `openai` provider: how to obtain a credential
/// when no explicit `api_key`/`api_key_env` is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OpenAiAuthMode {
    /// Try a plain API key first, then fall back to subscription auth files.
    #[default]
    Auto,
    ApiKey,
    /// Prefer the codex/opencode subscription token over a plain API key.
    Codex,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            // api_key_env is intentionally None here.  resolve_api_key() falls
            // through to the driver registry, which already knows the canonical
            // env-var name for each provider (OPENAI_API_KEY, ANTHROPIC_API_KEY,
            // etc.).
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            azure_resource: None,
            azure_deployment: None,
            azure_api_version: None,
            auth_mode: OpenAiAuthMode::Auto,
            cache_system_prompt: true,
            extended_cache_time: false,
            cache_tools: true,
            cache_conversation: true,
            cache_images: true,
            cache_tool_results: true,
            driver_options: serde_json::Value::Null,
            mock_responses_file: None,
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    4
}
fn default_compaction_threshold() -> f32 {
    0.15
}
fn default_compaction_keep_recent() -> usize {
    8
}
fn default_compaction_source_min() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Fraction of the usable context window remaining at or below which
    /// pre-flight compaction runs (default 0.15).
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
    /// Number of most-recent messages preserved verbatim during compaction
    /// (fixed at 8).
    #[serde(default = "default_compaction_keep_recent")]
    pub compaction_keep_recent: usize,
    /// Minimum number of compaction-source messages required in the head
    /// partition before compaction runs (fixed at 4).
    #[serde(default = "default_compaction_source_min")]
    pub compaction_source_min: usize,
    /// Maximum tool-call iterations per turn (fixed at 4).
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    #[serde(default = "default_true")]
    pub auto_compact: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: default_compaction_threshold(),
            compaction_keep_recent: default_compaction_keep_recent(),
            compaction_source_min: default_compaction_source_min(),
            max_tool_rounds: default_max_tool_rounds(),
            auto_compact: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Automatically approve shell commands matching these glob patterns.
    pub auto_approve_patterns: Vec<String>,
    /// Block shell commands matching these glob patterns.
    pub deny_patterns: Vec<String>,
    /// Per-command timeout for exec-command / read-shell, in seconds.
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub web: WebConfig,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            auto_approve_patterns: vec![
                "cat *".into(),
                "ls *".into(),
                "find *".into(),
                "rg *".into(),
                "grep *".into(),
            ],
            deny_patterns: vec!["rm -rf /*".into(), "dd if=*".into()],
            timeout_secs: default_tool_timeout_secs(),
            web: WebConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// Exa API key (also checked via the EXA_API_KEY env var).
    pub api_key: Option<String>,
    #[serde(default = "default_true")]
    pub duckduckgo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_fetch_max_chars")]
    pub fetch_max_chars: usize,
    #[serde(default)]
    pub search: WebSearchConfig,
}

fn default_web_fetch_max_chars() -> usize {
    50_000
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            fetch_max_chars: default_web_fetch_max_chars(),
            search: WebSearchConfig {
                api_key: None,
                duckduckgo: true,
            },
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_config_is_openai_gpt4o() {
        let cfg = ModelConfig::default();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.name, "gpt-4o");
    }

    #[test]
    fn default_agent_config_has_expected_values() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.compaction_threshold, 0.15);
        assert_eq!(cfg.compaction_keep_recent, 8);
        assert_eq!(cfg.compaction_source_min, 4);
        assert_eq!(cfg.max_tool_rounds, 4);
    }

    #[test]
    fn default_tools_config_auto_approves_read_only_commands() {
        let cfg = ToolsConfig::default();
        assert!(cfg.auto_approve_patterns.iter().any(|p| p == "cat *"));
        assert!(cfg.deny_patterns.iter().any(|p| p == "rm -rf /*"));
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.model.provider, cfg.model.provider);
    }
}
