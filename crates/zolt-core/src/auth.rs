// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Credential resolution for model providers.
//!
//! [`zolt_model::resolve_api_key`] (private to that crate) already covers the
//! simple case: an explicit key, an explicit env var, or the registry's
//! single default env var. This module sits above it and adds the policy
//! that is specific to this application rather than to the wire drivers:
//!
//! - a two-tier env var lookup for Google (`GOOGLE_GENERATIVE_AI_API_KEY`
//!   before `GEMINI_API_KEY`)
//! - OpenAI subscription auth (`auth_mode`): reading the codex CLI's
//!   `auth.json` and extracting a ChatGPT account id from its access token
//! - opencode's own `auth.json`, used when no plain API key is configured
//!
//! [`resolve`] returns a [`ResolvedCredential`] that the caller folds back
//! into a [`ModelConfig`] clone before handing it to `zolt_model::from_config`,
//! keeping the driver layer itself free of this policy.

use std::path::PathBuf;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;
use zolt_config::{ModelConfig, OpenAiAuthMode};

/// Outcome of resolving a provider's credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredential {
    /// The bearer credential to send, if one was found anywhere.
    pub api_key: Option<String>,
    /// Overrides `ModelConfig::base_url` when subscription auth requires a
    /// different backend (the codex ChatGPT backend, for instance).
    pub base_url_override: Option<String>,
    /// Whether the resolved credential is a ChatGPT/codex subscription token
    /// rather than a plain API key — the OpenAI driver must talk to the
    /// Responses API and include the account id header in this case.
    pub prefer_responses_api: bool,
    /// `chatgpt_account_id` extracted from the subscription token, when
    /// `prefer_responses_api` is true.
    pub account_id: Option<String>,
}

const CODEX_BACKEND_BASE_URL: &str = "https://chatgpt.com/backend-api/codex";

/// Fixed provider → env var fallback table, consulted after the registry's
/// own default (which is usually the same value, but `google` needs a
/// second-tier fallback the registry's single-slot default can't express).
fn fallback_env_vars(provider: &str) -> &'static [&'static str] {
    match provider {
        "opencode" => &["OPENCODE_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "openrouter" => &["OPENROUTER_API_KEY"],
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "google" => &["GOOGLE_GENERATIVE_AI_API_KEY", "GEMINI_API_KEY"],
        "zenmux" => &["ZENMUX_API_KEY"],
        _ => &[],
    }
}

/// Resolve credentials for `cfg`, applying provider-specific fallbacks and
/// (for `openai`) subscription auth according to `cfg.auth_mode`.
pub fn resolve(cfg: &ModelConfig) -> ResolvedCredential {
    // An explicit key or env var in config always wins outright.
    if let Some(key) = &cfg.api_key {
        return ResolvedCredential { api_key: Some(key.clone()), ..Default::default() };
    }
    if let Some(env) = &cfg.api_key_env {
        if let Ok(key) = std::env::var(env) {
            return ResolvedCredential { api_key: Some(key), ..Default::default() };
        }
    }

    let plain_key = fallback_env_vars(&cfg.provider)
        .iter()
        .find_map(|var| std::env::var(var).ok());

    if cfg.provider == "openai" {
        return resolve_openai(cfg, plain_key);
    }
    if cfg.provider == "opencode" {
        if let Some(key) = plain_key {
            return ResolvedCredential { api_key: Some(key), ..Default::default() };
        }
        if let Some(cred) = read_opencode_auth_file() {
            return cred;
        }
        return ResolvedCredential::default();
    }

    ResolvedCredential { api_key: plain_key, ..Default::default() }
}

fn resolve_openai(cfg: &ModelConfig, plain_key: Option<String>) -> ResolvedCredential {
    match cfg.auth_mode {
        OpenAiAuthMode::ApiKey => ResolvedCredential { api_key: plain_key, ..Default::default() },
        OpenAiAuthMode::Codex => {
            read_codex_auth_file().unwrap_or(ResolvedCredential { api_key: plain_key, ..Default::default() })
        }
        OpenAiAuthMode::Auto => {
            if let Some(key) = plain_key {
                return ResolvedCredential { api_key: Some(key), ..Default::default() };
            }
            read_codex_auth_file().unwrap_or_default()
        }
    }
}

/// `$CODEX_HOME/auth.json`, falling back to `~/.codex/auth.json`.
fn codex_auth_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("CODEX_HOME") {
        return Some(PathBuf::from(home).join("auth.json"));
    }
    dirs::home_dir().map(|h| h.join(".codex").join("auth.json"))
}

/// `$XDG_DATA_HOME/opencode/auth.json`, falling back to
/// `~/.local/share/opencode/auth.json`.
fn opencode_auth_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg).join("opencode").join("auth.json"));
    }
    dirs::home_dir().map(|h| h.join(".local").join("share").join("opencode").join("auth.json"))
}

fn read_codex_auth_file() -> Option<ResolvedCredential> {
    let path = codex_auth_path()?;
    let bytes = std::fs::read(&path).ok()?;
    let doc: Value = serde_json::from_slice(&bytes).ok()?;

    if let Some(key) = doc.get("OPENAI_API_KEY").and_then(Value::as_str) {
        if !key.is_empty() {
            return Some(ResolvedCredential { api_key: Some(key.to_string()), ..Default::default() });
        }
    }

    let tokens = doc.get("tokens")?;
    let access_token = tokens.get("access_token").and_then(Value::as_str)?;
    let account_id = tokens
        .get("account_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| chatgpt_account_id_from_jwt(access_token));

    Some(ResolvedCredential {
        api_key: Some(access_token.to_string()),
        base_url_override: Some(CODEX_BACKEND_BASE_URL.to_string()),
        prefer_responses_api: true,
        account_id,
    })
}

fn read_opencode_auth_file() -> Option<ResolvedCredential> {
    let path = opencode_auth_path()?;
    let bytes = std::fs::read(&path).ok()?;
    let doc: Value = serde_json::from_slice(&bytes).ok()?;
    let entry = doc.get("opencode")?;
    match entry.get("type").and_then(Value::as_str) {
        Some("api") => entry.get("key").and_then(Value::as_str).map(|key| ResolvedCredential {
            api_key: Some(key.to_string()),
            ..Default::default()
        }),
        Some("oauth") => entry.get("access").and_then(Value::as_str).map(|token| ResolvedCredential {
            api_key: Some(token.to_string()),
            ..Default::default()
        }),
        _ => None,
    }
}

/// Decode a JWT's middle (payload) segment and pull out the ChatGPT account
/// id, trying the nested `https://api.openai.com/auth.chatgpt_account_id`
/// claim first, then a bare `chatgpt_account_id` claim, then the first
/// entry of an `organizations` array.
fn chatgpt_account_id_from_jwt(jwt: &str) -> Option<String> {
    let payload_segment = jwt.split('.').nth(1)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_segment).ok()?;
    let claims: Value = serde_json::from_slice(&payload_bytes).ok()?;

    if let Some(id) = claims
        .get("https://api.openai.com/auth")
        .and_then(|v| v.get("chatgpt_account_id"))
        .and_then(Value::as_str)
    {
        return Some(id.to_string());
    }
    if let Some(id) = claims.get("chatgpt_account_id").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    claims
        .get("organizations")
        .and_then(Value::as_array)
        .and_then(|orgs| orgs.first())
        .and_then(|org| org.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
