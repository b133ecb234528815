// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `VIEW_IMAGE` — header-only metadata plus an optional vision caption.

use serde::Deserialize;
use serde_json::json;

use crate::tool::{ToolContext, VisionConfig};

#[derive(Deserialize, Default)]
struct Payload {
    path: Option<String>,
}

/// Captioning is skipped above this file size even when vision is configured.
const MAX_VISION_BYTES: u64 = 6 * 1024 * 1024;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            path: Some(trimmed.trim_matches('"').to_string()),
        }
    }
}

pub async fn execute(payload: &str, ctx: &ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(path) = p.path else {
        return "[view-image-result]\nerror: missing path".to_string();
    };
    let resolved = ctx.resolve(&path);

    let meta = match zolt_image::inspect(&resolved, true) {
        Ok(m) => m,
        Err(e) => return format!("[view-image-result]\nerror: {e}"),
    };

    let mut out = format!(
        "[view-image-result]\npath: {}\nformat: {}\nmime: {}\nwidth: {}\nheight: {}\nbytes: {}\nsha256: {}",
        resolved.display(),
        meta.format.as_str(),
        meta.mime,
        meta.width,
        meta.height,
        meta.bytes,
        meta.sha256.as_deref().unwrap_or("")
    );

    if let Some(vision) = &ctx.vision {
        if meta.bytes <= MAX_VISION_BYTES {
            match caption(&resolved, &meta, vision).await {
                Ok(caption) => out.push_str(&format!("\ncaption: {caption}")),
                Err(e) => out.push_str(&format!("\ncaption_error: {e}")),
            }
        } else {
            out.push_str("\ncaption_error: file too large for captioning");
        }
    }

    out
}

async fn caption(
    path: &std::path::Path,
    meta: &zolt_image::ImageMeta,
    vision: &VisionConfig,
) -> Result<String, String> {
    use base64::Engine;

    let bytes = std::fs::read(path).map_err(|e| format!("failed to read file: {e}"))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let data_url = format!("data:{};base64,{encoded}", meta.mime);

    let client = reqwest::Client::new();
    let mut last_err = String::new();

    for model in &vision.model_candidates {
        let body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "Describe this image concisely."},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]
            }],
            "max_tokens": 300,
        });

        let resp = client
            .post(format!("{}/chat/completions", vision.api_base))
            .bearer_auth(&vision.api_key)
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let value: serde_json::Value = match r.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        last_err = format!("invalid response from {model}: {e}");
                        continue;
                    }
                };
                if let Some(text) = value["choices"][0]["message"]["content"].as_str() {
                    return Ok(text.trim().to_string());
                }
                last_err = format!("no caption content from {model}");
            }
            Ok(r) => {
                last_err = format!("{model} returned status {}", r.status());
            }
            Err(e) => {
                last_err = format!("{model} request failed: {e}");
            }
        }
    }

    Err(if last_err.is_empty() {
        "no vision model candidates configured".to_string()
    } else {
        last_err
    })
}
