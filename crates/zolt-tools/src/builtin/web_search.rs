// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! `WEB_SEARCH` — DuckDuckGo HTML scraping, or an Exa JSON search.

use serde::Deserialize;

use crate::tool::truncate_bytes;

#[derive(Deserialize, Default)]
struct Payload {
    query: Option<String>,
    limit: Option<usize>,
    engine: Option<String>,
}

const DEFAULT_LIMIT: usize = 5;
const CAP_LIMIT: usize = 10;
const MAX_RESPONSE_BYTES: usize = 256 * 1024;

fn parse_payload(raw: &str) -> Payload {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        serde_json::from_str(trimmed).unwrap_or_default()
    } else {
        Payload {
            query: Some(trimmed.to_string()),
            ..Default::default()
        }
    }
}

struct Hit {
    title: String,
    url: String,
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// DuckDuckGo wraps result links behind `/l/?uddg=<encoded-url>`.
fn unwrap_redirect(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let rest = &href[idx + 5..];
        let encoded = rest.split('&').next().unwrap_or(rest);
        if let Ok(decoded) = urlencoding_decode(encoded) {
            return decoded;
        }
    }
    href.to_string()
}

fn urlencoding_decode(s: &str) -> Result<String, ()> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).map_err(|_| ())?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| ())?;
                out.push(byte);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| ())
}

/// Parse DuckDuckGo's lightweight HTML result markup for `result__a` anchors.
fn parse_duckduckgo_html(html: &str, limit: usize) -> Vec<Hit> {
    let mut hits = Vec::new();
    let mut rest = html;
    while hits.len() < limit {
        let Some(anchor_start) = rest.find("result__a") else {
            break;
        };
        let Some(tag_start) = rest[..anchor_start].rfind("<a ") else {
            rest = &rest[anchor_start + 9..];
            continue;
        };
        let segment = &rest[tag_start..];
        let Some(href_idx) = segment.find("href=\"") else {
            rest = &segment[9..];
            continue;
        };
        let after_href = &segment[href_idx + 6..];
        let Some(href_end) = after_href.find('"') else {
            break;
        };
        let href = &after_href[..href_end];

        let Some(gt) = segment.find('>') else {
            break;
        };
        let Some(close) = segment[gt..].find("</a>") else {
            break;
        };
        let title_raw = &segment[gt + 1..gt + close];
        let title = decode_entities(&strip_tags(title_raw));

        hits.push(Hit {
            title: title.trim().to_string(),
            url: decode_entities(&unwrap_redirect(href)),
        });

        rest = &segment[gt + close..];
    }
    hits
}

fn strip_tags(s: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

async fn search_duckduckgo(query: &str, limit: usize) -> Result<Vec<Hit>, String> {
    let client = reqwest::Client::new();
    let resp = client
        .get("https://html.duckduckgo.com/html/")
        .query(&[("q", query)])
        .header("User-Agent", "Mozilla/5.0")
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let body = resp.text().await.map_err(|e| format!("failed to read response: {e}"))?;
    let (body, _) = truncate_bytes(&body, MAX_RESPONSE_BYTES);
    Ok(parse_duckduckgo_html(&body, limit))
}

async fn search_exa(query: &str, limit: usize) -> Result<Vec<Hit>, String> {
    let api_key = std::env::var("EXA_API_KEY").map_err(|_| "EXA_API_KEY not set".to_string())?;
    let client = reqwest::Client::new();
    let resp = client
        .post("https://api.exa.ai/search")
        .header("x-api-key", api_key)
        .json(&serde_json::json!({ "query": query, "numResults": limit }))
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;
    let value: serde_json::Value = resp.json().await.map_err(|e| format!("invalid response: {e}"))?;
    let results = value["results"].as_array().cloned().unwrap_or_default();
    Ok(results
        .into_iter()
        .take(limit)
        .map(|r| Hit {
            title: r["title"].as_str().unwrap_or_default().to_string(),
            url: r["url"].as_str().unwrap_or_default().to_string(),
        })
        .collect())
}

pub async fn execute(payload: &str, _ctx: &crate::tool::ToolContext) -> String {
    let p = parse_payload(payload);
    let Some(query) = p.query else {
        return "[web-search-result]\nerror: missing query".to_string();
    };
    let limit = p.limit.unwrap_or(DEFAULT_LIMIT).min(CAP_LIMIT);
    let engine = p.engine.unwrap_or_else(|| "duckduckgo".to_string());

    let hits = match engine.as_str() {
        "exa" => search_exa(&query, limit).await,
        "duckduckgo" => search_duckduckgo(&query, limit).await,
        other => return format!("[web-search-result]\nerror: unknown engine: {other}"),
    };

    match hits {
        Ok(hits) => {
            let mut out = format!("[web-search-result]\nquery: {query}\nengine: {engine}\n");
            for h in &hits {
                out.push_str(&format!("{}\t{}\n", h.title, h.url));
            }
            out.push_str(&format!("results: {}", hits.len()));
            out
        }
        Err(e) => format!("[web-search-result]\nerror: {e}"),
    }
}
