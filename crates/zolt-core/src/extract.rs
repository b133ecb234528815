// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool-call marker extraction.
//!
//! The model never uses native function-calling: it emits a tagged or
//! fenced envelope inline in its streamed text, and the orchestrator checks
//! the *completed* message against a fixed precedence order of envelope
//! forms. First match wins; everything else is a plain user-facing answer.

use zolt_tools::ToolKind;

/// Try to parse `text` as one of the eleven tool-call envelopes.
///
/// Returns the tool and its raw payload — JSON for every tool except
/// `ReadShell` (a bare command line) and `ApplyPatch` (a textual patch).
pub fn find_tool_call(text: &str) -> Option<(ToolKind, String)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(p) = tag_or_fence(trimmed, "LIST_DIR", "list_dir") {
        return Some((ToolKind::ListDir, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "READ_FILE", "read_file") {
        return Some((ToolKind::ReadFile, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "GREP_FILES", "grep_files") {
        return Some((ToolKind::GrepFiles, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "PROJECT_SEARCH", "project_search") {
        return Some((ToolKind::ProjectSearch, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "EXEC_COMMAND", "exec_command") {
        return Some((ToolKind::ExecCommand, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "WRITE_STDIN", "write_stdin") {
        return Some((ToolKind::WriteStdin, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "WEB_SEARCH", "web_search") {
        return Some((ToolKind::WebSearch, p));
    }
    if let Some(p) = tag_or_fence(trimmed, "VIEW_IMAGE", "view_image") {
        return Some((ToolKind::ViewImage, p));
    }
    if let Some(p) = try_skill(trimmed) {
        return Some((ToolKind::Skill, p));
    }
    if let Some(p) = try_read(trimmed) {
        return Some((ToolKind::ReadShell, p));
    }
    if let Some(p) = try_apply_patch(trimmed) {
        return Some((ToolKind::ApplyPatch, p));
    }
    None
}

/// `true` when `text` parses as any tool call, regardless of which one.
pub fn is_tool_call(text: &str) -> bool {
    find_tool_call(text).is_some()
}

/// Render the `[tool] NAME` one-line audit entry a tool call is rewritten to
/// once it has been dispatched.
pub fn audit_line(kind: ToolKind) -> String {
    format!("[tool] {}", tool_marker_name(kind))
}

/// The tag/inline name a tool uses in its marker forms — upper snake case
/// for every tool except `read-shell`, which keeps the bare `READ` form.
fn tool_marker_name(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::ReadShell => "READ",
        ToolKind::ListDir => "LIST_DIR",
        ToolKind::ReadFile => "READ_FILE",
        ToolKind::GrepFiles => "GREP_FILES",
        ToolKind::ProjectSearch => "PROJECT_SEARCH",
        ToolKind::ApplyPatch => "APPLY_PATCH",
        ToolKind::ExecCommand => "EXEC_COMMAND",
        ToolKind::WriteStdin => "WRITE_STDIN",
        ToolKind::WebSearch => "WEB_SEARCH",
        ToolKind::ViewImage => "VIEW_IMAGE",
        ToolKind::Skill => "SKILL",
    }
}

/// Re-wrap `payload` in `<TAG>...</TAG>` the way the model would have
/// emitted it. Used by round-trip tests; the orchestrator never calls this.
pub fn wrap(kind: ToolKind, payload: &str) -> String {
    let tag = tool_marker_name(kind);
    format!("<{tag}>\n{payload}\n</{tag}>")
}

fn tag_or_fence(text: &str, tag: &str, fence_lang: &str) -> Option<String> {
    extract_xml_tag(text, tag).or_else(|| extract_fenced(text, fence_lang))
}

fn extract_xml_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim().to_string())
}

fn extract_fenced(text: &str, lang: &str) -> Option<String> {
    let mut search_from = 0usize;
    loop {
        let rel = text[search_from..].find("```")?;
        let fence_start = search_from + rel;
        let after_fence = fence_start + 3;
        let line_end = text[after_fence..].find('\n').map(|p| after_fence + p)?;
        let declared_lang = text[after_fence..line_end].trim();
        let body_start = line_end + 1;
        let rel_close = text[body_start..].find("```")?;
        let body_end = body_start + rel_close;
        if declared_lang.eq_ignore_ascii_case(lang) {
            return Some(text[body_start..body_end].trim().to_string());
        }
        search_from = body_end + 3;
    }
}

fn try_skill(text: &str) -> Option<String> {
    if let Some(p) = tag_or_fence(text, "SKILL", "skill") {
        return Some(p);
    }
    let name = text.strip_prefix("[tool] SKILL ")?.trim();
    if name.is_empty() {
        return None;
    }
    Some(format!("{{\"name\":{}}}", json_escape(name)))
}

fn try_read(text: &str) -> Option<String> {
    if let Some(p) = tag_or_fence(text, "READ", "read") {
        return Some(p);
    }
    if let Some(rest) = text.strip_prefix("[tool] READ ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }
    if let Some(rest) = text.strip_prefix("READ:") {
        let rest = rest.trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }
    if let Some(rest) = text.strip_prefix("READ ") {
        let rest = rest.trim();
        return (!rest.is_empty()).then(|| rest.to_string());
    }
    None
}

fn try_apply_patch(text: &str) -> Option<String> {
    if let Some(p) = extract_fenced(text, "apply_patch") {
        return Some(p);
    }
    if let Some(p) = extract_xml_tag(text, "APPLY_PATCH") {
        return Some(p);
    }
    extract_raw_patch(text)
}

/// Find a bare `*** Begin Patch` … `*** End Patch` block anywhere in `text`.
fn extract_raw_patch(text: &str) -> Option<String> {
    const BEGIN: &str = "*** Begin Patch";
    const END: &str = "*** End Patch";
    let start = text.find(BEGIN)?;
    let end_rel = text[start..].find(END)?;
    let end = start + end_rel + END.len();
    Some(text[start..end].trim().to_string())
}

fn json_escape(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_tool_text_returns_none() {
        assert_eq!(find_tool_call("Here is your answer."), None);
    }

    #[test]
    fn empty_text_returns_none() {
        assert_eq!(find_tool_call(""), None);
        assert_eq!(find_tool_call("   "), None);
    }

    #[test]
    fn xml_tag_form_is_recognised() {
        let text = r#"<GREP_FILES>
{"query":"\\.rs$","path":"src"}
</GREP_FILES>"#;
        let (kind, payload) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::GrepFiles);
        assert!(payload.contains("\\.rs$"));
    }

    #[test]
    fn fenced_form_is_recognised() {
        let text = "```list_dir\n{\"path\":\".\"}\n```";
        let (kind, payload) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ListDir);
        assert_eq!(payload, r#"{"path":"."}"#);
    }

    #[test]
    fn fence_language_match_is_case_insensitive() {
        let text = "```LIST_DIR\n{\"path\":\".\"}\n```";
        let (kind, _) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ListDir);
    }

    #[test]
    fn precedence_order_list_dir_before_read_file() {
        // Both envelopes present; LIST_DIR must win since it is earlier in
        // the fixed precedence order.
        let text = "<LIST_DIR>{\"path\":\".\"}</LIST_DIR><READ_FILE>{\"path\":\"x\"}</READ_FILE>";
        let (kind, _) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ListDir);
    }

    #[test]
    fn skill_inline_bracket_form() {
        let (kind, payload) = find_tool_call("[tool] SKILL rust-review").unwrap();
        assert_eq!(kind, ToolKind::Skill);
        assert_eq!(payload, r#"{"name":"rust-review"}"#);
    }

    #[test]
    fn skill_tag_form() {
        let (kind, payload) = find_tool_call("<SKILL>{\"name\":\"rust-review\"}</SKILL>").unwrap();
        assert_eq!(kind, ToolKind::Skill);
        assert_eq!(payload, r#"{"name":"rust-review"}"#);
    }

    #[test]
    fn read_colon_form() {
        let (kind, payload) = find_tool_call("READ: git status").unwrap();
        assert_eq!(kind, ToolKind::ReadShell);
        assert_eq!(payload, "git status");
    }

    #[test]
    fn read_bare_space_form() {
        let (kind, payload) = find_tool_call("READ ls -la").unwrap();
        assert_eq!(kind, ToolKind::ReadShell);
        assert_eq!(payload, "ls -la");
    }

    #[test]
    fn read_inline_bracket_form() {
        let (kind, payload) = find_tool_call("[tool] READ pwd").unwrap();
        assert_eq!(kind, ToolKind::ReadShell);
        assert_eq!(payload, "pwd");
    }

    #[test]
    fn read_tag_form() {
        let (kind, payload) = find_tool_call("<READ>git diff</READ>").unwrap();
        assert_eq!(kind, ToolKind::ReadShell);
        assert_eq!(payload, "git diff");
    }

    #[test]
    fn apply_patch_tag_form() {
        let text = "<APPLY_PATCH>*** Begin Patch\n*** Add File: a.txt\n+hi\n*** End Patch</APPLY_PATCH>";
        let (kind, payload) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ApplyPatch);
        assert!(payload.starts_with("*** Begin Patch"));
    }

    #[test]
    fn apply_patch_raw_form_anywhere_in_message() {
        let text = "I'll apply this patch now:\n\n*** Begin Patch\n*** Add File: a.txt\n+hi\n*** End Patch\n\nDone.";
        let (kind, payload) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ApplyPatch);
        assert!(payload.starts_with("*** Begin Patch"));
        assert!(payload.ends_with("*** End Patch"));
    }

    #[test]
    fn apply_patch_fence_wins_over_raw_envelope_elsewhere() {
        let text = "```apply_patch\n*** Begin Patch\n*** Add File: fenced.txt\n*** End Patch\n```\n\nAlso: *** Begin Patch\n*** Add File: raw.txt\n*** End Patch";
        let (kind, payload) = find_tool_call(text).unwrap();
        assert_eq!(kind, ToolKind::ApplyPatch);
        assert!(payload.contains("fenced.txt"));
        assert!(!payload.contains("raw.txt"));
    }

    #[test]
    fn round_trip_preserves_payload_modulo_whitespace() {
        let payload = r#"{"query":"foo","path":"."}"#;
        let wrapped = wrap(ToolKind::GrepFiles, payload);
        let (kind, parsed) = find_tool_call(&wrapped).unwrap();
        assert_eq!(kind, ToolKind::GrepFiles);
        assert_eq!(parsed, payload);
    }

    #[test]
    fn audit_line_format() {
        assert_eq!(audit_line(ToolKind::ExecCommand), "[tool] EXEC_COMMAND");
    }

    #[test]
    fn is_tool_call_true_for_envelope_false_for_plain_text() {
        assert!(is_tool_call("<SKILL>{\"name\":\"x\"}</SKILL>"));
        assert!(!is_tool_call("just a normal reply"));
    }
}
