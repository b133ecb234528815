// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The tool set as a closed sum type. Eleven tools, eleven variants — no
//! trait objects, no registration step: a new tool is a new match arm.

use crate::builtin;
use crate::tool::ToolContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ReadShell,
    ListDir,
    ReadFile,
    GrepFiles,
    ProjectSearch,
    ApplyPatch,
    ExecCommand,
    WriteStdin,
    WebSearch,
    ViewImage,
    Skill,
}

impl ToolKind {
    pub const ALL: &'static [ToolKind] = &[
        ToolKind::ReadShell,
        ToolKind::ListDir,
        ToolKind::ReadFile,
        ToolKind::GrepFiles,
        ToolKind::ProjectSearch,
        ToolKind::ApplyPatch,
        ToolKind::ExecCommand,
        ToolKind::WriteStdin,
        ToolKind::WebSearch,
        ToolKind::ViewImage,
        ToolKind::Skill,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ReadShell => "read-shell",
            ToolKind::ListDir => "list-dir",
            ToolKind::ReadFile => "read-file",
            ToolKind::GrepFiles => "grep-files",
            ToolKind::ProjectSearch => "project-search",
            ToolKind::ApplyPatch => "apply-patch",
            ToolKind::ExecCommand => "exec-command",
            ToolKind::WriteStdin => "write-stdin",
            ToolKind::WebSearch => "web-search",
            ToolKind::ViewImage => "view-image",
            ToolKind::Skill => "skill",
        }
    }

    pub fn from_name(name: &str) -> Option<ToolKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

/// Run the given tool against its raw payload and return its result text.
///
/// Every arm returns a `[NAME-result]`-prefixed envelope; callers never see
/// a panic or a bare `Result` — tool failures are part of the text the
/// model reads, not the Rust error channel.
pub async fn dispatch(kind: ToolKind, payload: &str, ctx: &ToolContext) -> String {
    match kind {
        ToolKind::ReadShell => builtin::read_shell::execute(payload, ctx).await,
        ToolKind::ListDir => builtin::list_dir::execute(payload, ctx).await,
        ToolKind::ReadFile => builtin::read_file::execute(payload, ctx).await,
        ToolKind::GrepFiles => builtin::grep_files::execute(payload, ctx).await,
        ToolKind::ProjectSearch => builtin::project_search::execute(payload, ctx).await,
        ToolKind::ApplyPatch => builtin::apply_patch::execute(payload, ctx).await,
        ToolKind::ExecCommand => builtin::exec_command::execute(payload, ctx).await,
        ToolKind::WriteStdin => builtin::write_stdin::execute(payload, ctx).await,
        ToolKind::WebSearch => builtin::web_search::execute(payload, ctx).await,
        ToolKind::ViewImage => builtin::view_image::execute(payload, ctx).await,
        ToolKind::Skill => builtin::skill::execute(payload, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(ToolKind::from_name("not-a-tool"), None);
    }
}
