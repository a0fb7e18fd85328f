// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering progress snapshots into chat messages
//!
//! A message is header / body / footer. The footer carries the routing
//! lines (`ctx:` and the resume signature) and is never truncated; when the
//! body blows the platform length limit it loses its middle, keeping the
//! start and the end of the answer readable.

use relay_core::{ActionKind, ActionState, ProgressState, RunContext};

const TRUNCATION_MARKER: &str = "\n[…]\n";

/// Platform-agnostic message parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub header: String,
    pub body: String,
    pub footer: String,
}

impl RenderedMessage {
    /// Flatten to text under `max_len` characters. The body is truncated
    /// middle-out; header and footer always survive whole.
    pub fn to_text(&self, max_len: usize) -> String {
        let full = join_parts(&self.header, &self.body, &self.footer);
        if full.chars().count() <= max_len {
            return full;
        }

        let fixed: usize = self.header.chars().count()
            + self.footer.chars().count()
            + 4 // the two blank-line separators
            + TRUNCATION_MARKER.chars().count();
        let budget = max_len.saturating_sub(fixed).max(16);
        let body = truncate_middle(&self.body, budget);
        let body = close_markup(&body);
        join_parts(&self.header, &body, &self.footer)
    }
}

fn join_parts(header: &str, body: &str, footer: &str) -> String {
    let mut parts = Vec::new();
    for part in [header, body, footer] {
        if !part.is_empty() {
            parts.push(part);
        }
    }
    parts.join("\n\n")
}

fn truncate_middle(text: &str, budget: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= budget {
        return text.to_string();
    }
    let head = budget / 2;
    let tail = budget - head;
    let mut out: String = chars[..head].iter().collect();
    out.push_str(TRUNCATION_MARKER);
    out.extend(chars[chars.len() - tail..].iter());
    out
}

/// Close code markup that truncation may have cut open.
fn close_markup(text: &str) -> String {
    let mut out = text.to_string();
    let fences = out.matches("```").count();
    if fences % 2 == 1 {
        out.push_str("\n```");
    }
    let single_ticks = out.matches('`').count() - 3 * out.matches("```").count();
    if single_ticks % 2 == 1 {
        out.push('`');
    }
    out
}

fn format_elapsed(elapsed_s: f64) -> String {
    let total = elapsed_s.max(0.0) as u64;
    if total < 60 {
        return format!("{total}s");
    }
    let minutes = total / 60;
    let seconds = total % 60;
    if minutes < 60 {
        return format!("{minutes}m {seconds}s");
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn glyph(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Command => "⚙",
        ActionKind::FileChange => "📝",
        ActionKind::WebSearch => "🔎",
        ActionKind::Todo => "📋",
        ActionKind::Warning => "⚠️",
        ActionKind::Tool | ActionKind::Turn | ActionKind::Other => "🔧",
    }
}

fn render_action(state: &ActionState) -> String {
    let glyph = glyph(state.action.kind);
    let title = &state.action.title;
    if state.completed {
        let mark = match state.ok {
            Some(false) => "✗",
            _ => "✓",
        };
        format!("{glyph} {title} {mark}")
    } else {
        format!("{glyph} {title}…")
    }
}

/// Renders progress snapshots into message parts
pub struct ChatPresenter {
    pub max_actions: usize,
    pub max_len: usize,
}

impl Default for ChatPresenter {
    fn default() -> Self {
        Self {
            max_actions: 5,
            max_len: 4000,
        }
    }
}

impl ChatPresenter {
    fn footer(&self, state: &ProgressState, ctx: Option<&RunContext>) -> String {
        let mut lines = Vec::new();
        if let Some(ctx) = ctx {
            lines.push(ctx.format_footer());
        }
        if let Some(resume_line) = &state.resume_line {
            lines.push(resume_line.clone());
        }
        lines.join("\n")
    }

    /// In-flight progress: status header, recent actions, routing footer.
    pub fn render_progress(
        &self,
        state: &ProgressState,
        elapsed_s: f64,
        label: &str,
        ctx: Option<&RunContext>,
    ) -> RenderedMessage {
        let mut header = format!(
            "⏳ {} {} · {}",
            state.engine,
            label,
            format_elapsed(elapsed_s)
        );
        if state.action_count > 0 {
            header.push_str(&format!(" · {} steps", state.action_count));
        }

        let start = state.actions.len().saturating_sub(self.max_actions);
        let body = state.actions[start..]
            .iter()
            .map(render_action)
            .collect::<Vec<_>>()
            .join("\n");

        RenderedMessage {
            header,
            body,
            footer: self.footer(state, ctx),
        }
    }

    /// Final result: status header, the answer, routing footer.
    pub fn render_final(
        &self,
        state: &ProgressState,
        elapsed_s: f64,
        status: &str,
        answer: &str,
        ctx: Option<&RunContext>,
    ) -> RenderedMessage {
        let status_glyph = match status {
            "done" => "✅",
            "cancelled" => "🚫",
            _ => "❌",
        };
        let header = format!(
            "{status_glyph} {} {} · {}",
            state.engine,
            status,
            format_elapsed(elapsed_s)
        );
        let answer = answer.trim();
        let body = if answer.is_empty() {
            "(no output)".to_string()
        } else {
            answer.to_string()
        };
        RenderedMessage {
            header,
            body,
            footer: self.footer(state, ctx),
        }
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
