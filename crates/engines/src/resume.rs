// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume signature formatting and extraction
//!
//! Every engine advertises its session in message footers as
//! `` `<engine> resume <value>` `` on its own line. The matcher recognizes
//! that line with or without backticks, case-insensitively.

use crate::runner::RunnerError;
use regex::Regex;
use relay_core::{EngineId, ResumeToken};

/// Per-engine resume signature matcher
#[derive(Debug, Clone)]
pub struct ResumeMatcher {
    engine: EngineId,
    line_re: Regex,
}

impl ResumeMatcher {
    pub fn new(engine: EngineId) -> Self {
        let escaped = regex::escape(engine.as_str());
        #[allow(clippy::unwrap_used)]
        let line_re = Regex::new(&format!(
            r"(?im)^\s*`?{escaped}\s+resume\s+(?P<token>[^`\s]+)`?\s*$"
        ))
        .unwrap();
        Self { engine, line_re }
    }

    pub fn engine(&self) -> &EngineId {
        &self.engine
    }

    /// Format the footer line for a token of this engine.
    pub fn format(&self, token: &ResumeToken) -> Result<String, RunnerError> {
        if token.engine != self.engine {
            return Err(RunnerError::WrongEngine {
                engine: self.engine.clone(),
                token_engine: token.engine.clone(),
            });
        }
        Ok(format!("`{} resume {}`", self.engine, token.value))
    }

    /// Extract a token from free text. The last match wins so the newest
    /// footer in a message thread takes precedence.
    pub fn extract(&self, text: &str) -> Option<ResumeToken> {
        let value = self
            .line_re
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.name("token"))?
            .as_str()
            .to_string();
        Some(ResumeToken::new(self.engine.clone(), value))
    }

    /// Whether a single line is this engine's resume signature.
    pub fn is_resume_line(&self, line: &str) -> bool {
        self.line_re.is_match(line)
    }
}

/// Remove every line the predicate recognizes as a resume signature.
///
/// Returns the remaining prompt text, trimmed. Callers substitute a
/// placeholder when the result is empty, since engines need non-empty input.
pub fn strip_resume_lines(text: &str, is_resume: impl Fn(&str) -> bool) -> String {
    text.lines()
        .filter(|line| !is_resume(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
#[path = "resume_tests.rs"]
mod tests;
