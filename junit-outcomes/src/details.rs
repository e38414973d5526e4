// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use regex::Regex;

/// A pattern matching stack frames from the JDK, JUnit and Ant, plus the `... N more` lines that
/// abbreviate repeated frames.
///
/// These lines are rarely useful when reading a failure, and can make up most of a stack trace.
pub const JAVA_FRAMEWORK_FRAMES_PATTERN: &str = r"^\s+(at (java\.|javax\.|jdk\.internal\.|sun\.|org\.junit|org\.opentest4j\.|org\.apache\.tools\.ant)|\.\.\. [0-9]+ more)";

/// The default maximum number of lines kept in outcome details.
pub const DEFAULT_MAX_DETAIL_LINES: usize = 50;

/// Filters the details of an outcome (typically a stack trace) line by line.
#[derive(Clone, Debug)]
pub struct DetailFilter {
    exclude_lines: Option<Regex>,
    max_lines: Option<usize>,
}

impl DetailFilter {
    /// Creates a filter that excludes nothing and keeps up to [`DEFAULT_MAX_DETAIL_LINES`] lines.
    pub fn new() -> Self {
        Self {
            exclude_lines: None,
            max_lines: Some(DEFAULT_MAX_DETAIL_LINES),
        }
    }

    /// Drops lines that match the given pattern.
    pub fn set_exclude_lines(&mut self, exclude_lines: Regex) -> &mut Self {
        self.exclude_lines = Some(exclude_lines);
        self
    }

    /// Caps the number of lines kept, or keeps every line if `None`.
    pub fn set_max_lines(&mut self, max_lines: Option<usize>) -> &mut Self {
        self.max_lines = max_lines;
        self
    }

    /// Returns the exclusion pattern, if any.
    pub fn exclude_lines(&self) -> Option<&Regex> {
        self.exclude_lines.as_ref()
    }

    /// Applies the filter, returning `None` if nothing is left.
    pub fn apply(&self, details: &str) -> Option<String> {
        let kept: Vec<&str> = details
            .lines()
            .filter(|line| {
                self.exclude_lines
                    .as_ref()
                    .is_none_or(|exclude| !exclude.is_match(line))
            })
            .collect();

        // Trailing blank lines are noise left over from the element's text node.
        let end = kept
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |pos| pos + 1);
        let kept = &kept[..end];
        if kept.is_empty() {
            return None;
        }

        match self.max_lines {
            Some(max_lines) if kept.len() > max_lines => {
                let mut out = kept[..max_lines].join("\n");
                out.push_str(&format!("\n... ({} more lines)", kept.len() - max_lines));
                Some(out)
            }
            _ => Some(kept.join("\n")),
        }
    }
}

impl Default for DetailFilter {
    fn default() -> Self {
        Self::new()
    }
}
