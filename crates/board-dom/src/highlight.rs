//! Search-term highlighting over a subtree
//!
//! The render layer only talks to [`Highlighter`]; how terms are matched is up
//! to the implementation. [`RegexHighlighter`] splits the query on whitespace
//! and marks each word case-insensitively, the way most text-marking
//! libraries behave by default.

use crate::element::Element;
use regex::{Regex, RegexBuilder};

/// Applies and clears highlight marks on a subtree
pub trait Highlighter: Send + Sync {
    /// Mark every occurrence of `query` under `root`, returning the mark count
    fn mark(&self, root: &Element, query: &str) -> usize;

    /// Remove every mark under `root`
    fn unmark(&self, root: &Element);
}

/// Literal, word-separated matcher backed by `regex`
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexHighlighter {
    case_sensitive: bool,
}

impl RegexHighlighter {
    /// Case-insensitive highlighter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle case sensitivity
    #[inline]
    #[must_use]
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    fn pattern(&self, query: &str) -> Option<Regex> {
        let mut words: Vec<&str> = query.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        // longest first so overlapping words prefer the longer match
        words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        words.dedup();
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&alternation)
            .case_insensitive(!self.case_sensitive)
            .build()
            .ok()
    }
}

impl Highlighter for RegexHighlighter {
    fn mark(&self, root: &Element, query: &str) -> usize {
        let Some(pattern) = self.pattern(query) else {
            return 0;
        };
        let mut count = 0;
        for node in root.descendants() {
            let text = node.text();
            for found in pattern.find_iter(&text) {
                node.push_mark(found.range());
                count += 1;
            }
        }
        count
    }

    fn unmark(&self, root: &Element) {
        for node in root.descendants() {
            node.clear_marks();
        }
    }
}
