//! Keyword-driven tool selection and search-query compaction.
//!
//! The keyword lists are heuristic boundary data, not contract: they are held
//! as configuration on [`Heuristics`] so tests and callers can swap them,
//! with `Default` carrying the canonical lists.

use serde::Serialize;
use std::collections::BTreeSet;

/// Which auxiliary tools a question needs. Computed once per question from
/// its text alone; never revised mid-pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolDecision {
    pub needs_search: bool,
    pub needs_file: bool,
}

/// Substrings whose presence marks a factual/time-sensitive/attribution
/// question. Matched case-insensitively, not tokenized: a keyword inside an
/// unrelated word still counts.
const SEARCH_KEYWORDS: &[&str] = &[
    "current",
    "latest",
    "recent",
    "today",
    "now",
    "2024",
    "2025",
    "2026",
    "who is",
    "what is",
    "when did",
    "where is",
    "how many",
    "where were",
    "population",
    "price",
    "cost",
    "president",
    "ceo",
    "capital",
    "located",
    "founded",
    "born",
    "died",
    "released",
    "published",
    "paper",
    "study",
    "research",
    "article",
    "journal",
    "publication",
    "described by",
    "deposited",
    "specimens",
    "author",
    "cited",
];

/// Substrings referring to media/document artifacts.
const FILE_KEYWORDS: &[&str] = &[
    "file",
    "image",
    "document",
    "picture",
    "photo",
    "shown",
    "attached",
    "provided",
    "given",
    "painting",
    "chart",
    "graph",
    "table",
    "spreadsheet",
    "pdf",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "to", "for", "of", "with", "by", "from", "just", "give",
    "me", "without",
];

const MAX_QUERY_TERMS: usize = 12;

#[derive(Debug, Clone)]
pub struct Heuristics {
    search_keywords: Vec<String>,
    file_keywords: Vec<String>,
    stop_words: BTreeSet<String>,
    max_query_terms: usize,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::new(
            SEARCH_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            FILE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl Heuristics {
    pub fn new(
        search_keywords: Vec<String>,
        file_keywords: Vec<String>,
        stop_words: BTreeSet<String>,
    ) -> Self {
        Self {
            search_keywords,
            file_keywords,
            stop_words,
            max_query_terms: MAX_QUERY_TERMS,
        }
    }

    /// Decide which tools the question needs.
    ///
    /// `has_file` is whether the question carries an associated file
    /// reference; without one, `needs_file` is false no matter what the text
    /// says. Empty text yields both flags false.
    pub fn decide(&self, question: &str, has_file: bool) -> ToolDecision {
        let lower = question.to_lowercase();
        let needs_search = self
            .search_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()));
        let needs_file =
            has_file && self.file_keywords.iter().any(|k| lower.contains(k.as_str()));
        ToolDecision {
            needs_search,
            needs_file,
        }
    }

    /// Reduce a natural-language question to a compact search query.
    ///
    /// Keeps a token iff it looks like a proper noun (leading uppercase), is
    /// purely numeric once stripped of edge punctuation, or is not a stop
    /// word. At most the first 12 survivors, space-joined. Zero survivors
    /// yield an empty query; the caller still issues the search.
    pub fn build_query(&self, question: &str) -> String {
        let mut terms: Vec<&str> = Vec::new();
        for word in question.split_whitespace() {
            let clean = word.trim_matches(|c| matches!(c, '.' | ',' | '?' | '!'));
            if clean.is_empty() {
                continue;
            }
            let lower = clean.to_lowercase();
            let keep = word.chars().next().is_some_and(char::is_uppercase)
                || lower.chars().all(|c| c.is_ascii_digit())
                || !self.stop_words.contains(lower.as_str());
            if keep {
                terms.push(clean);
                if terms.len() == self.max_query_terms {
                    break;
                }
            }
        }
        terms.join(" ")
    }
}
