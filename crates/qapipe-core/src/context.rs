//! Assembly of the auxiliary-context block injected ahead of the question.
//!
//! The buffer is append-only within one question's lifecycle: search block
//! first (when search ran), then the file block (when a file was wanted).
//! Nothing here can fail; degraded inputs render as degraded text.

use crate::{FileOutcome, SearchResult};

/// Render search results the way the prompt expects them: a header line,
/// then one numbered stanza per result with a 50-dash rule between them.
pub fn render_search_results(query: &str, results: &[SearchResult]) -> String {
    let mut out = format!("Search results for '{query}':\n\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("Result {}:\n", i + 1));
        out.push_str(&format!(
            "Title: {}\n",
            r.title.as_deref().unwrap_or("No title")
        ));
        out.push_str(&format!(
            "Content: {}\n",
            r.snippet.as_deref().unwrap_or("No content")
        ));
        out.push_str(&format!("URL: {}\n", r.url));
        out.push_str(&"-".repeat(50));
        out.push_str("\n\n");
    }
    out
}

#[derive(Debug, Default)]
pub struct ContextBuilder {
    buf: String,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append the web-search block. `rendered` is either the output of
    /// [`render_search_results`] or a search-failure message; both belong in
    /// the prompt verbatim.
    pub fn push_search_results(&mut self, rendered: &str) {
        self.buf.push_str("\n\nWeb Search Results:\n");
        self.buf.push_str(rendered);
        self.buf.push('\n');
    }

    /// Append the file block for whatever the file fetch/interpretation
    /// produced.
    pub fn push_file(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Unavailable { reason } => {
                self.buf.push_str(&format!(
                    "\n\nNote: The associated file could not be retrieved ({reason}). \
                     The question will be answered from its text alone; if it requires \
                     reading the file, the answer may be incomplete.\n"
                ));
            }
            FileOutcome::Tabular {
                preview,
                columns,
                total_rows,
            } => {
                self.buf.push_str(&format!(
                    "\n\nFile Content:\nTable preview (first rows):\n{preview}\n\n\
                     Column names: {}\nTotal rows: {total_rows}\n",
                    columns.join(", ")
                ));
            }
            FileOutcome::PlainText { snippet, truncated } => {
                self.buf
                    .push_str("\n\nFile Content (text interpretation):\n");
                self.buf.push_str(snippet);
                if *truncated {
                    self.buf.push_str("\n[truncated]");
                }
                self.buf.push('\n');
            }
            FileOutcome::Binary { byte_count } => {
                self.buf.push_str(&format!(
                    "\n\nFile: [Binary file, {byte_count} bytes - could not parse]\n"
                ));
            }
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, title: Option<&str>, snippet: Option<&str>) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: title.map(|s| s.to_string()),
            snippet: snippet.map(|s| s.to_string()),
            source: "tavily".to_string(),
        }
    }

    #[test]
    fn search_results_render_numbered_stanzas() {
        let rendered = render_search_results(
            "population Canada",
            &[
                result("https://a.example", Some("A"), Some("alpha")),
                result("https://b.example", None, None),
            ],
        );
        assert!(rendered.starts_with("Search results for 'population Canada':"));
        assert!(rendered.contains("Result 1:\nTitle: A\nContent: alpha\nURL: https://a.example"));
        assert!(rendered.contains("Result 2:\nTitle: No title\nContent: No content"));
        assert!(rendered.contains(&"-".repeat(50)));
    }

    #[test]
    fn search_block_precedes_file_block() {
        let mut ctx = ContextBuilder::new();
        ctx.push_search_results("Search results for 'q':\n\n");
        ctx.push_file(&FileOutcome::Binary { byte_count: 9 });
        let text = ctx.finish();
        let search_at = text.find("Web Search Results:").unwrap();
        let file_at = text.find("Binary file, 9 bytes").unwrap();
        assert!(search_at < file_at);
    }

    #[test]
    fn binary_outcome_renders_byte_count() {
        let mut ctx = ContextBuilder::new();
        ctx.push_file(&FileOutcome::Binary { byte_count: 4096 });
        assert!(ctx
            .finish()
            .contains("File: [Binary file, 4096 bytes - could not parse]"));
    }

    #[test]
    fn tabular_outcome_renders_columns_and_row_count() {
        let mut ctx = ContextBuilder::new();
        ctx.push_file(&FileOutcome::Tabular {
            preview: "1 | 2".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            total_rows: 120,
        });
        let text = ctx.finish();
        assert!(text.contains("File Content:"));
        assert!(text.contains("Column names: a, b"));
        assert!(text.contains("Total rows: 120"));
    }

    #[test]
    fn unavailable_outcome_keeps_the_reason() {
        let mut ctx = ContextBuilder::new();
        ctx.push_file(&FileOutcome::Unavailable {
            reason: "HTTP 404".to_string(),
        });
        assert!(ctx.finish().contains("could not be retrieved (HTTP 404)"));
    }
}
