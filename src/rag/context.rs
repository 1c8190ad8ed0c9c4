// Context formatter: renders allocated documents into a prompt block
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::TokenCounter;
use crate::types::AllocatedDocument;

/// Truncation points, most preferred first; the second value is how many
/// bytes of the match are kept
const BOUNDARIES: &[(&str, usize)] = &[
    ("\n\n", 0),
    (".\n", 1),
    ("!\n", 1),
    ("?\n", 1),
    (". ", 1),
    ("! ", 1),
    ("? ", 1),
];

/// Context rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Per-document header layout
    pub header_style: HeaderStyle,
    /// Emit a `Source:` line for documents that carry one
    pub include_source: bool,
    /// Placed between rendered documents
    pub separator: String,
    /// Instruction placed before the documents
    pub prefix: Option<String>,
    /// Instruction placed after the documents
    pub suffix: Option<String>,
    /// Appended whenever content was cut
    pub truncation_marker: String,
    /// Characters assumed per token when sizing a cut
    pub chars_per_token: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            header_style: HeaderStyle::Markdown,
            include_source: true,
            separator: "\n\n---\n\n".to_string(),
            prefix: Some(
                "Use the following documents to answer the user's question.".to_string(),
            ),
            suffix: None,
            truncation_marker: "\n\n[truncated]".to_string(),
            chars_per_token: 4,
        }
    }
}

/// Header layout for each document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStyle {
    /// `## Title`
    Markdown,
    /// `[Document 1] Title`
    Bracketed,
    /// `1. Title`
    Numbered,
}

/// Per-document rendering report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
    pub title: String,
    /// Estimated tokens of the rendered block (header, source and content)
    pub tokens: usize,
    pub truncated: bool,
    pub score: Option<f64>,
    /// Share of all rendered document tokens, one decimal
    pub percentage: f64,
}

/// Rendered context block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedContext {
    pub text: String,
    pub documents: Vec<DocumentMetadata>,
}

/// Renders allocated documents into text
#[derive(Debug, Clone)]
pub struct ContextFormatter {
    config: FormatConfig,
    counter: Arc<TokenCounter>,
}

impl ContextFormatter {
    /// Create new formatter with default config
    pub fn new(counter: Arc<TokenCounter>) -> Self {
        Self::with_config(FormatConfig::default(), counter)
    }

    /// Create with custom configuration
    pub fn with_config(config: FormatConfig, counter: Arc<TokenCounter>) -> Self {
        Self { config, counter }
    }

    /// Render documents in order, cutting content that exceeds its allocation
    pub fn render(&self, documents: &[AllocatedDocument]) -> RenderedContext {
        self.render_for_model(documents, None)
    }

    /// Render with truncation and metadata sized by `model_id`'s tokenizer
    pub fn render_for_model(
        &self,
        documents: &[AllocatedDocument],
        model_id: Option<&str>,
    ) -> RenderedContext {
        if documents.is_empty() {
            return RenderedContext::default();
        }

        let mut blocks = Vec::with_capacity(documents.len());
        let mut metadata = Vec::with_capacity(documents.len());

        for (idx, allocated) in documents.iter().enumerate() {
            let doc = &allocated.document;

            let (content, truncated) = if allocated.content_tokens > allocated.allocated_tokens {
                self.truncate_for_model(&doc.content, allocated.allocated_tokens, model_id)
            } else {
                (doc.content.clone(), false)
            };

            let mut block = self.header(idx + 1, allocated);
            if self.config.include_source {
                if let Some(source) = &doc.source {
                    block.push_str(&format!("Source: {}\n", source));
                }
            }
            block.push_str(&content);

            metadata.push(DocumentMetadata {
                id: doc.id.clone(),
                title: doc.title.clone(),
                tokens: self.counter.count(&block, model_id),
                truncated,
                score: allocated.effective_score(),
                percentage: 0.0,
            });
            blocks.push(block);
        }

        let total: usize = metadata.iter().map(|m| m.tokens).sum();
        for entry in &mut metadata {
            entry.percentage = if total == 0 {
                0.0
            } else {
                (entry.tokens as f64 / total as f64 * 1000.0).round() / 10.0
            };
        }

        let mut sections = Vec::with_capacity(3);
        if let Some(prefix) = &self.config.prefix {
            sections.push(prefix.clone());
        }
        sections.push(blocks.join(&self.config.separator));
        if let Some(suffix) = &self.config.suffix {
            sections.push(suffix.clone());
        }

        RenderedContext {
            text: sections.join("\n\n"),
            documents: metadata,
        }
    }

    /// Cut `content` to roughly `allocated_tokens`, preferring paragraph and
    /// sentence boundaries
    ///
    /// The returned text (marker included) never counts above
    /// `allocated_tokens + tokens(marker)`.
    pub fn truncate(&self, content: &str, allocated_tokens: usize) -> (String, bool) {
        self.truncate_for_model(content, allocated_tokens, None)
    }

    /// Truncate measuring with `model_id`'s tokenizer when one resolves
    pub fn truncate_for_model(
        &self,
        content: &str,
        allocated_tokens: usize,
        model_id: Option<&str>,
    ) -> (String, bool) {
        if self.counter.count(content, model_id) <= allocated_tokens {
            return (content.to_string(), false);
        }

        let marker = &self.config.truncation_marker;
        let limit = allocated_tokens + self.counter.count(marker, model_id);
        let mut max_chars = allocated_tokens * self.config.chars_per_token;

        loop {
            let cut = cut_at_boundary(content, max_chars).trim_end();
            let candidate = format!("{}{}", cut, marker);
            let tokens = self.counter.count(&candidate, model_id);

            if tokens <= limit || max_chars == 0 {
                tracing::debug!(allocated_tokens, tokens, chars = cut.len(), "truncated content");
                return (candidate, true);
            }

            max_chars = (max_chars * allocated_tokens / tokens).min(max_chars - 1);
        }
    }

    /// Tokens spent on prefix, suffix and separators for `doc_count` documents
    pub fn overhead_tokens(&self, doc_count: usize) -> usize {
        self.overhead_tokens_for_model(doc_count, None)
    }

    /// Overhead measured with `model_id`'s tokenizer when one resolves
    pub fn overhead_tokens_for_model(&self, doc_count: usize, model_id: Option<&str>) -> usize {
        if doc_count == 0 {
            return 0;
        }

        let wrappers = [self.config.prefix.as_deref(), self.config.suffix.as_deref()]
            .into_iter()
            .flatten()
            .map(|text| self.counter.count(text, model_id) + self.counter.count("\n\n", model_id))
            .sum::<usize>();
        let separators = (doc_count - 1) * self.counter.count(&self.config.separator, model_id);

        wrappers + separators
    }

    /// Prepend rendered context to a user prompt
    pub fn augment_prompt(&self, prompt: &str, rendered: &RenderedContext) -> String {
        if rendered.documents.is_empty() {
            // No relevant context found
            return prompt.to_string();
        }

        format!("{}\n\nUser Query: {}", rendered.text, prompt)
    }

    /// Get current configuration
    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    fn header(&self, index: usize, allocated: &AllocatedDocument) -> String {
        let doc = &allocated.document;
        let title = if doc.title.trim().is_empty() {
            doc.id.as_str()
        } else {
            doc.title.as_str()
        };

        match self.config.header_style {
            HeaderStyle::Markdown => format!("## {}\n", title),
            HeaderStyle::Bracketed => format!("[Document {}] {}\n", index, title),
            HeaderStyle::Numbered => format!("{}. {}\n", index, title),
        }
    }
}

/// Prefix of at most `max_chars` characters ending at the last occurrence of
/// the most preferred boundary found in the second half of the window; a
/// hard cut at the window end when no boundary qualifies
fn cut_at_boundary(content: &str, max_chars: usize) -> &str {
    let end = content
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(content.len());
    let window = &content[..end];
    if end == content.len() {
        return window;
    }

    let min_cut = (window.len() / 2).max(1);
    for (pattern, keep) in BOUNDARIES {
        if let Some(pos) = window.rfind(pattern) {
            if pos + keep >= min_cut {
                return &window[..pos + keep];
            }
        }
    }

    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn formatter(config: FormatConfig) -> ContextFormatter {
        ContextFormatter::with_config(config, Arc::new(TokenCounter::new()))
    }

    fn bare_config() -> FormatConfig {
        FormatConfig {
            prefix: None,
            suffix: None,
            ..Default::default()
        }
    }

    fn allocated(doc: Document, allocated_tokens: usize) -> AllocatedDocument {
        let content_tokens = TokenCounter::new().estimate(&doc.content);
        AllocatedDocument {
            document: doc,
            priority_score: None,
            header_tokens: 20,
            content_tokens,
            allocated_tokens,
            total_allocated: allocated_tokens + 20,
            truncated: content_tokens > allocated_tokens,
        }
    }

    #[test]
    fn test_render_empty() {
        let rendered = formatter(FormatConfig::default()).render(&[]);
        assert_eq!(rendered.text, "");
        assert!(rendered.documents.is_empty());
    }

    #[test]
    fn test_render_single_document() {
        let doc = Document::new("a", "Ownership", "Values have one owner.")
            .with_source("book/ch04.md")
            .with_score(0.8);

        let rendered = formatter(bare_config()).render(&[allocated(doc, 100)]);

        assert_eq!(
            rendered.text,
            "## Ownership\nSource: book/ch04.md\nValues have one owner."
        );
        assert_eq!(rendered.documents.len(), 1);
        assert_eq!(rendered.documents[0].percentage, 100.0);
        assert_eq!(rendered.documents[0].score, Some(0.8));
        assert!(!rendered.documents[0].truncated);
    }

    #[test]
    fn test_source_can_be_hidden() {
        let doc = Document::new("a", "T", "body").with_source("somewhere");
        let config = FormatConfig {
            include_source: false,
            ..bare_config()
        };
        let rendered = formatter(config).render(&[allocated(doc, 100)]);
        assert!(!rendered.text.contains("Source:"));
    }

    #[test]
    fn test_prefix_suffix_and_separator() {
        let config = FormatConfig {
            prefix: Some("BEGIN".to_string()),
            suffix: Some("END".to_string()),
            separator: "\n===\n".to_string(),
            ..Default::default()
        };
        let docs = vec![
            allocated(Document::new("a", "A", "first"), 100),
            allocated(Document::new("b", "B", "second"), 100),
        ];

        let rendered = formatter(config).render(&docs);

        assert_eq!(rendered.text, "BEGIN\n\n## A\nfirst\n===\n## B\nsecond\n\nEND");
    }

    #[test]
    fn test_header_styles() {
        let docs = vec![allocated(Document::new("id-1", "", "text"), 100)];

        let bracketed = formatter(FormatConfig {
            header_style: HeaderStyle::Bracketed,
            ..bare_config()
        })
        .render(&docs);
        assert!(bracketed.text.starts_with("[Document 1] id-1\n"));

        let numbered = formatter(FormatConfig {
            header_style: HeaderStyle::Numbered,
            ..bare_config()
        })
        .render(&docs);
        assert!(numbered.text.starts_with("1. id-1\n"));
    }

    #[test]
    fn test_truncates_at_paragraph() {
        let content = format!("Alpha beta gamma delta.\n\n{}", "x".repeat(200));
        let doc = Document::new("a", "T", content);

        let rendered = formatter(bare_config()).render(&[allocated(doc, 10)]);

        assert!(rendered.documents[0].truncated);
        assert!(rendered.text.ends_with("Alpha beta gamma delta.\n\n[truncated]"));
        assert!(!rendered.text.contains('x'));
    }

    #[test]
    fn test_truncates_at_sentence() {
        let f = formatter(bare_config());
        let content = format!("One sentence here. Two sentence here. {}", "y".repeat(100));

        let (text, truncated) = f.truncate(&content, 10);

        assert!(truncated);
        assert_eq!(text, "One sentence here. Two sentence here.\n\n[truncated]");
    }

    #[test]
    fn test_early_paragraph_break_loses_to_late_sentence_end() {
        let f = formatter(bare_config());
        let content = format!(
            "Short.\n\n{}end. {}",
            "word ".repeat(70),
            "tail ".repeat(100)
        );

        let (text, truncated) = f.truncate(&content, 100);

        assert!(truncated);
        assert!(text.starts_with("Short.\n\nword"));
        assert!(text.ends_with("word end.\n\n[truncated]"));
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        let f = formatter(bare_config());
        let (text, truncated) = f.truncate(&"z".repeat(400), 10);

        assert!(truncated);
        assert_eq!(text, format!("{}\n\n[truncated]", "z".repeat(40)));
    }

    #[test]
    fn test_truncate_respects_estimate() {
        let f = formatter(bare_config());
        let counter = TokenCounter::new();
        let marker_tokens = counter.estimate("\n\n[truncated]");
        // dense with spaces and punctuation so chars/4 underestimates
        let content = "a, b; c! d? e. f: g - h ".repeat(60);

        for allocated_tokens in [1, 5, 17, 40, 90] {
            let (text, _) = f.truncate(&content, allocated_tokens);
            assert!(counter.estimate(&text) <= allocated_tokens + marker_tokens);
        }
    }

    #[test]
    fn test_content_within_budget_untouched() {
        let f = formatter(bare_config());
        let (text, truncated) = f.truncate("short text", 50);
        assert_eq!(text, "short text");
        assert!(!truncated);
    }

    #[test]
    fn test_unicode_safe_cut() {
        let f = formatter(bare_config());
        let (text, truncated) = f.truncate(&"日本語".repeat(100), 5);
        assert!(truncated);
        assert!(text.starts_with("日本語"));
    }

    #[test]
    fn test_percentages() {
        let docs = vec![
            allocated(Document::new("a", "A", "a".repeat(300)), 1000),
            allocated(Document::new("b", "B", "b".repeat(100)), 1000),
        ];

        let rendered = formatter(bare_config()).render(&docs);
        let total: f64 = rendered.documents.iter().map(|d| d.percentage).sum();

        assert!((total - 100.0).abs() < 0.2);
        assert!(rendered.documents[0].percentage > rendered.documents[1].percentage);
    }

    #[test]
    fn test_overhead_tokens() {
        let f = formatter(FormatConfig {
            prefix: Some("a".repeat(40)),
            suffix: None,
            separator: "----".to_string(),
            ..Default::default()
        });
        assert_eq!(f.overhead_tokens(0), 0);
        // prefix 10 + joiner 1, two separators of 1
        assert_eq!(f.overhead_tokens(3), 13);
    }

    #[test]
    fn test_augment_prompt() {
        let f = formatter(FormatConfig::default());
        let docs = vec![allocated(Document::new("a", "A", "Background info"), 100)];
        let rendered = f.render(&docs);

        let augmented = f.augment_prompt("What is the answer?", &rendered);
        assert!(augmented.contains("Background info"));
        assert!(augmented.ends_with("User Query: What is the answer?"));

        let plain = f.augment_prompt("What?", &RenderedContext::default());
        assert_eq!(plain, "What?");
    }
}
