use super::{base_metadata, validated};
use crate::config::ChunkingConfig;
use crate::error::{ChunkerError, Result};
use crate::text::{paragraph_groups, Span};
use crate::types::{Chunk, ChunkMetadata, DocumentMetadata};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static HTML_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("valid regex")
});

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static HTML_DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(html|body|div|p|section|article)\b").expect("valid regex")
});

/// Document markup understood by [`DocumentChunker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Html,
    Markdown,
    Plain,
}

impl DocumentFormat {
    /// Get format name as string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Markdown => "markdown",
            Self::Plain => "plain",
        }
    }

    /// Resolve a format name or alias, case-insensitively
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "html" | "htm" | "markup" => Some(Self::Html),
            "markdown" | "marked" | "md" => Some(Self::Markdown),
            "plain" | "text" | "txt" => Some(Self::Plain),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = ChunkerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
            .ok_or_else(|| ChunkerError::invalid_config(format!("unknown document format '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Heading {
    pub start: usize,
    pub level: usize,
    pub title: String,
}

/// Heading recognizers for marked-up and markup text
#[derive(Debug, Clone)]
pub(crate) struct HeadingPatterns {
    markdown: Option<Regex>,
    markers: Vec<String>,
}

impl HeadingPatterns {
    pub fn new(markers: &[String]) -> Result<Self> {
        let mut sorted: Vec<&String> = markers.iter().filter(|m| !m.is_empty()).collect();
        sorted.sort_by(|a, b| b.len().cmp(&a.len()));

        let markdown = if sorted.is_empty() {
            None
        } else {
            let alternation = sorted
                .iter()
                .map(|m| regex::escape(m))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?m)^[ \t]{{0,3}}({alternation})[ \t]+(.+?)[ \t#]*\r?$");
            Some(Regex::new(&pattern).map_err(|e| {
                ChunkerError::invalid_config(format!("invalid header markers: {e}"))
            })?)
        };

        Ok(Self {
            markdown,
            markers: markers.to_vec(),
        })
    }

    pub fn markdown_headings(&self, text: &str) -> Vec<Heading> {
        let Some(pattern) = &self.markdown else {
            return Vec::new();
        };
        pattern
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let marker = caps.get(1)?.as_str();
                let level = self.markers.iter().position(|m| m == marker)? + 1;
                Some(Heading {
                    start: whole.start(),
                    level,
                    title: caps.get(2)?.as_str().trim().to_string(),
                })
            })
            .collect()
    }

    pub fn html_headings(text: &str) -> Vec<Heading> {
        HTML_HEADING
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let level = caps.get(1)?.as_str().parse().ok()?;
                let inner = HTML_TAG.replace_all(caps.get(2)?.as_str(), " ");
                Some(Heading {
                    start: whole.start(),
                    level,
                    title: inner.split_whitespace().collect::<Vec<_>>().join(" "),
                })
            })
            .collect()
    }

    pub fn has_headings(&self, text: &str) -> bool {
        HTML_HEADING.is_match(text) || self.markdown.as_ref().is_some_and(|p| p.is_match(text))
    }

    /// Guess the format of `text` from its headings and tags
    pub fn detect(&self, text: &str) -> DocumentFormat {
        if HTML_HEADING.is_match(text) || HTML_DOCUMENT.is_match(text) {
            DocumentFormat::Html
        } else if self.markdown.as_ref().is_some_and(|p| p.is_match(text)) {
            DocumentFormat::Markdown
        } else {
            DocumentFormat::Plain
        }
    }
}

/// Splits documents along their heading structure.
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    config: ChunkingConfig,
    headings: HeadingPatterns,
}

impl DocumentChunker {
    pub const NAME: &'static str = "document_based";

    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let config = validated(config)?;
        let headings = HeadingPatterns::new(&config.header_markers)?;
        Ok(Self { config, headings })
    }

    /// Format from the `format` metadata key, else detected from the text
    #[must_use]
    pub fn resolve_format(&self, text: &str, metadata: &DocumentMetadata) -> DocumentFormat {
        metadata
            .get("format")
            .and_then(serde_json::Value::as_str)
            .and_then(DocumentFormat::from_name)
            .unwrap_or_else(|| self.headings.detect(text))
    }

    #[must_use]
    pub fn chunk(&self, text: &str, metadata: &DocumentMetadata) -> Vec<Chunk> {
        let format = self.resolve_format(text, metadata);
        let chunks = match format {
            DocumentFormat::Html => {
                self.chunk_sections(text, format, &HeadingPatterns::html_headings(text))
            }
            DocumentFormat::Markdown => {
                self.chunk_sections(text, format, &self.headings.markdown_headings(text))
            }
            DocumentFormat::Plain => self.chunk_plain(text),
        };
        log::debug!("document_based: {} chunks ({format})", chunks.len());
        chunks
    }

    fn chunk_sections(
        &self,
        text: &str,
        format: DocumentFormat,
        headings: &[Heading],
    ) -> Vec<Chunk> {
        let mut sections: Vec<(Span, Option<&Heading>)> = Vec::with_capacity(headings.len() + 1);
        let first_start = headings.first().map_or(text.len(), |h| h.start);
        let preamble = Span::new(0, first_start);
        if preamble.trimmed_chars(text) > 0 {
            sections.push((preamble, None));
        }
        for (idx, heading) in headings.iter().enumerate() {
            let end = headings.get(idx + 1).map_or(text.len(), |next| next.start);
            sections.push((Span::new(heading.start, end), Some(heading)));
        }

        let target = self.config.target_chars();
        let mut chunks = Vec::new();
        for (section_index, (span, heading)) in sections.into_iter().enumerate() {
            let size = span.trimmed_chars(text);
            if size == 0 || size < self.config.min_chunk_size {
                log::trace!("document_based: dropping section #{section_index} ({size} chars)");
                continue;
            }

            let metadata = self.section_metadata(format, heading, section_index);
            if size <= self.config.max_chunk_size {
                chunks.push(Chunk::new(span.start, span.end, span.slice(text), metadata));
                continue;
            }
            for (part, piece) in paragraph_groups(text, span, target).into_iter().enumerate() {
                let metadata = metadata.clone().attr("section_part", part);
                chunks.push(Chunk::new(piece.start, piece.end, piece.slice(text), metadata));
            }
        }
        chunks
    }

    fn section_metadata(
        &self,
        format: DocumentFormat,
        heading: Option<&Heading>,
        section_index: usize,
    ) -> ChunkMetadata {
        let metadata = base_metadata(&self.config, Self::NAME)
            .attr("format", format.as_str())
            .attr("section_index", section_index);
        match heading {
            Some(heading) => metadata
                .attr("header", heading.title.as_str())
                .attr("header_level", heading.level),
            None => metadata,
        }
    }

    fn chunk_plain(&self, text: &str) -> Vec<Chunk> {
        paragraph_groups(text, Span::new(0, text.len()), self.config.target_chars())
            .into_iter()
            .enumerate()
            .map(|(idx, group)| {
                let metadata = base_metadata(&self.config, Self::NAME)
                    .attr("format", DocumentFormat::Plain.as_str())
                    .attr("section_index", idx);
                Chunk::new(group.start, group.end, group.slice(text), metadata)
            })
            .collect()
    }
}
