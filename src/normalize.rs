//! Multi-stage text normalization for extracted (OCR-grade) document text.
//!
//! The pipeline is an ordered list of total transforms. Every stage returns
//! its input unchanged when its pattern is absent (stages are best-effort
//! filters, never required to change the text), so the pipeline is safe to
//! run on text that has already passed through it once.
//!
//! Stage order:
//! 1. Front-matter trim at a configured start marker.
//! 2. Section excision (end marker + named non-content blocks).
//! 3. Hyphenation and paragraph repair.
//! 4. Artifact removal (running headers/footers, page numbers, citations).
//! 5. Character and whitespace normalization.
//! 6. Final polish (newline collapse, trim).

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::config::NormalizeConfig;

/// Compiled normalization pipeline. Construction validates the configured
/// header patterns so bad regexes fail at startup, not per document.
pub struct Normalizer {
    start_marker: Option<String>,
    end_marker: Option<String>,
    excise_sections: Vec<String>,
    header_re: Option<Regex>,
}

fn page_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*\d+[ \t]*$").unwrap())
}

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\s*(?:source:)?\s*\d+\s*\]").unwrap())
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").unwrap())
}

fn space_before_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([,.!?;:])").unwrap())
}

fn newline_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Result<Self> {
        let header_re = if config.header_patterns.is_empty() {
            None
        } else {
            let joined = config.header_patterns.join("|");
            let pattern = format!(r"(?m)^[ \t]*(?:{joined})[ \t]*$");
            Some(
                Regex::new(&pattern)
                    .with_context(|| format!("Invalid normalize.header_patterns: {joined}"))?,
            )
        };

        Ok(Self {
            start_marker: config.start_marker.clone(),
            end_marker: config.end_marker.clone(),
            excise_sections: config.excise_sections.clone(),
            header_re,
        })
    }

    /// Run the full pipeline. Pure and deterministic: no I/O, and
    /// `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, text: &str) -> String {
        let text = self.trim_front_matter(text);
        let text = self.excise_sections(&text);
        let text = repair_paragraphs(&text);
        let text = self.remove_artifacts(&text);
        let text = normalize_characters(&text);
        final_polish(&text)
    }

    /// Stage 1: drop everything before the start marker, keeping the marker.
    fn trim_front_matter(&self, text: &str) -> String {
        let Some(marker) = self.start_marker.as_deref() else {
            return text.to_string();
        };
        match text.find(marker) {
            Some(pos) => text[pos..].to_string(),
            None => {
                debug!("normalize: start marker not found, skipping front-matter trim");
                text.to_string()
            }
        }
    }

    /// Stage 2: truncate at the end marker and drop named non-content blocks
    /// up to the next blank line (or end of text).
    fn excise_sections(&self, text: &str) -> String {
        let mut out = match self.end_marker.as_deref().and_then(|m| text.find(m)) {
            Some(pos) => text[..pos].to_string(),
            None => {
                if self.end_marker.is_some() {
                    debug!("normalize: end marker not found, skipping truncation");
                }
                text.to_string()
            }
        };

        for heading in &self.excise_sections {
            out = excise_block(&out, heading);
        }
        out
    }

    /// Stage 4: strip running headers/footers, page-number lines, and
    /// bracketed citation markers.
    fn remove_artifacts(&self, text: &str) -> String {
        let text = match &self.header_re {
            Some(re) => re.replace_all(text, ""),
            None => std::borrow::Cow::Borrowed(text),
        };
        let text = page_number_re().replace_all(&text, "");
        citation_re().replace_all(&text, "").into_owned()
    }
}

/// Remove every occurrence of `heading` together with the text that follows
/// it, up to (not including) the next blank line, or to the end of text.
fn excise_block(text: &str, heading: &str) -> String {
    if heading.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(heading) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        // Search for the blank line strictly past the heading, or a heading
        // that itself contains one would keep matching in place forever.
        match tail[heading.len()..].find("\n\n") {
            Some(end) => rest = &tail[heading.len() + end..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

/// Stage 3: merge hyphen-broken line wraps, then collapse single newlines
/// inside a paragraph into spaces while preserving blank-line paragraph
/// breaks. Idempotent: after one pass no single newline remains.
fn repair_paragraphs(text: &str) -> String {
    let text = text.replace("-\n", "");

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut prev = '\0';
    while let Some(c) = chars.next() {
        if c == '\n' && prev != '\n' && chars.peek() != Some(&'\n') {
            out.push(' ');
        } else {
            out.push(c);
        }
        prev = c;
    }
    out
}

/// Stage 5: typographic characters to ASCII, collapse space runs, drop
/// space before punctuation.
fn normalize_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2014}' | '\u{2013}' => out.push('-'),
            _ => out.push(c),
        }
    }
    let out = space_run_re().replace_all(&out, " ");
    space_before_punct_re().replace_all(&out, "$1").into_owned()
}

/// Stage 6: collapse 3+ consecutive newlines to exactly 2 and trim ends.
fn final_polish(text: &str) -> String {
    newline_run_re().replace_all(text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> NormalizeConfig {
        NormalizeConfig {
            start_marker: Some("Welcome to the Archive!".to_string()),
            end_marker: Some("Appendix A:".to_string()),
            excise_sections: vec![
                "Questions for Discussion".to_string(),
                "Media Attributions".to_string(),
            ],
            header_patterns: vec![
                r"Archive Quarterly\s+\d+".to_string(),
                r"\d+\s+J\. Doe".to_string(),
            ],
        }
    }

    #[test]
    fn front_matter_trimmed_at_marker() {
        let n = Normalizer::new(&full_config()).unwrap();
        let out = n.normalize("Title page\n\nContents\n\nWelcome to the Archive! The story begins.");
        assert!(out.starts_with("Welcome to the Archive!"));
        assert!(!out.contains("Title page"));
    }

    #[test]
    fn missing_marker_passes_text_through() {
        let n = Normalizer::new(&full_config()).unwrap();
        let out = n.normalize("No marker here.\n\nJust two paragraphs.");
        assert!(out.contains("No marker here."));
        assert!(out.contains("Just two paragraphs."));
    }

    #[test]
    fn end_marker_truncates() {
        let n = Normalizer::new(&full_config()).unwrap();
        let out = n.normalize("Welcome to the Archive! Body text.\n\nAppendix A: extra tables");
        assert!(!out.contains("Appendix A"));
        assert!(!out.contains("extra tables"));
    }

    #[test]
    fn named_blocks_excised_to_blank_line() {
        let n = Normalizer::new(&full_config()).unwrap();
        let out = n.normalize(
            "Welcome to the Archive! Real content.\n\nQuestions for Discussion\n1. Why?\n2. How?\n\nMore real content.",
        );
        assert!(!out.contains("Questions for Discussion"));
        assert!(!out.contains("1. Why?"));
        assert!(out.contains("More real content."));
    }

    #[test]
    fn excised_heading_may_contain_a_blank_line() {
        // A heading configured with a leading blank line must still advance
        // past each match instead of re-matching the same spot.
        let config = NormalizeConfig {
            excise_sections: vec!["\n\nMedia Attributions".to_string()],
            ..NormalizeConfig::default()
        };
        let n = Normalizer::new(&config).unwrap();
        let out = n.normalize(
            "Body text.\n\nMedia Attributions\nFig 1 by A. Painter\n\nMore body.\n\nMedia Attributions\nFig 2",
        );
        assert!(!out.contains("Media Attributions"));
        assert!(!out.contains("Fig 1"));
        assert!(!out.contains("Fig 2"));
        assert!(out.contains("Body text."));
        assert!(out.contains("More body."));
    }

    #[test]
    fn hyphenation_and_wraps_repaired() {
        let n = Normalizer::new(&NormalizeConfig::default()).unwrap();
        let out = n.normalize("The indus-\ntrial revolution\nchanged everything.\n\nNext paragraph.");
        assert!(out.contains("industrial revolution changed everything."));
        assert!(out.contains("\n\nNext paragraph."));
    }

    #[test]
    fn headers_page_numbers_and_citations_removed() {
        let n = Normalizer::new(&full_config()).unwrap();
        let out = n.normalize(
            "Welcome to the Archive! Facts [12] and more facts [source: 3].\n\nArchive Quarterly 17\n\n42\n\nClosing text.",
        );
        assert!(!out.contains("[12]"));
        assert!(!out.contains("[source: 3]"));
        assert!(!out.contains("Archive Quarterly"));
        assert!(!out.contains("\n42"));
        assert!(out.contains("Closing text."));
    }

    #[test]
    fn typographic_characters_mapped_to_ascii() {
        let n = Normalizer::new(&NormalizeConfig::default()).unwrap();
        let out = n.normalize("\u{201C}Hello\u{201D} \u{2014} it\u{2019}s fine .");
        assert_eq!(out, "\"Hello\" - it's fine.");
    }

    #[test]
    fn newline_runs_collapsed() {
        let n = Normalizer::new(&NormalizeConfig::default()).unwrap();
        let out = n.normalize("One.\n\n\n\n\nTwo.");
        assert_eq!(out, "One.\n\nTwo.");
    }

    #[test]
    fn pipeline_is_idempotent() {
        let n = Normalizer::new(&full_config()).unwrap();
        let samples = [
            "Front junk\n\nWelcome to the Archive! The indus-\ntrial era [1] began .\n\n\n\nArchive Quarterly 9\n\nQuestions for Discussion\nQ1\n\nEnd of chapter.\n\nAppendix A: data",
            "Plain text with no markers at all.\n\nSecond paragraph,  spaced  oddly .",
            "",
            "   \n\n  ",
        ];
        for sample in samples {
            let once = n.normalize(sample);
            let twice = n.normalize(&once);
            assert_eq!(once, twice, "pipeline not idempotent for {sample:?}");
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let n = Normalizer::new(&NormalizeConfig::default()).unwrap();
        assert_eq!(n.normalize(""), "");
    }
}
