//! Text preprocessing
//!
//! Turns a document body into the units a relevance engine scores:
//! 1. Normalise: drop encoding artifacts and control characters, strip a
//!    leading "Abstract" label, collapse whitespace
//! 2. Split by granularity (whole abstract, paragraphs, sentences)
//! 3. Truncate each unit to the model input budget, at a sentence boundary
//!    where one fits
//!
//! Deterministic and side-effect free.

use crate::config::{Granularity, PreprocessConfig};
use crate::models::{Document, DocumentId};
use rayon::prelude::*;
use regex_lite::Regex;
use std::sync::OnceLock;
use text_splitter::{Characters, ChunkConfig, TextSplitter};

/// Smallest accepted input budget
const MIN_INPUT_CHARS: usize = 16;

/// Mojibake sequences seen in PDF/JSON extractions and their repairs
const MOJIBAKE: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€˜", "'"),
    ("â€œ", "\""),
    ("â€\u{9d}", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("Â ", " "),
    ("Ã©", "é"),
];

/// Abbreviations whose trailing period does not end a sentence
const ABBREVIATIONS: &[&str] = &["e.g", "i.e", "al", "fig", "figs", "vs", "approx", "no", "dr", "ref", "eq"];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn abstract_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^abstract[:.]?\s+").expect("valid regex"))
}

fn sentence_end_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("valid regex"))
}

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid regex"))
}

/// Units prepared for one document
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedText {
    pub id: DocumentId,
    /// Non-empty, normalised, truncated units; empty when the body is empty
    pub units: Vec<String>,
}

impl PreparedText {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Document body → scoring units
pub struct TextPreprocessor {
    granularity: Granularity,
    max_chars: usize,
    splitter: TextSplitter<Characters>,
}

impl TextPreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self::with_granularity(config.granularity, config.max_input_chars)
    }

    pub fn with_granularity(granularity: Granularity, max_chars: usize) -> Self {
        let max_chars = max_chars.max(MIN_INPUT_CHARS);
        Self {
            granularity,
            max_chars,
            splitter: TextSplitter::new(ChunkConfig::new(max_chars)),
        }
    }

    /// Split a document into units at the configured granularity
    pub fn prepare(&self, document: &Document) -> PreparedText {
        let units = match self.granularity {
            Granularity::Abstract => self.whole(&document.body).into_iter().collect(),
            Granularity::Paragraphs => paragraph_break_re()
                .split(&repair(&document.body))
                .map(normalize)
                .filter(|p| !p.is_empty())
                .map(|p| self.truncate(&p))
                .collect(),
            Granularity::Sentences => {
                let text = normalize(&repair(&document.body));
                split_sentences(&text)
                    .into_iter()
                    .map(|s| self.truncate(s))
                    .collect()
            }
        };

        PreparedText {
            id: document.id.clone(),
            units,
        }
    }

    /// The whole body as one normalised, truncated text
    pub fn prepare_single(&self, document: &Document) -> String {
        self.whole(&document.body).unwrap_or_default()
    }

    /// Prepare a batch in parallel; output order matches input order
    pub fn prepare_all(&self, documents: &[Document]) -> Vec<PreparedText> {
        documents.par_iter().map(|d| self.prepare(d)).collect()
    }

    fn whole(&self, body: &str) -> Option<String> {
        let text = normalize(&repair(body));
        (!text.is_empty()).then(|| self.truncate(&text))
    }

    /// Cut to the input budget, preferring the last sentence boundary that fits
    pub fn truncate(&self, text: &str) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }
        self.splitter
            .chunks(text)
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| text.chars().take(self.max_chars).collect())
    }
}

/// Replace known mojibake and drop invisible or replacement characters
fn repair(raw: &str) -> String {
    let mut text = raw.to_string();
    for (bad, good) in MOJIBAKE {
        if text.contains(bad) {
            text = text.replace(bad, good);
        }
    }
    text.chars()
        .filter(|c| {
            !matches!(c, '\u{fffd}' | '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' | '\u{ad}')
                && (!c.is_control() || c.is_whitespace())
        })
        .collect()
}

/// Collapse whitespace and strip a leading "Abstract" label
fn normalize(text: &str) -> String {
    let collapsed = whitespace_re().replace_all(text.trim(), " ");
    abstract_label_re().replace(&collapsed, "").trim().to_string()
}

/// Split normalised text into sentences, keeping terminal punctuation
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in sentence_end_re().find_iter(text) {
        let before = &text[start..m.start()];
        let last_word = before
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        let next_is_lower = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_lowercase());

        if ABBREVIATIONS.contains(&last_word.as_str()) || next_is_lower {
            continue;
        }

        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::new("d1").with_body(body)
    }

    #[test]
    fn test_normalizes_artifacts_and_label() {
        let pre = TextPreprocessor::with_granularity(Granularity::Abstract, 1000);
        let text = pre.prepare_single(&doc("Abstract:\n  The virusâ€™s  spike\u{fffd} protein\u{200b}."));
        assert_eq!(text, "The virus's spike protein.");
    }

    #[test]
    fn test_empty_body_has_no_units() {
        let pre = TextPreprocessor::with_granularity(Granularity::Sentences, 1000);
        assert!(pre.prepare(&doc("   \n ")).is_empty());
        assert_eq!(pre.prepare_single(&doc("")), "");
    }

    #[test]
    fn test_sentence_split_skips_abbreviations() {
        let pre = TextPreprocessor::with_granularity(Granularity::Sentences, 1000);
        let prepared = pre.prepare(&doc(
            "Smith et al. reported results. Vaccines (e.g. mRNA) work! Is it safe? Yes",
        ));
        assert_eq!(
            prepared.units,
            vec![
                "Smith et al. reported results.",
                "Vaccines (e.g. mRNA) work!",
                "Is it safe?",
                "Yes",
            ]
        );
    }

    #[test]
    fn test_paragraphs() {
        let pre = TextPreprocessor::with_granularity(Granularity::Paragraphs, 1000);
        let prepared = pre.prepare(&doc("First  paragraph.\n\nSecond\nparagraph.\n \n"));
        assert_eq!(prepared.units, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn test_truncation_prefers_sentence_boundary() {
        let pre = TextPreprocessor::with_granularity(Granularity::Abstract, 40);
        let text = pre.prepare_single(&doc(
            "Short first sentence here. A much longer second sentence that overflows.",
        ));
        assert_eq!(text, "Short first sentence here.");
        assert!(text.chars().count() <= 40);
    }

    #[test]
    fn test_prepare_all_preserves_order() {
        let pre = TextPreprocessor::with_granularity(Granularity::Abstract, 100);
        let docs: Vec<Document> = (0..50)
            .map(|i| Document::new(format!("d{}", i)).with_body(format!("Body {}.", i)))
            .collect();
        let prepared = pre.prepare_all(&docs);
        assert_eq!(prepared.len(), 50);
        assert_eq!(prepared[42].id.as_str(), "d42");
        assert_eq!(prepared[42].units, vec!["Body 42."]);
    }
}
