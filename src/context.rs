//! Suppression of code-shaped numbers that are really measurements.
//!
//! A bare `250` is a perfectly well-formed code, but in `Năng lượng 250kcal`
//! or `Khối lượng tịnh: 250 g` it is not an additive. The filter looks at a
//! short window on each side of an unprefixed match.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::code::Span;
use crate::normalize::fold;

lazy_static! {
    // units that are written after a space ("250 g") as often as without one
    static ref MASS_VOLUME_SUFFIX: Regex = Regex::new(r"^\s*(?:mg|kg|ml|g|l)\b").unwrap();
    // units that are usually glued to the number ("250kcal")
    static ref ENERGY_SUFFIX: Regex =
        Regex::new(r"^\s*(?:kcal|cal|kj|joule|oz|lb|ug|µg|mcg)\b").unwrap();
    static ref PER_100G: Regex = Regex::new(r"(?:per|/)\s*100\s*g\b").unwrap();
    static ref NUMBER_UNIT_PAIR: Regex =
        Regex::new(r"\b\d+\s*(?:kcal|cal|kj|joule|mcg|ug|µg|mg|kg|ml|oz|lb|g|l)\b").unwrap();
    static ref NUMERIC_RESIDUE: Regex = Regex::new(r"[0-9\s;:.,()/%]+").unwrap();
}

/// Every unit the lookahead knows about, for letter runs glued to digits.
pub const UNIT_WORDS: &[&str] = &[
    "g", "mg", "kg", "l", "ml", "kcal", "cal", "kj", "joule", "oz", "lb", "ug", "µg", "mcg",
];

pub const DEFAULT_UNIT_KEYWORDS: &[&str] = &[
    "khoi luong",
    "khoi luong tinh",
    "trong luong",
    "net weight",
    "net wt",
    "weight",
    "gia tri dinh duong",
    "nutrition",
    "nutritional",
    "energy",
    "protein",
    "fat",
    "carb",
    "sugar",
    "sodium",
    "salt",
];

/// Why a match was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suppression {
    UnitKeyword(String),
    UnitSuffix,
    PerHundredGrams,
}

#[derive(Debug, Clone)]
pub struct ContextFilter {
    keywords: Vec<String>,
    lookbehind_chars: usize,
}

impl Default for ContextFilter {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_UNIT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            lookbehind_chars: 28,
        }
    }
}

impl ContextFilter {
    const SPACED_UNIT_WINDOW: usize = 8;
    const GLUED_UNIT_WINDOW: usize = 10;
    const AROUND_WINDOW: usize = 12;

    /// Adds keywords (folded before use) on top of the defaults.
    pub fn with_extra_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let folded = fold(keyword.as_ref().trim());
            if !folded.is_empty() && !self.keywords.contains(&folded) {
                self.keywords.push(folded);
            }
        }
        self
    }

    pub fn with_lookbehind(mut self, chars: usize) -> Self {
        self.lookbehind_chars = chars;
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns the first reason to drop the match at `span`, if any.
    pub fn rejection(&self, text: &str, span: Span) -> Option<Suppression> {
        let before = fold(chars_before(text, span.start, self.lookbehind_chars));
        if let Some(keyword) = self.keywords.iter().find(|k| before.contains(k.as_str())) {
            trace!(keyword = %keyword, start = span.start, "unit keyword before match");
            return Some(Suppression::UnitKeyword(keyword.clone()));
        }
        let after = fold(chars_after(text, span.end, Self::SPACED_UNIT_WINDOW));
        if MASS_VOLUME_SUFFIX.is_match(&after) {
            return Some(Suppression::UnitSuffix);
        }
        let after = fold(chars_after(text, span.end, Self::GLUED_UNIT_WINDOW));
        if ENERGY_SUFFIX.is_match(&after) {
            return Some(Suppression::UnitSuffix);
        }
        let around_start = span.start - chars_before(text, span.start, Self::AROUND_WINDOW).len();
        let around_end = span.end + chars_after(text, span.end, Self::AROUND_WINDOW).len();
        if PER_100G.is_match(&fold(&text[around_start..around_end])) {
            return Some(Suppression::PerHundredGrams);
        }
        None
    }

    /// Byte spans of lines made only of numbers, units and punctuation.
    ///
    /// Bare numerals on such lines (`250 g`, `12, 45`) are not codes.
    pub fn units_only_lines(&self, text: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            let folded = fold(line);
            let without_pairs = NUMBER_UNIT_PAIR.replace_all(&folded, "");
            let residue = NUMERIC_RESIDUE.replace_all(&without_pairs, "");
            if residue.trim().is_empty() && line.chars().any(|c| c.is_ascii_digit()) {
                spans.push(Span::new(start, offset));
            }
        }
        spans
    }
}

/// Letter runs that are units (`g`, `kcal`, ...) rather than code suffixes.
pub fn is_unit_word(letters: &str) -> bool {
    let folded = fold(letters);
    UNIT_WORDS.contains(&folded.as_str())
}

fn chars_before(text: &str, end: usize, count: usize) -> &str {
    let head = &text[..end];
    let start = head
        .char_indices()
        .rev()
        .nth(count.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if count == 0 { &head[end..] } else { &head[start..] }
}

fn chars_after(text: &str, start: usize, count: usize) -> &str {
    let tail = &text[start..];
    let end = tail.char_indices().nth(count).map(|(i, _)| i).unwrap_or(tail.len());
    &tail[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_of(text: &str, needle: &str) -> Span {
        let start = text.find(needle).unwrap();
        Span::new(start, start + needle.len())
    }

    #[test]
    fn keyword_before_the_number() {
        let filter = ContextFilter::default();
        let text = "Khối lượng tịnh: 500";
        assert_eq!(
            filter.rejection(text, span_of(text, "500")),
            Some(Suppression::UnitKeyword("khoi luong".into()))
        );
        let text = "Thành phần: đường, 330";
        assert_eq!(filter.rejection(text, span_of(text, "330")), None);
    }

    #[test]
    fn unit_after_the_number() {
        let filter = ContextFilter::default();
        let text = "gói 100 g";
        assert_eq!(filter.rejection(text, span_of(text, "100")), Some(Suppression::UnitSuffix));
        let text = "x 250kcal";
        assert_eq!(filter.rejection(text, span_of(text, "250")), Some(Suppression::UnitSuffix));
        let text = "330 gum";
        assert_eq!(filter.rejection(text, span_of(text, "330")), None);
    }

    #[test]
    fn per_hundred_grams_marker() {
        let filter = ContextFilter::default();
        let text = "per 100g: 120, 330";
        assert_eq!(
            filter.rejection(text, span_of(text, "120")),
            Some(Suppression::PerHundredGrams)
        );
    }

    #[test]
    fn extra_keywords_are_folded() {
        let filter = ContextFilter::default().with_extra_keywords(["Chất béo"]);
        let text = "Chất béo 120";
        assert_eq!(
            filter.rejection(text, span_of(text, "120")),
            Some(Suppression::UnitKeyword("chat beo".into()))
        );
    }

    #[test]
    fn units_only_lines_are_reported() {
        let filter = ContextFilter::default();
        let text = "Ingredients: 330, 211\n250 g; 100kcal\n(120)";
        let spans = filter.units_only_lines(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].start..spans[0].end], "250 g; 100kcal\n");
        assert_eq!(&text[spans[1].start..spans[1].end], "(120)");
    }

    #[test]
    fn unit_words() {
        assert!(is_unit_word("KCAL"));
        assert!(is_unit_word("g"));
        assert!(!is_unit_word("d"));
    }
}
