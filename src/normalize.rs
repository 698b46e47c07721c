//! Canonical comparison form for label text.
//!
//! Everything that compares words (synonyms, unit keywords, per-100g markers)
//! goes through [`fold`] first, so that `Thành phần`, `THANH PHAN` and
//! `thanh phan` all compare equal.

// used to decompose characters so that combining marks can be dropped
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::code::Span;

/// Lowercases, strips diacritics and recomposes.
///
/// `đ` is not a composed character in Unicode, so it is folded explicitly.
pub fn fold(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == 'đ' { 'd' } else { c })
        .nfc()
        .collect()
}

/// A folded token and where it came from in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub span: Span,
}

/// Folds and splits on every run of characters outside `[0-9a-z]`.
///
/// Folding is done per character so that every token keeps the byte span of
/// the characters it was folded from.
pub fn tokens(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut end = 0;
    let mut buffer = [0u8; 4];
    for (i, c) in text.char_indices() {
        let folded = fold(c.encode_utf8(&mut buffer));
        for f in folded.chars() {
            if f.is_ascii_lowercase() || f.is_ascii_digit() {
                if current.is_empty() {
                    start = i;
                }
                current.push(f);
                end = i + c.len_utf8();
            } else if !current.is_empty() {
                tokens.push(Token { text: std::mem::take(&mut current), span: Span::new(start, end) });
            }
        }
    }
    if !current.is_empty() {
        tokens.push(Token { text: current, span: Span::new(start, end) });
    }
    tokens
}

pub fn tokenize(text: &str) -> Vec<String> {
    tokens(text).into_iter().map(|t| t.text).collect()
}

/// Tokens joined by single spaces; the stored form of a synonym phrase.
pub fn token_stream(text: &str) -> String {
    tokenize(text).join(" ")
}
