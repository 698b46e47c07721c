//! The code grammars.
//!
//! Five independent passes look for additive codes:
//!
//! | pass            | example       | real digits needed |
//! |-----------------|---------------|--------------------|
//! | prefixed        | `E160a(ii)`   | 1                  |
//! | letter + roman  | `160a(ii)`    | 2                  |
//! | roman only      | `451(i)`      | 2                  |
//! | bare numeral    | `330`         | 2                  |
//! | digit + letters | `150d`        | 2                  |
//!
//! Each pass works on a 3-4 character "digit-like" token that may contain
//! letters an OCR engine confuses with digits (`O` for `0`, `l` for `1`, ...).
//! The [`DigitMap`] repairs such tokens before the numeric range check.
//! Unprefixed passes try the 4-character reading of a token before the
//! 3-character one and keep the first that repairs cleanly and lies in range.
//! A prefixed code keeps every in-range reading and lets the registry decide:
//! `E150b` proposes both `1508` and `150b`.
//!
//! Unprefixed passes only start where the previous character is not an ASCII
//! letter or digit, and resume scanning after each accepted match.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

// used for the confusion table
use seahash::SeaHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use crate::code::{CandidateCode, CodeRange, GrammarKind, Roman, Span};
use crate::context::is_unit_word;
use crate::error::{EcoscanError, Result};

pub type CharHasher = BuildHasherDefault<SeaHasher>;

lazy_static! {
    static ref MARKER: Regex = Regex::new(r"(?i)\b(?:ins|e)\s*-?\s*").unwrap();
    static ref ROMAN_SUFFIX: Regex =
        Regex::new(r"(?i)^\s*\(\s*(viii|vii|vi|iv|ix|iii|ii|i|v)\s*\)").unwrap();
}

const TOKEN_LENGTHS: [usize; 2] = [4, 3];
const PREFIXED_REAL_DIGITS: usize = 1;
const UNPREFIXED_REAL_DIGITS: usize = 2;

/// Characters OCR commonly reads in place of digits.
pub const DEFAULT_CONFUSIONS: &[(char, char)] = &[
    ('o', '0'),
    ('O', '0'),
    ('q', '0'),
    ('Q', '0'),
    ('l', '1'),
    ('I', '1'),
    ('i', '1'),
    ('|', '1'),
    ('!', '1'),
    ('z', '2'),
    ('Z', '2'),
    ('s', '5'),
    ('S', '5'),
    ('b', '8'),
    ('B', '8'),
];

// ------------- Digit map -------------
#[derive(Debug, Clone)]
pub struct DigitMap {
    map: HashMap<char, char, CharHasher>,
}

impl Default for DigitMap {
    fn default() -> Self {
        let mut map = HashMap::default();
        for (from, to) in DEFAULT_CONFUSIONS {
            map.insert(*from, *to);
        }
        Self { map }
    }
}

impl DigitMap {
    pub fn empty() -> Self {
        Self { map: HashMap::default() }
    }

    /// Maps `from` to the digit `to`, replacing any previous mapping.
    pub fn set(&mut self, from: char, to: char) -> Result<()> {
        if !is_digit_like(from) || from.is_ascii_digit() {
            return Err(EcoscanError::Config(format!(
                "'{from}' cannot stand in for a digit; use an ASCII letter, '|' or '!'"
            )));
        }
        if !to.is_ascii_digit() {
            return Err(EcoscanError::Config(format!("'{to}' is not a digit")));
        }
        self.map.insert(from, to);
        Ok(())
    }

    pub fn with_override(mut self, from: char, to: char) -> Result<Self> {
        self.set(from, to)?;
        Ok(self)
    }

    pub fn digit_for(&self, c: char) -> Option<char> {
        if c.is_ascii_digit() { Some(c) } else { self.map.get(&c).copied() }
    }

    /// Every character must be a digit or a known confusion.
    pub fn repair(&self, token: &str) -> Option<String> {
        token.chars().map(|c| self.digit_for(c)).collect()
    }
}

// ------------- Extractor -------------
#[derive(Debug, Clone)]
pub struct Extractor {
    digit_map: DigitMap,
    range: CodeRange,
}

impl Extractor {
    pub fn new(digit_map: DigitMap, range: CodeRange) -> Self {
        Self { digit_map, range }
    }
    pub fn digit_map(&self) -> &DigitMap {
        &self.digit_map
    }
    pub fn range(&self) -> CodeRange {
        self.range
    }

    /// Runs every pass over `text` and returns the in-range matches.
    ///
    /// Unprefixed passes do not start inside a prefixed match, and bare
    /// numerals starting inside one of `units_only_lines` are skipped. No
    /// context filtering happens here.
    pub fn scan(&self, text: &str, units_only_lines: &[Span]) -> Vec<CandidateCode> {
        let mut found = Vec::new();
        for marker in MARKER.find_iter(text) {
            found.extend(self.prefixed_at(text, marker.start(), marker.end()));
        }
        let claimed: Vec<Span> = found.iter().map(|c| c.span).collect();
        let unclaimed = |pos: usize| !claimed.iter().any(|s| s.start <= pos && pos < s.end);

        scan_positions(text, &mut found, |pos| {
            unclaimed(pos).then(|| self.letter_roman_at(text, pos)).flatten()
        });
        scan_positions(text, &mut found, |pos| {
            unclaimed(pos).then(|| self.roman_only_at(text, pos)).flatten()
        });
        scan_positions(text, &mut found, |pos| {
            if units_only_lines.iter().any(|line| line.start <= pos && pos < line.end) {
                return None;
            }
            unclaimed(pos).then(|| self.bare_numeral_at(text, pos)).flatten()
        });
        scan_positions(text, &mut found, |pos| {
            unclaimed(pos).then(|| self.digit_letters_at(text, pos)).flatten()
        });
        debug!(candidates = found.len(), "grammar scan complete");
        found
    }

    /// Repairs `token` and checks eligibility and range.
    fn accept(&self, token: &str, real_digits: usize) -> Option<String> {
        if token.chars().filter(|c| c.is_ascii_digit()).count() < real_digits {
            return None;
        }
        let digits = self.digit_map.repair(token)?;
        let value: u32 = digits.parse().ok()?;
        if self.range.contains(value) { Some(digits) } else { None }
    }

    /// At most one reading per token length.
    fn prefixed_at(&self, text: &str, marker_start: usize, pos: usize) -> Vec<CandidateCode> {
        let mut readings_found = Vec::new();
        for len in TOKEN_LENGTHS {
            let Some(token) = digit_like(text, pos, len) else { continue };
            let after = pos + len;
            let letter = char_at(text, after).filter(|c| c.is_ascii_alphabetic());
            let readings = if letter.is_some() { vec![letter, None] } else { vec![None] };
            for letter in readings {
                let mut end = after + letter.map_or(0, |_| 1);
                let roman = roman_at(text, end);
                match roman {
                    Some((_, roman_end)) => end = roman_end,
                    None if char_at(text, end).is_some_and(is_word_char) => continue,
                    None => (),
                }
                if let Some(digits) = self.accept(token, PREFIXED_REAL_DIGITS) {
                    readings_found.push(CandidateCode {
                        kind: GrammarKind::Prefixed,
                        digits,
                        letters: letter.map(|c| c.to_ascii_lowercase().to_string()).unwrap_or_default(),
                        roman: roman.map(|(r, _)| r),
                        span: Span::new(marker_start, end),
                    });
                    break;
                }
            }
        }
        readings_found
    }

    fn letter_roman_at(&self, text: &str, pos: usize) -> Option<CandidateCode> {
        for len in TOKEN_LENGTHS {
            let Some(token) = digit_like(text, pos, len) else { continue };
            let Some(letter) = char_at(text, pos + len).filter(|c| c.is_ascii_alphabetic()) else {
                continue;
            };
            let Some((roman, end)) = roman_at(text, pos + len + 1) else { continue };
            if let Some(digits) = self.accept(token, UNPREFIXED_REAL_DIGITS) {
                return Some(CandidateCode {
                    kind: GrammarKind::LetterRoman,
                    digits,
                    letters: letter.to_ascii_lowercase().to_string(),
                    roman: Some(roman),
                    span: Span::new(pos, end),
                });
            }
        }
        None
    }

    fn roman_only_at(&self, text: &str, pos: usize) -> Option<CandidateCode> {
        for len in TOKEN_LENGTHS {
            let Some(token) = digit_like(text, pos, len) else { continue };
            let Some((roman, end)) = roman_at(text, pos + len) else { continue };
            if let Some(digits) = self.accept(token, UNPREFIXED_REAL_DIGITS) {
                return Some(CandidateCode {
                    kind: GrammarKind::RomanOnly,
                    digits,
                    letters: String::new(),
                    roman: Some(roman),
                    span: Span::new(pos, end),
                });
            }
        }
        None
    }

    fn bare_numeral_at(&self, text: &str, pos: usize) -> Option<CandidateCode> {
        for len in TOKEN_LENGTHS {
            let Some(token) = digit_like(text, pos, len) else { continue };
            let end = pos + len;
            if char_at(text, end).is_some_and(|c| c.is_ascii_alphanumeric()) {
                continue;
            }
            if text[end..].trim_start().starts_with('(') {
                continue;
            }
            if let Some(digits) = self.accept(token, UNPREFIXED_REAL_DIGITS) {
                return Some(CandidateCode {
                    kind: GrammarKind::BareNumeral,
                    digits,
                    letters: String::new(),
                    roman: None,
                    span: Span::new(pos, end),
                });
            }
        }
        None
    }

    fn digit_letters_at(&self, text: &str, pos: usize) -> Option<CandidateCode> {
        for len in TOKEN_LENGTHS {
            let Some(token) = digit_like(text, pos, len) else { continue };
            let start = pos + len;
            let run = text[start..].bytes().take_while(|b| b.is_ascii_alphabetic()).count();
            if run == 0 {
                continue;
            }
            let end = start + run;
            if char_at(text, end).is_some_and(is_word_char) || roman_at(text, end).is_some() {
                continue;
            }
            let letters = &text[start..end];
            if is_unit_word(letters) {
                continue;
            }
            if let Some(digits) = self.accept(token, UNPREFIXED_REAL_DIGITS) {
                return Some(CandidateCode {
                    kind: GrammarKind::DigitLetters,
                    digits,
                    letters: letters.to_ascii_lowercase(),
                    roman: None,
                    span: Span::new(pos, end),
                });
            }
        }
        None
    }
}

/// Drives an unprefixed pass: tries `at` on every token start and skips past
/// each accepted match.
fn scan_positions<F>(text: &str, out: &mut Vec<CandidateCode>, mut at: F)
where
    F: FnMut(usize) -> Option<CandidateCode>,
{
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let starts_token = is_digit_like(bytes[pos] as char)
            && char_before(text, pos).is_none_or(|c| !c.is_ascii_alphanumeric());
        if starts_token {
            if let Some(candidate) = at(pos) {
                pos = candidate.span.end;
                out.push(candidate);
                continue;
            }
        }
        pos += char_at(text, pos).map_or(1, |c| c.len_utf8());
    }
}

fn is_digit_like(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '|' || c == '!'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn digit_like(text: &str, pos: usize, len: usize) -> Option<&str> {
    let token = text.as_bytes().get(pos..pos + len)?;
    if token.iter().all(|b| is_digit_like(*b as char)) {
        Some(&text[pos..pos + len])
    } else {
        None
    }
}

fn char_at(text: &str, pos: usize) -> Option<char> {
    text.get(pos..)?.chars().next()
}

fn char_before(text: &str, pos: usize) -> Option<char> {
    text[..pos].chars().next_back()
}

fn roman_at(text: &str, pos: usize) -> Option<(Roman, usize)> {
    let caps = ROMAN_SUFFIX.captures(text.get(pos..)?)?;
    let roman = caps.get(1)?.as_str().parse().ok()?;
    Some((roman, pos + caps.get(0)?.end()))
}
