//! Additive code values.
//!
//! A [`CandidateCode`] is what a grammar (or the synonym table) proposes; a
//! [`NormalizedCode`] is its canonical string, e.g. `160a(iv)`, which is the
//! only form ever compared against the registry.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

// used to print out readable forms of a code
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref MARKER_PREFIX: Regex = Regex::new(r"(?i)^\s*(?:ins|e)\s*-?").unwrap();
    static ref CODE_SHAPE: Regex =
        Regex::new(r"^[0-9]{3,4}[a-z]*(?:\((?:i|ii|iii|iv|v|vi|vii|viii|ix)\))?$").unwrap();
}

// ------------- Roman suffix -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Roman {
    I,
    Ii,
    Iii,
    Iv,
    V,
    Vi,
    Vii,
    Viii,
    Ix,
}

impl Roman {
    pub fn as_str(&self) -> &'static str {
        match self {
            Roman::I => "i",
            Roman::Ii => "ii",
            Roman::Iii => "iii",
            Roman::Iv => "iv",
            Roman::V => "v",
            Roman::Vi => "vi",
            Roman::Vii => "vii",
            Roman::Viii => "viii",
            Roman::Ix => "ix",
        }
    }
}

impl FromStr for Roman {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "i" => Ok(Roman::I),
            "ii" => Ok(Roman::Ii),
            "iii" => Ok(Roman::Iii),
            "iv" => Ok(Roman::Iv),
            "v" => Ok(Roman::V),
            "vi" => Ok(Roman::Vi),
            "vii" => Ok(Roman::Vii),
            "viii" => Ok(Roman::Viii),
            "ix" => Ok(Roman::Ix),
            _ => Err(()),
        }
    }
}

// ------------- Candidate -------------
/// Which pass produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarKind {
    Prefixed,
    LetterRoman,
    RomanOnly,
    BareNumeral,
    DigitLetters,
    Synonym,
}

impl GrammarKind {
    /// Matches carrying an explicit `E`/`INS` marker (or a named synonym) are
    /// not second-guessed by the context filter.
    pub fn is_unprefixed(&self) -> bool {
        !matches!(self, GrammarKind::Prefixed | GrammarKind::Synonym)
    }
}

/// Byte offsets into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateCode {
    pub kind: GrammarKind,
    /// Repaired digits, always 3 or 4 of them.
    pub digits: String,
    /// Lowercase letter suffix, empty when absent.
    pub letters: String,
    pub roman: Option<Roman>,
    pub span: Span,
}

impl CandidateCode {
    /// Splits a normalized code back into its parts.
    pub fn from_code(kind: GrammarKind, code: &NormalizedCode, span: Span) -> Self {
        let key = code.as_str();
        let digits_end = key.find(|c: char| !c.is_ascii_digit()).unwrap_or(key.len());
        let letters_end = key.find('(').unwrap_or(key.len());
        let roman = key[letters_end..].trim_matches(|c| c == '(' || c == ')').parse().ok();
        Self {
            kind,
            digits: key[..digits_end].to_string(),
            letters: key[digits_end..letters_end].to_string(),
            roman,
            span,
        }
    }

    pub fn normalized(&self) -> NormalizedCode {
        let mut code = String::with_capacity(self.digits.len() + self.letters.len() + 6);
        code.push_str(&self.digits);
        code.push_str(&self.letters);
        if let Some(roman) = self.roman {
            code.push('(');
            code.push_str(roman.as_str());
            code.push(')');
        }
        NormalizedCode(code)
    }
}

// ------------- Normalized code -------------
/// Strips an `E`/`INS` marker, lowercases and removes whitespace.
///
/// This is the comparison key of the registry; it does not check the shape.
pub fn canonical_key(raw: &str) -> String {
    let without_marker = MARKER_PREFIX.replace(raw, "");
    without_marker
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedCode(String);

impl NormalizedCode {
    /// Canonicalizes `raw` and accepts it only if it has the code shape
    /// (3-4 digits, optional letters, optional roman suffix).
    pub fn parse(raw: &str) -> Option<Self> {
        let key = canonical_key(raw);
        if CODE_SHAPE.is_match(&key) { Some(Self(key)) } else { None }
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// The leading digit run as a number.
    pub fn number(&self) -> Option<u32> {
        leading_number(&self.0)
    }
}

impl fmt::Display for NormalizedCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn leading_number(key: &str) -> Option<u32> {
    let digits: String = key.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Inclusive numeric span of valid identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeRange {
    pub min: u32,
    pub max: u32,
}

impl CodeRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
    pub fn contains(&self, value: u32) -> bool {
        self.min <= value && value <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_strips_markers() {
        assert_eq!(canonical_key("E330"), "330");
        assert_eq!(canonical_key("INS 160a (iv)"), "160a(iv)");
        assert_eq!(canonical_key("e-150D"), "150d");
        assert_eq!(canonical_key("1422"), "1422");
    }

    #[test]
    fn parse_rejects_other_shapes() {
        assert_eq!(NormalizedCode::parse("E160a(ii)").unwrap().as_str(), "160a(ii)");
        assert!(NormalizedCode::parse("E33").is_none());
        assert!(NormalizedCode::parse("E12345").is_none());
        assert!(NormalizedCode::parse("160a(x)").is_none());
        assert!(NormalizedCode::parse("vitamin c").is_none());
    }

    #[test]
    fn candidate_renders_roman_suffix() {
        let candidate = CandidateCode {
            kind: GrammarKind::LetterRoman,
            digits: "160".into(),
            letters: "a".into(),
            roman: Some(Roman::Iv),
            span: Span::new(0, 8),
        };
        assert_eq!(candidate.normalized().as_str(), "160a(iv)");
        assert_eq!(candidate.normalized().number(), Some(160));
        let back = CandidateCode::from_code(GrammarKind::LetterRoman, &candidate.normalized(), candidate.span);
        assert_eq!(back, candidate);
        let plain = CandidateCode::from_code(GrammarKind::Synonym, &NormalizedCode::parse("E330").unwrap(), Span::new(0, 0));
        assert_eq!((plain.digits.as_str(), plain.letters.as_str(), plain.roman), ("330", "", None));
    }
}
