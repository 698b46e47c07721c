//! Named additives.
//!
//! Labels often say `bột ngọt` or `citric acid` instead of `E621` / `E330`.
//! The synonym table maps such phrases to codes. Phrases are compared as token
//! streams (see [`crate::normalize`]), either exactly or within a small
//! transposition-aware edit distance.

use serde::Deserialize;
use tracing::{debug, info, warn};

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::code::{NormalizedCode, Span};
use crate::error::{EcoscanError, Result};
use crate::normalize::{Token, token_stream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Fuzzy,
}

/// Distance bounds for fuzzy matching, scaled by phrase length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FuzzyConfig {
    /// Phrases up to this many characters count as short.
    pub short_term_len: usize,
    pub short_term_max: usize,
    pub long_term_max: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self { short_term_len: 6, short_term_max: 1, long_term_max: 2 }
    }
}

impl FuzzyConfig {
    pub fn bound(&self, phrase: &str) -> usize {
        if phrase.chars().count() <= self.short_term_len {
            self.short_term_max
        } else {
            self.long_term_max
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymEntry {
    pub code: NormalizedCode,
    /// The synonym as a token stream.
    pub phrase: String,
    token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymHit {
    pub code: NormalizedCode,
    pub phrase: String,
    pub distance: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: Vec<SynonymEntry>,
}

impl SynonymTable {
    /// Reads a CSV with an `ecode` (or `code`) column and a `synonyms` column
    /// holding comma separated phrases.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fail = |message: String| EcoscanError::TableLoad {
            table: "synonym",
            path: path.display().to_string(),
            message,
        };
        let file = File::open(path).map_err(|e| fail(e.to_string()))?;
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| fail(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
        let code_column = column(&["ecode", "code"]).ok_or_else(|| fail("missing ecode column".into()))?;
        let synonyms_column = column(&["synonyms"]).ok_or_else(|| fail("missing synonyms column".into()))?;

        let mut rows = Vec::new();
        let mut skipped = 0;
        for (line, record) in rdr.records().enumerate() {
            match record {
                Ok(record) => rows.push((
                    record.get(code_column).unwrap_or_default().to_string(),
                    record.get(synonyms_column).unwrap_or_default().to_string(),
                )),
                Err(e) => {
                    warn!(line = line + 2, error = %e, "unreadable synonym row");
                    skipped += 1;
                }
            }
        }
        let table = Self::from_rows(rows);
        info!(path = %path.display(), phrases = table.len(), skipped, "synonym table loaded");
        Ok(table)
    }

    /// Builds the table from (code, comma separated synonyms) pairs. Rows whose
    /// code is not code-shaped are skipped.
    pub fn from_rows<I, C, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (C, S)>,
        C: AsRef<str>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (code, synonyms) in rows {
            let Some(normalized) = NormalizedCode::parse(code.as_ref()) else {
                warn!(code = code.as_ref(), "synonym row without a usable code");
                continue;
            };
            for synonym in synonyms.as_ref().split(',') {
                let phrase = token_stream(synonym);
                if phrase.is_empty() {
                    continue;
                }
                let entry = SynonymEntry {
                    code: normalized.clone(),
                    token_count: phrase.split(' ').count(),
                    phrase,
                };
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn entries(&self) -> impl Iterator<Item = &SynonymEntry> {
        self.entries.iter()
    }

    /// One hit per code found among `tokens`.
    ///
    /// Each synonym takes the first window of equal token count that matches
    /// it. Per code the closest (then longest) phrase is kept, and codes more
    /// than one edit worse than the best hit overall are dropped.
    pub fn find(&self, tokens: &[Token], mode: MatchMode, fuzzy: &FuzzyConfig) -> Vec<SynonymHit> {
        let mut best: HashMap<&NormalizedCode, SynonymHit> = HashMap::new();
        for entry in &self.entries {
            let Some(hit) = self.first_window(entry, tokens, mode, fuzzy) else { continue };
            let better = match best.get(&entry.code) {
                Some(current) => {
                    (hit.distance, std::cmp::Reverse(hit.phrase.len()))
                        < (current.distance, std::cmp::Reverse(current.phrase.len()))
                }
                None => true,
            };
            if better {
                best.insert(&entry.code, hit);
            }
        }
        let Some(floor) = best.values().map(|h| h.distance).min() else {
            return Vec::new();
        };
        let mut hits: Vec<SynonymHit> =
            best.into_values().filter(|h| h.distance <= floor + 1).collect();
        hits.sort_by(|a, b| a.code.cmp(&b.code));
        debug!(hits = hits.len(), ?mode, "synonym matching complete");
        hits
    }

    fn first_window(
        &self,
        entry: &SynonymEntry,
        tokens: &[Token],
        mode: MatchMode,
        fuzzy: &FuzzyConfig,
    ) -> Option<SynonymHit> {
        if entry.token_count > tokens.len() {
            return None;
        }
        let bound = match mode {
            MatchMode::Exact => 0,
            MatchMode::Fuzzy => fuzzy.bound(&entry.phrase),
        };
        for window in tokens.windows(entry.token_count) {
            let candidate = window.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
            let distance = if bound == 0 {
                (candidate == entry.phrase).then_some(0)
            } else {
                bounded_osa(&candidate, &entry.phrase, bound)
            };
            if let Some(distance) = distance {
                return Some(SynonymHit {
                    code: entry.code.clone(),
                    phrase: entry.phrase.clone(),
                    distance,
                    span: Span::new(window[0].span.start, window[window.len() - 1].span.end),
                });
            }
        }
        None
    }
}

/// Optimal string alignment distance between `a` and `b`, or `None` as soon
/// as it is certain to exceed `bound`.
pub fn bounded_osa(a: &str, b: &str, bound: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > bound {
        return None;
    }
    let width = b.len() + 1;
    let mut before_previous = vec![0; width];
    let mut previous: Vec<usize> = (0..width).collect();
    let mut current = vec![0; width];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..width {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut cell = (previous[j] + 1).min(current[j - 1] + 1).min(previous[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                cell = cell.min(before_previous[j - 2] + 1);
            }
            current[j] = cell;
        }
        if current.iter().all(|&cell| cell > bound) {
            return None;
        }
        std::mem::swap(&mut before_previous, &mut previous);
        std::mem::swap(&mut previous, &mut current);
    }
    let distance = previous[width - 1];
    (distance <= bound).then_some(distance)
}
