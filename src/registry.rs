//! The canonical additive registry.
//!
//! Every code that leaves the engine has been checked against this table, and
//! the table's smallest and largest identifiers bound what the grammars accept.

use tracing::{info, warn};

use std::collections::BTreeMap;
use std::path::Path;

use crate::code::{CodeRange, NormalizedCode};
use crate::error::{EcoscanError, Result};

/// One registry row. Empty cells are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalRegistryEntry {
    pub code: NormalizedCode,
    pub name: Option<String>,
    pub name_vn: Option<String>,
    pub adi: Option<String>,
    pub info: Option<String>,
    pub functions: Vec<String>,
    pub status: Option<String>,
    /// Expert risk label, only used by the offline evaluation.
    pub level: Option<String>,
    pub source: Option<String>,
}

impl CanonicalRegistryEntry {
    pub fn new(code: NormalizedCode) -> Self {
        Self { code, ..Default::default() }
    }

    /// The expert label as a tier number; `-1`, blanks and text give `None`.
    pub fn risk_label(&self) -> Option<u8> {
        let level = self.level.as_deref()?.trim();
        let value: f64 = level.parse().ok()?;
        match value {
            v if v == 1.0 => Some(1),
            v if v == 2.0 => Some(2),
            v if v == 4.0 => Some(4),
            _ => None,
        }
    }
}

/// Splits a function cell such as `Color, Preservative. Acid` into tags.
pub fn split_functions(cell: &str) -> Vec<String> {
    cell.split(['.', ','])
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Registry {
    entries: BTreeMap<NormalizedCode, CanonicalRegistryEntry>,
    range: CodeRange,
    digest: Option<String>,
}

impl Registry {
    /// Loads the registry CSV. Only the `ins` column is mandatory; header names
    /// are trimmed and lowercased first.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fail = |message: String| EcoscanError::TableLoad {
            table: "registry",
            path: path.display().to_string(),
            message,
        };
        let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(bytes.as_slice());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| fail(e.to_string()))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let column = |name: &str| headers.iter().position(|h| h == name);
        let ins = column("ins").ok_or_else(|| fail("missing ins column".into()))?;
        let name = column("name");
        let name_vn = column("name_vn");
        let adi = column("adi");
        let info = column("info");
        let function = column("function");
        let status = column("status_vn");
        let level = column("level");
        let source = column("source");

        let mut entries = Vec::new();
        let mut skipped = 0;
        for (i, record) in rdr.records().enumerate() {
            let line = i + 2;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(line, error = %e, "unreadable registry row");
                    skipped += 1;
                    continue;
                }
            };
            let cell = |column: Option<usize>| {
                column
                    .and_then(|c| record.get(c))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let raw = record.get(ins).unwrap_or_default();
            let Some(code) = NormalizedCode::parse(raw) else {
                warn!(line, ins = raw, "registry row without a usable identifier");
                skipped += 1;
                continue;
            };
            entries.push(CanonicalRegistryEntry {
                code,
                name: cell(name),
                name_vn: cell(name_vn),
                adi: cell(adi),
                info: cell(info),
                functions: cell(function).map(|f| split_functions(&f)).unwrap_or_default(),
                status: cell(status),
                level: cell(level),
                source: cell(source),
            });
        }

        let mut registry = Self::from_entries(entries).map_err(|e| match e {
            EcoscanError::TableLoad { message, .. } => fail(message),
            other => other,
        })?;
        registry.digest = Some(blake3::hash(&bytes).to_hex().to_string());
        info!(
            path = %path.display(),
            entries = registry.len(),
            skipped,
            min = registry.range.min,
            max = registry.range.max,
            "registry loaded"
        );
        Ok(registry)
    }

    /// Builds a registry from entries; the first entry wins for a repeated code.
    pub fn from_entries(entries: impl IntoIterator<Item = CanonicalRegistryEntry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            if map.contains_key(&entry.code) {
                warn!(code = %entry.code, "duplicate registry identifier ignored");
                continue;
            }
            map.insert(entry.code.clone(), entry);
        }
        let numbers = || map.keys().filter_map(NormalizedCode::number);
        let (Some(min), Some(max)) = (numbers().min(), numbers().max()) else {
            return Err(EcoscanError::TableLoad {
                table: "registry",
                path: "(in memory)".into(),
                message: "no numeric identifiers to derive the code range from".into(),
            });
        };
        Ok(Self { entries: map, range: CodeRange::new(min, max), digest: None })
    }

    pub fn range(&self) -> CodeRange {
        self.range
    }
    /// BLAKE3 of the file the registry was loaded from.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn contains(&self, code: &NormalizedCode) -> bool {
        self.entries.contains_key(code)
    }
    pub fn get(&self, code: &NormalizedCode) -> Option<&CanonicalRegistryEntry> {
        self.entries.get(code)
    }
    /// Looks up a user supplied identifier such as `E 330` or `ins160a(i)`.
    pub fn lookup(&self, raw: &str) -> Option<&CanonicalRegistryEntry> {
        NormalizedCode::parse(raw).and_then(|code| self.entries.get(&code))
    }
    pub fn entries(&self) -> impl Iterator<Item = &CanonicalRegistryEntry> {
        self.entries.values()
    }

    /// Keeps the registered codes, sorted and distinct.
    pub fn validate<I>(&self, codes: I) -> Vec<NormalizedCode>
    where
        I: IntoIterator<Item = NormalizedCode>,
    {
        let mut valid: Vec<NormalizedCode> = codes.into_iter().filter(|c| self.contains(c)).collect();
        valid.sort();
        valid.dedup();
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> NormalizedCode {
        NormalizedCode::parse(raw).unwrap()
    }

    fn registry() -> Registry {
        Registry::from_entries(["E100", "E330", "E160a(ii)", "E1520", "E330"].map(|c| {
            CanonicalRegistryEntry::new(code(c))
        }))
        .unwrap()
    }

    #[test]
    fn range_comes_from_the_identifiers() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.range(), CodeRange::new(100, 1520));
    }

    #[test]
    fn validate_sorts_and_filters() {
        let codes = ["330", "999", "160a(ii)", "330", "160a"].map(code);
        assert_eq!(registry().validate(codes), vec![code("160a(ii)"), code("330")]);
    }

    #[test]
    fn lookup_accepts_marked_identifiers() {
        assert!(registry().lookup("E 330").is_some());
        assert!(registry().lookup("INS160A(II)").is_some());
        assert!(registry().lookup("331").is_none());
    }

    #[test]
    fn empty_registry_is_an_error() {
        assert!(Registry::from_entries(Vec::new()).is_err());
    }

    #[test]
    fn functions_split_on_dots_and_commas() {
        assert_eq!(split_functions("Color, Preservative. Acid,,"), vec!["Color", "Preservative", "Acid"]);
        let mut entry = CanonicalRegistryEntry::new(code("100"));
        entry.level = Some("2.0".into());
        assert_eq!(entry.risk_label(), Some(2));
        entry.level = Some("-1".into());
        assert_eq!(entry.risk_label(), None);
    }
}
