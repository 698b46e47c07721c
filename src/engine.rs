//! The pipeline: text in, validated codes and risk outcomes out.
//!
//! ```text
//! text ──┬─ grammars ── context filter ──┬─ registry ── store ── rule book
//!        └─ synonyms ────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use std::path::Path;
use std::sync::Arc;

use crate::classify::{FactRecord, RuleBook, RuleOutcome};
use crate::code::{CandidateCode, GrammarKind, NormalizedCode};
use crate::context::ContextFilter;
use crate::error::Result;
use crate::extract::{DigitMap, Extractor};
use crate::normalize::tokens;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::store::FactStore;
use crate::synonym::{FuzzyConfig, MatchMode, SynonymTable};

/// Tables loaded once at start and never mutated; a reload builds a new value.
#[derive(Debug)]
pub struct ReferenceTables {
    pub registry: Registry,
    pub synonyms: SynonymTable,
}

impl ReferenceTables {
    pub fn new(registry: Registry, synonyms: SynonymTable) -> Self {
        Self { registry, synonyms }
    }

    pub fn load(registry_path: &Path, synonyms_path: Option<&Path>) -> Result<Self> {
        let registry = Registry::load(registry_path)?;
        let synonyms = match synonyms_path {
            Some(path) => SynonymTable::load(path)?,
            None => SynonymTable::default(),
        };
        Ok(Self::new(registry, synonyms))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    #[default]
    Text,
    /// Text an OCR service produced from a label photo.
    ImageTranscript,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeAnalysis {
    pub code: NormalizedCode,
    /// Whether the fact store had a record for the code.
    pub found: bool,
    pub facts: Option<FactRecord>,
    pub outcome: Option<RuleOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub source_text: String,
    pub input_type: InputKind,
    pub analyzed_at: DateTime<Utc>,
    pub registry_digest: Option<String>,
    pub codes: Vec<CodeAnalysis>,
}

#[derive(Clone)]
pub struct Engine {
    tables: Arc<ReferenceTables>,
    extractor: Extractor,
    context: ContextFilter,
    mode: MatchMode,
    fuzzy: FuzzyConfig,
    rules: Arc<RuleBook>,
}

impl Engine {
    pub fn new(tables: Arc<ReferenceTables>) -> Self {
        let extractor = Extractor::new(DigitMap::default(), tables.registry.range());
        Self {
            tables,
            extractor,
            context: ContextFilter::default(),
            mode: MatchMode::default(),
            fuzzy: FuzzyConfig::default(),
            rules: Arc::new(RuleBook::standard()),
        }
    }

    /// Loads the tables and rule book named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let tables = ReferenceTables::load(&settings.registry_path, settings.synonyms_path.as_deref())?;
        let rules = match &settings.rules_path {
            Some(path) => RuleBook::load(path)?,
            None => RuleBook::standard(),
        };
        info!(rules = ?rules.ids(), mode = ?settings.matching.mode, "engine configured");
        Ok(Self::new(Arc::new(tables))
            .with_digit_map(settings.digit_map()?)
            .with_context_filter(settings.context_filter())
            .with_matching(settings.matching.mode, settings.matching.fuzzy())
            .with_rules(rules))
    }

    pub fn with_digit_map(mut self, digit_map: DigitMap) -> Self {
        self.extractor = Extractor::new(digit_map, self.tables.registry.range());
        self
    }
    pub fn with_context_filter(mut self, context: ContextFilter) -> Self {
        self.context = context;
        self
    }
    pub fn with_matching(mut self, mode: MatchMode, fuzzy: FuzzyConfig) -> Self {
        self.mode = mode;
        self.fuzzy = fuzzy;
        self
    }
    pub fn with_rules(mut self, rules: RuleBook) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// The same engine over freshly loaded tables.
    pub fn with_tables(&self, tables: Arc<ReferenceTables>) -> Self {
        let extractor = Extractor::new(self.extractor.digit_map().clone(), tables.registry.range());
        Self { tables, extractor, ..self.clone() }
    }

    pub fn tables(&self) -> &Arc<ReferenceTables> {
        &self.tables
    }
    pub fn registry(&self) -> &Registry {
        &self.tables.registry
    }
    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Grammar matches that survive the context filter, plus synonym hits.
    /// Nothing is checked against the registry yet.
    pub fn extract_candidates(&self, text: &str) -> Vec<CandidateCode> {
        let units_only = self.context.units_only_lines(text);
        let mut candidates: Vec<CandidateCode> = self
            .extractor
            .scan(text, &units_only)
            .into_iter()
            .filter(|candidate| {
                if !candidate.kind.is_unprefixed() {
                    return true;
                }
                match self.context.rejection(text, candidate.span) {
                    Some(reason) => {
                        trace!(code = %candidate.normalized(), ?reason, "match suppressed by context");
                        false
                    }
                    None => true,
                }
            })
            .collect();
        let hits = self.tables.synonyms.find(&tokens(text), self.mode, &self.fuzzy);
        candidates.extend(
            hits.iter().map(|hit| CandidateCode::from_code(GrammarKind::Synonym, &hit.code, hit.span)),
        );
        candidates
    }

    /// Registered codes found in `text`, sorted and distinct.
    pub fn extract_codes(&self, text: &str) -> Vec<NormalizedCode> {
        let candidates = self.extract_candidates(text);
        let codes = self.tables.registry.validate(candidates.iter().map(CandidateCode::normalized));
        debug!(candidates = candidates.len(), codes = codes.len(), "extraction complete");
        codes
    }

    pub fn classify(&self, facts: &FactRecord) -> RuleOutcome {
        self.rules.classify(facts)
    }

    /// Fetches facts for one validated code and classifies them.
    pub fn assess(&self, code: &NormalizedCode, store: &dyn FactStore) -> Result<CodeAnalysis> {
        let analysis = match store.fetch(code)? {
            Some(facts) => CodeAnalysis {
                code: code.clone(),
                found: true,
                outcome: Some(self.classify(&facts)),
                facts: Some(facts),
            },
            None => {
                debug!(code = %code, "registered code missing from the fact store");
                CodeAnalysis { code: code.clone(), found: false, facts: None, outcome: None }
            }
        };
        Ok(analysis)
    }

    /// Assesses a user supplied identifier such as `E330`; `None` when it is
    /// not a registered code.
    pub fn lookup(&self, raw: &str, store: &dyn FactStore) -> Result<Option<CodeAnalysis>> {
        match self.tables.registry.lookup(raw) {
            Some(entry) => Ok(Some(self.assess(&entry.code, store)?)),
            None => Ok(None),
        }
    }

    pub fn analyze(&self, text: &str, input_type: InputKind, store: &dyn FactStore) -> Result<AnalysisResult> {
        let codes = self
            .extract_codes(text)
            .iter()
            .map(|code| self.assess(code, store))
            .collect::<Result<Vec<_>>>()?;
        info!(?input_type, codes = codes.len(), "text analyzed");
        Ok(AnalysisResult {
            source_text: text.to_string(),
            input_type,
            analyzed_at: Utc::now(),
            registry_digest: self.tables.registry.digest().map(str::to_string),
            codes,
        })
    }
}
