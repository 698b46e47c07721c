//! Risk classification.
//!
//! A [`RuleBook`] is an ordered list of [`Rule`]s; the first rule that fires
//! for a [`FactRecord`] decides the outcome. The standard book is:
//!
//! | priority | rule                     | fires when                          | tier |
//! |----------|--------------------------|-------------------------------------|------|
//! | 1        | `status_not_allowed`     | domestic flag says not permitted    | 4    |
//! | 2        | `adi_numeric_safe_limit` | intake allowance is a number/range  | 2    |
//! | 3        | `missing_data`           | flag absent or unrecognized         | none |
//! | 4        | `default_safe`           | always                              | 1    |
//!
//! Books can also be written as JSON (see [`RuleBook::from_json`]).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use std::path::Path;

use crate::code::NormalizedCode;
use crate::error::{EcoscanError, Result};
use crate::normalize::fold;
use crate::registry::CanonicalRegistryEntry;

pub const STATUS_NOT_ALLOWED: &str = "status_not_allowed";
pub const ADI_NUMERIC_SAFE_LIMIT: &str = "adi_numeric_safe_limit";
pub const MISSING_DATA: &str = "missing_data";
pub const DEFAULT_SAFE: &str = "default_safe";

// ------------- Facts -------------
/// Whether the additive may be used domestically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DomesticFlag {
    NotPermitted,
    Permitted,
    Unrecognized(String),
}

impl DomesticFlag {
    /// `None` for a blank value.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = fold(raw.trim());
        let flag = match folded.as_str() {
            "" => return None,
            "1" | "1.0" | "bt" | "banned" | "not permitted" | "not_permitted" | "not allowed"
            | "cam" => DomesticFlag::NotPermitted,
            "0" | "0.0" | "permitted" | "allowed" | "cho phep" => DomesticFlag::Permitted,
            _ => DomesticFlag::Unrecognized(raw.trim().to_string()),
        };
        Some(flag)
    }
}

/// A usable acceptable daily intake, in mg/kg body weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdiLimit {
    pub low: f64,
    pub high: f64,
    /// The value as written, e.g. `0-3`.
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IntakeAllowance {
    Limit(AdiLimit),
    /// The source says the value is still being reviewed.
    Updating,
    /// Blank, `nan`, `unknown`, `n/a` and friends.
    NotANumber,
    Unparseable(String),
}

impl IntakeAllowance {
    pub fn parse(raw: &str) -> Self {
        let literal = raw.trim();
        match fold(literal).as_str() {
            "updating" => return IntakeAllowance::Updating,
            "" | "nan" | "unknown" | "n/a" | "na" | "none" => return IntakeAllowance::NotANumber,
            _ => (),
        }
        let number = |s: &str| s.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0);
        let bounds = match literal.split_once(['-', '–']) {
            Some((low, high)) => number(low).zip(number(high)).filter(|(low, high)| low <= high),
            None => number(literal).map(|v| (v, v)),
        };
        match bounds {
            Some((low, high)) => IntakeAllowance::Limit(AdiLimit { low, high, literal: literal.to_string() }),
            None => IntakeAllowance::Unparseable(literal.to_string()),
        }
    }

    pub fn limit(&self) -> Option<&AdiLimit> {
        match self {
            IntakeAllowance::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    /// The text the value came from, when there was any.
    pub fn literal(&self) -> Option<&str> {
        match self {
            IntakeAllowance::Limit(limit) => Some(&limit.literal),
            IntakeAllowance::Updating => Some("updating"),
            IntakeAllowance::NotANumber => None,
            IntakeAllowance::Unparseable(text) => Some(text),
        }
    }
}

/// What the knowledge store knows about one code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactRecord {
    pub code: NormalizedCode,
    pub name: Option<String>,
    pub name_vn: Option<String>,
    pub functions: Vec<String>,
    pub intake: Option<IntakeAllowance>,
    pub domestic_flag: Option<DomesticFlag>,
    pub info: Option<String>,
}

impl FactRecord {
    pub fn new(code: NormalizedCode) -> Self {
        Self {
            code,
            name: None,
            name_vn: None,
            functions: Vec::new(),
            intake: None,
            domestic_flag: None,
            info: None,
        }
    }

    pub fn with_intake(mut self, raw: &str) -> Self {
        self.intake = Some(IntakeAllowance::parse(raw));
        self
    }

    pub fn with_flag(mut self, raw: &str) -> Self {
        self.domestic_flag = DomesticFlag::parse(raw);
        self
    }

    pub fn from_entry(entry: &CanonicalRegistryEntry) -> Self {
        Self {
            code: entry.code.clone(),
            name: entry.name.clone(),
            name_vn: entry.name_vn.clone(),
            functions: entry.functions.clone(),
            intake: entry.adi.as_deref().map(IntakeAllowance::parse),
            domestic_flag: entry.status.as_deref().and_then(DomesticFlag::parse),
            info: entry.info.clone(),
        }
    }
}

// ------------- Outcomes -------------
/// Serialized as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RiskTier {
    Safe = 1,
    Limited = 2,
    NotPermitted = 4,
}

impl RiskTier {
    pub fn value(&self) -> u8 {
        *self as u8
    }
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(RiskTier::Safe),
            2 => Some(RiskTier::Limited),
            4 => Some(RiskTier::NotPermitted),
            _ => None,
        }
    }
}

impl Serialize for RiskTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

impl<'de> Deserialize<'de> for RiskTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = u8::deserialize(deserializer)?;
        RiskTier::from_value(value)
            .ok_or_else(|| D::Error::custom(format!("risk tier must be 1, 2, 4 or null, not {value}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    /// `None` means there is not enough data to decide.
    pub risk: Option<RiskTier>,
    pub reason: String,
    pub rule: String,
}

impl RuleOutcome {
    pub fn new(risk: Option<RiskTier>, reason: impl Into<String>, rule: impl Into<String>) -> Self {
        Self { risk, reason: reason.into(), rule: rule.into() }
    }
}

// ------------- Rules -------------
pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn evaluate(&self, facts: &FactRecord) -> Option<RuleOutcome>;
}

pub struct StatusNotAllowed;
impl Rule for StatusNotAllowed {
    fn id(&self) -> &str {
        STATUS_NOT_ALLOWED
    }
    fn evaluate(&self, facts: &FactRecord) -> Option<RuleOutcome> {
        (facts.domestic_flag == Some(DomesticFlag::NotPermitted)).then(|| {
            RuleOutcome::new(Some(RiskTier::NotPermitted), "not permitted for domestic use", self.id())
        })
    }
}

pub struct AdiNumericSafeLimit;
impl Rule for AdiNumericSafeLimit {
    fn id(&self) -> &str {
        ADI_NUMERIC_SAFE_LIMIT
    }
    fn evaluate(&self, facts: &FactRecord) -> Option<RuleOutcome> {
        let limit = facts.intake.as_ref()?.limit()?;
        Some(RuleOutcome::new(
            Some(RiskTier::Limited),
            format!("ADI = {} mg/kg bw, intake should be limited", limit.literal),
            self.id(),
        ))
    }
}

pub struct MissingData;
impl Rule for MissingData {
    fn id(&self) -> &str {
        MISSING_DATA
    }
    fn evaluate(&self, facts: &FactRecord) -> Option<RuleOutcome> {
        match facts.domestic_flag {
            None | Some(DomesticFlag::Unrecognized(_)) => Some(RuleOutcome::new(
                None,
                "insufficient data: no usable domestic status or ADI",
                self.id(),
            )),
            _ => None,
        }
    }
}

pub struct DefaultSafe;
impl Rule for DefaultSafe {
    fn id(&self) -> &str {
        DEFAULT_SAFE
    }
    fn evaluate(&self, _facts: &FactRecord) -> Option<RuleOutcome> {
        Some(RuleOutcome::new(Some(RiskTier::Safe), "permitted with no intake limit", self.id()))
    }
}

// ------------- Declarative rules -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCondition {
    NotPermitted,
    Permitted,
    Absent,
    Unrecognized,
}

impl StatusCondition {
    fn holds(&self, flag: Option<&DomesticFlag>) -> bool {
        matches!(
            (self, flag),
            (StatusCondition::NotPermitted, Some(DomesticFlag::NotPermitted))
                | (StatusCondition::Permitted, Some(DomesticFlag::Permitted))
                | (StatusCondition::Absent, None)
                | (StatusCondition::Unrecognized, Some(DomesticFlag::Unrecognized(_)))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeCondition {
    Limit,
    Updating,
    /// Absent or not a number.
    Missing,
    Unparseable,
}

impl IntakeCondition {
    fn holds(&self, intake: Option<&IntakeAllowance>) -> bool {
        matches!(
            (self, intake),
            (IntakeCondition::Limit, Some(IntakeAllowance::Limit(_)))
                | (IntakeCondition::Updating, Some(IntakeAllowance::Updating))
                | (IntakeCondition::Missing, None | Some(IntakeAllowance::NotANumber))
                | (IntakeCondition::Unparseable, Some(IntakeAllowance::Unparseable(_)))
        )
    }
}

/// Every listed field must match one of its listed values; an empty list
/// places no constraint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conditions {
    pub status: Vec<StatusCondition>,
    pub intake: Vec<IntakeCondition>,
}

impl Conditions {
    pub fn is_unconditional(&self) -> bool {
        self.status.is_empty() && self.intake.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarativeRule {
    pub id: String,
    pub risk: Option<RiskTier>,
    /// May mention `{adi}` and `{code}`.
    pub reason: String,
    #[serde(default)]
    pub when: Conditions,
}

impl Rule for DeclarativeRule {
    fn id(&self) -> &str {
        &self.id
    }
    fn evaluate(&self, facts: &FactRecord) -> Option<RuleOutcome> {
        let status = self.when.status.is_empty()
            || self.when.status.iter().any(|c| c.holds(facts.domestic_flag.as_ref()));
        let intake = self.when.intake.is_empty()
            || self.when.intake.iter().any(|c| c.holds(facts.intake.as_ref()));
        if !(status && intake) {
            return None;
        }
        let adi = facts.intake.as_ref().and_then(IntakeAllowance::literal).unwrap_or("");
        let reason = self.reason.replace("{adi}", adi).replace("{code}", facts.code.as_str());
        Some(RuleOutcome::new(self.risk, reason, self.id.as_str()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleBookDefinition {
    rules: Vec<DeclarativeRule>,
}

// ------------- Rule book -------------
pub struct RuleBook {
    rules: Vec<Box<dyn Rule>>,
}

impl std::fmt::Debug for RuleBook {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.rules.iter().map(|r| r.id())).finish()
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleBook {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(StatusNotAllowed),
                Box::new(AdiNumericSafeLimit),
                Box::new(MissingData),
                Box::new(DefaultSafe),
            ],
        }
    }

    /// Parses and validates a declarative book of the form
    /// `{"rules": [{"id", "risk", "reason", "when": {"status": [..], "intake": [..]}}]}`.
    ///
    /// The book must be non-empty with unique ids, and its last rule must have
    /// no conditions so that some rule always fires.
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: RuleBookDefinition =
            serde_json::from_str(json).map_err(|e| EcoscanError::RuleBook(e.to_string()))?;
        let rules = definition.rules;
        let Some(last) = rules.last() else {
            return Err(EcoscanError::RuleBook("the rule book has no rules".into()));
        };
        if !last.when.is_unconditional() {
            return Err(EcoscanError::RuleBook(format!(
                "the last rule ({}) must have no conditions",
                last.id
            )));
        }
        for (i, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(EcoscanError::RuleBook(format!("rule {} has no id", i + 1)));
            }
            if rules[..i].iter().any(|earlier| earlier.id == rule.id) {
                return Err(EcoscanError::RuleBook(format!("duplicate rule id {}", rule.id)));
            }
        }
        debug!(rules = rules.len(), "declarative rule book parsed");
        Ok(Self { rules: rules.into_iter().map(|r| Box::new(r) as Box<dyn Rule>).collect() })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| EcoscanError::TableLoad {
            table: "rule book",
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the outcome of the first rule that fires.
    pub fn classify(&self, facts: &FactRecord) -> RuleOutcome {
        for rule in &self.rules {
            if let Some(outcome) = rule.evaluate(facts) {
                return outcome;
            }
        }
        warn!(code = %facts.code, "no rule fired");
        RuleOutcome::new(None, "insufficient data: no rule applies", MISSING_DATA)
    }
}
