//! Layered configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `ecoscan.{json,toml,yaml}` in the working directory, or the file given
//!    with `--config`
//! 3. environment variables such as `ECOSCAN__MATCHING__MODE=fuzzy`

use config::{Config, Environment, File};
use serde::Deserialize;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::context::ContextFilter;
use crate::error::{EcoscanError, Result};
use crate::extract::DigitMap;
use crate::synonym::{FuzzyConfig, MatchMode};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub registry_path: PathBuf,
    pub synonyms_path: Option<PathBuf>,
    /// A declarative rule book; the standard book is used when unset.
    pub rules_path: Option<PathBuf>,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub ocr: OcrSettings,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub server: ServerSettings,
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub mode: MatchMode,
    pub short_term_len: usize,
    pub short_term_max: usize,
    pub long_term_max: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        let fuzzy = FuzzyConfig::default();
        Self {
            mode: MatchMode::default(),
            short_term_len: fuzzy.short_term_len,
            short_term_max: fuzzy.short_term_max,
            long_term_max: fuzzy.long_term_max,
        }
    }
}

impl MatchingSettings {
    pub fn fuzzy(&self) -> FuzzyConfig {
        FuzzyConfig {
            short_term_len: self.short_term_len,
            short_term_max: self.short_term_max,
            long_term_max: self.long_term_max,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Confusable character to digit, e.g. `{"b": "6"}`. Letters apply to
    /// both cases.
    pub digit_overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub extra_keywords: Vec<String>,
    pub lookbehind_chars: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { extra_keywords: Vec::new(), lookbehind_chars: 28 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreSettings {
    /// Facts straight from the registry.
    #[default]
    Memory,
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".into() }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("registry_path", "data/registry.csv")?
            .set_default("synonyms_path", "data/synonyms.csv")?
            .set_default("log_filter", "ecoscan=info")?;
        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("ecoscan").required(false)),
        };
        let settings: Settings = builder
            .add_source(Environment::with_prefix("ECOSCAN").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry_path.as_os_str().is_empty() {
            return Err(EcoscanError::Config("registry_path is empty".into()));
        }
        if self.context.lookbehind_chars == 0 {
            return Err(EcoscanError::Config("context.lookbehind_chars must be positive".into()));
        }
        if self.matching.short_term_max > self.matching.long_term_max {
            return Err(EcoscanError::Config(
                "matching.short_term_max exceeds matching.long_term_max".into(),
            ));
        }
        self.server
            .bind
            .parse::<SocketAddr>()
            .map_err(|e| EcoscanError::Config(format!("server.bind {}: {e}", self.server.bind)))?;
        self.digit_map()?;
        Ok(())
    }

    pub fn digit_map(&self) -> Result<DigitMap> {
        let mut map = DigitMap::default();
        for (from, to) in &self.ocr.digit_overrides {
            let (Some(from), Some(to)) = (single_char(from), single_char(to)) else {
                return Err(EcoscanError::Config(format!(
                    "ocr.digit_overrides entry {from} = {to} must map one character to one digit"
                )));
            };
            map.set(from, to)?;
            if from.is_ascii_alphabetic() {
                map.set(from.to_ascii_uppercase(), to)?;
                map.set(from.to_ascii_lowercase(), to)?;
            }
        }
        Ok(map)
    }

    pub fn context_filter(&self) -> ContextFilter {
        ContextFilter::default()
            .with_extra_keywords(&self.context.extra_keywords)
            .with_lookbehind(self.context.lookbehind_chars)
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.trim().chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}
