//! Ecoscan – finds food additive codes in noisy label text and classifies
//! their risk.
//!
//! Ingredient lists reach the engine either as typed text or as an OCR
//! transcript of a label photo. Both are full of look-alike numbers (net
//! weights, nutrition values, batch numbers) and of OCR damage (`E33O`,
//! `E2II`). The pipeline is:
//!
//! 1. [`normalize`] – case folding, diacritic stripping and tokenizing.
//! 2. [`extract`] – five code grammars with OCR repair and a range check.
//! 3. [`context`] – drops unprefixed numbers that are really measurements.
//! 4. [`synonym`] – named additives (`bột ngọt`, `citric acid`) mapped to codes.
//! 5. [`registry`] – only registered codes survive.
//! 6. [`classify`] – a priority ordered [`classify::RuleBook`] turns the facts
//!    from a [`store::FactStore`] into a risk tier with a reason.
//!
//! [`engine::Engine`] wires these together over an immutable, shared
//! [`engine::ReferenceTables`] value.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use ecoscan::code::NormalizedCode;
//! use ecoscan::engine::{Engine, InputKind, ReferenceTables};
//! use ecoscan::registry::{CanonicalRegistryEntry, Registry};
//! use ecoscan::store::MemoryFactStore;
//! use ecoscan::synonym::SynonymTable;
//!
//! let mut citric = CanonicalRegistryEntry::new(NormalizedCode::parse("E330").unwrap());
//! citric.status = Some("0".into());
//! let registry = Registry::from_entries([
//!     citric,
//!     CanonicalRegistryEntry::new(NormalizedCode::parse("E100").unwrap()),
//!     CanonicalRegistryEntry::new(NormalizedCode::parse("E1520").unwrap()),
//! ]).unwrap();
//! let synonyms = SynonymTable::from_rows([("E330", "citric acid")]);
//! let store = MemoryFactStore::from_registry(&registry);
//! let engine = Engine::new(Arc::new(ReferenceTables::new(registry, synonyms)));
//!
//! let codes = engine.extract_codes("Sugar, citric acid, E1OO. Net weight 250 g");
//! assert_eq!(codes.iter().map(|c| c.as_str()).collect::<Vec<_>>(), ["100", "330"]);
//!
//! let result = engine.analyze("E330", InputKind::Text, &store).unwrap();
//! assert_eq!(result.codes[0].outcome.as_ref().unwrap().rule, "default_safe");
//! ```
//!
//! ## Binary
//! The `ecoscan` binary exposes the same engine through `extract`, `analyze`,
//! `evaluate`, `import` and `serve` subcommands; see [`settings`] for the
//! configuration it reads.

pub mod classify;
pub mod code;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod normalize;
pub mod registry;
pub mod server;
pub mod settings;
pub mod store;
pub mod synonym;

pub use error::{EcoscanError, Result};
