use thiserror::Error;

#[derive(Error, Debug)]
pub enum EcoscanError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Failed to load {table} table from {path}: {message}")]
    TableLoad { table: &'static str, path: String, message: String },
    #[error("Rule book error: {0}")]
    RuleBook(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Fact store error: {0}")]
    FactStore(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, EcoscanError>;

// Helper conversions
impl From<rusqlite::Error> for EcoscanError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for EcoscanError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<csv::Error> for EcoscanError {
    fn from(e: csv::Error) -> Self { Self::Persistence(e.to_string()) }
}
