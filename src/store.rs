//! Where facts come from.
//!
//! The engine only sees the [`FactStore`] trait. [`MemoryFactStore`] serves
//! facts straight from the loaded registry, [`SqliteFactStore`] from a SQLite
//! file filled by `ecoscan import`.

// used for persistence
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use seahash::SeaHasher;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::path::Path;
use std::sync::Mutex;

use crate::classify::{DomesticFlag, FactRecord, IntakeAllowance};
use crate::code::NormalizedCode;
use crate::error::{EcoscanError, Result};
use crate::registry::Registry;

pub type CodeHasher = BuildHasherDefault<SeaHasher>;

pub trait FactStore: Send + Sync {
    /// `Ok(None)` when the store has no record for the code.
    fn fetch(&self, code: &NormalizedCode) -> Result<Option<FactRecord>>;
}

// ------------- In memory -------------
#[derive(Debug, Clone, Default)]
pub struct MemoryFactStore {
    facts: HashMap<NormalizedCode, FactRecord, CodeHasher>,
}

impl MemoryFactStore {
    pub fn from_registry(registry: &Registry) -> Self {
        Self::from_records(registry.entries().map(FactRecord::from_entry))
    }

    pub fn from_records(records: impl IntoIterator<Item = FactRecord>) -> Self {
        let mut facts = HashMap::default();
        for record in records {
            facts.insert(record.code.clone(), record);
        }
        Self { facts }
    }

    pub fn remove(&mut self, code: &NormalizedCode) -> Option<FactRecord> {
        self.facts.remove(code)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl FactStore for MemoryFactStore {
    fn fetch(&self, code: &NormalizedCode) -> Result<Option<FactRecord>> {
        Ok(self.facts.get(code).cloned())
    }
}

// ------------- SQLite -------------
/// Facts kept in SQLite. Values are stored as written and parsed on fetch;
/// SQL `null` means the value is absent.
pub struct SqliteFactStore {
    connection: Mutex<Connection>,
}

impl SqliteFactStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let connection = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "fact store opened");
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Additive (
                Additive_Code text not null,
                Name text null,
                Name_VN text null,
                Functions text not null,
                ADI text null,
                Status text null,
                Info text null,
                Source text null,
                constraint referenceable_Additive_Code primary key (
                    Additive_Code
                )
            );
            ",
        )?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Inserts or replaces every registry entry in one transaction. Returns the
    /// number of rows written.
    pub fn import_registry(&self, registry: &Registry) -> Result<usize> {
        let mut connection = self.connection.lock().map_err(|e| EcoscanError::Lock(e.to_string()))?;
        let transaction = connection.transaction()?;
        let mut written = 0;
        {
            let mut upsert = transaction.prepare(
                "
                insert into Additive (
                    Additive_Code, Name, Name_VN, Functions, ADI, Status, Info, Source
                ) values (?, ?, ?, ?, ?, ?, ?, ?)
                on conflict (Additive_Code) do update set
                    Name = excluded.Name,
                    Name_VN = excluded.Name_VN,
                    Functions = excluded.Functions,
                    ADI = excluded.ADI,
                    Status = excluded.Status,
                    Info = excluded.Info,
                    Source = excluded.Source
                ",
            )?;
            for entry in registry.entries() {
                let functions = serde_json::to_string(&entry.functions)
                    .map_err(|e| EcoscanError::Persistence(e.to_string()))?;
                written += upsert.execute(params![
                    entry.code.as_str(),
                    entry.name,
                    entry.name_vn,
                    functions,
                    entry.adi,
                    entry.status,
                    entry.info,
                    entry.source,
                ])?;
            }
        }
        transaction.commit()?;
        info!(rows = written, "registry imported into fact store");
        Ok(written)
    }

    pub fn count(&self) -> Result<usize> {
        let connection = self.connection.lock().map_err(|e| EcoscanError::Lock(e.to_string()))?;
        let count: i64 = connection.query_row("select count(*) from Additive", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl FactStore for SqliteFactStore {
    fn fetch(&self, code: &NormalizedCode) -> Result<Option<FactRecord>> {
        let connection = self.connection.lock().map_err(|e| EcoscanError::Lock(e.to_string()))?;
        let row = connection
            .query_row(
                "
                select Name, Name_VN, Functions, ADI, Status, Info
                from Additive
                where Additive_Code = ?
                ",
                params![code.as_str()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| EcoscanError::FactStore(e.to_string()))?;
        let Some((name, name_vn, functions, adi, status, info)) = row else {
            return Ok(None);
        };
        let functions: Vec<String> =
            serde_json::from_str(&functions).map_err(|e| EcoscanError::FactStore(e.to_string()))?;
        Ok(Some(FactRecord {
            code: code.clone(),
            name,
            name_vn,
            functions,
            intake: adi.as_deref().map(IntakeAllowance::parse),
            domestic_flag: status.as_deref().and_then(DomesticFlag::parse),
            info,
        }))
    }
}
