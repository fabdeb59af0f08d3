// crates/omnibus-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Catalog Store
// Description: Durable CatalogStore backed by SQLite WAL.
// Purpose: Persist catalog documents with unique-key document semantics.
// Dependencies: omnibus-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`CatalogStore`] using `SQLite`. The
//! document-store contract the core expects is satisfied relationally:
//! unique constraints stand in for document-key uniqueness, `INSERT OR
//! IGNORE` under a transaction is the atomic append-if-absent-by-label
//! operation, and aggregate updates are single-row point writes. List
//! columns (aliases, attached identifiers, annotation details) are stored as
//! JSON text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use omnibus_core::AnnotationLabel;
use omnibus_core::AnnotationType;
use omnibus_core::CatalogStore;
use omnibus_core::Gene;
use omnibus_core::GeneAnnotation;
use omnibus_core::GeneAnnotationId;
use omnibus_core::GeneId;
use omnibus_core::GroupDraft;
use omnibus_core::GroupId;
use omnibus_core::GroupKey;
use omnibus_core::NewGene;
use omnibus_core::NewGeneAnnotation;
use omnibus_core::NewSpecies;
use omnibus_core::PageOf;
use omnibus_core::PageRequest;
use omnibus_core::Sample;
use omnibus_core::SampleAnnotationGroup;
use omnibus_core::SampleLabel;
use omnibus_core::SiblingScope;
use omnibus_core::Species;
use omnibus_core::SpeciesId;
use omnibus_core::StoreError;
use omnibus_core::TaxonId;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` catalog store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout in milliseconds.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` catalog store initialization errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Database error.
    #[error("sqlite catalog store error: {0}")]
    Db(String),
    /// Invalid configuration or data.
    #[error("sqlite catalog store invalid: {0}")]
    Invalid(String),
    /// Unsupported schema version on disk.
    #[error("sqlite catalog store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Db(msg) => Self::Io(msg),
            SqliteStoreError::Invalid(msg) => Self::Invalid(msg),
            SqliteStoreError::VersionMismatch(msg) => Self::VersionMismatch(msg),
        }
    }
}

/// Maps a rusqlite error to the interface error space.
fn db_err(err: &rusqlite::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

/// True when the error is a unique-constraint violation.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable catalog store backed by `SQLite`.
pub struct SqliteCatalogStore {
    /// Connection guarded for exclusive use per operation.
    connection: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Opens (or creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// the on-disk schema version is unsupported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Locks the connection for one store operation.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Store("sqlite connection mutex poisoned".to_string()))
    }
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS species (
                    id INTEGER PRIMARY KEY,
                    taxid INTEGER NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    alias_json TEXT NOT NULL,
                    cds_json TEXT NOT NULL,
                    qc_stats_json TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS genes (
                    id INTEGER PRIMARY KEY,
                    species_id INTEGER NOT NULL REFERENCES species(id),
                    label TEXT NOT NULL,
                    alias_json TEXT NOT NULL,
                    annotations_json TEXT NOT NULL,
                    UNIQUE (species_id, label)
                );
                CREATE TABLE IF NOT EXISTS gene_annotations (
                    id INTEGER PRIMARY KEY,
                    annotation_type TEXT NOT NULL,
                    label TEXT NOT NULL,
                    details_json TEXT,
                    gene_ids_json TEXT NOT NULL,
                    UNIQUE (annotation_type, label)
                );
                CREATE TABLE IF NOT EXISTS sample_annotation_groups (
                    id INTEGER PRIMARY KEY,
                    species_id INTEGER NOT NULL REFERENCES species(id),
                    gene_id INTEGER NOT NULL REFERENCES genes(id),
                    annotation_type TEXT NOT NULL,
                    label TEXT NOT NULL,
                    avg_tpm REAL NOT NULL DEFAULT 0,
                    spm REAL NOT NULL DEFAULT 0,
                    UNIQUE (species_id, gene_id, annotation_type, label)
                );
                CREATE INDEX IF NOT EXISTS idx_groups_by_label
                    ON sample_annotation_groups (annotation_type, label);
                CREATE TABLE IF NOT EXISTS samples (
                    group_id INTEGER NOT NULL
                        REFERENCES sample_annotation_groups(id) ON DELETE CASCADE,
                    label TEXT NOT NULL,
                    tpm REAL NOT NULL,
                    UNIQUE (group_id, label)
                );
                CREATE INDEX IF NOT EXISTS idx_samples_group
                    ON samples (group_id);",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Decodes a JSON column into a typed value.
fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|err| StoreError::Corrupt(err.to_string()))
}

/// Encodes a value into a JSON column.
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Converts a signed row identifier into its raw unsigned form.
fn raw_id(id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("negative row id: {id}")))
}

/// Converts an unsigned value into the signed integer form `SQLite` binds.
fn db_int(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Invalid(format!("value exceeds sqlite integer range: {value}")))
}

/// Maps one `species` row.
fn species_from_row(row: &Row<'_>) -> Result<Species, StoreError> {
    let raw = raw_id(row.get(0).map_err(|err| db_err(&err))?)?;
    let id = SpeciesId::from_raw(raw)
        .ok_or_else(|| StoreError::Corrupt("zero species id".to_string()))?;
    let taxid: u32 = row.get(1).map_err(|err| db_err(&err))?;
    let name: String = row.get(2).map_err(|err| db_err(&err))?;
    let alias_json: String = row.get(3).map_err(|err| db_err(&err))?;
    let cds_json: String = row.get(4).map_err(|err| db_err(&err))?;
    let qc_json: String = row.get(5).map_err(|err| db_err(&err))?;
    Ok(Species {
        id,
        taxid: TaxonId::new(taxid),
        name,
        alias: from_json(&alias_json)?,
        cds: from_json(&cds_json)?,
        qc_stats: from_json(&qc_json)?,
    })
}

/// Maps one `genes` row.
fn gene_from_row(row: &Row<'_>) -> Result<Gene, StoreError> {
    let raw = raw_id(row.get(0).map_err(|err| db_err(&err))?)?;
    let id =
        GeneId::from_raw(raw).ok_or_else(|| StoreError::Corrupt("zero gene id".to_string()))?;
    let species_raw = raw_id(row.get(1).map_err(|err| db_err(&err))?)?;
    let species_id = SpeciesId::from_raw(species_raw)
        .ok_or_else(|| StoreError::Corrupt("zero species id".to_string()))?;
    let label: String = row.get(2).map_err(|err| db_err(&err))?;
    let alias_json: String = row.get(3).map_err(|err| db_err(&err))?;
    let annotations_json: String = row.get(4).map_err(|err| db_err(&err))?;
    Ok(Gene {
        id,
        species_id,
        label,
        alias: from_json(&alias_json)?,
        annotations: from_json(&annotations_json)?,
    })
}

/// Maps one `gene_annotations` row.
fn annotation_from_row(row: &Row<'_>) -> Result<GeneAnnotation, StoreError> {
    let raw = raw_id(row.get(0).map_err(|err| db_err(&err))?)?;
    let id = GeneAnnotationId::from_raw(raw)
        .ok_or_else(|| StoreError::Corrupt("zero annotation id".to_string()))?;
    let annotation_type: String = row.get(1).map_err(|err| db_err(&err))?;
    let label: String = row.get(2).map_err(|err| db_err(&err))?;
    let details_json: Option<String> = row.get(3).map_err(|err| db_err(&err))?;
    let gene_ids_json: String = row.get(4).map_err(|err| db_err(&err))?;
    Ok(GeneAnnotation {
        id,
        annotation_type: AnnotationType::new(annotation_type),
        label: AnnotationLabel::new(label),
        details: details_json.as_deref().map(from_json).transpose()?,
        gene_ids: from_json(&gene_ids_json)?,
    })
}

/// Shape of one `sample_annotation_groups` row before samples are attached.
struct GroupRow {
    /// Raw group identifier.
    id: GroupId,
    /// Group key.
    key: GroupKey,
    /// Cached average.
    avg_tpm: f64,
    /// Cached SPM.
    spm: f64,
}

/// Maps one `sample_annotation_groups` row (without samples).
fn group_from_row(row: &Row<'_>) -> Result<GroupRow, StoreError> {
    let raw = raw_id(row.get(0).map_err(|err| db_err(&err))?)?;
    let id =
        GroupId::from_raw(raw).ok_or_else(|| StoreError::Corrupt("zero group id".to_string()))?;
    let species_raw = raw_id(row.get(1).map_err(|err| db_err(&err))?)?;
    let species_id = SpeciesId::from_raw(species_raw)
        .ok_or_else(|| StoreError::Corrupt("zero species id".to_string()))?;
    let gene_raw = raw_id(row.get(2).map_err(|err| db_err(&err))?)?;
    let gene_id = GeneId::from_raw(gene_raw)
        .ok_or_else(|| StoreError::Corrupt("zero gene id".to_string()))?;
    let annotation_type: String = row.get(3).map_err(|err| db_err(&err))?;
    let label: String = row.get(4).map_err(|err| db_err(&err))?;
    let avg_tpm: f64 = row.get(5).map_err(|err| db_err(&err))?;
    let spm: f64 = row.get(6).map_err(|err| db_err(&err))?;
    Ok(GroupRow {
        id,
        key: GroupKey {
            species_id,
            gene_id,
            annotation_type: AnnotationType::new(annotation_type),
            label: AnnotationLabel::new(label),
        },
        avg_tpm,
        spm,
    })
}

/// Loads the samples of one group in insertion order.
fn load_samples(connection: &Connection, id: GroupId) -> Result<Vec<Sample>, StoreError> {
    let mut stmt = connection
        .prepare_cached("SELECT label, tpm FROM samples WHERE group_id = ?1 ORDER BY rowid")
        .map_err(|err| db_err(&err))?;
    let rows = stmt
        .query_map(params![db_int(id.get())?], |row| {
            let label: String = row.get(0)?;
            let tpm: f64 = row.get(1)?;
            Ok(Sample {
                label: SampleLabel::new(label),
                tpm,
            })
        })
        .map_err(|err| db_err(&err))?;
    let mut samples = Vec::new();
    for row in rows {
        samples.push(row.map_err(|err| db_err(&err))?);
    }
    Ok(samples)
}

/// Assembles a full group document from its row and samples.
fn assemble_group(
    connection: &Connection,
    row: GroupRow,
) -> Result<SampleAnnotationGroup, StoreError> {
    let samples = load_samples(connection, row.id)?;
    Ok(SampleAnnotationGroup {
        id: row.id,
        key: row.key,
        samples,
        avg_tpm: row.avg_tpm,
        spm: row.spm,
    })
}

/// Columns selected for every group query.
const GROUP_COLUMNS: &str = "id, species_id, gene_id, annotation_type, label, avg_tpm, spm";

/// Counts rows matching a filtered query.
fn count_rows<P: rusqlite::Params>(
    connection: &Connection,
    sql: &str,
    filter_params: P,
) -> Result<u64, StoreError> {
    let mut stmt = connection.prepare_cached(sql).map_err(|err| db_err(&err))?;
    let count: i64 =
        stmt.query_row(filter_params, |row| row.get(0)).map_err(|err| db_err(&err))?;
    u64::try_from(count).map_err(|_| StoreError::Corrupt("negative row count".to_string()))
}

// ============================================================================
// SECTION: CatalogStore Implementation
// ============================================================================

impl CatalogStore for SqliteCatalogStore {
    fn insert_species(&self, input: &NewSpecies) -> Result<Species, StoreError> {
        let connection = self.lock()?;
        let result = connection.execute(
            "INSERT INTO species (taxid, name, alias_json, cds_json, qc_stats_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                input.taxid.get(),
                input.name,
                to_json(&input.alias)?,
                to_json(&input.cds)?,
                to_json(&input.qc_stats)?,
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(StoreError::DuplicateKey(format!("species taxid {}", input.taxid)));
            }
            Err(err) => return Err(db_err(&err)),
        }
        let raw = raw_id(connection.last_insert_rowid())?;
        let id = SpeciesId::from_raw(raw)
            .ok_or_else(|| StoreError::Corrupt("zero species id".to_string()))?;
        Ok(Species {
            id,
            taxid: input.taxid,
            name: input.name.clone(),
            alias: input.alias.clone(),
            cds: input.cds.clone(),
            qc_stats: input.qc_stats.clone(),
        })
    }

    fn list_species(&self) -> Result<Vec<Species>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, taxid, name, alias_json, cds_json, qc_stats_json
                 FROM species ORDER BY id",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt.query(params![]).map_err(|err| db_err(&err))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            out.push(species_from_row(row)?);
        }
        Ok(out)
    }

    fn find_species_by_taxid(&self, taxid: TaxonId) -> Result<Option<Species>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, taxid, name, alias_json, cds_json, qc_stats_json
                 FROM species WHERE taxid = ?1",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt.query(params![taxid.get()]).map_err(|err| db_err(&err))?;
        match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => Ok(Some(species_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn insert_gene(&self, species_id: SpeciesId, input: &NewGene) -> Result<Gene, StoreError> {
        let connection = self.lock()?;
        let result = connection.execute(
            "INSERT INTO genes (species_id, label, alias_json, annotations_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                db_int(species_id.get())?,
                input.label,
                to_json(&input.alias)?,
                to_json(&Vec::<GeneAnnotationId>::new())?,
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(StoreError::DuplicateKey(format!("gene label {}", input.label)));
            }
            Err(err) => return Err(db_err(&err)),
        }
        let raw = raw_id(connection.last_insert_rowid())?;
        let id =
            GeneId::from_raw(raw).ok_or_else(|| StoreError::Corrupt("zero gene id".to_string()))?;
        Ok(Gene {
            id,
            species_id,
            label: input.label.clone(),
            alias: input.alias.clone(),
            annotations: Vec::new(),
        })
    }

    fn list_genes(&self, species_id: SpeciesId) -> Result<Vec<Gene>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, species_id, label, alias_json, annotations_json
                 FROM genes WHERE species_id = ?1 ORDER BY id",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows =
            stmt.query(params![db_int(species_id.get())?]).map_err(|err| db_err(&err))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            out.push(gene_from_row(row)?);
        }
        Ok(out)
    }

    fn find_gene_by_label(
        &self,
        species_id: SpeciesId,
        label: &str,
    ) -> Result<Option<Gene>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, species_id, label, alias_json, annotations_json
                 FROM genes WHERE species_id = ?1 AND label = ?2",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![db_int(species_id.get())?, label])
            .map_err(|err| db_err(&err))?;
        match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => Ok(Some(gene_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn attach_gene_annotations(
        &self,
        gene_id: GeneId,
        annotation_ids: &[GeneAnnotationId],
    ) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let current_json: String = connection
            .query_row(
                "SELECT annotations_json FROM genes WHERE id = ?1",
                params![db_int(gene_id.get())?],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?
            .ok_or_else(|| StoreError::Invalid(format!("gene {gene_id} not found")))?;
        let mut current: Vec<GeneAnnotationId> = from_json(&current_json)?;
        for id in annotation_ids {
            if !current.contains(id) {
                current.push(*id);
            }
        }
        connection
            .execute(
                "UPDATE genes SET annotations_json = ?1 WHERE id = ?2",
                params![to_json(&current)?, db_int(gene_id.get())?],
            )
            .map_err(|err| db_err(&err))?;
        Ok(())
    }

    fn insert_gene_annotation(
        &self,
        input: &NewGeneAnnotation,
    ) -> Result<GeneAnnotation, StoreError> {
        let connection = self.lock()?;
        let details_json = input.details.as_ref().map(to_json).transpose()?;
        let result = connection.execute(
            "INSERT INTO gene_annotations (annotation_type, label, details_json, gene_ids_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                input.annotation_type.as_str(),
                input.label.as_str(),
                details_json,
                to_json(&input.gene_ids)?,
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(StoreError::DuplicateKey(format!(
                    "gene annotation {}/{}",
                    input.annotation_type, input.label
                )));
            }
            Err(err) => return Err(db_err(&err)),
        }
        let raw = raw_id(connection.last_insert_rowid())?;
        let id = GeneAnnotationId::from_raw(raw)
            .ok_or_else(|| StoreError::Corrupt("zero annotation id".to_string()))?;
        Ok(GeneAnnotation {
            id,
            annotation_type: input.annotation_type.clone(),
            label: input.label.clone(),
            details: input.details.clone(),
            gene_ids: input.gene_ids.clone(),
        })
    }

    fn find_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<Option<GeneAnnotation>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, annotation_type, label, details_json, gene_ids_json
                 FROM gene_annotations WHERE annotation_type = ?1 AND label = ?2",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![annotation_type.as_str(), label.as_str()])
            .map_err(|err| db_err(&err))?;
        match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => Ok(Some(annotation_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_gene_annotations(
        &self,
        annotation_type: Option<&AnnotationType>,
        label: Option<&AnnotationLabel>,
        page: &PageRequest,
    ) -> Result<PageOf<GeneAnnotation>, StoreError> {
        let connection = self.lock()?;
        // Absent filters bind NULL and collapse to a match-all; present ones
        // compare exactly, so pattern metacharacters in labels stay literal.
        let type_filter = annotation_type.map(AnnotationType::as_str);
        let label_filter = label.map(AnnotationLabel::as_str);
        let total = count_rows(
            &connection,
            "SELECT COUNT(1) FROM gene_annotations
             WHERE (?1 IS NULL OR annotation_type = ?1) AND (?2 IS NULL OR label = ?2)",
            params![type_filter, label_filter],
        )?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, annotation_type, label, details_json, gene_ids_json
                 FROM gene_annotations
                 WHERE (?1 IS NULL OR annotation_type = ?1) AND (?2 IS NULL OR label = ?2)
                 ORDER BY id LIMIT ?3 OFFSET ?4",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![
                type_filter,
                label_filter,
                db_int(page.page_size)?,
                db_int(page.offset())?,
            ])
            .map_err(|err| db_err(&err))?;
        let mut payload = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            payload.push(annotation_from_row(row)?);
        }
        Ok(PageOf {
            curr_page: page.page_num,
            page_total: page.page_total(total),
            payload,
        })
    }

    fn append_annotation_gene_ids(
        &self,
        id: GeneAnnotationId,
        gene_ids: &[GeneId],
    ) -> Result<GeneAnnotation, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT id, annotation_type, label, details_json, gene_ids_json
                 FROM gene_annotations WHERE id = ?1",
            )
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt.query(params![db_int(id.get())?]).map_err(|err| db_err(&err))?;
        let mut annotation = match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => annotation_from_row(row)?,
            None => {
                return Err(StoreError::Invalid(format!("gene annotation {id} not found")));
            }
        };
        drop(rows);
        drop(stmt);
        for gene_id in gene_ids {
            if !annotation.gene_ids.contains(gene_id) {
                annotation.gene_ids.push(*gene_id);
            }
        }
        connection
            .execute(
                "UPDATE gene_annotations SET gene_ids_json = ?1 WHERE id = ?2",
                params![to_json(&annotation.gene_ids)?, db_int(id.get())?],
            )
            .map_err(|err| db_err(&err))?;
        Ok(annotation)
    }

    fn delete_gene_annotation(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
    ) -> Result<bool, StoreError> {
        let connection = self.lock()?;
        let removed = connection
            .execute(
                "DELETE FROM gene_annotations WHERE annotation_type = ?1 AND label = ?2",
                params![annotation_type.as_str(), label.as_str()],
            )
            .map_err(|err| db_err(&err))?;
        Ok(removed > 0)
    }

    fn find_group(&self, key: &GroupKey) -> Result<Option<SampleAnnotationGroup>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(&format!(
                "SELECT {GROUP_COLUMNS} FROM sample_annotation_groups
                 WHERE species_id = ?1 AND gene_id = ?2
                   AND annotation_type = ?3 AND label = ?4"
            ))
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![
                db_int(key.species_id.get())?,
                db_int(key.gene_id.get())?,
                key.annotation_type.as_str(),
                key.label.as_str(),
            ])
            .map_err(|err| db_err(&err))?;
        let row = match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => group_from_row(row)?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);
        Ok(Some(assemble_group(&connection, row)?))
    }

    fn insert_group(
        &self,
        draft: &GroupDraft,
        avg_tpm: f64,
    ) -> Result<SampleAnnotationGroup, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection.transaction().map_err(|err| db_err(&err))?;
        let result = tx.execute(
            "INSERT INTO sample_annotation_groups
                 (species_id, gene_id, annotation_type, label, avg_tpm, spm)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![
                db_int(draft.key.species_id.get())?,
                db_int(draft.key.gene_id.get())?,
                draft.key.annotation_type.as_str(),
                draft.key.label.as_str(),
                avg_tpm,
            ],
        );
        match result {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => {
                return Err(StoreError::DuplicateKey(format!(
                    "sample annotation group {}/{}",
                    draft.key.annotation_type, draft.key.label
                )));
            }
            Err(err) => return Err(db_err(&err)),
        }
        let raw = raw_id(tx.last_insert_rowid())?;
        let id = GroupId::from_raw(raw)
            .ok_or_else(|| StoreError::Corrupt("zero group id".to_string()))?;
        let group_id = db_int(id.get())?;
        for sample in &draft.samples {
            tx.execute(
                "INSERT OR IGNORE INTO samples (group_id, label, tpm) VALUES (?1, ?2, ?3)",
                params![group_id, sample.label.as_str(), sample.tpm],
            )
            .map_err(|err| db_err(&err))?;
        }
        tx.commit().map_err(|err| db_err(&err))?;
        let samples = load_samples(&connection, id)?;
        Ok(SampleAnnotationGroup {
            id,
            key: draft.key.clone(),
            samples,
            avg_tpm,
            spm: 0.0,
        })
    }

    fn append_group_samples(
        &self,
        id: GroupId,
        samples: &[Sample],
    ) -> Result<SampleAnnotationGroup, StoreError> {
        let mut connection = self.lock()?;
        let group_id = db_int(id.get())?;
        let tx = connection.transaction().map_err(|err| db_err(&err))?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM sample_annotation_groups WHERE id = ?1",
                params![group_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_err(&err))?;
        if exists.is_none() {
            return Err(StoreError::Invalid(format!("sample annotation group {id} not found")));
        }
        for sample in samples {
            // Existing label wins; the incoming duplicate is discarded.
            tx.execute(
                "INSERT OR IGNORE INTO samples (group_id, label, tpm) VALUES (?1, ?2, ?3)",
                params![group_id, sample.label.as_str(), sample.tpm],
            )
            .map_err(|err| db_err(&err))?;
        }
        tx.commit().map_err(|err| db_err(&err))?;

        let mut stmt = connection
            .prepare_cached(&format!(
                "SELECT {GROUP_COLUMNS} FROM sample_annotation_groups WHERE id = ?1"
            ))
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt.query(params![group_id]).map_err(|err| db_err(&err))?;
        let row = match rows.next().map_err(|err| db_err(&err))? {
            Some(row) => group_from_row(row)?,
            None => {
                return Err(StoreError::Corrupt(format!(
                    "sample annotation group {id} vanished mid-append"
                )));
            }
        };
        drop(rows);
        drop(stmt);
        assemble_group(&connection, row)
    }

    fn set_group_avg(&self, id: GroupId, avg_tpm: f64) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE sample_annotation_groups SET avg_tpm = ?1 WHERE id = ?2",
                params![avg_tpm, db_int(id.get())?],
            )
            .map_err(|err| db_err(&err))?;
        if updated == 0 {
            return Err(StoreError::Invalid(format!("sample annotation group {id} not found")));
        }
        Ok(())
    }

    fn set_group_spm(&self, id: GroupId, spm: f64) -> Result<(), StoreError> {
        let connection = self.lock()?;
        let updated = connection
            .execute(
                "UPDATE sample_annotation_groups SET spm = ?1 WHERE id = ?2",
                params![spm, db_int(id.get())?],
            )
            .map_err(|err| db_err(&err))?;
        if updated == 0 {
            return Err(StoreError::Invalid(format!("sample annotation group {id} not found")));
        }
        Ok(())
    }

    fn sibling_groups(
        &self,
        scope: &SiblingScope,
    ) -> Result<Vec<SampleAnnotationGroup>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(&format!(
                "SELECT {GROUP_COLUMNS} FROM sample_annotation_groups
                 WHERE species_id = ?1 AND gene_id = ?2 AND annotation_type = ?3
                 ORDER BY id"
            ))
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![
                db_int(scope.species_id.get())?,
                db_int(scope.gene_id.get())?,
                scope.annotation_type.as_str(),
            ])
            .map_err(|err| db_err(&err))?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            headers.push(group_from_row(row)?);
        }
        drop(rows);
        drop(stmt);
        headers.into_iter().map(|row| assemble_group(&connection, row)).collect()
    }

    fn groups_by_gene(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError> {
        let connection = self.lock()?;
        let total = count_rows(
            &connection,
            "SELECT COUNT(1) FROM sample_annotation_groups
             WHERE species_id = ?1 AND gene_id = ?2",
            params![db_int(species_id.get())?, db_int(gene_id.get())?],
        )?;
        let mut stmt = connection
            .prepare_cached(&format!(
                "SELECT {GROUP_COLUMNS} FROM sample_annotation_groups
                 WHERE species_id = ?1 AND gene_id = ?2
                 ORDER BY id LIMIT ?3 OFFSET ?4"
            ))
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![
                db_int(species_id.get())?,
                db_int(gene_id.get())?,
                db_int(page.page_size)?,
                db_int(page.offset())?,
            ])
            .map_err(|err| db_err(&err))?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            headers.push(group_from_row(row)?);
        }
        drop(rows);
        drop(stmt);
        let payload: Result<Vec<_>, _> =
            headers.into_iter().map(|row| assemble_group(&connection, row)).collect();
        Ok(PageOf {
            curr_page: page.page_num,
            page_total: page.page_total(total),
            payload: payload?,
        })
    }

    fn groups_by_label(
        &self,
        annotation_type: &AnnotationType,
        label: &AnnotationLabel,
        page: &PageRequest,
    ) -> Result<PageOf<SampleAnnotationGroup>, StoreError> {
        let connection = self.lock()?;
        let total = count_rows(
            &connection,
            "SELECT COUNT(1) FROM sample_annotation_groups
             WHERE annotation_type = ?1 AND label = ?2",
            params![annotation_type.as_str(), label.as_str()],
        )?;
        let mut stmt = connection
            .prepare_cached(&format!(
                "SELECT {GROUP_COLUMNS} FROM sample_annotation_groups
                 WHERE annotation_type = ?1 AND label = ?2
                 ORDER BY id LIMIT ?3 OFFSET ?4"
            ))
            .map_err(|err| db_err(&err))?;
        let mut rows = stmt
            .query(params![
                annotation_type.as_str(),
                label.as_str(),
                db_int(page.page_size)?,
                db_int(page.offset())?,
            ])
            .map_err(|err| db_err(&err))?;
        let mut headers = Vec::new();
        while let Some(row) = rows.next().map_err(|err| db_err(&err))? {
            headers.push(group_from_row(row)?);
        }
        drop(rows);
        drop(stmt);
        let payload: Result<Vec<_>, _> =
            headers.into_iter().map(|row| assemble_group(&connection, row)).collect();
        Ok(PageOf {
            curr_page: page.page_num,
            page_total: page.page_total(total),
            payload: payload?,
        })
    }

    fn gene_sample_labels(
        &self,
        species_id: SpeciesId,
        gene_id: GeneId,
    ) -> Result<BTreeSet<SampleLabel>, StoreError> {
        let connection = self.lock()?;
        let mut stmt = connection
            .prepare_cached(
                "SELECT DISTINCT s.label
                 FROM samples s
                 JOIN sample_annotation_groups g ON g.id = s.group_id
                 WHERE g.species_id = ?1 AND g.gene_id = ?2",
            )
            .map_err(|err| db_err(&err))?;
        let rows = stmt
            .query_map(params![db_int(species_id.get())?, db_int(gene_id.get())?], |row| {
                let label: String = row.get(0)?;
                Ok(SampleLabel::new(label))
            })
            .map_err(|err| db_err(&err))?;
        let mut labels = BTreeSet::new();
        for row in rows {
            labels.insert(row.map_err(|err| db_err(&err))?);
        }
        Ok(labels)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
