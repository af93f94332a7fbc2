//! Local cache of Steam Store metadata
//!
//! Entries live in a SQLite file keyed by app id. The whole table is loaded
//! into memory when the cache is opened; `put` only touches memory and
//! `flush` writes every dirty entry in a single transaction. Dropping the
//! cache flushes it, so error paths and cancelled runs keep what was fetched.

use crate::error::Result;
use chrono::{DateTime, Utc};
use game_common::{AppId, StoreMetadata};
use rusqlite::{params, Connection, ErrorCode, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Cached store answer for one app
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub app_id: AppId,
    pub name: String,
    pub metadata: StoreMetadata,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(app_id: AppId, name: &str, metadata: StoreMetadata) -> Self {
        Self {
            app_id,
            name: name.to_string(),
            metadata,
            fetched_at: Utc::now(),
        }
    }
}

/// Store metadata cache scoped to one run
pub struct GameCache {
    conn: Connection,
    path: Option<PathBuf>,
    entries: HashMap<AppId, CacheEntry>,
    dirty: BTreeSet<AppId>,
    bypass: bool,
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS store_metadata (
            app_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            metadata TEXT NOT NULL,
            fetched_at TEXT NOT NULL
        );
        ",
    )
}

const COLUMNS: [&str; 4] = ["app_id", "name", "metadata", "fetched_at"];

/// Errors that mean the file itself is damaged, as opposed to locked or
/// unreachable
fn is_corrupt(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

fn has_expected_columns(conn: &Connection) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare("PRAGMA table_info(store_metadata)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns == COLUMNS)
}

fn decode_entry(
    app_id: AppId,
    name: String,
    metadata: &str,
    fetched_at: &str,
) -> std::result::Result<CacheEntry, String> {
    let metadata: StoreMetadata =
        serde_json::from_str(metadata).map_err(|e| format!("bad metadata: {}", e))?;
    let fetched_at = DateTime::parse_from_rfc3339(fetched_at)
        .map_err(|e| format!("bad timestamp: {}", e))?
        .with_timezone(&Utc);
    Ok(CacheEntry {
        app_id,
        name,
        metadata,
        fetched_at,
    })
}

/// Load every readable row; rows that fail to decode are skipped and get
/// overwritten the next time their app is fetched
fn load_entries(conn: &Connection) -> rusqlite::Result<HashMap<AppId, CacheEntry>> {
    let mut stmt = conn.prepare("SELECT app_id, name, metadata, fetched_at FROM store_metadata")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, AppId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut entries = HashMap::new();
    for row in rows {
        let (app_id, name, metadata, fetched_at) = match row {
            Ok(values) => values,
            Err(e) if is_corrupt(&e) => return Err(e),
            Err(e) => {
                log::warn!("Skipping unreadable cache row: {}", e);
                continue;
            }
        };
        match decode_entry(app_id, name, &metadata, &fetched_at) {
            Ok(entry) => {
                entries.insert(app_id, entry);
            }
            Err(reason) => log::warn!("Skipping cache entry for app {}: {}", app_id, reason),
        }
    }
    Ok(entries)
}

enum OpenedFile {
    Ready(Connection, HashMap<AppId, CacheEntry>),
    /// The file is not a usable cache and can be replaced
    Unusable(String),
}

fn open_file(path: &Path) -> Result<OpenedFile> {
    let conn = Connection::open(path)?;
    let loaded = init_schema(&conn)
        .and_then(|()| has_expected_columns(&conn))
        .and_then(|matches| {
            if matches {
                load_entries(&conn).map(Some)
            } else {
                Ok(None)
            }
        });

    match loaded {
        Ok(Some(entries)) => Ok(OpenedFile::Ready(conn, entries)),
        Ok(None) => Ok(OpenedFile::Unusable(
            "unexpected store_metadata layout".to_string(),
        )),
        Err(e) if is_corrupt(&e) => Ok(OpenedFile::Unusable(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

impl GameCache {
    /// Open (or create) the cache file at `path`.
    ///
    /// A damaged file or one with a foreign table layout is replaced by an
    /// empty cache; other failures (a locked file, say) are returned as is.
    /// With `bypass` set every `get` misses while writes still persist.
    pub fn open(path: &Path, bypass: bool) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created cache directory: {}", parent.display());
            }
        }

        let (conn, entries) = match open_file(path)? {
            OpenedFile::Ready(conn, entries) => (conn, entries),
            OpenedFile::Unusable(reason) => {
                log::warn!(
                    "Cache file {} is unusable, starting fresh: {}",
                    path.display(),
                    reason
                );
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                match open_file(path)? {
                    OpenedFile::Ready(conn, entries) => (conn, entries),
                    OpenedFile::Unusable(reason) => {
                        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, reason).into())
                    }
                }
            }
        };

        log::info!(
            "Loaded store cache with {} entries from {}",
            entries.len(),
            path.display()
        );
        if bypass {
            log::info!("Cache bypass enabled, cached entries will be refreshed");
        }

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            entries,
            dirty: BTreeSet::new(),
            bypass,
        })
    }

    /// Cache that lives only as long as the process
    pub fn open_in_memory(bypass: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            entries: HashMap::new(),
            dirty: BTreeSet::new(),
            bypass,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Cached entry for an app; always `None` in bypass mode
    pub fn get(&self, app_id: AppId) -> Option<&CacheEntry> {
        if self.bypass {
            return None;
        }
        self.entries.get(&app_id)
    }

    /// Insert or overwrite an entry; persisted on the next flush
    pub fn put(&mut self, entry: CacheEntry) {
        self.dirty.insert(entry.app_id);
        self.entries.insert(entry.app_id, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write dirty entries in one transaction, returning how many were written
    pub fn flush(&mut self) -> Result<usize> {
        if self.dirty.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let count = upsert_entries_tx(&tx, &self.entries, &self.dirty)?;
        tx.commit()?;
        self.dirty.clear();
        log::debug!("Flushed {} cache entries", count);
        Ok(count)
    }

    /// Delete every entry, in memory and on disk
    pub fn clear(&mut self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM store_metadata", [])?;
        self.entries.clear();
        self.dirty.clear();
        log::info!("Purged {} entries from the store cache", deleted);
        Ok(deleted)
    }
}

fn upsert_entries_tx(
    tx: &Transaction<'_>,
    entries: &HashMap<AppId, CacheEntry>,
    dirty: &BTreeSet<AppId>,
) -> Result<usize> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO store_metadata (app_id, name, metadata, fetched_at)
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut count = 0;
    for entry in dirty.iter().filter_map(|id| entries.get(id)) {
        stmt.execute(params![
            entry.app_id,
            &entry.name,
            serde_json::to_string(&entry.metadata)?,
            entry.fetched_at.to_rfc3339(),
        ])?;
        count += 1;
    }
    Ok(count)
}

impl Drop for GameCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Failed to flush store cache: {}", e);
        }
    }
}
