//! Connection setup and the statements shared by the writer and readers.

use std::path::Path;

use bytes::Bytes;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use cairn_types::{ObjectHash, Record};

use crate::config::LocalStoreConfig;
use crate::error::{StoreError, StoreResult};

const INSERT: &str = "INSERT OR IGNORE INTO objects(hash, content) VALUES (?1, ?2)";

/// Open the database file and prepare it for use.
pub(crate) fn open(path: &Path, config: &LocalStoreConfig) -> StoreResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    configure(&conn, config)?;
    init(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection, config: &LocalStoreConfig) -> StoreResult<()> {
    conn.busy_timeout(config.busy_timeout())?;
    // `journal_mode` reports the resulting mode as a row.
    let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

fn init(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS objects (
            hash TEXT PRIMARY KEY,
            content BLOB NOT NULL
        ) WITHOUT ROWID",
        [],
    )?;
    Ok(())
}

/// Insert `records` in one transaction. Returns how many were new.
pub(crate) fn insert_all<'a>(
    conn: &mut Connection,
    records: impl IntoIterator<Item = &'a Record>,
    level: i32,
) -> StoreResult<usize> {
    let tx = conn.transaction()?;
    let mut added = 0;
    {
        let mut stmt = tx.prepare_cached(INSERT)?;
        for record in records {
            let content = zstd::bulk::compress(&record.payload, level)?;
            added += stmt.execute(params![record.hash.to_hex(), content])?;
        }
    }
    tx.commit()?;
    Ok(added)
}

pub(crate) fn select(conn: &Connection, hash: &ObjectHash) -> StoreResult<Option<Bytes>> {
    let blob: Option<Vec<u8>> = conn
        .prepare_cached("SELECT content FROM objects WHERE hash = ?1")?
        .query_row(params![hash.to_hex()], |row| row.get(0))
        .optional()?;
    blob.map(|blob| decompress(hash, &blob)).transpose()
}

pub(crate) fn exists(conn: &Connection, hash: &ObjectHash) -> StoreResult<bool> {
    let found = conn
        .prepare_cached("SELECT 1 FROM objects WHERE hash = ?1")?
        .exists(params![hash.to_hex()])?;
    Ok(found)
}

/// Record count and total compressed bytes.
pub(crate) fn totals(conn: &Connection) -> StoreResult<(u64, u64)> {
    let (count, bytes): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(LENGTH(content)), 0) FROM objects",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((count.max(0) as u64, bytes.max(0) as u64))
}

fn decompress(hash: &ObjectHash, blob: &[u8]) -> StoreResult<Bytes> {
    zstd::decode_all(blob)
        .map(Bytes::from)
        .map_err(|e| StoreError::Corrupt {
            hash: *hash,
            reason: e.to_string(),
        })
}
