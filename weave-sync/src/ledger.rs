//! Persistent sync run history.
//!
//! SQLite-backed, append/update-only. Status transitions are guarded in the
//! UPDATE statements themselves, so a terminal run can never be re-entered
//! no matter how calls interleave — the serialized connection makes
//! concurrent appends from detached run tasks safe.

use crate::error::{SyncError, SyncResult};
use crate::run::SyncRun;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;
use weave_types::{CollectionId, DeviceId, SyncId};

/// Persistent store for sync run records.
pub struct RunLedger {
    conn: Arc<Mutex<Connection>>,
}

impl RunLedger {
    /// Opens (or creates) a ledger at the given path.
    pub fn new(path: &Path) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Ledger(format!("failed to open run ledger: {e}")))?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    /// Opens an in-memory ledger (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Ledger(format!("failed to open in-memory ledger: {e}")))?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        ledger.init_schema()?;
        Ok(ledger)
    }

    fn init_schema(&self) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sync_runs (
                sync_id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL,
                source_device_id TEXT NOT NULL,
                target_device_id TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                documents_synced INTEGER NOT NULL DEFAULT 0,
                conflicts_count INTEGER NOT NULL DEFAULT 0,
                started_at TEXT NOT NULL,
                completed_at TEXT,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sync_runs_collection
                ON sync_runs (collection_id, started_at);
            ",
        )
        .map_err(|e| SyncError::Ledger(format!("failed to init ledger schema: {e}")))?;
        Ok(())
    }

    /// Records a freshly created (pending) run.
    pub fn record(&self, run: &SyncRun) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sync_runs (sync_id, collection_id, source_device_id, target_device_id,
                                    direction, status, documents_synced, conflicts_count,
                                    started_at, completed_at, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run.sync_id.as_str(),
                run.collection_id.to_string(),
                run.source_device_id.to_string(),
                run.target_device_id.to_string(),
                run.direction.to_string(),
                run.status.to_string(),
                run.documents_synced as i64,
                run.conflicts_count as i64,
                run.started_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
                run.error_message.as_deref(),
            ],
        )
        .map_err(|e| SyncError::Ledger(format!("failed to record run: {e}")))?;
        Ok(())
    }

    /// Moves a pending run to `in_progress`. A run in any other state is
    /// left untouched (and logged): transitions are monotonic.
    pub fn mark_in_progress(&self, sync_id: &SyncId) -> SyncResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE sync_runs SET status = 'in_progress'
                 WHERE sync_id = ?1 AND status = 'pending'",
                params![sync_id.as_str()],
            )
            .map_err(|e| SyncError::Ledger(format!("failed to update run: {e}")))?;
        if changed == 0 {
            warn!("ignoring in_progress transition for run {sync_id}: not pending");
        }
        Ok(())
    }

    /// Writes a run's terminal state. Ignored (and logged) if the run is
    /// already terminal — terminal runs are immutable.
    pub fn finish(
        &self,
        sync_id: &SyncId,
        status: crate::protocol::SyncStatus,
        documents_synced: u64,
        conflicts_count: u64,
        error_message: Option<&str>,
    ) -> SyncResult<()> {
        debug_assert!(status.is_terminal());
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE sync_runs
                 SET status = ?2, documents_synced = ?3, conflicts_count = ?4,
                     completed_at = ?5, error_message = ?6
                 WHERE sync_id = ?1 AND status IN ('pending', 'in_progress')",
                params![
                    sync_id.as_str(),
                    status.to_string(),
                    documents_synced as i64,
                    conflicts_count as i64,
                    Utc::now().to_rfc3339(),
                    error_message,
                ],
            )
            .map_err(|e| SyncError::Ledger(format!("failed to finish run: {e}")))?;
        if changed == 0 {
            warn!("ignoring terminal transition for run {sync_id}: already terminal");
        }
        Ok(())
    }

    /// Fetches one run by id.
    pub fn get(&self, sync_id: &SyncId) -> SyncResult<Option<SyncRun>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("{SELECT_RUN} WHERE sync_id = ?1"))
            .map_err(|e| SyncError::Ledger(format!("failed to prepare query: {e}")))?;
        let mut rows = stmt
            .query_map(params![sync_id.as_str()], row_to_run)
            .map_err(|e| SyncError::Ledger(format!("failed to query run: {e}")))?;
        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| SyncError::Ledger(format!("failed to read run row: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    /// Run history, newest first, optionally filtered by collection and/or
    /// participating device.
    pub fn history(
        &self,
        collection_id: Option<&CollectionId>,
        device_id: Option<&DeviceId>,
        limit: usize,
    ) -> SyncResult<Vec<SyncRun>> {
        let conn = self.conn.lock().unwrap();
        let collection = collection_id.map(ToString::to_string);
        let device = device_id.map(ToString::to_string);
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_RUN}
                 WHERE (?1 IS NULL OR collection_id = ?1)
                   AND (?2 IS NULL OR source_device_id = ?2 OR target_device_id = ?2)
                 ORDER BY started_at DESC
                 LIMIT ?3"
            ))
            .map_err(|e| SyncError::Ledger(format!("failed to prepare history query: {e}")))?;

        let rows = stmt
            .query_map(params![collection, device, limit as i64], row_to_run)
            .map_err(|e| SyncError::Ledger(format!("failed to query history: {e}")))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(row.map_err(|e| SyncError::Ledger(format!("failed to read run row: {e}")))?);
        }
        Ok(runs)
    }
}

const SELECT_RUN: &str = "SELECT sync_id, collection_id, source_device_id, target_device_id,
                                 direction, status, documents_synced, conflicts_count,
                                 started_at, completed_at, error_message
                          FROM sync_runs";

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRun> {
    let sync_id: String = row.get(0)?;
    let collection_id: String = row.get(1)?;
    let source_device_id: String = row.get(2)?;
    let target_device_id: String = row.get(3)?;
    let direction: String = row.get(4)?;
    let status: String = row.get(5)?;
    let documents_synced: i64 = row.get(6)?;
    let conflicts_count: i64 = row.get(7)?;
    let started_at: String = row.get(8)?;
    let completed_at: Option<String> = row.get(9)?;
    let error_message: Option<String> = row.get(10)?;

    Ok(SyncRun {
        sync_id: SyncId::from_raw(sync_id),
        collection_id: parse_column(&collection_id, 1, CollectionId::parse)?,
        source_device_id: parse_column(&source_device_id, 2, DeviceId::parse)?,
        target_device_id: parse_column(&target_device_id, 3, DeviceId::parse)?,
        direction: parse_column(&direction, 4, |s: &str| s.parse())?,
        status: parse_column(&status, 5, |s: &str| s.parse())?,
        documents_synced: documents_synced as u64,
        conflicts_count: conflicts_count as u64,
        started_at: parse_column(&started_at, 8, parse_rfc3339)?,
        completed_at: completed_at
            .map(|t| parse_column(&t, 9, parse_rfc3339))
            .transpose()?,
        error_message,
    })
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

fn parse_column<T, E: std::fmt::Display>(
    raw: &str,
    index: usize,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> rusqlite::Result<T> {
    parse(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("{e}").into(),
        )
    })
}
