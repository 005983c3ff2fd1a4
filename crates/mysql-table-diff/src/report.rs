//! Run results: per-chunk outcomes funneled through one collector task
//! into a per-table and whole-run report, plus fix-SQL file output.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::chunk::id::ChunkId;
use crate::config::TableConfig;
use crate::core::ident::unique_id;
use crate::error::Result;

/// Verdict of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffOutcome {
    Pass,
    Fail,
}

/// Outcome of one chunk comparison.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// `schema:table` key of the owning table.
    pub table: String,

    pub chunk_id: ChunkId,

    /// Whether both sides held identical data for this range.
    pub equal: bool,

    /// Rows observed in the range on each side. From the fingerprint
    /// query on the fast path, from the row fetch otherwise.
    pub source_cnt: i64,
    pub target_cnt: i64,

    /// CRC32 fold of the range on each side; 0 when the chunk skipped
    /// the checksum phase.
    pub source_checksum: i64,
    pub target_checksum: i64,

    /// REPLACE statements generated (missing or differing rows).
    pub rows_add: usize,

    /// DELETE statements generated (target-only rows).
    pub rows_delete: usize,

    /// Repair statements for this chunk, in replay order.
    pub fix_sqls: Vec<String>,
}

/// One unequal chunk as persisted in the report.
#[derive(Debug, Clone, Serialize)]
pub struct FailedChunk {
    /// File-name id of the chunk.
    pub id: String,

    pub source_cnt: i64,
    pub target_cnt: i64,
    pub source_checksum: i64,
    pub target_checksum: i64,
}

/// Accumulated result for one table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub schema: String,
    pub table: String,
    pub chunks_checked: usize,

    /// Chunks that compared unequal, with the per-side fingerprints.
    pub failed_chunks: Vec<FailedChunk>,

    pub rows_add: usize,
    pub rows_delete: usize,

    /// Fatal error that aborted this table, if any.
    pub error: Option<String>,
}

impl TableReport {
    fn new(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            chunks_checked: 0,
            failed_chunks: Vec::new(),
            rows_add: 0,
            rows_delete: 0,
            error: None,
        }
    }

    /// Whether this table compared fully equal.
    pub fn data_equal(&self) -> bool {
        self.failed_chunks.is_empty() && self.error.is_none()
    }
}

/// Whole-run report, keyed by `schema:table`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tables: BTreeMap<String, TableReport>,
}

impl Report {
    /// Pre-populate one entry per configured table so tables that never
    /// produce a chunk still appear in the output.
    pub fn new(tables: &[TableConfig]) -> Self {
        let tables = tables
            .iter()
            .map(|t| {
                (
                    unique_id(&t.schema, &t.table),
                    TableReport::new(&t.schema, &t.table),
                )
            })
            .collect();
        Self {
            started_at: Utc::now(),
            finished_at: None,
            tables,
        }
    }

    pub fn record_chunk(&mut self, result: &ChunkResult) {
        let entry = self
            .tables
            .entry(result.table.clone())
            .or_insert_with(|| TableReport::new("", &result.table));
        entry.chunks_checked += 1;
        if !result.equal {
            entry.failed_chunks.push(FailedChunk {
                id: result.chunk_id.to_file_name(),
                source_cnt: result.source_cnt,
                target_cnt: result.target_cnt,
                source_checksum: result.source_checksum,
                target_checksum: result.target_checksum,
            });
            entry.rows_add += result.rows_add;
            entry.rows_delete += result.rows_delete;
        }
    }

    pub fn record_error(&mut self, table: &str, message: String) {
        let entry = self
            .tables
            .entry(table.to_string())
            .or_insert_with(|| TableReport::new("", table));
        entry.error = Some(message);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn outcome(&self) -> DiffOutcome {
        if self.tables.values().all(|t| t.data_equal()) {
            DiffOutcome::Pass
        } else {
            DiffOutcome::Fail
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON summary to `path`.
    pub fn commit_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!("Wrote summary to {}", path.as_ref().display());
        Ok(())
    }

    /// Human-readable one-line-per-table summary for the log.
    pub fn log_summary(&self) {
        for report in self.tables.values() {
            match &report.error {
                Some(e) => error!(
                    "Table {}.{}: ERROR: {}",
                    report.schema, report.table, e
                ),
                None if report.data_equal() => info!(
                    "Table {}.{}: equal ({} chunks)",
                    report.schema, report.table, report.chunks_checked
                ),
                None => info!(
                    "Table {}.{}: NOT equal ({}/{} chunks differ, +{} -{} rows)",
                    report.schema,
                    report.table,
                    report.failed_chunks.len(),
                    report.chunks_checked,
                    report.rows_add,
                    report.rows_delete
                ),
            }
        }
    }
}

/// Message from a chunk worker to the collector.
#[derive(Debug)]
pub enum CollectorMsg {
    Chunk(ChunkResult),
    TableError { table: String, message: String },
}

/// Write one chunk's repair statements under `dir`, in a file named by
/// the chunk id's string form so the id parses straight back from a
/// directory listing.
pub fn write_fix_file(dir: &Path, chunk_id: &ChunkId, statements: &[String]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(chunk_id.to_file_name());
    let mut content = statements.join("\n");
    content.push('\n');
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Drain worker messages into the report, writing fix files as unequal
/// chunks arrive. Runs as the single owner of the report so workers
/// never contend on it.
pub async fn collect(
    mut rx: mpsc::Receiver<CollectorMsg>,
    fix_dir: PathBuf,
    mut report: Report,
) -> Result<Report> {
    while let Some(msg) = rx.recv().await {
        match msg {
            CollectorMsg::Chunk(result) => {
                if !result.equal && !result.fix_sqls.is_empty() {
                    let path = write_fix_file(&fix_dir, &result.chunk_id, &result.fix_sqls)?;
                    info!(
                        table = %result.table,
                        chunk = %result.chunk_id,
                        "wrote fix SQL to {}",
                        path.display()
                    );
                }
                report.record_chunk(&result);
            }
            CollectorMsg::TableError { table, message } => {
                report.record_error(&table, message);
            }
        }
    }
    report.finish();
    Ok(report)
}
