//! Run orchestration: per-table setup, chunk fan-out, and the
//! checksum-then-rows comparison of each chunk.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::load_table_info;
use crate::checksum::get_count_and_crc32_checksum;
use crate::chunk::range::Chunk;
use crate::chunk::split::{calculate_chunk_size, split_table};
use crate::config::{Config, TableConfig};
use crate::core::row::{build_rows_query, compare_data, Row};
use crate::core::schema::{ignore_columns, Column, TableInfo};
use crate::error::{DiffError, Result};
use crate::fixsql::{
    generate_delete_dml, generate_replace_dml, generate_replace_dml_with_annotation,
};
use crate::pool::WorkerPool;
use crate::report::{ChunkResult, CollectorMsg, Report};
use crate::source::{retry, DbPool};
use crate::stats::get_better_index;

/// Attempts per checksum or row-fetch query.
const CHECK_RETRY_COUNT: usize = 3;

/// A configured comparison run between two MySQL endpoints.
pub struct Diff {
    source: Arc<DbPool>,
    target: Arc<DbPool>,
    config: Config,
    cancel: CancellationToken,
}

/// Everything a chunk worker needs, shared across the table's chunks.
struct TableContext {
    source: Arc<DbPool>,
    target: Arc<DbPool>,
    info: Arc<TableInfo>,
    order_cols: Arc<Vec<Column>>,
    use_checksum: bool,
    cancel: CancellationToken,
    tx: mpsc::Sender<CollectorMsg>,
}

impl Diff {
    /// Connect both sides. The pools hold enough connections for every
    /// worker plus the splitter and catalog queries.
    pub async fn new(config: Config, cancel: CancellationToken) -> Result<Self> {
        let max_conns = config.check.check_thread_count as u32 + 2;
        let source = Arc::new(DbPool::connect(&config.source, max_conns, "source").await?);
        let target = Arc::new(DbPool::connect(&config.target, max_conns, "target").await?);
        Ok(Self {
            source,
            target,
            config,
            cancel,
        })
    }

    /// Compare every configured table and return the aggregated report.
    ///
    /// Tables run sequentially; chunks within a table run on the worker
    /// pool. A table-level failure is recorded and the run moves on, so
    /// one broken table never hides results for the others.
    pub async fn equal(&self) -> Result<Report> {
        let report = Report::new(&self.config.check.tables);
        let worker_count = self.config.check.check_thread_count;
        let (tx, rx) = mpsc::channel(worker_count * 2);
        let fix_dir = PathBuf::from(&self.config.check.fix_sql_dir);
        let collector = tokio::spawn(crate::report::collect(rx, fix_dir, report));

        let pool = WorkerPool::new(worker_count, "check");
        for (table_index, table) in self.config.check.tables.iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.check_table(table_index, table, &pool, &tx).await {
                if matches!(e, DiffError::Cancelled) {
                    break;
                }
                warn!(
                    schema = %table.schema,
                    table = %table.table,
                    error = %e,
                    "table check failed"
                );
                let msg = CollectorMsg::TableError {
                    table: crate::core::ident::unique_id(&table.schema, &table.table),
                    message: e.to_string(),
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
        }

        for e in pool.wait_finished().await {
            warn!(error = %e, "chunk worker failed");
        }
        drop(tx);

        let report = collector
            .await
            .map_err(|e| DiffError::Task(format!("result collector failed: {e}")))??;
        if self.cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }
        Ok(report)
    }

    async fn check_table(
        &self,
        table_index: usize,
        table: &TableConfig,
        pool: &WorkerPool,
        tx: &mpsc::Sender<CollectorMsg>,
    ) -> Result<()> {
        let source_info =
            load_table_info(&self.source, &table.schema, &table.table, &self.cancel).await?;
        let target_info =
            load_table_info(&self.target, &table.schema, &table.table, &self.cancel).await?;

        let info = ignore_columns(&source_info, &table.ignore_columns);
        let target_info = ignore_columns(&target_info, &table.ignore_columns);
        check_schema_match(&info, &target_info)?;

        // The split index orders rows and partitions the key space. A
        // table without any usable index degrades to one full-range
        // chunk ordered over every compared column.
        let (split_cols, order_cols) = match get_better_index(&self.source, &info, &self.cancel)
            .await
        {
            Ok(candidates) => {
                // Candidates come back best-first; a later candidate
                // only matters if the best one had no usable columns.
                let index = candidates
                    .iter()
                    .find(|i| !i.columns.is_empty())
                    .ok_or_else(|| DiffError::NoUsableIndex(info.unique_id()))?;
                let cols = info.index_columns(index);
                info!(
                    schema = %table.schema,
                    table = %table.table,
                    index = %index.name,
                    "selected split index"
                );
                (cols.clone(), cols)
            }
            Err(DiffError::NoUsableIndex(_)) => {
                warn!(
                    schema = %table.schema,
                    table = %table.table,
                    "no usable index, comparing as a single chunk"
                );
                let all: Vec<Column> = info.diff_columns().into_iter().cloned().collect();
                (Vec::new(), all)
            }
            Err(e) => return Err(e),
        };

        let row_count = self
            .source
            .get_row_count(&table.schema, &table.table, "TRUE", &[], &self.cancel)
            .await?;
        let chunk_size = if self.config.check.chunk_size > 0 {
            self.config.check.chunk_size
        } else {
            calculate_chunk_size(row_count)
        };

        let chunks = split_table(
            &self.source,
            &info,
            &split_cols,
            chunk_size,
            table_index,
            row_count,
            &self.cancel,
        )
        .await?;
        info!(
            schema = %table.schema,
            table = %table.table,
            rows = row_count,
            chunk_size,
            chunks = chunks.len(),
            "table split into chunks"
        );

        let info = Arc::new(info);
        let order_cols = Arc::new(order_cols);
        for chunk in chunks {
            let ctx = TableContext {
                source: self.source.clone(),
                target: self.target.clone(),
                info: info.clone(),
                order_cols: order_cols.clone(),
                use_checksum: self.config.check.use_checksum,
                cancel: self.cancel.clone(),
                tx: tx.clone(),
            };
            let chunk_id = chunk.id;
            pool.apply(async move {
                let result = check_chunk(&ctx, chunk).await;
                if let Err(e) = &result {
                    if !matches!(e, DiffError::Cancelled) {
                        // A lost chunk must fail the table, never bias
                        // the verdict toward pass.
                        let msg = CollectorMsg::TableError {
                            table: ctx.info.unique_id(),
                            message: format!("chunk {chunk_id} failed: {e}"),
                        };
                        let _ = ctx.tx.send(msg).await;
                    }
                }
                result
            })
            .await?;
        }
        Ok(())
    }
}

/// Require the compared column sets to agree on both sides.
fn check_schema_match(source: &TableInfo, target: &TableInfo) -> Result<()> {
    for column in source.diff_columns() {
        match target.column(&column.name) {
            None => {
                return Err(DiffError::table_check(
                    source.unique_id(),
                    format!("column `{}` missing on target", column.name),
                ))
            }
            Some(other) if other.data_type != column.data_type => {
                return Err(DiffError::table_check(
                    source.unique_id(),
                    format!(
                        "column `{}` type mismatch: {} vs {}",
                        column.name, column.data_type, other.data_type
                    ),
                ))
            }
            Some(_) => {}
        }
    }
    for column in target.diff_columns() {
        if source.column(&column.name).is_none() {
            return Err(DiffError::table_check(
                source.unique_id(),
                format!("column `{}` missing on source", column.name),
            ));
        }
    }
    Ok(())
}

/// Data-level result of one chunk comparison, before reporting.
#[derive(Debug, Default)]
struct ChunkOutcome {
    equal: bool,
    source_cnt: i64,
    target_cnt: i64,
    source_checksum: i64,
    target_checksum: i64,
    rows_add: usize,
    rows_delete: usize,
    fix_sqls: Vec<String>,
}

/// The checksum-then-rows decision for one chunk, with the two query
/// phases supplied as futures so the escalation logic stands on its own.
///
/// When `use_checksum` is set the fingerprints are compared first and a
/// match settles the chunk without touching `fetch_rows`. On mismatch
/// (or with the fast path disabled) both sides' rows are fetched and
/// merge-diffed; a fingerprint mismatch that yields no row difference
/// means the rows moved between the two reads, and the chunk counts as
/// equal.
async fn compare_chunk<CF, CFut, RF, RFut>(
    use_checksum: bool,
    fingerprints: CF,
    fetch_rows: RF,
    order_cols: &[Column],
    columns: &[Column],
    info: &TableInfo,
    target_schema: &str,
) -> Result<ChunkOutcome>
where
    CF: FnOnce() -> CFut,
    CFut: std::future::Future<Output = Result<((i64, i64), (i64, i64))>>,
    RF: FnOnce() -> RFut,
    RFut: std::future::Future<Output = Result<(Vec<Row>, Vec<Row>)>>,
{
    let mut outcome = ChunkOutcome::default();

    if use_checksum {
        let (source_sum, target_sum) = fingerprints().await?;
        outcome.source_cnt = source_sum.0;
        outcome.target_cnt = target_sum.0;
        outcome.source_checksum = source_sum.1;
        outcome.target_checksum = target_sum.1;
        if source_sum == target_sum {
            outcome.equal = true;
            return Ok(outcome);
        }
    }

    let (source_rows, target_rows) = fetch_rows().await?;
    outcome.source_cnt = source_rows.len() as i64;
    outcome.target_cnt = target_rows.len() as i64;

    let (fix_sqls, rows_add, rows_delete) = diff_rows(
        &source_rows,
        &target_rows,
        order_cols,
        columns,
        info,
        target_schema,
    )?;
    outcome.equal = fix_sqls.is_empty();
    outcome.rows_add = rows_add;
    outcome.rows_delete = rows_delete;
    outcome.fix_sqls = fix_sqls;
    Ok(outcome)
}

/// Compare one chunk: checksum fast path first, rows on mismatch.
async fn check_chunk(ctx: &TableContext, chunk: Chunk) -> Result<()> {
    let (where_clause, args) = chunk.where_clause();
    let columns: Vec<Column> = ctx.info.diff_columns().into_iter().cloned().collect();
    let sql = build_rows_query(
        &ctx.info.schema,
        &ctx.info.table,
        &columns,
        &ctx.order_cols,
        &where_clause,
        ctx.info.collation.as_deref(),
    );

    let chunk_id = chunk.id;
    let (where_clause, args, sql) = (&where_clause, &args, &sql);
    let outcome = compare_chunk(
        ctx.use_checksum,
        move || async move {
            let source_fut = retry("source checksum", CHECK_RETRY_COUNT, || {
                get_count_and_crc32_checksum(&ctx.source, &ctx.info, where_clause, args, &ctx.cancel)
            });
            let target_fut = retry("target checksum", CHECK_RETRY_COUNT, || {
                get_count_and_crc32_checksum(&ctx.target, &ctx.info, where_clause, args, &ctx.cancel)
            });
            let (source_sum, target_sum) = tokio::join!(source_fut, target_fut);
            let (source_sum, target_sum) = (source_sum?, target_sum?);
            if source_sum != target_sum {
                info!(
                    table = %ctx.info.unique_id(),
                    chunk = %chunk_id,
                    source_count = source_sum.0,
                    target_count = target_sum.0,
                    "checksum mismatch, comparing rows"
                );
            }
            Ok((source_sum, target_sum))
        },
        move || async move {
            let source_fut = retry("source rows", CHECK_RETRY_COUNT, || {
                ctx.source.fetch_text_rows(sql, args, &ctx.cancel)
            });
            let target_fut = retry("target rows", CHECK_RETRY_COUNT, || {
                ctx.target.fetch_text_rows(sql, args, &ctx.cancel)
            });
            let (source_rows, target_rows) = tokio::join!(source_fut, target_fut);
            Ok((source_rows?, target_rows?))
        },
        &ctx.order_cols,
        &columns,
        &ctx.info,
        &ctx.info.schema,
    )
    .await?;

    send_result(ctx, &chunk, outcome).await
}

async fn send_result(ctx: &TableContext, chunk: &Chunk, outcome: ChunkOutcome) -> Result<()> {
    let result = ChunkResult {
        table: ctx.info.unique_id(),
        chunk_id: chunk.id,
        equal: outcome.equal,
        source_cnt: outcome.source_cnt,
        target_cnt: outcome.target_cnt,
        source_checksum: outcome.source_checksum,
        target_checksum: outcome.target_checksum,
        rows_add: outcome.rows_add,
        rows_delete: outcome.rows_delete,
        fix_sqls: outcome.fix_sqls,
    };
    ctx.tx
        .send(CollectorMsg::Chunk(result))
        .await
        .map_err(|_| DiffError::Task("result collector is gone".to_string()))
}

/// Merge-compare two row lists sorted on the order keys.
///
/// Source-only rows become REPLACE statements, target-only rows DELETE
/// statements, and rows present on both sides but unequal an annotated
/// REPLACE, all rendered against `target_schema` where the fixes will
/// replay. Returns `(fix_sqls, rows_add, rows_delete)`.
pub fn diff_rows(
    source_rows: &[Row],
    target_rows: &[Row],
    order_cols: &[Column],
    columns: &[Column],
    info: &TableInfo,
    target_schema: &str,
) -> Result<(Vec<String>, usize, usize)> {
    let mut fix_sqls = Vec::new();
    let mut rows_add = 0;
    let mut rows_delete = 0;

    let mut i = 0;
    let mut j = 0;
    while i < source_rows.len() && j < target_rows.len() {
        let (equal, cmp) = compare_data(&source_rows[i], &target_rows[j], order_cols, columns)?;
        if equal {
            i += 1;
            j += 1;
            continue;
        }
        match cmp {
            c if c < 0 => {
                fix_sqls.push(generate_replace_dml(&source_rows[i], info, target_schema)?);
                rows_add += 1;
                i += 1;
            }
            c if c > 0 => {
                fix_sqls.push(generate_delete_dml(&target_rows[j], info, target_schema)?);
                rows_delete += 1;
                j += 1;
            }
            _ => {
                fix_sqls.push(generate_replace_dml_with_annotation(
                    &source_rows[i],
                    &target_rows[j],
                    info,
                    target_schema,
                )?);
                rows_add += 1;
                i += 1;
                j += 1;
            }
        }
    }
    for row in &source_rows[i..] {
        fix_sqls.push(generate_replace_dml(row, info, target_schema)?);
        rows_add += 1;
    }
    for row in &target_rows[j..] {
        fix_sqls.push(generate_delete_dml(row, info, target_schema)?);
        rows_delete += 1;
    }

    Ok((fix_sqls, rows_add, rows_delete))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::core::row::ColumnData;
    use crate::core::schema::{Index, IndexColumn};

    fn col(name: &str, data_type: &str, offset: usize) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            offset,
            is_nullable: true,
            is_generated: false,
        }
    }

    /// `id int primary key, name varchar`
    fn table() -> TableInfo {
        TableInfo {
            schema: "test".to_string(),
            table: "t1".to_string(),
            columns: vec![col("id", "int", 0), col("name", "varchar", 1)],
            indices: vec![Index {
                name: "PRIMARY".to_string(),
                columns: vec![IndexColumn {
                    name: "id".to_string(),
                    offset: 0,
                }],
                is_primary: true,
                is_unique: true,
            }],
            collation: None,
        }
    }

    fn row(id: &str, name: &str) -> Row {
        [
            ("id".to_string(), ColumnData::new(id.as_bytes())),
            ("name".to_string(), ColumnData::new(name.as_bytes())),
        ]
        .into_iter()
        .collect()
    }

    fn order_cols() -> Vec<Column> {
        vec![col("id", "int", 0)]
    }

    fn run_diff(source: &[Row], target: &[Row]) -> (Vec<String>, usize, usize) {
        let info = table();
        let columns = info.columns.clone();
        diff_rows(source, target, &order_cols(), &columns, &info, "test").unwrap()
    }

    #[test]
    fn test_equal_rows_produce_no_fix() {
        let rows = vec![row("1", "a"), row("2", "b")];
        let (fix, add, del) = run_diff(&rows, &rows);
        assert!(fix.is_empty());
        assert_eq!((add, del), (0, 0));
    }

    #[test]
    fn test_missing_target_row_is_replace() {
        let source = vec![row("1", "a"), row("2", "b")];
        let target = vec![row("1", "a")];
        let (fix, add, del) = run_diff(&source, &target);
        assert_eq!(
            fix,
            vec!["REPLACE INTO `test`.`t1`(`id`,`name`) VALUES (2,'b');"]
        );
        assert_eq!((add, del), (1, 0));
    }

    #[test]
    fn test_extra_target_row_is_delete() {
        let source = vec![row("2", "b")];
        let target = vec![row("1", "a"), row("2", "b")];
        let (fix, add, del) = run_diff(&source, &target);
        assert_eq!(
            fix,
            vec!["DELETE FROM `test`.`t1` WHERE `id` = 1 AND `name` = 'a';"]
        );
        assert_eq!((add, del), (0, 1));
    }

    #[test]
    fn test_same_key_different_value_is_annotated_replace() {
        let source = vec![row("1", "a")];
        let target = vec![row("1", "z")];
        let (fix, add, del) = run_diff(&source, &target);
        assert_eq!(fix.len(), 1);
        assert!(fix[0].starts_with("-- diff column: `name`, source: 'a', target: 'z'\n"));
        assert!(fix[0].ends_with("REPLACE INTO `test`.`t1`(`id`,`name`) VALUES (1,'a');"));
        assert_eq!((add, del), (1, 0));
    }

    #[test]
    fn test_interleaved_differences() {
        let source = vec![row("1", "a"), row("3", "c"), row("4", "d")];
        let target = vec![row("2", "b"), row("3", "x"), row("4", "d")];
        let (fix, add, del) = run_diff(&source, &target);
        assert_eq!(fix.len(), 3);
        assert!(fix[0].starts_with("REPLACE"));
        assert!(fix[1].starts_with("DELETE"));
        assert!(fix[2].contains("-- diff column: `name`"));
        assert_eq!((add, del), (2, 1));
    }

    #[test]
    fn test_empty_sides() {
        let rows = vec![row("1", "a")];
        let (fix, add, del) = run_diff(&rows, &[]);
        assert_eq!((fix.len(), add, del), (1, 1, 0));
        let (fix, add, del) = run_diff(&[], &rows);
        assert_eq!((fix.len(), add, del), (1, 0, 1));
        let (fix, add, del) = run_diff(&[], &[]);
        assert_eq!((fix.len(), add, del), (0, 0, 0));
    }

    async fn run_compare_chunk(
        use_checksum: bool,
        source_sum: (i64, i64),
        target_sum: (i64, i64),
        source_rows: Vec<Row>,
        target_rows: Vec<Row>,
        rows_fetched: &AtomicBool,
    ) -> ChunkOutcome {
        let info = table();
        let columns = info.columns.clone();
        let order = order_cols();
        compare_chunk(
            use_checksum,
            || async move { Ok((source_sum, target_sum)) },
            || async move {
                rows_fetched.store(true, Ordering::SeqCst);
                Ok((source_rows, target_rows))
            },
            &order,
            &columns,
            &info,
            "test",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_matching_fingerprints_skip_row_fetch() {
        let rows_fetched = AtomicBool::new(false);
        let outcome = run_compare_chunk(
            true,
            (2, 99),
            (2, 99),
            vec![row("1", "a")],
            vec![],
            &rows_fetched,
        )
        .await;
        assert!(outcome.equal);
        assert!(outcome.fix_sqls.is_empty());
        assert!(!rows_fetched.load(Ordering::SeqCst));
        assert_eq!((outcome.source_cnt, outcome.target_cnt), (2, 2));
        assert_eq!((outcome.source_checksum, outcome.target_checksum), (99, 99));
    }

    #[tokio::test]
    async fn test_mismatched_fingerprints_escalate_to_rows() {
        let rows_fetched = AtomicBool::new(false);
        let outcome = run_compare_chunk(
            true,
            (2, 99),
            (1, 33),
            vec![row("1", "a"), row("2", "b")],
            vec![row("1", "a")],
            &rows_fetched,
        )
        .await;
        assert!(!outcome.equal);
        assert!(rows_fetched.load(Ordering::SeqCst));
        assert_eq!(
            outcome.fix_sqls,
            vec!["REPLACE INTO `test`.`t1`(`id`,`name`) VALUES (2,'b');"]
        );
        assert_eq!((outcome.rows_add, outcome.rows_delete), (1, 0));
        assert_eq!((outcome.source_cnt, outcome.target_cnt), (2, 1));
        assert_eq!((outcome.source_checksum, outcome.target_checksum), (99, 33));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_with_equal_rows_is_equal() {
        // Rows moved between the two reads; the data seen now agrees.
        let rows_fetched = AtomicBool::new(false);
        let rows = vec![row("1", "a")];
        let outcome =
            run_compare_chunk(true, (1, 99), (1, 33), rows.clone(), rows, &rows_fetched).await;
        assert!(outcome.equal);
        assert!(outcome.fix_sqls.is_empty());
        assert!(rows_fetched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_checksum_disabled_goes_straight_to_rows() {
        let rows_fetched = AtomicBool::new(false);
        let outcome = run_compare_chunk(
            false,
            (0, 0),
            (0, 0),
            vec![row("1", "a")],
            vec![row("1", "a")],
            &rows_fetched,
        )
        .await;
        assert!(outcome.equal);
        assert!(rows_fetched.load(Ordering::SeqCst));
        assert_eq!((outcome.source_cnt, outcome.target_cnt), (1, 1));
        assert_eq!((outcome.source_checksum, outcome.target_checksum), (0, 0));
    }

    #[tokio::test]
    async fn test_only_mismatched_chunk_is_row_diffed() {
        // Two-chunk run: the matching chunk settles on its fingerprint
        // alone, the mismatched one escalates and yields the only fixes.
        let first_fetch = AtomicBool::new(false);
        let first = run_compare_chunk(
            true,
            (3, 7),
            (3, 7),
            vec![row("1", "a")],
            vec![],
            &first_fetch,
        )
        .await;
        let second_fetch = AtomicBool::new(false);
        let second = run_compare_chunk(
            true,
            (1, 7),
            (2, 8),
            vec![row("5", "e")],
            vec![row("5", "e"), row("6", "f")],
            &second_fetch,
        )
        .await;

        assert!(first.equal && !first_fetch.load(Ordering::SeqCst));
        assert!(!second.equal && second_fetch.load(Ordering::SeqCst));
        assert_eq!(
            second.fix_sqls,
            vec!["DELETE FROM `test`.`t1` WHERE `id` = 6 AND `name` = 'f';"]
        );
    }

    #[test]
    fn test_schema_match() {
        let source = table();
        let mut target = table();
        assert!(check_schema_match(&source, &target).is_ok());

        target.columns[1].data_type = "text".to_string();
        assert!(matches!(
            check_schema_match(&source, &target).unwrap_err(),
            DiffError::TableCheck { .. }
        ));

        let mut target = table();
        target.columns.pop();
        assert!(check_schema_match(&source, &target).is_err());

        let mut target = table();
        target.columns.push(col("extra", "int", 2));
        assert!(check_schema_match(&source, &target).is_err());
    }
}
