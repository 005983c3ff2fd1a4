//! Range splitter: partitions a table's key space into chunks below a
//! target row count via approximate-midpoint bisection.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chunk::id::ChunkId;
use crate::chunk::range::{Chunk, ChunkRange};
use crate::core::ident::{quote_ident, quote_table};
use crate::core::row::collation_suffix;
use crate::core::schema::{Column, TableInfo};
use crate::error::{DiffError, Result};
use crate::source::{retry, DbPool};

/// Attempts per split-point query before the range degrades to one
/// oversized chunk.
const SPLIT_RETRY_COUNT: usize = 3;

/// Map a table's estimated row count to the per-chunk target size.
///
/// Small tables get a generous flat 50 000; past 500M rows the target
/// grows as `row_count / 10 000` so a table needs at most ~10k chunks
/// and chunk count scales sub-linearly with table size.
pub fn calculate_chunk_size(row_count: i64) -> i64 {
    let chunk_size: i64 = 50_000;
    if row_count > chunk_size * 10_000 {
        row_count / 10_000
    } else {
        chunk_size
    }
}

/// Query text for the approximate midpoint of a range: the row at the
/// half-count offset of the range under the order-key ordering.
fn mid_query(
    schema: &str,
    table: &str,
    order_cols: &[Column],
    where_clause: &str,
    count: i64,
    collation: Option<&str>,
) -> String {
    let cols = order_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let keys = order_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}{} LIMIT {},1",
        cols,
        quote_table(schema, table),
        where_clause,
        keys,
        collation_suffix(collation),
        count / 2
    )
}

/// Fetch the key tuple sitting at the approximate midpoint of `range`.
///
/// Returns `None` when the range holds fewer rows than expected or the
/// midpoint key contains NULL; both mean the range cannot be cut there.
pub async fn get_approximate_mid_by_size(
    pool: &DbPool,
    info: &TableInfo,
    order_cols: &[Column],
    range: &ChunkRange,
    count: i64,
    cancel: &CancellationToken,
) -> Result<Option<Vec<String>>> {
    let (where_clause, args) = range.where_clause();
    let sql = mid_query(
        &info.schema,
        &info.table,
        order_cols,
        &where_clause,
        count,
        info.collation.as_deref(),
    );
    let rows = pool.fetch_text_rows(&sql, &args, cancel).await?;

    let row = match rows.first() {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut key = Vec::with_capacity(order_cols.len());
    for col in order_cols {
        let cell = row
            .get(&col.name)
            .ok_or_else(|| DiffError::MissingColumn(col.name.clone()))?;
        if cell.is_null {
            return Ok(None);
        }
        key.push(cell.text().into_owned());
    }
    Ok(Some(key))
}

/// Partition a table into ordered, contiguous, non-overlapping chunks,
/// each estimated at or below `chunk_size` rows.
///
/// Bisection runs over an explicit work-list rather than call recursion
/// so pathological key distributions cannot exhaust the stack. A range
/// whose split-point query keeps failing, returns nothing, or lands on
/// one of its own endpoints is emitted as a single oversized chunk:
/// slower to compare, but no row is ever skipped.
pub async fn split_table(
    pool: &DbPool,
    info: &TableInfo,
    order_cols: &[Column],
    chunk_size: i64,
    table_index: usize,
    total_rows: i64,
    cancel: &CancellationToken,
) -> Result<Vec<Chunk>> {
    let columns: Vec<String> = order_cols.iter().map(|c| c.name.clone()).collect();
    let full = ChunkRange::full(columns);

    let mut ranges = Vec::new();
    if order_cols.is_empty() || total_rows <= chunk_size {
        ranges.push(full);
    } else {
        // LIFO with the right half pushed first keeps emission in
        // ascending key order.
        let mut pending = vec![(full, total_rows)];
        while let Some((range, count)) = pending.pop() {
            if count <= chunk_size {
                ranges.push(range);
                continue;
            }
            if cancel.is_cancelled() {
                return Err(DiffError::Cancelled);
            }

            let mid = retry("split-point query", SPLIT_RETRY_COUNT, || {
                get_approximate_mid_by_size(pool, info, order_cols, &range, count, cancel)
            })
            .await;

            match mid {
                Ok(Some(key)) if !range.is_endpoint(&key) => {
                    debug!(
                        table = %info.table,
                        key = ?key,
                        rows = count,
                        "cutting range at approximate midpoint"
                    );
                    let (left, right) = range.split_at(key);
                    pending.push((right, count - count / 2));
                    pending.push((left, count / 2));
                }
                Ok(_) => {
                    // No midpoint to cut at; keep the range whole.
                    ranges.push(range);
                }
                Err(DiffError::Cancelled) => return Err(DiffError::Cancelled),
                Err(e) => {
                    warn!(
                        table = %info.table,
                        error = %e,
                        "split-point query failed, keeping oversized chunk"
                    );
                    ranges.push(range);
                }
            }
        }
    }

    let chunk_cnt = ranges.len();
    Ok(ranges
        .into_iter()
        .enumerate()
        .map(|(chunk_index, range)| Chunk {
            id: ChunkId::new(table_index, 0, 0, chunk_index, chunk_cnt),
            range,
        })
        .collect())
}
