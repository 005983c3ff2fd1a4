//! Split-index selection.
//!
//! A primary or unique index wins outright. Otherwise the candidate
//! whose leading column has the highest distinct-value ratio splits the
//! table into the most evenly sized chunks, so indexes are ranked by
//! that measured selectivity.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::ident::{quote_ident, quote_table};
use crate::core::schema::{Index, TableInfo};
use crate::error::{DiffError, Result};
use crate::source::{with_cancel, DbPool};

fn selectivity_query(schema: &str, table: &str, column: &str) -> String {
    format!(
        "SELECT COUNT(DISTINCT {})/COUNT(1) as SEL FROM {}",
        quote_ident(column),
        quote_table(schema, table)
    )
}

/// Measure the distinct-value ratio of one column, in `[0, 1]`.
///
/// An empty table yields a NULL ratio, reported as 0.
pub async fn get_selectivity(
    pool: &DbPool,
    schema: &str,
    table: &str,
    column: &str,
    cancel: &CancellationToken,
) -> Result<f64> {
    let sql = selectivity_query(schema, table, column);
    let sel = with_cancel(
        cancel,
        sqlx::query_scalar::<_, Option<Decimal>>(&sql).fetch_one(pool.inner()),
    )
    .await?;
    Ok(sel.and_then(|d| d.to_f64()).unwrap_or(0.0))
}

/// Order measured candidates by selectivity, highest first, ties broken
/// in favor of fewer key columns.
fn rank_by_selectivity(mut candidates: Vec<(f64, Index)>) -> Vec<Index> {
    candidates.sort_by(|(sel_a, index_a), (sel_b, index_b)| {
        sel_b
            .partial_cmp(sel_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(index_a.columns.len().cmp(&index_b.columns.len()))
    });
    candidates.into_iter().map(|(_, index)| index).collect()
}

/// Rank the table's indices by suitability for splitting.
///
/// The first primary or unique index short-circuits the scan and is the
/// sole candidate. Failing that, every index is ranked by its leading
/// column's measured selectivity, so callers can fall back to the next
/// candidate in the list. A table with no index at all cannot be split
/// or ordered and fails the run.
pub async fn get_better_index(
    pool: &DbPool,
    info: &TableInfo,
    cancel: &CancellationToken,
) -> Result<Vec<Index>> {
    if info.indices.is_empty() {
        return Err(DiffError::NoUsableIndex(info.unique_id()));
    }

    for index in &info.indices {
        if index.is_primary || index.is_unique {
            return Ok(vec![index.clone()]);
        }
    }

    let mut candidates = Vec::with_capacity(info.indices.len());
    for index in &info.indices {
        let leading = match index.columns.first() {
            Some(col) => col,
            None => continue,
        };
        let sel = get_selectivity(pool, &info.schema, &info.table, &leading.name, cancel).await?;
        debug!(
            table = %info.unique_id(),
            index = %index.name,
            selectivity = sel,
            "measured index selectivity"
        );
        candidates.push((sel, index.clone()));
    }

    if candidates.is_empty() {
        return Err(DiffError::NoUsableIndex(info.unique_id()));
    }
    Ok(rank_by_selectivity(candidates))
}
