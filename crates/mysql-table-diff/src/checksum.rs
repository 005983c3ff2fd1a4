//! Chunk fingerprints: a single aggregate query yields the row count and
//! an order-independent CRC32 checksum for one key range.

use sqlx::Row as _;
use tokio_util::sync::CancellationToken;

use crate::core::ident::{quote_ident, quote_table};
use crate::core::schema::TableInfo;
use crate::error::Result;
use crate::source::{with_cancel, DbPool};

/// Query text computing `(COUNT, BIT_XOR(CRC32(row)))` over a range.
///
/// Every non-generated column is folded into the per-row CRC along with
/// a trailing ISNULL bitmap, so `NULL` and `''` (or `0`) hash
/// differently. XOR aggregation makes the checksum independent of row
/// order, which keeps the query free of any ORDER BY.
pub fn count_crc32_query(info: &TableInfo, where_clause: &str) -> String {
    let columns: Vec<String> = info
        .diff_columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect();
    let is_nulls: Vec<String> = columns.iter().map(|c| format!("ISNULL({})", c)).collect();

    format!(
        "SELECT COUNT(*) AS CNT, BIT_XOR(CAST(CRC32(CONCAT_WS(',', {}, CONCAT({}))) AS UNSIGNED)) AS CHECKSUM FROM {} WHERE {}",
        columns.join(", "),
        is_nulls.join(", "),
        quote_table(&info.schema, &info.table),
        where_clause
    )
}

/// Run the fingerprint query for one chunk on one side.
///
/// An empty range has `BIT_XOR` aggregate NULL; that is reported as
/// checksum 0 so two empty ranges compare equal.
pub async fn get_count_and_crc32_checksum(
    pool: &DbPool,
    info: &TableInfo,
    where_clause: &str,
    args: &[String],
    cancel: &CancellationToken,
) -> Result<(i64, i64)> {
    let sql = count_crc32_query(info, where_clause);
    let mut query = sqlx::query(&sql);
    for arg in args {
        query = query.bind(arg);
    }
    let row = with_cancel(cancel, query.fetch_one(pool.inner())).await?;

    let count: i64 = row.try_get("CNT")?;
    let checksum: Option<u64> = row.try_get_unchecked("CHECKSUM")?;
    Ok((count, checksum.unwrap_or(0) as i64))
}
