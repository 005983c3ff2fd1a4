//! Table metadata discovery via INFORMATION_SCHEMA.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::schema::{Column, Index, IndexColumn, TableInfo};
use crate::error::{DiffError, Result};
use crate::source::{with_cancel, DbPool};

const COLUMNS_QUERY: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
CAST(DATA_TYPE AS CHAR) AS DATA_TYPE, \
IF(IS_NULLABLE = 'YES', 1, 0) AS IS_NULLABLE, \
IF(EXTRA LIKE '%GENERATED%', 1, 0) AS IS_GENERATED \
FROM INFORMATION_SCHEMA.COLUMNS \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const COLLATION_QUERY: &str = "\
SELECT CAST(TABLE_COLLATION AS CHAR) \
FROM INFORMATION_SCHEMA.TABLES \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

const INDEXES_QUERY: &str = "\
SELECT CAST(INDEX_NAME AS CHAR) AS INDEX_NAME, \
CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME, \
NON_UNIQUE \
FROM INFORMATION_SCHEMA.STATISTICS \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
ORDER BY INDEX_NAME, SEQ_IN_INDEX";

/// Load column and index metadata for one table.
///
/// Fails with [`DiffError::TableCheck`] when the table does not exist on
/// this side, which aborts the whole run before any chunk work starts.
pub async fn load_table_info(
    pool: &DbPool,
    schema: &str,
    table: &str,
    cancel: &CancellationToken,
) -> Result<TableInfo> {
    let columns = load_columns(pool, schema, table, cancel).await?;
    if columns.is_empty() {
        return Err(DiffError::table_check(
            format!("{schema}.{table}"),
            format!("table not found on {}", pool.name()),
        ));
    }

    let indices = load_indices(pool, schema, table, &columns, cancel).await?;
    let collation = load_collation(pool, schema, table, cancel).await?;
    debug!(
        schema,
        table,
        columns = columns.len(),
        indices = indices.len(),
        collation = collation.as_deref().unwrap_or(""),
        "loaded table metadata"
    );

    Ok(TableInfo {
        schema: schema.to_string(),
        table: table.to_string(),
        columns,
        indices,
        collation,
    })
}

async fn load_collation(
    pool: &DbPool,
    schema: &str,
    table: &str,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    let collation = with_cancel(
        cancel,
        sqlx::query_scalar::<_, Option<String>>(COLLATION_QUERY)
            .bind(schema)
            .bind(table)
            .fetch_optional(pool.inner()),
    )
    .await?;
    Ok(collation.flatten().filter(|c| !c.is_empty()))
}

async fn load_columns(
    pool: &DbPool,
    schema: &str,
    table: &str,
    cancel: &CancellationToken,
) -> Result<Vec<Column>> {
    let rows = with_cancel(
        cancel,
        sqlx::query_as::<_, (String, String, i64, i64)>(COLUMNS_QUERY)
            .bind(schema)
            .bind(table)
            .fetch_all(pool.inner()),
    )
    .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(offset, (name, data_type, nullable, generated))| Column {
            name,
            data_type: data_type.to_lowercase(),
            offset,
            is_nullable: nullable != 0,
            is_generated: generated != 0,
        })
        .collect())
}

async fn load_indices(
    pool: &DbPool,
    schema: &str,
    table: &str,
    columns: &[Column],
    cancel: &CancellationToken,
) -> Result<Vec<Index>> {
    let rows = with_cancel(
        cancel,
        sqlx::query_as::<_, (String, String, i64)>(INDEXES_QUERY)
            .bind(schema)
            .bind(table)
            .fetch_all(pool.inner()),
    )
    .await?;

    // Rows arrive ordered by (INDEX_NAME, SEQ_IN_INDEX); fold adjacent
    // rows of the same index together.
    let mut indices: Vec<Index> = Vec::new();
    for (index_name, column_name, non_unique) in rows {
        let offset = columns
            .iter()
            .position(|c| c.name == column_name)
            .ok_or_else(|| DiffError::MissingColumn(column_name.clone()))?;
        let index_column = IndexColumn {
            name: column_name,
            offset,
        };

        match indices.last_mut() {
            Some(last) if last.name == index_name => last.columns.push(index_column),
            _ => indices.push(Index {
                is_primary: index_name == "PRIMARY",
                is_unique: non_unique == 0,
                name: index_name,
                columns: vec![index_column],
            }),
        }
    }

    // The primary key, when present, always leads.
    if let Some(pos) = indices.iter().position(|i| i.is_primary) {
        let primary = indices.remove(pos);
        indices.insert(0, primary);
    }
    Ok(indices)
}
