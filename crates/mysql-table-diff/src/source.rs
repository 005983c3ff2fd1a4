//! Database access for one side of the diff.
//!
//! `DbPool` wraps a sqlx MySQL pool and renders every fetched cell into
//! its wire-format text form, which is what the comparator and the
//! fix-SQL generator operate on. Connection pooling and reconnects are
//! sqlx's job; this layer adds cancellation observance and a bounded
//! retry for transient failures.

use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DbConfig;
use crate::core::ident::quote_table;
use crate::core::row::{ColumnData, Row};
use crate::error::{DiffError, Result};

/// Connection pool acquire timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between attempts of a retried query.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Await a query future while observing cancellation.
pub(crate) async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(DiffError::Cancelled),
        res = fut => Ok(res?),
    }
}

/// Run `op` up to `attempts` times, logging between failures.
///
/// Cancellation is never retried; the final error is returned as-is.
pub(crate) async fn retry<T, F, Fut>(what: &str, attempts: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(DiffError::Cancelled) => return Err(DiffError::Cancelled),
            Err(e) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }
                warn!(what, attempt, error = %e, "query failed, retrying");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

/// A query-executing handle for one side (source or target).
pub struct DbPool {
    pool: MySqlPool,
    name: String,
}

impl DbPool {
    /// Connect and probe the server.
    pub async fn connect(config: &DbConfig, max_conns: u32, name: &str) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        info!("Connected to {} database: {}:{}", name, config.host, config.port);

        Ok(Self {
            pool,
            name: name.to_string(),
        })
    }

    /// Side name for diagnostics ("source" or "target").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying sqlx pool.
    pub fn inner(&self) -> &MySqlPool {
        &self.pool
    }

    /// Run a query with string arguments and return every row with each
    /// cell rendered to its text form.
    pub async fn fetch_text_rows(
        &self,
        sql: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = query.bind(arg);
        }
        let rows = with_cancel(cancel, query.fetch_all(&self.pool)).await?;
        rows.iter().map(row_to_text).collect()
    }

    /// `COUNT(1)` of a table restricted to a predicate.
    pub async fn get_row_count(
        &self,
        schema: &str,
        table: &str,
        where_clause: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(1) FROM {} WHERE {}",
            quote_table(schema, table),
            where_clause
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in args {
            query = query.bind(arg);
        }
        with_cancel(cancel, query.fetch_one(&self.pool)).await
    }
}

/// Convert one sqlx row into the textual `Row` snapshot.
fn row_to_text(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), column_text(row, i)?);
    }
    Ok(out)
}

/// Render one cell to the text form MySQL would send over the text
/// protocol, dispatching on the column's reported type.
fn column_text(row: &MySqlRow, i: usize) -> Result<ColumnData> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(ColumnData::null());
    }
    let type_name = raw.type_info().name().to_string();
    drop(raw);

    let text: Vec<u8> = match type_name.as_str() {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(i)?.to_string().into_bytes()
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "BIT" => row.try_get::<u64, _>(i)?.to_string().into_bytes(),
        "FLOAT" => row.try_get::<f32, _>(i)?.to_string().into_bytes(),
        "DOUBLE" => row.try_get::<f64, _>(i)?.to_string().into_bytes(),
        "DECIMAL" => row.try_get::<Decimal, _>(i)?.to_string().into_bytes(),
        "YEAR" => row.try_get::<u16, _>(i)?.to_string().into_bytes(),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(i)?
            .format("%Y-%m-%d")
            .to_string()
            .into_bytes(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(i)?
            .format("%Y-%m-%d %H:%M:%S%.f")
            .to_string()
            .into_bytes(),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(i)?
            .format("%H:%M:%S%.f")
            .to_string()
            .into_bytes(),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            row.try_get::<String, _>(i)?.into_bytes()
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
            row.try_get::<Vec<u8>, _>(i)?
        }
        _ => match row.try_get_unchecked::<String, _>(i) {
            Ok(s) => s.into_bytes(),
            Err(_) => row.try_get_unchecked::<Vec<u8>, _>(i)?,
        },
    };

    Ok(ColumnData::new(text))
}
