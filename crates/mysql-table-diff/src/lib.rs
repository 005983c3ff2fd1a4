//! # mysql-table-diff
//!
//! Chunked data comparison between two MySQL-protocol databases.
//!
//! Each configured table is split into key ranges along its best index,
//! every range is fingerprinted on both sides with a single
//! `COUNT + BIT_XOR(CRC32)` query, and only ranges whose fingerprints
//! disagree are fetched row by row. Differing rows are written out as
//! `REPLACE`/`DELETE` statements that make the target match the source:
//!
//! - **Index-aware splitting** via selectivity-ranked split keys
//! - **Checksum fast path** so equal data is never transferred
//! - **Parallel chunk checking** with a bounded worker pool
//! - **Repair SQL output** per differing chunk, plus a JSON summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_table_diff::{Config, Diff, DiffOutcome};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mysql_table_diff::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let diff = Diff::new(config, CancellationToken::new()).await?;
//!     let report = diff.equal().await?;
//!     assert_eq!(report.outcome(), DiffOutcome::Pass);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod checksum;
pub mod chunk;
pub mod config;
pub mod core;
pub mod diff;
pub mod error;
pub mod fixsql;
pub mod pool;
pub mod report;
pub mod source;
pub mod stats;

// Re-exports for convenient access
pub use chunk::{Chunk, ChunkId, ChunkRange};
pub use config::{CheckConfig, Config, DbConfig, TableConfig};
pub use crate::core::{Column, Index, Row, TableInfo};
pub use diff::Diff;
pub use error::{DiffError, Result};
pub use report::{ChunkResult, DiffOutcome, FailedChunk, Report, TableReport};
pub use source::DbPool;
