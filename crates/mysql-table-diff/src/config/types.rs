//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database connection.
    pub source: DbConfig,

    /// Target database connection.
    pub target: DbConfig,

    /// Comparison behavior.
    pub check: CheckConfig,
}

/// One MySQL endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Comparison behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Tables to compare.
    pub tables: Vec<TableConfig>,

    /// Target rows per chunk. 0 derives the size from the table's row
    /// count (default: 0).
    #[serde(default)]
    pub chunk_size: i64,

    /// Concurrent chunk comparisons (default: 4).
    #[serde(default = "default_check_thread_count")]
    pub check_thread_count: usize,

    /// Compare chunks by checksum first, fetching rows only on mismatch
    /// (default: true). When false every chunk goes straight to rows.
    #[serde(default = "default_true")]
    pub use_checksum: bool,

    /// Directory receiving one fix-SQL file per differing chunk
    /// (default: "fix-on-target").
    #[serde(default = "default_fix_sql_dir")]
    pub fix_sql_dir: String,

    /// Optional path for the JSON run summary.
    #[serde(default)]
    pub summary_file: Option<String>,
}

/// One table to compare, identified the same way on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Schema (database) name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Columns excluded from comparison and from split-key candidates.
    #[serde(default)]
    pub ignore_columns: Vec<String>,
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_check_thread_count() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_fix_sql_dir() -> String {
    "fix-on-target".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_defaults() {
        let yaml = r#"
source:
  host: 127.0.0.1
  user: root
target:
  host: 127.0.0.2
  user: root
  password: secret
check:
  tables:
    - schema: test
      table: t1
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.password, "");
        assert_eq!(config.check.chunk_size, 0);
        assert_eq!(config.check.check_thread_count, 4);
        assert!(config.check.use_checksum);
        assert_eq!(config.check.fix_sql_dir, "fix-on-target");
        assert!(config.check.summary_file.is_none());
        assert!(config.check.tables[0].ignore_columns.is_empty());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
source:
  host: 127.0.0.1
  port: 4000
  user: root
target:
  host: 127.0.0.2
  user: root
check:
  tables:
    - schema: test
      table: t1
      ignore_columns: [updated_at]
  chunk_size: 1000
  check_thread_count: 8
  use_checksum: false
  fix_sql_dir: /tmp/fix
  summary_file: /tmp/summary.json
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.port, 4000);
        assert_eq!(config.check.chunk_size, 1000);
        assert_eq!(config.check.check_thread_count, 8);
        assert!(!config.check.use_checksum);
        assert_eq!(config.check.tables[0].ignore_columns, vec!["updated_at"]);
        assert_eq!(config.check.summary_file.as_deref(), Some("/tmp/summary.json"));
    }
}
