//! Configuration validation.

use super::Config;
use crate::error::{DiffError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.host.is_empty() {
        return Err(DiffError::Config("source.host is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(DiffError::Config("source.user is required".into()));
    }
    if config.target.host.is_empty() {
        return Err(DiffError::Config("target.host is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(DiffError::Config("target.user is required".into()));
    }

    if config.check.tables.is_empty() {
        return Err(DiffError::Config("check.tables must not be empty".into()));
    }
    for table in &config.check.tables {
        if table.schema.is_empty() || table.table.is_empty() {
            return Err(DiffError::Config(
                "check.tables entries need both schema and table".into(),
            ));
        }
    }

    if config.check.chunk_size < 0 {
        return Err(DiffError::Config(
            "check.chunk_size must not be negative".into(),
        ));
    }
    if config.check.check_thread_count == 0 {
        return Err(DiffError::Config(
            "check.check_thread_count must be at least 1".into(),
        ));
    }
    if config.check.fix_sql_dir.is_empty() {
        return Err(DiffError::Config("check.fix_sql_dir is required".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CheckConfig, DbConfig, TableConfig};

    fn valid_config() -> Config {
        Config {
            source: DbConfig {
                host: "127.0.0.1".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: String::new(),
            },
            target: DbConfig {
                host: "127.0.0.2".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: String::new(),
            },
            check: CheckConfig {
                tables: vec![TableConfig {
                    schema: "test".to_string(),
                    table: "t1".to_string(),
                    ignore_columns: vec![],
                }],
                chunk_size: 0,
                check_thread_count: 4,
                use_checksum: true,
                fix_sql_dir: "fix-on-target".to_string(),
                summary_file: None,
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_tables_rejected() {
        let mut config = valid_config();
        config.check.tables.clear();
        assert!(matches!(
            validate(&config).unwrap_err(),
            DiffError::Config(_)
        ));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut config = valid_config();
        config.check.check_thread_count = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_host_rejected() {
        let mut config = valid_config();
        config.source.host.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_chunk_size_rejected() {
        let mut config = valid_config();
        config.check.chunk_size = -1;
        assert!(validate(&config).is_err());
    }
}
