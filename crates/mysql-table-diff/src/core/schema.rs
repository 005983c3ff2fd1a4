//! Table metadata model and the ignore-columns transform.
//!
//! `TableInfo` is the read-only snapshot every chunk worker shares: the
//! ordered column list (with contiguous offsets) and the indices that
//! survive the ignore list. It is produced once per table by the catalog
//! loader and never mutated afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// MySQL column types compared as parsed floating point numbers.
const FLOAT_TYPES: &[&str] = &["float", "double"];

/// MySQL column types rendered without quotes in generated SQL and
/// compared numerically when used as order keys.
const NUMERIC_TYPES: &[&str] = &[
    "tinyint", "smallint", "mediumint", "int", "bigint", "float", "double", "decimal", "numeric",
    "year", "bit",
];

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Lowercased MySQL data type (`int`, `varchar`, `datetime`, ...).
    pub data_type: String,

    /// Position within the table, contiguous from 0. Re-numbered after
    /// the ignore-columns transform.
    pub offset: usize,

    /// Whether the column is nullable.
    pub is_nullable: bool,

    /// Whether the column is generated (virtual or stored). Generated
    /// columns are excluded from checksums and fix statements.
    pub is_generated: bool,
}

impl Column {
    /// Float/double columns: compared as parsed numbers, not bytes.
    pub fn is_float_type(&self) -> bool {
        FLOAT_TYPES.contains(&self.data_type.as_str())
    }

    /// Numeric columns are rendered unquoted and ordered numerically.
    pub fn is_numeric_type(&self) -> bool {
        NUMERIC_TYPES.contains(&self.data_type.as_str())
    }

    /// Whether values of this column need single quotes in generated SQL.
    pub fn need_quotes(&self) -> bool {
        !self.is_numeric_type()
    }
}

/// Reference from an index to a table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,

    /// Offset of the referenced column within `TableInfo::columns`.
    pub offset: usize,
}

/// One index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name (`PRIMARY` for the primary key).
    pub name: String,

    /// Key columns in index order.
    pub columns: Vec<IndexColumn>,

    /// Whether this is the primary key.
    pub is_primary: bool,

    /// Whether the index enforces uniqueness.
    pub is_unique: bool,
}

/// Read-only metadata snapshot for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub table: String,

    /// Columns in declared order with contiguous offsets.
    pub columns: Vec<Column>,

    /// Indices, primary key first.
    pub indices: Vec<Index>,

    /// Table collation, forced onto ORDER BY clauses so server ordering
    /// matches the byte-wise key comparison. `None` leaves the server
    /// default in place.
    pub collation: Option<String>,
}

impl TableInfo {
    /// Map key identifying this table within a run.
    pub fn unique_id(&self) -> String {
        crate::core::ident::unique_id(&self.schema, &self.table)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns participating in checksums and fix statements.
    pub fn diff_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.is_generated).collect()
    }

    /// The primary key index, if any.
    pub fn primary_key(&self) -> Option<&Index> {
        self.indices.iter().find(|i| i.is_primary)
    }

    /// Resolve an index's key columns to full column definitions.
    ///
    /// Index column references are validated against the column list when
    /// the snapshot is built, so resolution cannot miss here.
    pub fn index_columns(&self, index: &Index) -> Vec<Column> {
        index
            .columns
            .iter()
            .filter_map(|ic| self.column(&ic.name).cloned())
            .collect()
    }
}

/// Remove the named columns from a table snapshot.
///
/// Offsets of the surviving columns are renumbered to stay contiguous
/// from 0. Each index keeps its surviving key columns in original
/// relative order with offsets rewritten; an index whose columns are all
/// removed is dropped entirely.
pub fn ignore_columns(info: &TableInfo, ignore: &[String]) -> TableInfo {
    if ignore.is_empty() {
        return info.clone();
    }

    let columns: Vec<Column> = info
        .columns
        .iter()
        .filter(|c| !ignore.iter().any(|ig| ig == &c.name))
        .enumerate()
        .map(|(offset, c)| Column {
            offset,
            ..c.clone()
        })
        .collect();

    let offset_by_name: HashMap<&str, usize> = columns
        .iter()
        .map(|c| (c.name.as_str(), c.offset))
        .collect();

    let indices = info
        .indices
        .iter()
        .filter_map(|index| {
            let kept: Vec<IndexColumn> = index
                .columns
                .iter()
                .filter_map(|ic| {
                    offset_by_name.get(ic.name.as_str()).map(|&offset| IndexColumn {
                        name: ic.name.clone(),
                        offset,
                    })
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Index {
                    columns: kept,
                    ..index.clone()
                })
            }
        })
        .collect();

    TableInfo {
        schema: info.schema.clone(),
        table: info.table.clone(),
        columns,
        indices,
        collation: info.collation.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, data_type: &str, offset: usize) -> Column {
        Column {
            name: name.to_string(),
            data_type: data_type.to_string(),
            offset,
            is_nullable: true,
            is_generated: false,
        }
    }

    fn index(name: &str, cols: &[(&str, usize)], primary: bool) -> Index {
        Index {
            name: name.to_string(),
            columns: cols
                .iter()
                .map(|(n, o)| IndexColumn {
                    name: n.to_string(),
                    offset: *o,
                })
                .collect(),
            is_primary: primary,
            is_unique: primary,
        }
    }

    /// `a int, b int, c int, d int, primary key(a), index idx(b, c)`
    fn four_column_table() -> TableInfo {
        TableInfo {
            schema: "test".to_string(),
            table: "atest".to_string(),
            columns: vec![
                col("a", "int", 0),
                col("b", "int", 1),
                col("c", "int", 2),
                col("d", "int", 3),
            ],
            indices: vec![
                index("PRIMARY", &[("a", 0)], true),
                index("idx", &[("b", 1), ("c", 2)], false),
            ],
            collation: None,
        }
    }

    #[test]
    fn test_column_classification() {
        assert!(col("m", "decimal", 0).is_numeric_type());
        assert!(!col("m", "decimal", 0).is_float_type());
        assert!(col("f", "float", 0).is_float_type());
        assert!(col("s", "varchar", 0).need_quotes());
        assert!(col("d", "datetime", 0).need_quotes());
        assert!(!col("i", "bigint", 0).need_quotes());
    }

    #[test]
    fn test_ignore_removes_whole_index() {
        // Removing the only primary key column drops the primary key but
        // keeps idx(b, c) untouched apart from renumbered offsets.
        let info = ignore_columns(&four_column_table(), &["a".to_string()]);
        assert_eq!(info.columns.len(), 3);
        assert_eq!(info.columns[2].name, "d");
        assert_eq!(info.columns[2].offset, 2);
        assert_eq!(info.indices.len(), 1);
        assert_eq!(info.indices[0].name, "idx");
        assert_eq!(info.indices[0].columns[0].offset, 0);
        assert_eq!(info.indices[0].columns[1].offset, 1);
    }

    #[test]
    fn test_ignore_partial_index_overlap() {
        // Removing b keeps idx with its surviving column c, in order.
        let info = ignore_columns(&four_column_table(), &["b".to_string()]);
        assert_eq!(info.columns.len(), 3);
        assert_eq!(info.indices.len(), 2);
        let idx = &info.indices[1];
        assert_eq!(idx.columns.len(), 1);
        assert_eq!(idx.columns[0].name, "c");
        assert_eq!(idx.columns[0].offset, 1);
    }

    #[test]
    fn test_ignore_all_index_columns() {
        let info = ignore_columns(&four_column_table(), &["b".to_string(), "c".to_string()]);
        assert_eq!(info.columns.len(), 2);
        assert_eq!(info.indices.len(), 1);
        assert_eq!(info.indices[0].name, "PRIMARY");
    }

    #[test]
    fn test_ignore_nothing_is_identity() {
        let info = four_column_table();
        assert_eq!(ignore_columns(&info, &[]), info);
    }

    #[test]
    fn test_index_columns_resolution() {
        let info = four_column_table();
        let idx = info.indices[1].clone();
        let cols = info.index_columns(&idx);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "b");
        assert_eq!(cols[1].name, "c");
    }
}
