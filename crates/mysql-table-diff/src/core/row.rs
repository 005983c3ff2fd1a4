//! Row snapshots and the ordered multi-key row comparator.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::core::ident::{quote_ident, quote_table};
use crate::core::schema::Column;
use crate::error::{DiffError, Result};

/// One cell in its wire-format text form.
///
/// `data` holds the textual byte representation exactly as the server
/// sends it; comparisons and SQL rendering reproduce that textual
/// semantics rather than re-typing the value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnData {
    /// Raw text bytes of the value (empty for NULL).
    pub data: Vec<u8>,

    /// NULL flag. NULL compares equal only to NULL, never to any value,
    /// including the empty string.
    pub is_null: bool,
}

impl ColumnData {
    /// A non-NULL value.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            is_null: false,
        }
    }

    /// A NULL cell.
    pub fn null() -> Self {
        Self {
            data: Vec::new(),
            is_null: true,
        }
    }

    /// Text view of the raw bytes.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// One retrieved record: column name to cell.
pub type Row = HashMap<String, ColumnData>;

fn cell<'a>(row: &'a Row, name: &str) -> Result<&'a ColumnData> {
    row.get(name)
        .ok_or_else(|| DiffError::MissingColumn(name.to_string()))
}

fn parse_number(data: &ColumnData, column: &Column) -> Result<f64> {
    let text = data.text();
    text.parse::<f64>().map_err(|e| {
        DiffError::render(format!(
            "cannot parse {:?} as numeric for column `{}` ({}): {}",
            text, column.name, column.data_type, e
        ))
    })
}

/// Compare two row snapshots.
///
/// Returns `(equal, cmp)`:
/// - `equal` is true iff every column in `columns` matches: NULL equals
///   only NULL, float/double cells compare as parsed numbers within
///   1e-6, everything else byte-wise.
/// - `cmp` is the -1/0/+1 ordering of the rows on `order_key_cols`
///   alone, column by column in declared order: quoted (string-like)
///   columns compare byte-wise on the raw data, numeric columns compare
///   as parsed numbers with NULL ordering before any value.
///
/// Rows that match on every order key still report `cmp == 0` when
/// non-key columns differ, so `equal` never follows from `cmp` alone.
pub fn compare_data(
    row1: &Row,
    row2: &Row,
    order_key_cols: &[Column],
    columns: &[Column],
) -> Result<(bool, i32)> {
    let mut equal = true;
    for column in columns {
        let data1 = cell(row1, &column.name)?;
        let data2 = cell(row2, &column.name)?;

        if data1.is_null || data2.is_null {
            if data1.is_null && data2.is_null {
                continue;
            }
            equal = false;
            break;
        }

        if column.is_float_type() {
            let num1 = parse_number(data1, column)?;
            let num2 = parse_number(data2, column)?;
            if (num1 - num2).abs() <= 1e-6 {
                continue;
            }
        } else if data1.data == data2.data {
            continue;
        }

        equal = false;
        break;
    }
    if equal {
        return Ok((true, 0));
    }

    let mut cmp = 0i32;
    for column in order_key_cols {
        let data1 = cell(row1, &column.name)?;
        let data2 = cell(row2, &column.name)?;

        if column.need_quotes() {
            // Byte order of the raw text, matching the ORDER BY the rows
            // were fetched with.
            match data1.data.cmp(&data2.data) {
                std::cmp::Ordering::Equal => continue,
                std::cmp::Ordering::Less => cmp = -1,
                std::cmp::Ordering::Greater => cmp = 1,
            }
            break;
        } else if data1.is_null || data2.is_null {
            if data1.is_null && data2.is_null {
                continue;
            }
            // NULL sorts before any value in ascending key order.
            cmp = if data1.is_null { -1 } else { 1 };
            break;
        } else {
            let num1 = parse_number(data1, column)?;
            let num2 = parse_number(data2, column)?;
            if num1 == num2 {
                continue;
            }
            cmp = if num1 < num2 { -1 } else { 1 };
            break;
        }
    }

    Ok((false, cmp))
}

/// Render an `ORDER BY` collation override, empty when unset.
///
/// Forcing the table collation keeps server-side key ordering aligned
/// with the byte-wise comparison in [`compare_data`]; a case-insensitive
/// server default would otherwise interleave rows the differ considers
/// distinct.
pub fn collation_suffix(collation: Option<&str>) -> String {
    match collation {
        Some(c) if !c.is_empty() => format!(" COLLATE \"{}\"", c),
        _ => String::new(),
    }
}

/// Build the ordered row-fetch query for one chunk of a table.
///
/// The WHERE predicate is the chunk's range condition; ordering on the
/// key columns is what makes the merge-compare in the differ valid.
pub fn build_rows_query(
    schema: &str,
    table: &str,
    columns: &[Column],
    order_key_cols: &[Column],
    where_clause: &str,
    collation: Option<&str>,
) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let keys = order_key_cols
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "SELECT /*!40001 SQL_NO_CACHE */ {} FROM {} WHERE {} ORDER BY {}{}",
        cols,
        quote_table(schema, table),
        where_clause,
        keys,
        collation_suffix(collation)
    )
}
