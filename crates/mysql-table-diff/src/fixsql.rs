//! Repair statement generation.
//!
//! Statements are rendered from the textual row snapshots, one per line,
//! so the fix file can be replayed with any MySQL client. Generated
//! columns are excluded throughout since the server recomputes them.

use crate::core::ident::{escape_string, quote_ident, quote_table};
use crate::core::row::{ColumnData, Row};
use crate::core::schema::{Column, TableInfo};
use crate::error::{DiffError, Result};

fn cell<'a>(row: &'a Row, name: &str) -> Result<&'a ColumnData> {
    row.get(name)
        .ok_or_else(|| DiffError::MissingColumn(name.to_string()))
}

/// Render one cell as a SQL literal.
fn render_value(column: &Column, data: &ColumnData) -> String {
    if data.is_null {
        "NULL".to_string()
    } else if column.need_quotes() {
        format!("'{}'", escape_string(&data.text()))
    } else {
        data.text().into_owned()
    }
}

/// `REPLACE INTO` statement restoring `row` under `target_schema` on the
/// target side, which may differ from the schema the row was read from.
pub fn generate_replace_dml(row: &Row, info: &TableInfo, target_schema: &str) -> Result<String> {
    let columns = info.diff_columns();
    let mut names = Vec::with_capacity(columns.len());
    let mut values = Vec::with_capacity(columns.len());
    for column in &columns {
        names.push(quote_ident(&column.name));
        values.push(render_value(column, cell(row, &column.name)?));
    }
    Ok(format!(
        "REPLACE INTO {}({}) VALUES ({});",
        quote_table(target_schema, &info.table),
        names.join(","),
        values.join(",")
    ))
}

/// `DELETE` statement removing `row` from the target, matching on every
/// non-generated column so an unexpected divergence is never deleted.
pub fn generate_delete_dml(row: &Row, info: &TableInfo, target_schema: &str) -> Result<String> {
    let columns = info.diff_columns();
    let mut conditions = Vec::with_capacity(columns.len());
    for column in &columns {
        let data = cell(row, &column.name)?;
        let quoted = quote_ident(&column.name);
        conditions.push(if data.is_null {
            format!("{} is NULL", quoted)
        } else {
            format!("{} = {}", quoted, render_value(column, data))
        });
    }
    Ok(format!(
        "DELETE FROM {} WHERE {};",
        quote_table(target_schema, &info.table),
        conditions.join(" AND ")
    ))
}

/// `REPLACE INTO` for a row present on both sides but unequal, prefixed
/// with comment lines naming each differing column and both values.
pub fn generate_replace_dml_with_annotation(
    source: &Row,
    target: &Row,
    info: &TableInfo,
    target_schema: &str,
) -> Result<String> {
    let mut lines = Vec::new();
    for column in &info.diff_columns() {
        let source_data = cell(source, &column.name)?;
        let target_data = cell(target, &column.name)?;
        if source_data == target_data {
            continue;
        }
        lines.push(format!(
            "-- diff column: {}, source: {}, target: {}",
            quote_ident(&column.name),
            render_value(column, source_data),
            render_value(column, target_data)
        ));
    }
    lines.push(generate_replace_dml(source, info, target_schema)?);
    Ok(lines.join("\n"))
}
