//! Identifier quoting and literal escaping for the MySQL dialect.

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a `schema.table` pair.
pub fn quote_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Escape a string literal for embedding in generated SQL: `'` becomes `\'`.
pub fn escape_string(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// Map key identifying a table within a run.
pub fn unique_id(schema: &str, table: &str) -> String {
    format!("{}:{}", schema, table)
}
