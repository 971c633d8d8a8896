pub mod postgres;
pub mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::domain::error::{AppError, Result};
use crate::domain::table::{Column, ColumnType, DataTable, LoadResult};

/// A relational target that tables can be bulk-loaded into.
///
/// Implementations hold one run-scoped transaction: everything between
/// `begin` and `commit` becomes visible atomically, and dropping the store
/// before `commit` rolls the whole run back.
#[async_trait]
pub trait TableStore {
    /// Fully-qualified table name for a file stem
    fn qualified_name(&self, stem: &str) -> String;

    /// Open the run-scoped transaction and create the namespace where the
    /// store supports one
    async fn begin(&mut self) -> Result<()>;

    /// Drop any existing table for `stem`, recreate it from the table's
    /// columns, and insert all rows
    async fn replace_table(&mut self, stem: &str, table: &DataTable) -> Result<LoadResult>;

    /// Commit the run-scoped transaction
    async fn commit(&mut self) -> Result<()>;
}

/// Quote an SQL identifier, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "Identifier must not be empty".to_string(),
        ));
    }
    Ok(format!("\"{}\"", trimmed.replace('"', "\"\"")))
}

/// A cell converted to its inferred SQL type, ready to bind.
#[derive(Debug)]
pub(crate) enum SqlValue {
    Int(Option<i64>),
    Real(Option<f64>),
    Bool(Option<bool>),
    Text(Option<String>),
}

/// Convert a raw cell to the column's inferred type. Cells past the
/// inference sample can still fail to parse; that aborts the load.
pub(crate) fn typed_cell(column: &Column, cell: Option<&str>, row_index: usize) -> Result<SqlValue> {
    let parse_err = |expected: &str, raw: &str| {
        AppError::ParseError(format!(
            "Column '{}' row {}: cannot parse '{}' as {}",
            column.name,
            row_index + 1,
            raw,
            expected
        ))
    };

    Ok(match column.ty {
        ColumnType::Integer => SqlValue::Int(match cell {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| parse_err("an integer", raw))?,
            ),
            None => None,
        }),
        ColumnType::Real => SqlValue::Real(match cell {
            Some(raw) => Some(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| parse_err("a number", raw))?,
            ),
            None => None,
        }),
        ColumnType::Boolean => SqlValue::Bool(match cell {
            Some(raw) => {
                let v = raw.trim();
                if v.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if v.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    return Err(parse_err("a boolean", raw));
                }
            }
            None => None,
        }),
        ColumnType::Text => SqlValue::Text(cell.map(|s| s.to_string())),
    })
}

/// Placeholder syntax of the target store
#[derive(Debug, Clone, Copy)]
pub(crate) enum Placeholder {
    /// PostgreSQL-style $1, $2, ...
    Numbered,
    /// SQLite-style ?
    Question,
}

/// Build a multi-row INSERT statement for `row_count` rows.
pub(crate) fn insert_sql(
    qualified: &str,
    columns: &[Column],
    row_count: usize,
    placeholder: Placeholder,
) -> Result<String> {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut values = Vec::with_capacity(row_count);
    let mut param = 0usize;
    for _ in 0..row_count {
        let row = (0..columns.len())
            .map(|_| {
                param += 1;
                match placeholder {
                    Placeholder::Numbered => format!("${}", param),
                    Placeholder::Question => "?".to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        values.push(format!("({})", row));
    }

    Ok(format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified,
        column_list,
        values.join(", ")
    ))
}

/// How many rows fit into one INSERT given the store's bind-parameter limit.
pub(crate) fn rows_per_chunk(column_count: usize, max_params: usize) -> usize {
    (max_params / column_count.max(1)).clamp(1, 1000)
}
