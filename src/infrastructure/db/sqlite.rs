use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use tracing::info;

use super::{
    insert_sql, quote_ident, rows_per_chunk, typed_cell, Placeholder, SqlValue, TableStore,
};
use crate::domain::error::{AppError, Result};
use crate::domain::table::{ColumnType, DataTable, LoadResult};

/// Stay under SQLite's historical 999 bind-parameter limit
const SQLITE_MAX_BIND_PARAMS: usize = 999;

/// Loads tables into a single SQLite database file.
///
/// SQLite has no native schemas, so the namespace is a `prefix__stem`
/// table-name convention. One transaction covers the whole run.
pub struct SqliteStore {
    pool: SqlitePool,
    prefix: String,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path, prefix: String) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!(
                    "Failed to open SQLite database {}: {}",
                    path.display(),
                    e
                ))
            })?;

        info!("Opened SQLite database {}", path.display());

        Ok(Self {
            pool,
            prefix,
            tx: None,
        })
    }

    /// Drop any uncommitted run transaction (rolling it back) and close the pool.
    pub async fn close(&mut self) {
        self.tx = None;
        self.pool.close().await;
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn column_decl(ty: ColumnType) -> &'static str {
        match ty {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    fn qualified_name(&self, stem: &str) -> String {
        format!("{}__{}", self.prefix, stem)
    }

    async fn begin(&mut self) -> Result<()> {
        let tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to open run transaction: {}", e))
        })?;
        self.tx = Some(tx);
        Ok(())
    }

    async fn replace_table(&mut self, stem: &str, table: &DataTable) -> Result<LoadResult> {
        let name = self.qualified_name(stem);
        let qualified = quote_ident(&name)?;

        let column_decls = table
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, Self::column_decl(c.ty))))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let tx = self.tx.as_mut().ok_or_else(|| {
            AppError::DatabaseError("Run transaction is not open".to_string())
        })?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", qualified))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to drop table {}: {}", name, e))
            })?;

        sqlx::query(&format!("CREATE TABLE {} ({})", qualified, column_decls))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create table {}: {}", name, e))
            })?;

        let chunk_rows = rows_per_chunk(table.columns.len(), SQLITE_MAX_BIND_PARAMS);
        let mut written = 0usize;

        for chunk in table.rows.chunks(chunk_rows) {
            let sql = insert_sql(&qualified, &table.columns, chunk.len(), Placeholder::Question)?;
            let mut query = sqlx::query(&sql);

            for (offset, row) in chunk.iter().enumerate() {
                for (column, cell) in table.columns.iter().zip(row.iter()) {
                    query = match typed_cell(column, cell.as_deref(), written + offset)? {
                        SqlValue::Int(v) => query.bind(v),
                        SqlValue::Real(v) => query.bind(v),
                        SqlValue::Bool(v) => query.bind(v),
                        SqlValue::Text(v) => query.bind(v),
                    };
                }
            }

            query.execute(&mut **tx).await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert into {}: {}", name, e))
            })?;
            written += chunk.len();
        }

        Ok(LoadResult {
            table: name,
            rows: written,
        })
    }

    async fn commit(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or_else(|| {
            AppError::DatabaseError("Run transaction is not open".to_string())
        })?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit run: {}", e)))
    }
}
