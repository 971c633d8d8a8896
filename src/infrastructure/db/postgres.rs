use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, warn};

use super::{
    insert_sql, quote_ident, rows_per_chunk, typed_cell, Placeholder, SqlValue, TableStore,
};
use crate::domain::error::{AppError, Result};
use crate::domain::table::{ColumnType, DataTable, LoadResult};
use crate::infrastructure::config::PgConfig;

/// PostgreSQL caps bind parameters per statement at u16::MAX
const PG_MAX_BIND_PARAMS: usize = 65535;

/// Wait for PostgreSQL to accept connections.
///
/// One attempt per second up to `max_retries`; each attempt opens and closes
/// a single-connection pool. Exhausting the budget is fatal.
pub async fn wait_for_postgres(config: &PgConfig, max_retries: u32) -> Result<()> {
    for attempt in 1..=max_retries {
        let connect = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(config.connect_options())
            .await;

        match connect {
            Ok(pool) => {
                pool.close().await;
                info!("PostgreSQL is ready");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Waiting for PostgreSQL... ({}/{}): {}",
                    attempt, max_retries, e
                );
                if attempt < max_retries {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    Err(AppError::Connectivity(format!(
        "PostgreSQL at {}:{} not reachable after {} attempts",
        config.host, config.port, max_retries
    )))
}

/// Loads tables into a PostgreSQL schema.
///
/// Table names are dot-qualified with the schema; the whole run shares one
/// transaction, so a failure anywhere leaves nothing committed.
pub struct PgStore {
    pool: PgPool,
    schema: String,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgStore {
    pub async fn connect(config: &PgConfig, schema: String) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(config.connect_options())
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        info!(
            "Connected to PostgreSQL database '{}' (host: {})",
            config.database, config.host
        );

        Ok(Self {
            pool,
            schema,
            tx: None,
        })
    }

    /// Drop any uncommitted run transaction (rolling it back) and close the pool.
    pub async fn close(&mut self) {
        self.tx = None;
        self.pool.close().await;
    }

    fn column_decl(ty: ColumnType) -> &'static str {
        match ty {
            ColumnType::Integer => "BIGINT",
            ColumnType::Real => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }

    fn qualified_sql(&self, stem: &str) -> Result<String> {
        Ok(format!(
            "{}.{}",
            quote_ident(&self.schema)?,
            quote_ident(stem)?
        ))
    }
}

#[async_trait]
impl TableStore for PgStore {
    fn qualified_name(&self, stem: &str) -> String {
        format!("{}.{}", self.schema, stem)
    }

    async fn begin(&mut self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to open run transaction: {}", e))
        })?;

        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&self.schema)?);
        sqlx::query(&sql).execute(&mut *tx).await.map_err(|e| {
            AppError::DatabaseError(format!(
                "Failed to create schema '{}': {}",
                self.schema, e
            ))
        })?;

        info!("Schema {} created/verified", self.schema);
        self.tx = Some(tx);
        Ok(())
    }

    async fn replace_table(&mut self, stem: &str, table: &DataTable) -> Result<LoadResult> {
        let display = self.qualified_name(stem);
        let qualified = self.qualified_sql(stem)?;

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
                AppError::DatabaseError(format!("Failed to drop table {}: {}", display, e))
            })?;

        sqlx::query(&format!("CREATE TABLE {} ({})", qualified, column_decls))
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create table {}: {}", display, e))
            })?;

        let chunk_rows = rows_per_chunk(table.columns.len(), PG_MAX_BIND_PARAMS);
        let mut written = 0usize;

        for chunk in table.rows.chunks(chunk_rows) {
            let sql = insert_sql(&qualified, &table.columns, chunk.len(), Placeholder::Numbered)?;
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
                AppError::DatabaseError(format!("Failed to insert into {}: {}", display, e))
            })?;
            written += chunk.len();
        }

        Ok(LoadResult {
            table: display,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PgStore {
        let config = PgConfig {
            host: "localhost".to_string(),
            port: 5432,
            database: "dbt_workshop".to_string(),
            user: "dbt_user".to_string(),
            password: "dbt_password".to_string(),
        };
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(config.connect_options());
        PgStore {
            pool,
            schema: "olist_data".to_string(),
            tx: None,
        }
    }

    #[tokio::test]
    async fn test_wait_for_postgres_gives_up() {
        // Port 1 refuses immediately, so a one-attempt budget fails fast.
        let config = PgConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            database: "dbt_workshop".to_string(),
            user: "dbt_user".to_string(),
            password: "dbt_password".to_string(),
        };
        let err = wait_for_postgres(&config, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Connectivity(_)));
    }

    // Lazy pool construction never connects, but it still registers with
    // the runtime, so these run under #[tokio::test].
    #[tokio::test]
    async fn test_qualified_name_is_dot_separated() {
        assert_eq!(store().qualified_name("orders"), "olist_data.orders");
    }

    #[tokio::test]
    async fn test_qualified_sql_quotes_both_parts() {
        assert_eq!(
            store().qualified_sql("orders").unwrap(),
            "\"olist_data\".\"orders\""
        );
    }

    #[test]
    fn test_column_decls() {
        assert_eq!(PgStore::column_decl(ColumnType::Integer), "BIGINT");
        assert_eq!(PgStore::column_decl(ColumnType::Real), "DOUBLE PRECISION");
        assert_eq!(PgStore::column_decl(ColumnType::Boolean), "BOOLEAN");
        assert_eq!(PgStore::column_decl(ColumnType::Text), "TEXT");
    }
}
