use sqlx::postgres::PgConnectOptions;

use crate::domain::error::{AppError, Result};

/// PostgreSQL connection settings, read from environment variables with
/// documented defaults. `.env` files are honored via dotenvy at startup.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PgConfig {
    /// Read configuration from `POSTGRES_*` environment variables.
    ///
    /// Defaults: localhost:5432, database `dbt_workshop`, user `dbt_user`,
    /// password `dbt_password`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Tests inject a map here
    /// instead of mutating process-global environment variables.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port_raw = get("POSTGRES_PORT", "5432");
        let port: u16 = port_raw.parse().map_err(|_| {
            AppError::ValidationError(format!("POSTGRES_PORT is not a valid port: {}", port_raw))
        })?;

        Ok(Self {
            host: get("POSTGRES_HOST", "localhost"),
            port,
            database: get("POSTGRES_DB", "dbt_workshop"),
            user: get("POSTGRES_USER", "dbt_user"),
            password: get("POSTGRES_PASSWORD", "dbt_password"),
        })
    }

    /// Build sqlx connection options from this configuration
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = PgConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "dbt_workshop");
        assert_eq!(config.user, "dbt_user");
        assert_eq!(config.password, "dbt_password");
    }

    #[test]
    fn test_values_override_defaults() {
        let config = PgConfig::from_lookup(lookup_from(&[
            ("POSTGRES_HOST", "db.internal"),
            ("POSTGRES_PORT", "5433"),
            ("POSTGRES_DB", "warehouse"),
        ]))
        .unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5433);
        assert_eq!(config.database, "warehouse");
        assert_eq!(config.user, "dbt_user");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = PgConfig::from_lookup(lookup_from(&[("POSTGRES_PORT", "not-a-port")]));
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
