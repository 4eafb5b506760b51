// src/config.rs

//! Runner configuration, drawn solely from the environment. There
//! is deliberately no config-file fallback — matches the database-first
//! posture the rest of the core takes toward persisted state.

use crate::error::{Error, Result};

/// Connection parameters for the migration runner, read from
/// `FLUENT_DB_HOST`/`FLUENT_DB_PORT`/`FLUENT_DB_NAME`/`FLUENT_DB_USER`/
/// `FLUENT_DB_PASSWORD`.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = required_var("FLUENT_DB_HOST")?;
        let port_raw = required_var("FLUENT_DB_PORT")?;
        let port: u16 = port_raw
            .parse()
            .map_err(|_| Error::MissingConfig(format!("FLUENT_DB_PORT is not a valid port: {port_raw}")))?;
        let name = required_var("FLUENT_DB_NAME")?;
        let user = required_var("FLUENT_DB_USER")?;
        let password = required_var("FLUENT_DB_PASSWORD")?;

        Ok(Self {
            host,
            port,
            name,
            user,
            password,
        })
    }

    /// A `postgres::Config` built from these parameters.
    pub fn to_postgres_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.name)
            .user(&self.user)
            .password(&self.password);
        config
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::MissingConfig(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_vars() {
        for var in ["FLUENT_DB_HOST", "FLUENT_DB_PORT", "FLUENT_DB_NAME", "FLUENT_DB_USER", "FLUENT_DB_PASSWORD"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn missing_variable_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
    }

    #[test]
    fn reads_all_fields_from_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        std::env::set_var("FLUENT_DB_HOST", "localhost");
        std::env::set_var("FLUENT_DB_PORT", "5432");
        std::env::set_var("FLUENT_DB_NAME", "app");
        std::env::set_var("FLUENT_DB_USER", "app");
        std::env::set_var("FLUENT_DB_PASSWORD", "secret");

        let config = Config::from_env().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.name, "app");
        clear_vars();
    }

    #[test]
    fn invalid_port_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_vars();
        std::env::set_var("FLUENT_DB_HOST", "localhost");
        std::env::set_var("FLUENT_DB_PORT", "not-a-port");
        std::env::set_var("FLUENT_DB_NAME", "app");
        std::env::set_var("FLUENT_DB_USER", "app");
        std::env::set_var("FLUENT_DB_PASSWORD", "secret");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
        clear_vars();
    }
}
