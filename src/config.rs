use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::BadRequest(format!(
                "STORE_BACKEND must be sqlite or memory, got {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: u32,
    pub store_backend: StoreBackend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://todos.db?mode=rwc".to_string(),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            max_connections: 5,
            store_backend: StoreBackend::Sqlite,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let host = parse_var("HOST", defaults.host)?;
        let port = parse_var("PORT", defaults.port)?;
        let max_connections = parse_var("DB_MAX_CONNECTIONS", defaults.max_connections)?;
        let store_backend = match env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };

        Ok(Self {
            database_url,
            host,
            port,
            max_connections,
            store_backend,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
