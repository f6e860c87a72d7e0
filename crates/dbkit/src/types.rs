//! Core types for database provisioning.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// MySQL and MariaDB
    #[serde(rename = "mysql")]
    MySql,
    /// PostgreSQL
    #[serde(rename = "pgsql")]
    Postgres,
    /// File-backed SQLite
    Sqlite,
}

impl Engine {
    /// Parse an explicitly configured engine (`type = "..."` on a step).
    ///
    /// Only the canonical names are accepted here; anything else is a
    /// configuration error.
    pub fn from_config(value: &str) -> Result<Self> {
        match value {
            "mysql" => Ok(Self::MySql),
            "pgsql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::UnsupportedEngine(other.to_string())),
        }
    }

    /// Infer the engine from a connection-type value such as `DB_CONNECTION`.
    pub fn from_connection(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "pgsql" | "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Canonical short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "pgsql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Whether databases live on a server (and can collide by name).
    pub fn is_server(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }

    /// Maximum identifier length accepted by the server.
    pub fn max_name_len(&self) -> usize {
        match self {
            Self::MySql => 64,
            Self::Postgres | Self::Sqlite => 63,
        }
    }

    /// Default TCP port.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
            Self::Sqlite => 0,
        }
    }

    /// Default administrative user.
    pub fn default_username(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            _ => "root",
        }
    }

    /// Client executable used by the CLI backend.
    pub fn client_program(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "psql",
            Self::Sqlite => "sqlite3",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters; unset fields fall back to engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Server host (default `127.0.0.1`)
    pub host: Option<String>,
    /// Server port (default per engine)
    pub port: Option<u16>,
    /// Login user (default per engine)
    pub username: Option<String>,
    /// Login password, passed to the client through its environment
    pub password: Option<String>,
}

impl ConnectionOptions {
    /// Host to connect to.
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("127.0.0.1")
    }

    /// Port to connect to.
    pub fn port(&self, engine: Engine) -> u16 {
        self.port.unwrap_or_else(|| engine.default_port())
    }

    /// User to authenticate as.
    pub fn username(&self, engine: Engine) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| engine.default_username().to_string())
    }

    /// Fill unset fields from `other`, keeping values already present.
    pub fn or(mut self, other: ConnectionOptions) -> Self {
        self.host = self.host.or(other.host);
        self.port = self.port.or(other.port);
        self.username = self.username.or(other.username);
        self.password = self.password.or(other.password);
        self
    }
}
