//! Database backend that shells out to the `mysql` and `psql` clients.

use crate::backend::{ClientFactory, DatabaseClient, escape_like};
use crate::error::{Error, Result};
use crate::types::{ConnectionOptions, Engine};
use std::path::PathBuf;
use std::process::{Command, Output};

/// Factory for [`CliClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CliFactory;

impl ClientFactory for CliFactory {
    fn connect(&self, engine: Engine, opts: &ConnectionOptions) -> Result<Box<dyn DatabaseClient>> {
        Ok(Box::new(CliClient::new(engine, opts.clone())?))
    }
}

/// A "connection" backed by one client invocation per statement.
pub struct CliClient {
    engine: Engine,
    program: PathBuf,
    opts: ConnectionOptions,
}

impl CliClient {
    /// Locate the client executable for `engine`.
    pub fn new(engine: Engine, opts: ConnectionOptions) -> Result<Self> {
        if !engine.is_server() {
            return Err(Error::UnsupportedEngine(engine.to_string()));
        }

        let program = which::which(engine.client_program()).map_err(|_| Error::ClientNotFound {
            program: engine.client_program().to_string(),
        })?;

        log::debug!("Using {} client at {}", engine, program.display());
        Ok(Self {
            engine,
            program,
            opts,
        })
    }

    fn command(&self, sql: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        let port = self.opts.port(self.engine).to_string();
        let user = self.opts.username(self.engine);

        match self.engine {
            Engine::MySql => {
                cmd.args(["-u", user.as_str(), "-h", self.opts.host(), "-P", port.as_str()])
                    .args(["-N", "-B", "-e", sql]);
                if let Some(password) = &self.opts.password {
                    cmd.env("MYSQL_PWD", password);
                }
            }
            _ => {
                cmd.args(["-U", user.as_str(), "-h", self.opts.host(), "-p", port.as_str()])
                    .args(["-d", "postgres", "-t", "-A", "-v", "ON_ERROR_STOP=1", "-c", sql]);
                if let Some(password) = &self.opts.password {
                    cmd.env("PGPASSWORD", password);
                }
            }
        }

        cmd
    }

    fn run(&self, sql: &str, database: Option<&str>) -> Result<Output> {
        let output = self.command(sql).output().map_err(|e| Error::CommandFailed {
            message: format!("failed to execute {}", self.program.display()),
            stderr: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_client_output(&stderr, database));
        }

        Ok(output)
    }

    fn quote(&self, name: &str) -> String {
        match self.engine {
            Engine::MySql => format!("`{}`", name.replace('`', "``")),
            _ => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }
}

impl DatabaseClient for CliClient {
    fn ping(&self) -> Result<()> {
        self.run("SELECT 1", None).map(|_| ())
    }

    fn create_database(&self, name: &str) -> Result<()> {
        let sql = format!("CREATE DATABASE {}", self.quote(name));
        self.run(&sql, Some(name))?;
        log::debug!("Created database {name}");
        Ok(())
    }

    fn drop_database(&self, name: &str) -> Result<()> {
        let sql = format!("DROP DATABASE IF EXISTS {}", self.quote(name));
        self.run(&sql, Some(name))?;
        log::debug!("Dropped database {name}");
        Ok(())
    }

    fn list_databases(&self, pattern: &str) -> Result<Vec<String>> {
        let like = escape_like(pattern).replace('\'', "''");
        let sql = match self.engine {
            Engine::MySql => format!("SHOW DATABASES LIKE '{like}'"),
            _ => format!(
                "SELECT datname FROM pg_database WHERE datname LIKE '{like}' AND datistemplate = false"
            ),
        };

        let output = self.run(&sql, None)?;
        Ok(parse_name_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse one-name-per-line client output.
fn parse_name_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}
