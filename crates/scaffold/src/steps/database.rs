//! Database provisioning (`db.create`) and teardown (`db.destroy`).
//!
//! Server databases are named `<prefix>_<adjective>_<noun>`. The suffix is
//! shared by every `db.create` step in a run and persisted through a
//! [`SuffixStore`] so that cleanup, in a later process, can find and drop
//! every database carrying it.

use crate::condition::Condition;
use crate::context::{RunContext, SuffixStore};
use crate::error::Result;
use crate::step::Step;
use crate::template;
use crate::types::StepOptions;
use crate::words;
use anyhow::Context;
use dbkit::{
    ClientFactory, ConnectionOptions, DEFAULT_MAX_ATTEMPTS, DatabaseClient, Engine, LogCallback,
    retry_on_conflict,
};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::sync::Arc;

/// SQLite file used when neither `--database` nor `DB_DATABASE` is set.
pub const DEFAULT_SQLITE_PATH: &str = "database/database.sqlite";

/// Options accepted in a database step's `args`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct DbArgs {
    host: Option<String>,
    port: Option<String>,
    username: Option<String>,
    password: Option<String>,
    prefix: Option<String>,
    database: Option<String>,
}

impl DbArgs {
    /// Accepts `--flag value` and `--flag=value`.
    fn parse(args: &[String]) -> Self {
        let mut parsed = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg.as_str(), None),
            };

            let slot = match flag {
                "--host" => &mut parsed.host,
                "--port" => &mut parsed.port,
                "--username" => &mut parsed.username,
                "--password" => &mut parsed.password,
                "--prefix" => &mut parsed.prefix,
                "--database" => &mut parsed.database,
                other => {
                    log::debug!("Ignoring unknown database argument {other}");
                    continue;
                }
            };
            *slot = inline.or_else(|| iter.next().cloned());
        }

        parsed
    }

    /// Merge explicit args over `DB_*` values from the environment.
    fn connection_options(&self, ctx: &RunContext) -> anyhow::Result<ConnectionOptions> {
        let port = self
            .port
            .as_deref()
            .map(str::parse::<u16>)
            .transpose()
            .with_context(|| format!("invalid --port {:?}", self.port.as_deref().unwrap_or("")))?;

        let explicit = ConnectionOptions {
            host: self.host.clone(),
            port,
            username: self.username.clone(),
            password: self.password.clone(),
        };
        let from_env = ConnectionOptions {
            host: env_non_empty(ctx, "DB_HOST"),
            port: env_non_empty(ctx, "DB_PORT").and_then(|p| match p.parse() {
                Ok(port) => Some(port),
                Err(_) => {
                    log::warn!("Ignoring invalid DB_PORT {p:?}");
                    None
                }
            }),
            username: env_non_empty(ctx, "DB_USERNAME"),
            password: env_non_empty(ctx, "DB_PASSWORD"),
        };

        Ok(explicit.or(from_env))
    }

    /// Unsanitized name prefix: `--prefix`, then site name, then `APP_NAME`.
    fn prefix(&self, ctx: &RunContext) -> String {
        self.prefix
            .clone()
            .or_else(|| Some(ctx.site_name().to_string()).filter(|s| !s.is_empty()))
            .or_else(|| env_non_empty(ctx, "APP_NAME"))
            .unwrap_or_default()
    }
}

fn env_non_empty(ctx: &RunContext, key: &str) -> Option<String> {
    ctx.env_value(key).filter(|v| !v.is_empty())
}

/// Explicit engine wins; otherwise infer from `DB_CONNECTION`.
fn resolve_engine(explicit: Option<&str>, ctx: &RunContext) -> dbkit::Result<Option<Engine>> {
    match explicit {
        Some(value) => Engine::from_config(value).map(Some),
        None => Ok(ctx
            .env_value("DB_CONNECTION")
            .as_deref()
            .and_then(Engine::from_connection)),
    }
}

/// Connect and verify the server answers.
fn open(
    clients: &dyn ClientFactory,
    engine: Engine,
    opts: &ConnectionOptions,
) -> dbkit::Result<Box<dyn DatabaseClient>> {
    let client = clients.connect(engine, opts)?;
    client.ping()?;
    Ok(client)
}

/// Creates the worktree's database.
#[derive(Clone)]
pub struct DbCreateStep {
    name: String,
    args: Vec<String>,
    engine: Option<String>,
    priority: i32,
    condition: Condition,
    max_attempts: u32,
    clients: Arc<dyn ClientFactory>,
    suffixes: Arc<dyn SuffixStore>,
}

impl fmt::Debug for DbCreateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCreateStep")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("engine", &self.engine)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl DbCreateStep {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        suffixes: Arc<dyn SuffixStore>,
        priority: i32,
    ) -> Self {
        Self {
            name: "db.create".to_string(),
            args: Vec::new(),
            engine: None,
            priority,
            condition: Condition::always(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            clients,
            suffixes,
        }
    }

    /// Report under a different step name (e.g. the `database.create` alias).
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_engine(mut self, engine: Option<String>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    fn create_sqlite(&self, ctx: &RunContext, args: &DbArgs) -> anyhow::Result<()> {
        let relative = args
            .database
            .clone()
            .or_else(|| env_non_empty(ctx, "DB_DATABASE"))
            .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string());
        let path = ctx.resolve(&relative);

        if path.exists() {
            log::info!("SQLite database already exists: {relative}");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("creating {}", path.display()))?;

        log::info!("Created SQLite database {relative}");
        Ok(())
    }

    /// Create `<prefix>_<suffix>` with a suffix chosen earlier in the run.
    fn create_with_suffix(
        &self,
        client: &dyn DatabaseClient,
        prefix: &str,
        suffix: &str,
        max_len: usize,
    ) -> anyhow::Result<()> {
        let name = words::database_name(prefix, suffix, max_len);
        match client.create_database(&name) {
            Ok(()) => log::info!("Created database {name}"),
            Err(e) if e.is_retryable() => log::info!("Database {name} already exists, reusing it"),
            Err(e) => return Err(e).with_context(|| format!("creating database {name}")),
        }
        Ok(())
    }

    /// Pick fresh suffixes until creation stops colliding.
    ///
    /// The tentative suffix is published on the context for each attempt and
    /// withdrawn again when the attempt fails.
    fn create_with_new_suffix(
        &self,
        ctx: &RunContext,
        client: &dyn DatabaseClient,
        prefix: &str,
        max_len: usize,
    ) -> dbkit::Result<String> {
        retry_on_conflict(self.max_attempts, Some(&LogCallback), |attempt| {
            let suffix = words::generate_suffix();
            ctx.set_db_suffix(suffix.clone());

            let name = words::database_name(prefix, &suffix, max_len);
            log::debug!(
                "Creating database {name} (attempt {}/{})",
                attempt + 1,
                self.max_attempts
            );

            match client.create_database(&name) {
                Ok(()) => {
                    log::info!("Created database {name}");
                    Ok(suffix)
                }
                Err(e) => {
                    ctx.clear_db_suffix();
                    Err(e)
                }
            }
        })
    }
}

impl Step for DbCreateStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let args = DbArgs::parse(&template::render_all(&self.args, ctx)?);

        let Some(engine) = resolve_engine(self.engine.as_deref(), ctx)? else {
            log::info!("No database engine configured, skipping database creation");
            return Ok(());
        };

        if !engine.is_server() {
            return self.create_sqlite(ctx, &args);
        }

        let conn = args.connection_options(ctx)?;
        let client = match open(self.clients.as_ref(), engine, &conn) {
            Ok(client) => client,
            Err(e) => {
                log::warn!("Skipping database creation, {engine} server unavailable: {e}");
                return Ok(());
            }
        };

        let prefix = args.prefix(ctx);
        let max_len = engine.max_name_len();

        let lease = ctx.lock_db_suffix();
        let suffix = match ctx.current_db_suffix() {
            Some(suffix) => {
                self.create_with_suffix(client.as_ref(), &prefix, &suffix, max_len)?;
                suffix
            }
            None => self.create_with_new_suffix(ctx, client.as_ref(), &prefix, max_len)?,
        };

        if let Err(e) = self.suffixes.save_suffix(ctx.worktree_path(), &suffix) {
            log::warn!("Failed to record database suffix {suffix}: {e:#}");
        }
        drop(lease);

        Ok(())
    }

    fn preview(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        let args = DbArgs::parse(&template::render_all(&self.args, ctx)?);
        match resolve_engine(self.engine.as_deref(), ctx)? {
            Some(engine) if engine.is_server() => {
                let suffix = ctx
                    .current_db_suffix()
                    .unwrap_or_else(|| "<adjective>_<noun>".to_string());
                let name = words::database_name(&args.prefix(ctx), &suffix, engine.max_name_len());
                log::info!("Would create {engine} database {name}");
            }
            Some(_) => log::info!("Would create SQLite database file"),
            None => log::info!("No database engine configured"),
        }
        Ok(())
    }
}

/// Drops every database carrying the worktree's suffix.
///
/// Never fails the cleanup run: unreachable servers, unknown engines and
/// listing errors are logged and skipped.
#[derive(Clone)]
pub struct DbDestroyStep {
    args: Vec<String>,
    engine: Option<String>,
    priority: i32,
    condition: Condition,
    clients: Arc<dyn ClientFactory>,
    suffixes: Arc<dyn SuffixStore>,
}

impl fmt::Debug for DbDestroyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbDestroyStep")
            .field("args", &self.args)
            .field("engine", &self.engine)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

impl DbDestroyStep {
    pub fn new(
        clients: Arc<dyn ClientFactory>,
        suffixes: Arc<dyn SuffixStore>,
        priority: i32,
    ) -> Self {
        Self {
            args: Vec::new(),
            engine: None,
            priority,
            condition: Condition::always(),
            clients,
            suffixes,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_engine(mut self, engine: Option<String>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Context first, then the persisted record.
    fn resolve_suffix(&self, ctx: &RunContext) -> Option<String> {
        if let Some(suffix) = ctx.current_db_suffix() {
            return Some(suffix);
        }
        match self.suffixes.load_suffix(ctx.worktree_path()) {
            Ok(suffix) => suffix,
            Err(e) => {
                log::warn!("Could not read recorded database suffix: {e:#}");
                None
            }
        }
    }

    fn destroy(&self, ctx: &RunContext, dry_run: bool) {
        let Some(suffix) = self.resolve_suffix(ctx) else {
            log::info!("No database suffix recorded, nothing to drop");
            return;
        };

        let args = match template::render_all(&self.args, ctx) {
            Ok(args) => DbArgs::parse(&args),
            Err(e) => {
                log::warn!("Skipping database cleanup: {e}");
                return;
            }
        };

        let engine = match resolve_engine(self.engine.as_deref(), ctx) {
            Ok(Some(engine)) if engine.is_server() => engine,
            Ok(Some(_)) => {
                log::debug!("SQLite databases live in the worktree, nothing to drop");
                return;
            }
            Ok(None) => {
                log::info!("No database engine configured, skipping cleanup");
                return;
            }
            Err(e) => {
                log::warn!("Skipping database cleanup: {e}");
                return;
            }
        };

        let client = match args
            .connection_options(ctx)
            .and_then(|conn| open(self.clients.as_ref(), engine, &conn).map_err(Into::into))
        {
            Ok(client) => client,
            Err(e) => {
                log::warn!("Skipping database cleanup, {engine} server unavailable: {e:#}");
                return;
            }
        };

        let names = match client.list_databases(&format!("%_{suffix}")) {
            Ok(names) => names,
            Err(e) => {
                log::warn!("Could not list databases: {e}");
                return;
            }
        };

        let tail = format!("_{suffix}");
        for name in names.iter().filter(|name| name.ends_with(&tail)) {
            if dry_run {
                log::info!("Would drop database {name}");
                continue;
            }
            match client.drop_database(name) {
                Ok(()) => log::info!("Dropped database {name}"),
                Err(e) => log::warn!("Failed to drop database {name}: {e}"),
            }
        }
    }
}

impl Step for DbDestroyStep {
    fn name(&self) -> &str {
        "db.destroy"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, ctx: &RunContext) -> Result<bool> {
        self.condition.evaluate(ctx)
    }

    fn run(&self, ctx: &RunContext, opts: &StepOptions) -> anyhow::Result<()> {
        self.destroy(ctx, opts.dry_run);
        Ok(())
    }

    fn preview(&self, ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        self.destroy(ctx, true);
        Ok(())
    }
}
