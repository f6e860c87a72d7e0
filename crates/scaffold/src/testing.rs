//! Test doubles shared by the unit tests.

use crate::context::RunContext;
use crate::error::Result;
use crate::step::{BoxedStep, Step};
use crate::types::StepOptions;
use dbkit::{ClientFactory, ConnectionOptions, DatabaseClient, Engine};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Configurable step that counts its invocations.
#[derive(Debug, Clone)]
pub struct TestStep {
    name: String,
    priority: i32,
    condition: bool,
    sleep: Duration,
    error: Option<String>,
    calls: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    previews: Arc<AtomicUsize>,
}

impl TestStep {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            condition: true,
            sleep: Duration::ZERO,
            error: None,
            calls: Arc::default(),
            completed: Arc::default(),
            previews: Arc::default(),
        }
    }

    pub fn with_condition(mut self, condition: bool) -> Self {
        self.condition = condition;
        self
    }

    pub fn sleeping(mut self, millis: u64) -> Self {
        self.sleep = Duration::from_millis(millis);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn completed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completed)
    }

    pub fn previews(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.previews)
    }

    pub fn boxed(self) -> BoxedStep {
        Arc::new(self)
    }
}

impl Step for TestStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn condition(&self, _ctx: &RunContext) -> Result<bool> {
        Ok(self.condition)
    }

    fn run(&self, _ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.sleep);
        self.completed.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn preview(&self, _ctx: &RunContext, _opts: &StepOptions) -> anyhow::Result<()> {
        self.previews.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared state behind [`MockFactory`] and its clients.
#[derive(Debug, Default)]
pub struct MockServer {
    pub databases: BTreeSet<String>,
    /// Scripted outcomes for upcoming `create_database` calls, consumed in
    /// order. `None` means "fall through to normal behavior".
    pub script: VecDeque<Option<dbkit::Error>>,
    pub create_calls: Vec<String>,
    pub dropped: Vec<String>,
    pub connections: usize,
    pub unreachable: bool,
}

/// In-memory database server.
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub server: Arc<Mutex<MockServer>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let factory = Self::default();
        factory.state().unreachable = true;
        factory
    }

    pub fn with_databases(names: &[&str]) -> Self {
        let factory = Self::default();
        factory
            .state()
            .databases
            .extend(names.iter().map(ToString::to_string));
        factory
    }

    /// Make the next `count` creations collide.
    pub fn collide(&self, count: usize) {
        let mut state = self.state();
        for _ in 0..count {
            state.script.push_back(Some(dbkit::Error::AlreadyExists {
                name: "scripted".to_string(),
            }));
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockServer> {
        self.server.lock().unwrap()
    }
}

impl ClientFactory for MockFactory {
    fn connect(
        &self,
        _engine: Engine,
        _opts: &ConnectionOptions,
    ) -> dbkit::Result<Box<dyn DatabaseClient>> {
        self.state().connections += 1;
        Ok(Box::new(MockClient {
            server: Arc::clone(&self.server),
        }))
    }
}

pub struct MockClient {
    server: Arc<Mutex<MockServer>>,
}

impl DatabaseClient for MockClient {
    fn ping(&self) -> dbkit::Result<()> {
        if self.server.lock().unwrap().unreachable {
            return Err(dbkit::Error::Connection {
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    fn create_database(&self, name: &str) -> dbkit::Result<()> {
        let mut state = self.server.lock().unwrap();
        state.create_calls.push(name.to_string());
        if let Some(Some(err)) = state.script.pop_front() {
            return Err(err);
        }
        if !state.databases.insert(name.to_string()) {
            return Err(dbkit::Error::AlreadyExists {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn drop_database(&self, name: &str) -> dbkit::Result<()> {
        let mut state = self.server.lock().unwrap();
        state.databases.remove(name);
        state.dropped.push(name.to_string());
        Ok(())
    }

    fn list_databases(&self, pattern: &str) -> dbkit::Result<Vec<String>> {
        // Only the `%<literal>` form is used by cleanup
        let tail = pattern.trim_start_matches('%');
        let state = self.server.lock().unwrap();
        Ok(state
            .databases
            .iter()
            .filter(|name| name.ends_with(tail))
            .cloned()
            .collect())
    }
}
