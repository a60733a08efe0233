use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pna_core::config::Config;
use pna_core::dispatch::Dispatcher;
use pna_core::driver::{self, ActuatorDriver};
use pna_core::queue::{JobDb, JobRunner};
use pna_core::recorder::MacroRecorder;
use pna_core::registry::OperationRegistry;

/// Shared application state passed to all route handlers.
///
/// One dispatcher, one recorder session and one runner per process; every
/// route goes through them so recording sees all operator traffic.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub runner: JobRunner,
}

impl AppState {
    /// Wire the cell from `.pna/config.yaml` under `root`.
    pub fn load(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        for w in config.validate() {
            tracing::warn!(level = ?w.level, "config: {}", w.message);
        }
        let driver = driver::from_config(&config.driver)?;
        Self::new(root, config, driver)
    }

    /// Wire the cell around an explicit driver (tests, `--simulate`).
    pub fn new(
        root: PathBuf,
        config: Config,
        driver: Arc<dyn ActuatorDriver>,
    ) -> anyhow::Result<Self> {
        let registry = Arc::new(OperationRegistry::standard()?);
        let dispatcher = Dispatcher::new(registry, driver, MacroRecorder::new());

        let db = Arc::new(JobDb::open(&config.jobs_db_path(&root))?);
        let runner = JobRunner::new(
            db,
            dispatcher.clone(),
            Duration::from_millis(config.runner.interval_ms),
        );

        Ok(Self {
            root,
            config: Arc::new(config),
            dispatcher,
            runner,
        })
    }

    pub fn macros_dir(&self) -> PathBuf {
        self.config.macros_path(&self.root)
    }

    /// Resolve an operator-supplied macro name or path.
    pub fn macro_path(&self, name: &str) -> PathBuf {
        pna_core::paths::macro_path(&self.root, &self.config.macros_dir, name)
    }
}
