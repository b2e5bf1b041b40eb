//! Environment facade wiring the queue manager and the executor together.
//!
//! The executor holds the manager as its feed; the manager holds the
//! executor only as a weak [`ExecutorControl`], so dropping the environment
//! frees both.

use std::sync::{Arc, Weak};

use actscript_core::config::ActscriptConfig;
use actscript_input::{FocusControl, InputDriver};
use tracing::info;

use crate::error::QueueError;
use crate::executor::{ActionExecutor, ActionFeed};
use crate::queue::{ActionQueueManager, ExecutorControl};
use crate::types::{FinishedGroup, QueueStatus};

/// Owns one queue manager and one executor.
pub struct ActionEnvironment {
    manager: Arc<ActionQueueManager>,
    executor: Arc<ActionExecutor>,
}

impl ActionEnvironment {
    pub fn new(
        config: &ActscriptConfig,
        input: Arc<dyn InputDriver>,
        focus: Arc<dyn FocusControl>,
    ) -> Self {
        let manager = Arc::new(ActionQueueManager::new(config.engine.clone()));
        let feed: Arc<dyn ActionFeed> = manager.clone();
        let executor = Arc::new(ActionExecutor::new(
            feed,
            input,
            focus,
            config.engine.clone(),
            config.target.clone(),
        ));

        let control: Arc<dyn ExecutorControl> = executor.clone();
        let weak: Weak<dyn ExecutorControl> = Arc::downgrade(&control);
        manager.attach_executor(weak);

        Self { manager, executor }
    }

    /// Start the execution loop. Must be called inside a tokio runtime.
    pub fn start(&self) {
        self.executor.start();
        info!(mode = %self.manager.config().queue_mode, "Action environment started");
    }

    /// Submit a script. See [`ActionQueueManager::add_commands`].
    pub fn add_commands(&self, script: &str) -> Result<usize, QueueError> {
        self.manager.add_commands(script)
    }

    pub fn status(&self) -> QueueStatus {
        self.manager.status()
    }

    pub fn history(&self) -> Vec<FinishedGroup> {
        self.manager.history()
    }

    pub fn error_count(&self) -> u32 {
        self.manager.error_count()
    }

    pub fn reset_error_count(&self) {
        self.manager.reset_error_count()
    }

    /// Drop all queued work and interrupt whatever is running.
    pub fn clear(&self) {
        self.manager.clear();
    }

    /// Stop accepting scripts, cancel everything and wait for the loop.
    /// Finished history stays readable afterwards.
    pub async fn stop(&self) {
        self.manager.stop();
        self.executor.stop().await;
        info!("Action environment stopped");
    }

    pub fn manager(&self) -> &Arc<ActionQueueManager> {
        &self.manager
    }

    pub fn executor(&self) -> &Arc<ActionExecutor> {
        &self.executor
    }
}
