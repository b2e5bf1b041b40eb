//! Action queue manager.
//!
//! Owns the pending FIFO, the dequeued ("running") groups, the finished
//! history and the consecutive-error counter. All of it sits behind one
//! mutex that is never held across an await.
//!
//! The manager reaches into the executor only through [`Interrupter`] and
//! [`ActionLayering`], and only while it has a dequeued group outstanding. An executor without a
//! dequeued group has nothing to interrupt, and skipping the call keeps an
//! interrupt from being deferred onto a group that was queued after it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, OnceLock, Weak};
use std::time::Instant;

use actscript_core::config::{EngineConfig, QueueMode};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::conflict;
use crate::error::QueueError;
use crate::executor::{ActionSource, Completer};
use crate::parser::{format_script, parse_and_validate};
use crate::types::{ActionGroup, FinishedGroup, GameAction, GroupReport, QueueStatus};

/// Narrow capability the queue manager holds on the executor.
pub trait Interrupter: Send + Sync {
    /// Cancel every running action. Returns how many were cancelled.
    fn interrupt_all_actions(&self) -> usize;

    /// Cancel running actions that conflict with `group`. Returns how many
    /// were cancelled.
    fn interrupt_conflicting_actions(&self, group: &ActionGroup) -> usize;
}

/// Narrow capability to add actions to the group the executor is running.
pub trait ActionLayering: Send + Sync {
    /// Start `group`'s actions alongside the running group. Returns `false`,
    /// starting nothing, when no group is accepting new actions.
    fn layer_onto_running(&self, group: &ActionGroup) -> bool;
}

/// Everything the queue manager may ask of the executor.
pub trait ExecutorControl: Interrupter + ActionLayering {}

impl<T: Interrupter + ActionLayering + ?Sized> ExecutorControl for T {}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<ActionGroup>,
    running: Vec<(ActionGroup, Instant)>,
    finished: VecDeque<FinishedGroup>,
    finished_total: usize,
    last_script: String,
    error_count: u32,
    stopped: bool,
}

/// Pending queue, running set and history for one environment.
pub struct ActionQueueManager {
    config: EngineConfig,
    state: Mutex<QueueState>,
    executor: OnceLock<Weak<dyn ExecutorControl>>,
}

impl ActionQueueManager {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            executor: OnceLock::new(),
        }
    }

    /// Wire the executor in. Only the first call takes effect.
    pub fn attach_executor(&self, executor: Weak<dyn ExecutorControl>) {
        if self.executor.set(executor).is_err() {
            warn!("Executor already attached, ignoring");
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse, validate and enqueue a script under the configured policy.
    ///
    /// In merge mode the first group is layered onto the running group when
    /// the executor accepts it, and only the rest are enqueued.
    ///
    /// Returns the number of groups accepted. Failures count towards the
    /// circuit breaker; once `max_error_count` consecutive failures are
    /// reached the counter resets and `ErrorLimitExceeded` is returned.
    pub fn add_commands(&self, script: &str) -> Result<usize, QueueError> {
        let parsed = parse_and_validate(script, self.config.max_action_duration_secs);

        let mut state = self.lock();
        if state.stopped {
            return Err(QueueError::Stopped);
        }

        let mut groups = match parsed {
            Ok(groups) => groups,
            Err(err) => {
                state.error_count += 1;
                if state.error_count >= self.config.max_error_count {
                    let limit = state.error_count;
                    state.error_count = 0;
                    warn!(limit, error = %err, "Invalid script limit reached, counter reset");
                    return Err(QueueError::ErrorLimitExceeded { limit, last: err });
                }
                warn!(
                    error = %err,
                    error_count = state.error_count,
                    "Rejected script"
                );
                return Err(QueueError::Validation(err));
            }
        };

        state.error_count = 0;
        state.last_script = script.trim().to_string();

        let count = groups.len();
        let (interrupted, layered) = match (self.config.queue_mode, groups.first()) {
            _ if state.running.is_empty() => (0, false),
            (QueueMode::Replace, _) => (self.with_executor(|e| e.interrupt_all_actions()), false),
            (QueueMode::Merge, Some(first)) => (
                self.with_executor(|e| e.interrupt_conflicting_actions(first)),
                self.with_executor(|e| e.layer_onto_running(first)),
            ),
            (QueueMode::Merge, None) => (0, false),
        };

        if layered {
            let first = groups.remove(0);
            if let Some((current, started)) = state.running.last_mut() {
                *current = merge_groups(current, &first, started.elapsed().as_secs_f64());
            }
        }

        let dropped = state.pending.len();
        state.pending.clear();
        state.pending.extend(groups);

        info!(
            mode = %self.config.queue_mode,
            groups = count,
            dropped,
            interrupted,
            layered,
            "Script enqueued"
        );
        Ok(count)
    }

    /// Pop the queue head and mark it running.
    pub fn next_action_group(&self) -> Option<ActionGroup> {
        let mut state = self.lock();
        let group = state.pending.pop_front()?;
        state.running.push((group.clone(), Instant::now()));
        debug!(group_id = %group.id, actions = %group, "Dequeued action group");
        Some(group)
    }

    /// Move a group from running to the bounded finished history.
    pub fn mark_action_group_completed(&self, report: GroupReport) {
        let mut state = self.lock();
        let Some(pos) = state.running.iter().position(|(g, _)| g.id == report.group.id) else {
            debug!(group_id = %report.group.id, "Completed group is no longer tracked");
            return;
        };
        state.running.remove(pos);

        debug!(
            group_id = %report.group.id,
            interrupted = report.interrupted,
            "Action group finished"
        );
        state.finished.push_back(FinishedGroup {
            report,
            finished_at: Utc::now(),
        });
        state.finished_total += 1;
        while state.finished.len() > self.config.history_limit {
            state.finished.pop_front();
        }
    }

    /// Consistent snapshot of the queue.
    pub fn status(&self) -> QueueStatus {
        let state = self.lock();

        let pending: Vec<ActionGroup> = state.pending.iter().cloned().collect();
        let running: Vec<ActionGroup> = state.running.iter().map(|(g, _)| g.clone()).collect();
        let finished: Vec<ActionGroup> =
            state.finished.iter().map(|f| f.report.group.clone()).collect();

        let pending_secs: f64 = pending.iter().map(|g| g.estimated_duration_secs).sum();
        let running_secs: f64 = state
            .running
            .iter()
            .map(|(g, started)| {
                (g.estimated_duration_secs - started.elapsed().as_secs_f64()).max(0.0)
            })
            .sum();

        QueueStatus {
            pending_actions_text: format_script(&pending),
            pending_count: pending.len(),
            estimated_completion_ms: ((pending_secs + running_secs) * 1000.0).round() as u64,
            last_input_text: state.last_script.clone(),
            finished_count: state.finished_total,
            finished_sample_text: format_script(&finished),
            running_count: running.len(),
            running_text: format_script(&running),
            error_count: state.error_count,
        }
    }

    /// Finished history, oldest first.
    pub fn history(&self) -> Vec<FinishedGroup> {
        self.lock().finished.iter().cloned().collect()
    }

    pub fn pending_groups(&self) -> Vec<ActionGroup> {
        self.lock().pending.iter().cloned().collect()
    }

    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    pub fn reset_error_count(&self) {
        self.lock().error_count = 0;
    }

    /// Drop pending, running and finished groups and interrupt the executor.
    pub fn clear(&self) {
        let mut state = self.lock();
        self.drop_work(&mut state);
        state.finished.clear();
        state.finished_total = 0;
        info!("Action queue cleared");
    }

    /// Drop pending and running groups and refuse any further scripts.
    ///
    /// The finished history is kept so a final status still reports it.
    pub fn stop(&self) {
        let mut state = self.lock();
        self.drop_work(&mut state);
        state.stopped = true;
        info!("Action queue stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    fn drop_work(&self, state: &mut QueueState) {
        if !state.running.is_empty() {
            self.with_executor(|e| e.interrupt_all_actions());
        }
        state.pending.clear();
        state.running.clear();
    }

    fn with_executor<R: Default>(&self, f: impl FnOnce(&dyn ExecutorControl) -> R) -> R {
        match self.executor.get().and_then(Weak::upgrade) {
            Some(executor) => f(executor.as_ref()),
            None => R::default(),
        }
    }

    // Queue state is plain data, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `running` with `incoming` layered on. Actions `incoming` interrupts are
/// dropped; the id is kept so the executor's completion still matches.
fn merge_groups(running: &ActionGroup, incoming: &ActionGroup, elapsed_secs: f64) -> ActionGroup {
    let mut actions: Vec<GameAction> = running
        .actions
        .iter()
        .filter(|a| !conflict::interrupts(a.action_type, incoming.types()))
        .cloned()
        .collect();
    let surviving_secs = actions.iter().map(|a| a.duration_secs).fold(0.0_f64, f64::max);
    actions.extend(incoming.actions.iter().cloned());

    ActionGroup {
        id: running.id,
        actions,
        estimated_duration_secs: surviving_secs
            .max(elapsed_secs + incoming.estimated_duration_secs),
    }
}

impl ActionSource for ActionQueueManager {
    fn next_action_group(&self) -> Option<ActionGroup> {
        ActionQueueManager::next_action_group(self)
    }
}

impl Completer for ActionQueueManager {
    fn mark_action_group_completed(&self, report: GroupReport) {
        ActionQueueManager::mark_action_group_completed(self, report)
    }
}
