//! Action executor: the single consumer loop.
//!
//! The loop cycles `Idle -> Dequeuing -> Running(group) -> Idle`. Each
//! group's actions run concurrently as tasks in a `JoinSet`, each with its own
//! child cancellation token, and the loop joins all of them before reporting
//! the group back through [`Completer`].
//!
//! While a group's tasks are being joined, the executor also accepts new
//! actions into that group through [`ActionLayering`]; they are spawned into
//! the same `JoinSet` and reported with the group.
//!
//! The executor lock is never held while calling into the feed, so the queue
//! manager may call the [`Interrupter`] and [`ActionLayering`] methods while
//! holding its own lock.

/// Per-action lifecycle logging, raised from debug to info in debug mode.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod runner;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use actscript_core::config::{EngineConfig, TargetConfig};
use actscript_input::{FocusControl, InputDriver, InputError};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::conflict;
use crate::error::ExecutionError;
use crate::queue::{ActionLayering, Interrupter};
use crate::types::{
    ActionGroup, ActionOutcome, ActionState, ActionType, GameAction, GroupReport,
};

use runner::{run_action, RunSettings};

/// Where the executor gets work from.
pub trait ActionSource: Send + Sync {
    /// Pop the next group, if any. Must not block.
    fn next_action_group(&self) -> Option<ActionGroup>;
}

/// Where the executor reports finished or abandoned groups.
pub trait Completer: Send + Sync {
    fn mark_action_group_completed(&self, report: GroupReport);
}

/// A source that also accepts completions.
pub trait ActionFeed: ActionSource + Completer {}

impl<T: ActionSource + Completer + ?Sized> ActionFeed for T {}

/// Phase of the execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    /// Between asking the feed for work and dispatching what it returned.
    Dequeuing,
    Running,
}

struct RunningAction {
    action_type: ActionType,
    token: CancellationToken,
}

/// Interrupts that arrived while a group was being dequeued.
#[derive(Debug, Default)]
struct Deferred {
    all: bool,
    types: Vec<ActionType>,
}

/// An action layered onto the running group, with its cancellation token.
type Layered = (GameAction, CancellationToken);

/// How the join of a group's tasks ended.
struct Joined {
    aborted: bool,
    fault: Option<String>,
}

struct ExecutorState {
    phase: LoopPhase,
    current: Option<ActionGroup>,
    running: HashMap<String, RunningAction>,
    group_token: Option<CancellationToken>,
    /// Open only while the current group's tasks are being joined.
    layer_tx: Option<mpsc::UnboundedSender<Layered>>,
    /// Whether the current group passed the focus check.
    focused: bool,
    deferred: Deferred,
}

/// Runs action groups one at a time against the input driver.
pub struct ActionExecutor {
    feed: Arc<dyn ActionFeed>,
    input: Arc<dyn InputDriver>,
    focus: Arc<dyn FocusControl>,
    config: EngineConfig,
    target: TargetConfig,
    state: Mutex<ExecutorState>,
    worker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl ActionExecutor {
    pub fn new(
        feed: Arc<dyn ActionFeed>,
        input: Arc<dyn InputDriver>,
        focus: Arc<dyn FocusControl>,
        config: EngineConfig,
        target: TargetConfig,
    ) -> Self {
        Self {
            feed,
            input,
            focus,
            config,
            target,
            state: Mutex::new(ExecutorState {
                phase: LoopPhase::Idle,
                current: None,
                running: HashMap::new(),
                group_token: None,
                layer_tx: None,
                focused: false,
                deferred: Deferred::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the execution loop on the current tokio runtime.
    ///
    /// Calling `start` on a running executor does nothing.
    pub fn start(self: &Arc<Self>) {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            warn!("Action executor already started");
            return;
        }
        let shutdown = CancellationToken::new();
        let this = Arc::clone(self);
        let loop_token = shutdown.clone();
        let handle = tokio::spawn(async move { this.run(loop_token).await });
        *worker = Some((shutdown, handle));
    }

    /// Cancel everything in flight and wait, bounded by `stop_timeout_ms`,
    /// for the loop to exit.
    pub async fn stop(&self) {
        let worker = lock(&self.worker).take();
        let Some((shutdown, handle)) = worker else {
            return;
        };

        shutdown.cancel();
        self.interrupt_all_actions();

        let abort = handle.abort_handle();
        match tokio::time::timeout(self.config.stop_timeout(), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Action executor loop ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.stop_timeout_ms,
                    "Action executor did not stop in time, aborting"
                );
                abort.abort();
            }
        }
    }

    pub fn is_started(&self) -> bool {
        lock(&self.worker).is_some()
    }

    pub fn phase(&self) -> LoopPhase {
        self.lock().phase
    }

    pub fn current_group(&self) -> Option<ActionGroup> {
        self.lock().current.clone()
    }

    /// Keys (`type_parameter`) of the actions that can still be cancelled.
    pub fn running_action_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().running.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn run(&self, shutdown: CancellationToken) {
        info!("Action executor started");

        while !shutdown.is_cancelled() {
            let wait = match self.step(&shutdown).await {
                Ok(true) => continue,
                Ok(false) => self.config.poll_interval(),
                Err(e) => {
                    error!(error = %e, "Action group failed, backing off");
                    self.config.error_backoff()
                }
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.lock().phase = LoopPhase::Idle;
        info!("Action executor stopped");
    }

    /// Run one group if the feed has one. Returns whether a group was run.
    async fn step(&self, shutdown: &CancellationToken) -> Result<bool, ExecutionError> {
        {
            let mut state = self.lock();
            state.phase = LoopPhase::Dequeuing;
            state.deferred = Deferred::default();
        }

        let Some(group) = self.feed.next_action_group() else {
            self.lock().phase = LoopPhase::Idle;
            return Ok(false);
        };

        let (report, fault) = self.run_group(group, shutdown).await;
        self.feed.mark_action_group_completed(report);

        match fault {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    async fn run_group(
        &self,
        mut group: ActionGroup,
        shutdown: &CancellationToken,
    ) -> (GroupReport, Option<ExecutionError>) {
        let verbose = self.config.debug;
        let group_token = shutdown.child_token();
        let mut outcomes: Vec<Option<ActionOutcome>> = vec![None; group.actions.len()];
        let mut dispatch = Vec::new();

        {
            let mut state = self.lock();
            let deferred = std::mem::take(&mut state.deferred);
            state.phase = LoopPhase::Running;

            if deferred.all {
                group_token.cancel();
            } else {
                state.current = Some(group.clone());
                state.group_token = Some(group_token.clone());
            }

            for (idx, action) in group.actions.iter().enumerate() {
                let skipped = deferred.all
                    || conflict::interrupts(action.action_type, deferred.types.iter().copied());
                if skipped {
                    outcomes[idx] = Some(ActionOutcome::cancelled(action.clone()));
                    continue;
                }

                let key = running_key(&state.running, action);
                let token = group_token.child_token();
                state.running.insert(
                    key,
                    RunningAction {
                        action_type: action.action_type,
                        token: token.clone(),
                    },
                );
                dispatch.push((idx, action.clone(), token));
            }
        }

        lifecycle!(
            verbose,
            group_id = %group.id,
            actions = %group,
            dispatched = dispatch.len(),
            "Running action group"
        );

        let needs_focus = self.target.require_focus
            && dispatch.iter().any(|(_, a, _)| a.action_type.needs_focus());
        if needs_focus {
            if let Err(e) = self.ensure_focus(&group_token).await {
                let outcomes = fill_outcomes(outcomes, &group, |action| {
                    ActionOutcome::failed(action.clone(), e.to_string())
                });
                let report = self.finish_group(group, outcomes, &group_token);
                return (report, Some(ExecutionError::Focus(e)));
            }
        }

        let settings = RunSettings {
            attack_interval: self.config.attack_interval(),
            verbose,
        };
        let (layer_tx, mut layered) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            state.layer_tx = Some(layer_tx);
            state.focused = needs_focus;
        }

        let mut tasks = JoinSet::new();
        for (idx, action, token) in dispatch {
            self.spawn_action(&mut tasks, idx, action, token, settings);
        }

        let joined = self
            .join_actions(
                &mut tasks,
                &mut layered,
                &mut group,
                &mut outcomes,
                &group_token,
                settings,
            )
            .await;
        if joined.aborted {
            warn!(
                group_id = %group.id,
                timeout_ms = self.config.cleanup_timeout_ms,
                "Cleanup timed out, aborted remaining actions"
            );
        }

        let outcomes = fill_outcomes(outcomes, &group, |action| {
            if joined.aborted {
                ActionOutcome::cancelled(action.clone())
            } else {
                let detail = joined
                    .fault
                    .clone()
                    .unwrap_or_else(|| "no outcome reported".to_string());
                let error = ExecutionError::TaskAborted(detail);
                ActionOutcome::failed(action.clone(), error.to_string())
            }
        });

        (self.finish_group(group, outcomes, &group_token), None)
    }

    fn spawn_action(
        &self,
        tasks: &mut JoinSet<(usize, ActionOutcome)>,
        idx: usize,
        action: GameAction,
        token: CancellationToken,
        settings: RunSettings,
    ) {
        let driver = Arc::clone(&self.input);
        tasks.spawn(async move {
            let outcome = run_action(driver.as_ref(), &action, &token, &settings).await;
            (idx, outcome)
        });
    }

    /// Join every action task, spawning layered actions as they arrive.
    ///
    /// Once the group token is cancelled the remaining tasks get
    /// `cleanup_timeout_ms` to unwind before they are aborted.
    async fn join_actions(
        &self,
        tasks: &mut JoinSet<(usize, ActionOutcome)>,
        layered: &mut mpsc::UnboundedReceiver<Layered>,
        group: &mut ActionGroup,
        outcomes: &mut Vec<Option<ActionOutcome>>,
        group_token: &CancellationToken,
        settings: RunSettings,
    ) -> Joined {
        let mut deadline: Option<Instant> = None;
        let mut fault = None;

        loop {
            let joined = match deadline {
                None => tokio::select! {
                    joined = tasks.join_next() => joined,
                    Some((action, token)) = layered.recv() => {
                        self.spawn_action(tasks, outcomes.len(), action.clone(), token, settings);
                        group.actions.push(action);
                        outcomes.push(None);
                        continue;
                    }
                    _ = group_token.cancelled() => {
                        deadline = Some(Instant::now() + self.config.cleanup_timeout());
                        continue;
                    }
                },
                Some(at) => tokio::select! {
                    joined = tasks.join_next() => joined,
                    _ = tokio::time::sleep_until(at) => {
                        tasks.abort_all();
                        for (action, _) in self.close_layering(layered) {
                            outcomes.push(Some(ActionOutcome::cancelled(action.clone())));
                            group.actions.push(action);
                        }
                        return Joined { aborted: true, fault };
                    }
                },
            };

            match joined {
                Some(Ok((idx, outcome))) => outcomes[idx] = Some(outcome),
                Some(Err(e)) => {
                    error!(error = %e, "Action task did not finish");
                    fault = Some(e.to_string());
                }
                None => {
                    let late = self.close_layering(layered);
                    if late.is_empty() {
                        return Joined {
                            aborted: false,
                            fault,
                        };
                    }
                    for (action, token) in late {
                        self.spawn_action(tasks, outcomes.len(), action.clone(), token, settings);
                        group.actions.push(action);
                        outcomes.push(None);
                    }
                }
            }
        }
    }

    /// Stop accepting layered actions and return any still in the channel.
    fn close_layering(&self, layered: &mut mpsc::UnboundedReceiver<Layered>) -> Vec<Layered> {
        self.lock().layer_tx = None;
        layered.close();
        let mut late = Vec::new();
        while let Ok(item) = layered.try_recv() {
            late.push(item);
        }
        late
    }

    fn finish_group(
        &self,
        group: ActionGroup,
        outcomes: Vec<ActionOutcome>,
        group_token: &CancellationToken,
    ) -> GroupReport {
        {
            let mut state = self.lock();
            state.running.clear();
            state.current = None;
            state.group_token = None;
            state.layer_tx = None;
            state.focused = false;
            state.phase = LoopPhase::Idle;
        }

        let interrupted = group_token.is_cancelled()
            || outcomes.iter().any(|o| o.state == ActionState::Cancelled);

        let report = GroupReport {
            group,
            outcomes,
            interrupted,
        };
        lifecycle!(
            self.config.debug,
            group_id = %report.group.id,
            completed = report.count(ActionState::Completed),
            cancelled = report.count(ActionState::Cancelled),
            failed = report.count(ActionState::Failed),
            "Action group done"
        );
        report
    }

    async fn ensure_focus(&self, token: &CancellationToken) -> Result<(), InputError> {
        if self.focus.is_target_active() {
            return Ok(());
        }
        info!(title = %self.target.window_title, "Target window not focused, activating");
        self.focus.activate_target()?;
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(self.target.focus_settle()) => {}
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ExecutorState> {
        lock(&self.state)
    }
}

impl Interrupter for ActionExecutor {
    fn interrupt_all_actions(&self) -> usize {
        let mut state = self.lock();
        if state.phase == LoopPhase::Dequeuing {
            state.deferred.all = true;
        }
        if let Some(token) = state.group_token.take() {
            token.cancel();
        }
        let count = state.running.len();
        for (_, action) in state.running.drain() {
            action.token.cancel();
        }
        state.current = None;

        if count > 0 {
            info!(count, "Interrupted all running actions");
        }
        count
    }

    fn interrupt_conflicting_actions(&self, group: &ActionGroup) -> usize {
        let incoming: Vec<ActionType> = group.types().collect();
        let mut state = self.lock();
        if state.phase == LoopPhase::Dequeuing {
            state.deferred.types.extend(incoming.iter().copied());
            return 0;
        }

        let keys: Vec<String> = state
            .running
            .iter()
            .filter(|(_, r)| conflict::interrupts(r.action_type, incoming.iter().copied()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            if let Some(action) = state.running.remove(key) {
                action.token.cancel();
            }
        }

        if !keys.is_empty() {
            info!(keys = ?keys, incoming = %group, "Interrupted conflicting actions");
        }
        keys.len()
    }
}

impl ActionLayering for ActionExecutor {
    fn layer_onto_running(&self, group: &ActionGroup) -> bool {
        let needs_focus =
            self.target.require_focus && group.types().any(|t| t.needs_focus());
        let mut state = self.lock();
        let (Some(tx), Some(group_token)) = (state.layer_tx.clone(), state.group_token.clone())
        else {
            return false;
        };
        if state.phase != LoopPhase::Running
            || group_token.is_cancelled()
            || tx.is_closed()
            || (needs_focus && !state.focused)
        {
            return false;
        }

        for action in &group.actions {
            let token = group_token.child_token();
            if tx.send((action.clone(), token.clone())).is_err() {
                warn!(action = %action, "Running group closed while layering");
                break;
            }
            let key = running_key(&state.running, action);
            state.running.insert(
                key,
                RunningAction {
                    action_type: action.action_type,
                    token,
                },
            );
        }
        let running_id = state.current.as_mut().map(|current| {
            current.actions.extend(group.actions.iter().cloned());
            current.id
        });

        lifecycle!(
            self.config.debug,
            group_id = ?running_id,
            actions = %group,
            "Layered actions onto running group"
        );
        true
    }
}

/// Key for `action` in the running map, suffixed when already taken.
fn running_key(running: &HashMap<String, RunningAction>, action: &GameAction) -> String {
    let base = action.key();
    let mut key = base.clone();
    let mut n = 1;
    while running.contains_key(&key) {
        key = format!("{}#{}", base, n);
        n += 1;
    }
    key
}

/// Outcomes in action order, using `missing` for slots no task filled.
fn fill_outcomes(
    outcomes: Vec<Option<ActionOutcome>>,
    group: &ActionGroup,
    missing: impl Fn(&GameAction) -> ActionOutcome,
) -> Vec<ActionOutcome> {
    outcomes
        .into_iter()
        .zip(group.actions.iter())
        .map(|(outcome, action)| outcome.unwrap_or_else(|| missing(action)))
        .collect()
}

// Executor state is plain data, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
