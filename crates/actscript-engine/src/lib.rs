//! Action scheduling and execution engine for actscript.
//!
//! Parses action scripts into groups of simultaneous game actions, queues
//! them under a replace or merge policy, and drives a single execution loop
//! that runs each group's actions concurrently with per-action cancellation.

pub mod conflict;
pub mod environment;
pub mod error;
pub mod executor;
pub mod parser;
pub mod queue;
pub mod types;

pub use environment::ActionEnvironment;
pub use error::{ExecutionError, ParseError, QueueError, ValidationError};
pub use executor::{ActionExecutor, ActionFeed, ActionSource, Completer, LoopPhase};
pub use parser::{format_script, parse, parse_and_validate, parse_script, ParsedScript};
pub use queue::{ActionLayering, ActionQueueManager, ExecutorControl, Interrupter};
pub use types::{
    ActionGroup, ActionOutcome, ActionState, ActionType, AttackMode, FinishedGroup, GameAction,
    GroupReport, QueueStatus,
};
