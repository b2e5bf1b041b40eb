//! actscript input crate - hardware input and window focus capabilities.
//!
//! Provides the `InputDriver` and `FocusControl` traits the action engine
//! drives, recording mocks for tests and dry runs, and a Windows
//! implementation built on `SendInput` and the foreground-window APIs.

pub mod error;
pub mod keys;
pub mod windows_input;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

pub use error::InputError;
pub use keys::{GameInput, KeyBindings, KeyCode};
pub use windows_input::{WindowsFocus, WindowsInputDriver};

/// Hardware input capability.
///
/// Implementations translate symbolic inputs into key and mouse events. Every
/// `hold_down` issued by the engine is paired with a `release`, including on
/// cancellation.
pub trait InputDriver: Send + Sync {
    /// Push the input down and leave it held.
    fn hold_down(&self, input: GameInput) -> Result<(), InputError>;

    /// Release a held input.
    fn release(&self, input: GameInput) -> Result<(), InputError>;

    /// Tap the input: down immediately followed by up.
    fn press(&self, input: GameInput) -> Result<(), InputError> {
        self.hold_down(input)?;
        self.release(input)
    }

    /// Move the mouse by a relative offset in pixels.
    fn move_mouse_by(&self, dx: i32, dy: i32) -> Result<(), InputError>;
}

/// Window focus capability.
pub trait FocusControl: Send + Sync {
    /// Whether the game window currently has input focus.
    fn is_target_active(&self) -> bool;

    /// Bring the game window to the foreground.
    fn activate_target(&self) -> Result<(), InputError>;
}

/// One event observed by the `MockInputDriver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Down(GameInput),
    Up(GameInput),
    Press(GameInput),
    MouseMove(i32, i32),
}

/// Mock input driver that records every event instead of touching hardware.
///
/// Used by the engine tests and by `--dry-run`. Inputs listed with
/// `fail_on` return `InputError::Device` to exercise failure paths.
#[derive(Debug, Default)]
pub struct MockInputDriver {
    events: Mutex<Vec<InputEvent>>,
    failing: Mutex<Vec<GameInput>>,
}

impl MockInputDriver {
    /// Create a new mock with no recorded events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `input` fail.
    pub fn fail_on(&self, input: GameInput) {
        lock(&self.failing).push(input);
    }

    /// Snapshot of all recorded events in order.
    pub fn events(&self) -> Vec<InputEvent> {
        lock(&self.events).clone()
    }

    /// Number of recorded events matching `event`.
    pub fn count(&self, event: &InputEvent) -> usize {
        lock(&self.events).iter().filter(|e| *e == event).count()
    }

    /// Inputs that have been pushed down more often than released.
    pub fn held(&self) -> Vec<GameInput> {
        let events = lock(&self.events);
        let mut held: Vec<GameInput> = Vec::new();
        for event in events.iter() {
            match event {
                InputEvent::Down(input) => held.push(*input),
                InputEvent::Up(input) => {
                    if let Some(pos) = held.iter().position(|h| h == input) {
                        held.remove(pos);
                    }
                }
                _ => {}
            }
        }
        held
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }

    fn record(&self, input: Option<GameInput>, event: InputEvent) -> Result<(), InputError> {
        if let Some(input) = input {
            if lock(&self.failing).contains(&input) {
                return Err(InputError::Device(format!("mock failure on {}", input)));
            }
        }
        tracing::trace!(event = ?event, "Mock input");
        lock(&self.events).push(event);
        Ok(())
    }
}

impl InputDriver for MockInputDriver {
    fn hold_down(&self, input: GameInput) -> Result<(), InputError> {
        self.record(Some(input), InputEvent::Down(input))
    }

    fn release(&self, input: GameInput) -> Result<(), InputError> {
        self.record(Some(input), InputEvent::Up(input))
    }

    fn press(&self, input: GameInput) -> Result<(), InputError> {
        self.record(Some(input), InputEvent::Press(input))
    }

    fn move_mouse_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        self.record(None, InputEvent::MouseMove(dx, dy))
    }
}

/// Mock focus control with a switchable "active" flag.
#[derive(Debug)]
pub struct MockFocus {
    active: AtomicBool,
    activations: AtomicUsize,
    fail: AtomicBool,
}

impl MockFocus {
    /// Create a mock whose target starts active or inactive.
    pub fn new(active: bool) -> Self {
        Self {
            active: AtomicBool::new(active),
            activations: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Simulate the user alt-tabbing away or back.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Make `activate_target` fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// How many times `activate_target` was called.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }
}

impl Default for MockFocus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FocusControl for MockFocus {
    fn is_target_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn activate_target(&self) -> Result<(), InputError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(InputError::WindowNotFound("mock".to_string()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// Recorded events are plain data, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
