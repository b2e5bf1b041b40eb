//! Keyboard/mouse injection and window focus via the Win32 API.
//!
//! On Windows, inputs are sent with `SendInput` using hardware scan codes so
//! games reading raw keyboard state see them, and focus is managed with
//! `EnumWindows` / `SetForegroundWindow`.
//!
//! On non-Windows, both services are stubs that return `InputError::Unsupported`.

#[cfg(not(target_os = "windows"))]
use tracing::warn;

use crate::error::InputError;
use crate::keys::{GameInput, KeyBindings};
use crate::{FocusControl, InputDriver};

/// Input driver that injects real keyboard and mouse events.
pub struct WindowsInputDriver {
    bindings: KeyBindings,
}

impl WindowsInputDriver {
    /// Create a driver using the given key bindings.
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    /// Get the key bindings in use.
    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}

/// Focus control for the game window, matched by title substring.
pub struct WindowsFocus {
    window_title: String,
}

impl WindowsFocus {
    /// Create a focus controller for windows whose title contains `window_title`.
    pub fn new(window_title: impl Into<String>) -> Self {
        Self {
            window_title: window_title.into(),
        }
    }

    pub fn window_title(&self) -> &str {
        &self.window_title
    }
}

// =============================================================================
// Windows implementation
// =============================================================================

#[cfg(target_os = "windows")]
impl WindowsInputDriver {
    fn send_key(&self, input: GameInput, up: bool) -> Result<(), InputError> {
        use crate::keys::KeyCode;
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
            MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN,
            MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP,
        };

        match self.bindings.resolve(input)? {
            KeyCode::Key(vk) => send_inputs(&[keyboard_input(vk, up)]),
            KeyCode::MouseLeft => send_inputs(&[mouse_input(
                0,
                0,
                if up { MOUSEEVENTF_LEFTUP } else { MOUSEEVENTF_LEFTDOWN },
            )]),
            KeyCode::MouseRight => send_inputs(&[mouse_input(
                0,
                0,
                if up { MOUSEEVENTF_RIGHTUP } else { MOUSEEVENTF_RIGHTDOWN },
            )]),
            KeyCode::MouseMiddle => send_inputs(&[mouse_input(
                0,
                0,
                if up { MOUSEEVENTF_MIDDLEUP } else { MOUSEEVENTF_MIDDLEDOWN },
            )]),
        }
    }
}

#[cfg(target_os = "windows")]
impl InputDriver for WindowsInputDriver {
    fn hold_down(&self, input: GameInput) -> Result<(), InputError> {
        tracing::trace!(input = %input, "Key down");
        self.send_key(input, false)
    }

    fn release(&self, input: GameInput) -> Result<(), InputError> {
        tracing::trace!(input = %input, "Key up");
        self.send_key(input, true)
    }

    fn move_mouse_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::MOUSEEVENTF_MOVE;

        tracing::trace!(dx, dy, "Mouse move");
        send_inputs(&[mouse_input(dx, dy, MOUSEEVENTF_MOVE)])
    }
}

#[cfg(target_os = "windows")]
fn keyboard_input(vk: u16, up: bool) -> windows_sys::Win32::UI::Input::KeyboardAndMouse::INPUT {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        MapVirtualKeyW, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
        KEYEVENTF_SCANCODE, MAPVK_VK_TO_VSC,
    };

    let scan = unsafe { MapVirtualKeyW(vk as u32, MAPVK_VK_TO_VSC) } as u16;
    let flags = if up {
        KEYEVENTF_SCANCODE | KEYEVENTF_KEYUP
    } else {
        KEYEVENTF_SCANCODE
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

#[cfg(target_os = "windows")]
fn mouse_input(
    dx: i32,
    dy: i32,
    flags: windows_sys::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS,
) -> windows_sys::Win32::UI::Input::KeyboardAndMouse::INPUT {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        INPUT, INPUT_0, INPUT_MOUSE, MOUSEINPUT,
    };

    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

#[cfg(target_os = "windows")]
fn send_inputs(
    inputs: &[windows_sys::Win32::UI::Input::KeyboardAndMouse::INPUT],
) -> Result<(), InputError> {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{SendInput, INPUT};

    let sent = unsafe {
        SendInput(
            inputs.len() as u32,
            inputs.as_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };

    if sent as usize != inputs.len() {
        return Err(InputError::PartialSend {
            sent,
            expected: inputs.len() as u32,
        });
    }
    Ok(())
}

#[cfg(target_os = "windows")]
impl FocusControl for WindowsFocus {
    fn is_target_active(&self) -> bool {
        use windows_sys::Win32::UI::WindowsAndMessaging::GetForegroundWindow;

        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd == 0 {
            return false;
        }
        unsafe { window_title(hwnd) }.contains(&self.window_title)
    }

    fn activate_target(&self) -> Result<(), InputError> {
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            IsIconic, SetForegroundWindow, ShowWindow, SW_RESTORE,
        };

        let hwnd = unsafe { find_window(&self.window_title) }
            .ok_or_else(|| InputError::WindowNotFound(self.window_title.clone()))?;

        unsafe {
            if IsIconic(hwnd) != 0 {
                ShowWindow(hwnd, SW_RESTORE);
            }
            if SetForegroundWindow(hwnd) == 0 {
                return Err(InputError::Focus(format!(
                    "SetForegroundWindow refused for '{}'",
                    self.window_title
                )));
            }
        }

        tracing::debug!(title = %self.window_title, "Target window activated");
        Ok(())
    }
}

#[cfg(target_os = "windows")]
unsafe fn window_title(hwnd: windows_sys::Win32::Foundation::HWND) -> String {
    use windows_sys::Win32::UI::WindowsAndMessaging::GetWindowTextW;

    let mut buf = [0u16; 512];
    let len = GetWindowTextW(hwnd, buf.as_mut_ptr(), 512);
    if len > 0 {
        String::from_utf16_lossy(&buf[..len as usize])
    } else {
        String::new()
    }
}

#[cfg(target_os = "windows")]
unsafe fn find_window(title: &str) -> Option<windows_sys::Win32::Foundation::HWND> {
    use windows_sys::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows_sys::Win32::UI::WindowsAndMessaging::{EnumWindows, IsWindowVisible};

    struct Search<'a> {
        title: &'a str,
        found: Option<HWND>,
    }

    unsafe extern "system" fn visit(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let search = &mut *(lparam as *mut Search);
        if IsWindowVisible(hwnd) != 0 && window_title(hwnd).contains(search.title) {
            search.found = Some(hwnd);
            return 0;
        }
        1
    }

    let mut search = Search { title, found: None };
    EnumWindows(Some(visit), &mut search as *mut Search as LPARAM);
    search.found
}

// =============================================================================
// Non-Windows stubs
// =============================================================================

#[cfg(not(target_os = "windows"))]
impl InputDriver for WindowsInputDriver {
    fn hold_down(&self, input: GameInput) -> Result<(), InputError> {
        warn!(input = %input, "WindowsInputDriver: SendInput not available on this platform");
        Err(InputError::Unsupported)
    }

    fn release(&self, input: GameInput) -> Result<(), InputError> {
        warn!(input = %input, "WindowsInputDriver: SendInput not available on this platform");
        Err(InputError::Unsupported)
    }

    fn move_mouse_by(&self, dx: i32, dy: i32) -> Result<(), InputError> {
        warn!(dx, dy, "WindowsInputDriver: SendInput not available on this platform");
        Err(InputError::Unsupported)
    }
}

#[cfg(not(target_os = "windows"))]
impl FocusControl for WindowsFocus {
    fn is_target_active(&self) -> bool {
        false
    }

    fn activate_target(&self) -> Result<(), InputError> {
        warn!(title = %self.window_title, "WindowsFocus: window activation not available on this platform");
        Err(InputError::Unsupported)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
