//! FFI bindings for Fieldguide
//!
//! C-compatible functions for driving an interview session from other
//! languages. Strings cross the boundary as null-terminated UTF-8. Strings
//! returned to the caller are allocated here and must be released with
//! `fg_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::clock::SystemClock;
use crate::config::SessionConfig;
use crate::session::Session;
use crate::types::{AnswerValue, NudgeAction, ReadingLevel};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Borrow the session behind a handle, recording an error for NULL
unsafe fn session_mut<'a>(handle: *mut FgSessionHandle) -> Option<&'a mut Session> {
    if handle.is_null() {
        set_last_error("Null session pointer");
        return None;
    }
    Some(&mut (*handle).session)
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Opaque handle to an interview session
pub struct FgSessionHandle {
    session: Session,
}

/// Create a session.
///
/// # Safety
/// - `config_json` must be NULL (default policy) or a valid null-terminated C string
///   holding a `SessionConfig` JSON object.
/// - Returns a pointer that must be freed with `fg_session_free`.
/// - Returns NULL on error; call `fg_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fg_session_new(config_json: *const c_char) -> *mut FgSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        SessionConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match SessionConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match Session::with_config(config, SystemClock) {
        Ok(session) => Box::into_raw(Box::new(FgSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `handle` must be a pointer returned by `fg_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fg_session_free(handle: *mut FgSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Reset a session to its initial state.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn fg_session_reset(handle: *mut FgSessionHandle) -> i32 {
    clear_last_error();

    match session_mut(handle) {
        Some(session) => {
            session.reset();
            0
        }
        None => -1,
    }
}

// ============================================================================
// UI events
// ============================================================================

/// Note that a question received focus.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - `question_id` must be a valid null-terminated C string.
/// - Returns 1 if the focus time was recorded, 0 if it was already set, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn fg_session_note_focus(
    handle: *mut FgSessionHandle,
    question_id: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(session) = session_mut(handle) else {
        return -1;
    };

    let id = match cstr_to_string(question_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid question_id string pointer");
            return -1;
        }
    };

    i32::from(session.note_focus(&id))
}

/// Write an answer and return the signals it raised as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - `question_id` and `value_json` must be valid null-terminated C strings.
///   `value_json` is an answer object such as `{"kind":"number","value":3}`.
/// - Returns a newly allocated string that must be freed with `fg_free_string`.
/// - Returns NULL on error; call `fg_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fg_session_write_answer(
    handle: *mut FgSessionHandle,
    question_id: *const c_char,
    value_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(session) = session_mut(handle) else {
        return ptr::null_mut();
    };

    let id = match cstr_to_string(question_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid question_id string pointer");
            return ptr::null_mut();
        }
    };

    let value_str = match cstr_to_string(value_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid value string pointer");
            return ptr::null_mut();
        }
    };

    let value: AnswerValue = match serde_json::from_str(&value_str) {
        Ok(v) => v,
        Err(e) => {
            set_last_error(&format!("Invalid answer value: {e}"));
            return ptr::null_mut();
        }
    };

    let signals = session.write_answer(&id, value);
    match serde_json::to_string(&signals) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Change the reading level.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - `level` must be a valid null-terminated C string: `simple`, `standard` or `clinical`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn fg_session_set_reading_level(
    handle: *mut FgSessionHandle,
    level: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(session) = session_mut(handle) else {
        return -1;
    };

    let level = match cstr_to_string(level).map(|s| s.parse::<ReadingLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            set_last_error(&e.to_string());
            return -1;
        }
        None => {
            set_last_error("Invalid level string pointer");
            return -1;
        }
    };

    session.set_reading_level(level);
    0
}

/// Dismiss the shown nudge.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - `action` must be a valid null-terminated C string: `simplify` or `pause`.
/// - Returns 1 if a nudge was dismissed, 0 if none was shown, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn fg_session_dismiss_nudge(
    handle: *mut FgSessionHandle,
    action: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(session) = session_mut(handle) else {
        return -1;
    };

    let action = match cstr_to_string(action).map(|s| s.parse::<NudgeAction>()) {
        Some(Ok(action)) => action,
        Some(Err(e)) => {
            set_last_error(&e.to_string());
            return -1;
        }
        None => {
            set_last_error("Invalid action string pointer");
            return -1;
        }
    };

    match session.dismiss_nudge(action) {
        Some(_) => 1,
        None => 0,
    }
}

/// Serialize the session state to JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `fg_session_new`.
/// - Returns a newly allocated string that must be freed with `fg_free_string`.
/// - Returns NULL on error; call `fg_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fg_session_snapshot(handle: *mut FgSessionHandle) -> *mut c_char {
    clear_last_error();

    let Some(session) = session_mut(handle) else {
        return ptr::null_mut();
    };

    match serde_json::to_string(&session.snapshot()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Fieldguide functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Fieldguide function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fg_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Fieldguide function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn fg_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn fg_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
