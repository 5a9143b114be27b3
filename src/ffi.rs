//! FFI bindings for Punch Flux
//!
//! This module provides C-compatible functions for driving a punch tracker from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `punch_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::adapters::{MoveNetAdapter, NamedJointAdapter, PoseFrameAdapter};
use crate::error::TrackerError;
use crate::pipeline::PunchTracker;

/// Frames keyed by joint name (`{"timestamp_ms", "keypoints": {"left_wrist": ..}}`)
pub const PUNCH_FRAME_FORMAT_NAMED: i32 = 0;
/// MoveNet 17-keypoint frames (`{"timestamp_ms", "keypoints": [[y, x, score], ..]}`)
pub const PUNCH_FRAME_FORMAT_MOVENET: i32 = 1;

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

/// Serialize a result to a C string, recording the error on failure
fn json_result<T: serde::Serialize>(result: Result<T, TrackerError>) -> *mut c_char {
    match result.and_then(|value| serde_json::to_string(&value).map_err(TrackerError::from)) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Map a unit result to a status code
fn status(result: Result<(), TrackerError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Opaque handle to a PunchTracker
pub struct PunchTrackerHandle {
    tracker: PunchTracker,
}

/// Create a tracker with default configuration and built-in thresholds.
///
/// # Safety
/// - Returns a pointer to a newly allocated tracker.
/// - Must be freed with `punch_tracker_free`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_new() -> *mut PunchTrackerHandle {
    clear_last_error();
    Box::into_raw(Box::new(PunchTrackerHandle {
        tracker: PunchTracker::new(),
    }))
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_free(tracker: *mut PunchTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Process one frame and return the accepted punches as a JSON array.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - `format` is one of the `PUNCH_FRAME_FORMAT_*` constants.
/// - Returns a newly allocated string that must be freed with `punch_free_string`.
/// - Returns NULL on error; call `punch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_process_frame(
    tracker: *mut PunchTrackerHandle,
    frame_json: *const c_char,
    format: i32,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    let handle = &mut *tracker;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let frame = match format {
        PUNCH_FRAME_FORMAT_NAMED => NamedJointAdapter.parse_frame(&json_str),
        PUNCH_FRAME_FORMAT_MOVENET => MoveNetAdapter.parse_frame(&json_str),
        other => {
            set_last_error(&format!("Unknown frame format: {other}"));
            return ptr::null_mut();
        }
    };

    json_result(frame.and_then(|f| handle.tracker.process_frame(&f)))
}

/// Current session stats as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
/// - Returns a newly allocated string that must be freed with `punch_free_string`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_stats(tracker: *mut PunchTrackerHandle) -> *mut c_char {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    json_result(Ok((*tracker).tracker.stats()))
}

/// Start a tracking session. Returns 0 on success, non-zero on error.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_start_session(tracker: *mut PunchTrackerHandle) -> i32 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    status((*tracker).tracker.start_session())
}

/// Pause the running session, keeping its counters. Returns 0 on success.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_pause_session(tracker: *mut PunchTrackerHandle) -> i32 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    status((*tracker).tracker.pause_session())
}

/// Resume a paused session. Returns 0 on success, non-zero on error.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_resume_session(tracker: *mut PunchTrackerHandle) -> i32 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    status((*tracker).tracker.resume_session())
}

/// Stop the running or paused session and return its summary as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
/// - Returns a newly allocated string that must be freed with `punch_free_string`.
/// - Returns NULL on error; call `punch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_stop_session(
    tracker: *mut PunchTrackerHandle,
) -> *mut c_char {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    json_result((*tracker).tracker.stop_session())
}

/// Zero the counters and return both arms to Idle. Returns 0 on success.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_reset(tracker: *mut PunchTrackerHandle) -> i32 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    (*tracker).tracker.reset();
    0
}

/// Load a calibration profile from JSON. Returns 0 on success, non-zero on error.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
/// - `json` must be a valid null-terminated C string.
/// - On error, call `punch_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_load_profile(
    tracker: *mut PunchTrackerHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }
    let handle = &mut *tracker;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    status(handle.tracker.load_profile(&json_str))
}

/// Save the thresholds in effect to JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
/// - Returns a newly allocated string that must be freed with `punch_free_string`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_save_profile(
    tracker: *mut PunchTrackerHandle,
) -> *mut c_char {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }
    match (*tracker).tracker.save_profile() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Step sensitivity up (`direction > 0`) or down (`direction < 0`).
///
/// Returns the new sensitivity, or a negative value on error.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `punch_tracker_new`.
#[no_mangle]
pub unsafe extern "C" fn punch_tracker_adjust_sensitivity(
    tracker: *mut PunchTrackerHandle,
    direction: i32,
) -> f64 {
    clear_last_error();
    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1.0;
    }
    let handle = &mut *tracker;
    match direction.signum() {
        1 => handle.tracker.increase_sensitivity(),
        -1 => handle.tracker.decrease_sensitivity(),
        _ => handle.tracker.config().sensitivity,
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Punch Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Punch Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn punch_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Punch Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn punch_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free it.
#[no_mangle]
pub unsafe extern "C" fn punch_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}
