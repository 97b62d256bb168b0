//! C FFI layer for rayneo.
//!
//! Provides an opaque session handle for C/C++ and JNI consumers.
//! The generated C header is written to `include/rayneo.h` by cbindgen.

use crate::config::StreamConfig;
use crate::error::LastError;
use crate::session::Session;
use crate::types::Profile;
use std::ffi::{c_char, c_int};

/// Process-wide last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque session handle for C consumers.
pub struct RnSession(Session);

/// Create a session.
/// `profile`: 0 = raw IMU (64-byte reports), 1 = firmware pose (unverified layout),
/// -1 = take everything from the `RAYNEO_*` environment variables.
#[no_mangle]
pub extern "C" fn rn_session_new(profile: c_int) -> *mut RnSession {
    let config = match profile {
        0 => StreamConfig::for_profile(Profile::RawImu64),
        1 => StreamConfig::for_profile(Profile::FirmwarePose16),
        _ => StreamConfig::from_env(),
    };
    Box::into_raw(Box::new(RnSession(Session::new(config))))
}

/// Stop any stream and free the session.
///
/// # Safety
/// `session` must be a pointer returned by `rn_session_new`, or null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_free(session: *mut RnSession) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Open the device and start streaming.
/// Returns 0 on success, -1 on error (check `rn_last_error()`).
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_start(session: *mut RnSession) -> c_int {
    if session.is_null() {
        return -1;
    }
    let session = &mut *session;
    match session.0.start_device() {
        Ok(()) => {
            LAST_ERROR.clear();
            0
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            -1
        }
    }
}

/// Stop streaming. Blocks at most the configured join grace period.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_stop(session: *mut RnSession) {
    if session.is_null() {
        return;
    }
    let session = &mut *session;
    session.0.stop();
}

/// Reset the orientation to identity.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_reset(session: *const RnSession) {
    if session.is_null() {
        return;
    }
    let session = &*session;
    session.0.reset();
}

/// Copy the current orientation as a column-major 4x4 matrix into `out`.
/// Returns 0 on success, -1 on null arguments.
///
/// # Safety
/// `session` must be a valid session pointer or null; `out` must point to
/// 16 writable floats or be null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_orientation(session: *const RnSession, out: *mut f32) -> c_int {
    if session.is_null() || out.is_null() {
        return -1;
    }
    let session = &*session;
    let m = session.0.orientation().to_mat4();
    std::ptr::copy_nonoverlapping(m.as_ptr(), out, m.len());
    0
}

/// Current stream state: 0 = Idle, 1 = Enabling, 2 = Streaming, 3 = Stopped, -1 = null.
///
/// # Safety
/// `session` must be a valid session pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn rn_session_state(session: *const RnSession) -> c_int {
    if session.is_null() {
        return -1;
    }
    let session = &*session;
    session.0.state() as c_int
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next rayneo API call.
#[no_mangle]
pub extern "C" fn rn_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}
