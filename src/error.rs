use std::fmt;

/// Errors that can occur when driving the glasses' sensor stream.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("Device not found (VID={vid:04X} PID={pid:04X})")]
    NotFound { vid: u16, pid: u16 },

    #[error("USB access permission not granted")]
    PermissionDenied,

    #[error("No interface with a usable IN endpoint")]
    NoSuitableInterface,

    #[error("Failed to claim interface: {0}")]
    ClaimFailed(String),

    #[error("IMU enable command failed: {0}")]
    EnableFailed(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Stream stopped after {0} consecutive I/O errors")]
    IoErrorThreshold(u32),

    #[error("Sensor stream stopped")]
    StreamStopped,

    #[error("Failed to spawn reader thread: {0}")]
    ThreadSpawn(String),
}

impl TrackerError {
    /// Map a libusb error raised while opening a device handle.
    pub(crate) fn from_open(err: rusb::Error, vid: u16, pid: u16) -> Self {
        match err {
            rusb::Error::Access => TrackerError::PermissionDenied,
            rusb::Error::NoDevice | rusb::Error::NotFound => TrackerError::NotFound { vid, pid },
            other => TrackerError::Usb(other),
        }
    }

    /// Map a libusb error raised by a data transfer. Timeouts stay routine.
    pub(crate) fn from_transfer(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => TrackerError::Timeout,
            other => TrackerError::Usb(other),
        }
    }
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &TrackerError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}
