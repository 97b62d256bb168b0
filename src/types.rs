use crate::descriptor::InterfaceInfo;
use std::fmt;

/// One decoded IMU report from the raw 64-byte stream.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Accelerometer [x, y, z] as reported by the device.
    pub accel: [f32; 3],
    /// Gyroscope [x, y, z] in degrees per second.
    pub gyro_dps: [f32; 3],
    /// Gyroscope [x, y, z] in radians per second (derived from `gyro_dps`).
    pub gyro_rad: [f32; 3],
    /// Magnetometer [x, y, z].
    pub magnet: [f32; 3],
    /// Sensor die temperature.
    pub temperature: f32,
    /// Free-running device tick, wraps at 2^32.
    pub tick: u32,
    /// Proximity sensor reading.
    pub psensor: f32,
    /// Ambient light sensor reading.
    pub lsensor: f32,
    pub valid: bool,
}

/// Orientation computed by the device firmware, in degrees.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose3DoF {
    pub yaw_deg: f32,
    pub pitch_deg: f32,
    pub roll_deg: f32,
}

impl fmt::Display for Pose3DoF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.yaw_deg.round() as i32,
            self.pitch_deg.round() as i32,
            self.roll_deg.round() as i32
        )
    }
}

/// Packet/endpoint profile of a firmware family.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// 64-byte raw IMU reports (sync 0x99, type 0x65) on a HID interrupt endpoint.
    RawImu64 = 0,
    /// Firmware-computed yaw/pitch/roll as int16 on any bulk/interrupt IN endpoint.
    ///
    /// The byte layout of this profile has not been verified against hardware.
    FirmwarePose16 = 1,
}

/// How reports are pulled off the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Synchronous bulk/interrupt transfer on the IN endpoint (libusb).
    Stream,
    /// OS-queued interrupt reports, waited on with a timeout (hidapi).
    Queued,
    /// HID GET_REPORT control transfer polling (libusb).
    GetReport,
}

/// Acquisition loop state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle = 0,
    Enabling = 1,
    Streaming = 2,
    Stopped = 3,
}

impl StreamState {
    pub(crate) fn from_u8(v: u8) -> StreamState {
        match v {
            1 => StreamState::Enabling,
            2 => StreamState::Streaming,
            3 => StreamState::Stopped,
            _ => StreamState::Idle,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Idle => "Idle",
            StreamState::Enabling => "Enabling",
            StreamState::Streaming => "Streaming",
            StreamState::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// Why the acquisition loop reached `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was requested.
    Cancelled,
    /// The enable handshake could not be issued.
    EnableFailed(String),
    /// Consecutive read errors reached the configured threshold.
    IoErrorThreshold(u32),
    /// The reader thread exited without reporting (panicked).
    Aborted,
    /// The reader thread missed the join grace period and was detached.
    Unresponsive,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => f.write_str("stopped"),
            StopReason::EnableFailed(msg) => write!(f, "IMU enable failed: {}", msg),
            StopReason::IoErrorThreshold(n) => {
                write!(f, "stream stopped after {} consecutive I/O errors", n)
            }
            StopReason::Aborted => f.write_str("reader thread aborted"),
            StopReason::Unresponsive => f.write_str("reader thread unresponsive, abandoned"),
        }
    }
}

/// Diagnostic counters snapshot for a running stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets: u64,
    pub rejected: u64,
    pub timeouts: u64,
    pub io_errors: u64,
}

/// A matching device found on the bus.
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
    pub interfaces: Vec<InterfaceInfo>,
}
