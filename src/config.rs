use crate::protocol::{self, PoseLayout};
use crate::types::{Profile, ReadStrategy};
use std::time::Duration;

/// Shortest per-read wait. libusb treats a zero timeout as "wait forever".
pub const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Everything a session needs to open the device and run the reader loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub profile: Profile,
    pub strategy: ReadStrategy,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Per-read wait; bounds how fast `stop()` is observed. Never below
    /// [`MIN_READ_TIMEOUT`] once the stream starts.
    pub read_timeout: Duration,
    /// Open/claim/enable transfers.
    pub control_timeout: Duration,
    /// Consecutive read errors that end the stream.
    pub max_consecutive_errors: u32,
    /// How long `stop()` waits for the reader thread before abandoning it.
    pub join_grace: Duration,
    /// Send HID SET_IDLE before enabling the stream.
    pub set_idle: bool,
    pub pose_layout: PoseLayout,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::for_profile(Profile::RawImu64)
    }
}

impl StreamConfig {
    pub fn for_profile(profile: Profile) -> StreamConfig {
        let (read_timeout_ms, set_idle) = match profile {
            Profile::RawImu64 => (100, false),
            Profile::FirmwarePose16 => (50, true),
        };
        StreamConfig {
            profile,
            strategy: ReadStrategy::Stream,
            vendor_id: protocol::VID,
            product_id: protocol::PID,
            read_timeout: Duration::from_millis(read_timeout_ms),
            control_timeout: Duration::from_millis(1000),
            max_consecutive_errors: 32,
            join_grace: Duration::from_millis(1000),
            set_idle,
            pose_layout: PoseLayout::default(),
        }
    }

    /// Defaults for `RAYNEO_PROFILE`, then per-field `RAYNEO_*` overrides.
    pub fn from_env() -> StreamConfig {
        let profile = match read_env_string("RAYNEO_PROFILE", "raw-imu64").as_str() {
            "raw-imu64" | "raw" => Profile::RawImu64,
            "firmware-pose16" | "pose" => Profile::FirmwarePose16,
            other => {
                log::warn!(
                    "Unknown RAYNEO_PROFILE='{}', using raw-imu64 (supported: raw-imu64|firmware-pose16)",
                    other
                );
                Profile::RawImu64
            }
        };
        let mut cfg = StreamConfig::for_profile(profile);

        cfg.strategy = match read_env_string("RAYNEO_READ_STRATEGY", "stream").as_str() {
            "stream" => ReadStrategy::Stream,
            "queued" | "hidapi" => ReadStrategy::Queued,
            "get-report" => ReadStrategy::GetReport,
            other => {
                log::warn!(
                    "Unknown RAYNEO_READ_STRATEGY='{}', using stream (supported: stream|queued|get-report)",
                    other
                );
                ReadStrategy::Stream
            }
        };
        // GET_REPORT polling targets the HID variant, which wants SET_IDLE first.
        if cfg.strategy == ReadStrategy::GetReport {
            cfg.set_idle = true;
        }

        cfg.vendor_id = read_env_u16("RAYNEO_VID", cfg.vendor_id);
        cfg.product_id = read_env_u16("RAYNEO_PID", cfg.product_id);
        cfg.read_timeout = Duration::from_millis(read_env_u64(
            "RAYNEO_READ_TIMEOUT_MS",
            cfg.read_timeout.as_millis() as u64,
        ))
        .max(MIN_READ_TIMEOUT);
        cfg.max_consecutive_errors =
            read_env_u64("RAYNEO_MAX_IO_ERRORS", cfg.max_consecutive_errors as u64)
                .clamp(1, u32::MAX as u64) as u32;
        cfg.join_grace = Duration::from_millis(read_env_u64(
            "RAYNEO_JOIN_GRACE_MS",
            cfg.join_grace.as_millis() as u64,
        ));
        cfg.set_idle = read_env_bool("RAYNEO_SET_IDLE", cfg.set_idle);

        log::info!(
            "Stream config: profile={:?} strategy={:?} id={:04x}:{:04x} readTimeout={:?} maxIoErrors={} setIdle={}",
            cfg.profile,
            cfg.strategy,
            cfg.vendor_id,
            cfg.product_id,
            cfg.read_timeout,
            cfg.max_consecutive_errors,
            cfg.set_idle,
        );
        cfg
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_u16(&v))
        .unwrap_or(default)
}

fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Decimal or `0x`-prefixed hex.
fn parse_u16(v: &str) -> Option<u16> {
    let v = v.trim();
    match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => v.parse().ok(),
    }
}
