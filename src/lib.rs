//! # rayneo - head tracking for RayNeo Air series glasses
//!
//! Drives the glasses' inertial sensor over USB and integrates the gyroscope
//! into a head orientation a renderer can sample every frame. Provides:
//! - Interface/endpoint negotiation and the "IMU on" handshake (libusb or hidapi)
//! - Decoding of the 64-byte IMU report into physical units
//! - A mutex-guarded orientation integrator fed by a background reader thread
//! - C FFI for hosts that render outside Rust
//!
//! ## Quick Start
//! ```no_run
//! use rayneo::{Session, StreamConfig};
//! use std::time::Duration;
//!
//! let mut session = Session::new(StreamConfig::from_env());
//! session.start_device().unwrap();
//! for _ in 0..100 {
//!     let [yaw, pitch, roll] = session.orientation().to_euler_deg();
//!     println!("yaw={yaw:.1} pitch={pitch:.1} roll={roll:.1}");
//!     std::thread::sleep(Duration::from_millis(16));
//! }
//! session.stop();
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod descriptor;
pub mod rotation;
pub mod tracker;
pub mod transport;
pub mod usb;
pub mod hid;
pub mod device;
pub mod config;
pub mod stream;
pub mod session;
pub mod ffi;

pub use config::StreamConfig;
pub use error::TrackerError;
pub use rotation::Rotation;
pub use session::Session;
pub use stream::ImuStream;
pub use tracker::HeadTracker;
pub use transport::Transport;
pub use types::*;

/// Result type alias for rayneo operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
