use crate::config::StreamConfig;
use crate::protocol::{self, FRAME_SIZE};
use crate::transport::Transport;
use crate::{Result, TrackerError};
use hidapi::{HidApi, HidDevice};
use std::time::Duration;

/// HID transport using hidapi's queued interrupt-report reads.
///
/// The OS keeps interrupt IN transfers in flight and buffers the reports;
/// `read` just waits for the next completed one. Used when synchronous
/// interrupt transfers through libusb are unreliable on the platform.
pub struct HidTransport {
    device: Option<HidDevice>,
}

fn create_hid_api() -> Result<HidApi> {
    let api = HidApi::new()?;
    #[cfg(target_os = "macos")]
    {
        // Keep HID opens shared on macOS to avoid seizing the interface.
        api.set_open_exclusive(false);
    }
    Ok(api)
}

impl HidTransport {
    pub fn new(device: HidDevice) -> Self {
        Self {
            device: Some(device),
        }
    }

    /// Open the HID interface of the configured device.
    ///
    /// `interface` narrows the match on platforms that report interface
    /// numbers; macOS reports -1 for every HID interface.
    pub fn open(config: &StreamConfig, interface: Option<u8>) -> Result<HidTransport> {
        let api = create_hid_api()?;
        let info = api
            .device_list()
            .find(|d| {
                d.vendor_id() == config.vendor_id
                    && d.product_id() == config.product_id
                    && match interface {
                        Some(n) => d.interface_number() == n as i32 || d.interface_number() == -1,
                        None => true,
                    }
            })
            .ok_or(TrackerError::NotFound {
                vid: config.vendor_id,
                pid: config.product_id,
            })?;

        let device = api.open_path(info.path()).map_err(|e| {
            log::warn!("hidapi open {:?} failed: {}", info.path(), e);
            TrackerError::PermissionDenied
        })?;
        log::info!(
            "Opened HID {:04x}:{:04x} interface {} at {:?}",
            config.vendor_id,
            config.product_id,
            info.interface_number(),
            info.path()
        );
        Ok(HidTransport::new(device))
    }

    fn device(&self) -> Result<&HidDevice> {
        self.device.as_ref().ok_or(TrackerError::StreamStopped)
    }
}

impl Transport for HidTransport {
    fn enable_sensor_stream(&mut self) -> Result<()> {
        // hidapi takes the report id in byte 0; the IMU uses unnumbered reports.
        let mut buf = [0u8; FRAME_SIZE + 1];
        buf[1..].copy_from_slice(&protocol::build_enable_command());
        let sent = self
            .device()?
            .write(&buf)
            .map_err(|e| TrackerError::EnableFailed(e.to_string()))?;
        log::info!("IMU enable sent ({} bytes via hidapi)", sent);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        match self.device()?.read_timeout(buf, timeout_ms) {
            Ok(0) => Err(TrackerError::Timeout),
            Ok(n) => Ok(n),
            Err(e) => Err(TrackerError::Hid(e)),
        }
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            log::info!("HID handle closed");
        }
    }
}
