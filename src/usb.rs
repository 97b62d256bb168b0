use crate::config::StreamConfig;
use crate::descriptor::{self, EndpointBinding, InterfaceInfo, SelectionPolicy, TransferKind};
use crate::protocol::{self, FRAME_SIZE};
use crate::transport::Transport;
use crate::types::ReadStrategy;
use crate::{Result, TrackerError};
use rusb::{Device, DeviceHandle, GlobalContext};
use std::time::Duration;

/// Find the first attached device with the given identifiers.
pub fn find_device(vid: u16, pid: u16) -> Result<Device<GlobalContext>> {
    rusb::devices()?
        .iter()
        .find(|d| {
            d.device_descriptor()
                .map(|desc| desc.vendor_id() == vid && desc.product_id() == pid)
                .unwrap_or(false)
        })
        .ok_or(TrackerError::NotFound { vid, pid })
}

/// Interfaces of the device's active configuration.
pub fn read_interfaces(device: &Device<GlobalContext>) -> Result<Vec<InterfaceInfo>> {
    let config = device.active_config_descriptor()?;
    Ok(descriptor::interfaces_from_config(&config))
}

/// Detach any kernel driver from the bound interface and claim it.
fn claim(handle: &mut DeviceHandle<GlobalContext>, binding: &EndpointBinding) -> Result<()> {
    let iface = binding.interface;
    match handle.kernel_driver_active(iface) {
        Ok(true) => match handle.detach_kernel_driver(iface) {
            Ok(_) => log::info!("Detached kernel driver from interface {}", iface),
            Err(rusb::Error::NotFound) | Err(rusb::Error::NotSupported) => {}
            Err(e) => log::warn!("Detach on interface {}: {} (continuing)", iface, e),
        },
        Ok(false) | Err(rusb::Error::NotSupported) => {}
        Err(e) => log::warn!("Kernel driver query on interface {}: {}", iface, e),
    }

    handle
        .claim_interface(iface)
        .map_err(|e| TrackerError::ClaimFailed(format!("interface {}: {}", iface, e)))?;

    if binding.alt_setting != 0 {
        handle
            .set_alternate_setting(iface, binding.alt_setting)
            .map_err(|e| {
                let _ = handle.release_interface(iface);
                TrackerError::ClaimFailed(format!(
                    "interface {} alt {}: {}",
                    iface, binding.alt_setting, e
                ))
            })?;
    }
    Ok(())
}

/// A class request addressed to the bound interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlRequest {
    fn set_idle(interface: u8) -> Self {
        ControlRequest {
            request_type: protocol::REQUEST_TYPE_CLASS_OUT,
            request: protocol::HID_SET_IDLE,
            value: 0,
            index: interface as u16,
        }
    }

    fn set_report(interface: u8) -> Self {
        ControlRequest {
            request_type: protocol::REQUEST_TYPE_CLASS_OUT,
            request: protocol::HID_SET_REPORT,
            value: protocol::SET_REPORT_VALUE,
            index: interface as u16,
        }
    }

    fn get_report(interface: u8) -> Self {
        ControlRequest {
            request_type: protocol::REQUEST_TYPE_CLASS_IN,
            request: protocol::HID_GET_REPORT,
            value: protocol::GET_REPORT_VALUE,
            index: interface as u16,
        }
    }
}

/// Where the enable frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableRoute {
    BulkOut(u8),
    InterruptOut(u8),
    /// No OUT endpoint: HID SET_REPORT on the control pipe.
    SetReport(ControlRequest),
}

/// The transfers that make up the enable handshake, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnablePlan {
    pub set_idle: Option<ControlRequest>,
    pub frame: EnableRoute,
}

/// Plan the handshake for a binding. SET_IDLE is only sent to HID interfaces.
pub fn enable_plan(binding: &EndpointBinding, set_idle: bool) -> EnablePlan {
    let frame = match binding.endpoint_out {
        Some(ep) if ep.kind == TransferKind::Bulk => EnableRoute::BulkOut(ep.address),
        Some(ep) => EnableRoute::InterruptOut(ep.address),
        None => EnableRoute::SetReport(ControlRequest::set_report(binding.interface)),
    };
    let set_idle = set_idle && binding.is_hid();
    EnablePlan {
        set_idle: set_idle.then(|| ControlRequest::set_idle(binding.interface)),
        frame,
    }
}

/// How each report is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRoute {
    Bulk(u8),
    Interrupt(u8),
    GetReport(ControlRequest),
}

/// Pick the read transfer for a binding. Streaming needs an IN endpoint.
pub fn read_route(binding: &EndpointBinding, strategy: ReadStrategy) -> Result<ReadRoute> {
    if strategy == ReadStrategy::GetReport {
        return Ok(ReadRoute::GetReport(ControlRequest::get_report(binding.interface)));
    }
    match binding.endpoint_in {
        Some(ep) if ep.kind == TransferKind::Bulk => Ok(ReadRoute::Bulk(ep.address)),
        Some(ep) => Ok(ReadRoute::Interrupt(ep.address)),
        None => Err(TrackerError::NoSuitableInterface),
    }
}

/// libusb transport: synchronous endpoint streaming or GET_REPORT polling.
pub struct UsbTransport {
    handle: Option<DeviceHandle<GlobalContext>>,
    binding: EndpointBinding,
    enable: EnablePlan,
    read: ReadRoute,
    control_timeout: Duration,
}

impl UsbTransport {
    /// Open, negotiate endpoints, and claim the interface.
    ///
    /// A claim failure closes the handle before returning.
    pub fn open(config: &StreamConfig) -> Result<UsbTransport> {
        let device = find_device(config.vendor_id, config.product_id)?;
        let interfaces = read_interfaces(&device)?;
        let policy = SelectionPolicy::for_strategy(config.profile, config.strategy);
        let binding = descriptor::select(&policy, &interfaces)?;
        let read = read_route(&binding, config.strategy)?;
        let enable = enable_plan(&binding, config.set_idle);

        let mut handle = device
            .open()
            .map_err(|e| TrackerError::from_open(e, config.vendor_id, config.product_id))?;
        claim(&mut handle, &binding)?;

        log::info!(
            "Opened {:04x}:{:04x} on bus {} addr {}: interface {} read={:?} enable={:?}",
            config.vendor_id,
            config.product_id,
            device.bus_number(),
            device.address(),
            binding.interface,
            read,
            enable.frame,
        );

        Ok(UsbTransport {
            handle: Some(handle),
            binding,
            enable,
            read,
            control_timeout: config.control_timeout,
        })
    }

    pub fn binding(&self) -> &EndpointBinding {
        &self.binding
    }

    fn handle(&self) -> Result<&DeviceHandle<GlobalContext>> {
        self.handle.as_ref().ok_or(TrackerError::StreamStopped)
    }
}

impl Transport for UsbTransport {
    fn enable_sensor_stream(&mut self) -> Result<()> {
        let handle = self.handle()?;
        if let Some(req) = self.enable.set_idle {
            match handle.write_control(
                req.request_type,
                req.request,
                req.value,
                req.index,
                &[],
                self.control_timeout,
            ) {
                Ok(_) => log::debug!("SET_IDLE sent on interface {}", req.index),
                // Many devices stall SET_IDLE; streaming works regardless.
                Err(e) => log::warn!("SET_IDLE failed: {} (continuing)", e),
            }
        }

        let cmd = protocol::build_enable_command();
        let sent = match self.enable.frame {
            EnableRoute::BulkOut(ep) => handle.write_bulk(ep, &cmd, self.control_timeout),
            EnableRoute::InterruptOut(ep) => handle.write_interrupt(ep, &cmd, self.control_timeout),
            EnableRoute::SetReport(req) => handle.write_control(
                req.request_type,
                req.request,
                req.value,
                req.index,
                &cmd,
                self.control_timeout,
            ),
        }
        .map_err(|e| TrackerError::EnableFailed(e.to_string()))?;

        log::info!("IMU enable sent ({} bytes via {:?})", sent, self.enable.frame);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let handle = self.handle()?;
        let res = match self.read {
            ReadRoute::GetReport(req) => handle.read_control(
                req.request_type,
                req.request,
                req.value,
                req.index,
                buf,
                timeout,
            ),
            ReadRoute::Bulk(ep) => handle.read_bulk(ep, buf, timeout),
            ReadRoute::Interrupt(ep) => handle.read_interrupt(ep, buf, timeout),
        };
        res.map_err(TrackerError::from_transfer)
    }

    fn report_size(&self) -> usize {
        match (self.read, self.binding.endpoint_in) {
            (ReadRoute::GetReport(_), _) | (_, None) => FRAME_SIZE,
            (_, Some(ep)) => (ep.max_packet_size as usize).max(FRAME_SIZE),
        }
    }

    fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(self.binding.interface) {
                log::debug!("Release interface {}: {}", self.binding.interface, e);
            }
            log::info!("USB handle closed");
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        self.close();
    }
}
