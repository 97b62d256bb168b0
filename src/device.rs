use crate::config::StreamConfig;
use crate::descriptor::{self, SelectionPolicy};
use crate::hid::HidTransport;
use crate::transport::Transport;
use crate::types::{DeviceSummary, ReadStrategy};
use crate::usb::{self, UsbTransport};
use crate::{Result, TrackerError};

/// List attached devices matching the given identifiers.
///
/// Descriptor read failures are logged and the device is reported without interfaces.
pub fn list_devices(vid: u16, pid: u16) -> Result<Vec<DeviceSummary>> {
    let mut devices = Vec::new();

    for device in rusb::devices()?.iter() {
        let desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(_) => continue,
        };
        if desc.vendor_id() != vid || desc.product_id() != pid {
            continue;
        }

        let interfaces = match usb::read_interfaces(&device) {
            Ok(i) => i,
            Err(e) => {
                log::warn!(
                    "Failed to read descriptors of bus {} addr {}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
                Vec::new()
            }
        };

        devices.push(DeviceSummary {
            vendor_id: vid,
            product_id: pid,
            bus_number: device.bus_number(),
            address: device.address(),
            interfaces,
        });
    }

    Ok(devices)
}

/// Open the configured device with the configured read strategy.
///
/// Returns with the interface claimed and ready for `enable_sensor_stream`.
pub fn open_transport(config: &StreamConfig) -> Result<Box<dyn Transport>> {
    match config.strategy {
        ReadStrategy::Stream | ReadStrategy::GetReport => {
            Ok(Box::new(UsbTransport::open(config)?))
        }
        ReadStrategy::Queued => {
            // hidapi does its own claiming; libusb is only asked which interface to use.
            let interface = usb::find_device(config.vendor_id, config.product_id)
                .and_then(|d| usb::read_interfaces(&d))
                .and_then(|ifaces| {
                    let policy = SelectionPolicy::for_strategy(config.profile, config.strategy);
                    descriptor::select(&policy, &ifaces)
                })
                .map(|binding| binding.interface);
            let interface = match interface {
                Ok(n) => Some(n),
                Err(TrackerError::NoSuitableInterface) => {
                    return Err(TrackerError::NoSuitableInterface)
                }
                Err(e) => {
                    log::info!("Interface lookup via libusb failed ({}), matching any HID interface", e);
                    None
                }
            };
            Ok(Box::new(HidTransport::open(config, interface)?))
        }
    }
}
