//! Interface and endpoint negotiation.
//!
//! Descriptors are copied out of libusb into plain structs so the selection
//! policies can be exercised against hand-built fixtures.

use crate::protocol::USB_CLASS_HID;
use crate::types::{Profile, ReadStrategy};
use crate::{Result, TrackerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub direction: Direction,
    pub kind: TransferKind,
    pub max_packet_size: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub alt_setting: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// Which interfaces a selection pass may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceRule {
    /// Interface class is HID.
    HidClass,
    /// The device exposes exactly one interface, whatever its class.
    SoleInterface,
    /// Any interface.
    Any,
}

/// Which endpoint transfer types qualify as the IN/OUT pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRule {
    /// Interrupt IN required, interrupt OUT optional.
    InterruptOnly,
    /// Bulk or interrupt IN, no OUT endpoint.
    BulkOrInterruptIn,
    /// Reports travel over the control pipe; interrupt IN/OUT are taken when
    /// present but neither is required.
    ControlReports,
}

/// Ordered list of interface rules plus the endpoint rule applied within them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub interfaces: &'static [InterfaceRule],
    pub endpoints: EndpointRule,
}

impl SelectionPolicy {
    pub fn for_profile(profile: Profile) -> SelectionPolicy {
        match profile {
            Profile::RawImu64 => SelectionPolicy {
                interfaces: &[InterfaceRule::HidClass, InterfaceRule::SoleInterface],
                endpoints: EndpointRule::InterruptOnly,
            },
            Profile::FirmwarePose16 => SelectionPolicy {
                interfaces: &[InterfaceRule::Any],
                endpoints: EndpointRule::BulkOrInterruptIn,
            },
        }
    }

    /// Policy for a profile read with `strategy`. GET_REPORT polling only
    /// needs a HID interface, not an interrupt path.
    pub fn for_strategy(profile: Profile, strategy: ReadStrategy) -> SelectionPolicy {
        match strategy {
            ReadStrategy::GetReport => SelectionPolicy {
                interfaces: &[InterfaceRule::HidClass],
                endpoints: EndpointRule::ControlReports,
            },
            ReadStrategy::Stream | ReadStrategy::Queued => Self::for_profile(profile),
        }
    }
}

/// The interface and endpoints chosen for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointBinding {
    pub interface: u8,
    pub alt_setting: u8,
    pub class_code: u8,
    /// Absent only for bindings made under [`EndpointRule::ControlReports`].
    pub endpoint_in: Option<EndpointInfo>,
    pub endpoint_out: Option<EndpointInfo>,
}

impl EndpointBinding {
    pub fn is_hid(&self) -> bool {
        self.class_code == USB_CLASS_HID
    }
}

fn rule_admits(rule: InterfaceRule, iface: &InterfaceInfo, interface_count: usize) -> bool {
    match rule {
        InterfaceRule::HidClass => iface.class_code == USB_CLASS_HID,
        InterfaceRule::SoleInterface => interface_count == 1,
        InterfaceRule::Any => true,
    }
}

type EndpointPair = (Option<EndpointInfo>, Option<EndpointInfo>);

fn interrupt_pair(iface: &InterfaceInfo) -> EndpointPair {
    let mut ep_in = None;
    let mut ep_out = None;
    for ep in iface
        .endpoints
        .iter()
        .filter(|ep| ep.kind == TransferKind::Interrupt)
    {
        match ep.direction {
            Direction::In => ep_in = Some(*ep),
            Direction::Out => ep_out = Some(*ep),
        }
    }
    (ep_in, ep_out)
}

fn pick_endpoints(rule: EndpointRule, iface: &InterfaceInfo) -> Option<EndpointPair> {
    match rule {
        EndpointRule::InterruptOnly => match interrupt_pair(iface) {
            (Some(ep_in), ep_out) => Some((Some(ep_in), ep_out)),
            (None, _) => None,
        },
        EndpointRule::BulkOrInterruptIn => iface
            .endpoints
            .iter()
            .find(|ep| {
                ep.direction == Direction::In
                    && matches!(ep.kind, TransferKind::Bulk | TransferKind::Interrupt)
            })
            .map(|ep| (Some(*ep), None)),
        EndpointRule::ControlReports => Some(interrupt_pair(iface)),
    }
}

/// Choose an interface and endpoints, trying each interface rule in order.
pub fn select(policy: &SelectionPolicy, interfaces: &[InterfaceInfo]) -> Result<EndpointBinding> {
    for &rule in policy.interfaces {
        for iface in interfaces {
            if !rule_admits(rule, iface, interfaces.len()) {
                continue;
            }
            if let Some((endpoint_in, endpoint_out)) = pick_endpoints(policy.endpoints, iface) {
                log::debug!(
                    "Selected interface {} (class 0x{:02x}) via {:?}: in={:?} out={:?}",
                    iface.number,
                    iface.class_code,
                    rule,
                    endpoint_in.map(|ep| ep.address),
                    endpoint_out.map(|ep| ep.address)
                );
                return Ok(EndpointBinding {
                    interface: iface.number,
                    alt_setting: iface.alt_setting,
                    class_code: iface.class_code,
                    endpoint_in,
                    endpoint_out,
                });
            }
        }
    }
    Err(TrackerError::NoSuitableInterface)
}

/// Flatten a libusb configuration descriptor, one entry per alternate setting.
pub fn interfaces_from_config(config: &rusb::ConfigDescriptor) -> Vec<InterfaceInfo> {
    let mut out = Vec::new();
    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            let endpoints = desc
                .endpoint_descriptors()
                .map(|ep| EndpointInfo {
                    address: ep.address(),
                    direction: match ep.direction() {
                        rusb::Direction::In => Direction::In,
                        rusb::Direction::Out => Direction::Out,
                    },
                    kind: match ep.transfer_type() {
                        rusb::TransferType::Control => TransferKind::Control,
                        rusb::TransferType::Isochronous => TransferKind::Isochronous,
                        rusb::TransferType::Bulk => TransferKind::Bulk,
                        rusb::TransferType::Interrupt => TransferKind::Interrupt,
                    },
                    max_packet_size: ep.max_packet_size(),
                })
                .collect();
            out.push(InterfaceInfo {
                number: desc.interface_number(),
                alt_setting: desc.setting_number(),
                class_code: desc.class_code(),
                endpoints,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(address: u8, kind: TransferKind) -> EndpointInfo {
        EndpointInfo {
            address,
            direction: if address & 0x80 != 0 {
                Direction::In
            } else {
                Direction::Out
            },
            kind,
            max_packet_size: 64,
        }
    }

    fn iface(number: u8, class_code: u8, endpoints: Vec<EndpointInfo>) -> InterfaceInfo {
        InterfaceInfo {
            number,
            alt_setting: 0,
            class_code,
            endpoints,
        }
    }

    const VENDOR: u8 = 0xFF;

    #[test]
    fn test_prefers_hid_interface() {
        let ifaces = vec![
            iface(0, VENDOR, vec![ep(0x81, TransferKind::Interrupt)]),
            iface(
                2,
                USB_CLASS_HID,
                vec![ep(0x84, TransferKind::Interrupt), ep(0x05, TransferKind::Interrupt)],
            ),
        ];
        let policy = SelectionPolicy::for_profile(Profile::RawImu64);
        let b = select(&policy, &ifaces).unwrap();
        assert_eq!(b.interface, 2);
        assert!(b.is_hid());
        assert_eq!(b.endpoint_in.map(|e| e.address), Some(0x84));
        assert_eq!(b.endpoint_out.map(|e| e.address), Some(0x05));
    }

    #[test]
    fn test_out_endpoint_is_optional() {
        let ifaces = vec![iface(1, USB_CLASS_HID, vec![ep(0x81, TransferKind::Interrupt)])];
        let b = select(&SelectionPolicy::for_profile(Profile::RawImu64), &ifaces).unwrap();
        assert_eq!(b.endpoint_out, None);
    }

    #[test]
    fn test_sole_interface_fallback_ignores_class() {
        let ifaces = vec![iface(0, VENDOR, vec![ep(0x82, TransferKind::Interrupt)])];
        let b = select(&SelectionPolicy::for_profile(Profile::RawImu64), &ifaces).unwrap();
        assert_eq!(b.interface, 0);
        assert!(!b.is_hid());
    }

    #[test]
    fn test_raw_profile_rejects_bulk_only_device() {
        let ifaces = vec![
            iface(0, VENDOR, vec![ep(0x81, TransferKind::Bulk)]),
            iface(1, USB_CLASS_HID, vec![ep(0x82, TransferKind::Bulk)]),
        ];
        let err = select(&SelectionPolicy::for_profile(Profile::RawImu64), &ifaces).unwrap_err();
        assert!(matches!(err, TrackerError::NoSuitableInterface));
    }

    #[test]
    fn test_raw_profile_skips_vendor_interfaces_when_several() {
        let ifaces = vec![
            iface(0, VENDOR, vec![ep(0x81, TransferKind::Interrupt)]),
            iface(1, VENDOR, vec![ep(0x82, TransferKind::Interrupt)]),
        ];
        assert!(select(&SelectionPolicy::for_profile(Profile::RawImu64), &ifaces).is_err());
    }

    #[test]
    fn test_pose_profile_accepts_bulk_in_on_any_class() {
        let ifaces = vec![
            iface(0, VENDOR, vec![ep(0x01, TransferKind::Bulk)]),
            iface(1, VENDOR, vec![ep(0x02, TransferKind::Bulk), ep(0x83, TransferKind::Bulk)]),
        ];
        let b = select(&SelectionPolicy::for_profile(Profile::FirmwarePose16), &ifaces).unwrap();
        assert_eq!(b.interface, 1);
        let ep_in = b.endpoint_in.unwrap();
        assert_eq!(ep_in.address, 0x83);
        assert_eq!(ep_in.kind, TransferKind::Bulk);
        assert_eq!(b.endpoint_out, None);
    }

    #[test]
    fn test_pose_profile_ignores_isochronous() {
        let ifaces = vec![iface(0, VENDOR, vec![ep(0x81, TransferKind::Isochronous)])];
        assert!(select(&SelectionPolicy::for_profile(Profile::FirmwarePose16), &ifaces).is_err());
    }

    #[test]
    fn test_get_report_accepts_hid_without_endpoints() {
        let ifaces = vec![
            iface(0, VENDOR, vec![ep(0x81, TransferKind::Interrupt)]),
            iface(3, USB_CLASS_HID, vec![]),
        ];
        assert!(select(&SelectionPolicy::for_profile(Profile::RawImu64), &ifaces).is_err());

        let policy = SelectionPolicy::for_strategy(Profile::RawImu64, ReadStrategy::GetReport);
        let b = select(&policy, &ifaces).unwrap();
        assert_eq!(b.interface, 3);
        assert!(b.is_hid());
        assert_eq!(b.endpoint_in, None);
        assert_eq!(b.endpoint_out, None);
    }

    #[test]
    fn test_get_report_keeps_interrupt_out_when_present() {
        let ifaces = vec![iface(
            1,
            USB_CLASS_HID,
            vec![ep(0x02, TransferKind::Interrupt), ep(0x83, TransferKind::Bulk)],
        )];
        let policy = SelectionPolicy::for_strategy(Profile::FirmwarePose16, ReadStrategy::GetReport);
        let b = select(&policy, &ifaces).unwrap();
        assert_eq!(b.endpoint_in, None);
        assert_eq!(b.endpoint_out.map(|e| e.address), Some(0x02));
    }

    #[test]
    fn test_get_report_needs_hid_class() {
        let ifaces = vec![iface(0, VENDOR, vec![ep(0x81, TransferKind::Interrupt)])];
        let policy = SelectionPolicy::for_strategy(Profile::RawImu64, ReadStrategy::GetReport);
        assert!(matches!(
            select(&policy, &ifaces),
            Err(TrackerError::NoSuitableInterface)
        ));
    }

    #[test]
    fn test_streaming_strategies_follow_profile() {
        for strategy in [ReadStrategy::Stream, ReadStrategy::Queued] {
            for profile in [Profile::RawImu64, Profile::FirmwarePose16] {
                assert_eq!(
                    SelectionPolicy::for_strategy(profile, strategy),
                    SelectionPolicy::for_profile(profile)
                );
            }
        }
    }
}
