//! Binary Object Store and its device capability descriptors.

use core::fmt;

use crate::descriptor::{DESC_BOS, DESC_DEVICE_CAPABILITY};
use crate::mutation::{Mutator, Stage};

pub const CAP_USB20_EXTENSION: u8 = 0x02;
pub const CAP_CONTAINER_ID: u8 = 0x04;
pub const CAP_BILLBOARD: u8 = 0x0d;

/// USB 2.0 extension attribute: Link Power Management supported.
pub const USB20_EXT_LPM: u32 = 1 << 1;

/// Largest capability payload whose descriptor length still fits `bLength`.
pub const MAX_CAPABILITY_PAYLOAD: usize = u8::MAX as usize - 3;

/// A producer of one DEVICE_CAPABILITY descriptor.
pub trait DeviceCapability {
    fn capability_type(&self) -> u8;

    /// Capability-dependent fields following `bDevCapabilityType`.
    fn payload(&self) -> Vec<u8>;

    fn get_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::DeviceCapabilityDescriptor, |_| {
            let mut payload = self.payload();
            if payload.len() > MAX_CAPABILITY_PAYLOAD {
                tracing::warn!(
                    capability = self.capability_type(),
                    len = payload.len(),
                    "device capability payload truncated"
                );
                payload.truncate(MAX_CAPABILITY_PAYLOAD);
            }
            let mut out = Vec::with_capacity(payload.len() + 3);
            out.push((payload.len() + 3) as u8);
            out.push(DESC_DEVICE_CAPABILITY);
            out.push(self.capability_type());
            out.extend(payload);
            out
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Usb20Extension {
    pub attributes: u32,
}

impl DeviceCapability for Usb20Extension {
    fn capability_type(&self) -> u8 {
        CAP_USB20_EXTENSION
    }

    fn payload(&self) -> Vec<u8> {
        self.attributes.to_le_bytes().to_vec()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerId {
    pub uuid: [u8; 16],
}

impl DeviceCapability for ContainerId {
    fn capability_type(&self) -> u8 {
        CAP_CONTAINER_ID
    }

    fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(17);
        out.push(0); // bReserved
        out.extend_from_slice(&self.uuid);
        out
    }
}

/// Outcome of entering an alternate mode, two bits per mode in `bmConfigured`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlternateModeState {
    #[default]
    Unspecified = 0b00,
    NotAttempted = 0b01,
    Unsuccessful = 0b10,
    Configured = 0b11,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlternateMode {
    pub svid: u16,
    pub mode: u8,
    pub string_index: u8,
    pub state: AlternateModeState,
}

/// Billboard capability (Billboard device class 1.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Billboard {
    pub additional_info_url: u8,
    pub preferred_mode: u8,
    pub vconn_power: u16,
    pub version: u16,
    pub additional_failure_info: u8,
    pub modes: Vec<AlternateMode>,
}

impl Billboard {
    /// Modes that fit a single capability descriptor: 44 + 4 * n <= 255.
    pub const MAX_MODES: usize = (MAX_CAPABILITY_PAYLOAD - 41) / 4;
}

impl Default for Billboard {
    fn default() -> Self {
        Self {
            additional_info_url: 0,
            preferred_mode: 0,
            vconn_power: 0,
            version: 0x0110,
            additional_failure_info: 0,
            modes: Vec::new(),
        }
    }
}

impl DeviceCapability for Billboard {
    fn capability_type(&self) -> u8 {
        CAP_BILLBOARD
    }

    fn payload(&self) -> Vec<u8> {
        let modes = &self.modes[..self.modes.len().min(Self::MAX_MODES)];
        let mut configured = [0u8; 32];
        for (i, mode) in modes.iter().enumerate() {
            configured[i / 4] |= (mode.state as u8) << ((i % 4) * 2);
        }
        let mut out = Vec::with_capacity(41 + modes.len() * 4);
        out.push(self.additional_info_url);
        out.push(modes.len() as u8);
        out.push(self.preferred_mode);
        out.extend_from_slice(&self.vconn_power.to_le_bytes());
        out.extend_from_slice(&configured);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.additional_failure_info);
        out.push(0); // bReserved
        for mode in modes {
            out.extend_from_slice(&mode.svid.to_le_bytes());
            out.push(mode.mode);
            out.push(mode.string_index);
        }
        out
    }
}

/// Capability with a caller-supplied payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCapability {
    pub capability_type: u8,
    pub payload: Vec<u8>,
}

impl DeviceCapability for RawCapability {
    fn capability_type(&self) -> u8 {
        self.capability_type
    }

    fn payload(&self) -> Vec<u8> {
        let len = self.payload.len().min(MAX_CAPABILITY_PAYLOAD);
        self.payload[..len].to_vec()
    }
}

#[derive(Default)]
pub struct BinaryObjectStore {
    capabilities: Vec<Box<dyn DeviceCapability>>,
}

impl BinaryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, capability: impl DeviceCapability + 'static) -> Self {
        self.capabilities.push(Box::new(capability));
        self
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn get_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::BosDescriptor, |m| {
            let body: Vec<u8> = self
                .capabilities
                .iter()
                .flat_map(|cap| cap.get_descriptor(m))
                .collect();
            let [t0, t1] = ((5 + body.len()) as u16).to_le_bytes();
            let mut out = vec![5, DESC_BOS, t0, t1, self.capabilities.len() as u8];
            out.extend(body);
            out
        })
    }
}

impl fmt::Debug for BinaryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<u8> = self.capabilities.iter().map(|c| c.capability_type()).collect();
        f.debug_struct("BinaryObjectStore")
            .field("capabilities", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb20_extension_is_seven_bytes() {
        let cap = Usb20Extension {
            attributes: USB20_EXT_LPM,
        };
        assert_eq!(
            cap.get_descriptor(&mut Mutator::disabled()),
            vec![7, DESC_DEVICE_CAPABILITY, CAP_USB20_EXTENSION, 0x02, 0, 0, 0]
        );
    }

    #[test]
    fn container_id_is_twenty_bytes() {
        let cap = ContainerId { uuid: [0x5a; 16] };
        let bytes = cap.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0], 20);
        assert_eq!(bytes[3], 0);
    }

    #[test]
    fn billboard_length_grows_by_four_per_mode() {
        let mode = AlternateMode {
            svid: 0xff01,
            mode: 0,
            string_index: 0,
            state: AlternateModeState::Configured,
        };
        let cap = Billboard {
            modes: vec![mode, mode],
            ..Billboard::default()
        };
        let bytes = cap.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes.len(), 44 + 8);
        assert_eq!(bytes[0] as usize, bytes.len());
        assert_eq!(bytes[4], 2, "bNumberOfAlternateModes");
        assert_eq!(bytes[8], 0b1111, "bmConfigured for two configured modes");
        assert_eq!(&bytes[44..46], &[0x01, 0xff]);
    }

    #[test]
    fn billboard_mode_count_stays_within_one_descriptor() {
        assert_eq!(Billboard::MAX_MODES, 52);
        let mode = AlternateMode {
            svid: 0xff01,
            mode: 1,
            string_index: 0,
            state: AlternateModeState::NotAttempted,
        };
        let cap = Billboard {
            modes: vec![mode; 60],
            ..Billboard::default()
        };
        let bytes = cap.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes[0] as usize, bytes.len());
        assert_eq!(bytes.len(), 44 + 4 * 52);
        assert_eq!(bytes[4], 52, "bNumberOfAlternateModes");
    }

    #[test]
    fn raw_capability_payload_is_clamped() {
        let fits = RawCapability {
            capability_type: 0x0a,
            payload: vec![0xaa; MAX_CAPABILITY_PAYLOAD],
        };
        let bytes = fits.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes.len(), 255);
        assert_eq!(bytes[0], 255);

        let oversized = RawCapability {
            capability_type: 0x0a,
            payload: vec![0xaa; 300],
        };
        let bytes = oversized.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes[0] as usize, bytes.len());
        assert_eq!(bytes.len(), 255);
    }

    #[test]
    fn bos_total_length_covers_capabilities() {
        let bos = BinaryObjectStore::new()
            .with_capability(Usb20Extension { attributes: 0 })
            .with_capability(RawCapability {
                capability_type: 0x0a,
                payload: vec![1, 2, 3],
            });
        let bytes = bos.get_descriptor(&mut Mutator::disabled());
        assert_eq!(bytes.len(), 5 + 7 + 6);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]) as usize, bytes.len());
        assert_eq!(bytes[4], 2);
    }
}
