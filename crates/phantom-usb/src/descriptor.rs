//! Wire constants and small descriptor encoders shared by the descriptor tree.

use serde::{Deserialize, Serialize};

pub const DESC_DEVICE: u8 = 0x01;
pub const DESC_CONFIGURATION: u8 = 0x02;
pub const DESC_STRING: u8 = 0x03;
pub const DESC_INTERFACE: u8 = 0x04;
pub const DESC_ENDPOINT: u8 = 0x05;
pub const DESC_DEVICE_QUALIFIER: u8 = 0x06;
pub const DESC_OTHER_SPEED_CONFIGURATION: u8 = 0x07;
pub const DESC_INTERFACE_ASSOCIATION: u8 = 0x0b;
pub const DESC_BOS: u8 = 0x0f;
pub const DESC_DEVICE_CAPABILITY: u8 = 0x10;
pub const DESC_HID: u8 = 0x21;
pub const DESC_REPORT: u8 = 0x22;
pub const DESC_CS_INTERFACE: u8 = 0x24;
pub const DESC_CS_ENDPOINT: u8 = 0x25;
pub const DESC_HUB: u8 = 0x29;

pub const REQ_GET_STATUS: u8 = 0x00;
pub const REQ_CLEAR_FEATURE: u8 = 0x01;
pub const REQ_SET_FEATURE: u8 = 0x03;
pub const REQ_SET_ADDRESS: u8 = 0x05;
pub const REQ_GET_DESCRIPTOR: u8 = 0x06;
pub const REQ_SET_DESCRIPTOR: u8 = 0x07;
pub const REQ_GET_CONFIGURATION: u8 = 0x08;
pub const REQ_SET_CONFIGURATION: u8 = 0x09;
pub const REQ_GET_INTERFACE: u8 = 0x0a;
pub const REQ_SET_INTERFACE: u8 = 0x0b;
pub const REQ_SYNCH_FRAME: u8 = 0x0c;
/// Android Open Accessory "get protocol".
pub const REQ_AOA_GET_PROTOCOL: u8 = 0x33;

pub const FEATURE_ENDPOINT_HALT: u16 = 0x0000;
pub const FEATURE_DEVICE_REMOTE_WAKEUP: u16 = 0x0001;

pub const LANGID_EN_US: u16 = 0x0409;

pub const CLASS_AUDIO: u8 = 0x01;
pub const CLASS_CDC: u8 = 0x02;
pub const CLASS_HID: u8 = 0x03;
pub const CLASS_HUB: u8 = 0x09;
pub const CLASS_CDC_DATA: u8 = 0x0a;
pub const CLASS_SMART_CARD: u8 = 0x0b;
pub const CLASS_BILLBOARD: u8 = 0x11;
pub const CLASS_VENDOR_SPECIFIC: u8 = 0xff;

/// Longest string payload that still fits a one-byte `bLength`.
const MAX_STRING_UNITS: usize = 126;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsbSpeed {
    #[default]
    Full,
    High,
}

impl UsbSpeed {
    /// The speed an OTHER_SPEED_CONFIGURATION descriptor describes.
    pub fn other(self) -> Self {
        match self {
            UsbSpeed::Full => UsbSpeed::High,
            UsbSpeed::High => UsbSpeed::Full,
        }
    }
}

/// Maps an interface class to the legacy class descriptor that follows its interface
/// descriptor in the configuration stream.
pub fn legacy_class_descriptor_type(interface_class: u8) -> Option<u8> {
    match interface_class {
        CLASS_HID | CLASS_SMART_CARD => Some(DESC_HID),
        _ => None,
    }
}

/// String descriptor body: UTF-16LE without a byte-order mark.
pub fn string_descriptor_utf16le(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + s.len() * 2);
    out.push(0); // bLength placeholder
    out.push(DESC_STRING);
    for unit in s.encode_utf16().take(MAX_STRING_UNITS) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out[0] = out.len() as u8;
    out
}

pub fn string_descriptor_langid(langid: u16) -> [u8; 4] {
    let [l0, l1] = langid.to_le_bytes();
    [4, DESC_STRING, l0, l1]
}

/// Fixed 4-port hub class descriptor.
pub fn hub_descriptor() -> Vec<u8> {
    const HUB_NUM_PORTS: u8 = 4;
    const HUB_CHARACTERISTICS: u16 = 0xe000;
    const HUB_PWR_ON_2_PWR_GOOD: u8 = 0x32;
    const HUB_CONTR_CURRENT: u8 = 0x64;

    let [c0, c1] = HUB_CHARACTERISTICS.to_le_bytes();
    vec![
        9, // bLength
        DESC_HUB,
        HUB_NUM_PORTS,
        c0,
        c1,
        HUB_PWR_ON_2_PWR_GOOD,
        HUB_CONTR_CURRENT,
        0x00, // DeviceRemovable
        0xff, // PortPwrCtrlMask
    ]
}
