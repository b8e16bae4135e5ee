//! Control transfer SETUP packet decoding.
//!
//! The wire layout is the standard 8-byte little-endian header (`bmRequestType`, `bRequest`,
//! `wValue`, `wIndex`, `wLength`), optionally followed by the OUT data stage. Parsing never
//! rejects unknown type/recipient encodings: those are surfaced as `Reserved` so the dispatcher
//! can stall them.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{UsbError, UsbResult};

pub const SETUP_PACKET_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestDirection {
    HostToDevice,
    DeviceToHost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestRecipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved(u8),
}

impl RequestType {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::Standard => "standard",
            RequestType::Class => "class",
            RequestType::Vendor => "vendor",
            RequestType::Reserved => "unknown",
        }
    }
}

impl RequestRecipient {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestRecipient::Device => "device",
            RequestRecipient::Interface => "interface",
            RequestRecipient::Endpoint => "endpoint",
            RequestRecipient::Other => "other",
            RequestRecipient::Reserved(_) => "unknown",
        }
    }
}

/// A decoded control request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupRequest {
    #[serde(rename = "bmRequestType")]
    pub request_type: u8,
    #[serde(rename = "bRequest")]
    pub request: u8,
    #[serde(rename = "wValue")]
    pub value: u16,
    #[serde(rename = "wIndex")]
    pub index: u16,
    #[serde(rename = "wLength")]
    pub length: u16,
    /// OUT data stage bytes (empty for IN requests and zero-length OUT requests).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl SetupRequest {
    pub fn new(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type,
            request,
            value,
            index,
            length,
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Decodes a raw SETUP packet; anything past the first 8 bytes is the OUT data stage.
    pub fn parse(raw: &[u8]) -> UsbResult<Self> {
        let Some((header, data)) = raw.split_first_chunk::<SETUP_PACKET_LEN>() else {
            return Err(UsbError::ShortSetupPacket { len: raw.len() });
        };
        let [request_type, request, v0, v1, i0, i1, l0, l1] = *header;
        Ok(Self {
            request_type,
            request,
            value: u16::from_le_bytes([v0, v1]),
            index: u16::from_le_bytes([i0, i1]),
            length: u16::from_le_bytes([l0, l1]),
            data: data.to_vec(),
        })
    }

    /// Encodes the 8-byte header (the data stage is not included).
    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_LEN] {
        let [v0, v1] = self.value.to_le_bytes();
        let [i0, i1] = self.index.to_le_bytes();
        let [l0, l1] = self.length.to_le_bytes();
        [self.request_type, self.request, v0, v1, i0, i1, l0, l1]
    }

    pub fn direction(&self) -> RequestDirection {
        if self.request_type & 0x80 != 0 {
            RequestDirection::DeviceToHost
        } else {
            RequestDirection::HostToDevice
        }
    }

    pub fn kind(&self) -> RequestType {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn recipient(&self) -> RequestRecipient {
        match self.request_type & 0x1f {
            0 => RequestRecipient::Device,
            1 => RequestRecipient::Interface,
            2 => RequestRecipient::Endpoint,
            3 => RequestRecipient::Other,
            other => RequestRecipient::Reserved(other),
        }
    }

    /// `wIndex` as interpreted for the addressed recipient.
    ///
    /// Endpoint requests carry the endpoint address in the low byte; only the 4-bit endpoint
    /// number is used for lookup.
    pub fn recipient_index(&self) -> u16 {
        match self.recipient() {
            RequestRecipient::Endpoint => self.index & 0x0f,
            _ => self.index,
        }
    }

    /// Descriptor type encoded in the high byte of `wValue` (GET_DESCRIPTOR).
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// Descriptor index encoded in the low byte of `wValue` (GET_DESCRIPTOR).
    pub fn descriptor_index(&self) -> u8 {
        (self.value & 0xff) as u8
    }

    pub fn data(&self) -> Option<&[u8]> {
        (!self.data.is_empty()).then_some(self.data.as_slice())
    }
}

impl fmt::Display for SetupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction() {
            RequestDirection::DeviceToHost => "in",
            RequestDirection::HostToDevice => "out",
        };
        write!(
            f,
            "dir={dir}, type={}, rec={}, req={:#04x}, val={:#06x}, idx={:#06x}, len={}",
            self.kind().as_str(),
            self.recipient().as_str(),
            self.request,
            self.value,
            self.index,
            self.length
        )
    }
}
