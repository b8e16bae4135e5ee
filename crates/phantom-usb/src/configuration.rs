use core::fmt;

use bitflags::bitflags;

use crate::descriptor::{UsbSpeed, DESC_CONFIGURATION, DESC_OTHER_SPEED_CONFIGURATION};
use crate::handler::RequestHandler;
use crate::interface::Interface;
use crate::mutation::{Mutator, Stage};

bitflags! {
    /// `bmAttributes` of a configuration descriptor.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ConfigAttributes: u8 {
        /// Must always be set.
        const RESERVED = 1 << 7;
        const SELF_POWERED = 1 << 6;
        const REMOTE_WAKEUP = 1 << 5;
    }
}

impl Default for ConfigAttributes {
    fn default() -> Self {
        ConfigAttributes::RESERVED | ConfigAttributes::SELF_POWERED
    }
}

/// 100 mA.
pub const DEFAULT_MAX_POWER: u8 = 0x32;

pub struct Configuration {
    /// 1-based `bConfigurationValue`, assigned when the device is built.
    value: u8,
    name: Option<String>,
    string_index: u8,
    attributes: ConfigAttributes,
    max_power: u8,
    interfaces: Vec<Interface>,
}

impl Configuration {
    pub fn new(interfaces: Vec<Interface>) -> Self {
        Self {
            value: 1,
            name: None,
            string_index: 0,
            attributes: ConfigAttributes::default(),
            max_power: DEFAULT_MAX_POWER,
            interfaces,
        }
    }

    /// Configuration string; its index is assigned when the device is built.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attributes(mut self, attributes: ConfigAttributes) -> Self {
        self.attributes = attributes | ConfigAttributes::RESERVED;
        self
    }

    /// Maximum bus power in 2 mA units.
    pub fn with_max_power(mut self, max_power: u8) -> Self {
        self.max_power = max_power;
        self
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    pub(crate) fn set_value(&mut self, value: u8) {
        self.value = value;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn string_index(&self) -> u8 {
        self.string_index
    }

    pub(crate) fn set_string_index(&mut self, index: u8) {
        self.string_index = index;
    }

    pub fn attributes(&self) -> ConfigAttributes {
        self.attributes
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface_mut(&mut self, idx: usize) -> Option<&mut Interface> {
        self.interfaces.get_mut(idx)
    }

    pub(crate) fn interfaces_mut(&mut self) -> &mut [Interface] {
        &mut self.interfaces
    }

    pub fn get_descriptor(&self, speed: UsbSpeed, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::ConfigurationDescriptor, |m| {
            self.encode(DESC_CONFIGURATION, speed, m)
        })
    }

    /// OTHER_SPEED_CONFIGURATION descriptor; `speed` is the speed being described, i.e. the one
    /// the device is *not* running at.
    pub fn get_other_speed_descriptor(&self, speed: UsbSpeed, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::OtherSpeedConfigurationDescriptor, |m| {
            self.encode(DESC_OTHER_SPEED_CONFIGURATION, speed, m)
        })
    }

    fn encode(&self, descriptor_type: u8, speed: UsbSpeed, m: &mut Mutator<'_>) -> Vec<u8> {
        let body: Vec<u8> = self
            .interfaces
            .iter()
            .flat_map(|iface| iface.get_descriptor(speed, m))
            .collect();
        let [t0, t1] = ((9 + body.len()) as u16).to_le_bytes();
        let mut out = vec![
            9,
            descriptor_type,
            t0,
            t1,
            self.interfaces.len() as u8,
            self.value,
            self.string_index,
            self.attributes.bits(),
            self.max_power,
        ];
        out.extend(body);
        out
    }

    /// First class handler found among the interfaces; later interfaces never override it.
    pub fn class_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        self.interfaces
            .iter_mut()
            .find(|iface| iface.has_class_handler())
            .and_then(Interface::class_handler_mut)
    }

    /// First vendor handler found among the interfaces.
    pub fn vendor_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        self.interfaces
            .iter_mut()
            .find(|iface| iface.has_vendor_handler())
            .and_then(Interface::vendor_handler_mut)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("value", &self.value)
            .field("attributes", &self.attributes)
            .field("max_power", &self.max_power)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}
