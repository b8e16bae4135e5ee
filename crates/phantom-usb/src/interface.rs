use core::fmt;
use std::collections::BTreeMap;

use crate::class_specific::CsInterfaceDescriptor;
use crate::descriptor::{
    legacy_class_descriptor_type, UsbSpeed, DESC_INTERFACE, REQ_GET_DESCRIPTOR, REQ_GET_INTERFACE,
    REQ_GET_STATUS, REQ_SET_INTERFACE,
};
use crate::endpoint::Endpoint;
use crate::error::UsbResult;
use crate::handler::{DeviceContext, HandlerTable, RequestFn, RequestHandler, RequestOverrides};
use crate::mutation::{Mutator, Stage};
use crate::setup::SetupRequest;

/// State reachable from interface-recipient standard requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InterfaceState {
    pub alternate_setting: u8,
    /// Descriptors served by GET_DESCRIPTOR addressed to the interface, keyed by type
    /// (HID class and report descriptors, for instance).
    pub descriptors: BTreeMap<u8, Vec<u8>>,
}

pub struct Interface {
    number: u8,
    class: u8,
    subclass: u8,
    protocol: u8,
    name: Option<String>,
    string_index: u8,
    endpoints: Vec<Endpoint>,
    cs_descriptors: Vec<CsInterfaceDescriptor>,
    class_handler: Option<Box<dyn RequestHandler>>,
    vendor_handler: Option<Box<dyn RequestHandler>>,
    state: InterfaceState,
    requests: HandlerTable<InterfaceState>,
}

impl Interface {
    pub fn new(number: u8, class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            number,
            class,
            subclass,
            protocol,
            name: None,
            string_index: 0,
            endpoints: Vec::new(),
            cs_descriptors: Vec::new(),
            class_handler: None,
            vendor_handler: None,
            state: InterfaceState::default(),
            requests: standard_requests(),
        }
    }

    pub fn with_alternate_setting(mut self, alternate_setting: u8) -> Self {
        self.state.alternate_setting = alternate_setting;
        self
    }

    /// Interface string; its index is assigned when the device is built.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_cs_descriptor(mut self, descriptor: CsInterfaceDescriptor) -> Self {
        self.cs_descriptors.push(descriptor);
        self
    }

    pub fn with_descriptor(mut self, descriptor_type: u8, bytes: impl Into<Vec<u8>>) -> Self {
        self.state.descriptors.insert(descriptor_type, bytes.into());
        self
    }

    pub fn with_class_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.class_handler = Some(Box::new(handler));
        self
    }

    pub fn with_vendor_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.vendor_handler = Some(Box::new(handler));
        self
    }

    pub fn with_request_overrides(mut self, overrides: RequestOverrides<InterfaceState>) -> Self {
        self.requests = self.requests.merged(overrides);
        self
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn class(&self) -> u8 {
        self.class
    }

    pub fn alternate_setting(&self) -> u8 {
        self.state.alternate_setting
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

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint_mut(&mut self, idx: usize) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(idx)
    }

    /// Interface descriptor, then the legacy class descriptor (if the class has one), then the
    /// class-specific interface descriptors, then every endpoint.
    pub fn get_descriptor(&self, speed: UsbSpeed, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::InterfaceDescriptor, |m| {
            let mut out = vec![
                9,
                DESC_INTERFACE,
                self.number,
                self.state.alternate_setting,
                self.endpoints.len() as u8,
                self.class,
                self.subclass,
                self.protocol,
                self.string_index,
            ];
            if let Some(legacy) = legacy_class_descriptor_type(self.class)
                .and_then(|ty| self.state.descriptors.get(&ty))
            {
                out.extend_from_slice(legacy);
            }
            for cs in &self.cs_descriptors {
                out.extend(cs.get_descriptor(m));
            }
            for ep in &self.endpoints {
                out.extend(ep.get_descriptor(speed, m));
            }
            out
        })
    }

    /// The interface's own class handler, else the first one found on its endpoints.
    pub fn class_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        match &mut self.class_handler {
            Some(handler) => Some(handler.as_mut()),
            None => self
                .endpoints
                .iter_mut()
                .find(|ep| ep.has_class_handler())
                .and_then(Endpoint::class_handler_mut),
        }
    }

    /// The interface's own vendor handler, else the first one found on its endpoints.
    pub fn vendor_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        match &mut self.vendor_handler {
            Some(handler) => Some(handler.as_mut()),
            None => self
                .endpoints
                .iter_mut()
                .find(|ep| ep.has_vendor_handler())
                .and_then(Endpoint::vendor_handler_mut),
        }
    }

    pub(crate) fn has_class_handler(&self) -> bool {
        self.class_handler.is_some() || self.endpoints.iter().any(Endpoint::has_class_handler)
    }

    pub(crate) fn has_vendor_handler(&self) -> bool {
        self.vendor_handler.is_some() || self.endpoints.iter().any(Endpoint::has_vendor_handler)
    }

    /// Standard request addressed to this interface.
    pub fn handle_request(
        &mut self,
        cx: &mut DeviceContext<'_>,
        req: &SetupRequest,
    ) -> UsbResult<()> {
        self.requests.dispatch(&mut self.state, cx, req)
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("number", &self.number)
            .field("class", &format_args!("{:#04x}", self.class))
            .field("subclass", &self.subclass)
            .field("protocol", &self.protocol)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

fn standard_requests() -> HandlerTable<InterfaceState> {
    HandlerTable::new(empty_reply as RequestFn<InterfaceState>)
        .with(REQ_GET_STATUS, get_status)
        .with(REQ_GET_DESCRIPTOR, get_descriptor)
        .with(REQ_GET_INTERFACE, get_interface)
        .with(REQ_SET_INTERFACE, empty_reply)
}

fn empty_reply(
    _: &mut InterfaceState,
    cx: &mut DeviceContext<'_>,
    _: &SetupRequest,
) -> UsbResult<()> {
    cx.reply_empty()
}

fn get_status(
    _: &mut InterfaceState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    cx.reply(req, &[0, 0])
}

fn get_interface(
    state: &mut InterfaceState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    cx.reply(req, &[state.alternate_setting])
}

fn get_descriptor(
    state: &mut InterfaceState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    match state.descriptors.get(&req.descriptor_type()) {
        Some(bytes) => cx.reply(req, bytes),
        None => {
            tracing::debug!(
                descriptor_type = req.descriptor_type(),
                "interface has no such descriptor, stalling"
            );
            cx.stall()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CLASS_CDC, CLASS_HID, DESC_HID, DESC_REPORT};
    use crate::endpoint::{EndpointDirection, TransferType};
    use crate::handler::ClassHandler;

    #[test]
    fn nesting_order_is_legacy_then_cs_then_endpoints() {
        let iface = Interface::new(0, CLASS_HID, 0, 0)
            .with_descriptor(DESC_HID, vec![9, DESC_HID, 0x11, 0x01, 0, 1, 0x22, 0x3f, 0])
            .with_cs_descriptor(CsInterfaceDescriptor::new([0xaa]))
            .with_endpoint(Endpoint::new(1, EndpointDirection::In, TransferType::Interrupt, 8));
        let bytes = iface.get_descriptor(UsbSpeed::Full, &mut Mutator::disabled());
        assert_eq!(bytes[4], 1, "bNumEndpoints");
        assert_eq!(bytes[9 + 1], DESC_HID);
        assert_eq!(&bytes[18..21], &[3, 0x24, 0xaa]);
        assert_eq!(bytes[21 + 1], 0x05);
        assert_eq!(bytes.len(), 9 + 9 + 3 + 7);
    }

    #[test]
    fn non_legacy_classes_skip_the_class_descriptor() {
        let iface = Interface::new(0, CLASS_CDC, 2, 1).with_descriptor(DESC_REPORT, vec![1, 2, 3]);
        let bytes = iface.get_descriptor(UsbSpeed::Full, &mut Mutator::disabled());
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn explicit_class_handler_wins_over_endpoint_handlers() {
        let mut iface = Interface::new(0, CLASS_CDC, 2, 1)
            .with_endpoint(
                Endpoint::new(1, EndpointDirection::In, TransferType::Bulk, 64)
                    .with_class_handler(ClassHandler::class("endpoint", ())),
            )
            .with_class_handler(ClassHandler::class("interface", ()));
        assert_eq!(iface.class_handler_mut().map(|h| h.name()), Some("interface"));
        assert!(iface.vendor_handler_mut().is_none());
    }

    #[test]
    fn first_endpoint_handler_is_inherited() {
        let mut iface = Interface::new(0, CLASS_CDC, 2, 1)
            .with_endpoint(Endpoint::new(1, EndpointDirection::Out, TransferType::Bulk, 64))
            .with_endpoint(
                Endpoint::new(2, EndpointDirection::In, TransferType::Bulk, 64)
                    .with_vendor_handler(ClassHandler::vendor("second", ())),
            )
            .with_endpoint(
                Endpoint::new(3, EndpointDirection::In, TransferType::Bulk, 64)
                    .with_vendor_handler(ClassHandler::vendor("third", ())),
            );
        assert!(iface.has_vendor_handler());
        assert_eq!(iface.vendor_handler_mut().map(|h| h.name()), Some("second"));
    }
}
