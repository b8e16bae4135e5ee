use core::fmt;

use crate::class_specific::CsEndpointDescriptor;
use crate::descriptor::{
    UsbSpeed, DESC_ENDPOINT, FEATURE_ENDPOINT_HALT, REQ_CLEAR_FEATURE, REQ_GET_STATUS,
    REQ_SET_FEATURE,
};
use crate::error::UsbResult;
use crate::handler::{DeviceContext, HandlerTable, RequestFn, RequestHandler, RequestOverrides};
use crate::mutation::{Mutator, Stage};
use crate::setup::SetupRequest;

/// Max packet size every bulk/interrupt endpoint reports when running at high speed.
pub const HIGH_SPEED_MAX_PACKET_SIZE: u16 = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointDirection {
    Out = 0,
    In = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncType {
    #[default]
    None = 0,
    Async = 1,
    Adaptive = 2,
    Synchronous = 3,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UsageType {
    #[default]
    Data = 0,
    Feedback = 1,
    ImplicitFeedback = 2,
}

/// Callback for traffic on a non-control endpoint.
///
/// OUT endpoints receive [`EndpointHandler::data_available`]; IN endpoints are told when the
/// transport can take more data.
pub trait EndpointHandler {
    fn data_available(&mut self, _cx: &mut DeviceContext<'_>, _data: &[u8]) -> UsbResult<()> {
        Ok(())
    }

    fn buffer_available(&mut self, _cx: &mut DeviceContext<'_>) -> UsbResult<()> {
        Ok(())
    }
}

/// State reachable from endpoint-recipient standard requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EndpointStatus {
    pub halted: bool,
}

pub struct Endpoint {
    number: u8,
    direction: EndpointDirection,
    transfer_type: TransferType,
    sync_type: SyncType,
    usage_type: UsageType,
    max_packet_size: u16,
    interval: u8,
    cs_descriptors: Vec<CsEndpointDescriptor>,
    handler: Option<Box<dyn EndpointHandler>>,
    class_handler: Option<Box<dyn RequestHandler>>,
    vendor_handler: Option<Box<dyn RequestHandler>>,
    status: EndpointStatus,
    requests: HandlerTable<EndpointStatus>,
}

impl Endpoint {
    pub fn new(
        number: u8,
        direction: EndpointDirection,
        transfer_type: TransferType,
        max_packet_size: u16,
    ) -> Self {
        Self {
            number: number & 0x0f,
            direction,
            transfer_type,
            sync_type: SyncType::None,
            usage_type: UsageType::Data,
            max_packet_size,
            interval: 0,
            cs_descriptors: Vec::new(),
            handler: None,
            class_handler: None,
            vendor_handler: None,
            status: EndpointStatus::default(),
            requests: standard_requests(),
        }
    }

    pub fn with_interval(mut self, interval: u8) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_sync_type(mut self, sync_type: SyncType) -> Self {
        self.sync_type = sync_type;
        self
    }

    pub fn with_usage_type(mut self, usage_type: UsageType) -> Self {
        self.usage_type = usage_type;
        self
    }

    pub fn with_cs_descriptor(mut self, descriptor: CsEndpointDescriptor) -> Self {
        self.cs_descriptors.push(descriptor);
        self
    }

    pub fn with_handler(mut self, handler: impl EndpointHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
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

    pub fn with_request_overrides(mut self, overrides: RequestOverrides<EndpointStatus>) -> Self {
        self.requests = self.requests.merged(overrides);
        self
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn direction(&self) -> EndpointDirection {
        self.direction
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    pub fn status(&self) -> EndpointStatus {
        self.status
    }

    pub fn address(&self) -> u8 {
        (self.number & 0x0f) | ((self.direction as u8) << 7)
    }

    pub fn attributes(&self) -> u8 {
        (self.transfer_type as u8) | ((self.sync_type as u8) << 2) | ((self.usage_type as u8) << 4)
    }

    pub fn max_packet_size(&self, speed: UsbSpeed) -> u16 {
        match speed {
            UsbSpeed::High => HIGH_SPEED_MAX_PACKET_SIZE,
            UsbSpeed::Full => self.max_packet_size,
        }
    }

    /// Endpoint descriptor followed by its class-specific endpoint descriptors.
    pub fn get_descriptor(&self, speed: UsbSpeed, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::EndpointDescriptor, |m| {
            let [p0, p1] = self.max_packet_size(speed).to_le_bytes();
            let mut out = vec![
                7,
                DESC_ENDPOINT,
                self.address(),
                self.attributes(),
                p0,
                p1,
                self.interval,
            ];
            for cs in &self.cs_descriptors {
                out.extend(cs.get_descriptor(m));
            }
            out
        })
    }

    pub fn class_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        match &mut self.class_handler {
            Some(handler) => Some(handler.as_mut()),
            None => None,
        }
    }

    pub fn vendor_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        match &mut self.vendor_handler {
            Some(handler) => Some(handler.as_mut()),
            None => None,
        }
    }

    pub(crate) fn has_class_handler(&self) -> bool {
        self.class_handler.is_some()
    }

    pub(crate) fn has_vendor_handler(&self) -> bool {
        self.vendor_handler.is_some()
    }

    /// Standard request addressed to this endpoint.
    pub fn handle_request(
        &mut self,
        cx: &mut DeviceContext<'_>,
        req: &SetupRequest,
    ) -> UsbResult<()> {
        self.requests.dispatch(&mut self.status, cx, req)
    }

    pub fn handle_data_available(
        &mut self,
        cx: &mut DeviceContext<'_>,
        data: &[u8],
    ) -> UsbResult<()> {
        match &mut self.handler {
            Some(handler) => handler.data_available(cx, data),
            None => {
                tracing::debug!(ep = self.number, len = data.len(), "no handler for received data");
                Ok(())
            }
        }
    }

    pub fn handle_buffer_available(&mut self, cx: &mut DeviceContext<'_>) -> UsbResult<()> {
        match &mut self.handler {
            Some(handler) => handler.buffer_available(cx),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &format_args!("{:#04x}", self.address()))
            .field("transfer_type", &self.transfer_type)
            .field("max_packet_size", &self.max_packet_size)
            .field("interval", &self.interval)
            .field("cs_descriptors", &self.cs_descriptors.len())
            .field("has_handler", &self.handler.is_some())
            .finish_non_exhaustive()
    }
}

fn standard_requests() -> HandlerTable<EndpointStatus> {
    HandlerTable::new(empty_reply as RequestFn<EndpointStatus>)
        .with(REQ_GET_STATUS, get_status)
        .with(REQ_CLEAR_FEATURE, clear_feature)
        .with(REQ_SET_FEATURE, set_feature)
}

fn empty_reply(
    _: &mut EndpointStatus,
    cx: &mut DeviceContext<'_>,
    _: &SetupRequest,
) -> UsbResult<()> {
    cx.reply_empty()
}

fn get_status(
    status: &mut EndpointStatus,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    cx.reply(req, &[u8::from(status.halted), 0])
}

fn clear_feature(
    status: &mut EndpointStatus,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if req.value == FEATURE_ENDPOINT_HALT {
        status.halted = false;
    }
    cx.reply_empty()
}

fn set_feature(
    status: &mut EndpointStatus,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if req.value == FEATURE_ENDPOINT_HALT {
        status.halted = true;
    }
    cx.reply_empty()
}
