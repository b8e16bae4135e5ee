//! The emulated device: descriptor tree, enumeration state and request dispatch.
//!
//! [`DeviceModel`] is the passive part (identity, strings, configurations, state) and is what
//! device profiles build. [`Device`] binds a model to a transport and an application and turns
//! inbound host traffic into replies.

mod policy;
mod requests;
mod strings;

pub use policy::{DevicePolicy, InvalidConfigurationPolicy, OtherRecipientPolicy};
pub use strings::StringTable;

use std::collections::BTreeMap;

use crate::app::{Application, NullApplication};
use crate::bos::BinaryObjectStore;
use crate::configuration::Configuration;
use crate::descriptor::{
    hub_descriptor, string_descriptor_langid, string_descriptor_utf16le, UsbSpeed, DESC_BOS,
    DESC_CONFIGURATION, DESC_DEVICE, DESC_DEVICE_QUALIFIER, DESC_HUB,
    DESC_OTHER_SPEED_CONFIGURATION, DESC_STRING, LANGID_EN_US,
};
use crate::endpoint::Endpoint;
use crate::error::{UsbError, UsbResult};
use crate::handler::{DeviceContext, HandlerTable, RequestFn, RequestHandler, RequestOverrides};
use crate::interface::Interface;
use crate::mutation::{Mutator, Stage};
use crate::phy::{HostEvent, Phy};
use crate::setup::{RequestRecipient, RequestType, SetupRequest};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceState {
    #[default]
    Detached,
    Powered,
    Configured,
}

/// Identity fields of the device descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub usb_version: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub max_packet_size_ep0: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub revision: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            usb_version: 0x0200,
            class: 0,
            subclass: 0,
            protocol: 0,
            max_packet_size_ep0: 64,
            vendor_id: 0,
            product_id: 0,
            revision: 0,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }
}

/// Location of an endpoint inside the active configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct EndpointSlot {
    interface: usize,
    endpoint: usize,
}

pub struct DeviceModel {
    info: DeviceInfo,
    strings: StringTable,
    manufacturer_index: u8,
    product_index: u8,
    serial_index: u8,
    configurations: Vec<Configuration>,
    active: Option<usize>,
    endpoints: BTreeMap<u8, EndpointSlot>,
    state: DeviceState,
    speed: UsbSpeed,
    address: u8,
    remote_wakeup: bool,
    bos: Option<BinaryObjectStore>,
    policy: DevicePolicy,
    request_overrides: RequestOverrides<DeviceModel>,
}

impl DeviceModel {
    /// Builds the model, numbering configurations from 1 and registering the identity,
    /// configuration and interface strings in that order.
    pub fn new(info: DeviceInfo, mut configurations: Vec<Configuration>) -> UsbResult<Self> {
        if configurations.is_empty() {
            return Err(UsbError::NoConfigurations);
        }
        if u8::try_from(configurations.len()).is_err() {
            return Err(UsbError::TooManyConfigurations {
                count: configurations.len(),
            });
        }
        let mut strings = StringTable::new();
        let mut register = |s: &Option<String>| s.as_deref().map_or(0, |s| strings.get_id(s));
        let manufacturer_index = register(&info.manufacturer);
        let product_index = register(&info.product);
        let serial_index = register(&info.serial);

        for (value, cfg) in (1..=u8::MAX).zip(configurations.iter_mut()) {
            cfg.set_value(value);
            if let Some(name) = cfg.name().map(str::to_owned) {
                cfg.set_string_index(strings.get_id(&name));
            }
            for iface in cfg.interfaces_mut() {
                if let Some(name) = iface.name().map(str::to_owned) {
                    iface.set_string_index(strings.get_id(&name));
                }
            }
        }

        Ok(Self {
            info,
            strings,
            manufacturer_index,
            product_index,
            serial_index,
            configurations,
            active: None,
            endpoints: BTreeMap::new(),
            state: DeviceState::Detached,
            speed: UsbSpeed::Full,
            address: 0,
            remote_wakeup: false,
            bos: None,
            policy: DevicePolicy::default(),
            request_overrides: RequestOverrides::new(),
        })
    }

    pub fn with_bos(mut self, bos: BinaryObjectStore) -> Self {
        self.bos = Some(bos);
        self
    }

    pub fn with_speed(mut self, speed: UsbSpeed) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_policy(mut self, policy: DevicePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the standard device handler for `request`. Overrides win over the built-in table.
    pub fn with_request_override(mut self, request: u8, handler: RequestFn<DeviceModel>) -> Self {
        self.request_overrides.insert(request, handler);
        self
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Identity fields that carry no string (ids, class triple, version) may be changed freely.
    pub fn info_mut(&mut self) -> &mut DeviceInfo {
        &mut self.info
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn speed(&self) -> UsbSpeed {
        self.speed
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn remote_wakeup(&self) -> bool {
        self.remote_wakeup
    }

    pub fn policy(&self) -> DevicePolicy {
        self.policy
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn get_string_id(&mut self, s: &str) -> u8 {
        self.strings.get_id(s)
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    /// 0-based index of the active configuration.
    pub fn active_configuration_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_configuration(&self) -> Option<&Configuration> {
        self.configurations.get(self.active?)
    }

    fn active_configuration_mut(&mut self) -> Option<&mut Configuration> {
        self.configurations.get_mut(self.active?)
    }

    /// Endpoint numbers reachable in the active configuration.
    pub fn endpoint_numbers(&self) -> Vec<u8> {
        self.endpoints.keys().copied().collect()
    }

    pub fn interface_mut(&mut self, idx: usize) -> Option<&mut Interface> {
        self.active_configuration_mut()?.interface_mut(idx)
    }

    pub fn endpoint_mut(&mut self, number: u8) -> Option<&mut Endpoint> {
        let slot = *self.endpoints.get(&number)?;
        self.interface_mut(slot.interface)?.endpoint_mut(slot.endpoint)
    }

    pub fn class_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        self.active_configuration_mut()?.class_handler_mut()
    }

    pub fn vendor_handler_mut(&mut self) -> Option<&mut dyn RequestHandler> {
        self.active_configuration_mut()?.vendor_handler_mut()
    }

    /// Applies SET_CONFIGURATION with the 1-based wire `value`. Returns whether the request was
    /// accepted.
    ///
    /// Value 0 returns the device to the unconfigured state. Values above the configuration
    /// count are handled according to [`DevicePolicy::invalid_configuration`].
    pub fn set_configuration(&mut self, value: u8) -> bool {
        if value == 0 {
            tracing::info!("configuration cleared");
            self.active = None;
            self.endpoints = BTreeMap::new();
            self.state = DeviceState::Powered;
            return true;
        }

        let idx = if usize::from(value) > self.configurations.len() {
            match self.policy.invalid_configuration {
                InvalidConfigurationPolicy::FallbackToFirst => {
                    tracing::error!(
                        value,
                        available = self.configurations.len(),
                        "host tried to set invalid configuration, using the first one"
                    );
                    0
                }
                InvalidConfigurationPolicy::Stall => {
                    tracing::error!(
                        value,
                        available = self.configurations.len(),
                        "host tried to set invalid configuration, stalling"
                    );
                    return false;
                }
            }
        } else {
            usize::from(value) - 1
        };

        let mut endpoints = BTreeMap::new();
        for (i, iface) in self.configurations[idx].interfaces().iter().enumerate() {
            for (e, ep) in iface.endpoints().iter().enumerate() {
                endpoints.insert(
                    ep.number(),
                    EndpointSlot {
                        interface: i,
                        endpoint: e,
                    },
                );
            }
        }

        tracing::info!(configuration = idx, endpoints = endpoints.len(), "setting configuration");
        self.active = Some(idx);
        self.endpoints = endpoints;
        self.state = DeviceState::Configured;
        true
    }

    /// Descriptor for a GET_DESCRIPTOR request addressed to the device, or `None` when the type
    /// is unknown or unavailable (the caller stalls).
    pub fn get_descriptor(
        &self,
        descriptor_type: u8,
        index: u8,
        m: &mut Mutator<'_>,
    ) -> Option<Vec<u8>> {
        match descriptor_type {
            DESC_DEVICE => Some(self.get_device_descriptor(m)),
            DESC_CONFIGURATION => self
                .configuration_or_first(index)
                .map(|cfg| cfg.get_descriptor(self.speed, m)),
            DESC_OTHER_SPEED_CONFIGURATION => self
                .configuration_or_first(index)
                .map(|cfg| cfg.get_other_speed_descriptor(self.speed.other(), m)),
            DESC_STRING => self.get_string_descriptor(index, m),
            DESC_HUB => Some(m.mutable(Stage::HubDescriptor, |_| hub_descriptor())),
            DESC_DEVICE_QUALIFIER => Some(self.get_device_qualifier_descriptor(m)),
            DESC_BOS => self.bos.as_ref().map(|bos| bos.get_descriptor(m)),
            _ => None,
        }
    }

    /// Configuration at the 0-based descriptor `index`, or the first one when out of range.
    fn configuration_or_first(&self, index: u8) -> Option<&Configuration> {
        self.configurations
            .get(usize::from(index))
            .or_else(|| self.configurations.first())
    }

    pub fn get_device_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::DeviceDescriptor, |_| {
            let info = &self.info;
            let [u0, u1] = info.usb_version.to_le_bytes();
            let [v0, v1] = info.vendor_id.to_le_bytes();
            let [p0, p1] = info.product_id.to_le_bytes();
            let [r0, r1] = info.revision.to_le_bytes();
            vec![
                18,
                DESC_DEVICE,
                u0,
                u1,
                info.class,
                info.subclass,
                info.protocol,
                info.max_packet_size_ep0,
                v0,
                v1,
                p0,
                p1,
                r0,
                r1,
                self.manufacturer_index,
                self.product_index,
                self.serial_index,
                self.configurations.len() as u8,
            ]
        })
    }

    pub fn get_device_qualifier_descriptor(&self, m: &mut Mutator<'_>) -> Vec<u8> {
        m.mutable(Stage::DeviceQualifierDescriptor, |_| {
            let info = &self.info;
            let [u0, u1] = info.usb_version.to_le_bytes();
            vec![
                10,
                DESC_DEVICE_QUALIFIER,
                u0,
                u1,
                info.class,
                info.subclass,
                info.protocol,
                info.max_packet_size_ep0,
                self.configurations.len() as u8,
                0, // bReserved
            ]
        })
    }

    pub fn get_string_descriptor(&self, index: u8, m: &mut Mutator<'_>) -> Option<Vec<u8>> {
        if index == 0 {
            return Some(m.mutable(Stage::StringDescriptorZero, |_| {
                string_descriptor_langid(LANGID_EN_US).to_vec()
            }));
        }
        let s = self.strings.get(index)?;
        Some(m.mutable(Stage::StringDescriptor, |_| string_descriptor_utf16le(s)))
    }
}

impl core::fmt::Debug for DeviceModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceModel")
            .field("info", &self.info)
            .field("state", &self.state)
            .field("speed", &self.speed)
            .field("active", &self.active)
            .field("configurations", &self.configurations)
            .field("bos", &self.bos)
            .finish_non_exhaustive()
    }
}

/// A device model bound to a transport and an application.
pub struct Device<P, A = NullApplication> {
    model: DeviceModel,
    requests: HandlerTable<DeviceModel>,
    phy: P,
    app: A,
}

impl<P: Phy, A: Application> Device<P, A> {
    pub fn new(mut model: DeviceModel, phy: P, app: A) -> Self {
        let overrides = core::mem::take(&mut model.request_overrides);
        Self {
            requests: requests::standard_requests().merged(overrides),
            model,
            phy,
            app,
        }
    }

    pub fn model(&self) -> &DeviceModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut DeviceModel {
        &mut self.model
    }

    pub fn state(&self) -> DeviceState {
        self.model.state
    }

    pub fn phy(&self) -> &P {
        &self.phy
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.app
    }

    pub fn into_app(self) -> A {
        self.app
    }

    pub fn get_string_id(&mut self, s: &str) -> u8 {
        self.model.get_string_id(s)
    }

    pub fn connect(&mut self) -> UsbResult<()> {
        self.phy.connect()?;
        self.model.state = DeviceState::Powered;
        tracing::info!("device connected");
        Ok(())
    }

    pub fn disconnect(&mut self) -> UsbResult<()> {
        self.phy.disconnect()?;
        self.model.state = DeviceState::Detached;
        tracing::info!("device disconnected");
        Ok(())
    }

    /// Descriptor as the host would receive it, mutations included.
    pub fn get_descriptor(&mut self, descriptor_type: u8, index: u8) -> Option<Vec<u8>> {
        self.model
            .get_descriptor(descriptor_type, index, &mut Mutator::new(&mut self.app))
    }

    /// Runs SET_CONFIGURATION as if the host had sent it.
    pub fn set_configuration(&mut self, value: u8) -> UsbResult<()> {
        self.handle_request(&SetupRequest::new(
            0x00,
            crate::descriptor::REQ_SET_CONFIGURATION,
            u16::from(value),
            0,
            0,
        ))
    }

    /// Decodes a raw SETUP packet (plus OUT data stage) and dispatches it.
    pub fn handle_setup(&mut self, raw: &[u8]) -> UsbResult<()> {
        let req = SetupRequest::parse(raw)?;
        self.handle_request(&req)
    }

    pub fn handle_request(&mut self, req: &SetupRequest) -> UsbResult<()> {
        self.app.signal_setup_packet_received();
        tracing::debug!(%req, "setup packet");

        let Device {
            model,
            requests,
            phy,
            app,
        } = self;
        let speed = model.speed;
        let other_recipient = model.policy.other_recipient;
        let mut cx = DeviceContext::new(phy, app, speed);

        let result = match req.kind() {
            RequestType::Standard => match req.recipient() {
                RequestRecipient::Device => requests.dispatch(model, &mut cx, req),
                RequestRecipient::Interface => {
                    let idx = usize::from(req.index & 0xff);
                    match model.interface_mut(idx) {
                        Some(iface) => iface.handle_request(&mut cx, req),
                        None => {
                            tracing::warn!(interface = idx, %req, "request for unknown interface");
                            stall_unresolved(&mut cx, req)
                        }
                    }
                }
                RequestRecipient::Endpoint => {
                    let number = req.recipient_index() as u8;
                    match model.endpoint_mut(number) {
                        Some(ep) => ep.handle_request(&mut cx, req),
                        None => {
                            tracing::warn!(ep = number, %req, "request for unknown endpoint");
                            stall_unresolved(&mut cx, req)
                        }
                    }
                }
                RequestRecipient::Other => match other_recipient {
                    OtherRecipientPolicy::FirstInterface => match model.interface_mut(0) {
                        Some(iface) => iface.handle_request(&mut cx, req),
                        None => stall_unresolved(&mut cx, req),
                    },
                    OtherRecipientPolicy::Stall => stall_unresolved(&mut cx, req),
                },
                RequestRecipient::Reserved(_) => stall_unresolved(&mut cx, req),
            },
            RequestType::Class => match model.class_handler_mut() {
                Some(handler) => handler.handle_request(&mut cx, req),
                None => stall_unresolved(&mut cx, req),
            },
            RequestType::Vendor => match model.vendor_handler_mut() {
                Some(handler) => handler.handle_request(&mut cx, req),
                None => stall_unresolved(&mut cx, req),
            },
            RequestType::Reserved => stall_unresolved(&mut cx, req),
        };

        if let Err(err) = &result {
            tracing::error!(%req, %err, "request handler failed");
        }
        result
    }

    /// OUT data for endpoint `ep`. Ignored unless the device is configured and `ep` belongs to
    /// the active configuration.
    pub fn handle_data_available(&mut self, ep: u8, data: &[u8]) -> UsbResult<()> {
        let Device { model, phy, app, .. } = self;
        if model.state != DeviceState::Configured {
            tracing::debug!(ep, len = data.len(), "data before configuration, ignored");
            return Ok(());
        }
        let speed = model.speed;
        let Some(endpoint) = model.endpoint_mut(ep) else {
            tracing::debug!(ep, len = data.len(), "data for unknown endpoint, ignored");
            return Ok(());
        };
        let mut cx = DeviceContext::new(phy, app, speed);
        cx.usb_function_supported(&format!("data received on endpoint {ep:#x}"));
        let result = endpoint.handle_data_available(&mut cx, data);
        if let Err(err) = &result {
            tracing::error!(ep, %err, "endpoint data handler failed");
        }
        result
    }

    /// IN endpoint `ep` can take more data.
    pub fn handle_buffer_available(&mut self, ep: u8) -> UsbResult<()> {
        let Device { model, phy, app, .. } = self;
        if model.state != DeviceState::Configured {
            return Ok(());
        }
        let speed = model.speed;
        let Some(endpoint) = model.endpoint_mut(ep) else {
            return Ok(());
        };
        let mut cx = DeviceContext::new(phy, app, speed);
        let result = endpoint.handle_buffer_available(&mut cx);
        if let Err(err) = &result {
            tracing::error!(ep, %err, "endpoint buffer handler failed");
        }
        result
    }

    pub fn handle_event(&mut self, event: HostEvent) -> UsbResult<()> {
        match event {
            HostEvent::Setup { bytes } => self.handle_setup(&bytes),
            HostEvent::Data { ep, data } => self.handle_data_available(ep, &data),
            HostEvent::BufferAvailable { ep } => self.handle_buffer_available(ep),
        }
    }

    /// Asks the application whether the session should end, disconnecting if so.
    pub fn poll_stop(&mut self) -> UsbResult<bool> {
        if !self.app.should_stop_phy() {
            return Ok(false);
        }
        tracing::info!("application requested stop");
        self.disconnect()?;
        Ok(true)
    }

    /// Connects, feeds `events` one at a time and disconnects when they run out or the
    /// application asks to stop.
    pub fn run(&mut self, events: impl IntoIterator<Item = HostEvent>) -> UsbResult<()> {
        self.connect()?;
        for event in events {
            if self.poll_stop()? {
                return Ok(());
            }
            self.handle_event(event)?;
        }
        if !self.poll_stop()? {
            self.disconnect()?;
        }
        Ok(())
    }
}

impl<P, A> core::fmt::Debug for Device<P, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("model", &self.model)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

fn stall_unresolved(cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
    tracing::debug!(%req, "no handler for request, stalling");
    cx.stall()
}
