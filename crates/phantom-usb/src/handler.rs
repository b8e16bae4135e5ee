//! Request handler tables and the context handlers run in.
//!
//! Every entity that can receive a control request (device, interface, endpoint, class and vendor
//! handlers) owns a [`HandlerTable`]: request code to handler function, plus a default handler
//! that is never absent. Tables are built in two stages: the entity's base table first, then an
//! optional override table merged once at construction, with the override taking precedence.

use core::fmt;
use std::collections::BTreeMap;

use crate::app::Application;
use crate::descriptor::UsbSpeed;
use crate::error::UsbResult;
use crate::mutation::Mutator;
use crate::phy::Phy;
use crate::setup::SetupRequest;

/// Borrowed view of the session a handler runs in: the transport and the application.
pub struct DeviceContext<'a> {
    phy: &'a mut dyn Phy,
    app: &'a mut dyn Application,
    speed: UsbSpeed,
}

impl<'a> DeviceContext<'a> {
    pub fn new(phy: &'a mut dyn Phy, app: &'a mut dyn Application, speed: UsbSpeed) -> Self {
        Self { phy, app, speed }
    }

    pub fn speed(&self) -> UsbSpeed {
        self.speed
    }

    pub fn send_on_endpoint(&mut self, ep: u8, data: &[u8]) -> UsbResult<()> {
        self.phy.send_on_endpoint(ep, data)?;
        Ok(())
    }

    /// Answers a control IN request, truncating to `wLength`.
    pub fn reply(&mut self, req: &SetupRequest, data: &[u8]) -> UsbResult<()> {
        let len = data.len().min(usize::from(req.length));
        tracing::trace!(request = req.request, sent = len, "control reply");
        self.send_on_endpoint(0, &data[..len])
    }

    /// Zero-length reply on the control endpoint.
    pub fn reply_empty(&mut self) -> UsbResult<()> {
        self.send_on_endpoint(0, &[])
    }

    pub fn stall(&mut self) -> UsbResult<()> {
        self.phy.stall_ep0()?;
        Ok(())
    }

    pub fn ack_status_stage(&mut self) -> UsbResult<()> {
        self.phy.ack_status_stage()?;
        Ok(())
    }

    pub fn usb_function_supported(&mut self, reason: &str) {
        tracing::debug!(reason, "usb function supported");
        self.app.usb_function_supported(reason);
    }

    pub fn mutator(&mut self) -> Mutator<'_> {
        Mutator::new(&mut *self.app)
    }
}

pub type RequestFn<S> = fn(&mut S, &mut DeviceContext<'_>, &SetupRequest) -> UsbResult<()>;

/// Override entries merged into a base table at construction.
pub type RequestOverrides<S> = BTreeMap<u8, RequestFn<S>>;

pub struct HandlerTable<S> {
    handlers: BTreeMap<u8, RequestFn<S>>,
    default: RequestFn<S>,
}

impl<S> HandlerTable<S> {
    pub fn new(default: RequestFn<S>) -> Self {
        Self {
            handlers: BTreeMap::new(),
            default,
        }
    }

    pub fn with(mut self, request: u8, handler: RequestFn<S>) -> Self {
        self.handlers.insert(request, handler);
        self
    }

    /// Merges `overrides` into the table. An override replaces the base entry for its code.
    pub fn merged(mut self, overrides: RequestOverrides<S>) -> Self {
        self.handlers.extend(overrides);
        self
    }

    pub fn contains(&self, request: u8) -> bool {
        self.handlers.contains_key(&request)
    }

    /// Handler for `request`, falling back to the default handler.
    pub fn lookup(&self, request: u8) -> RequestFn<S> {
        self.handlers.get(&request).copied().unwrap_or(self.default)
    }

    pub fn dispatch(
        &self,
        state: &mut S,
        cx: &mut DeviceContext<'_>,
        req: &SetupRequest,
    ) -> UsbResult<()> {
        (self.lookup(req.request))(state, cx, req)
    }
}

impl<S> Clone for HandlerTable<S> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            default: self.default,
        }
    }
}

impl<S> fmt::Debug for HandlerTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("requests", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Object-safe handler attached to an interface or endpoint for class/vendor requests.
pub trait RequestHandler {
    fn name(&self) -> &'static str;

    fn handle_request(&mut self, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Class,
    Vendor,
}

/// Class or vendor request handler: a table over some profile-specific state.
///
/// Unmapped request codes reach [`function_supported_default`], which answers with an empty
/// reply and tells the application the host talked to the function.
pub struct ClassHandler<S> {
    name: &'static str,
    kind: HandlerKind,
    state: S,
    table: HandlerTable<S>,
}

pub type VendorHandler<S> = ClassHandler<S>;

impl<S> ClassHandler<S> {
    pub fn class(name: &'static str, state: S) -> Self {
        Self::with_kind(name, HandlerKind::Class, state)
    }

    pub fn vendor(name: &'static str, state: S) -> Self {
        Self::with_kind(name, HandlerKind::Vendor, state)
    }

    fn with_kind(name: &'static str, kind: HandlerKind, state: S) -> Self {
        Self {
            name,
            kind,
            state,
            table: HandlerTable::new(function_supported_default::<S>),
        }
    }

    pub fn with_request(mut self, request: u8, handler: RequestFn<S>) -> Self {
        self.table = self.table.with(request, handler);
        self
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn handles(&self, request: u8) -> bool {
        self.table.contains(request)
    }
}

impl<S> RequestHandler for ClassHandler<S> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle_request(&mut self, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
        tracing::debug!(handler = self.name, kind = ?self.kind, %req, "class/vendor request");
        self.table.dispatch(&mut self.state, cx, req)
    }
}

impl<S> fmt::Debug for ClassHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHandler")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

pub fn function_supported_default<S>(
    _state: &mut S,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    cx.reply_empty()?;
    tracing::debug!(%req, "unhandled class/vendor request, returned an empty response");
    let reason = format!("{} request {:#04x} serviced", req.kind().as_str(), req.request);
    cx.usb_function_supported(&reason);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::NullApplication;
    use crate::phy::{Phy, PhyCall, RecordingPhy};

    fn reply_one(state: &mut u32, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
        *state += 1;
        cx.reply(req, &[1])
    }

    fn reply_two(state: &mut u32, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
        *state += 10;
        cx.reply(req, &[2, 2])
    }

    fn stall(_: &mut u32, cx: &mut DeviceContext<'_>, _: &SetupRequest) -> UsbResult<()> {
        cx.stall()
    }

    #[derive(Default)]
    struct Supported(Vec<String>);

    impl Application for Supported {
        fn usb_function_supported(&mut self, reason: &str) {
            self.0.push(reason.to_owned());
        }
    }

    #[test]
    fn overrides_take_precedence_over_base_entries() {
        let table = HandlerTable::new(stall as RequestFn<u32>)
            .with(1, reply_one)
            .merged(RequestOverrides::from([(1, reply_two as RequestFn<u32>)]));

        let mut phy = RecordingPhy::new();
        phy.connect().unwrap();
        let log = phy.log();
        let mut app = NullApplication;
        let mut cx = DeviceContext::new(&mut phy, &mut app, UsbSpeed::Full);
        let mut state = 0;
        table
            .dispatch(&mut state, &mut cx, &SetupRequest::new(0x80, 1, 0, 0, 8))
            .unwrap();
        assert_eq!(state, 10);
        assert_eq!(log.last_ep0_reply(), Some(vec![2, 2]));
    }

    #[test]
    fn unmapped_codes_fall_back_to_the_default() {
        let table = HandlerTable::new(stall as RequestFn<u32>).with(1, reply_one);
        let mut phy = RecordingPhy::new();
        phy.connect().unwrap();
        let log = phy.log();
        let mut app = NullApplication;
        let mut cx = DeviceContext::new(&mut phy, &mut app, UsbSpeed::Full);
        table
            .dispatch(&mut 0, &mut cx, &SetupRequest::new(0x80, 7, 0, 0, 8))
            .unwrap();
        assert_eq!(log.calls(), vec![PhyCall::Connect, PhyCall::StallEp0]);
    }

    #[test]
    fn class_default_replies_empty_and_signals_support() {
        let mut handler = ClassHandler::vendor("test-vendor", ());
        let mut phy = RecordingPhy::new();
        phy.connect().unwrap();
        let log = phy.log();
        let mut app = Supported::default();
        {
            let mut cx = DeviceContext::new(&mut phy, &mut app, UsbSpeed::Full);
            handler
                .handle_request(&mut cx, &SetupRequest::new(0xc0, 0x42, 0, 0, 4))
                .unwrap();
        }
        assert_eq!(log.last_ep0_reply(), Some(vec![]));
        assert_eq!(app.0, vec!["vendor request 0x42 serviced".to_owned()]);
        assert_eq!(handler.kind(), HandlerKind::Vendor);
    }

    #[test]
    fn reply_truncates_to_requested_length() {
        let mut phy = RecordingPhy::new();
        phy.connect().unwrap();
        let log = phy.log();
        let mut app = NullApplication;
        let mut cx = DeviceContext::new(&mut phy, &mut app, UsbSpeed::Full);
        cx.reply(&SetupRequest::new(0x80, 6, 0x0100, 0, 8), &[0u8; 18])
            .unwrap();
        assert_eq!(log.last_ep0_reply().map(|d| d.len()), Some(8));
    }
}
