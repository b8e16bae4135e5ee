//! External USB hub (class 0x09) with four downstream ports and nothing attached.
//!
//! Port state follows the hub class feature requests closely enough for a host hub driver to
//! power the ports and poll them; there is never a connection to report.

use phantom_usb::descriptor::{
    hub_descriptor, CLASS_HUB, REQ_CLEAR_FEATURE, REQ_GET_DESCRIPTOR, REQ_GET_STATUS,
    REQ_SET_FEATURE,
};
use phantom_usb::{
    ClassHandler, Configuration, DeviceContext, DeviceInfo, DeviceModel, Endpoint,
    EndpointDirection, EndpointHandler, Interface, RequestRecipient, SetupRequest, Stage,
    TransferType, UsbResult,
};

use crate::options::ProfileOptions;

pub const HUB_VENDOR_ID: u16 = 0x05e3;
pub const HUB_PRODUCT_ID: u16 = 0x0608;
pub const HUB_REVISION: u16 = 0x7764;

/// Matches `bNbrPorts` of the hub class descriptor.
pub const NUM_PORTS: usize = 4;

const EP_STATUS_CHANGE: u8 = 1;

const PORT_FEATURE_ENABLE: u16 = 1;
const PORT_FEATURE_SUSPEND: u16 = 2;
const PORT_FEATURE_RESET: u16 = 4;
const PORT_FEATURE_POWER: u16 = 8;
const PORT_FEATURE_C_CONNECTION: u16 = 16;
const PORT_FEATURE_C_ENABLE: u16 = 17;
const PORT_FEATURE_C_SUSPEND: u16 = 18;
const PORT_FEATURE_C_OVER_CURRENT: u16 = 19;
const PORT_FEATURE_C_RESET: u16 = 20;

const PORT_STATUS_ENABLE: u16 = 1 << 1;
const PORT_STATUS_SUSPEND: u16 = 1 << 2;
const PORT_STATUS_POWER: u16 = 1 << 8;

const PORT_CHANGE_ENABLE: u16 = 1 << 1;
const PORT_CHANGE_SUSPEND: u16 = 1 << 2;
const PORT_CHANGE_RESET: u16 = 1 << 4;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HubPort {
    pub powered: bool,
    pub enabled: bool,
    pub suspended: bool,
    enable_change: bool,
    suspend_change: bool,
    reset_change: bool,
}

impl HubPort {
    /// `wPortStatus`. Nothing is ever connected, so the connection bit stays clear.
    pub fn status(&self) -> u16 {
        let mut st = 0;
        if self.enabled {
            st |= PORT_STATUS_ENABLE;
        }
        if self.suspended {
            st |= PORT_STATUS_SUSPEND;
        }
        if self.powered {
            st |= PORT_STATUS_POWER;
        }
        st
    }

    /// `wPortChange`.
    pub fn change(&self) -> u16 {
        let mut ch = 0;
        if self.enable_change {
            ch |= PORT_CHANGE_ENABLE;
        }
        if self.suspend_change {
            ch |= PORT_CHANGE_SUSPEND;
        }
        if self.reset_change {
            ch |= PORT_CHANGE_RESET;
        }
        ch
    }

    /// Only the hub enables a port, after a reset with a device connected. No device ever
    /// connects here, so enabling is refused.
    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            tracing::debug!(powered = self.powered, "port enable refused, nothing connected");
            return;
        }
        if enabled != self.enabled {
            self.enabled = enabled;
            self.enable_change = true;
        }
        if !enabled {
            self.suspended = false;
        }
    }

    fn set_suspended(&mut self, suspended: bool) {
        if suspended && !(self.enabled && self.powered) {
            return;
        }
        if suspended != self.suspended {
            self.suspended = suspended;
            self.suspend_change = true;
        }
    }

    fn set_powered(&mut self, powered: bool) {
        self.powered = powered;
        if !powered {
            self.set_enabled(false);
        }
    }

    /// Resets complete immediately. With no device behind the port it stays disabled.
    fn reset(&mut self) {
        self.set_enabled(false);
        self.reset_change = true;
    }

    /// Applies a port SET_FEATURE or CLEAR_FEATURE. Returns `false` for unknown selectors.
    fn apply_feature(&mut self, feature: u16, set: bool) -> bool {
        match (feature, set) {
            (PORT_FEATURE_ENABLE, _) => self.set_enabled(set),
            (PORT_FEATURE_SUSPEND, _) => self.set_suspended(set),
            (PORT_FEATURE_POWER, _) => self.set_powered(set),
            (PORT_FEATURE_RESET, true) => self.reset(),
            (PORT_FEATURE_C_CONNECTION | PORT_FEATURE_C_OVER_CURRENT, false) => {}
            (PORT_FEATURE_C_ENABLE, false) => self.enable_change = false,
            (PORT_FEATURE_C_SUSPEND, false) => self.suspend_change = false,
            (PORT_FEATURE_C_RESET, false) => self.reset_change = false,
            _ => return false,
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubState {
    pub ports: [HubPort; NUM_PORTS],
}

impl Default for HubState {
    fn default() -> Self {
        Self {
            ports: [HubPort::default(); NUM_PORTS],
        }
    }
}

impl HubState {
    /// Port addressed by a 1-based `wIndex`.
    fn port_mut(&mut self, index: u16) -> Option<&mut HubPort> {
        let idx = usize::from(index & 0xff).checked_sub(1)?;
        self.ports.get_mut(idx)
    }
}

pub fn class_handler() -> ClassHandler<HubState> {
    ClassHandler::class("hub", HubState::default())
        .with_request(REQ_GET_STATUS, get_status)
        .with_request(REQ_GET_DESCRIPTOR, get_hub_descriptor)
        .with_request(REQ_SET_FEATURE, set_feature)
        .with_request(REQ_CLEAR_FEATURE, clear_feature)
}

fn get_status(
    state: &mut HubState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if req.recipient() != RequestRecipient::Other {
        return cx.reply(req, &[0, 0, 0, 0]);
    }
    let Some(port) = state.port_mut(req.index) else {
        tracing::warn!(port = req.index, "status request for unknown hub port");
        return cx.stall();
    };
    let [s0, s1] = port.status().to_le_bytes();
    let [c0, c1] = port.change().to_le_bytes();
    cx.reply(req, &[s0, s1, c0, c1])
}

fn get_hub_descriptor(
    _: &mut HubState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let desc = cx.mutator().mutable(Stage::HubDescriptor, |_| hub_descriptor());
    cx.usb_function_supported("hub descriptor requested");
    cx.reply(req, &desc)
}

fn set_feature(
    state: &mut HubState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    apply_feature(state, cx, req, true)
}

fn clear_feature(
    state: &mut HubState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    apply_feature(state, cx, req, false)
}

fn apply_feature(
    state: &mut HubState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
    set: bool,
) -> UsbResult<()> {
    // Hub-level features (C_HUB_LOCAL_POWER, C_HUB_OVER_CURRENT) carry no state.
    if req.recipient() == RequestRecipient::Other {
        let Some(port) = state.port_mut(req.index) else {
            tracing::warn!(port = req.index, "feature request for unknown hub port");
            return cx.stall();
        };
        if !port.apply_feature(req.value, set) {
            tracing::debug!(port = req.index, feature = req.value, set, "unsupported port feature");
        }
    }
    cx.ack_status_stage()
}

/// Interrupt IN handler. With nothing ever attached there is no change to report, so the
/// endpoint stays silent, as a hub NAKs its status-change pipe when idle.
struct StatusChange;

impl EndpointHandler for StatusChange {
    fn buffer_available(&mut self, _cx: &mut DeviceContext<'_>) -> UsbResult<()> {
        tracing::trace!("hub status change poll, nothing to report");
        Ok(())
    }
}

pub fn build(options: &ProfileOptions) -> UsbResult<DeviceModel> {
    let iface = Interface::new(0, CLASS_HUB, 0, 0)
        .with_endpoint(
            Endpoint::new(EP_STATUS_CHANGE, EndpointDirection::In, TransferType::Interrupt, 1)
                .with_interval(0x0c)
                .with_handler(StatusChange),
        )
        .with_class_handler(class_handler());

    let info = DeviceInfo {
        class: CLASS_HUB,
        vendor_id: HUB_VENDOR_ID,
        product_id: HUB_PRODUCT_ID,
        revision: HUB_REVISION,
        manufacturer: Some("Phantom".into()),
        product: Some("Phantom Hub".into()),
        serial: Some("00000001".into()),
        ..DeviceInfo::default()
    };
    let model = DeviceModel::new(info, vec![Configuration::new(vec![iface])])?;
    Ok(options.apply(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powered_port_reports_power_bit() {
        let mut port = HubPort::default();
        assert!(port.apply_feature(PORT_FEATURE_POWER, true));
        assert_eq!(port.status(), PORT_STATUS_POWER);
        assert_eq!(port.change(), 0);
    }

    #[test]
    fn reset_sets_and_clears_its_change_bit() {
        let mut port = HubPort::default();
        port.apply_feature(PORT_FEATURE_POWER, true);
        port.apply_feature(PORT_FEATURE_RESET, true);
        assert_eq!(port.change(), PORT_CHANGE_RESET);
        assert!(!port.enabled);
        port.apply_feature(PORT_FEATURE_C_RESET, false);
        assert_eq!(port.change(), 0);
    }

    #[test]
    fn enable_is_refused_without_a_connection() {
        let mut port = HubPort::default();
        port.apply_feature(PORT_FEATURE_POWER, true);
        assert!(port.apply_feature(PORT_FEATURE_ENABLE, true));
        assert!(!port.enabled);
        assert_eq!(port.status(), PORT_STATUS_POWER);
        assert_eq!(port.change(), 0);
    }

    #[test]
    fn suspend_requires_an_enabled_port() {
        let mut port = HubPort::default();
        port.apply_feature(PORT_FEATURE_SUSPEND, true);
        assert!(!port.suspended);
        assert!(!port.apply_feature(0x99, true));
    }

    #[test]
    fn ports_are_addressed_from_one() {
        let mut state = HubState::default();
        assert!(state.port_mut(0).is_none());
        assert!(state.port_mut(1).is_some());
        assert!(state.port_mut(NUM_PORTS as u16).is_some());
        assert!(state.port_mut(NUM_PORTS as u16 + 1).is_none());
    }
}
