//! Standard requests addressed to the device itself.

use crate::configuration::ConfigAttributes;
use crate::descriptor::{
    FEATURE_DEVICE_REMOTE_WAKEUP, REQ_AOA_GET_PROTOCOL, REQ_CLEAR_FEATURE, REQ_GET_CONFIGURATION,
    REQ_GET_DESCRIPTOR, REQ_GET_INTERFACE, REQ_GET_STATUS, REQ_SET_ADDRESS, REQ_SET_CONFIGURATION,
    REQ_SET_DESCRIPTOR, REQ_SET_FEATURE, REQ_SET_INTERFACE, REQ_SYNCH_FRAME,
};
use crate::error::UsbResult;
use crate::handler::{DeviceContext, HandlerTable, RequestFn};
use crate::setup::SetupRequest;

use super::DeviceModel;

pub(super) fn standard_requests() -> HandlerTable<DeviceModel> {
    HandlerTable::new(empty_reply as RequestFn<DeviceModel>)
        .with(REQ_GET_STATUS, get_status)
        .with(REQ_CLEAR_FEATURE, clear_feature)
        .with(REQ_SET_FEATURE, set_feature)
        .with(REQ_SET_ADDRESS, set_address)
        .with(REQ_GET_DESCRIPTOR, get_descriptor)
        .with(REQ_SET_DESCRIPTOR, stall)
        .with(REQ_GET_CONFIGURATION, get_configuration)
        .with(REQ_SET_CONFIGURATION, set_configuration)
        .with(REQ_GET_INTERFACE, get_interface)
        .with(REQ_SET_INTERFACE, empty_reply)
        .with(REQ_SYNCH_FRAME, stall)
        .with(REQ_AOA_GET_PROTOCOL, aoa_get_protocol)
}

fn empty_reply(
    _: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    tracing::debug!(%req, "unknown device request, returning an empty response");
    cx.reply_empty()
}

fn stall(_: &mut DeviceModel, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
    tracing::debug!(%req, "unsupported device request, stalling");
    cx.stall()
}

fn get_status(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let attributes = dev
        .active_configuration()
        .or_else(|| dev.configurations().first())
        .map(|cfg| cfg.attributes())
        .unwrap_or_default();
    let mut status = 0u8;
    if attributes.contains(ConfigAttributes::SELF_POWERED) {
        status |= 1 << 0;
    }
    if dev.remote_wakeup() {
        status |= 1 << 1;
    }
    cx.reply(req, &[status, 0])
}

fn clear_feature(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if req.value == FEATURE_DEVICE_REMOTE_WAKEUP {
        dev.remote_wakeup = false;
    }
    cx.ack_status_stage()
}

fn set_feature(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if req.value == FEATURE_DEVICE_REMOTE_WAKEUP {
        dev.remote_wakeup = true;
    }
    cx.ack_status_stage()
}

fn set_address(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    dev.address = (req.value & 0x7f) as u8;
    tracing::debug!(address = dev.address, "address assigned");
    cx.ack_status_stage()
}

fn get_descriptor(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let descriptor = dev.get_descriptor(
        req.descriptor_type(),
        req.descriptor_index(),
        &mut cx.mutator(),
    );
    match descriptor {
        Some(bytes) => cx.reply(req, &bytes),
        None => {
            tracing::debug!(
                descriptor_type = req.descriptor_type(),
                index = req.descriptor_index(),
                "descriptor unavailable, stalling"
            );
            cx.stall()
        }
    }
}

fn get_configuration(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let value = dev.active_configuration().map_or(0, |cfg| cfg.value());
    cx.reply(req, &[value])
}

fn set_configuration(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    if dev.set_configuration((req.value & 0xff) as u8) {
        cx.ack_status_stage()
    } else {
        cx.stall()
    }
}

fn get_interface(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let alternate = dev
        .active_configuration()
        .and_then(|cfg| cfg.interfaces().get(usize::from(req.index)))
        .map(|iface| iface.alternate_setting());
    match alternate {
        Some(alternate) => cx.reply(req, &[alternate]),
        None => cx.stall(),
    }
}

/// Android Open Accessory protocol query. Protocol version 0 means "not an accessory".
fn aoa_get_protocol(
    _: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    tracing::debug!("AOA get protocol, reporting no support");
    cx.reply(req, &[0, 0])
}
