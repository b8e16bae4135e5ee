//! USB Billboard device (class 0x11).
//!
//! A billboard only exists to describe, through its BOS, the alternate modes a USB Type-C
//! device failed to enter. Hosts that understand USB 2.01 read the BOS right after the device
//! descriptor, which is what marks the profile as supported.

use phantom_usb::bos::{AlternateMode, AlternateModeState, Billboard, Usb20Extension, USB20_EXT_LPM};
use phantom_usb::descriptor::{CLASS_BILLBOARD, DESC_BOS, REQ_GET_DESCRIPTOR};
use phantom_usb::{
    BinaryObjectStore, Configuration, DeviceContext, DeviceInfo, DeviceModel, Interface,
    SetupRequest, UsbResult,
};

use crate::options::ProfileOptions;

pub const BILLBOARD_VENDOR_ID: u16 = 0x2548;
pub const BILLBOARD_PRODUCT_ID: u16 = 0x1003;
pub const BILLBOARD_REVISION: u16 = 0x0100;

/// Billboard devices must report at least USB 2.01 so the host asks for the BOS.
pub const BILLBOARD_USB_VERSION: u16 = 0x0201;

/// DisplayPort standard/vendor id.
pub const SVID_DISPLAYPORT: u16 = 0xff01;

pub fn build(options: &ProfileOptions) -> UsbResult<DeviceModel> {
    let info = DeviceInfo {
        usb_version: BILLBOARD_USB_VERSION,
        class: CLASS_BILLBOARD,
        vendor_id: BILLBOARD_VENDOR_ID,
        product_id: BILLBOARD_PRODUCT_ID,
        revision: BILLBOARD_REVISION,
        manufacturer: Some("Phantom".into()),
        product: Some("Phantom Billboard".into()),
        serial: Some("00000001".into()),
        ..DeviceInfo::default()
    };
    let iface = Interface::new(0, CLASS_BILLBOARD, 0, 0);
    let mut model = DeviceModel::new(info, vec![Configuration::new(vec![iface])])?;

    let url_index = model.get_string_id("https://www.usb.org/");
    let mode_index = model.get_string_id("DisplayPort");
    let bos = BinaryObjectStore::new()
        .with_capability(Usb20Extension {
            attributes: USB20_EXT_LPM,
        })
        .with_capability(Billboard {
            additional_info_url: url_index,
            modes: vec![AlternateMode {
                svid: SVID_DISPLAYPORT,
                mode: 0,
                string_index: mode_index,
                state: AlternateModeState::Unsuccessful,
            }],
            ..Billboard::default()
        });

    let model = model
        .with_bos(bos)
        .with_request_override(REQ_GET_DESCRIPTOR, get_descriptor);
    Ok(options.apply(model))
}

/// Standard GET_DESCRIPTOR that also reports a BOS read as support.
fn get_descriptor(
    dev: &mut DeviceModel,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let descriptor_type = req.descriptor_type();
    let desc = dev.get_descriptor(descriptor_type, req.descriptor_index(), &mut cx.mutator());
    let Some(desc) = desc else {
        tracing::debug!(descriptor_type, "descriptor unavailable, stalling");
        return cx.stall();
    };
    if descriptor_type == DESC_BOS {
        cx.usb_function_supported("billboard BOS requested");
    }
    cx.reply(req, &desc)
}
