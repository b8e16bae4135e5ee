//! CDC Abstract Control Model, the usual USB serial modem.

use phantom_usb::{DeviceModel, UsbResult};

use super::{ReceivedLines, Variant, FD_ABSTRACT_CONTROL, SUBCLASS_ABSTRACT_CONTROL};
use crate::options::ProfileOptions;

/// Broadcast ARP request sent whenever the host polls the bulk IN endpoint.
pub const ARP_FRAME: &[u8] = &[
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x08, 0x06, 0x00, 0x01,
    0x08, 0x00, 0x06, 0x04, 0x00, 0x01, 0x60, 0x03, 0x08, 0xaa, 0xaa, 0xaa, 0xc0, 0xa8, 0x00, 0x65,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc0, 0xa8, 0x01, 0x00,
];

pub fn build(options: &ProfileOptions) -> UsbResult<DeviceModel> {
    build_with_lines(options, ReceivedLines::default())
}

/// Like [`build`], with a handle on the lines the device receives.
pub fn build_with_lines(options: &ProfileOptions, lines: ReceivedLines) -> UsbResult<DeviceModel> {
    super::build(
        Variant {
            product: "CDC ACM Device",
            subclass: SUBCLASS_ABSTRACT_CONTROL,
            model_descriptor: FD_ABSTRACT_CONTROL,
            frame: ARP_FRAME,
        },
        options,
        lines,
    )
}
