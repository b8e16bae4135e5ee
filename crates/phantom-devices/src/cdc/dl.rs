//! CDC Direct Line Control Model.

use phantom_usb::{DeviceModel, UsbResult};

use super::{ReceivedLines, Variant, FD_DIRECT_LINE, SUBCLASS_DIRECT_LINE};
use crate::options::ProfileOptions;

pub const JUNK_FRAME: &[u8] = &[
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

pub fn build(options: &ProfileOptions) -> UsbResult<DeviceModel> {
    build_with_lines(options, ReceivedLines::default())
}

pub fn build_with_lines(options: &ProfileOptions, lines: ReceivedLines) -> UsbResult<DeviceModel> {
    super::build(
        Variant {
            product: "CDC DL Device",
            subclass: SUBCLASS_DIRECT_LINE,
            model_descriptor: FD_DIRECT_LINE,
            frame: JUNK_FRAME,
        },
        options,
        lines,
    )
}
