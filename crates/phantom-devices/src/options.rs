use phantom_usb::{DeviceModel, UsbSpeed};
use serde::{Deserialize, Serialize};

/// User overrides applied on top of a profile's defaults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOptions {
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub rev: Option<u16>,
    pub speed: Option<UsbSpeed>,
}

impl ProfileOptions {
    pub fn apply(&self, mut model: DeviceModel) -> DeviceModel {
        let info = model.info_mut();
        if let Some(vid) = self.vid {
            info.vendor_id = vid;
        }
        if let Some(pid) = self.pid {
            info.product_id = pid;
        }
        if let Some(rev) = self.rev {
            info.revision = rev;
        }
        match self.speed {
            Some(speed) => model.with_speed(speed),
            None => model,
        }
    }
}
