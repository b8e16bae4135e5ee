#![allow(dead_code)]

use std::collections::BTreeMap;

use phantom_usb::{Application, Device, DeviceModel, PhyLog, RecordingPhy, SetupRequest, Stage};

#[derive(Debug, Default)]
pub struct TestApp {
    pub supported: Vec<String>,
    pub mutations: BTreeMap<Stage, Vec<u8>>,
}

impl Application for TestApp {
    fn usb_function_supported(&mut self, reason: &str) {
        self.supported.push(reason.to_owned());
    }

    fn get_mutation(&mut self, stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
        self.mutations.get(&stage).cloned()
    }
}

pub type TestDevice = Device<RecordingPhy, TestApp>;

/// Connected device with an empty transport log.
pub fn connected(model: DeviceModel) -> (TestDevice, PhyLog) {
    let phy = RecordingPhy::new();
    let log = phy.log();
    let mut dev = Device::new(model, phy, TestApp::default());
    dev.connect().unwrap();
    log.take();
    (dev, log)
}

/// Connected and put into configuration 1.
pub fn configured(model: DeviceModel) -> (TestDevice, PhyLog) {
    let (mut dev, log) = connected(model);
    dev.set_configuration(1).unwrap();
    log.take();
    (dev, log)
}

/// Sends a raw SETUP packet and returns the EP0 reply, panicking on a stall.
pub fn control_in(dev: &mut TestDevice, log: &PhyLog, raw: &[u8]) -> Vec<u8> {
    let stalls = log.stall_count();
    dev.handle_setup(raw).unwrap();
    assert_eq!(log.stall_count(), stalls, "unexpected stall for {raw:02x?}");
    log.last_ep0_reply().expect("no control reply")
}

pub fn get_descriptor(
    dev: &mut TestDevice,
    log: &PhyLog,
    descriptor_type: u8,
    index: u8,
) -> Vec<u8> {
    let value = u16::from(descriptor_type) << 8 | u16::from(index);
    let req = SetupRequest::new(0x80, 0x06, value, 0, 0xffff);
    control_in(dev, log, &req.to_bytes())
}
