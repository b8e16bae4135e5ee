#![allow(dead_code)]

use std::collections::BTreeMap;

use phantom_usb::descriptor::{CLASS_CDC, CLASS_CDC_DATA};
use phantom_usb::{
    Application, ClassHandler, Configuration, Device, DeviceInfo, DeviceModel, Endpoint,
    EndpointDirection, Interface, PhyLog, RecordingPhy, SetupRequest, Stage, TransferType,
};

/// Application that records every callback.
#[derive(Debug, Default)]
pub struct TestApp {
    pub setups: usize,
    pub supported: Vec<String>,
    pub queried: Vec<Stage>,
    pub mutations: BTreeMap<Stage, Vec<u8>>,
    pub stop_after_setups: Option<usize>,
}

impl Application for TestApp {
    fn should_stop_phy(&mut self) -> bool {
        self.stop_after_setups.is_some_and(|n| self.setups >= n)
    }

    fn usb_function_supported(&mut self, reason: &str) {
        self.supported.push(reason.to_owned());
    }

    fn signal_setup_packet_received(&mut self) {
        self.setups += 1;
    }

    fn get_mutation(&mut self, stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
        self.queried.push(stage);
        self.mutations.get(&stage).cloned()
    }
}

fn config(endpoints: &[u8]) -> Configuration {
    let mut data = Interface::new(1, CLASS_CDC_DATA, 0, 0);
    for &n in endpoints {
        data = data.with_endpoint(Endpoint::new(n, EndpointDirection::In, TransferType::Bulk, 64));
    }
    Configuration::new(vec![
        Interface::new(0, CLASS_CDC, 2, 1)
            .with_class_handler(ClassHandler::class("test-class", ())),
        data,
    ])
}

/// Three configurations exposing endpoints {1, 2}, {3, 4, 5} and {6}.
pub fn three_config_model() -> DeviceModel {
    DeviceModel::new(
        DeviceInfo {
            vendor_id: 0x2548,
            product_id: 0x1001,
            revision: 0x0010,
            manufacturer: Some("Phantom".into()),
            product: Some("Test Device".into()),
            serial: Some("0001".into()),
            ..DeviceInfo::default()
        },
        vec![config(&[1, 2]), config(&[3, 4, 5]), config(&[6])],
    )
    .unwrap()
}

pub fn two_config_model() -> DeviceModel {
    DeviceModel::new(
        DeviceInfo::default(),
        vec![config(&[1]), config(&[2])],
    )
    .unwrap()
}

pub fn connected(model: DeviceModel) -> (Device<RecordingPhy, TestApp>, PhyLog) {
    let phy = RecordingPhy::new();
    let log = phy.log();
    let mut dev = Device::new(model, phy, TestApp::default());
    dev.connect().unwrap();
    log.take();
    (dev, log)
}

/// Issues an IN request and returns what was sent on EP0, panicking on a stall.
pub fn control_in(
    dev: &mut Device<RecordingPhy, TestApp>,
    log: &PhyLog,
    req: SetupRequest,
) -> Vec<u8> {
    let stalls = log.stall_count();
    dev.handle_request(&req).unwrap();
    assert_eq!(log.stall_count(), stalls, "unexpected stall for {req}");
    log.last_ep0_reply().expect("no control reply")
}

pub fn get_descriptor(
    dev: &mut Device<RecordingPhy, TestApp>,
    log: &PhyLog,
    descriptor_type: u8,
    index: u8,
) -> Vec<u8> {
    let value = u16::from(descriptor_type) << 8 | u16::from(index);
    control_in(dev, log, SetupRequest::new(0x80, 0x06, value, 0, 0xffff))
}
