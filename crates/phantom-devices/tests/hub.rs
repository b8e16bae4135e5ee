mod util;

use phantom_devices::{hub, ProfileOptions};
use phantom_usb::descriptor::{hub_descriptor, DESC_DEVICE, DESC_HUB};
use phantom_usb::{PhyCall, SetupRequest, Stage};
use util::{configured, control_in, get_descriptor};

const PORT_FEATURE_ENABLE: u16 = 1;
const PORT_FEATURE_POWER: u16 = 8;
const PORT_FEATURE_RESET: u16 = 4;
const PORT_FEATURE_C_RESET: u16 = 20;

fn hub_status() -> [u8; 8] {
    SetupRequest::new(0xa0, 0x00, 0, 0, 4).to_bytes()
}

fn port_status(port: u16) -> [u8; 8] {
    SetupRequest::new(0xa3, 0x00, 0, port, 4).to_bytes()
}

fn port_feature(request: u8, feature: u16, port: u16) -> SetupRequest {
    SetupRequest::new(0x23, request, feature, port, 0)
}

#[test]
fn hub_reports_its_class() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    assert_eq!(get_descriptor(&mut dev, &log, DESC_DEVICE, 0)[4], 0x09);
    assert_eq!(control_in(&mut dev, &log, &hub_status()), vec![0, 0, 0, 0]);
}

#[test]
fn class_descriptor_request_returns_the_hub_descriptor() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    let req = SetupRequest::new(0xa0, 0x06, u16::from(DESC_HUB) << 8, 0, 0x40);
    assert_eq!(control_in(&mut dev, &log, &req.to_bytes()), hub_descriptor());
    assert_eq!(dev.app().supported, vec!["hub descriptor requested".to_owned()]);
}

#[test]
fn hub_descriptor_goes_through_its_mutation_stage() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    dev.app_mut()
        .mutations
        .insert(Stage::HubDescriptor, vec![0xde, 0xad]);
    let req = SetupRequest::new(0xa0, 0x06, u16::from(DESC_HUB) << 8, 0, 0x40);
    assert_eq!(control_in(&mut dev, &log, &req.to_bytes()), vec![0xde, 0xad]);
}

#[test]
fn port_power_and_reset_are_reflected_in_port_status() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    assert_eq!(control_in(&mut dev, &log, &port_status(2)), vec![0, 0, 0, 0]);

    dev.handle_request(&port_feature(0x03, PORT_FEATURE_POWER, 2)).unwrap();
    dev.handle_request(&port_feature(0x03, PORT_FEATURE_RESET, 2)).unwrap();
    assert_eq!(control_in(&mut dev, &log, &port_status(2)), vec![0x00, 0x01, 0x10, 0x00]);

    dev.handle_request(&port_feature(0x01, PORT_FEATURE_C_RESET, 2)).unwrap();
    assert_eq!(control_in(&mut dev, &log, &port_status(2)), vec![0x00, 0x01, 0x00, 0x00]);
    // Other ports are untouched.
    assert_eq!(control_in(&mut dev, &log, &port_status(1)), vec![0, 0, 0, 0]);
}

#[test]
fn empty_port_cannot_be_enabled() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    dev.handle_request(&port_feature(0x03, PORT_FEATURE_POWER, 3)).unwrap();
    log.take();
    dev.handle_request(&port_feature(0x03, PORT_FEATURE_ENABLE, 3)).unwrap();
    assert_eq!(log.calls(), vec![PhyCall::AckStatusStage]);
    assert_eq!(control_in(&mut dev, &log, &port_status(3)), vec![0x00, 0x01, 0x00, 0x00]);
}

#[test]
fn unknown_port_stalls() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    dev.handle_setup(&port_status(9)).unwrap();
    assert_eq!(log.stall_count(), 1);
}

#[test]
fn hub_feature_requests_ack() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    dev.handle_request(&SetupRequest::new(0x20, 0x01, 0, 0, 0)).unwrap();
    assert_eq!(log.calls(), vec![PhyCall::AckStatusStage]);
}

#[test]
fn idle_status_change_endpoint_sends_nothing() {
    let (mut dev, log) = configured(hub::build(&ProfileOptions::default()).unwrap());
    dev.handle_buffer_available(1).unwrap();
    assert!(log.sent_on(1).is_empty());
}
