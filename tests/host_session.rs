//! Whole-session tests: recorded host traffic driven through a profile end to end.

use std::collections::BTreeMap;

use phantom_devices::cdc::acm;
use phantom_devices::{Profile, ProfileOptions, ReceivedLines};
use phantom_usb::{Application, Device, DeviceState, HostEvent, PhyCall, RecordingPhy, Stage};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// What a Linux host sends to a fresh CDC ACM modem, trimmed to the interesting parts.
const LINUX_ACM_TRACE: &str = r#"[
    {"kind": "setup", "bytes": [128, 6, 0, 1, 0, 0, 64, 0]},
    {"kind": "setup", "bytes": [0, 5, 7, 0, 0, 0, 0, 0]},
    {"kind": "setup", "bytes": [128, 6, 0, 1, 0, 0, 18, 0]},
    {"kind": "setup", "bytes": [128, 6, 0, 2, 0, 0, 9, 0]},
    {"kind": "setup", "bytes": [128, 6, 0, 2, 0, 0, 67, 0]},
    {"kind": "setup", "bytes": [128, 6, 0, 3, 0, 0, 255, 0]},
    {"kind": "setup", "bytes": [128, 6, 2, 3, 9, 4, 255, 0]},
    {"kind": "setup", "bytes": [0, 9, 1, 0, 0, 0, 0, 0]},
    {"kind": "setup", "bytes": [33, 34, 3, 0, 0, 0, 0, 0]},
    {"kind": "setup", "bytes": [33, 32, 0, 0, 0, 0, 7, 0, 128, 37, 0, 0, 0, 0, 8]},
    {"kind": "setup", "bytes": [161, 33, 0, 0, 0, 0, 7, 0]},
    {"kind": "data", "ep": 1, "data": [65, 84, 90, 13, 65, 84]},
    {"kind": "data", "ep": 1, "data": [73, 13]},
    {"kind": "bufferAvailable", "ep": 2}
]"#;

#[derive(Debug, Default)]
struct Observer {
    setups: usize,
    supported: Vec<String>,
    stages: Vec<Stage>,
    mutations: BTreeMap<Stage, Vec<u8>>,
}

impl Application for Observer {
    fn usb_function_supported(&mut self, reason: &str) {
        self.supported.push(reason.to_owned());
    }

    fn signal_setup_packet_received(&mut self) {
        self.setups += 1;
    }

    fn get_mutation(&mut self, stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
        self.stages.push(stage);
        self.mutations.get(&stage).cloned()
    }
}

fn trace() -> Vec<HostEvent> {
    serde_json::from_str(LINUX_ACM_TRACE).unwrap()
}

#[test]
fn linux_style_enumeration_of_a_cdc_modem() {
    init_tracing();
    let lines = ReceivedLines::default();
    let model = acm::build_with_lines(&ProfileOptions::default(), lines.clone()).unwrap();
    let phy = RecordingPhy::new();
    let log = phy.log();
    let mut dev = Device::new(model, phy, Observer::default());

    dev.run(trace()).unwrap();

    assert_eq!(dev.state(), DeviceState::Detached);
    assert_eq!(dev.model().address(), 7);
    assert_eq!(dev.app().setups, 11);
    assert_eq!(lines.lines(), vec!["ATZ".to_owned(), "ATI".to_owned()]);
    assert_eq!(log.stall_count(), 0);

    let replies = log.sent_on(0);
    // Short device descriptor read is not truncated below its real length.
    assert_eq!(replies[0].len(), 18);
    // Configuration header only, then the full configuration.
    assert_eq!(replies[2].len(), 9);
    assert_eq!(replies[3].len(), 67);
    assert_eq!(replies[4], vec![4, 3, 0x09, 0x04]);
    // Line coding read back after being set to 9600 8N1.
    assert_eq!(replies.last().unwrap(), &vec![0x80, 0x25, 0, 0, 0, 0, 8]);

    assert_eq!(log.sent_on(2), vec![acm::ARP_FRAME.to_vec()]);
    assert_eq!(log.calls().first(), Some(&PhyCall::Connect));
    assert_eq!(log.calls().last(), Some(&PhyCall::Disconnect));
}

#[test]
fn every_profile_survives_the_same_trace() {
    init_tracing();
    for profile in Profile::ALL {
        let model = profile.build(&ProfileOptions::default()).unwrap();
        let mut dev = Device::new(model, RecordingPhy::new(), Observer::default());
        dev.run(trace()).unwrap();
        assert_eq!(dev.state(), DeviceState::Detached, "{profile}");
        assert_eq!(dev.app().setups, 11, "{profile}");
    }
}

#[test]
fn a_broken_device_descriptor_is_sent_as_is() {
    init_tracing();
    let model = Profile::Hub.build(&ProfileOptions::default()).unwrap();
    let phy = RecordingPhy::new();
    let log = phy.log();
    let mut observer = Observer::default();
    observer.mutations.insert(Stage::DeviceDescriptor, vec![0xff; 3]);
    let mut dev = Device::new(model, phy, observer);

    dev.run(trace()).unwrap();

    assert_eq!(log.sent_on(0)[0], vec![0xff; 3]);
    assert_eq!(dev.app().stages[0], Stage::DeviceDescriptor);
}
