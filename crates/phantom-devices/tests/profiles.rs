mod util;

use phantom_devices::{Profile, ProfileOptions, ProfileRegistry};
use phantom_usb::descriptor::{DESC_BOS, DESC_DEVICE};
use util::{connected, get_descriptor};

#[test]
fn every_builtin_profile_builds_and_enumerates() {
    let registry = ProfileRegistry::builtins();
    for (name, _) in registry.iter() {
        let model = registry.build(name, &ProfileOptions::default()).unwrap();
        let (mut dev, log) = connected(model);
        let device = get_descriptor(&mut dev, &log, DESC_DEVICE, 0);
        assert_eq!(device.len(), 18, "{name}");
        dev.set_configuration(1).unwrap();
        assert_eq!(log.stall_count(), 0, "{name}");
    }
}

#[test]
fn registry_applies_user_ids() {
    let options = ProfileOptions {
        vid: Some(0x1d6b),
        pid: Some(0x0104),
        ..ProfileOptions::default()
    };
    let model = ProfileRegistry::builtins().build("hub", &options).unwrap();
    assert_eq!(model.info().vendor_id, 0x1d6b);
    assert_eq!(model.info().product_id, 0x0104);
}

#[test]
fn billboard_bos_read_marks_the_profile_supported() {
    let (mut dev, log) = connected(Profile::Billboard.build(&ProfileOptions::default()).unwrap());
    let device = get_descriptor(&mut dev, &log, DESC_DEVICE, 0);
    assert_eq!(&device[2..4], &[0x01, 0x02]);
    assert!(dev.app().supported.is_empty());

    let bos = get_descriptor(&mut dev, &log, DESC_BOS, 0);
    assert_eq!(bos[1], DESC_BOS);
    assert_eq!(dev.app().supported, vec!["billboard BOS requested".to_owned()]);
}

#[test]
fn profiles_without_bos_stall_the_request() {
    let (mut dev, log) = connected(Profile::CdcAcm.build(&ProfileOptions::default()).unwrap());
    dev.handle_setup(&[0x80, 0x06, 0x00, 0x0f, 0, 0, 0xff, 0]).unwrap();
    assert_eq!(log.stall_count(), 1);
}
