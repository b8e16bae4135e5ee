//! The applications behind each sub-command.
//!
//! An application is a [`phantom_usb::Application`] implementation plus the loop that builds a
//! device profile, runs it over the selected transport and reports the outcome.

pub mod detect_os;
pub mod emulate;
pub mod list;
pub mod makestages;
pub mod scan;

use phantom_devices::{ProfileOptions, ProfileRegistry};
use phantom_usb::{Application, Device, DeviceModel, DeviceState, PhyLog, UsbError};

use crate::transport::Transport;

/// Target of the messages every application prints at the default level.
pub const APP_TARGET: &str = "phantom::app";

pub fn profile_options(vid: Option<u16>, pid: Option<u16>) -> ProfileOptions {
    for (name, value) in [("vid", vid), ("pid", pid)] {
        if let Some(value) = value {
            tracing::info!(target: APP_TARGET, "setting user-supplied {name}: {value:#06x}");
        }
    }
    ProfileOptions {
        vid,
        pid,
        ..ProfileOptions::default()
    }
}

pub fn load_profile(name: &str, options: &ProfileOptions) -> anyhow::Result<DeviceModel> {
    Ok(ProfileRegistry::builtins().build(name, options)?)
}

/// What is left of a device session once it ends.
#[derive(Debug)]
pub struct Session<A> {
    pub app: A,
    pub log: PhyLog,
    pub final_state: DeviceState,
    /// Engine or transport failure that cut the session short.
    pub error: Option<UsbError>,
}

/// Runs `model` until the trace is exhausted or `app` asks to stop.
///
/// A failing session is logged and reported in [`Session::error`]; the device is disconnected
/// either way.
pub fn run_session<A: Application>(model: DeviceModel, transport: Transport, app: A) -> Session<A> {
    let log = transport.phy.log();
    let mut device = Device::new(model, transport.phy, app);
    let error = device.run(transport.events).err();
    if let Some(err) = &error {
        tracing::error!(%err, "got an error while running the device");
        if device.state() != DeviceState::Detached {
            if let Err(err) = device.disconnect() {
                tracing::warn!(%err, "disconnect after failure also failed");
            }
        }
    }
    Session {
        final_state: device.state(),
        app: device.into_app(),
        log,
        error,
    }
}
