//! Hooks the surrounding application exposes to a device session.

use crate::mutation::Stage;

/// Callbacks from the engine into the application that owns the session.
///
/// Every method has a no-op default so plain emulation needs no implementation at all; scanners
/// override [`Application::usb_function_supported`] and [`Application::should_stop_phy`],
/// fuzzers override [`Application::get_mutation`].
pub trait Application {
    /// Polled cooperatively by [`crate::Device::poll_stop`]; `true` ends the session.
    fn should_stop_phy(&mut self) -> bool {
        false
    }

    /// The host exercised the emulated function beyond plain enumeration.
    fn usb_function_supported(&mut self, _reason: &str) {}

    /// A SETUP packet arrived, i.e. the host is alive.
    fn signal_setup_packet_received(&mut self) {}

    /// Replacement bytes for `stage`, or `None` to keep the canonical encoding.
    fn get_mutation(&mut self, _stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// Application that ignores every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullApplication;

impl Application for NullApplication {}
