//! Tries every built-in profile in turn and reports the ones the host uses.

use std::time::{Duration, Instant};

use anyhow::Result;
use phantom_devices::{ProfileOptions, ProfileRegistry};
use phantom_usb::Application;

use super::{run_session, APP_TARGET};
use crate::transport::{self, PhySelection};

#[derive(Debug)]
pub struct ScanApp {
    started: Instant,
    timeout: Duration,
    wait_for_timeout: bool,
    supported: bool,
}

impl ScanApp {
    pub fn new(timeout: Duration, wait_for_timeout: bool) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            wait_for_timeout,
            supported: false,
        }
    }

    pub fn supported(&self) -> bool {
        self.supported
    }
}

impl Application for ScanApp {
    fn should_stop_phy(&mut self) -> bool {
        let passed = self.started.elapsed();
        if passed > self.timeout {
            tracing::info!(secs = passed.as_secs(), "waited long enough, disconnecting");
            return true;
        }
        if self.supported && !self.wait_for_timeout {
            tracing::debug!("current device is supported, stopping");
            return true;
        }
        false
    }

    fn usb_function_supported(&mut self, reason: &str) {
        if !self.supported {
            tracing::debug!(reason, "device supported");
        }
        self.supported = true;
    }
}

pub fn run(phy: Option<PhySelection>, timeout: Duration, wait_for_timeout: bool) -> Result<()> {
    let phy = transport::require(phy.as_ref())?;
    tracing::info!(target: APP_TARGET, %phy, "scanning host for supported devices");

    let registry = ProfileRegistry::builtins();
    let mut supported = Vec::new();
    for (name, _) in registry.iter() {
        tracing::info!(target: APP_TARGET, "testing support: {name}");
        let model = registry.build(name, &ProfileOptions::default())?;
        let session = run_session(model, phy.open()?, ScanApp::new(timeout, wait_for_timeout));
        if session.app.supported() {
            tracing::info!(target: APP_TARGET, "device is SUPPORTED");
            supported.push(name);
        }
    }

    if supported.is_empty() {
        println!("No supported devices found");
        return Ok(());
    }
    println!("Found {} supported device(s):", supported.len());
    for (i, name) in supported.iter().enumerate() {
        println!("{}. {name}", i + 1);
    }
    Ok(())
}
