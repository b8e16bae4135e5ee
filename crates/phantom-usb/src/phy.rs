//! Transport capability consumed by the engine.
//!
//! The physical backend (a Facedancer board, a gadget driver, a replayed trace) implements
//! [`Phy`] and is injected into [`crate::Device`] at construction. Inbound traffic is delivered
//! as [`HostEvent`]s.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhyError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("endpoint {0} is not available on this transport")]
    NoSuchEndpoint(u8),
}

/// Endpoint numbers are four bits wide.
const MAX_ENDPOINT: u8 = 15;

/// Outbound operations the engine needs from a transport.
pub trait Phy {
    fn connect(&mut self) -> Result<(), PhyError>;
    fn disconnect(&mut self) -> Result<(), PhyError>;
    fn send_on_endpoint(&mut self, ep: u8, data: &[u8]) -> Result<(), PhyError>;
    fn stall_ep0(&mut self) -> Result<(), PhyError>;
    fn ack_status_stage(&mut self) -> Result<(), PhyError>;
}

/// Inbound traffic delivered by a transport.
///
/// This is also the on-disk representation of recorded host traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HostEvent {
    /// Raw SETUP packet, optionally followed by its OUT data stage.
    Setup { bytes: Vec<u8> },
    /// OUT data arrived on a non-control endpoint.
    Data { ep: u8, data: Vec<u8> },
    /// An IN endpoint can accept more data.
    BufferAvailable { ep: u8 },
}

/// One outbound transport call, as observed by [`RecordingPhy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhyCall {
    Connect,
    Disconnect,
    Send { ep: u8, data: Vec<u8> },
    StallEp0,
    AckStatusStage,
}

/// Shared view of the calls a [`RecordingPhy`] has seen.
///
/// Cloning yields another handle to the same log, so a test (or a replay driver) can keep one
/// while the device owns the transport.
#[derive(Debug, Clone, Default)]
pub struct PhyLog(Rc<RefCell<Vec<PhyCall>>>);

impl PhyLog {
    pub fn calls(&self) -> Vec<PhyCall> {
        self.0.borrow().clone()
    }

    pub fn take(&self) -> Vec<PhyCall> {
        core::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn stall_count(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|call| matches!(call, PhyCall::StallEp0))
            .count()
    }

    /// Data sent on `ep`, in order.
    pub fn sent_on(&self, ep: u8) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .iter()
            .filter_map(|call| match call {
                PhyCall::Send { ep: e, data } if *e == ep => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent control-endpoint reply.
    pub fn last_ep0_reply(&self) -> Option<Vec<u8>> {
        self.sent_on(0).pop()
    }

    fn push(&self, call: PhyCall) {
        self.0.borrow_mut().push(call);
    }
}

/// Transport that records every call. Traffic is refused until [`Phy::connect`] and on
/// endpoints a USB device cannot have.
#[derive(Debug, Default)]
pub struct RecordingPhy {
    log: PhyLog,
    connected: bool,
}

impl RecordingPhy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> PhyLog {
        self.log.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_connected(&self) -> Result<(), PhyError> {
        if self.connected {
            Ok(())
        } else {
            Err(PhyError::NotConnected)
        }
    }
}

impl Phy for RecordingPhy {
    fn connect(&mut self) -> Result<(), PhyError> {
        self.connected = true;
        self.log.push(PhyCall::Connect);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), PhyError> {
        self.connected = false;
        self.log.push(PhyCall::Disconnect);
        Ok(())
    }

    fn send_on_endpoint(&mut self, ep: u8, data: &[u8]) -> Result<(), PhyError> {
        self.ensure_connected()?;
        if ep > MAX_ENDPOINT {
            return Err(PhyError::NoSuchEndpoint(ep));
        }
        self.log.push(PhyCall::Send {
            ep,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn stall_ep0(&mut self) -> Result<(), PhyError> {
        self.ensure_connected()?;
        self.log.push(PhyCall::StallEp0);
        Ok(())
    }

    fn ack_status_stage(&mut self) -> Result<(), PhyError> {
        self.ensure_connected()?;
        self.log.push(PhyCall::AckStatusStage);
        Ok(())
    }
}
