use thiserror::Error;

use crate::phy::PhyError;

/// Errors surfaced by the emulation engine.
///
/// Stalls are not errors: an unsupported or malformed host request is answered with a STALL and
/// processing continues. These variants describe conditions the caller has to act on (usually by
/// tearing the session down).
#[derive(Debug, Error)]
pub enum UsbError {
    #[error("setup packet is {len} bytes, expected at least 8")]
    ShortSetupPacket { len: usize },
    #[error("transport failure: {0}")]
    Phy(#[from] PhyError),
    #[error("request {request:#04x} expected {expected} data bytes, got {actual}")]
    ShortDataStage {
        request: u8,
        expected: usize,
        actual: usize,
    },
    #[error("{handler} failed to handle request {request:#04x}: {reason}")]
    Handler {
        handler: &'static str,
        request: u8,
        reason: String,
    },
    #[error("device has no configurations")]
    NoConfigurations,
    #[error("device has {count} configurations, at most 255 can be numbered")]
    TooManyConfigurations { count: usize },
}

pub type UsbResult<T> = Result<T, UsbError>;
