//! `-P/--phy` selection.
//!
//! Only replayed host traffic is available: the trace is a JSON array of
//! [`phantom_usb::HostEvent`]s delivered to the device through a [`RecordingPhy`].

use core::fmt;
use core::str::FromStr;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use phantom_usb::{HostEvent, RecordingPhy};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhySelection {
    /// `replay:<trace.json>`
    Replay(PathBuf),
    /// `fd:<serial_port>`, `gadgetfs` or `auto`.
    Hardware(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhySelectionError {
    #[error("replay transport needs a trace file: replay:<trace.json>")]
    MissingTrace,
    #[error(
        "unknown physical layer `{0}` (expected replay:<trace.json>, fd:<serial_port> or gadgetfs)"
    )]
    Unknown(String),
}

impl FromStr for PhySelection {
    type Err = PhySelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("replay:") {
            if path.is_empty() {
                return Err(PhySelectionError::MissingTrace);
            }
            return Ok(PhySelection::Replay(PathBuf::from(path)));
        }
        if s == "gadgetfs" || s == "auto" || s.starts_with("fd:") {
            return Ok(PhySelection::Hardware(s.to_owned()));
        }
        Err(PhySelectionError::Unknown(s.to_owned()))
    }
}

impl fmt::Display for PhySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhySelection::Replay(path) => write!(f, "replay:{}", path.display()),
            PhySelection::Hardware(name) => f.write_str(name),
        }
    }
}

/// A ready transport and the host traffic it will deliver.
#[derive(Debug)]
pub struct Transport {
    pub phy: RecordingPhy,
    pub events: Vec<HostEvent>,
}

impl PhySelection {
    pub fn open(&self) -> Result<Transport> {
        match self {
            PhySelection::Replay(path) => {
                let raw = fs::read(path)
                    .with_context(|| format!("read host trace {}", path.display()))?;
                let events: Vec<HostEvent> = serde_json::from_slice(&raw)
                    .with_context(|| format!("parse host trace {}", path.display()))?;
                tracing::debug!(
                    trace = %path.display(),
                    events = events.len(),
                    "loaded host trace"
                );
                Ok(Transport {
                    phy: RecordingPhy::new(),
                    events,
                })
            }
            PhySelection::Hardware(name) => {
                bail!(
                    "physical layer `{name}` is not available in this build; \
                     use replay:<trace.json>"
                )
            }
        }
    }
}

/// Resolves the optional `-P` argument.
pub fn require(selection: Option<&PhySelection>) -> Result<&PhySelection> {
    match selection {
        Some(selection) => Ok(selection),
        None => bail!("no physical layer selected; pass -P replay:<trace.json>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_selection_keeps_the_path() {
        assert_eq!(
            "replay:traces/host.json".parse::<PhySelection>(),
            Ok(PhySelection::Replay(PathBuf::from("traces/host.json")))
        );
        assert_eq!(
            "replay:".parse::<PhySelection>(),
            Err(PhySelectionError::MissingTrace)
        );
    }

    #[test]
    fn hardware_backends_parse_but_do_not_open() {
        let selection: PhySelection = "fd:/dev/ttyUSB0".parse().unwrap();
        let err = selection.open().unwrap_err();
        assert!(err.to_string().contains("not available"));
        assert_eq!(
            "serial".parse::<PhySelection>(),
            Err(PhySelectionError::Unknown("serial".to_owned()))
        );
    }
}
