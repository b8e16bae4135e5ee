//! Plain emulation, optionally with a static mutation table.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use phantom_usb::{Application, Stage};

use super::{load_profile, profile_options, run_session, APP_TARGET};
use crate::transport::{self, PhySelection};

#[derive(Debug)]
pub struct EmulateOptions {
    pub transport: Option<PhySelection>,
    pub profile: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub mutations: Option<PathBuf>,
    pub record: Option<PathBuf>,
}

/// Substitutes fixed bytes for the stages listed in its table.
#[derive(Debug, Default)]
pub struct EmulateApp {
    mutations: BTreeMap<Stage, Vec<u8>>,
    supported: Vec<String>,
}

impl EmulateApp {
    pub fn new(mutations: BTreeMap<Stage, Vec<u8>>) -> Self {
        Self {
            mutations,
            supported: Vec::new(),
        }
    }
}

impl Application for EmulateApp {
    fn usb_function_supported(&mut self, reason: &str) {
        if self.supported.is_empty() {
            tracing::info!(target: APP_TARGET, reason, "host uses the emulated function");
        }
        self.supported.push(reason.to_owned());
    }

    fn get_mutation(&mut self, stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
        let mutated = self.mutations.get(&stage).cloned();
        if mutated.is_some() {
            tracing::debug!(%stage, "applying static mutation");
        }
        mutated
    }
}

/// Reads a `{"stage_name": [bytes...]}` table.
pub fn load_mutations(path: &Path) -> Result<BTreeMap<Stage, Vec<u8>>> {
    let raw = fs::read(path).with_context(|| format!("read mutation table {}", path.display()))?;
    let table: BTreeMap<String, Vec<u8>> = serde_json::from_slice(&raw)
        .with_context(|| format!("parse mutation table {}", path.display()))?;
    table
        .into_iter()
        .map(|(name, bytes)| {
            let stage = name
                .parse::<Stage>()
                .with_context(|| format!("mutation table {}", path.display()))?;
            Ok((stage, bytes))
        })
        .collect()
}

pub fn run(opts: EmulateOptions) -> Result<()> {
    let transport = transport::require(opts.transport.as_ref())?.open()?;
    let mutations = match &opts.mutations {
        Some(path) => load_mutations(path)?,
        None => BTreeMap::new(),
    };
    let model = load_profile(&opts.profile, &profile_options(opts.vid, opts.pid))?;

    let session = run_session(model, transport, EmulateApp::new(mutations));

    if let Some(path) = &opts.record {
        let calls = serde_json::to_vec_pretty(&session.log.calls())?;
        fs::write(path, calls)
            .with_context(|| format!("write transport record {}", path.display()))?;
    }

    let status = if session.app.supported.is_empty() {
        "not supported"
    } else {
        "SUPPORTED"
    };
    println!("{}: {status} (device {:?})", opts.profile, session.final_state);
    if let Some(err) = session.error {
        return Err(err).context("device session failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_table_names_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        fs::write(&good, r#"{"device_descriptor": [1, 2, 3], "hub_descriptor": []}"#).unwrap();
        let table = load_mutations(&good).unwrap();
        assert_eq!(table[&Stage::DeviceDescriptor], vec![1, 2, 3]);
        assert_eq!(table[&Stage::HubDescriptor], Vec::<u8>::new());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"{"device_descriptr": [1]}"#).unwrap();
        let err = format!("{:#}", load_mutations(&bad).unwrap_err());
        assert!(err.contains("unknown mutation stage"), "{err}");
    }
}
