//! Records every mutation stage a session queries, to seed a fuzzer.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use phantom_usb::{Application, Stage};
use serde::Serialize;

use super::{load_profile, profile_options, run_session, APP_TARGET};
use crate::transport::{self, PhySelection};

/// Sessions end after this long regardless of host activity.
const SESSION_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct MakestagesOptions {
    pub transport: Option<PhySelection>,
    pub profile: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub stage_file: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize)]
pub struct StageFile<'a> {
    pub profile: &'a str,
    pub stages: &'a [StageRecord],
}

#[derive(Debug)]
pub struct StageRecorder {
    started: Instant,
    records: Vec<StageRecord>,
}

impl StageRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }
}

impl Default for StageRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Application for StageRecorder {
    fn should_stop_phy(&mut self) -> bool {
        let passed = self.started.elapsed();
        if passed > SESSION_LIMIT {
            tracing::info!(secs = passed.as_secs(), "waited long enough, disconnecting");
            return true;
        }
        false
    }

    fn get_mutation(&mut self, stage: Stage, canonical: &[u8]) -> Option<Vec<u8>> {
        tracing::trace!(%stage, len = canonical.len(), "recording stage");
        self.records.push(StageRecord {
            stage,
            data: canonical.to_vec(),
        });
        None
    }
}

pub fn run(opts: MakestagesOptions) -> Result<()> {
    let transport = transport::require(opts.transport.as_ref())?.open()?;
    let model = load_profile(&opts.profile, &profile_options(opts.vid, opts.pid))?;

    let session = run_session(model, transport, StageRecorder::new());
    let records = session.app.records();
    let file = StageFile {
        profile: &opts.profile,
        stages: records,
    };
    let json = serde_json::to_vec_pretty(&file)?;
    fs::write(&opts.stage_file, json)
        .with_context(|| format!("write stage file {}", opts.stage_file.display()))?;

    tracing::info!(
        target: APP_TARGET,
        stages = records.len(),
        file = %opts.stage_file.display(),
        "stage file written"
    );
    println!("recorded {} stages to {}", records.len(), opts.stage_file.display());
    if let Some(err) = session.error {
        return Err(err).context("device session failed");
    }
    Ok(())
}
