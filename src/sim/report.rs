use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::cache::{CacheStats, CacheType};
use crate::ctrl::ControlStats;
use crate::mmu::{EngineStats, TransferRecord};

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub kind: CacheType,
    pub output_line: usize,
    #[serde(flatten)]
    pub stats: CacheStats,
}

/// End-of-run summary, serialized as one JSON object.
#[derive(Debug, Serialize)]
pub struct SimReport {
    pub cycles: u64,
    pub finished: bool,
    pub control: ControlStats,
    pub engine: EngineStats,
    pub caches: Vec<CacheReport>,
    pub last_transfer: Option<TransferRecord>,
}

impl SimReport {
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("cannot serialize run report")
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, self.to_json()?).with_context(|| format!("failed to write report {:?}", path))
    }
}
