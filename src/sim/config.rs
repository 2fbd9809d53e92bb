use std::path::PathBuf;

use log::{warn, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    /// Controller program, assembler text.
    pub program: PathBuf,
    /// Raw image copied to shared memory address 0 before the run.
    pub memory_image: Option<PathBuf>,
    pub log_level: u64,
    pub timeout: u64,
    /// Where to write the JSON run report, if anywhere.
    pub report: Option<PathBuf>,
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::new(),
            memory_image: None,
            log_level: 0,
            timeout: 100000,
            report: None,
        }
    }
}

/// 0: none, 1: info, 2: debug. Warnings are always shown.
pub fn to_level_filter(ulevel: u64) -> LevelFilter {
    match ulevel {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}
