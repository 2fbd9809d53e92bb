use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CtrlConfig {
    /// Instruction words the program memory can hold.
    pub program_capacity: usize,
}

impl Config for CtrlConfig {}

impl Default for CtrlConfig {
    fn default() -> Self {
        Self {
            program_capacity: 256,
        }
    }
}
