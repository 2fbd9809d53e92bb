use serde::Deserialize;

use crate::cache::FeatureTable;
use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MmuConfig {
    pub memory_size: usize,
    /// Streaming unit of the configuration caches, in bits.
    pub conf_granularity_bits: usize,
    /// `{line bytes, lines, width bits}` for data-in, data-out, PE config and CC config.
    pub features: Vec<usize>,
}

impl Config for MmuConfig {}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            memory_size: 0x1_0000, // 64 KiB
            conf_granularity_bits: 8,
            features: vec![
                16, 2, 32, // data in: 4 x 32-bit values
                16, 2, 32, // data out
                6, 2, 48,  // PE configuration
                4, 2, 32,  // CC configuration
            ],
        }
    }
}

impl MmuConfig {
    pub fn feature_table(&self) -> anyhow::Result<FeatureTable> {
        FeatureTable::from_slice(&self.features, self.conf_granularity_bits)
    }
}
