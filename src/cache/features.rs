use anyhow::{bail, ensure};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::Serialize;

/// Number of integers in a feature table: three per cache type.
pub const FEATURE_TABLE_LEN: usize = 3 * CacheType::COUNT;

/// 3-bit cache selector carried from the control unit to the transfer engine.
#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    DataInput  = 0,
    DataOutput = 1,
    ConfPe     = 2,
    ConfCc     = 3,
    None       = 4,
}

impl Default for CacheType {
    fn default() -> Self {
        CacheType::None
    }
}

impl CacheType {
    pub const COUNT: usize = 4;
    pub const ALL: [CacheType; CacheType::COUNT] = [
        CacheType::DataInput,
        CacheType::DataOutput,
        CacheType::ConfPe,
        CacheType::ConfCc,
    ];

    /// Decodes the raw selector; values without a cache behind them map to `None`.
    pub fn from_raw(raw: u8) -> Option<CacheType> {
        CacheType::from_u8(raw).filter(|ty| *ty != CacheType::None)
    }

    /// Position in feature tables and per-cache arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_data(self) -> bool {
        matches!(self, CacheType::DataInput | CacheType::DataOutput)
    }

    pub fn is_config(self) -> bool {
        matches!(self, CacheType::ConfPe | CacheType::ConfCc)
    }

    pub fn name(self) -> &'static str {
        match self {
            CacheType::DataInput => "data_in",
            CacheType::DataOutput => "data_out",
            CacheType::ConfPe => "conf_pe",
            CacheType::ConfCc => "conf_cc",
            CacheType::None => "none",
        }
    }
}

/// Static shape of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheGeometry {
    pub kind: CacheType,
    pub line_bytes: usize,
    pub num_lines: usize,
    /// Element width for data caches, whole-line width for configuration caches.
    pub width_bits: usize,
    /// Bits moved per streaming transfer between shared memory and the cache.
    pub granularity_bits: usize,
}

impl CacheGeometry {
    pub fn line_bits(&self) -> usize {
        if self.kind.is_data() {
            self.line_bytes * 8
        } else {
            self.width_bits
        }
    }

    /// Addressable elements per line. Configuration lines are a single opaque element.
    pub fn places(&self) -> usize {
        if self.kind.is_data() {
            self.line_bits() / self.width_bits
        } else {
            1
        }
    }

    pub fn step_bytes(&self) -> usize {
        self.granularity_bits / 8
    }

    /// Remaining-transfer count loaded at the start of a block transfer.
    ///
    /// This is `ceil(line_bits / granularity)`, minus one when the line is an exact multiple of
    /// the granularity. The engine performs one transfer before the first BLOCK step, so an exact
    /// multiple moves exactly one line's worth of units.
    pub fn block_transfer_count(&self) -> usize {
        let bits = self.line_bits();
        let gran = self.granularity_bits;
        let count = bits.div_ceil(gran);
        if bits % gran == 0 {
            count - 1
        } else {
            count
        }
    }

    /// Line that is output-selected after boot.
    pub fn boot_output_line(&self) -> usize {
        1.min(self.num_lines - 1)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let name = self.kind.name();
        ensure!(self.num_lines > 0, "{}: cache needs at least one line", name);
        ensure!(self.line_bytes > 0, "{}: line size must be non-zero", name);
        ensure!(self.width_bits > 0, "{}: width must be non-zero", name);
        ensure!(
            self.granularity_bits > 0 && self.granularity_bits % 8 == 0 && self.granularity_bits <= 64,
            "{}: streaming granularity of {} bits must be a whole number of bytes up to 64 bits",
            name,
            self.granularity_bits
        );
        ensure!(
            self.granularity_bits <= self.line_bits(),
            "{}: granularity of {} bits is wider than the {}-bit line",
            name,
            self.granularity_bits,
            self.line_bits()
        );
        if self.kind.is_data() {
            ensure!(
                self.width_bits <= self.line_bits(),
                "{}: element of {} bits does not fit a {}-bit line",
                name,
                self.width_bits,
                self.line_bits()
            );
        }
        Ok(())
    }
}

/// Per-cache-type geometry supplied once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureTable {
    geometries: [CacheGeometry; CacheType::COUNT],
}

impl FeatureTable {
    /// Builds the table from the flat `{line bytes, lines, width bits}` triples, ordered
    /// data-in, data-out, PE config, CC config. `conf_granularity_bits` is the streaming unit of
    /// the configuration caches; data caches stream one element at a time.
    pub fn from_slice(features: &[usize], conf_granularity_bits: usize) -> anyhow::Result<Self> {
        if features.len() != FEATURE_TABLE_LEN {
            bail!(
                "cache feature table has {} entries, expected {}",
                features.len(),
                FEATURE_TABLE_LEN
            );
        }
        let mut geometries = CacheType::ALL.map(|kind| CacheGeometry {
            kind,
            line_bytes: 0,
            num_lines: 0,
            width_bits: 0,
            granularity_bits: 0,
        });
        for (geometry, triple) in geometries.iter_mut().zip(features.chunks_exact(3)) {
            geometry.line_bytes = triple[0];
            geometry.num_lines = triple[1];
            geometry.width_bits = triple[2];
            geometry.granularity_bits = if geometry.kind.is_data() {
                geometry.width_bits
            } else {
                conf_granularity_bits
            };
            geometry.validate()?;
        }
        Ok(Self { geometries })
    }

    pub fn get(&self, kind: CacheType) -> Option<&CacheGeometry> {
        self.geometries.get(kind.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheGeometry> {
        self.geometries.iter()
    }
}
