pub mod features;
pub mod line_cache;
pub mod storage;

pub use features::{CacheGeometry, CacheType, FeatureTable, FEATURE_TABLE_LEN};
pub use line_cache::{CacheReject, CacheStats, LineCache, SelectReject};
pub use storage::{LineView, TransferReg};
