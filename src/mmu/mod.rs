pub mod config;
pub mod engine;
pub mod shared_mem;

pub use config::MmuConfig;
pub use engine::{EngineState, EngineStats, MemoryAccessEngine, TransferContext, TransferRecord};
pub use shared_mem::SharedMemory;
