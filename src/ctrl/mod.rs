pub mod config;
pub mod control_unit;
pub mod decode;
pub mod program;

pub use config::CtrlConfig;
pub use control_unit::{Activity, ControlStats, ControlUnit, InstState, WaitOn};
pub use decode::{DecodeUnit, DecodedInst, Opcode, PLACE_BLOCK};
pub use program::Program;
