pub mod array;
pub mod config;
pub mod report;
pub mod top;
