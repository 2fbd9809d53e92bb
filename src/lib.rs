pub mod base;
pub mod cache;
pub mod ctrl;
pub mod mmu;
pub mod sim;
pub mod ui;
pub mod utils;

mod unit_tests;
