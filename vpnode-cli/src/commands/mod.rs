//! CLI command implementations

pub mod allocate;
pub mod peers;
pub mod report;

pub use allocate::{allocate, register};
pub use peers::peers;
pub use report::report;
