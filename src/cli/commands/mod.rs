//! CLI command implementations.

pub mod analyze;
pub mod init;
pub mod memory;
pub mod optimize;
pub mod run;
