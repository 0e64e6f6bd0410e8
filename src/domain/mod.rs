//! Domain layer for the Mender repair controller.
//!
//! This module contains the core models, error types and the port traits
//! that external collaborators (generators, executors, persistence) implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
