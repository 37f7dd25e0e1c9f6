//! Core types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod bytes;

pub use types::*;
pub use error::Error;
