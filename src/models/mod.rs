//! Core data models for prefbench.

mod config;
mod error;
mod record;

pub use config::*;
pub use error::*;
pub use record::*;
