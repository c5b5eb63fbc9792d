//! Preference datasets: adapters, registry, and JSONL I/O.

mod adapter;
mod loader;
mod registry;

pub use adapter::*;
pub use loader::*;
pub use registry::*;
