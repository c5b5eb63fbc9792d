//! Clients for OpenAI-compatible inference endpoints.

mod llm_client;
mod registry;

pub use llm_client::*;
pub use registry::*;
