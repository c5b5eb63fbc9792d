//! prefbench - Preference dataset adapters and side-by-side comparison of
//! preference-tuned models.
//!
//! ## Datasets
//!
//! Published preference datasets (`prompt`, `chosen`, `rejected`) are mapped
//! onto the conversation form DPO trainers expect. Adapters live in a
//! [`DatasetRegistry`] under their hub names.
//!
//! ## Comparison
//!
//! Fine-tuned checkpoints and their base models are served by any
//! OpenAI-compatible server (vLLM, TGI, Ollama, llama.cpp). Scenarios are sent
//! to every contender and the answers printed next to each other:
//!
//! - **Predefined scenarios**: conversation quality, `\boxed{}` answer checks
//! - **Interactive mode**: type prompts, read every model's answer
//!
//! Generation failures never abort a run; they are rendered as
//! `Error: ...` lines in place of the response.

pub mod client;
pub mod compare;
pub mod dataset;
pub mod models;

// Re-exports for convenience
pub use client::{EndpointRegistry, LLMClient};
pub use compare::{ComparisonRunner, Console, EndpointGenerator, Generator, MenuChoice};
pub use dataset::{DatasetRegistry, HumanLikeDpoDataset, PreferenceDataset};
pub use models::{Config, PreferenceExample, PreferencePair, PrefbenchError, Result, RunStats};
