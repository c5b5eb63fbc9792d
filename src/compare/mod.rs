//! Side-by-side comparison of tuned models.
//!
//! Flow: scenario or typed prompt → every contender (and attached baselines)
//! via a [`Generator`] → console blocks → optional JSONL report.

mod answer;
mod display;
mod generator;
mod menu;
mod report;
mod runner;

pub use answer::*;
pub use display::*;
pub use generator::*;
pub use menu::*;
pub use report::*;
pub use runner::*;
