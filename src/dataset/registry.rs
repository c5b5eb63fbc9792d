//! Registry of preference dataset adapters by name.

use crate::dataset::{HumanLikeDpoDataset, PreferenceDataset};
use crate::models::{PrefbenchError, Result};
use std::collections::BTreeMap;

/// Constructor for a registered adapter.
pub type DatasetFactory = fn() -> Box<dyn PreferenceDataset>;

fn human_like() -> Box<dyn PreferenceDataset> {
    Box::new(HumanLikeDpoDataset)
}

/// Name → adapter constructor map.
#[derive(Default)]
pub struct DatasetRegistry {
    factories: BTreeMap<String, DatasetFactory>,
}

impl DatasetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every adapter shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(HumanLikeDpoDataset::NAME, human_like);
        registry
    }

    /// Register an adapter. A later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, factory: DatasetFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Instantiate the adapter registered under `name`.
    pub fn get(&self, name: &str) -> Result<Box<dyn PreferenceDataset>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| PrefbenchError::UnknownDataset(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}
