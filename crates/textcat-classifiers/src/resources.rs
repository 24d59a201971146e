//! Ancillary runtime resources handed to feature extractors.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Word frequency table, persisted with the model.
pub const WORD_FREQ_RSC: &str = "word_freq";
/// Query frequency table, persisted with the model.
pub const QUERY_FREQ_RSC: &str = "q_freq";

/// A `key -> count` table.
pub type FrequencyTable = HashMap<String, u32>;

/// Named resource tables available to feature extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    tables: HashMap<String, FrequencyTable>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: FrequencyTable) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<&FrequencyTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn word_freq(&self) -> Option<&FrequencyTable> {
        self.get(WORD_FREQ_RSC)
    }

    pub fn query_freq(&self) -> Option<&FrequencyTable> {
        self.get(QUERY_FREQ_RSC)
    }
}

/// The subset of [`Resources`] that survives serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedResources {
    #[serde(default)]
    pub word_freq: FrequencyTable,
    #[serde(default)]
    pub query_freq: FrequencyTable,
}

impl From<&Resources> for PersistedResources {
    fn from(resources: &Resources) -> Self {
        Self {
            word_freq: resources.word_freq().cloned().unwrap_or_default(),
            query_freq: resources.query_freq().cloned().unwrap_or_default(),
        }
    }
}

impl From<PersistedResources> for Resources {
    fn from(persisted: PersistedResources) -> Self {
        let mut resources = Resources::new();
        resources.insert(WORD_FREQ_RSC, persisted.word_freq);
        resources.insert(QUERY_FREQ_RSC, persisted.query_freq);
        resources
    }
}
