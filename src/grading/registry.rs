//! Named answer keys configured at startup

use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::grading::AnswerKey;

/// Read-only store of named answer keys
#[derive(Debug, Clone, Default)]
pub struct AnswerKeyRegistry {
    keys: BTreeMap<String, AnswerKey>,
}

impl AnswerKeyRegistry {
    pub fn new(keys: BTreeMap<String, AnswerKey>) -> Self {
        Self { keys }
    }

    /// Look up a key by name
    pub fn get(&self, name: &str) -> Result<&AnswerKey> {
        self.keys
            .get(name)
            .ok_or_else(|| AppError::UnknownAnswerKey(name.to_string()))
    }

    /// Names of all configured keys
    pub fn names(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
