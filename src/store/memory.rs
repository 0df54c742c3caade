use std::collections::HashMap;

use super::OffsetStore;
use crate::error::{IndexError, Result};

/// In-memory offset store
///
/// Duplicate keys are rejected immediately on insertion.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    offsets: HashMap<String, u64>,
    order: Vec<String>,
}
impl MemoryStore {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            offsets: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }
}
impl OffsetStore for MemoryStore {
    fn insert(&mut self, key: String, offset: u64) -> Result<()> {
        if self.offsets.contains_key(&key) {
            return Err(IndexError::DuplicateKey(key).into());
        }
        self.offsets.insert(key.clone(), offset);
        self.order.push(key);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.offsets.get(key).copied())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.order.len())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.order.clone())
    }

    fn first_key(&self) -> Result<Option<String>> {
        Ok(self.order.iter().min().cloned())
    }

    fn last_key(&self) -> Result<Option<String>> {
        Ok(self.order.iter().max().cloned())
    }
}
