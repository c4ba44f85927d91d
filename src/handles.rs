//! String-keyed handle tables.
//!
//! Callers never hold engine objects directly; they hold an id such as
//! `db1` or `stmt3`. Ids come from a per-table counter and are never reused
//! for the lifetime of the table.

use std::collections::HashMap;

use crate::error::{BridgeError, HandleKind};

/// Generates `prefix1`, `prefix2`, ...
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug)]
pub struct HandleTable<T> {
    kind: HandleKind,
    ids: IdGenerator,
    entries: HashMap<String, T>,
}

impl<T> HandleTable<T> {
    #[must_use]
    pub fn new(kind: HandleKind, prefix: impl Into<String>) -> Self {
        Self {
            kind,
            ids: IdGenerator::new(prefix),
            entries: HashMap::new(),
        }
    }

    /// Reserve a fresh id without inserting anything yet.
    pub fn next_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// Store `value` under an id previously returned by [`Self::next_id`].
    pub fn insert_with_id(&mut self, id: String, value: T) {
        self.entries.insert(id, value);
    }

    /// # Errors
    /// Returns `BridgeError::NotFound` when `id` is unknown.
    pub fn get(&self, id: &str) -> Result<&T, BridgeError> {
        self.entries.get(id).ok_or_else(|| self.not_found(id))
    }

    /// # Errors
    /// Returns `BridgeError::NotFound` when `id` is unknown.
    pub fn get_mut(&mut self, id: &str) -> Result<&mut T, BridgeError> {
        let kind = self.kind;
        self.entries.get_mut(id).ok_or_else(|| BridgeError::NotFound {
            kind,
            id: id.to_owned(),
        })
    }

    /// # Errors
    /// Returns `BridgeError::NotFound` when `id` is unknown.
    pub fn remove(&mut self, id: &str) -> Result<T, BridgeError> {
        self.entries.remove(id).ok_or_else(|| self.not_found(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn not_found(&self, id: &str) -> BridgeError {
        BridgeError::NotFound {
            kind: self.kind,
            id: id.to_owned(),
        }
    }
}
