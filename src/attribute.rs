// SPDX-License-Identifier: Apache-2.0

//! Sparse per-document `(name) → string` attribute map, e.g. titles or
//! URLs shown alongside search results but not indexed for retrieval.

use std::collections::BTreeMap;

/// `(docno, name) → string`, stored sparse.
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    values: BTreeMap<(u32, String), String>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, docno: u32, name: &str, value: impl Into<String>) {
        self.values.insert((docno, name.to_string()), value.into());
    }

    pub fn get(&self, docno: u32, name: &str) -> Option<&str> {
        self.values.get(&(docno, name.to_string())).map(|s| s.as_str())
    }

    pub fn remove_document(&mut self, docno: u32) {
        self.values.retain(|(d, _), _| *d != docno);
    }

    pub fn names_of(&self, docno: u32) -> impl Iterator<Item = &str> {
        self.values
            .range((docno, String::new())..(docno + 1, String::new()))
            .map(|((_, name), _)| name.as_str())
    }
}
