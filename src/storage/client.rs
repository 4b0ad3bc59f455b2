// SPDX-License-Identifier: Apache-2.0

//! `StorageClient`: the entry point opening a storage over a
//! [`KvStore`], resolving `docid`/`docno`/vocabulary mappings shared
//! across transactions.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::StorageConfig;
use crate::error::{ErrorKind, Result};
use crate::iter::{PostingIterator, TermIterator, UnionIter};
use crate::kv::{keys, KvStore};
use crate::metadata::MetaDataTable;
use crate::postingblock::PostingBlock;
use crate::structblock::StructBlock;

use super::transaction::{prefix_type_hash, Transaction};

pub struct StorageClient {
    pub(crate) kv: Arc<dyn KvStore>,
    pub(crate) config: StorageConfig,
    next_docno: AtomicU32,
    /// Docnos freed by document deletion; only handed out to a
    /// *subsequent* transaction's allocator, never reused within the
    /// deleting transaction itself.
    free_docnos: RwLock<Vec<u32>>,
    pub(crate) metadata: RwLock<MetaDataTable>,
}

impl StorageClient {
    pub fn open(kv: Arc<dyn KvStore>, config: StorageConfig) -> Self {
        let metadata = MetaDataTable::new(config.metadata.clone());
        StorageClient {
            kv,
            config,
            next_docno: AtomicU32::new(1),
            free_docnos: RwLock::new(Vec::new()),
            metadata: RwLock::new(metadata),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn docno_of(&self, docid: &str) -> Option<u32> {
        self.kv
            .get(&keys::docid_to_docno(docid))
            .map(|bytes| u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn docid_of(&self, docno: u32) -> Option<String> {
        self.kv
            .get(&keys::docno_to_docid(docno))
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Returns a term's dense `termvalue` id, assigning a fresh one
    /// from the shared counter if it hasn't been seen before.
    pub fn intern_term(&self, termtype: &str, termvalue: &str) -> Result<u32> {
        let key = keys::valueno(termtype, termvalue);
        if let Some(bytes) = self.kv.get(&key) {
            return Ok(u32::from_be_bytes(bytes.try_into().map_err(|_| {
                ErrorKind::DataCorruption("malformed valueno entry".into())
            })?));
        }
        let counter_key = keys::valueno(termtype, "\0counter");
        let next = match self.kv.get(&counter_key) {
            Some(bytes) => u32::from_be_bytes(bytes.try_into().unwrap()) + 1,
            None => 1,
        };
        self.kv.put(&counter_key, &next.to_be_bytes());
        self.kv.put(&key, &next.to_be_bytes());
        self.kv
            .put(&keys::valueno_reverse(termtype, next), termvalue.as_bytes());
        Ok(next)
    }

    pub fn resolve_term(&self, termtype: &str, valueno: u32) -> Option<String> {
        self.kv
            .get(&keys::valueno_reverse(termtype, valueno))
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    pub(crate) fn allocate_docno(&self) -> u32 {
        if let Some(docno) = self.free_docnos.write().pop() {
            return docno;
        }
        self.next_docno.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn free_docno(&self, docno: u32) {
        self.free_docnos.write().push(docno);
    }

    pub fn metadata(&self) -> MetaDataTable {
        self.metadata.read().clone()
    }

    /// Builds a selection/weighting-feature iterator over every stored
    /// block for one `(termtype, termvalue)` pair. A term's postings
    /// may span several blocks after repeated commits; since per-term
    /// blocks partition docno ranges disjointly by construction, they
    /// union together into one iterator with no further merging.
    pub fn term_iterator(&self, termtype: &str, termvalue: u32) -> Result<Box<dyn PostingIterator>> {
        let mut prefix = vec![b'T'];
        prefix.extend_from_slice(&prefix_type_hash(termtype).to_be_bytes());
        prefix.extend_from_slice(&termvalue.to_be_bytes());

        let mut children: Vec<Box<dyn PostingIterator>> = Vec::new();
        for (_, value) in self.kv.iterate_prefix(&prefix) {
            let block = PostingBlock::decode(&value)?;
            children.push(Box::new(TermIterator::new(std::sync::Arc::new(block))));
        }
        Ok(match children.len() {
            0 => Box::new(EmptyIterator),
            1 => children.into_iter().next().unwrap(),
            _ => Box::new(UnionIter::new(children)),
        })
    }

    /// The decoded structure relations stored for `docno`, if any were
    /// declared when the document was built.
    pub fn struct_block_of(&self, docno: u32) -> Result<Option<StructBlock>> {
        match self.kv.get(&keys::struct_block(docno)) {
            Some(bytes) => Ok(Some(StructBlock::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether `user` may see `docno`. Storages opened without
    /// `acl=yes` grant everyone access; otherwise a document is visible
    /// only to users an `'U'` grant was written for.
    pub fn has_access(&self, docno: u32, user: &str) -> bool {
        if !self.config.acl {
            return true;
        }
        self.kv.get(&keys::acl(user, docno)).is_some()
    }
}

/// A selection iterator over a term with no stored postings at all.
struct EmptyIterator;

impl PostingIterator for EmptyIterator {
    fn skip_doc(&mut self, _docno: u32) -> u32 {
        0
    }
    fn skip_pos(&mut self, _pos: u16) -> u16 {
        0
    }
    fn frequency(&self) -> usize {
        0
    }
    fn document_frequency(&self) -> usize {
        0
    }
}
