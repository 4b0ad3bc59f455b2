// SPDX-License-Identifier: Apache-2.0

//! Ordered key/value store adapter.
//!
//! Only the interface contract of the underlying LevelDB-style ordered
//! store belongs to this crate. [`MemoryKvStore`] is a reference
//! implementation used by the storage client's own tests and the CLI;
//! production deployments plug in a real LSM engine behind the same
//! trait.
//!
//! Keys are opaque byte strings; multi-byte integers embedded in keys are
//! big-endian so lexicographic byte order matches numeric order. Values
//! are opaque byte blobs (packed little-endian layouts are defined by
//! the higher-level block formats).

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ErrorKind, Result};

/// A single mutation staged into a [`Batch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// A set of mutations applied atomically by [`KvStore::write_batch`].
///
/// `Transaction::commit` stages every per-document diff into a single
/// batch so that a write error leaves no visible partial change.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    ops: Vec<WriteOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(WriteOp::Delete(key.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

/// A read-only, point-in-time view of the store.
///
/// Queries take a snapshot at start: an in-flight query keeps reading
/// its own snapshot even as later transactions commit.
pub trait KvSnapshot: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Iterate all key/value pairs whose key starts with `prefix`, in
    /// ascending key order.
    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;
}

/// The KV store's external contract.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, key: &[u8], value: &[u8]);
    fn delete(&self, key: &[u8]);
    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

    /// Apply a batch atomically: either every op lands, or (on an I/O
    /// error) none of them do.
    fn write_batch(&self, batch: Batch) -> Result<()>;

    fn snapshot(&self) -> Arc<dyn KvSnapshot>;
}

/// An in-memory, `BTreeMap`-backed reference `KvStore`.
///
/// Lock-free reads after [`snapshot`](KvStore::snapshot) is taken: the
/// snapshot holds its own `Arc`-shared copy of the map, so readers never
/// contend with the writer lock.
#[derive(Default)]
pub struct MemoryKvStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemorySnapshot {
    data: Arc<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl KvSnapshot for MemorySnapshot {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let prefix = prefix.to_vec();
        Box::new(
            self.data
                .range(prefix.clone()..)
                .take_while(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.read().get(key).cloned()
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        self.inner.write().insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.inner.write().remove(key);
    }

    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a> {
        let guard = self.inner.read();
        let prefix_v = prefix.to_vec();
        let items: Vec<_> = guard
            .range(prefix_v.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix_v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(items.into_iter())
    }

    fn write_batch(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut guard = self.inner.write();
        for op in batch.ops {
            match op {
                WriteOp::Put(k, v) => {
                    guard.insert(k, v);
                }
                WriteOp::Delete(k) => {
                    guard.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Arc<dyn KvSnapshot> {
        let data = self.inner.read().clone();
        Arc::new(MemorySnapshot {
            data: Arc::new(data),
        })
    }
}

/// Key-building helpers for the on-disk key layout.
pub mod keys {
    /// `'T' + termtype + termvalue + base_docno`; the block's docno
    /// range is resolved to its starting docno by the caller — see
    /// `storage::transaction`.
    pub fn posting_block(termtype: u32, termvalue: u32, base_docno: u32) -> Vec<u8> {
        let mut k = vec![b'T'];
        k.extend_from_slice(&termtype.to_be_bytes());
        k.extend_from_slice(&termvalue.to_be_bytes());
        k.extend_from_slice(&base_docno.to_be_bytes());
        k
    }

    pub fn forward_block(termtype: u32, base_docno: u32) -> Vec<u8> {
        let mut k = vec![b'F'];
        k.extend_from_slice(&termtype.to_be_bytes());
        k.extend_from_slice(&base_docno.to_be_bytes());
        k
    }

    pub fn struct_block(base_docno: u32) -> Vec<u8> {
        let mut k = vec![b'S'];
        k.extend_from_slice(&base_docno.to_be_bytes());
        k
    }

    pub fn metadata_cell(column: &str, docno: u32) -> Vec<u8> {
        let mut k = vec![b'M'];
        k.extend_from_slice(column.as_bytes());
        k.push(0);
        k.extend_from_slice(&docno.to_be_bytes());
        k
    }

    pub fn attribute(name: &str, docno: u32) -> Vec<u8> {
        let mut k = vec![b'A'];
        k.extend_from_slice(name.as_bytes());
        k.push(0);
        k.extend_from_slice(&docno.to_be_bytes());
        k
    }

    pub fn acl(user: &str, docno: u32) -> Vec<u8> {
        let mut k = vec![b'U'];
        k.extend_from_slice(user.as_bytes());
        k.push(0);
        k.extend_from_slice(&docno.to_be_bytes());
        k
    }

    pub fn docid_to_docno(docid: &str) -> Vec<u8> {
        let mut k = vec![b'N'];
        k.extend_from_slice(docid.as_bytes());
        k
    }

    pub fn docno_to_docid(docno: u32) -> Vec<u8> {
        let mut k = vec![b'D'];
        k.extend_from_slice(&docno.to_be_bytes());
        k
    }

    pub fn valueno(kind: &str, value: &str) -> Vec<u8> {
        let mut k = vec![b'V'];
        k.extend_from_slice(kind.as_bytes());
        k.push(0);
        k.extend_from_slice(value.as_bytes());
        k
    }

    /// Reverse of [`valueno`]: `id → value`, keyed under a distinct
    /// prefix so forward and reverse lookups never collide.
    pub fn valueno_reverse(kind: &str, id: u32) -> Vec<u8> {
        let mut k = vec![b'v'];
        k.extend_from_slice(kind.as_bytes());
        k.push(0);
        k.extend_from_slice(&id.to_be_bytes());
        k
    }
}

pub fn io_err(msg: impl Into<String>) -> ErrorKind {
    ErrorKind::IoError(msg.into())
}
