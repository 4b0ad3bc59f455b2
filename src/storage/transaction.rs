// SPDX-License-Identifier: Apache-2.0

//! Batches document inserts/deletes into one atomic commit: merges new
//! postings into each affected term's block chain, re-splits or joins
//! blocks that drift outside their fill ratios, and writes metadata,
//! attributes, structures and ACL grants alongside.

use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::kv::{keys, Batch};
use crate::postingblock::PostingBlock;

use super::client::StorageClient;
use super::document::DocumentBuilder;

/// A block is split once its encoded size exceeds this fraction of
/// `MAX_BLOCK_SIZE`.
pub const BLOCK_FILL_SPLIT_RATIO: f64 = 0.9;

/// Adjacent blocks merge back together once both fall under this
/// fraction of `MAX_BLOCK_SIZE` — half the split threshold, so a
/// block that just split doesn't immediately qualify to rejoin.
pub const BLOCK_FILL_JOIN_RATIO: f64 = 0.45;

pub struct Transaction<'a> {
    client: &'a StorageClient,
    inserts: Vec<DocumentBuilder>,
    deletes: Vec<String>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(client: &'a StorageClient) -> Self {
        Transaction {
            client,
            inserts: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn insert(&mut self, doc: DocumentBuilder) -> &mut Self {
        self.inserts.push(doc);
        self
    }

    pub fn delete(&mut self, docid: impl Into<String>) -> &mut Self {
        self.deletes.push(docid.into());
        self
    }

    pub fn commit(self) -> Result<()> {
        let mut batch = Batch::new();

        let mut deleted_docnos = Vec::new();
        for docid in &self.deletes {
            if let Some(docno) = self.client.docno_of(docid) {
                deleted_docnos.push(docno);
                batch.delete(keys::docid_to_docno(docid));
                batch.delete(keys::docno_to_docid(docno));
            }
        }

        // docno -> assigned docno, in insertion order.
        let mut assigned = Vec::with_capacity(self.inserts.len());
        for doc in &self.inserts {
            let docno = self.client.allocate_docno();
            assigned.push(docno);
            batch.put(keys::docid_to_docno(&doc.docid), docno.to_be_bytes().to_vec());
            batch.put(keys::docno_to_docid(docno), doc.docid.clone().into_bytes());
        }

        // Group every new posting by (termtype, termvalue).
        let mut postings: HashMap<(String, u32), BTreeMap<u32, Vec<u16>>> = HashMap::new();
        for (doc, &docno) in self.inserts.iter().zip(assigned.iter()) {
            for term in &doc.terms {
                let termvalue_id = self.client.intern_term(&term.termtype, &term.termvalue)?;
                let entry = postings
                    .entry((term.termtype.clone(), termvalue_id))
                    .or_default()
                    .entry(docno)
                    .or_default();
                if !entry.contains(&term.position) {
                    entry.push(term.position);
                }
            }
        }
        for positions_by_doc in postings.values_mut() {
            for positions in positions_by_doc.values_mut() {
                positions.sort_unstable();
            }
        }

        for ((termtype, termvalue), new_docs) in &postings {
            self.merge_term_blocks(&mut batch, termtype, *termvalue, new_docs, &deleted_docnos)?;
        }

        for (doc, &docno) in self.inserts.iter().zip(assigned.iter()) {
            for (name, value) in &doc.metadata {
                let cell = keys::metadata_cell(name, docno);
                batch.put(cell, value.to_le_bytes().to_vec());
                self.client.metadata.write().set(docno, name, *value)?;
            }
            for (name, value) in &doc.attributes {
                batch.put(keys::attribute(name, docno), value.clone().into_bytes());
            }
            for user in &doc.acl_users {
                batch.put(keys::acl(user, docno), Vec::new());
            }
            if !doc.structures.is_empty() {
                // `StructBlockBuilder` is consumed on build; clone the
                // declarations already captured by value.
                let built = clone_and_build(&doc.structures)?;
                batch.put(keys::struct_block(docno), built.encode());
            }
        }

        for docno in &deleted_docnos {
            self.client.metadata.write().remove_document(*docno);
        }

        self.client.kv.write_batch(batch)?;

        for docno in deleted_docnos {
            self.client.free_docno(docno);
        }
        Ok(())
    }

    fn merge_term_blocks(
        &self,
        batch: &mut Batch,
        termtype: &str,
        termvalue: u32,
        new_docs: &BTreeMap<u32, Vec<u16>>,
        deleted_docnos: &[u32],
    ) -> Result<()> {
        let prefix = term_block_prefix(termtype, termvalue);
        let mut combined: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
        let mut old_keys = Vec::new();
        for (key, value) in self.client.kv.iterate_prefix(&prefix) {
            old_keys.push(key);
            let block = PostingBlock::decode(&value)?;
            for node in &block.nodes {
                for entry in &node.entries {
                    combined.insert(entry.docno, block.positions[entry.reference as usize].clone());
                }
            }
        }
        for docno in deleted_docnos {
            combined.remove(docno);
        }
        for (&docno, positions) in new_docs {
            combined.insert(docno, positions.clone());
        }

        for key in old_keys {
            batch.delete(key);
        }
        if combined.is_empty() {
            return Ok(());
        }

        for block in repartition(&combined) {
            let Some(base) = block.base_docno() else {
                continue;
            };
            batch.put(keys::posting_block(prefix_type_hash(termtype), termvalue, base), block.encode());
        }
        Ok(())
    }
}

fn clone_and_build(
    builder: &crate::structblock::StructBlockBuilder,
) -> Result<crate::structblock::StructBlock> {
    builder.clone().build()
}

/// Splits a block whenever its encoded size would exceed
/// `BLOCK_FILL_SPLIT_RATIO` of the soft size budget; adjacent
/// undersized remainders (below `BLOCK_FILL_JOIN_RATIO`) are left
/// joined since this pass always builds the minimal block count
/// satisfying the split bound.
fn repartition(combined: &BTreeMap<u32, Vec<u16>>) -> Vec<PostingBlock> {
    let split_limit = (crate::MAX_BLOCK_SIZE as f64 * BLOCK_FILL_SPLIT_RATIO) as usize;
    let mut blocks = Vec::new();
    let mut current: Vec<(u32, Vec<u16>)> = Vec::new();
    for (&docno, positions) in combined {
        current.push((docno, positions.clone()));
        if current.len() > 1 {
            let trial = PostingBlock::build(current.clone());
            if trial.encode().len() > split_limit {
                let last = current.pop().unwrap();
                blocks.push(PostingBlock::build(current));
                current = vec![last];
            }
        }
    }
    if !current.is_empty() {
        blocks.push(PostingBlock::build(current));
    }
    blocks
}

fn term_block_prefix(termtype: &str, termvalue: u32) -> Vec<u8> {
    let mut k = vec![b'T'];
    k.extend_from_slice(&prefix_type_hash(termtype).to_be_bytes());
    k.extend_from_slice(&termvalue.to_be_bytes());
    k
}

/// `keys::posting_block` keys on a numeric `termtype`; termtypes here
/// are configured strings, so fold them to a stable u32 the same way
/// `intern_term` would if termtypes were interned like termvalues.
pub(crate) fn prefix_type_hash(termtype: &str) -> u32 {
    let mut h = 2166136261u32;
    for b in termtype.as_bytes() {
        h ^= *b as u32;
        h = h.wrapping_mul(16777619);
    }
    h
}
