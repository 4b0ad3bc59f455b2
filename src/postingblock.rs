// SPDX-License-Identifier: Apache-2.0

//! `PostingBlock`: positional posting lists for one `(termtype,
//! termvalue)` pair over a range of docnos.
//!
//! Layout: a [`DocIndexNode`] array maps each docno in the block to an
//! index into a parallel per-doc position-list array. Term frequency is
//! simply the length of a document's position list (duplicate postings
//! at the same position collapse before reaching this layer).

use crate::docindex::{self, DocIndexNode};
use crate::error::{ErrorKind, Result};
use crate::varint::{decode_position_list, encode_position_list};

#[derive(Debug, Clone, Default)]
pub struct PostingBlock {
    pub nodes: Vec<DocIndexNode>,
    pub positions: Vec<Vec<u16>>,
}

impl PostingBlock {
    /// Build a block from an ascending-docno sequence of per-document
    /// position lists. Positions within a document must already be
    /// sorted ascending and deduplicated.
    pub fn build(docs: Vec<(u32, Vec<u16>)>) -> Self {
        let mut items = Vec::with_capacity(docs.len());
        let mut positions = Vec::with_capacity(docs.len());
        for (i, (docno, poslist)) in docs.into_iter().enumerate() {
            items.push((docno, i as u16));
            positions.push(poslist);
        }
        let nodes = docindex::build_nodes(&items);
        PostingBlock { nodes, positions }
    }

    pub fn base_docno(&self) -> Option<u32> {
        self.nodes.first().and_then(|n| n.first_docno())
    }

    pub fn last_docno(&self) -> Option<u32> {
        self.nodes.last().and_then(|n| n.last_docno())
    }

    pub fn document_frequency(&self) -> usize {
        self.positions.len()
    }

    /// Term frequency (count of distinct positions) for `docno`.
    pub fn frequency(&self, docno: u32) -> usize {
        self.lookup(docno).map(|i| self.positions[i].len()).unwrap_or(0)
    }

    pub fn positions_of(&self, docno: u32) -> &[u16] {
        self.lookup(docno)
            .map(|i| self.positions[i].as_slice())
            .unwrap_or(&[])
    }

    fn lookup(&self, docno: u32) -> Option<usize> {
        let (_, entry) = docindex::skip_nodes(&self.nodes, docno)?;
        (entry.docno == docno).then_some(entry.reference as usize)
    }

    /// First docno `>= target` carrying a posting, or `None`.
    pub fn skip_doc(&self, target: u32) -> Option<u32> {
        docindex::skip_nodes(&self.nodes, target).map(|(_, e)| e.docno)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        docindex::encode_nodes(&self.nodes, &mut out);
        crate::varint::encode_varint(self.positions.len() as u64, &mut out);
        for p in &self.positions {
            encode_position_list(p, &mut out);
        }
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(ErrorKind::DataCorruption("posting block too short".into()));
        }
        let (body, crc_bytes) = buf.split_at(buf.len() - 4);
        let expect = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let actual = crc32fast::hash(body);
        if expect != actual {
            return Err(ErrorKind::DataCorruption(
                "posting block: crc32 mismatch".into(),
            ));
        }
        let mut pos = 0;
        let nodes = docindex::decode_nodes(body, &mut pos)?;
        let count = crate::varint::decode_varint(body, &mut pos)? as usize;
        let mut positions = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push(decode_position_list(body, &mut pos)?);
        }
        if pos != body.len() {
            return Err(ErrorKind::DataCorruption(
                "posting block: trailing bytes after positions section".into(),
            ));
        }
        Ok(PostingBlock { nodes, positions })
    }
}
