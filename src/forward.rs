// SPDX-License-Identifier: Apache-2.0

//! Forward index: position → term reader, per document and per term
//! type (key family `'F'`).
//!
//! Unlike the inverted [`crate::postingblock::PostingBlock`] (term →
//! positions), a `ForwardBlock` stores, for each document, the full
//! `(position, valueno)` list for one `termtype` in position order.
//! Forward-index positions must be unique within a document.

use crate::docindex::{self, DocIndexNode};
use crate::error::{ErrorKind, Result};
use crate::varint::{decode_varint, encode_varint};

#[derive(Debug, Clone, Default)]
pub struct ForwardBlock {
    pub nodes: Vec<DocIndexNode>,
    /// Per-document `(position, valueno)` pairs, strictly ascending by
    /// position.
    pub entries: Vec<Vec<(u16, u32)>>,
}

impl ForwardBlock {
    pub fn build(docs: Vec<(u32, Vec<(u16, u32)>)>) -> Result<Self> {
        let mut items = Vec::with_capacity(docs.len());
        let mut entries = Vec::with_capacity(docs.len());
        for (i, (docno, mut positions)) in docs.into_iter().enumerate() {
            positions.sort_by_key(|&(p, _)| p);
            for w in positions.windows(2) {
                if w[0].0 == w[1].0 {
                    return Err(ErrorKind::InvalidArgument(format!(
                        "forward index: duplicate position {} for docno {docno}",
                        w[0].0
                    )));
                }
            }
            items.push((docno, i as u16));
            entries.push(positions);
        }
        Ok(ForwardBlock {
            nodes: docindex::build_nodes(&items),
            entries,
        })
    }

    fn lookup(&self, docno: u32) -> Option<usize> {
        let (_, entry) = docindex::skip_nodes(&self.nodes, docno)?;
        (entry.docno == docno).then_some(entry.reference as usize)
    }

    /// The term (valueno) at `position` in `docno`, if any.
    pub fn term_at(&self, docno: u32, position: u16) -> Option<u32> {
        let list = self.lookup(docno).map(|i| &self.entries[i])?;
        list.binary_search_by_key(&position, |&(p, _)| p)
            .ok()
            .map(|i| list[i].1)
    }

    /// All `(position, valueno)` pairs for `docno`, in position order.
    pub fn terms_of(&self, docno: u32) -> &[(u16, u32)] {
        self.lookup(docno).map(|i| self.entries[i].as_slice()).unwrap_or(&[])
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        docindex::encode_nodes(&self.nodes, &mut out);
        encode_varint(self.entries.len() as u64, &mut out);
        for list in &self.entries {
            encode_varint(list.len() as u64, &mut out);
            let mut prev_pos = 0u32;
            for &(pos, valueno) in list {
                encode_varint((pos as u32 - prev_pos) as u64, &mut out);
                encode_varint(valueno as u64, &mut out);
                prev_pos = pos as u32;
            }
        }
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(ErrorKind::DataCorruption("forward block too short".into()));
        }
        let (body, crc_bytes) = buf.split_at(buf.len() - 4);
        if u32::from_le_bytes(crc_bytes.try_into().unwrap()) != crc32fast::hash(body) {
            return Err(ErrorKind::DataCorruption(
                "forward block: crc32 mismatch".into(),
            ));
        }
        let mut pos = 0;
        let nodes = docindex::decode_nodes(body, &mut pos)?;
        let doc_count = decode_varint(body, &mut pos)? as usize;
        let mut entries = Vec::with_capacity(doc_count);
        for _ in 0..doc_count {
            let n = decode_varint(body, &mut pos)? as usize;
            let mut list = Vec::with_capacity(n);
            let mut prev_pos = 0u32;
            for _ in 0..n {
                let delta = decode_varint(body, &mut pos)?;
                let valueno = decode_varint(body, &mut pos)? as u32;
                let p = prev_pos + delta as u32;
                if p == 0 || p > crate::MAX_POSITION as u32 {
                    return Err(ErrorKind::DataCorruption(format!(
                        "forward block: position {p} out of range"
                    )));
                }
                list.push((p as u16, valueno));
                prev_pos = p;
            }
            entries.push(list);
        }
        if pos != body.len() {
            return Err(ErrorKind::DataCorruption(
                "forward block: trailing bytes".into(),
            ));
        }
        Ok(ForwardBlock { nodes, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_positions() {
        let err = ForwardBlock::build(vec![(1, vec![(5, 10), (5, 11)])]).unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn lookup_and_roundtrip() {
        let fb = ForwardBlock::build(vec![
            (1, vec![(3, 100), (1, 200), (5, 300)]),
            (2, vec![(1, 400)]),
        ])
        .unwrap();
        assert_eq!(fb.term_at(1, 1), Some(200));
        assert_eq!(fb.term_at(1, 3), Some(100));
        assert_eq!(fb.term_at(1, 4), None);
        assert_eq!(fb.terms_of(1), &[(1, 200), (3, 100), (5, 300)]);

        let bytes = fb.encode();
        let decoded = ForwardBlock::decode(&bytes).unwrap();
        assert_eq!(decoded.term_at(2, 1), Some(400));
        assert_eq!(decoded.terms_of(1), fb.terms_of(1));
    }
}
