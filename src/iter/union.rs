// SPDX-License-Identifier: Apache-2.0

//! Union of N posting iterators: matches a document if any child does.

use super::PostingIterator;

pub struct UnionIter {
    children: Vec<Box<dyn PostingIterator>>,
    current_docs: Vec<u32>,
    current_docno: u32,
}

impl UnionIter {
    pub fn new(children: Vec<Box<dyn PostingIterator>>) -> Self {
        let n = children.len();
        UnionIter {
            children,
            current_docs: vec![0; n],
            current_docno: 0,
        }
    }
}

impl PostingIterator for UnionIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        for (child, cur) in self.children.iter_mut().zip(self.current_docs.iter_mut()) {
            if *cur < docno {
                *cur = child.skip_doc(docno);
            }
        }
        self.current_docno = self
            .current_docs
            .iter()
            .copied()
            .filter(|&d| d != 0)
            .min()
            .unwrap_or(0);
        self.current_docno
    }

    fn skip_pos(&mut self, pos: u16) -> u16 {
        if self.current_docno == 0 {
            return 0;
        }
        let mut best = 0u16;
        for (child, cur) in self.children.iter_mut().zip(self.current_docs.iter()) {
            if *cur != self.current_docno {
                continue;
            }
            let p = child.skip_pos(pos);
            if p != 0 && (best == 0 || p < best) {
                best = p;
            }
        }
        best
    }

    fn frequency(&self) -> usize {
        if self.current_docno == 0 {
            return 0;
        }
        self.children
            .iter()
            .zip(self.current_docs.iter())
            .filter(|(_, &d)| d == self.current_docno)
            .map(|(c, _)| c.frequency())
            .sum()
    }

    fn document_frequency(&self) -> usize {
        // Upper bound: the true count requires a full document-set pass.
        self.children.iter().map(|c| c.document_frequency()).sum()
    }
}
