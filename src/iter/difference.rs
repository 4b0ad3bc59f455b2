// SPDX-License-Identifier: Apache-2.0

//! Difference join: positions of `minuend` that have no matching
//! position in `subtrahend` within the same document.

use super::PostingIterator;

pub struct DifferenceIter {
    minuend: Box<dyn PostingIterator>,
    subtrahend: Box<dyn PostingIterator>,
    current_docno: u32,
    subtrahend_present: bool,
}

impl DifferenceIter {
    pub fn new(minuend: Box<dyn PostingIterator>, subtrahend: Box<dyn PostingIterator>) -> Self {
        DifferenceIter {
            minuend,
            subtrahend,
            current_docno: 0,
            subtrahend_present: false,
        }
    }
}

impl PostingIterator for DifferenceIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        let mut cursor = docno.max(1);
        loop {
            let d = self.minuend.skip_doc(cursor);
            if d == 0 {
                self.current_docno = 0;
                return 0;
            }
            let sd = self.subtrahend.skip_doc(d);
            self.subtrahend_present = sd == d;
            if !self.subtrahend_present || self.skip_pos_impl(0) != 0 {
                self.current_docno = d;
                return d;
            }
            cursor = d + 1;
        }
    }

    fn skip_pos(&mut self, pos: u16) -> u16 {
        if self.current_docno == 0 {
            return 0;
        }
        self.skip_pos_impl(pos)
    }

    fn frequency(&self) -> usize {
        if self.current_docno == 0 {
            return 0;
        }
        if !self.subtrahend_present {
            return self.minuend.frequency();
        }
        let mut count = 0usize;
        let mut pos = 0u16;
        loop {
            let p = self.skip_pos(pos);
            if p == 0 {
                break;
            }
            count += 1;
            if p == u16::MAX {
                break;
            }
            pos = p + 1;
        }
        count
    }

    fn document_frequency(&self) -> usize {
        self.minuend.document_frequency()
    }
}

impl DifferenceIter {
    fn skip_pos_impl(&mut self, pos: u16) -> u16 {
        let mut p = self.minuend.skip_pos(pos);
        if !self.subtrahend_present {
            return p;
        }
        while p != 0 {
            if self.subtrahend.skip_pos(p) != p {
                return p;
            }
            p = self.minuend.skip_pos(p + 1);
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::TermIterator;
    use crate::postingblock::PostingBlock;
    use std::sync::Arc;

    #[test]
    fn removes_shared_positions() {
        let a = PostingBlock::build(vec![(1, vec![1, 2, 3])]);
        let b = PostingBlock::build(vec![(1, vec![2])]);
        let mut it = DifferenceIter::new(
            Box::new(TermIterator::new(Arc::new(a))),
            Box::new(TermIterator::new(Arc::new(b))),
        );
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(it.skip_pos(1), 1);
        assert_eq!(it.skip_pos(2), 3);
        assert_eq!(it.skip_pos(4), 0);
    }

    #[test]
    fn doc_fully_excluded_is_skipped() {
        let a = PostingBlock::build(vec![(1, vec![1]), (2, vec![1])]);
        let b = PostingBlock::build(vec![(1, vec![1])]);
        let mut it = DifferenceIter::new(
            Box::new(TermIterator::new(Arc::new(a))),
            Box::new(TermIterator::new(Arc::new(b))),
        );
        assert_eq!(it.skip_doc(1), 2);
    }
}
