// SPDX-License-Identifier: Apache-2.0

//! Structure-aware sequence/within joins: like their plain counterparts,
//! but a match is rejected if any position of `delimiter` falls
//! strictly between the first and last matched position — e.g.
//! preventing a phrase match from crossing a sentence boundary.

use super::{PostingIterator, SequenceIter, WithinIter};

pub struct StructSequenceIter {
    inner: SequenceIter,
    delimiter: Box<dyn PostingIterator>,
    current_docno: u32,
}

impl StructSequenceIter {
    pub fn new(
        children: Vec<Box<dyn PostingIterator>>,
        lengths: &[u16],
        range: i32,
        delimiter: Box<dyn PostingIterator>,
    ) -> Self {
        StructSequenceIter {
            inner: SequenceIter::new(children, lengths, range),
            delimiter,
            current_docno: 0,
        }
    }
}

/// True if any delimiter position lies strictly inside `(start, end)`.
fn crosses_delimiter(delimiter: &mut Box<dyn PostingIterator>, start: u16, end: u16) -> bool {
    if end <= start + 1 {
        return false;
    }
    let p = delimiter.skip_pos(start + 1);
    p != 0 && p < end
}

impl PostingIterator for StructSequenceIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        let mut cursor = docno.max(1);
        loop {
            let d = self.inner.skip_doc(cursor);
            if d == 0 {
                self.current_docno = 0;
                return 0;
            }
            let delim_present = self.delimiter.skip_doc(d) == d;
            let mut pos = 0u16;
            loop {
                let start = self.inner.skip_pos(pos);
                if start == 0 {
                    break;
                }
                let span = self.inner.frequency().max(1) as u16;
                let end = start + span;
                if !delim_present || !crosses_delimiter(&mut self.delimiter, start, end) {
                    self.current_docno = d;
                    return d;
                }
                pos = start + 1;
            }
            cursor = d + 1;
        }
    }

    fn skip_pos(&mut self, pos: u16) -> u16 {
        if self.current_docno == 0 {
            return 0;
        }
        self.inner.skip_pos(pos)
    }

    fn frequency(&self) -> usize {
        self.inner.frequency()
    }

    fn document_frequency(&self) -> usize {
        self.inner.document_frequency()
    }
}

pub struct StructWithinIter {
    inner: WithinIter,
    delimiter: Box<dyn PostingIterator>,
    current_docno: u32,
}

impl StructWithinIter {
    pub fn new(
        make_children: impl Fn() -> Vec<Box<dyn PostingIterator>>,
        range: i32,
        delimiter: Box<dyn PostingIterator>,
    ) -> Self {
        StructWithinIter {
            inner: WithinIter::new(make_children, range),
            delimiter,
            current_docno: 0,
        }
    }
}

impl PostingIterator for StructWithinIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        let mut cursor = docno.max(1);
        loop {
            let d = self.inner.skip_doc(cursor);
            if d == 0 {
                self.current_docno = 0;
                return 0;
            }
            let delim_present = self.delimiter.skip_doc(d) == d;
            if !delim_present {
                self.current_docno = d;
                return d;
            }
            let start = self.inner.skip_pos(0);
            if start == 0 {
                cursor = d + 1;
                continue;
            }
            let span = self.inner.frequency().max(1) as u16;
            if !crosses_delimiter(&mut self.delimiter, start, start + span) {
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
        self.inner.skip_pos(pos)
    }

    fn frequency(&self) -> usize {
        self.inner.frequency()
    }

    fn document_frequency(&self) -> usize {
        self.inner.document_frequency()
    }
}
