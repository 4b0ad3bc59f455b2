// SPDX-License-Identifier: Apache-2.0

//! Posting-join operator algebra: the set of composable iterators query
//! evaluation builds expression trees from. Every operator implements
//! [`PostingIterator`], so trees of arbitrary depth compose uniformly.

mod difference;
mod intersect;
mod sequence;
mod struct_join;
mod term;
mod union;
mod within;

pub use difference::DifferenceIter;
pub use intersect::IntersectIter;
pub use sequence::SequenceIter;
pub use struct_join::{StructSequenceIter, StructWithinIter};
pub use term::TermIterator;
pub use union::UnionIter;
pub use within::WithinIter;

/// A posting iterator over `(docno, position)` pairs for one query
/// feature (term, or a composite expression of terms).
///
/// All implementations guarantee strictly increasing docnos and,
/// within a fixed docno, strictly increasing positions; no iterator
/// ever returns the same `(docno, pos)` twice.
pub trait PostingIterator {
    /// Advance to the first docno `>= docno` that this iterator
    /// matches, or `0` if none remains. Resets the position cursor.
    fn skip_doc(&mut self, docno: u32) -> u32;

    /// A faster approximation of [`skip_doc`](Self::skip_doc) that may
    /// return false positives a caller must reject with a real
    /// `skip_doc` call. Defaults to the exact implementation.
    fn skip_doc_candidate(&mut self, docno: u32) -> u32 {
        self.skip_doc(docno)
    }

    /// Advance to the first position `>= pos` within the current
    /// document, or `0` if none remains.
    fn skip_pos(&mut self, pos: u16) -> u16;

    /// Feature frequency (match count) at the current document.
    fn frequency(&self) -> usize;

    /// Total number of documents this iterator can ever match.
    fn document_frequency(&self) -> usize;
}

impl PostingIterator for Box<dyn PostingIterator> {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        (**self).skip_doc(docno)
    }
    fn skip_doc_candidate(&mut self, docno: u32) -> u32 {
        (**self).skip_doc_candidate(docno)
    }
    fn skip_pos(&mut self, pos: u16) -> u16 {
        (**self).skip_pos(pos)
    }
    fn frequency(&self) -> usize {
        (**self).frequency()
    }
    fn document_frequency(&self) -> usize {
        (**self).document_frequency()
    }
}
