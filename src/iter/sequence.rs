// SPDX-License-Identifier: Apache-2.0

//! Sequence join: children must match in argument order, each at
//! `start + lengths[..i].sum()`, with the whole span bounded by `range`.
//! A negative `range` reverses the expected order (last argument first).

use super::PostingIterator;

pub struct SequenceIter {
    children: Vec<Box<dyn PostingIterator>>,
    offsets: Vec<u16>,
    range: i32,
    current_docno: u32,
}

impl SequenceIter {
    /// `lengths[i]` is the token span of argument `i`; offsets are the
    /// cumulative sums `Σ_{j<i} lengths[j]`. `range < 0` reverses the
    /// argument order (used for "precedes" style sequences).
    pub fn new(mut children: Vec<Box<dyn PostingIterator>>, lengths: &[u16], range: i32) -> Self {
        if range < 0 {
            children.reverse();
        }
        let lens: Vec<u16> = if range < 0 {
            lengths.iter().rev().copied().collect()
        } else {
            lengths.to_vec()
        };
        let mut offsets = Vec::with_capacity(lens.len());
        let mut acc = 0u16;
        for l in &lens {
            offsets.push(acc);
            acc = acc.saturating_add(*l);
        }
        SequenceIter {
            children,
            offsets,
            range,
            current_docno: 0,
        }
    }

    fn max_span(&self) -> u16 {
        if self.range == 0 {
            u16::MAX
        } else {
            self.range.unsigned_abs() as u16
        }
    }
}

impl PostingIterator for SequenceIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        let mut cursor = docno.max(1);
        'outer: loop {
            let mut next_cursor = 0u32;
            for child in self.children.iter_mut() {
                let d = child.skip_doc(cursor);
                if d == 0 {
                    self.current_docno = 0;
                    return 0;
                }
                if d != cursor {
                    next_cursor = d;
                    cursor = d;
                    continue 'outer;
                }
            }
            // all children present in this doc; verify a real
            // position match exists before accepting it.
            if self.skip_pos_impl(0) != 0 {
                self.current_docno = cursor;
                return cursor;
            }
            cursor += 1;
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
        let mut count = 0usize;
        let mut pos = 0u16;
        loop {
            let p = self.skip_pos_impl(pos);
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
        self.children
            .iter()
            .map(|c| c.document_frequency())
            .min()
            .unwrap_or(0)
    }
}

impl SequenceIter {
    /// Finds the smallest valid starting position `>= from` for
    /// `children[0]` such that every subsequent child matches exactly
    /// at its offset, within the configured span.
    fn skip_pos_impl(&mut self, from: u16) -> u16 {
        let max_span = self.max_span();
        let mut from = from.max(1);
        loop {
            let p0 = self.children[0].skip_pos(from);
            if p0 == 0 {
                return 0;
            }
            let mut ok = true;
            let mut last_end = p0;
            for i in 1..self.children.len() {
                let want = p0.saturating_add(self.offsets[i]);
                let got = self.children[i].skip_pos(want);
                if got != want {
                    ok = false;
                    from = if got == 0 {
                        return 0;
                    } else {
                        got.saturating_sub(self.offsets[i]).max(p0 + 1)
                    };
                    break;
                }
                last_end = got;
            }
            if !ok {
                continue;
            }
            let span = last_end.saturating_sub(p0) + 1;
            if span <= max_span {
                return p0;
            }
            from = p0 + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::TermIterator;
    use crate::postingblock::PostingBlock;
    use std::sync::Arc;

    #[test]
    fn simple_adjacent_sequence() {
        // "quick brown": quick at 1, brown at 2, same doc.
        let a = PostingBlock::build(vec![(1, vec![1, 10])]);
        let b = PostingBlock::build(vec![(1, vec![2, 15])]);
        let mut it = SequenceIter::new(
            vec![
                Box::new(TermIterator::new(Arc::new(a))),
                Box::new(TermIterator::new(Arc::new(b))),
            ],
            &[1, 1],
            2,
        );
        assert_eq!(it.skip_doc(1), 1);
        assert_eq!(it.frequency(), 1);
    }

    #[test]
    fn no_match_when_out_of_range() {
        let a = PostingBlock::build(vec![(1, vec![1])]);
        let b = PostingBlock::build(vec![(1, vec![20])]);
        let mut it = SequenceIter::new(
            vec![
                Box::new(TermIterator::new(Arc::new(a))),
                Box::new(TermIterator::new(Arc::new(b))),
            ],
            &[1, 1],
            2,
        );
        assert_eq!(it.skip_doc(1), 0);
    }
}
