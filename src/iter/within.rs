// SPDX-License-Identifier: Apache-2.0

//! Within join: like [`super::SequenceIter`] but argument order doesn't
//! matter — any permutation of the children fitting inside a window of
//! `range` positions counts as a match. Implemented by enumerating
//! permutations, which is fine for the small argument counts queries
//! realistically use.

use super::PostingIterator;
use super::SequenceIter;

pub struct WithinIter {
    variants: Vec<SequenceIter>,
    current_docno: u32,
}

impl WithinIter {
    pub fn new(make_children: impl Fn() -> Vec<Box<dyn PostingIterator>>, range: i32) -> Self {
        let n = make_children().len();
        let lengths = vec![1u16; n];
        let mut indices: Vec<usize> = (0..n).collect();
        let mut perms = Vec::new();
        permute(&mut indices, 0, &mut perms);

        let variants = perms
            .into_iter()
            .map(|perm| {
                let base = make_children();
                let mut slots: Vec<Option<Box<dyn PostingIterator>>> =
                    base.into_iter().map(Some).collect();
                let reordered: Vec<Box<dyn PostingIterator>> = perm
                    .into_iter()
                    .map(|i| slots[i].take().expect("each index used once"))
                    .collect();
                SequenceIter::new(reordered, &lengths, range.abs())
            })
            .collect();

        WithinIter {
            variants,
            current_docno: 0,
        }
    }
}

fn permute(items: &mut [usize], k: usize, out: &mut Vec<Vec<usize>>) {
    if k == items.len() {
        out.push(items.to_vec());
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permute(items, k + 1, out);
        items.swap(k, i);
    }
}

impl PostingIterator for WithinIter {
    fn skip_doc(&mut self, docno: u32) -> u32 {
        let mut best = 0u32;
        for v in self.variants.iter_mut() {
            let d = v.skip_doc(docno);
            if d != 0 && (best == 0 || d < best) {
                best = d;
            }
        }
        self.current_docno = best;
        best
    }

    fn skip_pos(&mut self, pos: u16) -> u16 {
        if self.current_docno == 0 {
            return 0;
        }
        let mut best = 0u16;
        for v in self.variants.iter_mut() {
            if v.skip_doc(self.current_docno) != self.current_docno {
                continue;
            }
            let p = v.skip_pos(pos);
            if p != 0 && (best == 0 || p < best) {
                best = p;
            }
        }
        best
    }

    fn frequency(&self) -> usize {
        self.variants.iter().map(|v| v.frequency()).sum()
    }

    fn document_frequency(&self) -> usize {
        self.variants
            .iter()
            .map(|v| v.document_frequency())
            .max()
            .unwrap_or(0)
    }
}
