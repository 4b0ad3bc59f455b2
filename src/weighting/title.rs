// SPDX-License-Identifier: Apache-2.0

//! Title weighting: walks a document's declared header/content structure
//! outward-in, scoring how much of the query a nested title path covers.
//! A header's own source range is the title text; its sink range is the
//! content it introduces (which may itself contain nested headers).
//! `hierarchy(header)` is how many *other* headers' content encloses it,
//! so the document title sits at hierarchy 0 and a sub-sub-heading sits
//! deeper. Matching more of the query at a shallower header is worth
//! more than matching the rest deeper in, decayed by `hf` per level.

use super::{
    collect_positions, param_f64, DocStats, WeightResult, WeightedFeature, WeightingContext,
    WeightingFunction,
};
use crate::error::Result;
use crate::structblock::IndexRange;

pub struct Title {
    hf: f64,
    results: usize,
    maxdf: f64,
}

impl Title {
    pub fn from_params(params: &[(String, String)]) -> Result<Self> {
        Ok(Title {
            hf: param_f64(params, "hf", 0.7)?,
            results: param_f64(params, "results", 0.0)? as usize,
            maxdf: param_f64(params, "maxdf", 1.0)?,
        })
    }
}

struct Header {
    source: IndexRange,
    content: IndexRange,
    hierarchy: u32,
    matched: u64,
    new_matches: u32,
}

/// Search-queue state: the content field reached so far, the hierarchy
/// level that produced it, the accumulated weight, and the bitset of
/// query postings already spent.
#[derive(Clone, Copy)]
struct SearchState {
    covered: IndexRange,
    hierarchy: u32,
    weight: f64,
    used: u64,
}

impl WeightingFunction for Title {
    fn weight(
        &self,
        features: &mut [WeightedFeature<'_>],
        stats: DocStats,
        ctx: &WeightingContext<'_>,
    ) -> WeightResult {
        let nq = features.len();
        if nq == 0 {
            return WeightResult::Scalar(0.0);
        }
        let Some(structure) = ctx.structure else {
            return WeightResult::Scalar(0.0);
        };

        let is_stopword: Vec<bool> = features
            .iter()
            .map(|f| {
                stats.collection_size > 0
                    && f.document_frequency as f64 > self.maxdf * stats.collection_size as f64
            })
            .collect();

        let positions: Vec<Vec<u16>> = features
            .iter_mut()
            .map(|f| collect_positions(f.iterator))
            .collect();

        let matched_bits = |range: &IndexRange| -> (u64, u32) {
            let mut bits = 0u64;
            let mut count = 0u32;
            for (i, pos_list) in positions.iter().enumerate() {
                if is_stopword[i] {
                    continue;
                }
                if pos_list.iter().any(|&p| range.contains(p)) {
                    bits |= 1u64 << i.min(63);
                    count += 1;
                }
            }
            (bits, count)
        };

        let declarations = structure.declarations();
        if declarations.is_empty() {
            return WeightResult::Scalar(0.0);
        }

        let mut headers: Vec<Header> = declarations
            .iter()
            .map(|d| {
                let (matched, new_matches) = matched_bits(&d.source);
                Header {
                    source: d.source,
                    content: d.sink,
                    hierarchy: 0,
                    matched,
                    new_matches,
                }
            })
            .collect();

        for i in 0..headers.len() {
            let mut depth = 0u32;
            for j in 0..headers.len() {
                if i != j && headers[j].content.encloses(&headers[i].source) {
                    depth += 1;
                }
            }
            headers[i].hierarchy = depth;
        }

        let full_mask: u64 = if nq >= 64 { u64::MAX } else { (1u64 << nq) - 1 };

        let mut frontier: Vec<SearchState> = headers
            .iter()
            .filter(|h| h.hierarchy == 0 && h.new_matches > 0)
            .map(|h| SearchState {
                covered: h.content,
                hierarchy: 0,
                weight: (h.new_matches as f64 / nq as f64) * self.hf.powi(0),
                used: h.matched,
            })
            .collect();

        let mut leaves: Vec<(IndexRange, f64)> = Vec::new();
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for state in &frontier {
                let remaining_stopwords_only = (0..nq)
                    .filter(|&i| state.used & (1u64 << i.min(63)) == 0)
                    .all(|i| is_stopword.get(i).copied().unwrap_or(false));
                let mut extended = false;
                for h in &headers {
                    if h.hierarchy <= state.hierarchy {
                        continue;
                    }
                    if !state.covered.encloses(&h.source) {
                        continue;
                    }
                    let new_bits = h.matched & !state.used;
                    if new_bits == 0 {
                        continue;
                    }
                    let consumed = new_bits.count_ones();
                    let used = state.used | new_bits;
                    let weight = state.weight + (consumed as f64 / nq as f64) * self.hf.powi(h.hierarchy as i32);
                    let complete = h.matched.count_ones() as u16 == h.source.len().min(64);
                    extended = true;
                    if used == full_mask || complete {
                        leaves.push((h.content, weight));
                    } else {
                        next.push(SearchState {
                            covered: h.content,
                            hierarchy: h.hierarchy,
                            weight,
                            used,
                        });
                    }
                }
                if !extended || remaining_stopwords_only || state.used == full_mask {
                    leaves.push((state.covered, state.weight));
                }
            }
            frontier = next;
        }

        if leaves.is_empty() {
            return WeightResult::Scalar(0.0);
        }

        leaves.sort_by(|a, b| {
            a.0.start
                .cmp(&b.0.start)
                .then(a.0.end.cmp(&b.0.end))
                .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        leaves.dedup_by_key(|(field, _)| *field);
        leaves.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if self.results > 0 && leaves.len() > self.results {
            leaves.truncate(self.results);
        }
        WeightResult::Fields(leaves)
    }

    fn name(&self) -> &'static str {
        "title"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{PostingIterator, TermIterator};
    use crate::postingblock::PostingBlock;
    use crate::structblock::StructBlockBuilder;
    use std::sync::Arc;

    /// Nested titles A(1..5)⊃B(10..15)⊃C(20..25), each introducing a
    /// content field containing the next header: A's content is
    /// 5..30 (covers B and C), B's content is 15..30 (covers C), C's
    /// content is 25..30. Query features f1,f2 land in A, f3 in B, f4
    /// in C, matching spec scenario S5.
    #[test]
    fn title_hierarchy_weight_matches_nested_scenario() {
        let mut builder = StructBlockBuilder::new();
        builder
            .add(1, IndexRange::new(1, 5).unwrap(), IndexRange::new(5, 30).unwrap())
            .unwrap();
        builder
            .add(1, IndexRange::new(10, 15).unwrap(), IndexRange::new(15, 30).unwrap())
            .unwrap();
        builder
            .add(1, IndexRange::new(20, 25).unwrap(), IndexRange::new(25, 30).unwrap())
            .unwrap();
        let structure = builder.build().unwrap();

        let title = Title::from_params(&[("hf".into(), "0.5".into())]).unwrap();

        let mut f1 = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![2])])));
        let mut f2 = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![3])])));
        let mut f3 = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![12])])));
        let mut f4 = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![22])])));
        for it in [&mut f1, &mut f2, &mut f3, &mut f4] {
            it.skip_doc(1);
        }

        let mut features = vec![
            WeightedFeature {
                iterator: &mut f1,
                document_frequency: 1,
            },
            WeightedFeature {
                iterator: &mut f2,
                document_frequency: 1,
            },
            WeightedFeature {
                iterator: &mut f3,
                document_frequency: 1,
            },
            WeightedFeature {
                iterator: &mut f4,
                document_frequency: 1,
            },
        ];
        let stats = DocStats {
            doc_length: 30,
            avg_doc_length: 30.0,
            collection_size: 1,
        };
        let ctx = WeightingContext {
            structure: Some(&structure),
        };
        let result = title.weight(&mut features, stats, &ctx);
        let c_content = IndexRange::new(25, 30).unwrap();
        let got = match &result {
            WeightResult::Fields(fields) => fields.iter().find(|(f, _)| *f == c_content).map(|(_, w)| *w),
            WeightResult::Scalar(_) => None,
        };
        let expect = 1.0 * (2.0 / 4.0) + 0.5 * (1.0 / 4.0) + 0.25 * (1.0 / 4.0);
        assert!((got.unwrap() - expect).abs() < 1e-9);
    }

    #[test]
    fn partial_match_weight_never_exceeds_one() {
        let mut builder = StructBlockBuilder::new();
        builder
            .add(1, IndexRange::new(1, 5).unwrap(), IndexRange::new(5, 10).unwrap())
            .unwrap();
        let structure = builder.build().unwrap();
        let title = Title::from_params(&[("hf".into(), "0.9".into())]).unwrap();

        let mut f1 = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![2, 3])])));
        f1.skip_doc(1);
        let mut features = vec![WeightedFeature {
            iterator: &mut f1,
            document_frequency: 1,
        }];
        let stats = DocStats {
            doc_length: 10,
            avg_doc_length: 10.0,
            collection_size: 1,
        };
        let ctx = WeightingContext {
            structure: Some(&structure),
        };
        let total = title.weight(&mut features, stats, &ctx).total();
        assert!(total <= 1.0 + 1e-9);
    }
}
