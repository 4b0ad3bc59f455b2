// SPDX-License-Identifier: Apache-2.0

//! BM25PFF: BM25 with a proximity-weighted feature frequency per field.
//! Each occurrence of a feature earns a touch weight from how many of
//! the *other* query features it finds nearby, in widening windows
//! (`dist_imm` ⊂ `dist_close` ⊂ sentence ⊂ `dist_near`/title-touch),
//! gated off entirely below a minimum touched-feature cluster size. A
//! single-feature query has no proximity to measure and degrades to
//! plain whole-document BM25.

use super::{
    collect_positions, param_f64, DocStats, WeightResult, WeightedFeature, WeightingContext,
    WeightingFunction,
};
use crate::error::Result;
use crate::structblock::IndexRange;

/// Sentence-tier window width, in query positions. Not exposed as a
/// configuration parameter — `bm25pff`'s own parameter list has no
/// sentence-width knob, so this mirrors the summarizer's matchphrase
/// window instead (see DESIGN.md).
const SENTENCE_WORDS: u16 = 40;

pub struct Bm25Pff {
    k1: f64,
    b: f64,
    avgdoclen: f64,
    maxdf: f64,
    dist_imm: u16,
    dist_close: u16,
    dist_near: u16,
    cluster: f64,
    ffbase: f64,
    struct_no: Option<u8>,
    results: usize,
}

impl Bm25Pff {
    pub fn from_params(params: &[(String, String)]) -> Result<Self> {
        let struct_no = param_f64(params, "struct", 0.0)?;
        Ok(Bm25Pff {
            k1: param_f64(params, "k1", 1.5)?,
            b: param_f64(params, "b", 0.75)?,
            avgdoclen: param_f64(params, "avgdoclen", 500.0)?,
            maxdf: param_f64(params, "maxdf", 1.0)?,
            dist_imm: param_f64(params, "dist_imm", 2.0)? as u16,
            dist_close: param_f64(params, "dist_close", 8.0)? as u16,
            dist_near: param_f64(params, "dist_near", 40.0)? as u16,
            cluster: param_f64(params, "cluster", 0.0)?,
            ffbase: param_f64(params, "ffbase", 0.1)?,
            struct_no: if struct_no > 0.0 { Some(struct_no as u8) } else { None },
            results: param_f64(params, "results", 0.0)? as usize,
        })
    }

    fn idf(&self, document_frequency: u64, collection_size: u64) -> f64 {
        let n = collection_size.max(1) as f64;
        let df = document_frequency.max(1) as f64;
        (((n - df + 0.5) / (df + 0.5)).log10()).max(0.00001)
    }

    fn avg_doc_length(&self, stats: DocStats) -> f64 {
        if stats.avg_doc_length > 0.0 {
            stats.avg_doc_length
        } else {
            self.avgdoclen.max(1.0)
        }
    }

    /// Whether `p` falls inside a header's content and some other
    /// feature occurs in that header's own title text.
    fn title_touch(&self, ctx: &WeightingContext<'_>, p: u16, i: usize, positions: &[Vec<u16>]) -> bool {
        let Some(structure) = ctx.structure else {
            return false;
        };
        structure.declarations().into_iter().any(|decl| {
            if let Some(want) = self.struct_no {
                if decl.structno != want {
                    return false;
                }
            }
            decl.sink.contains(p)
                && positions
                    .iter()
                    .enumerate()
                    .any(|(j, plist)| j != i && plist.iter().any(|&q| decl.source.contains(q)))
        })
    }

    /// `(I, T1, T2, T3)` touch counts for occurrence `p` of feature `i`.
    fn classify(&self, p: u16, i: usize, positions: &[Vec<u16>], ctx: &WeightingContext<'_>) -> (bool, u32, u32, u32) {
        let mut has_imm = false;
        let (mut t1, mut t2, mut t3) = (0u32, 0u32, 0u32);
        for (j, plist) in positions.iter().enumerate() {
            if j == i || plist.is_empty() {
                continue;
            }
            let nearest = plist.iter().map(|&q| p.abs_diff(q)).min().unwrap();
            if nearest <= self.dist_imm {
                has_imm = true;
            }
            if nearest <= self.dist_close {
                t1 += 1;
            }
            if nearest <= SENTENCE_WORDS {
                t2 += 1;
            }
            if nearest <= self.dist_near {
                t3 += 1;
            }
        }
        if self.title_touch(ctx, p, i, positions) {
            let already_near = positions
                .iter()
                .enumerate()
                .any(|(j, plist)| j != i && plist.iter().any(|&q| p.abs_diff(q) <= self.dist_near));
            if !already_near {
                t3 += 1;
            }
        }
        (has_imm, t1, t2, t3)
    }

    fn touch_weight(n: u32, nq: usize) -> f64 {
        let denom = (nq as f64 - 1.0) * (nq as f64 - 1.0);
        if denom <= 0.0 {
            return 0.0;
        }
        (n as f64 * n as f64) / denom
    }

    fn w_of(&self, has_imm: bool, t1: u32, t2: u32, t3: u32, nq: usize) -> f64 {
        let threshold = (self.cluster * nq as f64).ceil() as u32;
        if t3 < threshold {
            return 0.0;
        }
        let i_term = if has_imm { 1.0 } else { 0.0 };
        (1.0 - self.ffbase) * 0.25
            * (i_term + Self::touch_weight(t1, nq) + Self::touch_weight(t2, nq) + Self::touch_weight(t3, nq))
            + self.ffbase
    }

    /// Proximity-weighted feature frequency of feature `i` restricted
    /// to occurrences inside `field`.
    fn ff_in_field(&self, i: usize, field: IndexRange, positions: &[Vec<u16>], ctx: &WeightingContext<'_>, nq: usize) -> f64 {
        positions[i]
            .iter()
            .filter(|&&p| field.contains(p))
            .map(|&p| {
                let (has_imm, t1, t2, t3) = self.classify(p, i, positions, ctx);
                self.w_of(has_imm, t1, t2, t3, nq)
            })
            .sum()
    }

}

impl WeightingFunction for Bm25Pff {
    fn weight(
        &self,
        features: &mut [WeightedFeature<'_>],
        stats: DocStats,
        ctx: &WeightingContext<'_>,
    ) -> WeightResult {
        if features.is_empty() {
            return WeightResult::Scalar(0.0);
        }
        let nq = features.len();
        let collection_size = stats.collection_size;
        let idfs: Vec<f64> = features
            .iter()
            .map(|f| self.idf(f.document_frequency, collection_size))
            .collect();
        let is_stopword: Vec<bool> = features
            .iter()
            .map(|f| collection_size > 0 && f.document_frequency as f64 > self.maxdf * collection_size as f64)
            .collect();
        let positions: Vec<Vec<u16>> = features
            .iter_mut()
            .map(|f| collect_positions(f.iterator))
            .collect();

        if nq <= 1 {
            let dl = stats.doc_length.max(1) as f64;
            let avgdl = self.avg_doc_length(stats);
            let norm = 1.0 - self.b + self.b * (dl / avgdl);
            let tf = positions.first().map(|p| p.len()).unwrap_or(0) as f64;
            let idf = idfs.first().copied().unwrap_or(0.0);
            let score = idf * (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm);
            return WeightResult::Scalar(score);
        }

        let avgdl = self.avg_doc_length(stats);
        let doc_field = IndexRange::new(1, (stats.doc_length.max(1) + 1) as u16).ok();
        let fields: Vec<IndexRange> = match ctx.structure.filter(|s| !s.is_empty()) {
            Some(structure) => {
                let mut content: Vec<IndexRange> = structure
                    .declarations()
                    .into_iter()
                    .filter(|d| self.struct_no.map(|want| d.structno == want).unwrap_or(true))
                    .map(|d| d.sink)
                    .collect();
                content.sort();
                content.dedup();
                if content.is_empty() {
                    doc_field.into_iter().collect()
                } else {
                    content
                }
            }
            None => doc_field.into_iter().collect(),
        };

        let mut scored: Vec<(IndexRange, f64)> = fields
            .into_iter()
            .map(|field| {
                let norm = 1.0 - self.b + self.b * (field.len() as f64 / avgdl);
                let w = positions
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !is_stopword[*i])
                    .map(|(i, _)| {
                        let ff = self.ff_in_field(i, field, &positions, ctx, nq);
                        idfs[i] * (ff * (self.k1 + 1.0)) / (ff + self.k1 * norm)
                    })
                    .sum();
                (field, w)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if self.results > 0 && scored.len() > self.results {
            scored.truncate(self.results);
        }
        WeightResult::Fields(scored)
    }

    fn name(&self) -> &'static str {
        "bm25pff"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{PostingIterator, TermIterator};
    use crate::postingblock::PostingBlock;
    use std::sync::Arc;

    fn bm25pff() -> Bm25Pff {
        Bm25Pff::from_params(&[("k1".into(), "1.2".into()), ("b".into(), "0.75".into())]).unwrap()
    }

    #[test]
    fn single_term_matches_plain_bm25() {
        let weighting = bm25pff();
        let mut term = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![1, 5, 9])])));
        term.skip_doc(1);
        let mut features = vec![WeightedFeature {
            iterator: &mut term,
            document_frequency: 10,
        }];
        let stats = DocStats {
            doc_length: 100,
            avg_doc_length: 80.0,
            collection_size: 1000,
        };
        let ctx = WeightingContext { structure: None };
        let got = weighting.weight(&mut features, stats, &ctx).total();

        let tf = 3.0;
        let norm = 1.0 - 0.75 + 0.75 * (100.0 / 80.0);
        let idf = (((1000.0 - 10.0 + 0.5) / (10.0 + 0.5)).log10()).max(0.00001);
        let expect = idf * (tf * (1.2 + 1.0)) / (tf + 1.2 * norm);
        assert!((got - expect).abs() < 1e-9);
    }

    #[test]
    fn nearby_terms_boost_each_other() {
        let weighting = bm25pff();
        let mut a = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![10])])));
        let mut b = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![11])])));
        a.skip_doc(1);
        b.skip_doc(1);
        let mut features = vec![
            WeightedFeature {
                iterator: &mut a,
                document_frequency: 10,
            },
            WeightedFeature {
                iterator: &mut b,
                document_frequency: 10,
            },
        ];
        let stats = DocStats {
            doc_length: 100,
            avg_doc_length: 80.0,
            collection_size: 1000,
        };
        let ctx = WeightingContext { structure: None };
        let with_proximity = weighting.weight(&mut features, stats, &ctx).total();

        let mut far_a = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![10])])));
        let mut far_b = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![500])])));
        far_a.skip_doc(1);
        far_b.skip_doc(1);
        let mut far_features = vec![
            WeightedFeature {
                iterator: &mut far_a,
                document_frequency: 10,
            },
            WeightedFeature {
                iterator: &mut far_b,
                document_frequency: 10,
            },
        ];
        let without_proximity = weighting.weight(&mut far_features, stats, &ctx).total();

        assert!(with_proximity > without_proximity);
    }

    #[test]
    fn gating_zeroes_weight_below_cluster_threshold() {
        let weighting = Bm25Pff::from_params(&[("cluster".into(), "1.0".into())]).unwrap();
        let mut a = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![10])])));
        let mut b = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![500])])));
        a.skip_doc(1);
        b.skip_doc(1);
        let mut features = vec![
            WeightedFeature {
                iterator: &mut a,
                document_frequency: 10,
            },
            WeightedFeature {
                iterator: &mut b,
                document_frequency: 10,
            },
        ];
        let stats = DocStats {
            doc_length: 600,
            avg_doc_length: 80.0,
            collection_size: 1000,
        };
        let ctx = WeightingContext { structure: None };
        let got = weighting.weight(&mut features, stats, &ctx).total();
        assert_eq!(got, 0.0);
    }
}
