// SPDX-License-Identifier: Apache-2.0

//! Bounded top-k evaluator: walks the selection iterator in docno
//! order, applies exclusion/restriction/docnolist/ACL gates, weights
//! survivors by every configured weighting assignment, composes the
//! per-assignment scores, and keeps only the best `maxNofRanks`
//! results starting at `minRank`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::expr::QueryExpression;
use crate::metadata::MetaDataTable;
use crate::storage::StorageClient;
use crate::structblock::IndexRange;
use crate::weighting::{DocStats, Formula, WeightResult, WeightedFeature, WeightingContext, WeightingFunction};
use crate::FLOAT_EPSILON;

#[derive(Debug, Clone, Copy)]
pub struct RankedResult {
    pub docno: u32,
    pub weight: f64,
    pub field: Option<IndexRange>,
}

impl PartialEq for RankedResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for RankedResult {}

impl PartialOrd for RankedResult {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders results so that "greater" means "ranks earlier": higher
/// weight first (beyond float noise), then smaller docno, then
/// smaller field start/end as deterministic tie-breaks.
impl Ord for RankedResult {
    fn cmp(&self, other: &Self) -> Ordering {
        if (self.weight - other.weight).abs() >= FLOAT_EPSILON {
            return self
                .weight
                .partial_cmp(&other.weight)
                .unwrap_or(Ordering::Equal);
        }
        let (a_start, a_end) = self.field.map(|f| (f.start, f.end)).unwrap_or((0, 0));
        let (b_start, b_end) = other.field.map(|f| (f.start, f.end)).unwrap_or((0, 0));
        other
            .docno
            .cmp(&self.docno)
            .then_with(|| b_start.cmp(&a_start))
            .then_with(|| b_end.cmp(&a_end))
    }
}

/// One configured weighting function bound to the feature set it
/// scores and the static weight `defineFeature` assigned it.
pub struct WeightingAssignment<'a> {
    pub function: &'a dyn WeightingFunction,
    /// Name of the feature set in `QueryExpression::weighting_feature_sets`
    /// this assignment scores, or `""` to score the selection postings
    /// directly (the no-feature-set default).
    pub feature_set: String,
    pub weight: f64,
}

pub struct Evaluator<'a> {
    pub assignments: Vec<WeightingAssignment<'a>>,
    /// Combines per-assignment weighted components into the final
    /// score; a plain sum is used when absent.
    pub combine: Option<&'a Formula>,
    pub metadata: &'a MetaDataTable,
    pub avg_doc_length: f64,
    pub collection_size: u64,
    /// Backing store for real structure lookups (weighting functions)
    /// and ACL grants. `None` disables both — every candidate passes
    /// the ACL gate and no structure is seen by weighting functions.
    pub storage: Option<&'a StorageClient>,
}

impl<'a> Evaluator<'a> {
    pub fn evaluate(
        &self,
        mut expr: QueryExpression,
        max_nof_ranks: usize,
        min_rank: usize,
    ) -> Vec<RankedResult> {
        let capacity = max_nof_ranks + min_rank;
        if capacity == 0 {
            return Vec::new();
        }
        let mut heap: BinaryHeap<std::cmp::Reverse<RankedResult>> = BinaryHeap::new();

        let mut docno = 1u32;
        loop {
            let d = expr.selection.skip_doc(docno);
            if d == 0 {
                break;
            }
            docno = d + 1;

            if let Some(docnolist) = &expr.document_set {
                if !docnolist.contains(&d) {
                    continue;
                }
            }
            if expr.exclusion_features.iter_mut().any(|f| f.skip_doc(d) == d) {
                continue;
            }
            if expr.restriction_features.iter_mut().any(|f| f.skip_doc(d) != d) {
                continue;
            }
            if !expr.restriction.is_empty() && !expr.restriction.evaluate(self.metadata, d) {
                continue;
            }
            if let Some(storage) = self.storage {
                if !expr.acl_users.is_empty() && !expr.acl_users.iter().any(|user| storage.has_access(d, user)) {
                    continue;
                }
            }

            for set in expr.weighting_feature_sets.values_mut() {
                for it in set.iterators.iter_mut() {
                    it.skip_doc(d);
                }
            }

            let doc_length = self.metadata.get(d, "doclen").unwrap_or(0.0) as u32;
            let stats = DocStats {
                doc_length,
                avg_doc_length: self.avg_doc_length,
                collection_size: self.collection_size,
            };
            let structure = self.storage.and_then(|s| s.struct_block_of(d).ok().flatten());
            let ctx = WeightingContext {
                structure: structure.as_ref(),
            };

            let mut components = Vec::with_capacity(self.assignments.len());
            let mut field = None;
            for assignment in &self.assignments {
                let result = if assignment.feature_set.is_empty() {
                    let mut features = vec![WeightedFeature {
                        iterator: expr.selection.as_mut(),
                        document_frequency: expr.selection.document_frequency() as u64,
                    }];
                    assignment.function.weight(&mut features, stats, &ctx)
                } else if let Some(set) = expr.weighting_feature_sets.get_mut(&assignment.feature_set) {
                    if set.is_empty() {
                        WeightResult::Scalar(0.0)
                    } else {
                        let mut features: Vec<WeightedFeature<'_>> = set
                            .iterators
                            .iter_mut()
                            .zip(set.document_frequencies.iter())
                            .map(|(it, &df)| WeightedFeature {
                                iterator: it.as_mut(),
                                document_frequency: df,
                            })
                            .collect();
                        assignment.function.weight(&mut features, stats, &ctx)
                    }
                } else {
                    WeightResult::Scalar(0.0)
                };
                if field.is_none() {
                    field = result.best_field();
                }
                components.push(assignment.weight * result.total());
            }

            let weight = match self.combine {
                Some(formula) => formula.combine(&components),
                None => components.iter().sum(),
            };

            let entry = RankedResult {
                docno: d,
                weight,
                field,
            };
            heap.push(std::cmp::Reverse(entry));
            if heap.len() > capacity {
                heap.pop();
            }
        }

        let mut results: Vec<RankedResult> = heap.into_iter().map(|r| r.0).collect();
        results.sort_by(|a, b| b.cmp(a));
        results.into_iter().skip(min_rank).take(max_nof_ranks).collect()
    }
}
