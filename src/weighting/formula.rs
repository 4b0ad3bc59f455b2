// SPDX-License-Identifier: Apache-2.0

//! Formula weighting: a fixed linear combination, `Σ wᵢ · xᵢ`, with
//! per-position weights supplied as `w0`, `w1`, ... configuration
//! parameters (default `1.0`). Used two ways: as an ordinary
//! [`WeightingFunction`] over raw feature term frequencies, and — via
//! [`Formula::combine`] — as the evaluator's composition rule across
//! several *other* weighting functions' component scores, when a query
//! names `formula` as its combination scheme instead of a plain sum.

use super::{param_f64, DocStats, WeightResult, WeightedFeature, WeightingContext, WeightingFunction};
use crate::error::Result;

pub struct Formula {
    weights: Vec<f64>,
    default_weight: f64,
}

impl Formula {
    pub fn from_params(params: &[(String, String)]) -> Result<Self> {
        let default_weight = param_f64(params, "default", 1.0)?;
        let mut weights = Vec::new();
        let mut i = 0;
        loop {
            let key = format!("w{i}");
            if !params.iter().any(|(k, _)| k == &key) {
                break;
            }
            weights.push(param_f64(params, &key, default_weight)?);
            i += 1;
        }
        Ok(Formula {
            weights,
            default_weight,
        })
    }

    fn weight_for(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(self.default_weight)
    }

    /// Combines a query's per-feature-set component scores into one
    /// total, using the same `w0, w1, ...` weights a standalone
    /// [`Formula`] applies to feature term frequencies.
    pub fn combine(&self, components: &[f64]) -> f64 {
        components
            .iter()
            .enumerate()
            .map(|(i, &component)| self.weight_for(i) * component)
            .sum()
    }
}

impl WeightingFunction for Formula {
    fn weight(
        &self,
        features: &mut [WeightedFeature<'_>],
        _stats: DocStats,
        _ctx: &WeightingContext<'_>,
    ) -> WeightResult {
        let total = features
            .iter()
            .enumerate()
            .map(|(i, feature)| self.weight_for(i) * feature.iterator.frequency() as f64)
            .sum();
        WeightResult::Scalar(total)
    }

    fn name(&self) -> &'static str {
        "formula"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{PostingIterator, TermIterator};
    use crate::postingblock::PostingBlock;
    use std::sync::Arc;

    #[test]
    fn applies_per_feature_weights() {
        let formula = Formula::from_params(&[
            ("w0".into(), "2.0".into()),
            ("w1".into(), "0.5".into()),
        ])
        .unwrap();
        let mut a = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![1, 2])])));
        let mut b = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![1])])));
        a.skip_doc(1);
        b.skip_doc(1);
        let mut features = vec![
            WeightedFeature {
                iterator: &mut a,
                document_frequency: 1,
            },
            WeightedFeature {
                iterator: &mut b,
                document_frequency: 1,
            },
        ];
        let stats = DocStats {
            doc_length: 10,
            avg_doc_length: 10.0,
            collection_size: 1,
        };
        let ctx = WeightingContext { structure: None };
        let got = formula.weight(&mut features, stats, &ctx).total();
        assert!((got - (2.0 * 2.0 + 0.5 * 1.0)).abs() < 1e-9);
    }

    #[test]
    fn combine_applies_same_weights_to_components() {
        let formula = Formula::from_params(&[("w0".into(), "3.0".into()), ("w1".into(), "1.0".into())]).unwrap();
        let combined = formula.combine(&[2.0, 5.0]);
        assert!((combined - (3.0 * 2.0 + 1.0 * 5.0)).abs() < 1e-9);
    }
}
