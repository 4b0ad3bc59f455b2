// SPDX-License-Identifier: Apache-2.0

//! Weighting functions: given a matched document and the posting
//! iterators backing each query feature, produce the relevance score
//! the evaluator ranks by.

mod bm25pff;
mod constant;
mod formula;
mod title;

pub use bm25pff::Bm25Pff;
pub use constant::Constant;
pub use formula::Formula;
pub use title::Title;

use crate::iter::PostingIterator;
use crate::structblock::{IndexRange, StructBlock};

/// Per-document statistics a weighting function needs: total token
/// count and, where relevant, an average over the collection.
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub doc_length: u32,
    pub avg_doc_length: f64,
    pub collection_size: u64,
}

/// One query feature bound to its posting iterator and collection
/// document frequency, as seen by a weighting function.
pub struct WeightedFeature<'a> {
    pub iterator: &'a mut dyn PostingIterator,
    pub document_frequency: u64,
}

/// Everything besides the feature postings a structure-aware weighter
/// needs to locate header/content fields for the current document.
/// `structure` is `None` when the document carries no declared
/// structure relations at all.
pub struct WeightingContext<'a> {
    pub structure: Option<&'a StructBlock>,
}

/// A weighting function's verdict for one document: either a single
/// document-level scalar, or a list of `(field, weight)` weighted
/// subfields for structure-aware weighters (title, bm25pff).
#[derive(Debug, Clone)]
pub enum WeightResult {
    Scalar(f64),
    Fields(Vec<(IndexRange, f64)>),
}

impl WeightResult {
    /// Total contribution to the document's combined score.
    pub fn total(&self) -> f64 {
        match self {
            WeightResult::Scalar(w) => *w,
            WeightResult::Fields(fields) => fields.iter().map(|(_, w)| w).sum(),
        }
    }

    /// The single best-scoring field, if this result names any.
    pub fn best_field(&self) -> Option<IndexRange> {
        match self {
            WeightResult::Scalar(_) => None,
            WeightResult::Fields(fields) => fields
                .iter()
                .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(field, _)| *field),
        }
    }
}

pub trait WeightingFunction: Send + Sync {
    /// Score the document the feature iterators currently sit on.
    /// Callers guarantee every iterator has already been advanced to
    /// the same docno via `skip_doc`.
    fn weight(
        &self,
        features: &mut [WeightedFeature<'_>],
        stats: DocStats,
        ctx: &WeightingContext<'_>,
    ) -> WeightResult;

    fn name(&self) -> &'static str;
}

/// Looks up a weighting function by its configuration-string name.
pub fn by_name(name: &str, params: &[(String, String)]) -> crate::error::Result<Box<dyn WeightingFunction>> {
    match name {
        "constant" => Ok(Box::new(Constant::from_params(params)?)),
        "title" => Ok(Box::new(Title::from_params(params)?)),
        "bm25pff" => Ok(Box::new(Bm25Pff::from_params(params)?)),
        "formula" => Ok(Box::new(Formula::from_params(params)?)),
        other => Err(crate::error::ErrorKind::UnknownIdentifier(format!(
            "weighting function '{other}'"
        ))),
    }
}

fn param_f64(params: &[(String, String)], key: &str, default: f64) -> crate::error::Result<f64> {
    match params.iter().find(|(k, _)| k == key) {
        Some((_, v)) => v.parse().map_err(|_| {
            crate::error::ErrorKind::InvalidArgument(format!("invalid value for '{key}': '{v}'"))
        }),
        None => Ok(default),
    }
}

/// Collects every position `iterator` reports for the document it
/// currently sits on, starting the scan at position 1.
pub(crate) fn collect_positions(iterator: &mut dyn PostingIterator) -> Vec<u16> {
    let mut out = Vec::new();
    let mut pos = 1u16;
    loop {
        let p = iterator.skip_pos(pos);
        if p == 0 {
            break;
        }
        out.push(p);
        if p == u16::MAX {
            break;
        }
        pos = p + 1;
    }
    out
}
