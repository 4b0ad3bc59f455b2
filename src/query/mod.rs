// SPDX-License-Identifier: Apache-2.0

//! Query expression tree and evaluator: selects candidate documents
//! through a posting-join expression, applies metadata/ACL
//! restrictions, scores survivors with one or more weighting
//! functions, and returns a bounded top-k ranking. [`QueryBuilder`]
//! assembles the expression via the same push-based stack protocol a
//! client-facing query language would compile down to.

mod builder;
mod eval;
mod expr;

pub use builder::{QueryBuildResult, QueryBuilder};
pub use eval::{Evaluator, RankedResult, WeightingAssignment};
pub use expr::{QueryExpression, WeightingFeatureSet};
