// SPDX-License-Identifier: Apache-2.0

//! Constant weight: every match scores the same fixed value. Mostly
//! useful for boolean-style queries ranked only by restriction.

use super::{param_f64, DocStats, WeightResult, WeightedFeature, WeightingContext, WeightingFunction};
use crate::error::Result;

pub struct Constant {
    value: f64,
}

impl Constant {
    pub fn from_params(params: &[(String, String)]) -> Result<Self> {
        Ok(Constant {
            value: param_f64(params, "value", 1.0)?,
        })
    }
}

impl WeightingFunction for Constant {
    fn weight(
        &self,
        _features: &mut [WeightedFeature<'_>],
        _stats: DocStats,
        _ctx: &WeightingContext<'_>,
    ) -> WeightResult {
        WeightResult::Scalar(self.value)
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}
