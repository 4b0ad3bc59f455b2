// SPDX-License-Identifier: Apache-2.0

//! Header summarizer: emits the labeled title path covering the
//! winning result field, outermost header first. Falls back to a
//! plain attribute lookup when the document carries no structure or
//! the result named no field.

use super::{Summarizer, SummaryContext, SummaryElement};
use crate::structblock::StructBlockDeclaration;

pub struct Header {
    field_name: String,
    attribute_name: String,
}

impl Header {
    pub fn new(field_name: impl Into<String>, attribute_name: impl Into<String>) -> Self {
        Header {
            field_name: field_name.into(),
            attribute_name: attribute_name.into(),
        }
    }

    fn fallback(&self, ctx: &SummaryContext<'_>) -> Vec<SummaryElement> {
        ctx.attributes
            .get(ctx.docno, &self.attribute_name)
            .map(|value| vec![SummaryElement::new(self.field_name.clone(), value)])
            .unwrap_or_default()
    }
}

impl Summarizer for Header {
    fn summarize(&self, ctx: &mut SummaryContext<'_>) -> Vec<SummaryElement> {
        let (Some(field), Some(structure)) = (ctx.field, ctx.structure) else {
            return self.fallback(ctx);
        };

        let mut chain: Vec<StructBlockDeclaration> = structure
            .declarations()
            .into_iter()
            .filter(|d| d.sink.encloses(&field) || d.sink == field)
            .collect();
        if chain.is_empty() {
            return self.fallback(ctx);
        }
        // Outermost (largest covering content) first.
        chain.sort_by(|a, b| b.sink.len().cmp(&a.sink.len()));

        let terms = ctx.forward.terms_of(ctx.docno);
        let labeled: Vec<SummaryElement> = chain
            .iter()
            .enumerate()
            .filter_map(|(depth, decl)| {
                let text: Vec<&str> = terms
                    .iter()
                    .filter(|&&(pos, _)| decl.source.contains(pos))
                    .filter_map(|&(_, valueno)| ctx.dictionary.term_text(valueno))
                    .collect();
                if text.is_empty() {
                    return None;
                }
                let mut element = SummaryElement::new(format!("{}.{depth}", self.field_name), text.join(" "));
                element.depth = Some(depth as u32);
                Some(element)
            })
            .collect();

        if labeled.is_empty() {
            self.fallback(ctx)
        } else {
            labeled
        }
    }

    fn name(&self) -> &'static str {
        "header"
    }
}
