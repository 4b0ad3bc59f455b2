// SPDX-License-Identifier: Apache-2.0

//! Match-phrase summarizer: scores every sentence window inside the
//! winning field — delimited by `ctx.eos` postings, or the whole
//! document when none are declared — by how much matched-feature
//! weight it contains, and renders the best `nof_sentences` of them in
//! reading order.

use super::{Summarizer, SummaryContext, SummaryElement};
use crate::structblock::IndexRange;
use crate::weighting::collect_positions;

pub struct MatchPhrase {
    field_name: String,
    nof_sentences: usize,
}

impl MatchPhrase {
    pub fn new(field_name: impl Into<String>, nof_sentences: usize) -> Self {
        MatchPhrase {
            field_name: field_name.into(),
            nof_sentences: nof_sentences.max(1),
        }
    }

    fn sentence_ranges(eos: &[u16], doc_max: u16) -> Vec<IndexRange> {
        let mut bounds: Vec<u16> = eos.to_vec();
        bounds.sort_unstable();
        bounds.dedup();
        let mut ranges = Vec::new();
        let mut start = 1u16;
        for &e in &bounds {
            if e > start {
                if let Ok(r) = IndexRange::new(start, e + 1) {
                    ranges.push(r);
                }
            }
            start = e + 1;
        }
        if start <= doc_max {
            if let Ok(r) = IndexRange::new(start, doc_max + 1) {
                ranges.push(r);
            }
        }
        ranges
    }
}

impl Summarizer for MatchPhrase {
    fn summarize(&self, ctx: &mut SummaryContext<'_>) -> Vec<SummaryElement> {
        let terms = ctx.forward.terms_of(ctx.docno);
        let doc_max = terms.iter().map(|&(p, _)| p).max().unwrap_or(0);
        if doc_max == 0 {
            return Vec::new();
        }

        let ranges = if ctx.eos.is_empty() {
            IndexRange::new(1, doc_max + 1).into_iter().collect()
        } else {
            Self::sentence_ranges(ctx.eos, doc_max)
        };
        if ranges.is_empty() {
            return Vec::new();
        }

        let positions: Vec<Vec<u16>> = ctx.matches.iter_mut().map(|m| collect_positions(*m)).collect();
        let restrict = ctx.field;

        let mut scored: Vec<(IndexRange, f64)> = ranges
            .into_iter()
            .filter(|r| restrict.map(|f| f.overlaps(r)).unwrap_or(true))
            .map(|r| {
                let score: f64 = positions
                    .iter()
                    .enumerate()
                    .map(|(i, plist)| {
                        let weight = ctx.feature_weights.get(i).copied().unwrap_or(1.0);
                        let count = plist.iter().filter(|&&p| r.contains(p)).count();
                        weight * count as f64
                    })
                    .sum();
                (r, score)
            })
            .filter(|&(_, score)| score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.nof_sentences);
        scored.sort_by_key(|(r, _)| r.start);

        scored
            .into_iter()
            .enumerate()
            .filter_map(|(i, (range, score))| {
                let phrase: Vec<&str> = terms
                    .iter()
                    .filter(|&&(pos, _)| range.contains(pos))
                    .filter_map(|&(_, valueno)| ctx.dictionary.term_text(valueno))
                    .collect();
                if phrase.is_empty() {
                    return None;
                }
                let mut element = SummaryElement::new(format!("{}.{i}", self.field_name), phrase.join(" "));
                element.score = Some(score);
                Some(element)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "matchphrase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeStore;
    use crate::forward::ForwardBlock;
    use crate::iter::{PostingIterator, TermIterator};
    use crate::postingblock::PostingBlock;
    use crate::summarizer::TermDictionary;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Dict(HashMap<u32, String>);
    impl TermDictionary for Dict {
        fn term_text(&self, valueno: u32) -> Option<&str> {
            self.0.get(&valueno).map(|s| s.as_str())
        }
    }

    #[test]
    fn selects_best_sentence_around_match() {
        // Two sentences delimited by an eos at position 5: "the quick
        // brown fox jumps ." / "over lazy dogs ." — the match falls in
        // the first.
        let forward = ForwardBlock::build(vec![(
            1,
            vec![
                (1, 10),
                (2, 11),
                (3, 12),
                (4, 13),
                (6, 14),
                (7, 15),
                (8, 16),
            ],
        )])
        .unwrap();
        let mut dict_map = HashMap::new();
        dict_map.insert(10, "the".to_string());
        dict_map.insert(11, "quick".to_string());
        dict_map.insert(12, "brown".to_string());
        dict_map.insert(13, "fox".to_string());
        dict_map.insert(14, "over".to_string());
        dict_map.insert(15, "lazy".to_string());
        dict_map.insert(16, "dogs".to_string());
        let dict = Dict(dict_map);
        let attrs = AttributeStore::new();

        let mut term = TermIterator::new(Arc::new(PostingBlock::build(vec![(1, vec![3])])));
        term.skip_doc(1);
        let mut matches: Vec<&mut dyn PostingIterator> = vec![&mut term];

        let summarizer = MatchPhrase::new("snippet", 1);
        let mut ctx = SummaryContext {
            docno: 1,
            matches: &mut matches,
            forward: &forward,
            dictionary: &dict,
            attributes: &attrs,
            field: None,
            structure: None,
            eos: &[5],
            feature_weights: &[],
        };
        let summary = summarizer.summarize(&mut ctx);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].value, "the quick brown fox");
    }
}
