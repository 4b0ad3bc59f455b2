// SPDX-License-Identifier: Apache-2.0

//! Stack-based query assembly: the same push/pop protocol a
//! client-facing query language compiles down to. Each stack slot holds
//! a *factory* rather than a materialized iterator, so `pushDuplicate`
//! can hand the same subexpression to both the selection and a named
//! weighting feature set without either consuming the other's copy.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::error::{ErrorKind, Result};
use crate::iter::{
    DifferenceIter, IntersectIter, PostingIterator, SequenceIter, StructSequenceIter,
    StructWithinIter, UnionIter, WithinIter,
};
use crate::metadata::{CompareOp, Comparison, MetaDataRestriction};
use crate::storage::StorageClient;

use super::expr::{QueryExpression, WeightingFeatureSet};

type Factory<'a> = Rc<dyn Fn() -> Box<dyn PostingIterator> + 'a>;

struct StackItem<'a> {
    factory: Factory<'a>,
    length: u16,
    variable: Option<String>,
}

/// A posting iterator over a term with no stored occurrences — the
/// fallback when `intern_term`/`term_iterator` can't resolve one.
struct EmptyPostings;

impl PostingIterator for EmptyPostings {
    fn skip_doc(&mut self, _docno: u32) -> u32 {
        0
    }
    fn skip_pos(&mut self, _pos: u16) -> u16 {
        0
    }
    fn frequency(&self) -> usize {
        0
    }
    fn document_frequency(&self) -> usize {
        0
    }
}

/// The finished product of a [`QueryBuilder`] session: an expression
/// ready for [`super::Evaluator::evaluate`], the `(feature_set, weight)`
/// pairs `defineFeature` recorded (zipped by the caller against the
/// named weighting functions it configures), and the requested rank
/// window.
pub struct QueryBuildResult {
    pub expression: QueryExpression,
    pub feature_weights: Vec<(String, f64)>,
    pub max_nof_ranks: usize,
    pub min_rank: usize,
}

/// Assembles a [`QueryExpression`] through the same push/pop stack
/// protocol used to compile a query language down to posting-join
/// expressions: terms and expressions are pushed, combined, optionally
/// duplicated and labeled with a feature set, and the one item left on
/// the stack at the end becomes the selection.
pub struct QueryBuilder<'a> {
    storage: &'a StorageClient,
    stack: Vec<StackItem<'a>>,
    weighting_feature_sets: BTreeMap<String, WeightingFeatureSet>,
    feature_weights: Vec<(String, f64)>,
    exclusion_features: Vec<Box<dyn PostingIterator>>,
    restriction_features: Vec<Box<dyn PostingIterator>>,
    restriction: MetaDataRestriction,
    document_set: Option<HashSet<u32>>,
    acl_users: Vec<String>,
    max_nof_ranks: usize,
    min_rank: usize,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(storage: &'a StorageClient) -> Self {
        QueryBuilder {
            storage,
            stack: Vec::new(),
            weighting_feature_sets: BTreeMap::new(),
            feature_weights: Vec::new(),
            exclusion_features: Vec::new(),
            restriction_features: Vec::new(),
            restriction: MetaDataRestriction::new(),
            document_set: None,
            acl_users: Vec::new(),
            max_nof_ranks: 20,
            min_rank: 0,
        }
    }

    /// Pushes a single term factory onto the stack, resolving (and
    /// interning, if new) its dense `valueno` up front.
    pub fn push_term(&mut self, termtype: &str, termvalue: &str, length: u16) -> Result<()> {
        let valueno = self.storage.intern_term(termtype, termvalue)?;
        let storage = self.storage;
        let termtype = termtype.to_string();
        let factory: Factory<'a> = Rc::new(move || {
            storage
                .term_iterator(&termtype, valueno)
                .unwrap_or_else(|_| Box::new(EmptyPostings))
        });
        self.stack.push(StackItem {
            factory,
            length: length.max(1),
            variable: None,
        });
        Ok(())
    }

    /// Pops `argc` arguments and pushes back the join `op` applies to
    /// them: `"union"`, `"intersect"` (using `cardinality`),
    /// `"difference"` (exactly 2 args), `"sequence"`/`"within"` (using
    /// `range`), or their structure-aware `"struct_sequence"`/
    /// `"struct_within"` counterparts, which additionally pop one more
    /// argument below those to use as the delimiter.
    pub fn push_expression(&mut self, op: &str, argc: usize, range: i32, cardinality: usize) -> Result<()> {
        let needs_delimiter = matches!(op, "struct_sequence" | "struct_within");
        let required = argc + if needs_delimiter { 1 } else { 0 };
        if required > self.stack.len() {
            return Err(ErrorKind::InvalidArgument(format!(
                "pushExpression '{op}': stack underflow (need {required}, have {})",
                self.stack.len()
            )));
        }

        let delimiter_item = if needs_delimiter { self.stack.pop() } else { None };
        let start = self.stack.len() - argc;
        let args: Vec<StackItem<'a>> = self.stack.split_off(start);
        let factories: Vec<Factory<'a>> = args.iter().map(|a| a.factory.clone()).collect();
        let lengths: Vec<u16> = args.iter().map(|a| a.length).collect();
        let total_length: u16 = lengths.iter().copied().sum();

        let combined: Factory<'a> = match op {
            "union" => Rc::new(move || {
                let children = factories.iter().map(|f| f()).collect();
                Box::new(UnionIter::new(children)) as Box<dyn PostingIterator>
            }),
            "intersect" => {
                let card = cardinality.max(1).min(argc.max(1));
                Rc::new(move || {
                    let children = factories.iter().map(|f| f()).collect();
                    Box::new(IntersectIter::new(children, card)) as Box<dyn PostingIterator>
                })
            }
            "difference" => {
                if factories.len() != 2 {
                    return Err(ErrorKind::InvalidArgument(
                        "pushExpression 'difference': needs exactly 2 arguments".into(),
                    ));
                }
                Rc::new(move || {
                    let minuend = factories[0]();
                    let subtrahend = factories[1]();
                    Box::new(DifferenceIter::new(minuend, subtrahend)) as Box<dyn PostingIterator>
                })
            }
            "sequence" => Rc::new(move || {
                let children = factories.iter().map(|f| f()).collect();
                Box::new(SequenceIter::new(children, &lengths, range)) as Box<dyn PostingIterator>
            }),
            "within" => Rc::new(move || {
                let factories = factories.clone();
                Box::new(WithinIter::new(move || factories.iter().map(|f| f()).collect(), range))
                    as Box<dyn PostingIterator>
            }),
            "struct_sequence" => {
                let delim_factory = delimiter_item.as_ref().unwrap().factory.clone();
                Rc::new(move || {
                    let children = factories.iter().map(|f| f()).collect();
                    let delimiter = delim_factory();
                    Box::new(StructSequenceIter::new(children, &lengths, range, delimiter))
                        as Box<dyn PostingIterator>
                })
            }
            "struct_within" => {
                let delim_factory = delimiter_item.as_ref().unwrap().factory.clone();
                Rc::new(move || {
                    let factories = factories.clone();
                    let delimiter = delim_factory();
                    Box::new(StructWithinIter::new(
                        move || factories.iter().map(|f| f()).collect(),
                        range,
                        delimiter,
                    )) as Box<dyn PostingIterator>
                })
            }
            other => {
                return Err(ErrorKind::InvalidArgument(format!(
                    "pushExpression: unknown operator '{other}'"
                )))
            }
        };

        self.stack.push(StackItem {
            factory: combined,
            length: total_length.max(1),
            variable: None,
        });
        Ok(())
    }

    /// Duplicates the top `argc` stack items in place, leaving the
    /// originals untouched below the copies — the usual way to hand the
    /// same subexpression to both the selection and a weighting
    /// feature set.
    pub fn push_duplicate(&mut self, argc: usize) -> Result<()> {
        if argc > self.stack.len() {
            return Err(ErrorKind::InvalidArgument(
                "pushDuplicate: stack underflow".into(),
            ));
        }
        let start = self.stack.len() - argc;
        let copies: Vec<StackItem<'a>> = self.stack[start..]
            .iter()
            .map(|item| StackItem {
                factory: item.factory.clone(),
                length: item.length,
                variable: item.variable.clone(),
            })
            .collect();
        self.stack.extend(copies);
        Ok(())
    }

    /// Labels the top stack item with a variable name (e.g. for later
    /// highlighting); purely descriptive, carried on duplicates too.
    pub fn attach_variable(&mut self, name: impl Into<String>) -> Result<()> {
        let top = self
            .stack
            .last_mut()
            .ok_or_else(|| ErrorKind::InvalidArgument("attachVariable: empty stack".into()))?;
        top.variable = Some(name.into());
        Ok(())
    }

    /// Pops the top item and assigns it a role: `"exclude"` and
    /// `"restrict"` route it to the expression's exclusion/restriction
    /// gates; any other name materializes it into that named weighting
    /// feature set with the given static weight.
    pub fn define_feature(&mut self, set: impl Into<String>, weight: f64) -> Result<()> {
        let item = self
            .stack
            .pop()
            .ok_or_else(|| ErrorKind::InvalidArgument("defineFeature: empty stack".into()))?;
        let set = set.into();
        let iterator = (item.factory)();
        match set.as_str() {
            "exclude" => self.exclusion_features.push(iterator),
            "restrict" => self.restriction_features.push(iterator),
            _ => {
                let document_frequency = iterator.document_frequency() as u64;
                self.weighting_feature_sets
                    .entry(set.clone())
                    .or_insert_with(WeightingFeatureSet::new)
                    .push(document_frequency, iterator);
                self.feature_weights.push((set, weight));
            }
        }
        Ok(())
    }

    /// Appends one comparison to the metadata restriction CNF;
    /// `new_group` opens a fresh disjunction, otherwise it joins the
    /// most recently opened one.
    pub fn define_meta_data_restriction(
        &mut self,
        op: CompareOp,
        name: impl Into<String>,
        operand: f64,
        new_group: bool,
    ) {
        self.restriction.push(
            Comparison {
                op,
                name: name.into(),
                operand,
            },
            new_group,
        );
    }

    /// Restricts the result set to this set of docnos (additive across
    /// calls).
    pub fn add_document_evaluation_set(&mut self, docnos: impl IntoIterator<Item = u32>) {
        self.document_set.get_or_insert_with(HashSet::new).extend(docnos);
    }

    pub fn set_max_nof_ranks(&mut self, k: usize) {
        self.max_nof_ranks = k;
    }

    pub fn set_min_rank(&mut self, m: usize) {
        self.min_rank = m;
    }

    pub fn add_user_name(&mut self, name: impl Into<String>) {
        self.acl_users.push(name.into());
    }

    /// Consumes the builder: the one item left on the stack becomes the
    /// selection expression, and every registered feature set,
    /// restriction, document set and ACL user is bundled alongside it.
    pub fn finalize(mut self) -> Result<QueryBuildResult> {
        let top = self
            .stack
            .pop()
            .ok_or_else(|| ErrorKind::InvalidArgument("finalize: no selection expression on stack".into()))?;
        if !self.stack.is_empty() {
            return Err(ErrorKind::InvalidArgument(
                "finalize: stack has leftover items besides the selection".into(),
            ));
        }

        let mut expression = QueryExpression::new((top.factory)());
        for feature in self.exclusion_features {
            expression = expression.with_exclusion(feature);
        }
        for feature in self.restriction_features {
            expression = expression.with_required(feature);
        }
        for (name, set) in self.weighting_feature_sets {
            expression = expression.with_weighting_set(name, set);
        }
        expression = expression.with_restriction(self.restriction);
        if let Some(docnos) = self.document_set {
            expression = expression.with_document_set(docnos);
        }
        for user in self.acl_users {
            expression = expression.with_user(user);
        }

        Ok(QueryBuildResult {
            expression,
            feature_weights: self.feature_weights,
            max_nof_ranks: self.max_nof_ranks,
            min_rank: self.min_rank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::kv::MemoryKvStore;
    use crate::metadata::ColumnType;
    use crate::storage::DocumentBuilder;
    use std::sync::Arc;

    fn storage() -> StorageClient {
        let mut config = StorageConfig::default();
        config.path = "test".into();
        config.metadata.add_column("year", ColumnType::UInt16).unwrap();
        StorageClient::open(Arc::new(MemoryKvStore::new()), config)
    }

    fn index(storage: &StorageClient, docid: &str, words: &[&str], year: f64) {
        let mut doc = DocumentBuilder::new(docid);
        for (i, word) in words.iter().enumerate() {
            doc.add_term("word", *word, (i + 1) as u16);
        }
        doc.set_metadata("year", year);
        let mut tx = storage.transaction();
        tx.insert(doc);
        tx.commit().unwrap();
    }

    #[test]
    fn union_of_two_terms_selects_either_document() {
        let storage = storage();
        index(&storage, "a", &["quick", "fox"], 2020.0);
        index(&storage, "b", &["slow", "turtle"], 2019.0);

        let mut builder = QueryBuilder::new(&storage);
        builder.push_term("word", "fox", 1).unwrap();
        builder.push_term("word", "turtle", 1).unwrap();
        builder.push_expression("union", 2, 0, 0).unwrap();
        let result = builder.finalize().unwrap();

        let mut selection = result.expression.selection;
        assert_eq!(selection.skip_doc(1), 1);
        assert_eq!(selection.skip_doc(2), 2);
        assert_eq!(selection.skip_doc(3), 0);
    }

    #[test]
    fn duplicate_feeds_selection_and_weighting_set_independently() {
        let storage = storage();
        index(&storage, "a", &["quick", "fox"], 2020.0);

        let mut builder = QueryBuilder::new(&storage);
        builder.push_term("word", "fox", 1).unwrap();
        builder.push_duplicate(1).unwrap();
        builder.define_feature("title", 1.0).unwrap();
        let result = builder.finalize().unwrap();

        // the duplicate consumed by defineFeature left the original on
        // the stack as the selection.
        let mut selection = result.expression.selection;
        assert_eq!(selection.skip_doc(1), 1);
        assert_eq!(result.feature_weights, vec![("title".to_string(), 1.0)]);
        assert!(result.expression.weighting_feature_sets.contains_key("title"));
    }

    #[test]
    fn meta_data_restriction_and_document_set_are_carried() {
        let storage = storage();
        index(&storage, "a", &["fox"], 2020.0);

        let mut builder = QueryBuilder::new(&storage);
        builder.push_term("word", "fox", 1).unwrap();
        builder.define_meta_data_restriction(CompareOp::Ge, "year", 2021.0, true);
        builder.add_document_evaluation_set([1, 2]);
        builder.add_user_name("alice");
        builder.set_max_nof_ranks(5);
        builder.set_min_rank(1);
        let result = builder.finalize().unwrap();

        assert!(!result.expression.restriction.is_empty());
        assert_eq!(result.expression.document_set, Some([1, 2].into_iter().collect()));
        assert_eq!(result.expression.acl_users, vec!["alice".to_string()]);
        assert_eq!(result.max_nof_ranks, 5);
        assert_eq!(result.min_rank, 1);
    }

    #[test]
    fn exclude_role_populates_exclusion_features() {
        let storage = storage();
        index(&storage, "a", &["fox", "banned"], 2020.0);

        let mut builder = QueryBuilder::new(&storage);
        builder.push_term("word", "fox", 1).unwrap();
        builder.push_duplicate(1).unwrap();
        builder.push_term("word", "banned", 1).unwrap();
        builder.define_feature("exclude", 0.0).unwrap();
        let result = builder.finalize().unwrap();

        assert_eq!(result.expression.exclusion_features.len(), 1);
    }
}
