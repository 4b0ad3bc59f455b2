// SPDX-License-Identifier: Apache-2.0

//! A query expression bundles the selection iterator (what documents
//! even match) with zero or more named weighting feature sets (what
//! the ranking formula scores), exclusion/restriction features, a
//! metadata restriction, a document-set filter and an ACL user list.

use std::collections::{BTreeMap, HashSet};

use crate::iter::PostingIterator;
use crate::metadata::MetaDataRestriction;

/// A named group of feature iterators handed to a weighting function
/// as one `Vec<WeightedFeature>` slot. Distinct from the selection
/// expression: an expression can select on one set of terms while
/// weighting on a different (possibly overlapping) set — e.g.
/// selecting on a stemmed form while weighting title-field exact
/// matches more heavily.
pub struct WeightingFeatureSet {
    pub document_frequencies: Vec<u64>,
    pub iterators: Vec<Box<dyn PostingIterator>>,
}

impl WeightingFeatureSet {
    pub fn new() -> Self {
        WeightingFeatureSet {
            document_frequencies: Vec::new(),
            iterators: Vec::new(),
        }
    }

    pub fn push(&mut self, document_frequency: u64, iterator: Box<dyn PostingIterator>) {
        self.document_frequencies.push(document_frequency);
        self.iterators.push(iterator);
    }

    pub fn is_empty(&self) -> bool {
        self.iterators.is_empty()
    }
}

impl Default for WeightingFeatureSet {
    fn default() -> Self {
        Self::new()
    }
}

pub struct QueryExpression {
    /// What documents are candidates at all.
    pub selection: Box<dyn PostingIterator>,
    /// Any match of these disqualifies a candidate outright.
    pub exclusion_features: Vec<Box<dyn PostingIterator>>,
    /// A candidate must match every one of these (in addition to
    /// `selection`) to survive.
    pub restriction_features: Vec<Box<dyn PostingIterator>>,
    /// Feature sets available to weighting functions, keyed by name
    /// (e.g. `"title"`, `"body"`). Empty unless the query configured
    /// per-function feature routing.
    pub weighting_feature_sets: BTreeMap<String, WeightingFeatureSet>,
    pub restriction: MetaDataRestriction,
    /// Restricts candidates to this set of docnos, if present.
    pub document_set: Option<HashSet<u32>>,
    /// Users the ACL gate checks visibility for; a document with no
    /// grant for any of these (when ACL is enabled) is excluded.
    pub acl_users: Vec<String>,
}

impl QueryExpression {
    pub fn new(selection: Box<dyn PostingIterator>) -> Self {
        QueryExpression {
            selection,
            exclusion_features: Vec::new(),
            restriction_features: Vec::new(),
            weighting_feature_sets: BTreeMap::new(),
            restriction: MetaDataRestriction::new(),
            document_set: None,
            acl_users: Vec::new(),
        }
    }

    pub fn with_weighting_set(mut self, name: impl Into<String>, set: WeightingFeatureSet) -> Self {
        self.weighting_feature_sets.insert(name.into(), set);
        self
    }

    pub fn with_restriction(mut self, restriction: MetaDataRestriction) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn with_exclusion(mut self, feature: Box<dyn PostingIterator>) -> Self {
        self.exclusion_features.push(feature);
        self
    }

    pub fn with_required(mut self, feature: Box<dyn PostingIterator>) -> Self {
        self.restriction_features.push(feature);
        self
    }

    pub fn with_document_set(mut self, docnos: HashSet<u32>) -> Self {
        self.document_set = Some(docnos);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.acl_users.push(user.into());
        self
    }
}
