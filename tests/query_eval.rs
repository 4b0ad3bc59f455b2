// SPDX-License-Identifier: Apache-2.0

//! End-to-end evaluator tests: a small in-memory collection, queried
//! through `Evaluator` with a metadata restriction and a selection
//! term, checking both the CNF restriction semantics and the
//! tie-break ranking order.

use std::sync::Arc;

use glyphidx::config::StorageConfig;
use glyphidx::kv::MemoryKvStore;
use glyphidx::metadata::{ColumnType, CompareOp, Comparison, MetaDataRestriction};
use glyphidx::query::{Evaluator, QueryExpression, WeightingAssignment};
use glyphidx::storage::{DocumentBuilder, StorageClient};
use glyphidx::weighting;

fn open_client() -> StorageClient {
    let mut config = StorageConfig::default();
    config.path = "mem".into();
    config.metadata.add_column("prim2", ColumnType::UInt8).unwrap();
    config.metadata.add_column("prim3", ColumnType::UInt8).unwrap();
    StorageClient::open(Arc::new(MemoryKvStore::new()), config)
}

/// Ten documents each contain "hello", plus a marker of which small
/// primes divide their index `n`. Selecting on "hello" and restricting
/// to `prim2 OR prim3` keeps exactly the documents divisible by 2 or 3.
#[test]
fn restriction_keeps_documents_divisible_by_two_or_three() {
    let client = open_client();
    let mut txn = client.transaction();
    for n in 2..=10u32 {
        let mut doc = DocumentBuilder::new(format!("D{n}"));
        doc.add_term("word", "hello", 1)
            .set_metadata("prim2", if n % 2 == 0 { 1.0 } else { 0.0 })
            .set_metadata("prim3", if n % 3 == 0 { 1.0 } else { 0.0 });
        txn.insert(doc);
    }
    txn.commit().unwrap();

    let hello_id = client.intern_term("word", "hello").unwrap();
    let selection = client.term_iterator("word", hello_id).unwrap();

    let mut restriction = MetaDataRestriction::new();
    restriction.push(
        Comparison {
            op: CompareOp::Eq,
            name: "prim2".into(),
            operand: 1.0,
        },
        true,
    );
    restriction.push(
        Comparison {
            op: CompareOp::Eq,
            name: "prim3".into(),
            operand: 1.0,
        },
        false,
    );

    let expr = QueryExpression::new(selection).with_restriction(restriction);
    let metadata = client.metadata();
    let constant = weighting::by_name("constant", &[]).unwrap();
    let evaluator = Evaluator {
        assignments: vec![WeightingAssignment {
            function: constant.as_ref(),
            feature_set: String::new(),
            weight: 1.0,
        }],
        combine: None,
        metadata: &metadata,
        avg_doc_length: 1.0,
        collection_size: 9,
        storage: None,
    };

    let ranked = evaluator.evaluate(expr, 100, 0);
    let mut docids: Vec<String> = ranked
        .iter()
        .map(|r| client.docid_of(r.docno).unwrap())
        .collect();
    docids.sort();

    let expected: Vec<String> = (2..=10u32)
        .filter(|n| n % 2 == 0 || n % 3 == 0)
        .map(|n| format!("D{n}"))
        .collect();
    assert_eq!(docids, expected);
}

/// With a constant weighting function every result ties on weight, so
/// the tie-break rule orders results by ascending docno.
#[test]
fn equal_weight_results_tie_break_by_docno() {
    let client = open_client();
    let mut txn = client.transaction();
    for i in 1..=5u32 {
        let mut doc = DocumentBuilder::new(format!("doc-{i}"));
        doc.add_term("word", "same", 1);
        txn.insert(doc);
    }
    txn.commit().unwrap();

    let id = client.intern_term("word", "same").unwrap();
    let selection = client.term_iterator("word", id).unwrap();
    let expr = QueryExpression::new(selection);
    let metadata = client.metadata();
    let constant = weighting::by_name("constant", &[]).unwrap();
    let evaluator = Evaluator {
        assignments: vec![WeightingAssignment {
            function: constant.as_ref(),
            feature_set: String::new(),
            weight: 1.0,
        }],
        combine: None,
        metadata: &metadata,
        avg_doc_length: 1.0,
        collection_size: 5,
        storage: None,
    };

    let ranked = evaluator.evaluate(expr, 3, 0);
    let docnos: Vec<u32> = ranked.iter().map(|r| r.docno).collect();
    let mut sorted = docnos.clone();
    sorted.sort_unstable();
    assert_eq!(docnos, sorted, "tied results must come out in ascending docno order");
    assert_eq!(docnos.len(), 3);
}

/// `min_rank` skips the best-ranked results instead of truncating from
/// the bottom.
#[test]
fn min_rank_skips_leading_results() {
    let client = open_client();
    let mut txn = client.transaction();
    for i in 1..=4u32 {
        let mut doc = DocumentBuilder::new(format!("doc-{i}"));
        doc.add_term("word", "same", 1);
        txn.insert(doc);
    }
    txn.commit().unwrap();

    let id = client.intern_term("word", "same").unwrap();
    let selection = client.term_iterator("word", id).unwrap();
    let expr = QueryExpression::new(selection);
    let metadata = client.metadata();
    let constant = weighting::by_name("constant", &[]).unwrap();
    let evaluator = Evaluator {
        assignments: vec![WeightingAssignment {
            function: constant.as_ref(),
            feature_set: String::new(),
            weight: 1.0,
        }],
        combine: None,
        metadata: &metadata,
        avg_doc_length: 1.0,
        collection_size: 4,
        storage: None,
    };

    let all = evaluator.evaluate(QueryExpression::new(client.term_iterator("word", id).unwrap()), 4, 0);
    let skipped = evaluator.evaluate(expr, 4, 2);
    assert_eq!(skipped.len(), 2);
    assert_eq!(
        skipped.iter().map(|r| r.docno).collect::<Vec<_>>(),
        all[2..].iter().map(|r| r.docno).collect::<Vec<_>>()
    );
}

/// With ACL enabled, a document only survives for a user it was granted
/// to — regardless of how well it matches the selection.
#[test]
fn acl_gate_hides_documents_with_no_grant_for_the_user() {
    let mut config = StorageConfig::default();
    config.path = "mem".into();
    config.acl = true;
    let client = StorageClient::open(Arc::new(MemoryKvStore::new()), config);

    let mut txn = client.transaction();
    let mut open_doc = DocumentBuilder::new("open");
    open_doc.add_term("word", "secret", 1).grant("alice").grant("bob");
    txn.insert(open_doc);
    let mut locked_doc = DocumentBuilder::new("locked");
    locked_doc.add_term("word", "secret", 1).grant("bob");
    txn.insert(locked_doc);
    txn.commit().unwrap();

    let id = client.intern_term("word", "secret").unwrap();
    let expr = QueryExpression::new(client.term_iterator("word", id).unwrap()).with_user("alice");
    let metadata = client.metadata();
    let constant = weighting::by_name("constant", &[]).unwrap();
    let evaluator = Evaluator {
        assignments: vec![WeightingAssignment {
            function: constant.as_ref(),
            feature_set: String::new(),
            weight: 1.0,
        }],
        combine: None,
        metadata: &metadata,
        avg_doc_length: 1.0,
        collection_size: 2,
        storage: Some(&client),
    };

    let ranked = evaluator.evaluate(expr, 10, 0);
    let docids: Vec<String> = ranked.iter().map(|r| client.docid_of(r.docno).unwrap()).collect();
    assert_eq!(docids, vec!["open".to_string()]);
}

/// A query assembled through `QueryBuilder`'s stack protocol — union two
/// terms for selection, duplicate one into a named weighting feature set
/// — evaluates end to end with a registered weighting function bound to
/// that set.
#[test]
fn query_builder_output_evaluates_through_named_weighting_set() {
    use glyphidx::query::QueryBuilder;

    let client = open_client();
    let mut txn = client.transaction();
    let mut doc1 = DocumentBuilder::new("d1");
    doc1.add_term("word", "alpha", 1);
    txn.insert(doc1);
    let mut doc2 = DocumentBuilder::new("d2");
    doc2.add_term("word", "beta", 1).add_term("word", "beta", 2);
    txn.insert(doc2);
    txn.commit().unwrap();

    let mut builder = QueryBuilder::new(&client);
    builder.push_term("word", "alpha", 1).unwrap();
    builder.push_term("word", "beta", 1).unwrap();
    builder.push_expression("union", 2, 0, 0).unwrap();
    builder.push_duplicate(1).unwrap();
    builder.define_feature("body", 1.0).unwrap();
    let built = builder.finalize().unwrap();

    let metadata = client.metadata();
    let constant = weighting::by_name("constant", &[]).unwrap();
    let assignments: Vec<WeightingAssignment> = built
        .feature_weights
        .iter()
        .map(|(set, weight)| WeightingAssignment {
            function: constant.as_ref(),
            feature_set: set.clone(),
            weight: *weight,
        })
        .collect();
    let evaluator = Evaluator {
        assignments,
        combine: None,
        metadata: &metadata,
        avg_doc_length: 1.0,
        collection_size: 2,
        storage: Some(&client),
    };

    let ranked = evaluator.evaluate(built.expression, built.max_nof_ranks, built.min_rank);
    let mut docids: Vec<String> = ranked.iter().map(|r| client.docid_of(r.docno).unwrap()).collect();
    docids.sort();
    assert_eq!(docids, vec!["d1".to_string(), "d2".to_string()]);
}
