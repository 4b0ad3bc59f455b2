// SPDX-License-Identifier: Apache-2.0

//! Storage layer: opens a collection over an ordered KV store, and
//! batches document inserts/deletes into atomic, block-respecting
//! transactions.

mod client;
mod document;
mod transaction;

pub use client::StorageClient;
pub use document::{DocumentBuilder, TermOccurrence};
pub use transaction::{Transaction, BLOCK_FILL_JOIN_RATIO, BLOCK_FILL_SPLIT_RATIO};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::kv::MemoryKvStore;
    use crate::metadata::ColumnType;
    use crate::structblock::IndexRange;
    use std::sync::Arc;

    fn client() -> StorageClient {
        let mut config = StorageConfig::default();
        config.path = "mem".into();
        config.metadata.add_column("year", ColumnType::UInt16).unwrap();
        StorageClient::open(Arc::new(MemoryKvStore::new()), config)
    }

    #[test]
    fn insert_and_lookup_docid() {
        let client = client();
        let mut doc = DocumentBuilder::new("doc-1");
        doc.add_term("word", "quick", 1)
            .add_term("word", "brown", 2)
            .set_metadata("year", 2020.0)
            .set_attribute("title", "Hello");
        let mut txn = client.transaction();
        txn.insert(doc);
        txn.commit().unwrap();

        let docno = client.docno_of("doc-1").unwrap();
        assert_eq!(client.docid_of(docno).as_deref(), Some("doc-1"));
    }

    #[test]
    fn postings_survive_multiple_documents() {
        let client = client();
        for i in 0..30 {
            let mut doc = DocumentBuilder::new(format!("doc-{i}"));
            doc.add_term("word", "common", 1);
            if i % 2 == 0 {
                doc.add_term("word", "even", 2);
            }
            let mut txn = client.transaction();
            txn.insert(doc);
            txn.commit().unwrap();
        }

        let blocks: Vec<_> = client.kv.iterate_prefix(b"T").collect();
        assert!(!blocks.is_empty());
    }

    #[test]
    fn delete_removes_docid_mapping() {
        let client = client();
        let doc = DocumentBuilder::new("doc-x");
        let mut txn = client.transaction();
        txn.insert(doc);
        txn.commit().unwrap();
        assert!(client.docno_of("doc-x").is_some());

        let mut txn = client.transaction();
        txn.delete("doc-x");
        txn.commit().unwrap();
        assert!(client.docno_of("doc-x").is_none());
    }

    #[test]
    fn struct_declarations_survive_commit() {
        let client = client();
        let mut doc = DocumentBuilder::new("doc-s");
        doc.add_term("word", "hi", 1);
        doc.add_structure(1, IndexRange::new(1, 2).unwrap(), IndexRange::new(5, 10).unwrap())
            .unwrap();
        let mut txn = client.transaction();
        txn.insert(doc);
        txn.commit().unwrap();

        let docno = client.docno_of("doc-s").unwrap();
        let key = crate::kv::keys::struct_block(docno);
        let bytes = client.kv.get(&key).unwrap();
        let block = crate::structblock::StructBlock::decode(&bytes).unwrap();
        assert_eq!(block.declarations().len(), 1);
    }
}
