// SPDX-License-Identifier: Apache-2.0

//! Assembles one document's postings, forward index, structures,
//! metadata, attributes and ACL before it's merged into a transaction.

use crate::metadata::MetaDataValue;
use crate::structblock::StructBlockBuilder;

#[derive(Debug, Clone)]
pub struct TermOccurrence {
    pub termtype: String,
    pub termvalue: String,
    pub position: u16,
}

#[derive(Debug, Default)]
pub struct DocumentBuilder {
    pub docid: String,
    pub(crate) terms: Vec<TermOccurrence>,
    pub(crate) structures: StructBlockBuilder,
    pub(crate) metadata: Vec<(String, MetaDataValue)>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) acl_users: Vec<String>,
}

impl DocumentBuilder {
    pub fn new(docid: impl Into<String>) -> Self {
        DocumentBuilder {
            docid: docid.into(),
            terms: Vec::new(),
            structures: StructBlockBuilder::new(),
            metadata: Vec::new(),
            attributes: Vec::new(),
            acl_users: Vec::new(),
        }
    }

    pub fn add_term(&mut self, termtype: impl Into<String>, termvalue: impl Into<String>, position: u16) -> &mut Self {
        self.terms.push(TermOccurrence {
            termtype: termtype.into(),
            termvalue: termvalue.into(),
            position,
        });
        self
    }

    pub fn add_structure(
        &mut self,
        structno: u8,
        source: crate::structblock::IndexRange,
        sink: crate::structblock::IndexRange,
    ) -> crate::error::Result<&mut Self> {
        self.structures.add(structno, source, sink)?;
        Ok(self)
    }

    pub fn set_metadata(&mut self, name: impl Into<String>, value: MetaDataValue) -> &mut Self {
        self.metadata.push((name.into(), value));
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn grant(&mut self, user: impl Into<String>) -> &mut Self {
        self.acl_users.push(user.into());
        self
    }

    pub fn doc_length(&self) -> u32 {
        self.terms.iter().map(|t| t.position as u32).max().unwrap_or(0)
    }
}
