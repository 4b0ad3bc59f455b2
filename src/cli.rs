// SPDX-License-Identifier: Apache-2.0

//! Command-line surface: `build` ingests a JSON document batch,
//! `query` runs a simple selection expression against it, and
//! `inspect-struct` dumps one document's decoded structure relations.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::config::StorageConfig;
use crate::kv::{keys, MemoryKvStore};
use crate::storage::{DocumentBuilder, StorageClient};

#[derive(Parser)]
#[command(name = "glyphidx", about = "structured full-text search engine core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest a JSON batch of documents into a fresh in-memory index.
    Build {
        /// Path to a JSON file holding an array of documents.
        #[arg(long)]
        input: PathBuf,
        /// Storage configuration string, e.g. `path=x; acl=no`.
        #[arg(long, default_value = "path=cli")]
        config: String,
    },
    /// Run a plain term lookup and print matching docids with scores.
    Query {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "path=cli")]
        config: String,
        #[arg(long)]
        termtype: String,
        #[arg(long)]
        termvalue: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Decode and print the structure declarations stored for a docid.
    InspectStruct {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "path=cli")]
        config: String,
        #[arg(long)]
        docid: String,
    },
}

#[derive(Deserialize)]
struct JsonDocument {
    docid: String,
    #[serde(default)]
    terms: Vec<(String, String, u16)>,
    #[serde(default)]
    metadata: Vec<(String, f64)>,
    #[serde(default)]
    attributes: Vec<(String, String)>,
    #[serde(default)]
    acl: Vec<String>,
    #[serde(default)]
    structures: Vec<(u8, (u16, u16), (u16, u16))>,
}

fn load_client(input: &PathBuf, config: &str) -> crate::error::Result<StorageClient> {
    let text = fs::read_to_string(input)
        .map_err(|e| crate::error::ErrorKind::IoError(format!("reading {input:?}: {e}")))?;
    let docs: Vec<JsonDocument> = serde_json::from_str(&text)
        .map_err(|e| crate::error::ErrorKind::InvalidArgument(format!("parsing {input:?}: {e}")))?;

    let storage_config = StorageConfig::parse(config)?;
    let client = StorageClient::open(Arc::new(MemoryKvStore::new()), storage_config);

    let mut txn = client.transaction();
    for doc in docs {
        let mut builder = DocumentBuilder::new(doc.docid);
        for (termtype, termvalue, pos) in doc.terms {
            builder.add_term(termtype, termvalue, pos);
        }
        for (name, value) in doc.metadata {
            builder.set_metadata(name, value);
        }
        for (name, value) in doc.attributes {
            builder.set_attribute(name, value);
        }
        for user in doc.acl {
            builder.grant(user);
        }
        for (structno, (src_start, src_end), (sink_start, sink_end)) in doc.structures {
            let source = crate::structblock::IndexRange::new(src_start, src_end)?;
            let sink = crate::structblock::IndexRange::new(sink_start, sink_end)?;
            builder.add_structure(structno, source, sink)?;
        }
        txn.insert(builder);
    }
    txn.commit()?;
    Ok(client)
}

pub fn run(cli: Cli) -> crate::error::Result<()> {
    match cli.command {
        Command::Build { input, config } => {
            let client = load_client(&input, &config)?;
            println!("ingested index at '{}'", client.config().path);
        }
        Command::Query {
            input,
            config,
            termtype,
            termvalue,
            limit,
        } => {
            let client = load_client(&input, &config)?;
            let termvalue_id = client.intern_term(&termtype, &termvalue)?;
            let mut iterator = client.term_iterator(&termtype, termvalue_id)?;
            let mut shown = 0;
            let mut docno = 1u32;
            loop {
                if shown >= limit {
                    break;
                }
                let d = iterator.skip_doc(docno);
                if d == 0 {
                    break;
                }
                docno = d + 1;
                if let Some(docid) = client.docid_of(d) {
                    println!("{docid}\tfreq={}", iterator.frequency());
                    shown += 1;
                }
            }
        }
        Command::InspectStruct {
            input,
            config,
            docid,
        } => {
            let client = load_client(&input, &config)?;
            let docno = client
                .docno_of(&docid)
                .ok_or_else(|| crate::error::ErrorKind::UnknownIdentifier(format!("docid '{docid}'")))?;
            let bytes = client.kv.get(&keys::struct_block(docno));
            match bytes {
                Some(bytes) => {
                    let block = crate::structblock::StructBlock::decode(&bytes)?;
                    let decls = block.declarations();
                    println!("{}", serde_json::to_string_pretty(&decls_json(&decls))?);
                }
                None => println!("[]"),
            }
        }
    }
    Ok(())
}

fn decls_json(
    decls: &[crate::structblock::StructBlockDeclaration],
) -> Vec<serde_json::Value> {
    decls
        .iter()
        .map(|d| {
            serde_json::json!({
                "structno": d.structno,
                "source": [d.source.start, d.source.end],
                "sink": [d.sink.start, d.sink.end],
            })
        })
        .collect()
}
