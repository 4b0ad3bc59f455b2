// SPDX-License-Identifier: Apache-2.0

//! A structured full-text search engine core over an ordered key/value
//! store.
//!
//! A collection of documents is indexed into inverted postings (term →
//! sorted document-position list), a forward index (position → term per
//! document), per-document metadata and attributes, and typed
//! hierarchical structures (ordered position ranges with header/content
//! relations). A query engine answers ranked queries over this index
//! using composable posting-set operators, document restrictions,
//! weighting functions and summarizers.
//!
//! ```text
//! kv ── varint ── docindex ── postingblock ─┐
//!                           └ structblock ──┼─ storage ── iter ── query ── weighting/summarizer
//!                           └ forward ──────┤
//!                           └ metadata ─────┤
//!                           └ attribute ────┘
//! ```
//!
//! The KV store, logging sink, configuration-language lexer, vector
//! ingestion, statistics wire format and CLI argument parsing are
//! external collaborators; only their interface contracts live here.

pub mod attribute;
pub mod cli;
pub mod config;
pub mod docindex;
pub mod error;
pub mod forward;
pub mod iter;
pub mod kv;
pub mod metadata;
pub mod postingblock;
pub mod query;
pub mod storage;
pub mod structblock;
pub mod summarizer;
pub mod varint;
pub mod weighting;

/// Maximum ordinal word position in a document. This limit propagates
/// into every position-bearing binary layout.
pub const MAX_POSITION: u16 = 65535;

/// Maximum `structno` value a structure declaration may use.
pub const MAX_NOF_STRUCT_NO: u8 = 16;

/// Maximum `(structno, idx)` instances per struct block.
pub const MAX_NOF_STRUCT_IDX: u16 = 2048;

/// Soft size budget for a packed struct block.
pub const MAX_BLOCK_SIZE: usize = 1024;

/// Hard cap on distinct field-levels/covers in one struct block.
pub const MAX_FIELD_LEVELS: usize = 16;

/// Floating point comparison epsilon used throughout ranking.
pub const FLOAT_EPSILON: f64 = 1.19e-7;

/// Dense, positive, never-reused document number.
pub type DocNo = u32;
