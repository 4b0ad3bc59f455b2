// SPDX-License-Identifier: Apache-2.0

//! Hierarchical structure relations (sections, sentences, table cells,
//! any source→sink range relation tagged by a small `structno`) for one
//! document, packed into a single compressed block.

mod block;
mod builder;
mod field;
mod types;

pub use block::{FieldScanner, LinkEntry, StructBlock, MAX_LINK_WIDTH};
pub use builder::StructBlockBuilder;
pub use field::{
    EnumSlot, FieldType, PackedMicro, PackedSlot, RepeatSlot, StructureField, MAX_FIELD_IDX,
    MAX_PACKED_BYTE_DELTA, MAX_PACKED_BYTE_FIELDS, MAX_PACKED_BYTE_SIZE, MAX_PACKED_SHORT_DELTA,
    MAX_PACKED_SHORT_FIELDS, MAX_PACKED_SHORT_SIZE,
};
pub use types::{IndexRange, StructBlockDeclaration};
