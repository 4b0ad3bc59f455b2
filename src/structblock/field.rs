// SPDX-License-Identifier: Apache-2.0

//! `StructureField` records and the auxiliary encoding tables that back
//! the six field-type recoveries: `Offset`, `Index`, `Enum`, `Repeat`,
//! `PackedByte`, `PackedShort`.
//!
//! Each `StructureField` stores an exclusive `end` plus a `field_type`
//! discriminant and a `field_idx` into the type-specific auxiliary array;
//! `start` is always recovered, never stored directly (except for
//! `Index`, where the auxiliary array holds it).

use crate::error::{ErrorKind, Result};
use crate::structblock::types::IndexRange;
use crate::varint::{decode_varint, encode_varint};

/// `field_idx` must fit 13 bits for `Offset` fields.
pub const MAX_FIELD_IDX: u16 = (1 << 13) - 1;
/// `PackedByte`: up to 14 sub-fields, 5-bit end-delta, 3-bit size.
pub const MAX_PACKED_BYTE_FIELDS: usize = 14;
pub const MAX_PACKED_BYTE_DELTA: u16 = (1 << 5) - 1;
pub const MAX_PACKED_BYTE_SIZE: u16 = (1 << 3) - 1;
/// `PackedShort`: up to 7 sub-fields, 10-bit end-delta, 6-bit size.
pub const MAX_PACKED_SHORT_FIELDS: usize = 7;
pub const MAX_PACKED_SHORT_DELTA: u16 = (1 << 10) - 1;
pub const MAX_PACKED_SHORT_SIZE: u16 = (1 << 6) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Offset,
    Index,
    Enum,
    Repeat,
    PackedByte,
    PackedShort,
}

impl FieldType {
    fn to_tag(self) -> u8 {
        match self {
            FieldType::Offset => 0,
            FieldType::Index => 1,
            FieldType::Enum => 2,
            FieldType::Repeat => 3,
            FieldType::PackedByte => 4,
            FieldType::PackedShort => 5,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => FieldType::Offset,
            1 => FieldType::Index,
            2 => FieldType::Enum,
            3 => FieldType::Repeat,
            4 => FieldType::PackedByte,
            5 => FieldType::PackedShort,
            other => {
                return Err(ErrorKind::DataCorruption(format!(
                    "struct block: unknown field_type tag {other}"
                )))
            }
        })
    }
}

/// One 32-bit-logical struct-block field record: `{ end, field_type,
/// field_idx }`, sorted by `.end` ascending within a level array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructureField {
    pub end: u16,
    pub field_type: FieldType,
    pub field_idx: u16,
}

impl StructureField {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.end.to_le_bytes());
        out.push(self.field_type.to_tag());
        encode_varint(self.field_idx as u64, out);
    }

    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let end_bytes = buf
            .get(*pos..*pos + 2)
            .ok_or_else(|| ErrorKind::DataCorruption("struct field: truncated end".into()))?;
        let end = u16::from_le_bytes([end_bytes[0], end_bytes[1]]);
        *pos += 2;
        let tag = *buf
            .get(*pos)
            .ok_or_else(|| ErrorKind::DataCorruption("struct field: truncated tag".into()))?;
        *pos += 1;
        let field_type = FieldType::from_tag(tag)?;
        let field_idx = decode_varint(buf, pos)? as u16;
        Ok(StructureField {
            end,
            field_type,
            field_idx,
        })
    }
}

/// `repeatar[field_idx]`: an arithmetic progression of fixed-size
/// fields `[base + k*stride, base + k*stride + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSlot {
    pub base: u16,
    pub stride: u16,
    pub size: u16,
}

impl RepeatSlot {
    /// The field containing or following `pos`, bounded by `group_end`
    /// (the owning `StructureField.end`).
    pub fn skip(&self, pos: u16, group_end: u16) -> Option<IndexRange> {
        if self.stride == 0 {
            return None;
        }
        // Start one step before the naive estimate so rounding never
        // skips past the field that actually contains `pos`.
        let estimate = if pos > self.base {
            (pos - self.base) / self.stride
        } else {
            0
        };
        let mut k = estimate.saturating_sub(1);
        loop {
            let start = self.base.checked_add(k.checked_mul(self.stride)?)?;
            let end = start.checked_add(self.size)?;
            if end > group_end {
                return None;
            }
            if end > pos {
                // first field whose end exceeds pos: either contains
                // pos, or (if start > pos) is the next field after it.
                return IndexRange::new(start, end).ok();
            }
            k += 1;
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.base.to_le_bytes());
        out.extend_from_slice(&self.stride.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
    }

    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let b = read_u16(buf, pos, "repeat.base")?;
        let s = read_u16(buf, pos, "repeat.stride")?;
        let sz = read_u16(buf, pos, "repeat.size")?;
        Ok(RepeatSlot {
            base: b,
            stride: s,
            size: sz,
        })
    }
}

/// `enumar[field_idx]`: sorted distinct start positions, each denoting a
/// unit field `[p, p+1)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumSlot {
    pub starts: Vec<u16>,
}

impl EnumSlot {
    /// Skip-search: first `[p,p+1)` with `p+1 > pos`. Returns the field
    /// and the sub-index (position within `starts`).
    pub fn skip(&self, pos: u16) -> Option<(IndexRange, usize)> {
        let i = self.starts.partition_point(|&p| p + 1 <= pos);
        self.starts
            .get(i)
            .and_then(|&p| IndexRange::new(p, p + 1).ok().map(|r| (r, i)))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        encode_varint(self.starts.len() as u64, out);
        let mut prev = 0u32;
        for &p in &self.starts {
            encode_varint(p as u32 as u64 - prev as u64, out);
            prev = p as u32;
        }
    }

    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let n = decode_varint(buf, pos)? as usize;
        let mut starts = Vec::with_capacity(n);
        let mut prev = 0u32;
        for _ in 0..n {
            let delta = decode_varint(buf, pos)?;
            prev += delta as u32;
            starts.push(prev as u16);
        }
        Ok(EnumSlot { starts })
    }
}

/// A micro-field relative to a packed slot's shared `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedMicro {
    pub end_delta: u16,
    pub size: u16,
}

/// `pkbytear[field_idx]` / `pkshortar[field_idx]`: up to
/// [`MAX_PACKED_BYTE_FIELDS`]/[`MAX_PACKED_SHORT_FIELDS`] micro-fields
/// sharing one `base`, sorted by `end_delta` ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackedSlot {
    pub base: u16,
    pub micros: Vec<PackedMicro>,
}

impl PackedSlot {
    pub fn skip(&self, pos: u16) -> Option<IndexRange> {
        let i = self
            .micros
            .partition_point(|m| self.base + m.end_delta <= pos);
        self.micros.get(i).and_then(|m| {
            let end = self.base + m.end_delta;
            let start = end - m.size;
            IndexRange::new(start, end).ok()
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.base.to_le_bytes());
        encode_varint(self.micros.len() as u64, out);
        for m in &self.micros {
            encode_varint(m.end_delta as u64, out);
            encode_varint(m.size as u64, out);
        }
    }

    pub fn decode(buf: &[u8], pos: &mut usize) -> Result<Self> {
        let base = read_u16(buf, pos, "packed.base")?;
        let n = decode_varint(buf, pos)? as usize;
        let mut micros = Vec::with_capacity(n);
        for _ in 0..n {
            let end_delta = decode_varint(buf, pos)? as u16;
            let size = decode_varint(buf, pos)? as u16;
            micros.push(PackedMicro { end_delta, size });
        }
        Ok(PackedSlot { base, micros })
    }
}

fn read_u16(buf: &[u8], pos: &mut usize, what: &str) -> Result<u16> {
    let b = buf
        .get(*pos..*pos + 2)
        .ok_or_else(|| ErrorKind::DataCorruption(format!("struct block: truncated {what}")))?;
    *pos += 2;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_slot_skip_search() {
        let slot = EnumSlot {
            starts: vec![5, 10, 20],
        };
        assert_eq!(slot.skip(3).unwrap().0, IndexRange::new(5, 6).unwrap());
        assert_eq!(slot.skip(10).unwrap().0, IndexRange::new(10, 11).unwrap());
        assert_eq!(slot.skip(11).unwrap().0, IndexRange::new(20, 21).unwrap());
        assert!(slot.skip(21).is_none());
    }

    #[test]
    fn repeat_slot_progression() {
        let slot = RepeatSlot {
            base: 10,
            stride: 5,
            size: 2,
        };
        // fields: [10,12) [15,17) [20,22) [25,27) ...
        assert_eq!(slot.skip(10, 100).unwrap(), IndexRange::new(10, 12).unwrap());
        assert_eq!(slot.skip(13, 100).unwrap(), IndexRange::new(15, 17).unwrap());
        assert_eq!(slot.skip(16, 26).unwrap(), IndexRange::new(15, 17).unwrap());
        assert!(slot.skip(30, 26).is_none());
    }

    #[test]
    fn packed_slot_micro_fields() {
        let slot = PackedSlot {
            base: 100,
            micros: vec![
                PackedMicro { end_delta: 5, size: 2 }, // [103,105)
                PackedMicro { end_delta: 10, size: 3 }, // [107,110)
            ],
        };
        assert_eq!(slot.skip(100).unwrap(), IndexRange::new(103, 105).unwrap());
        assert_eq!(slot.skip(104).unwrap(), IndexRange::new(103, 105).unwrap());
        assert_eq!(slot.skip(105).unwrap(), IndexRange::new(107, 110).unwrap());
        assert!(slot.skip(110).is_none());
    }

    #[test]
    fn field_roundtrip() {
        let f = StructureField {
            end: 500,
            field_type: FieldType::Offset,
            field_idx: 42,
        };
        let mut buf = Vec::new();
        f.encode(&mut buf);
        let mut pos = 0;
        assert_eq!(StructureField::decode(&buf, &mut pos).unwrap(), f);
    }
}
