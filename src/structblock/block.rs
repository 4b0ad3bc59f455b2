// SPDX-License-Identifier: Apache-2.0

//! `StructBlock`: all hierarchical structure relations of one document,
//! packed into one compressed blob with random-access iteration by
//! ordinal position and level.

use std::collections::BTreeMap;

use crate::error::{ErrorKind, Result};
use crate::structblock::field::{
    EnumSlot, FieldType, PackedSlot, RepeatSlot, StructureField,
};
use crate::structblock::types::{IndexRange, StructBlockDeclaration};
use crate::varint::{decode_varint, encode_varint};
use crate::{MAX_FIELD_LEVELS, MAX_NOF_STRUCT_NO};

/// Links per field share one `LinkBasePointer`; groups (`Enum`/`Repeat`/
/// `PackedByte`/`PackedShort`) are only ever formed from runs of fields
/// whose link set is identical, so one pointer per `StructureField`
/// record is sufficient even for a multi-field group (see DESIGN.md).
pub const MAX_LINK_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkEntry {
    pub head: bool,
    pub structno: u8,
    pub idx: u16,
}

/// Index into one `linkar[width]` bucket, paired positionally with its
/// `StructureField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LinkBasePointer {
    index: u32,
    width: u8,
}

#[derive(Debug, Clone, Default)]
pub struct StructBlock {
    levels: Vec<Vec<StructureField>>,
    linkbase: Vec<Vec<LinkBasePointer>>,
    linkar: Vec<Vec<LinkEntry>>,
    enumar: Vec<EnumSlot>,
    repeatar: Vec<RepeatSlot>,
    pkbytear: Vec<PackedSlot>,
    pkshortar: Vec<PackedSlot>,
    startar: Vec<u16>,
    headerar: BTreeMap<(u8, u16), IndexRange>,
}

impl StructBlock {
    pub(crate) fn new(
        levels: Vec<Vec<StructureField>>,
        linkbase: Vec<Vec<LinkBasePointerRaw>>,
        linkar: Vec<Vec<LinkEntry>>,
        enumar: Vec<EnumSlot>,
        repeatar: Vec<RepeatSlot>,
        pkbytear: Vec<PackedSlot>,
        pkshortar: Vec<PackedSlot>,
        startar: Vec<u16>,
        headerar: BTreeMap<(u8, u16), IndexRange>,
    ) -> Self {
        let linkbase = linkbase
            .into_iter()
            .map(|v| {
                v.into_iter()
                    .map(|r| LinkBasePointer {
                        index: r.index,
                        width: r.width,
                    })
                    .collect()
            })
            .collect();
        StructBlock {
            levels,
            linkbase,
            linkar,
            enumar,
            repeatar,
            pkbytear,
            pkshortar,
            startar,
            headerar,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|l| l.is_empty())
    }

    pub fn nof_levels(&self) -> usize {
        self.levels.len()
    }

    /// Expand one `StructureField` into its concrete sub-ranges (more
    /// than one for `Enum`/`Repeat`/`PackedByte`/`PackedShort` groups).
    fn expand_group(&self, field: &StructureField) -> Vec<IndexRange> {
        match field.field_type {
            FieldType::Offset => IndexRange::new(field.end - field.field_idx, field.end)
                .into_iter()
                .collect(),
            FieldType::Index => self
                .startar
                .get(field.field_idx as usize)
                .and_then(|&start| IndexRange::new(start, field.end).ok())
                .into_iter()
                .collect(),
            FieldType::Enum => self
                .enumar
                .get(field.field_idx as usize)
                .map(|slot| {
                    slot.starts
                        .iter()
                        .filter_map(|&p| IndexRange::new(p, p + 1).ok())
                        .collect()
                })
                .unwrap_or_default(),
            FieldType::Repeat => {
                let mut out = Vec::new();
                if let Some(slot) = self.repeatar.get(field.field_idx as usize) {
                    let mut k: u16 = 0;
                    loop {
                        let Some(start) = slot.base.checked_add(k.saturating_mul(slot.stride))
                        else {
                            break;
                        };
                        let Some(end) = start.checked_add(slot.size) else {
                            break;
                        };
                        if end > field.end {
                            break;
                        }
                        if let Ok(r) = IndexRange::new(start, end) {
                            out.push(r);
                        }
                        k += 1;
                        if slot.stride == 0 {
                            break;
                        }
                    }
                }
                out
            }
            FieldType::PackedByte => self
                .pkbytear
                .get(field.field_idx as usize)
                .map(|slot| {
                    slot.micros
                        .iter()
                        .filter_map(|m| {
                            let end = slot.base + m.end_delta;
                            IndexRange::new(end - m.size, end).ok()
                        })
                        .collect()
                })
                .unwrap_or_default(),
            FieldType::PackedShort => self
                .pkshortar
                .get(field.field_idx as usize)
                .map(|slot| {
                    slot.micros
                        .iter()
                        .filter_map(|m| {
                            let end = slot.base + m.end_delta;
                            IndexRange::new(end - m.size, end).ok()
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Resolve the single sub-range of `field` that is the skip-target
    /// for `pos`.
    fn resolve_at(&self, field: &StructureField, pos: u16) -> Option<IndexRange> {
        match field.field_type {
            FieldType::Offset | FieldType::Index => self.expand_group(field).into_iter().next(),
            FieldType::Enum => self
                .enumar
                .get(field.field_idx as usize)
                .and_then(|slot| slot.skip(pos))
                .map(|(r, _)| r),
            FieldType::Repeat => self
                .repeatar
                .get(field.field_idx as usize)
                .and_then(|slot| slot.skip(pos, field.end)),
            FieldType::PackedByte => self
                .pkbytear
                .get(field.field_idx as usize)
                .and_then(|slot| slot.skip(pos)),
            FieldType::PackedShort => self
                .pkshortar
                .get(field.field_idx as usize)
                .and_then(|slot| slot.skip(pos)),
        }
    }

    fn links_of(&self, level: usize, field_array_idx: usize) -> &[LinkEntry] {
        let Some(ptr) = self
            .linkbase
            .get(level)
            .and_then(|v| v.get(field_array_idx))
        else {
            return &[];
        };
        let width = ptr.width as usize + 1;
        let start = ptr.index as usize;
        self.linkar
            .get(ptr.width as usize)
            .and_then(|bucket| bucket.get(start..start + width))
            .unwrap_or(&[])
    }

    /// Enumerate all distinct fields across all levels (test oracle, and
    /// used by the title weighter to walk header hierarchy).
    pub fn fields(&self) -> Vec<IndexRange> {
        let mut out = Vec::new();
        for level in &self.levels {
            for field in level {
                out.extend(self.expand_group(field));
            }
        }
        out
    }

    /// Rebuild every `(structno, source, sink)` triple this block
    /// encodes.
    pub fn declarations(&self) -> Vec<StructBlockDeclaration> {
        let mut out = Vec::new();
        for (level, fields) in self.levels.iter().enumerate() {
            for (i, field) in fields.iter().enumerate() {
                let links = self.links_of(level, i);
                if links.iter().all(|l| l.head) {
                    continue;
                }
                let sinks = self.expand_group(field);
                for link in links.iter().filter(|l| !l.head) {
                    let Some(&source) = self.headerar.get(&(link.structno, link.idx)) else {
                        continue;
                    };
                    for &sink in &sinks {
                        out.push(StructBlockDeclaration {
                            structno: link.structno,
                            source,
                            sink,
                        });
                    }
                }
            }
        }
        out
    }

    /// A scanner over one field level, supporting skip-scan queries.
    pub fn fieldscanner(&self, level: usize) -> FieldScanner<'_> {
        FieldScanner {
            block: self,
            level,
            cursor: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint(self.levels.len() as u64, &mut out);
        for (level, fields) in self.levels.iter().enumerate() {
            encode_varint(fields.len() as u64, &mut out);
            for field in fields {
                field.encode(&mut out);
            }
            let bases = &self.linkbase[level];
            for base in bases {
                encode_varint(base.index as u64, &mut out);
                out.push(base.width);
            }
        }
        encode_varint(self.linkar.len() as u64, &mut out);
        for bucket in &self.linkar {
            encode_varint(bucket.len() as u64, &mut out);
            for link in bucket {
                out.push(link.head as u8);
                out.push(link.structno);
                encode_varint(link.idx as u64, &mut out);
            }
        }
        encode_varint(self.enumar.len() as u64, &mut out);
        for slot in &self.enumar {
            slot.encode(&mut out);
        }
        encode_varint(self.repeatar.len() as u64, &mut out);
        for slot in &self.repeatar {
            slot.encode(&mut out);
        }
        encode_varint(self.pkbytear.len() as u64, &mut out);
        for slot in &self.pkbytear {
            slot.encode(&mut out);
        }
        encode_varint(self.pkshortar.len() as u64, &mut out);
        for slot in &self.pkshortar {
            slot.encode(&mut out);
        }
        encode_varint(self.startar.len() as u64, &mut out);
        for &s in &self.startar {
            out.extend_from_slice(&s.to_le_bytes());
        }
        encode_varint(self.headerar.len() as u64, &mut out);
        for (&(structno, idx), range) in &self.headerar {
            out.push(structno);
            encode_varint(idx as u64, &mut out);
            out.extend_from_slice(&range.start.to_le_bytes());
            out.extend_from_slice(&range.end.to_le_bytes());
        }
        let crc = crc32fast::hash(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(ErrorKind::DataCorruption("struct block too short".into()));
        }
        let (body, crc_bytes) = buf.split_at(buf.len() - 4);
        if u32::from_le_bytes(crc_bytes.try_into().unwrap()) != crc32fast::hash(body) {
            return Err(ErrorKind::DataCorruption(
                "struct block: crc32 mismatch".into(),
            ));
        }
        let mut pos = 0usize;
        let nlevels = decode_varint(body, &mut pos)? as usize;
        if nlevels > MAX_FIELD_LEVELS {
            return Err(ErrorKind::DataCorruption(format!(
                "struct block: {nlevels} levels exceeds MAX_FIELD_LEVELS {MAX_FIELD_LEVELS}"
            )));
        }
        let mut levels = Vec::with_capacity(nlevels);
        let mut linkbase = Vec::with_capacity(nlevels);
        for _ in 0..nlevels {
            let nfields = decode_varint(body, &mut pos)? as usize;
            let mut fields = Vec::with_capacity(nfields);
            for _ in 0..nfields {
                fields.push(StructureField::decode(body, &mut pos)?);
            }
            let mut bases = Vec::with_capacity(nfields);
            for _ in 0..nfields {
                let index = decode_varint(body, &mut pos)? as u32;
                let width = *body.get(pos).ok_or_else(|| {
                    ErrorKind::DataCorruption("struct block: truncated link width".into())
                })?;
                pos += 1;
                bases.push(LinkBasePointerRaw { index, width });
            }
            levels.push(fields);
            linkbase.push(bases);
        }
        let nbuckets = decode_varint(body, &mut pos)? as usize;
        let mut linkar = Vec::with_capacity(nbuckets);
        for _ in 0..nbuckets {
            let n = decode_varint(body, &mut pos)? as usize;
            let mut bucket = Vec::with_capacity(n);
            for _ in 0..n {
                let head = *body.get(pos).ok_or_else(|| {
                    ErrorKind::DataCorruption("struct block: truncated link head".into())
                })? != 0;
                pos += 1;
                let structno = *body.get(pos).ok_or_else(|| {
                    ErrorKind::DataCorruption("struct block: truncated structno".into())
                })?;
                pos += 1;
                if structno == 0 || structno as u32 > MAX_NOF_STRUCT_NO as u32 {
                    return Err(ErrorKind::DataCorruption(format!(
                        "struct block: structno {structno} outside [1,{MAX_NOF_STRUCT_NO}]"
                    )));
                }
                let idx = decode_varint(body, &mut pos)? as u16;
                bucket.push(LinkEntry {
                    head,
                    structno,
                    idx,
                });
            }
            linkar.push(bucket);
        }
        let nenum = decode_varint(body, &mut pos)? as usize;
        let mut enumar = Vec::with_capacity(nenum);
        for _ in 0..nenum {
            enumar.push(EnumSlot::decode(body, &mut pos)?);
        }
        let nrepeat = decode_varint(body, &mut pos)? as usize;
        let mut repeatar = Vec::with_capacity(nrepeat);
        for _ in 0..nrepeat {
            repeatar.push(RepeatSlot::decode(body, &mut pos)?);
        }
        let npkbyte = decode_varint(body, &mut pos)? as usize;
        let mut pkbytear = Vec::with_capacity(npkbyte);
        for _ in 0..npkbyte {
            pkbytear.push(PackedSlot::decode(body, &mut pos)?);
        }
        let npkshort = decode_varint(body, &mut pos)? as usize;
        let mut pkshortar = Vec::with_capacity(npkshort);
        for _ in 0..npkshort {
            pkshortar.push(PackedSlot::decode(body, &mut pos)?);
        }
        let nstart = decode_varint(body, &mut pos)? as usize;
        let mut startar = Vec::with_capacity(nstart);
        for _ in 0..nstart {
            let b = body.get(pos..pos + 2).ok_or_else(|| {
                ErrorKind::DataCorruption("struct block: truncated startar".into())
            })?;
            startar.push(u16::from_le_bytes([b[0], b[1]]));
            pos += 2;
        }
        let nheader = decode_varint(body, &mut pos)? as usize;
        let mut headerar = BTreeMap::new();
        for _ in 0..nheader {
            let structno = *body.get(pos).ok_or_else(|| {
                ErrorKind::DataCorruption("struct block: truncated header structno".into())
            })?;
            pos += 1;
            let idx = decode_varint(body, &mut pos)? as u16;
            let b = body.get(pos..pos + 4).ok_or_else(|| {
                ErrorKind::DataCorruption("struct block: truncated header range".into())
            })?;
            let start = u16::from_le_bytes([b[0], b[1]]);
            let end = u16::from_le_bytes([b[2], b[3]]);
            pos += 4;
            let range = IndexRange::new(start, end).map_err(|_| {
                ErrorKind::DataCorruption("struct block: invalid header range".into())
            })?;
            headerar.insert((structno, idx), range);
        }
        if pos != body.len() {
            return Err(ErrorKind::DataCorruption(
                "struct block: trailing bytes".into(),
            ));
        }
        Ok(StructBlock::new(
            levels, linkbase, linkar, enumar, repeatar, pkbytear, pkshortar, startar, headerar,
        ))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkBasePointerRaw {
    pub index: u32,
    pub width: u8,
}

/// Iterator over one field level with skip-scan semantics.
pub struct FieldScanner<'a> {
    block: &'a StructBlock,
    level: usize,
    cursor: usize,
}

impl<'a> FieldScanner<'a> {
    /// First field at this level whose `end > pos`; if it `start <=
    /// pos` it contains `pos`, otherwise it is the next field after
    /// `pos`. Uses binary search when the target is far from the
    /// cursor, linear advance when close.
    pub fn skip(&mut self, pos: u16) -> Option<IndexRange> {
        let fields = self.block.levels.get(self.level)?;
        if fields.is_empty() {
            return None;
        }
        const LINEAR_SCAN_WINDOW: usize = 8;
        let start = self.cursor.min(fields.len());
        let i = if fields[start..].iter().take(LINEAR_SCAN_WINDOW).any(|f| f.end > pos) {
            start + fields[start..].iter().take_while(|f| f.end <= pos).count()
        } else {
            fields.partition_point(|f| f.end <= pos)
        };
        self.cursor = i;
        let field = fields.get(i)?;
        let resolved = self.block.resolve_at(field, pos)?;
        Some(resolved)
    }

    /// Links of the field that produced the last `skip` result.
    pub fn get_links(&self) -> &'a [LinkEntry] {
        self.block.links_of(self.level, self.cursor)
    }
}
