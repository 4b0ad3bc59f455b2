// SPDX-License-Identifier: Apache-2.0

//! Incremental construction of a [`StructBlock`] from the raw
//! `(structno, source, sink)` triples a document builder collects while
//! walking a parsed document.
//!
//! Fields are assigned to levels by a greedy interval-partition pass
//! (sorted by `(start, end descending)` so the assignment is
//! deterministic across builds of the same input), then consecutive
//! fields sharing one link set are opportunistically compressed into a
//! `Repeat`, `Enum` or packed-micro group; anything that doesn't fit a
//! compressible shape falls back to a plain `Offset`/`Index` record.
//! Header fields (any field acting as a structure's source) are never
//! grouped, since a `LinkBasePointer` is shared by an entire group and a
//! header's link set is specific to its own instance.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorKind, Result};
use crate::structblock::block::{LinkBasePointerRaw, LinkEntry, StructBlock, MAX_LINK_WIDTH};
use crate::structblock::field::{
    EnumSlot, FieldType, PackedMicro, PackedSlot, RepeatSlot, StructureField,
    MAX_PACKED_BYTE_DELTA, MAX_PACKED_BYTE_FIELDS, MAX_PACKED_BYTE_SIZE, MAX_PACKED_SHORT_DELTA,
    MAX_PACKED_SHORT_FIELDS, MAX_PACKED_SHORT_SIZE, MAX_FIELD_IDX,
};
use crate::structblock::types::IndexRange;
use crate::{MAX_FIELD_LEVELS, MAX_NOF_STRUCT_IDX, MAX_NOF_STRUCT_NO};

#[derive(Debug, Clone, Default)]
pub struct StructBlockBuilder {
    declarations: BTreeSet<(u8, IndexRange, IndexRange)>,
}

impl StructBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, structno: u8, source: IndexRange, sink: IndexRange) -> Result<()> {
        if structno == 0 || structno as usize > MAX_NOF_STRUCT_NO as usize {
            return Err(ErrorKind::InvalidArgument(format!(
                "structno {structno} outside [1,{MAX_NOF_STRUCT_NO}]"
            )));
        }
        self.declarations.insert((structno, source, sink));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn build(self) -> Result<StructBlock> {
        let mut header_alloc: BTreeMap<u8, BTreeMap<IndexRange, u16>> = BTreeMap::new();
        let mut headerar: BTreeMap<(u8, u16), IndexRange> = BTreeMap::new();
        let mut field_links: BTreeMap<IndexRange, Vec<LinkEntry>> = BTreeMap::new();

        for &(structno, source, sink) in &self.declarations {
            let per_struct = header_alloc.entry(structno).or_default();
            let idx = if let Some(&idx) = per_struct.get(&source) {
                idx
            } else {
                let idx = per_struct.len() as u16;
                if idx as usize >= MAX_NOF_STRUCT_IDX as usize {
                    return Err(ErrorKind::InvalidArgument(format!(
                        "structno {structno} exceeds MAX_NOF_STRUCT_IDX {MAX_NOF_STRUCT_IDX}"
                    )));
                }
                per_struct.insert(source, idx);
                idx
            };
            headerar.insert((structno, idx), source);
            push_link(&mut field_links, source, LinkEntry { head: true, structno, idx });
            push_link(&mut field_links, sink, LinkEntry { head: false, structno, idx });
        }

        for links in field_links.values_mut() {
            links.sort();
        }
        for (range, links) in &field_links {
            if links.len() > MAX_LINK_WIDTH {
                return Err(ErrorKind::InvalidArgument(format!(
                    "field [{},{}) participates in {} structures, exceeds MAX_LINK_WIDTH {MAX_LINK_WIDTH}",
                    range.start, range.end, links.len()
                )));
            }
        }

        // Deterministic cover assignment: (start asc, end desc).
        let mut ordered: Vec<IndexRange> = field_links.keys().copied().collect();
        ordered.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut level_last_end: Vec<u16> = Vec::new();
        let mut level_fields: Vec<Vec<IndexRange>> = Vec::new();
        for range in ordered {
            let level = level_last_end.iter().position(|&end| end <= range.start);
            match level {
                Some(i) => {
                    level_last_end[i] = range.end;
                    level_fields[i].push(range);
                }
                None => {
                    if level_last_end.len() >= MAX_FIELD_LEVELS {
                        return Err(ErrorKind::InvalidArgument(format!(
                            "structure cover needs more than MAX_FIELD_LEVELS {MAX_FIELD_LEVELS} levels"
                        )));
                    }
                    level_last_end.push(range.end);
                    level_fields.push(vec![range]);
                }
            }
        }

        let mut tables = AuxTables::default();
        let mut levels: Vec<Vec<StructureField>> = Vec::with_capacity(level_fields.len());
        let mut linkbase: Vec<Vec<LinkBasePointerRaw>> = Vec::with_capacity(level_fields.len());
        let mut linkar: Vec<Vec<LinkEntry>> = (0..MAX_LINK_WIDTH).map(|_| Vec::new()).collect();

        for fields in level_fields {
            let mut level_struct_fields = Vec::new();
            let mut level_pointers = Vec::new();
            let mut i = 0;
            while i < fields.len() {
                let links = &field_links[&fields[i]];
                let groupable = links.iter().all(|l| !l.head);
                let mut j = i + 1;
                if groupable {
                    while j < fields.len() && &field_links[&fields[j]] == links {
                        j += 1;
                    }
                }
                let group = &fields[i..j];
                let width = links.len() - 1;
                let bucket_index = linkar[width].len() as u32;
                linkar[width].extend_from_slice(links);
                let pointer = LinkBasePointerRaw {
                    index: bucket_index,
                    width: width as u8,
                };
                let encoded = encode_group(group, &mut tables);
                for (field_type, field_idx, end) in encoded {
                    level_struct_fields.push(StructureField {
                        end,
                        field_type,
                        field_idx,
                    });
                    level_pointers.push(pointer);
                }
                i = j;
            }
            levels.push(level_struct_fields);
            linkbase.push(level_pointers);
        }

        Ok(StructBlock::new(
            levels,
            linkbase,
            linkar,
            tables.enumar,
            tables.repeatar,
            tables.pkbytear,
            tables.pkshortar,
            tables.startar,
            headerar,
        ))
    }
}

fn push_link(map: &mut BTreeMap<IndexRange, Vec<LinkEntry>>, range: IndexRange, link: LinkEntry) {
    let entries = map.entry(range).or_default();
    if !entries.contains(&link) {
        entries.push(link);
    }
}

#[derive(Default)]
struct AuxTables {
    enumar: Vec<EnumSlot>,
    repeatar: Vec<RepeatSlot>,
    pkbytear: Vec<PackedSlot>,
    pkshortar: Vec<PackedSlot>,
    startar: Vec<u16>,
}

fn encode_one(range: IndexRange, startar: &mut Vec<u16>) -> (FieldType, u16, u16) {
    let len = range.len();
    if len <= MAX_FIELD_IDX {
        (FieldType::Offset, len, range.end)
    } else {
        let idx = startar.len() as u16;
        startar.push(range.start);
        (FieldType::Index, idx, range.end)
    }
}

fn detect_repeat(ranges: &[IndexRange]) -> Option<RepeatSlot> {
    if ranges.len() < 2 {
        return None;
    }
    let size = ranges[0].len();
    if ranges.iter().any(|r| r.len() != size) {
        return None;
    }
    let stride = ranges[1].start.checked_sub(ranges[0].start)?;
    if stride == 0 {
        return None;
    }
    for w in ranges.windows(2) {
        if w[1].start.checked_sub(w[0].start)? != stride {
            return None;
        }
    }
    Some(RepeatSlot {
        base: ranges[0].start,
        stride,
        size,
    })
}

fn try_packed(ranges: &[IndexRange], max_delta: u16, max_size: u16) -> Option<PackedSlot> {
    let base = ranges.iter().map(|r| r.start).min()?;
    let mut micros = Vec::with_capacity(ranges.len());
    for r in ranges {
        let end_delta = r.end.checked_sub(base)?;
        let size = r.len();
        if end_delta > max_delta || size > max_size {
            return None;
        }
        micros.push(PackedMicro { end_delta, size });
    }
    Some(PackedSlot { base, micros })
}

fn try_chunked_packed(
    ranges: &[IndexRange],
    chunk_size: usize,
    max_delta: u16,
    max_size: u16,
) -> Option<Vec<PackedSlot>> {
    let mut out = Vec::new();
    for chunk in ranges.chunks(chunk_size) {
        out.push(try_packed(chunk, max_delta, max_size)?);
    }
    Some(out)
}

/// Choose the cheapest representable encoding for one run of fields
/// sharing a link set, possibly splitting into several records when a
/// packed table's capacity is exceeded.
fn encode_group(ranges: &[IndexRange], tables: &mut AuxTables) -> Vec<(FieldType, u16, u16)> {
    if ranges.len() == 1 {
        return vec![encode_one(ranges[0], &mut tables.startar)];
    }
    if let Some(slot) = detect_repeat(ranges) {
        let idx = tables.repeatar.len() as u16;
        let end = ranges.last().unwrap().end;
        tables.repeatar.push(slot);
        return vec![(FieldType::Repeat, idx, end)];
    }
    if ranges.iter().all(|r| r.len() == 1) {
        let idx = tables.enumar.len() as u16;
        let end = ranges.last().unwrap().end;
        tables.enumar.push(EnumSlot {
            starts: ranges.iter().map(|r| r.start).collect(),
        });
        return vec![(FieldType::Enum, idx, end)];
    }
    if let Some(chunks) = try_chunked_packed(
        ranges,
        MAX_PACKED_BYTE_FIELDS,
        MAX_PACKED_BYTE_DELTA,
        MAX_PACKED_BYTE_SIZE,
    ) {
        return chunks
            .into_iter()
            .map(|slot| {
                let end = slot.base + slot.micros.last().unwrap().end_delta;
                let idx = tables.pkbytear.len() as u16;
                tables.pkbytear.push(slot);
                (FieldType::PackedByte, idx, end)
            })
            .collect();
    }
    if let Some(chunks) = try_chunked_packed(
        ranges,
        MAX_PACKED_SHORT_FIELDS,
        MAX_PACKED_SHORT_DELTA,
        MAX_PACKED_SHORT_SIZE,
    ) {
        return chunks
            .into_iter()
            .map(|slot| {
                let end = slot.base + slot.micros.last().unwrap().end_delta;
                let idx = tables.pkshortar.len() as u16;
                tables.pkshortar.push(slot);
                (FieldType::PackedShort, idx, end)
            })
            .collect();
    }
    ranges
        .iter()
        .map(|&r| encode_one(r, &mut tables.startar))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_structno() {
        let mut b = StructBlockBuilder::new();
        let err = b
            .add(
                0,
                IndexRange::new(1, 2).unwrap(),
                IndexRange::new(3, 4).unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn repeat_group_compresses_uniform_fields() {
        let mut b = StructBlockBuilder::new();
        let header = IndexRange::new(1, 2).unwrap();
        for k in 0..5u16 {
            let start = 10 + k * 5;
            b.add(1, header, IndexRange::new(start, start + 3).unwrap())
                .unwrap();
        }
        let block = b.build().unwrap();
        let declarations = block.declarations();
        assert_eq!(declarations.len(), 5);
        // the repeat group should have collapsed into a single table entry
        let fields = block.fields();
        assert!(fields.len() >= 6); // header + 5 repeats
    }

    #[test]
    fn single_declaration_roundtrips() {
        let mut b = StructBlockBuilder::new();
        b.add(
            3,
            IndexRange::new(5, 10).unwrap(),
            IndexRange::new(20, 25).unwrap(),
        )
        .unwrap();
        let block = b.build().unwrap();
        let decls = block.declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].structno, 3);
        assert_eq!(decls[0].source, IndexRange::new(5, 10).unwrap());
        assert_eq!(decls[0].sink, IndexRange::new(20, 25).unwrap());
    }
}
