// SPDX-License-Identifier: Apache-2.0

//! Round-trip and cover-assignment properties of `StructBlockBuilder` →
//! `StructBlock`.

use glyphidx::structblock::{IndexRange, StructBlock, StructBlockBuilder};

fn range(start: u16, end: u16) -> IndexRange {
    IndexRange::new(start, end).unwrap()
}

/// Declaring three structures on one document, two of them sharing a
/// source, and reparsing the encoded block, reproduces exactly the
/// declared triples — independent of declaration order.
#[test]
fn struct_round_trip_reproduces_declarations() {
    let mut builder = StructBlockBuilder::new();
    builder.add(1, range(10, 15), range(20, 30)).unwrap();
    builder.add(1, range(10, 15), range(40, 50)).unwrap();
    builder.add(1, range(60, 65), range(70, 80)).unwrap();
    let block = builder.build().unwrap();
    let encoded = block.encode();
    let decoded = StructBlock::decode(&encoded).unwrap();

    let mut got = decoded.declarations();
    got.sort_by_key(|d| (d.structno, d.source.start, d.sink.start));

    let mut expected = vec![
        (1u8, range(10, 15), range(20, 30)),
        (1u8, range(10, 15), range(40, 50)),
        (1u8, range(60, 65), range(70, 80)),
    ];
    expected.sort_by_key(|d| (d.0, d.1.start, d.2.start));

    assert_eq!(got.len(), expected.len());
    for (d, (structno, source, sink)) in got.iter().zip(expected.iter()) {
        assert_eq!(d.structno, *structno);
        assert_eq!(d.source, *source);
        assert_eq!(d.sink, *sink);
    }
}

/// Every field lands on exactly one level, and fields sharing a level
/// never overlap — the cover-assignment invariant the builder's
/// greedy interval partition must uphold for overlapping inputs.
#[test]
fn fields_partition_into_non_overlapping_levels() {
    let mut builder = StructBlockBuilder::new();
    // Three mutually overlapping "paragraph" sinks plus a handful of
    // disjoint ones, all tied to distinct sources so none get merged
    // into one group.
    let sinks = [
        range(100, 200),
        range(150, 250),
        range(220, 260),
        range(300, 320),
        range(310, 330),
        range(400, 450),
    ];
    let mut sources = Vec::new();
    for (i, sink) in sinks.iter().enumerate() {
        let source = range(1000 + i as u16, 1001 + i as u16);
        sources.push(source);
        builder.add(1, source, *sink).unwrap();
    }
    let block = builder.build().unwrap();

    for level in 0..block.nof_levels() {
        let mut scanner = block.fieldscanner(level);
        let mut pos = 1u16;
        let mut seen = Vec::new();
        while let Some(field) = scanner.skip(pos) {
            seen.push(field);
            pos = field.end;
        }
        for w in seen.windows(2) {
            assert!(!w[0].overlaps(&w[1]), "level {level} has overlapping fields {:?}", w);
        }
    }

    let declared: std::collections::HashSet<IndexRange> = sinks
        .iter()
        .copied()
        .chain(sources.iter().copied())
        .collect();
    let found: std::collections::HashSet<IndexRange> = block.fields().into_iter().collect();
    assert_eq!(declared, found);
}

/// Rejects a `structno` of 0 or beyond the declared maximum.
#[test]
fn rejects_out_of_range_structno() {
    let mut builder = StructBlockBuilder::new();
    assert!(builder.add(0, range(1, 2), range(3, 4)).is_err());
    assert!(builder
        .add(glyphidx::MAX_NOF_STRUCT_NO + 1, range(1, 2), range(3, 4))
        .is_err());
}
