//! Skip/scan bitmaps for conservative scanning.
//!
//! A bitmap is a sequence of bytes, each containing the number of words to
//! skip in the upper nibble and the number of words to scan in the lower
//! nibble. A zero byte terminates the bitmap, and everything after the last
//! scanned word is skipped.
use crate::config::GcMode;
use crate::layout::BlockInfo;
use std::fmt::Write as _;
use std::ops::Range;
use tracing::trace;
use types::{
    ClassId, Database, Field, GcAttribute, Ownership, RecordId, Type, TypeKind,
};

/// The kind of references to produce a layout for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Strong,
    Weak,
}

impl Selection {
    pub fn name(self) -> &'static str {
        match self {
            Selection::Strong => "strong",
            Selection::Weak => "weak",
        }
    }
}

/// A region of memory that is either scanned or skipped.
///
/// The offset is in bytes. For scanned regions the size is in words, while
/// for skipped regions the size is in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Region {
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl Region {
    fn new(offset: u64, size: u64) -> Region {
        Region { offset, size }
    }
}

/// A pair of words to skip followed by words to scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SkipScan {
    skip: u64,
    scan: u64,
}

/// Returns the collector attribute of a type.
pub(crate) fn gc_attribute(typ: &Type) -> GcAttribute {
    if typ.gc == GcAttribute::Strong {
        return GcAttribute::Strong;
    }

    if typ.gc == GcAttribute::Weak || typ.ownership == Ownership::Weak {
        return GcAttribute::Weak;
    }

    if typ.ownership == Ownership::ExplicitNone {
        return GcAttribute::None;
    }

    if typ.is_retainable() {
        return GcAttribute::Strong;
    }

    if let Some(pointee) = typ.pointee() {
        return gc_attribute(pointee);
    }

    GcAttribute::None
}

/// A type that walks over fields and collects the regions to scan and skip.
struct Walker<'a> {
    db: &'a Database,
    word: u64,
    selection: Selection,
    scan: Vec<Region>,
    skip: Vec<Region>,
    has_union: bool,
}

impl<'a> Walker<'a> {
    fn new(db: &'a Database, word: u32, selection: Selection) -> Walker<'a> {
        Walker {
            db,
            word: word as u64,
            selection,
            scan: Vec::new(),
            skip: Vec::new(),
            has_union: false,
        }
    }

    fn record(&mut self, id: RecordId, byte_pos: u64) {
        let db = self.db;

        self.aggregate(id.fields(db), id.is_union(db), byte_pos, 0);
    }

    fn aggregate(
        &mut self,
        fields: &[Field],
        is_union: bool,
        byte_pos: u64,
        delta: u64,
    ) {
        let db = self.db;
        let mut max_scan_size = 0;
        let mut max_scan_offset = None;
        let mut max_skip_size = 0;
        let mut max_skip_offset = None;
        let mut last_unnamed_or_bitfield = None;

        for field in fields {
            let offset = field.offset - delta;

            if field.name.is_none() || field.is_bitfield() {
                last_unnamed_or_bitfield = Some((field, offset));
                continue;
            }

            last_unnamed_or_bitfield = None;

            if let TypeKind::Record(id) = field.typ.kind {
                if id.is_union(db) {
                    self.has_union = true;
                }

                self.record(id, byte_pos + offset);
                continue;
            }

            let mut typ = &field.typ;

            if let TypeKind::Array(..) = typ.kind {
                let mut count = 1;

                while let TypeKind::Array(of, len) = &typ.kind {
                    count *= len;
                    typ = of;
                }

                if let (TypeKind::Record(id), true) = (&typ.kind, count > 0) {
                    self.record_array(*id, byte_pos + offset, count);
                    continue;
                }
            }

            let attr = gc_attribute(typ);
            let bytes = field.typ.size(db, self.word as u32);
            let scanned = match self.selection {
                Selection::Strong => attr == GcAttribute::Strong,
                Selection::Weak => attr == GcAttribute::Weak,
            };

            if scanned {
                let words = bytes / self.word;

                if !is_union {
                    self.scan.push(Region::new(byte_pos + offset, words));
                } else if words > max_scan_size {
                    max_scan_size = words;
                    max_scan_offset = Some(offset);
                }
            } else if !is_union {
                self.skip.push(Region::new(byte_pos + offset, bytes));
            } else if bytes > max_skip_size {
                max_skip_size = bytes;
                max_skip_offset = Some(offset);
            }
        }

        if let Some((field, offset)) = last_unnamed_or_bitfield {
            let size = if let Some(bits) = field.bit_width {
                (bits as u64).div_ceil(8)
            } else {
                field.typ.size(db, self.word as u32)
            };

            self.skip.push(Region::new(byte_pos + offset, size));
        }

        if let Some(offset) = max_scan_offset {
            self.scan.push(Region::new(byte_pos + offset, max_scan_size));
        }

        if let Some(offset) = max_skip_offset {
            self.skip.push(Region::new(byte_pos + offset, max_skip_size));
        }
    }

    /// Lays out the first element of an array of records, then repeats the
    /// produced regions for the remaining elements.
    fn record_array(&mut self, id: RecordId, byte_pos: u64, count: u64) {
        let old_scan = self.scan.len();
        let old_skip = self.skip.len();

        self.record(id, byte_pos);

        let new_scan = self.scan.len();
        let new_skip = self.skip.len();
        let size = id.size(self.db);

        for index in 1..count {
            for i in old_scan..new_scan {
                let reg = self.scan[i];

                let offset = reg.offset + size * index;

                self.scan.push(Region::new(offset, reg.size));
            }

            for i in old_skip..new_skip {
                let reg = self.skip[i];

                let offset = reg.offset + size * index;

                self.skip.push(Region::new(offset, reg.size));
            }
        }
    }

    fn finish(mut self) -> Option<Vec<u8>> {
        if self.scan.is_empty() {
            return None;
        }

        // Unions and arrays may produce regions out of order.
        self.scan.sort_by_key(|r| r.offset);
        self.skip.sort_by_key(|r| r.offset);

        let bitmap = encode_bitmap(&self.scan, &self.skip, self.word);

        trace!(
            scan = self.scan.len(),
            skip = self.skip.len(),
            union = self.has_union,
            bitmap = format_bitmap(&bitmap).as_str(),
            "computed skip/scan layout"
        );

        Some(bitmap)
    }
}

/// Returns all ivars of a class, starting with those of the root class.
fn all_ivars(db: &Database, class: ClassId) -> Vec<Field> {
    let mut chain = Vec::new();
    let mut current = Some(class);

    while let Some(id) = current {
        chain.push(id);
        current = id.superclass(db);
    }

    chain.iter().rev().flat_map(|id| id.ivars(db).iter().cloned()).collect()
}

/// Builds the strong or weak ivar layout of a class.
///
/// A `None` is returned if neither garbage collection nor reference counting
/// is enabled, or if there is nothing to scan.
pub fn ivar_layout(
    db: &Database,
    class: ClassId,
    word: u32,
    selection: Selection,
    gc: GcMode,
    arc: bool,
) -> Option<Vec<u8>> {
    if !gc.is_enabled() && !arc {
        return None;
    }

    // With reference counting the layout only covers the ivars declared by
    // the class itself, relative to the first ivar.
    let fields =
        if arc { class.ivars(db).to_vec() } else { all_ivars(db, class) };
    let delta = if arc { fields.first().map_or(0, |f| f.offset) } else { 0 };

    if fields.is_empty() {
        return None;
    }

    let mut walker = Walker::new(db, word, selection);

    walker.aggregate(&fields, false, 0, delta);
    walker.finish()
}

/// Builds the skip/scan layout of the captures of a block.
pub fn block_layout(
    db: &Database,
    block: &BlockInfo,
    word: u32,
    gc: GcMode,
    arc: bool,
) -> Option<Vec<u8>> {
    if !gc.is_enabled() && !arc {
        return None;
    }

    let mut walker = Walker::new(db, word, Selection::Strong);

    // The isa pointer of the block is always scanned.
    walker.scan.push(Region::new(0, 1));

    for capture in &block.captures {
        if capture.constant {
            continue;
        }

        if capture.byref {
            walker.scan.push(Region::new(capture.offset, 1));
            continue;
        }

        if let TypeKind::Record(id) = capture.typ.kind {
            walker.record(id, capture.offset);
            continue;
        }

        let bytes = capture.typ.size(db, word);

        match gc_attribute(&capture.typ) {
            GcAttribute::Strong => walker
                .scan
                .push(Region::new(capture.offset, bytes / word as u64)),
            GcAttribute::None | GcAttribute::Weak => {
                walker.skip.push(Region::new(capture.offset, bytes))
            }
        }
    }

    walker.finish()
}

/// Encodes sorted scan and skip regions into a skip/scan bitmap, including
/// the terminating zero byte.
pub(crate) fn encode_bitmap(
    scan: &[Region],
    skip: &[Region],
    word: u64,
) -> Vec<u8> {
    let mut pairs = Vec::new();
    let mut words_to_skip = scan[0].offset / word;
    let mut words_to_scan = scan[0].size;

    for pair in scan.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let tail = prev.offset + prev.size * word;

        if cur.offset == tail {
            words_to_scan += cur.size;
            continue;
        }

        // Overlapping regions, such as union members, are scanned once.
        if tail > cur.offset {
            continue;
        }

        pairs.push(SkipScan { skip: words_to_skip, scan: words_to_scan });
        pairs.push(SkipScan { skip: (cur.offset - tail) / word, scan: 0 });
        words_to_skip = 0;
        words_to_scan = cur.size;
    }

    if words_to_scan > 0 {
        pairs.push(SkipScan { skip: words_to_skip, scan: words_to_scan });
    }

    if let (Some(last_skip), Some(last_scan)) = (skip.last(), scan.last()) {
        let last_byte_skipped = last_skip.offset + last_skip.size;
        let last_byte_scanned = last_scan.offset + last_scan.size * word;

        if last_byte_skipped > last_byte_scanned {
            let total = last_byte_skipped.div_ceil(word);

            pairs.push(SkipScan {
                skip: total - last_byte_scanned / word,
                scan: 0,
            });
        }
    }

    // A 0xM0 followed by a 0x0N is merged into 0xMN.
    let mut i = 0;

    while i + 1 < pairs.len() {
        let (cur, next) = (pairs[i], pairs[i + 1]);

        if cur.skip > 0 && cur.scan == 0 && next.skip == 0 && next.scan > 0 {
            pairs[i].scan = next.scan;
            pairs.remove(i + 1);
        }

        i += 1;
    }

    let mut bitmap = Vec::new();

    for pair in pairs {
        let skip_small = (pair.skip % 0xf) as u8;
        let mut scan_small = (pair.scan % 0xf) as u8;
        let skip_big = pair.skip / 0xf;
        let mut scan_big = pair.scan / 0xf;

        for _ in 0..skip_big {
            bitmap.push(0xf0);
        }

        if skip_small > 0 {
            let mut byte = skip_small << 4;

            if scan_big > 0 {
                byte |= 0xf;
                scan_big -= 1;
            } else if scan_small > 0 {
                byte |= scan_small;
                scan_small = 0;
            }

            bitmap.push(byte);
        }

        for _ in 0..scan_big {
            bitmap.push(0x0f);
        }

        if scan_small > 0 {
            bitmap.push(scan_small);
        }
    }

    bitmap.push(0);
    bitmap
}

/// Returns the byte ranges a bitmap marks as scanned, merging adjacent
/// ranges.
pub fn scanned_ranges(bitmap: &[u8], word: u32) -> Vec<Range<u64>> {
    let word = word as u64;
    let mut ranges: Vec<Range<u64>> = Vec::new();
    let mut pos = 0;

    for &byte in bitmap.iter().take_while(|&&b| b != 0) {
        pos += (byte >> 4) as u64 * word;

        let end = pos + (byte & 0xf) as u64 * word;

        if end > pos {
            match ranges.last_mut() {
                Some(last) if last.end == pos => last.end = end,
                _ => ranges.push(pos..end),
            }
        }

        pos = end;
    }

    ranges
}

/// Formats the bytes of a bitmap as a comma separated list of hexadecimal
/// values.
pub fn format_bitmap(bitmap: &[u8]) -> String {
    let mut out = String::new();

    for &byte in bitmap {
        if byte & 0xf0 == 0 {
            let _ = write!(out, "0x0{:x}", byte);
        } else {
            let _ = write!(out, "0x{:x}", byte);
        }

        if byte != 0 {
            out.push_str(", ");
        }
    }

    out
}

/// Returns the human readable description of the ivar layout of a class.
pub fn describe_ivar_layout(
    class: &str,
    selection: Selection,
    bitmap: &[u8],
) -> String {
    format!(
        "\n{} ivar layout for class '{}': {}\n",
        selection.name(),
        class,
        format_bitmap(bitmap)
    )
}

/// Returns the human readable description of the layout of a block.
pub fn describe_block_layout(bitmap: &[u8]) -> String {
    format!("\n block variable layout for block: {}\n", format_bitmap(bitmap))
}
