//! Run/skip layouts of block captures and `__block` variables.
//!
//! Each byte of a layout contains an opcode in the upper nibble and the
//! number of units (minus one) in the lower nibble. Small layouts consisting
//! only of strong, byref and weak runs are encoded inline as a single integer
//! of the form `0xSBW`.
use crate::layout::BlockInfo;
use std::fmt::Write as _;
use tracing::trace;
use types::{Database, Field, Ownership, RecordId, Type, TypeKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Terminates the layout.
    Operator = 0,
    NonObjectBytes = 1,
    NonObjectWords = 2,
    Strong = 3,
    Byref = 4,
    Weak = 5,
    Unretained = 6,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Opcode> {
        match value {
            0 => Some(Opcode::Operator),
            1 => Some(Opcode::NonObjectBytes),
            2 => Some(Opcode::NonObjectWords),
            3 => Some(Opcode::Strong),
            4 => Some(Opcode::Byref),
            5 => Some(Opcode::Weak),
            6 => Some(Opcode::Unretained),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Opcode::Operator => "BL_OPERATOR",
            Opcode::NonObjectBytes => "BL_NON_OBJECT_BYTES",
            Opcode::NonObjectWords => "BL_NON_OBJECT_WORD",
            Opcode::Strong => "BL_STRONG",
            Opcode::Byref => "BL_BYREF",
            Opcode::Weak => "BL_WEAK",
            Opcode::Unretained => "BL_UNRETAINED",
        }
    }

    fn instruction(self, value: u8) -> u8 {
        ((self as u8) << 4) | value
    }
}

/// A run of bytes in a block with the same opcode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RunSkip {
    pub(crate) opcode: Opcode,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl RunSkip {
    fn new(opcode: Opcode, offset: u64, size: u64) -> RunSkip {
        RunSkip { opcode, offset, size }
    }
}

/// A computed run/skip layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RcLayout {
    /// The layout fits in a single word.
    Inline(u64),

    /// The layout bytes, including the terminating operator.
    Bytes(Vec<u8>),
}

struct Builder<'a> {
    db: &'a Database,
    word: u64,
    arc: bool,
    entries: Vec<RunSkip>,
    has_union: bool,
}

impl<'a> Builder<'a> {
    fn new(db: &'a Database, word: u32, arc: bool) -> Builder<'a> {
        Builder {
            db,
            word: word as u64,
            arc,
            entries: Vec::new(),
            has_union: false,
        }
    }

    /// Returns the ownership of a captured value for the purpose of
    /// computing its layout.
    fn lifetime(&self, typ: &Type, byref_layout: bool) -> Ownership {
        if self.arc {
            return typ.ownership;
        }

        if typ.is_retainable() {
            if byref_layout {
                Ownership::ExplicitNone
            } else {
                Ownership::Strong
            }
        } else {
            Ownership::None
        }
    }

    fn update(
        &mut self,
        byref: bool,
        lifetime: Ownership,
        offset: u64,
        size: u64,
    ) {
        let opcode = if byref {
            Opcode::Byref
        } else {
            match lifetime {
                Ownership::Strong => Opcode::Strong,
                Ownership::Weak => Opcode::Weak,
                Ownership::ExplicitNone => Opcode::Unretained,
                Ownership::None | Ownership::Autoreleasing => {
                    Opcode::NonObjectBytes
                }
            }
        };

        self.entries.push(RunSkip::new(opcode, offset, size));
    }

    fn record(&mut self, id: RecordId, byte_pos: u64, byref_layout: bool) {
        let db = self.db;

        self.aggregate(id.fields(db), id.is_union(db), byte_pos, byref_layout);
    }

    fn aggregate(
        &mut self,
        fields: &[Field],
        is_union: bool,
        byte_pos: u64,
        byref_layout: bool,
    ) {
        let db = self.db;
        let mut max_size = 0;
        let mut max_field: Option<&Field> = None;
        let mut last_unnamed_or_bitfield: Option<&Field> = None;

        for field in fields {
            if field.name.is_none() || field.is_bitfield() {
                last_unnamed_or_bitfield = Some(field);
                continue;
            }

            last_unnamed_or_bitfield = None;

            if let TypeKind::Record(id) = field.typ.kind {
                if id.is_union(db) {
                    self.has_union = true;
                }

                self.record(id, byte_pos + field.offset, false);
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
                    self.record_array(*id, byte_pos + field.offset, count);
                    continue;
                }
            }

            let size = field.typ.size(db, self.word as u32);

            if is_union {
                if size > max_size {
                    max_size = size;
                    max_field = Some(field);
                }
            } else {
                let lifetime = self.lifetime(typ, byref_layout);

                self.update(false, lifetime, byte_pos + field.offset, size);
            }
        }

        if let Some(field) = last_unnamed_or_bitfield {
            let lifetime = self.lifetime(&field.typ, byref_layout);

            // The size of a trailing bitfield includes its offset.
            let size = if let Some(bits) = field.bit_width {
                (bits as u64).div_ceil(8) + field.offset
            } else {
                field.typ.size(db, self.word as u32)
            };

            self.update(false, lifetime, byte_pos + field.offset, size);
        }

        if let Some(field) = max_field {
            let lifetime = self.lifetime(&field.typ, byref_layout);

            self.update(false, lifetime, byte_pos + field.offset, max_size);
        }
    }

    fn record_array(&mut self, id: RecordId, byte_pos: u64, count: u64) {
        let old = self.entries.len();

        self.record(id, byte_pos, false);

        let new = self.entries.len();
        let size = id.size(self.db);

        for index in 1..count {
            for i in old..new {
                let entry = self.entries[i];
                let offset = entry.offset + size * index;

                let copy = RunSkip::new(entry.opcode, offset, entry.size);

                self.entries.push(copy);
            }
        }
    }

    fn finish(self) -> Option<RcLayout> {
        trace!(
            entries = self.entries.len(),
            union = self.has_union,
            "computed run/skip entries"
        );

        bitmap_layout(self.entries, self.word)
    }
}

/// Builds the run/skip layout of the captures of a block.
///
/// A `None` is returned if the block doesn't capture anything that needs to
/// be described.
pub fn block_layout(
    db: &Database,
    block: &BlockInfo,
    word: u32,
    arc: bool,
) -> Option<RcLayout> {
    let mut builder = Builder::new(db, word, arc);

    if let Some((offset, size)) = block.header_gap {
        if size > 0 {
            builder.update(false, Ownership::None, offset, size);
        }
    }

    for capture in &block.captures {
        if capture.constant {
            continue;
        }

        if let TypeKind::Record(id) = capture.typ.kind {
            if !capture.byref {
                builder.record(id, capture.offset, false);
                continue;
            }
        }

        let size = if capture.byref {
            word as u64
        } else {
            capture.typ.size(db, word)
        };
        let lifetime = builder.lifetime(&capture.typ, false);

        builder.update(capture.byref, lifetime, capture.offset, size);
    }

    builder.finish()
}

/// Builds the run/skip layout of a `__block` variable of the given type.
///
/// Only records have a layout, for all other types `None` is returned.
pub fn byref_layout(
    db: &Database,
    typ: &Type,
    word: u32,
    arc: bool,
) -> Option<RcLayout> {
    let TypeKind::Record(id) = typ.kind else { return None };
    let mut builder = Builder::new(db, word, arc);

    builder.record(id, 0, true);
    builder.finish()
}

/// Encodes run/skip entries into a layout.
pub(crate) fn bitmap_layout(
    mut entries: Vec<RunSkip>,
    word: u64,
) -> Option<RcLayout> {
    if entries.is_empty() {
        return None;
    }

    // Captures aren't necessarily allocated in order.
    entries.sort_by_key(|e| e.offset);

    let mut layout = Vec::new();
    let mut i = 0;

    while i < entries.len() {
        let start = entries[i];
        let mut j = i + 1;

        while j < entries.len() && entries[j].opcode == start.opcode {
            j += 1;
        }

        let last = entries[j - 1];

        // A run extends up to the start of the next run.
        let mut size = match entries.get(j) {
            Some(next) => next.offset - start.offset,
            None => last.offset - start.offset + last.size,
        };
        let mut opcode = start.opcode;
        let mut residue = 0;

        if opcode == Opcode::NonObjectBytes {
            residue = size % word;
            size -= residue;
            opcode = Opcode::NonObjectWords;
        }

        let mut words = size / word;

        // The value of an instruction is one less than the actual value.
        while words >= 16 {
            layout.push(opcode.instruction(0xf));
            words -= 16;
        }

        if words > 0 {
            layout.push(opcode.instruction(words as u8 - 1));
        }

        if residue > 0 {
            layout.push(Opcode::NonObjectBytes.instruction(residue as u8 - 1));
        }

        i = j;
    }

    while let Some(&inst) = layout.last() {
        match Opcode::from_u8(inst >> 4) {
            Some(Opcode::NonObjectBytes | Opcode::NonObjectWords) => {
                layout.pop();
            }
            _ => break,
        }
    }

    let inline = inline_instruction(&layout);

    if inline != 0 {
        return Some(RcLayout::Inline(inline));
    }

    layout.push(Opcode::Operator.instruction(0));
    Some(RcLayout::Bytes(layout))
}

/// Returns the inline form of a layout, or 0 if the layout can't be inlined.
///
/// A layout can be inlined if it consists of at most one strong, one byref
/// and one weak run (in that order), each covering at most 15 words.
pub fn inline_instruction(layout: &[u8]) -> u64 {
    if layout.is_empty() || layout.len() > 3 {
        return 0;
    }

    let mut counts = [0_u64; 3];
    let mut last = None;

    for &inst in layout {
        let slot = match Opcode::from_u8(inst >> 4) {
            Some(Opcode::Strong) => 0,
            Some(Opcode::Byref) => 1,
            Some(Opcode::Weak) => 2,
            _ => return 0,
        };

        if last.map_or(false, |prev| slot <= prev) {
            return 0;
        }

        last = Some(slot);
        counts[slot] = (inst & 0xf) as u64 + 1;
    }

    if counts.contains(&16) {
        return 0;
    }

    (counts[0] << 8) | (counts[1] << 4) | counts[2]
}

/// Returns the human readable description of a layout.
pub fn describe_layout(layout: &RcLayout, byref: bool) -> String {
    let kind = if byref { "BYREF" } else { "block" };

    match layout {
        RcLayout::Inline(value) => format!(
            "\n Inline instruction for {} variable layout: 0x0{:x}\n",
            kind, value
        ),
        RcLayout::Bytes(bytes) => {
            let mut out = format!("\n {} variable layout: ", kind);

            for (index, &inst) in bytes.iter().enumerate() {
                let (label, delta) = match Opcode::from_u8(inst >> 4) {
                    Some(Opcode::Operator) => (Opcode::Operator.label(), 0),
                    Some(op) => (op.label(), 1),
                    None => ("BL_UNKNOWN", 1),
                };

                let _ = write!(out, "{}:{}", label, (inst & 0xf) + delta);

                out.push_str(if index + 1 < bytes.len() { ", " } else { "\n" });
            }

            out
        }
    }
}
