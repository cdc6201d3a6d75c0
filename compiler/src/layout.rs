//! Memory layouts of objects and blocks, as consumed by the collector and the
//! reference counting runtime.
//!
//! The analysis is split in two parts: `gc` produces the skip/scan bitmaps
//! used for conservative scanning of ivars and block captures, while `rc`
//! produces the run/skip instructions describing the ownership of captured
//! block variables. Both operate on resolved declarations only and don't
//! depend on LLVM.
pub mod gc;
pub mod rc;

use types::Type;

/// A variable captured by a block.
#[derive(Clone, Debug)]
pub struct Capture {
    /// The offset in bytes of the capture in the block literal.
    pub offset: u64,
    pub typ: Type,

    /// If the variable is a `__block` variable, captured by reference.
    pub byref: bool,

    /// If the value is a constant that isn't stored in the block literal.
    pub constant: bool,
}

impl Capture {
    pub fn new(offset: u64, typ: Type) -> Capture {
        Capture { offset, typ, byref: false, constant: false }
    }

    pub fn byref(offset: u64, typ: Type) -> Capture {
        Capture { offset, typ, byref: true, constant: false }
    }

    pub fn constant(offset: u64, typ: Type) -> Capture {
        Capture { offset, typ, byref: false, constant: true }
    }
}

/// The captures of a block literal.
#[derive(Clone, Debug, Default)]
pub struct BlockInfo {
    pub captures: Vec<Capture>,

    /// Padding between the block header and the first capture, as an offset
    /// and size in bytes.
    pub header_gap: Option<(u64, u64)>,
}

impl BlockInfo {
    pub fn new(captures: Vec<Capture>) -> BlockInfo {
        BlockInfo { captures, header_gap: None }
    }
}
