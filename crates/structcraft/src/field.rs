//! Field kinds and the positional descriptors a layout is made of.

use std::{
    ffi::{c_long, c_ulong, c_void},
    fmt,
    mem::{align_of, size_of},
};

use crate::byte_order::ByteOrder;

/// Type of one field slot in a binary layout, with its layout token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `?`: C `bool`.
    Bool,
    /// `c`: single raw byte.
    Char,
    /// `b`: signed char.
    Int8,
    /// `B`: unsigned char.
    UInt8,
    /// `h`: short.
    Int16,
    /// `H`: unsigned short.
    UInt16,
    /// `i`: int.
    Int32,
    /// `I`: unsigned int.
    UInt32,
    /// `q`: long long.
    Int64,
    /// `Q`: unsigned long long.
    UInt64,
    /// `l`: C `long`; platform width when aligned, 4 bytes otherwise.
    Long,
    /// `L`: C `unsigned long`; platform width when aligned, 4 bytes otherwise.
    ULong,
    /// `n`: `ssize_t`, native-aligned only.
    SSize,
    /// `N`: `size_t`, native-aligned only.
    USize,
    /// `e`: IEEE 754 half precision.
    Half,
    /// `f`: IEEE 754 single precision.
    Float32,
    /// `d`: IEEE 754 double precision.
    Float64,
    /// `s`: fixed-length byte run; the descriptor count is its length.
    Bytes,
    /// `p`: length-prefixed byte run; the descriptor count is its maximum length.
    PascalBytes,
    /// `P`: pointer-sized integer, native-aligned only.
    Pointer,
    /// `x`: padding byte, produces no value.
    Padding,
}

impl Kind {
    /// All kinds, in token-table order.
    pub const ALL: [Kind; 21] = [
        Kind::Bool,
        Kind::Char,
        Kind::Int8,
        Kind::UInt8,
        Kind::Int16,
        Kind::UInt16,
        Kind::Int32,
        Kind::UInt32,
        Kind::Int64,
        Kind::UInt64,
        Kind::Long,
        Kind::ULong,
        Kind::SSize,
        Kind::USize,
        Kind::Half,
        Kind::Float32,
        Kind::Float64,
        Kind::Bytes,
        Kind::PascalBytes,
        Kind::Pointer,
        Kind::Padding,
    ];

    pub fn token(self) -> char {
        match self {
            Kind::Bool => '?',
            Kind::Char => 'c',
            Kind::Int8 => 'b',
            Kind::UInt8 => 'B',
            Kind::Int16 => 'h',
            Kind::UInt16 => 'H',
            Kind::Int32 => 'i',
            Kind::UInt32 => 'I',
            Kind::Int64 => 'q',
            Kind::UInt64 => 'Q',
            Kind::Long => 'l',
            Kind::ULong => 'L',
            Kind::SSize => 'n',
            Kind::USize => 'N',
            Kind::Half => 'e',
            Kind::Float32 => 'f',
            Kind::Float64 => 'd',
            Kind::Bytes => 's',
            Kind::PascalBytes => 'p',
            Kind::Pointer => 'P',
            Kind::Padding => 'x',
        }
    }

    pub fn from_token(token: char) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.token() == token)
    }

    /// Byte runs are sized by their count and never merge with a neighbour.
    pub fn is_byte_run(self) -> bool {
        matches!(self, Kind::Bytes | Kind::PascalBytes)
    }

    /// Kinds without a standard size.
    pub fn is_native_only(self) -> bool {
        matches!(self, Kind::SSize | Kind::USize | Kind::Pointer)
    }

    /// Signedness of integer kinds, `None` for everything else.
    pub fn int_signed(self) -> Option<bool> {
        match self {
            Kind::Int8 | Kind::Int16 | Kind::Int32 | Kind::Int64 | Kind::Long | Kind::SSize => {
                Some(true)
            }
            Kind::UInt8
            | Kind::UInt16
            | Kind::UInt32
            | Kind::UInt64
            | Kind::ULong
            | Kind::USize
            | Kind::Pointer => Some(false),
            _ => None,
        }
    }

    /// Number of values a run of `count` of this kind produces.
    pub fn value_slots(self, count: usize) -> usize {
        match self {
            Kind::Padding => 0,
            Kind::Bytes | Kind::PascalBytes => 1,
            _ => count,
        }
    }

    /// Bytes per count unit under `order`, or `None` if the kind has no size there.
    pub fn width(self, order: ByteOrder) -> Option<usize> {
        if order.is_aligned() {
            return Some(self.native_width());
        }

        match self {
            Kind::SSize | Kind::USize | Kind::Pointer => None,
            Kind::Bool
            | Kind::Char
            | Kind::Int8
            | Kind::UInt8
            | Kind::Bytes
            | Kind::PascalBytes
            | Kind::Padding => Some(1),
            Kind::Int16 | Kind::UInt16 | Kind::Half => Some(2),
            Kind::Int32 | Kind::UInt32 | Kind::Long | Kind::ULong | Kind::Float32 => Some(4),
            Kind::Int64 | Kind::UInt64 | Kind::Float64 => Some(8),
        }
    }

    /// Alignment of one element under `order`. Packed modes never align.
    pub fn alignment(self, order: ByteOrder) -> usize {
        if !order.is_aligned() {
            return 1;
        }

        match self {
            Kind::Bool => align_of::<bool>(),
            Kind::Int16 | Kind::UInt16 | Kind::Half => align_of::<i16>(),
            Kind::Int32 | Kind::UInt32 => align_of::<i32>(),
            Kind::Int64 | Kind::UInt64 => align_of::<i64>(),
            Kind::Long => align_of::<c_long>(),
            Kind::ULong => align_of::<c_ulong>(),
            Kind::SSize => align_of::<isize>(),
            Kind::USize => align_of::<usize>(),
            Kind::Float32 => align_of::<f32>(),
            Kind::Float64 => align_of::<f64>(),
            Kind::Pointer => align_of::<*const c_void>(),
            Kind::Char | Kind::Int8 | Kind::UInt8 | Kind::Bytes | Kind::PascalBytes | Kind::Padding => 1,
        }
    }

    /// Byte size of a run of `count` elements, `None` on overflow or missing width.
    pub fn run_size(self, order: ByteOrder, count: usize) -> Option<usize> {
        self.width(order)?.checked_mul(count)
    }

    fn native_width(self) -> usize {
        match self {
            Kind::Bool => size_of::<bool>(),
            Kind::Long => size_of::<c_long>(),
            Kind::ULong => size_of::<c_ulong>(),
            Kind::SSize => size_of::<isize>(),
            Kind::USize => size_of::<usize>(),
            Kind::Pointer => size_of::<*const c_void>(),
            Kind::Char | Kind::Int8 | Kind::UInt8 | Kind::Bytes | Kind::PascalBytes | Kind::Padding => 1,
            Kind::Int16 | Kind::UInt16 | Kind::Half => 2,
            Kind::Int32 | Kind::UInt32 | Kind::Float32 => 4,
            Kind::Int64 | Kind::UInt64 | Kind::Float64 => 8,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// One run of identically typed fields: `count` repetitions of `kind`.
///
/// For byte runs the count is the run length in bytes, for padding the number of bytes skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub kind: Kind,
    pub count: usize,
}

impl Descriptor {
    pub fn new(kind: Kind, count: usize) -> Self {
        Descriptor { kind, count }
    }

    /// Whether `kind` can be folded into this descriptor instead of starting a new one.
    pub fn merges_with(&self, kind: Kind) -> bool {
        self.kind == kind && !kind.is_byte_run()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{}", self.kind.token())
        } else {
            write!(f, "{}{}", self.count, self.kind.token())
        }
    }
}
