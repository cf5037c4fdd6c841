//! Error types for layout building, layout compilation, packing and unpacking.

use thiserror::Error;

use crate::{byte_order::ByteOrder, field::Kind, transform::TransformError};

/// Errors produced by [crate::layout::LayoutBuilder] and [crate::named::NamedLayoutBuilder].
///
/// A builder call that returns one of these leaves the builder unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The run's byte size or the running offset does not fit in `usize`.
    #[error("invalid count {count} for `{}` field", .kind.token())]
    InvalidCount { kind: Kind, count: usize },
    /// Switching to or from native alignment after fields were added.
    #[error("alignment can't be changed after adding fields ({current:?} -> {requested:?})")]
    InvalidTransition {
        current: ByteOrder,
        requested: ByteOrder,
    },
    /// Pascal byte run declared with a maximum length of zero.
    #[error("pascal byte run needs a max length of at least 1")]
    InvalidLength,
    /// `skip_to_offset` target lies behind the current offset.
    #[error("offset {target} is behind the current offset {current}")]
    InvalidOffset { target: usize, current: usize },
    /// Platform sized kind used outside native-aligned mode.
    #[error("`{}` is only available with native alignment, not {order:?}", .kind.token())]
    NativeOnlyKind { kind: Kind, order: ByteOrder },
}

/// Errors produced when compiling a layout string into a [crate::compiled::CompiledLayout].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Character at `position` is not a known type token.
    #[error("bad char {token:?} at position {position} in layout")]
    UnknownToken { token: char, position: usize },
    /// Layout ends with a repeat count that has no type token.
    #[error("repeat count without a type token at end of layout")]
    DanglingCount,
    /// Repeat count or total size does not fit in `usize`.
    #[error("layout size overflows")]
    SizeOverflow,
    /// Platform sized token used with a standard-size prefix.
    #[error("`{token}` is only available with native alignment")]
    NativeOnlyToken { token: char },
}

/// Errors produced while encoding values into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    /// Number of values differs from the number of value slots in the layout.
    #[error("expected {expected} values, got {found}")]
    ArityMismatch { expected: usize, found: usize },
    /// Value at `index` can't be encoded as `kind`.
    #[error("value {index} can't be packed as `{}`", .kind.token())]
    TypeMismatch { index: usize, kind: Kind },
    /// Value at `index` doesn't fit the width of `kind`.
    #[error("value {index} is out of range for `{}`", .kind.token())]
    OutOfRange { index: usize, kind: Kind },
    /// Target buffer can't hold the record at the requested offset.
    #[error("buffer of {available} bytes is too small, {required} bytes needed at offset {offset}")]
    BufferTooSmall {
        required: usize,
        available: usize,
        offset: usize,
    },
}

/// Errors produced while decoding bytes into values or records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnpackError {
    /// Buffer length differs from the layout size.
    #[error("unpack requires a buffer of {expected} bytes, got {found}")]
    SizeMismatch { expected: usize, found: usize },
    /// Not enough bytes left after `offset`.
    #[error("buffer of {available} bytes is too small, {required} bytes needed at offset {offset}")]
    BufferTooSmall {
        required: usize,
        available: usize,
        offset: usize,
    },
    /// Buffer length is not a multiple of the record size.
    #[error("iterative unpacking requires a multiple of {size} bytes, got {found}")]
    NotMultiple { size: usize, found: usize },
    /// Iterating a zero-sized layout would never advance.
    #[error("can't iteratively unpack a layout of size 0")]
    ZeroSized,
    /// A mapper rejected the raw value of `field`.
    #[error("mapper for field `{field}` failed: {source}")]
    Mapper {
        field: String,
        #[source]
        source: TransformError,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Errors produced by [crate::record::RecordType].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record `{name}` has {expected} fields, got {found} values")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Any error this crate can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error(transparent)]
    Unpack(#[from] UnpackError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Transform(#[from] TransformError),
}
