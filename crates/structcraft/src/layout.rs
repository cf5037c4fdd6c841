//! Positional layout builder.
//!
//! [LayoutBuilder] collects `(kind, count)` descriptors and renders them to a compact layout
//! string. Consecutive fields of the same kind collapse into one descriptor, so adding four
//! `int32` fields one by one renders `4i`, exactly like adding them in a single call. Byte runs
//! never merge: every `bytes`/`pascal_bytes` call keeps its own length.

use tracing::trace;

use crate::{
    bits::MAX_SIZE,
    byte_order::ByteOrder,
    compiled::CompiledLayout,
    errors::{CompileError, LayoutError},
    field::{Descriptor, Kind},
};

macro_rules! scalar_methods {
    ($($(#[$doc:meta])* $name:ident => $kind:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, count: usize) -> Result<&mut Self, LayoutError> {
                self.add_scalar($kind, count)
            }
        )*
    };
}

/// Builds a positional binary layout one run of fields at a time.
///
/// Every method either applies fully or returns an error and leaves the builder unchanged.
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    order: ByteOrder,
    descriptors: Vec<Descriptor>,
    offset: usize,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    /// Sum of the run sizes added so far.
    ///
    /// Alignment padding is not included, so under native alignment this can trail the real
    /// offset of the next field.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<&mut Self, LayoutError> {
        self.order
            .ensure_transition(order, !self.descriptors.is_empty())?;

        if self.order != order {
            trace!(from = ?self.order, to = ?order, "byte order changed");
            self.order = order;
        }

        Ok(self)
    }

    /// Native byte order, sizes and alignment. This is the default.
    pub fn native_aligned(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::NativeAligned)
    }

    /// Native byte order with standard sizes and no alignment.
    pub fn native_endian(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::Native)
    }

    pub fn little_endian(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::Little)
    }

    pub fn big_endian(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::Big)
    }

    pub fn network_endian(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::Network)
    }

    /// Adds `count` fields of `kind`, merging into the previous run when it has the same kind.
    pub fn add_scalar(&mut self, kind: Kind, count: usize) -> Result<&mut Self, LayoutError> {
        if kind.is_native_only() && !self.order.is_aligned() {
            return Err(LayoutError::NativeOnlyKind {
                kind,
                order: self.order,
            });
        }

        if kind == Kind::PascalBytes && count == 0 {
            return Err(LayoutError::InvalidLength);
        }

        let invalid_count = LayoutError::InvalidCount { kind, count };
        let offset = kind
            .run_size(self.order, count)
            .and_then(|size| self.offset.checked_add(size))
            .filter(|offset| *offset <= MAX_SIZE)
            .ok_or(invalid_count.clone())?;

        let merged = match self.descriptors.last() {
            Some(last) if last.merges_with(kind) => {
                Some(last.count.checked_add(count).ok_or(invalid_count)?)
            }
            _ => None,
        };

        match merged {
            Some(total) => {
                if let Some(last) = self.descriptors.last_mut() {
                    last.count = total;
                }
            }
            None => self.descriptors.push(Descriptor::new(kind, count)),
        }
        self.offset = offset;

        trace!(kind = %kind, count, offset, "added fields");
        Ok(self)
    }

    /// Adds a fixed-length byte run.
    pub fn add_byte_run(&mut self, length: usize) -> Result<&mut Self, LayoutError> {
        self.add_scalar(Kind::Bytes, length)
    }

    /// Adds a byte run prefixed by its length byte, holding at most `max_length - 1` bytes.
    pub fn add_length_prefixed_byte_run(&mut self, max_length: usize) -> Result<&mut Self, LayoutError> {
        self.add_scalar(Kind::PascalBytes, max_length)
    }

    /// Adds `count` padding bytes.
    pub fn skip_bytes(&mut self, count: usize) -> Result<&mut Self, LayoutError> {
        self.add_scalar(Kind::Padding, count)
    }

    /// Pads up to `target`, which must not lie behind the current [offset](Self::offset).
    pub fn skip_to_offset(&mut self, target: usize) -> Result<&mut Self, LayoutError> {
        if target < self.offset {
            return Err(LayoutError::InvalidOffset {
                target,
                current: self.offset,
            });
        }

        self.skip_bytes(target - self.offset)
    }

    scalar_methods! {
        /// `bool` fields.
        bool => Kind::Bool;
        /// Single raw byte fields.
        byte => Kind::Char;
        int8 => Kind::Int8;
        uint8 => Kind::UInt8;
        int16 => Kind::Int16;
        uint16 => Kind::UInt16;
        int32 => Kind::Int32;
        uint32 => Kind::UInt32;
        int64 => Kind::Int64;
        uint64 => Kind::UInt64;
        /// C `long` fields: platform width when aligned, 4 bytes otherwise.
        long => Kind::Long;
        /// C `unsigned long` fields: platform width when aligned, 4 bytes otherwise.
        ulong => Kind::ULong;
        /// `ssize_t` fields, native alignment only.
        ssize_t => Kind::SSize;
        /// `size_t` fields, native alignment only.
        size_t => Kind::USize;
        /// IEEE 754 half precision fields.
        half_precision => Kind::Half;
        float => Kind::Float32;
        double => Kind::Float64;
        /// Pointer-sized integer fields, native alignment only.
        native_pointer => Kind::Pointer;
    }

    /// Same as [add_byte_run](Self::add_byte_run).
    pub fn bytes(&mut self, length: usize) -> Result<&mut Self, LayoutError> {
        self.add_byte_run(length)
    }

    /// Same as [add_length_prefixed_byte_run](Self::add_length_prefixed_byte_run).
    pub fn pascal_bytes(&mut self, max_length: usize) -> Result<&mut Self, LayoutError> {
        self.add_length_prefixed_byte_run(max_length)
    }

    /// Renders the compact layout string: the byte order prefix (none for native alignment)
    /// followed by each run as `<count><token>`, the count omitted when it is 1.
    pub fn render_layout(&self) -> String {
        let mut layout: String = self.order.prefix().into_iter().collect();
        for descriptor in &self.descriptors {
            layout.push_str(&descriptor.to_string());
        }
        layout
    }

    /// Compiles the rendered layout into a positional packer/unpacker.
    pub fn build(&self) -> Result<CompiledLayout, CompileError> {
        CompiledLayout::parse(&self.render_layout())
    }
}
