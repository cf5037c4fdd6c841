//! Compiled layouts: the pack/unpack engine behind every record.
//!
//! A [CompiledLayout] is parsed once from a layout string (`"<2hi5s"`, `"?csd"`, ...) and then
//! reused to encode and decode any number of buffers. Offsets and alignment padding are resolved at
//! compile time, so packing and unpacking only walk a flat list of items.

use std::slice::ChunksExact;

use tracing::debug;

use crate::{
    bits::{MAX_SIZE, align_up, f16_to_f64, f64_to_f16, fits_signed, fits_unsigned},
    byte_order::{ByteOrder, Endian},
    errors::{CompileError, PackError, UnpackError},
    field::Kind,
    value::Value,
};

/// One run of a compiled layout with its resolved byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledItem {
    pub kind: Kind,
    pub count: usize,
    /// Byte offset of the first element, alignment padding already applied.
    pub offset: usize,
    /// Bytes per element (per byte for byte runs and padding).
    pub width: usize,
}

/// A layout string compiled into fixed offsets, ready to pack and unpack.
#[derive(Debug, Clone)]
pub struct CompiledLayout {
    format: String,
    order: ByteOrder,
    items: Vec<CompiledItem>,
    size: usize,
    value_count: usize,
}

impl CompiledLayout {
    /// Compiles a layout string. Fails on unknown tokens, dangling counts, platform tokens
    /// outside native alignment, or sizes that overflow.
    pub fn parse(format: &str) -> Result<Self, CompileError> {
        let mut chars = format.char_indices().peekable();
        let mut order = ByteOrder::NativeAligned;

        if let Some(prefix) = chars.peek().and_then(|(_, c)| ByteOrder::from_prefix(*c)) {
            order = prefix;
            chars.next();
        }

        let mut items = Vec::new();
        let mut size = 0usize;
        let mut value_count = 0usize;
        let mut pending: Option<usize> = None;

        for (position, c) in chars {
            if c.is_whitespace() {
                if pending.is_some() {
                    return Err(CompileError::DanglingCount);
                }
                continue;
            }

            if let Some(digit) = c.to_digit(10) {
                let count = pending
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|count| count.checked_add(digit as usize))
                    .ok_or(CompileError::SizeOverflow)?;
                pending = Some(count);
                continue;
            }

            let kind = Kind::from_token(c).ok_or(CompileError::UnknownToken { token: c, position })?;
            let width = kind
                .width(order)
                .ok_or(CompileError::NativeOnlyToken { token: c })?;
            let count = pending.take().unwrap_or(1);

            let offset = align_up(size, kind.alignment(order)).ok_or(CompileError::SizeOverflow)?;
            size = width
                .checked_mul(count)
                .and_then(|run| offset.checked_add(run))
                .filter(|size| *size <= MAX_SIZE)
                .ok_or(CompileError::SizeOverflow)?;
            value_count += kind.value_slots(count);

            items.push(CompiledItem {
                kind,
                count,
                offset,
                width,
            });
        }

        if pending.is_some() {
            return Err(CompileError::DanglingCount);
        }

        debug!(layout = format, size, value_count, "compiled layout");

        Ok(CompiledLayout {
            format: format.to_string(),
            order,
            items,
            size,
            value_count,
        })
    }

    /// The layout string this was compiled from.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn items(&self) -> &[CompiledItem] {
        &self.items
    }

    /// Total byte size of one packed record.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of values one record packs from and unpacks to.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Encodes `values` in layout order into a new buffer of [size](Self::size) bytes.
    pub fn pack(&self, values: &[Value]) -> Result<Vec<u8>, PackError> {
        let mut buf = vec![0u8; self.size];
        self.write(&mut buf, values)?;
        Ok(buf)
    }

    /// Encodes `values` into `buf` starting at `offset`. `buf` is untouched on error.
    pub fn pack_into(&self, buf: &mut [u8], offset: usize, values: &[Value]) -> Result<(), PackError> {
        let end = offset
            .checked_add(self.size)
            .filter(|end| *end <= buf.len())
            .ok_or(PackError::BufferTooSmall {
                required: self.size,
                available: buf.len(),
                offset,
            })?;

        let packed = self.pack(values)?;
        buf[offset..end].copy_from_slice(&packed);
        Ok(())
    }

    /// Decodes a buffer of exactly [size](Self::size) bytes.
    pub fn unpack(&self, buf: &[u8]) -> Result<Vec<Value>, UnpackError> {
        if buf.len() != self.size {
            return Err(UnpackError::SizeMismatch {
                expected: self.size,
                found: buf.len(),
            });
        }

        Ok(self.read(buf))
    }

    /// Decodes one record starting at `offset`; trailing bytes are ignored.
    pub fn unpack_from(&self, buf: &[u8], offset: usize) -> Result<Vec<Value>, UnpackError> {
        let end = offset
            .checked_add(self.size)
            .filter(|end| *end <= buf.len())
            .ok_or(UnpackError::BufferTooSmall {
                required: self.size,
                available: buf.len(),
                offset,
            })?;

        Ok(self.read(&buf[offset..end]))
    }

    /// Decodes consecutive records from a buffer whose length is a multiple of the size.
    pub fn iter_unpack<'a>(&'a self, buf: &'a [u8]) -> Result<IterUnpack<'a>, UnpackError> {
        if self.size == 0 {
            return Err(UnpackError::ZeroSized);
        }

        if buf.len() % self.size != 0 {
            return Err(UnpackError::NotMultiple {
                size: self.size,
                found: buf.len(),
            });
        }

        Ok(IterUnpack {
            layout: self,
            chunks: buf.chunks_exact(self.size),
        })
    }

    fn write(&self, out: &mut [u8], values: &[Value]) -> Result<(), PackError> {
        if values.len() != self.value_count {
            return Err(PackError::ArityMismatch {
                expected: self.value_count,
                found: values.len(),
            });
        }

        let endian = self.order.endian();
        let mut index = 0;

        for item in &self.items {
            match item.kind {
                Kind::Padding => {}
                Kind::Bytes => {
                    let data = expect_bytes(&values[index], index, item.kind)?;
                    let n = data.len().min(item.count);
                    out[item.offset..item.offset + n].copy_from_slice(&data[..n]);
                    index += 1;
                }
                Kind::PascalBytes => {
                    let data = expect_bytes(&values[index], index, item.kind)?;
                    if item.count > 0 {
                        let n = data.len().min(item.count - 1);
                        out[item.offset] = n.min(255) as u8;
                        out[item.offset + 1..item.offset + 1 + n].copy_from_slice(&data[..n]);
                    }
                    index += 1;
                }
                kind => {
                    for i in 0..item.count {
                        let at = item.offset + i * item.width;
                        encode_scalar(
                            kind,
                            endian,
                            &values[index],
                            index,
                            &mut out[at..at + item.width],
                        )?;
                        index += 1;
                    }
                }
            }
        }

        Ok(())
    }

    /// `data` must be exactly `self.size` bytes long.
    fn read(&self, data: &[u8]) -> Vec<Value> {
        let endian = self.order.endian();
        let mut values = Vec::with_capacity(self.value_count);

        for item in &self.items {
            match item.kind {
                Kind::Padding => {}
                Kind::Bytes => {
                    values.push(Value::Bytes(
                        data[item.offset..item.offset + item.count].to_vec(),
                    ));
                }
                Kind::PascalBytes => {
                    if item.count == 0 {
                        values.push(Value::Bytes(Vec::new()));
                        continue;
                    }
                    let n = (data[item.offset] as usize).min(item.count - 1);
                    let start = item.offset + 1;
                    values.push(Value::Bytes(data[start..start + n].to_vec()));
                }
                kind => {
                    for i in 0..item.count {
                        let at = item.offset + i * item.width;
                        values.push(decode_scalar(kind, endian, &data[at..at + item.width]));
                    }
                }
            }
        }

        values
    }
}

/// Iterator over the records of a buffer, see [CompiledLayout::iter_unpack].
///
/// A clone continues from the same position; call `iter_unpack` again to start over.
#[derive(Debug, Clone)]
pub struct IterUnpack<'a> {
    layout: &'a CompiledLayout,
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for IterUnpack<'_> {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.chunks.next().map(|chunk| self.layout.read(chunk))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for IterUnpack<'_> {}

fn expect_bytes(value: &Value, index: usize, kind: Kind) -> Result<&[u8], PackError> {
    match value {
        Value::Bytes(data) => Ok(data),
        _ => Err(PackError::TypeMismatch { index, kind }),
    }
}

fn encode_scalar(
    kind: Kind,
    endian: Endian,
    value: &Value,
    index: usize,
    out: &mut [u8],
) -> Result<(), PackError> {
    let mismatch = PackError::TypeMismatch { index, kind };
    let out_of_range = PackError::OutOfRange { index, kind };
    let width = out.len();

    match kind {
        Kind::Bool => match value {
            Value::Bool(v) => out[0] = *v as u8,
            _ => return Err(mismatch),
        },
        Kind::Char => match value {
            Value::Char(v) => out[0] = *v,
            Value::Bytes(v) if v.len() == 1 => out[0] = v[0],
            _ => return Err(mismatch),
        },
        Kind::Half => {
            let v = float_input(value).ok_or(mismatch)?;
            let bits = f64_to_f16(v).ok_or(out_of_range)?;
            endian.write_u16(out, bits);
        }
        Kind::Float32 => {
            let v = float_input(value).ok_or(mismatch)?;
            let narrowed = v as f32;
            if v.is_finite() && narrowed.is_infinite() {
                return Err(out_of_range);
            }
            endian.write_f32(out, narrowed);
        }
        Kind::Float64 => {
            let v = float_input(value).ok_or(mismatch)?;
            endian.write_f64(out, v);
        }
        _ => match kind.int_signed() {
            Some(true) => {
                let v = match value {
                    Value::Int(v) => *v,
                    Value::UInt(v) => i64::try_from(*v).map_err(|_| out_of_range.clone())?,
                    _ => return Err(mismatch),
                };
                if !fits_signed(v, width) {
                    return Err(out_of_range);
                }
                endian.write_int(out, v, width);
            }
            Some(false) => {
                let v = match value {
                    Value::UInt(v) => *v,
                    Value::Int(v) => u64::try_from(*v).map_err(|_| out_of_range.clone())?,
                    _ => return Err(mismatch),
                };
                if !fits_unsigned(v, width) {
                    return Err(out_of_range);
                }
                endian.write_uint(out, v, width);
            }
            None => return Err(mismatch),
        },
    }

    Ok(())
}

fn float_input(value: &Value) -> Option<f64> {
    match value {
        Value::Float(_) | Value::Int(_) | Value::UInt(_) => value.as_f64(),
        _ => None,
    }
}

fn decode_scalar(kind: Kind, endian: Endian, data: &[u8]) -> Value {
    match kind {
        Kind::Bool => Value::Bool(data[0] != 0),
        Kind::Char => Value::Char(data[0]),
        Kind::Half => Value::Float(f16_to_f64(endian.read_u16(data))),
        Kind::Float32 => Value::Float(endian.read_f32(data).into()),
        Kind::Float64 => Value::Float(endian.read_f64(data)),
        _ if kind.int_signed() == Some(true) => Value::Int(endian.read_int(data, data.len())),
        _ => Value::UInt(endian.read_uint(data, data.len())),
    }
}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::*;

    #[test]
    fn test_parse_standard_sizes() {
        let layout = CompiledLayout::parse("<?cbBhHiIlLqQefd").unwrap();
        assert_eq!(layout.byte_order(), ByteOrder::Little);
        assert_eq!(layout.size(), 1 + 1 + 1 + 1 + 2 + 2 + 4 + 4 + 4 + 4 + 8 + 8 + 2 + 4 + 8);
        assert_eq!(layout.value_count(), 15);
    }

    #[test]
    fn test_parse_counts_and_runs() {
        let layout = CompiledLayout::parse("!3h5s2x4p").unwrap();
        assert_eq!(layout.size(), 6 + 5 + 2 + 4);
        assert_eq!(layout.value_count(), 3 + 1 + 1);
        assert_eq!(
            layout.items()[1],
            CompiledItem {
                kind: Kind::Bytes,
                count: 5,
                offset: 6,
                width: 1
            }
        );
    }

    #[test]
    fn test_parse_native_alignment() {
        let layout = CompiledLayout::parse("bi").unwrap();
        assert_eq!(layout.items()[1].offset, 4);
        assert_eq!(layout.size(), 8);

        let layout = CompiledLayout::parse("=bi").unwrap();
        assert_eq!(layout.items()[1].offset, 1);
        assert_eq!(layout.size(), 5);
    }

    #[test]
    fn test_parse_native_only_tokens() {
        let layout = CompiledLayout::parse("nNP").unwrap();
        assert_eq!(layout.size(), 3 * size_of::<usize>());
        assert_eq!(
            CompiledLayout::parse("<P").unwrap_err(),
            CompileError::NativeOnlyToken { token: 'P' }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            CompiledLayout::parse("<iz").unwrap_err(),
            CompileError::UnknownToken {
                token: 'z',
                position: 2
            }
        );
        assert_eq!(
            CompiledLayout::parse("i4").unwrap_err(),
            CompileError::DanglingCount
        );
        assert_eq!(
            CompiledLayout::parse("4 i").unwrap_err(),
            CompileError::DanglingCount
        );
        assert_eq!(
            CompiledLayout::parse("<99999999999999999999999i").unwrap_err(),
            CompileError::SizeOverflow
        );
        assert!(CompiledLayout::parse("<i<").is_err());
    }

    #[test]
    fn test_parse_rejects_unallocatable_size() {
        assert_eq!(
            CompiledLayout::parse(&format!("<{}x", usize::MAX)).unwrap_err(),
            CompileError::SizeOverflow
        );
        assert_eq!(
            CompiledLayout::parse(&format!("<b{}s", MAX_SIZE)).unwrap_err(),
            CompileError::SizeOverflow
        );

        let largest = CompiledLayout::parse(&format!("<{}x", MAX_SIZE)).unwrap();
        assert_eq!(largest.size(), MAX_SIZE);
    }

    #[test]
    fn test_parse_ignores_whitespace() {
        let layout = CompiledLayout::parse("< 2i h").unwrap();
        assert_eq!(layout.size(), 10);
    }

    #[test]
    fn test_pack_little_endian() {
        let layout = CompiledLayout::parse("<2i").unwrap();
        let packed = layout
            .pack(&[Value::Int(0x1234), Value::Int(0x4321)])
            .unwrap();
        assert_eq!(packed, vec![0x34, 0x12, 0x00, 0x00, 0x21, 0x43, 0x00, 0x00]);
    }

    #[test]
    fn test_pack_big_endian_mixed() {
        let layout = CompiledLayout::parse(">?cHxq").unwrap();
        let packed = layout
            .pack(&[
                Value::Bool(true),
                Value::Char(b'z'),
                Value::UInt(0x0102),
                Value::Int(-2),
            ])
            .unwrap();
        assert_eq!(
            packed,
            vec![1, b'z', 0x01, 0x02, 0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]
        );
    }

    #[test]
    fn test_unpack_values() {
        let layout = CompiledLayout::parse(">?cHxq").unwrap();
        let data = [2, b'z', 0x01, 0x02, 9, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe];
        assert_eq!(
            layout.unpack(&data).unwrap(),
            vec![
                Value::Bool(true),
                Value::Char(b'z'),
                Value::UInt(0x0102),
                Value::Int(-2),
            ]
        );
    }

    #[test]
    fn test_pack_floats() {
        let layout = CompiledLayout::parse("<efd").unwrap();
        let packed = layout
            .pack(&[Value::Float(1.0), Value::Int(2), Value::Float(-0.5)])
            .unwrap();
        assert_eq!(&packed[0..2], &[0x00, 0x3c]);
        assert_eq!(&packed[2..6], &2f32.to_le_bytes());
        assert_eq!(&packed[6..14], &(-0.5f64).to_le_bytes());
        assert_eq!(
            layout.unpack(&packed).unwrap(),
            vec![Value::Float(1.0), Value::Float(2.0), Value::Float(-0.5)]
        );
    }

    #[test]
    fn test_pack_float_overflow() {
        let layout = CompiledLayout::parse("<f").unwrap();
        assert_eq!(
            layout.pack(&[Value::Float(1e300)]).unwrap_err(),
            PackError::OutOfRange {
                index: 0,
                kind: Kind::Float32
            }
        );
        assert!(layout.pack(&[Value::Float(f64::INFINITY)]).is_ok());

        let layout = CompiledLayout::parse("<e").unwrap();
        assert!(layout.pack(&[Value::Float(70000.0)]).is_err());
    }

    #[test]
    fn test_pack_byte_runs() {
        let layout = CompiledLayout::parse("3s4p").unwrap();
        let packed = layout
            .pack(&[Value::Bytes(vec![8, 9]), Value::Bytes(vec![1, 2, 3, 4, 5])])
            .unwrap();
        assert_eq!(packed, vec![8, 9, 0, 3, 1, 2, 3]);
        assert_eq!(
            layout.unpack(&packed).unwrap(),
            vec![Value::Bytes(vec![8, 9, 0]), Value::Bytes(vec![1, 2, 3])]
        );
    }

    #[test]
    fn test_pack_char_from_bytes_and_truncate_runs() {
        let layout = CompiledLayout::parse("c2s").unwrap();
        let packed = layout
            .pack(&[Value::Bytes(vec![7]), Value::Bytes(vec![1, 2, 3])])
            .unwrap();
        assert_eq!(packed, vec![7, 1, 2]);
        assert_eq!(
            layout.unpack(&packed).unwrap(),
            vec![Value::Char(7), Value::Bytes(vec![1, 2])]
        );

        assert_eq!(
            layout
                .pack(&[Value::Bytes(vec![7, 8]), Value::Bytes(vec![])])
                .unwrap_err(),
            PackError::TypeMismatch {
                index: 0,
                kind: Kind::Char
            }
        );
    }

    #[test]
    fn test_unpack_pascal_clamps_prefix() {
        let layout = CompiledLayout::parse("3p").unwrap();
        assert_eq!(
            layout.unpack(&[200, 7, 8]).unwrap(),
            vec![Value::Bytes(vec![7, 8])]
        );
    }

    #[test]
    fn test_pack_range_checks() {
        let layout = CompiledLayout::parse("<bB").unwrap();
        assert_eq!(
            layout.pack(&[Value::Int(128), Value::UInt(0)]).unwrap_err(),
            PackError::OutOfRange {
                index: 0,
                kind: Kind::Int8
            }
        );
        assert_eq!(
            layout.pack(&[Value::Int(0), Value::Int(-1)]).unwrap_err(),
            PackError::OutOfRange {
                index: 1,
                kind: Kind::UInt8
            }
        );
        assert_eq!(
            layout.pack(&[Value::UInt(127), Value::Int(255)]).unwrap(),
            vec![127, 255]
        );
    }

    #[test]
    fn test_pack_type_and_arity_errors() {
        let layout = CompiledLayout::parse("<i5s").unwrap();
        assert_eq!(
            layout.pack(&[Value::Int(1)]).unwrap_err(),
            PackError::ArityMismatch {
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            layout
                .pack(&[Value::String("1".into()), Value::Bytes(vec![])])
                .unwrap_err(),
            PackError::TypeMismatch {
                index: 0,
                kind: Kind::Int32
            }
        );
        assert_eq!(
            layout.pack(&[Value::Int(1), Value::Int(2)]).unwrap_err(),
            PackError::TypeMismatch {
                index: 1,
                kind: Kind::Bytes
            }
        );
    }

    #[test]
    fn test_pack_into() {
        let layout = CompiledLayout::parse(">H").unwrap();
        let mut buf = [0xaa; 4];
        layout.pack_into(&mut buf, 1, &[Value::UInt(0x0102)]).unwrap();
        assert_eq!(buf, [0xaa, 0x01, 0x02, 0xaa]);

        assert_eq!(
            layout.pack_into(&mut buf, 3, &[Value::UInt(1)]).unwrap_err(),
            PackError::BufferTooSmall {
                required: 2,
                available: 4,
                offset: 3
            }
        );

        assert!(layout.pack_into(&mut buf, 0, &[Value::Int(-1)]).is_err());
        assert_eq!(buf, [0xaa, 0x01, 0x02, 0xaa]);
    }

    #[test]
    fn test_unpack_size_checks() {
        let layout = CompiledLayout::parse("<i").unwrap();
        assert_eq!(
            layout.unpack(&[0, 0, 0]).unwrap_err(),
            UnpackError::SizeMismatch {
                expected: 4,
                found: 3
            }
        );
        assert_eq!(
            layout.unpack_from(&[0, 1, 0, 0, 0, 9], 1).unwrap(),
            vec![Value::Int(1)]
        );
        assert_eq!(
            layout.unpack_from(&[0, 1, 0, 0], 1).unwrap_err(),
            UnpackError::BufferTooSmall {
                required: 4,
                available: 4,
                offset: 1
            }
        );
    }

    #[test]
    fn test_iter_unpack() {
        let layout = CompiledLayout::parse("<H").unwrap();
        let data = [1, 0, 2, 0, 3, 0];
        let values: Vec<_> = layout.iter_unpack(&data).unwrap().collect();
        assert_eq!(
            values,
            vec![
                vec![Value::UInt(1)],
                vec![Value::UInt(2)],
                vec![Value::UInt(3)]
            ]
        );
        assert_eq!(layout.iter_unpack(&data).unwrap().len(), 3);
        assert_eq!(
            layout.iter_unpack(&data[..5]).unwrap_err(),
            UnpackError::NotMultiple { size: 2, found: 5 }
        );
    }

    #[test]
    fn test_iter_unpack_zero_sized() {
        let layout = CompiledLayout::parse("<").unwrap();
        assert_eq!(layout.size(), 0);
        assert_eq!(layout.iter_unpack(&[]).unwrap_err(), UnpackError::ZeroSized);
    }
}
