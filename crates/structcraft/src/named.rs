//! Named layout builder: positional layout plus one field name per value slot and decode
//! mappers, finalized into a [FormattedRecord].

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    byte_order::ByteOrder,
    errors::{Error, LayoutError},
    field::Kind,
    layout::LayoutBuilder,
    record::{FormattedRecord, RecordType},
    transform::Mapper,
};

/// Names for a run of scalar fields, one slot per name, with an optional mapper for all of them.
///
/// ```
/// use structcraft::{named::Fields, transform::Mapper};
///
/// let one: Fields = "id".into();
/// let many: Fields = ["x", "y", "z"].into();
/// let mapped = Fields::from("flags").mapped(Mapper::new(|v| v));
/// assert_eq!(many.names().len(), 3);
/// # let _ = (one, mapped);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Fields {
    names: Vec<String>,
    mapper: Option<Mapper>,
}

impl Fields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields {
            names: names.into_iter().map(Into::into).collect(),
            mapper: None,
        }
    }

    /// Applies `mapper` to every name of this batch on decode.
    pub fn mapped(mut self, mapper: Mapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl From<&str> for Fields {
    fn from(name: &str) -> Self {
        Fields::new([name])
    }
}

impl From<String> for Fields {
    fn from(name: String) -> Self {
        Fields::new([name])
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(names: [&str; N]) -> Self {
        Fields::new(names)
    }
}

impl From<&[&str]> for Fields {
    fn from(names: &[&str]) -> Self {
        Fields::new(names.iter().copied())
    }
}

impl From<Vec<&str>> for Fields {
    fn from(names: Vec<&str>) -> Self {
        Fields::new(names)
    }
}

impl From<Vec<String>> for Fields {
    fn from(names: Vec<String>) -> Self {
        Fields::new(names)
    }
}

impl From<Field> for Fields {
    fn from(field: Field) -> Self {
        Fields {
            names: vec![field.name],
            mapper: field.mapper,
        }
    }
}

/// Name of a single byte-run field, with an optional mapper.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    mapper: Option<Mapper>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            mapper: None,
        }
    }

    pub fn mapped(mut self, mapper: Mapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

macro_rules! named_scalar_methods {
    ($($(#[$doc:meta])* $name:ident => $kind:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, fields: impl Into<Fields>) -> Result<&mut Self, LayoutError> {
                self.add_fields($kind, fields.into())
            }
        )*
    };
}

/// Builds a named record format.
///
/// Each scalar call takes one or more names; `int32(["a", "b"])` declares two `int32` slots and
/// is equivalent to two single-name calls. Byte runs take exactly one name.
///
/// ```
/// use structcraft::{named::NamedLayoutBuilder, value::Value};
///
/// let mut builder = NamedLayoutBuilder::new("Header");
/// builder.little_endian()?.uint16(["kind", "len"])?.bytes("tag", 4)?;
/// let header = builder.build_formatted_record()?;
///
/// let packed = header.pack(&[Value::UInt(1), Value::UInt(4), Value::Bytes(b"abcd".to_vec())])?;
/// let record = header.unpack(&packed)?;
/// assert_eq!(record["len"], Value::UInt(4));
/// # Ok::<(), structcraft::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct NamedLayoutBuilder {
    name: String,
    layout: LayoutBuilder,
    fields: Vec<String>,
    mappers: HashMap<String, Mapper>,
    last_batch: usize,
}

impl NamedLayoutBuilder {
    /// Starts an empty format whose records are called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        NamedLayoutBuilder {
            name: name.into(),
            layout: LayoutBuilder::new(),
            fields: Vec::new(),
            mappers: HashMap::new(),
            last_batch: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names in slot order.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    pub fn layout(&self) -> &LayoutBuilder {
        &self.layout
    }

    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.layout.byte_order()
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<&mut Self, LayoutError> {
        self.layout.set_byte_order(order)?;
        Ok(self)
    }

    pub fn native_aligned(&mut self) -> Result<&mut Self, LayoutError> {
        self.set_byte_order(ByteOrder::NativeAligned)
    }

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

    pub fn skip_bytes(&mut self, count: usize) -> Result<&mut Self, LayoutError> {
        self.layout.skip_bytes(count)?;
        Ok(self)
    }

    pub fn skip_to_offset(&mut self, target: usize) -> Result<&mut Self, LayoutError> {
        self.layout.skip_to_offset(target)?;
        Ok(self)
    }

    named_scalar_methods! {
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
        long => Kind::Long;
        ulong => Kind::ULong;
        /// Native alignment only.
        ssize_t => Kind::SSize;
        /// Native alignment only.
        size_t => Kind::USize;
        half_precision => Kind::Half;
        float => Kind::Float32;
        double => Kind::Float64;
        /// Native alignment only.
        native_pointer => Kind::Pointer;
    }

    /// Fixed-length byte field of `length` bytes.
    pub fn bytes(&mut self, field: impl Into<Field>, length: usize) -> Result<&mut Self, LayoutError> {
        let Field { name, mapper } = field.into();
        self.layout.add_byte_run(length)?;
        self.add_names(vec![name], mapper);
        Ok(self)
    }

    /// Length-prefixed byte field holding at most `max_length - 1` bytes.
    pub fn pascal_bytes(
        &mut self,
        field: impl Into<Field>,
        max_length: usize,
    ) -> Result<&mut Self, LayoutError> {
        let Field { name, mapper } = field.into();
        self.layout.add_length_prefixed_byte_run(max_length)?;
        self.add_names(vec![name], mapper);
        Ok(self)
    }

    /// Registers `mapper` for `fields`, or for the fields added by the latest call when
    /// `fields` is empty. A later registration for the same name replaces the earlier one.
    pub fn with_mapper(&mut self, mapper: Mapper, fields: &[&str]) -> &mut Self {
        if fields.is_empty() {
            let start = self.fields.len() - self.last_batch;
            for field in &self.fields[start..] {
                self.mappers.insert(field.clone(), mapper.clone());
            }
        } else {
            for field in fields {
                self.mappers.insert(field.to_string(), mapper.clone());
            }
        }

        self
    }

    /// Adds one `kind` slot per name. Byte runs and padding go through
    /// [bytes](Self::bytes), [pascal_bytes](Self::pascal_bytes) and [skip_bytes](Self::skip_bytes).
    pub(crate) fn add_fields(&mut self, kind: Kind, fields: Fields) -> Result<&mut Self, LayoutError> {
        let Fields { names, mapper } = fields;
        self.layout.add_scalar(kind, names.len())?;
        self.add_names(names, mapper);
        Ok(self)
    }

    fn add_names(&mut self, names: Vec<String>, mapper: Option<Mapper>) {
        trace!(record = %self.name, ?names, "added field names");

        self.last_batch = names.len();
        self.fields.extend(names);

        if let Some(mapper) = mapper {
            self.with_mapper(mapper, &[]);
        }
    }

    pub fn render_layout(&self) -> String {
        self.layout.render_layout()
    }

    /// Compiles the layout and bundles it with the field names and mappers.
    pub fn build_formatted_record(&self) -> Result<FormattedRecord, Error> {
        let layout = self.layout.build()?;
        let record_type = RecordType::new(self.name.as_str(), self.fields.iter().cloned());

        debug!(
            record = %self.name,
            layout = layout.format(),
            size = layout.size(),
            fields = self.fields.len(),
            mappers = self.mappers.len(),
            "built formatted record"
        );

        Ok(FormattedRecord::new(layout, record_type, self.mappers.clone())?)
    }
}
