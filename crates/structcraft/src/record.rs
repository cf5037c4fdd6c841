//! Named records and the formatted record that packs and unpacks them.

use std::{collections::HashMap, fmt, ops::Index, sync::Arc};

use crate::{
    compiled::{CompiledLayout, IterUnpack},
    errors::{PackError, RecordError, UnpackError},
    transform::Mapper,
    value::Value,
};

/// Record factory: a type name plus an ordered list of field names.
///
/// Field names may repeat; lookups by name resolve to the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: Arc<str>,
    fields: Arc<[String]>,
}

impl RecordType {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name: String = name.into();
        RecordType {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of the first field called `field`.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|name| name == field)
    }

    /// Builds a record from one value per field, in field order.
    pub fn make(&self, values: Vec<Value>) -> Result<Record, RecordError> {
        if values.len() != self.fields.len() {
            return Err(RecordError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.fields.len(),
                found: values.len(),
            });
        }

        Ok(Record {
            record_type: self.clone(),
            values,
        })
    }
}

/// An immutable record: named values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: RecordType,
    values: Vec<Value>,
}

impl Record {
    pub fn name(&self) -> &str {
        self.record_type.name()
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Value of the first field called `field`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record_type
            .position(field)
            .map(|index| &self.values[index])
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// `(field, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.record_type
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<&str> for Record {
    type Output = Value;

    /// # Panics
    ///
    /// Panics if the record has no field called `field`.
    fn index(&self, field: &str) -> &Self::Output {
        match self.get(field) {
            Some(value) => value,
            None => panic!("record `{}` has no field `{field}`", self.name()),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        for (i, (field, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}={value}")?;
        }
        write!(f, ")")
    }
}

/// A finalized record format: compiled layout, record factory and decode mappers.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone)]
pub struct FormattedRecord {
    layout: CompiledLayout,
    record_type: RecordType,
    mappers: Arc<HashMap<String, Mapper>>,
}

impl FormattedRecord {
    /// Bundles the parts. The layout must produce exactly one value per field.
    pub fn new(
        layout: CompiledLayout,
        record_type: RecordType,
        mappers: HashMap<String, Mapper>,
    ) -> Result<Self, RecordError> {
        if layout.value_count() != record_type.len() {
            return Err(RecordError::ArityMismatch {
                name: record_type.name().to_string(),
                expected: record_type.len(),
                found: layout.value_count(),
            });
        }

        Ok(FormattedRecord {
            layout,
            record_type,
            mappers: Arc::new(mappers),
        })
    }

    /// Byte size of one packed record.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// The compact layout string.
    pub fn layout(&self) -> &str {
        self.layout.format()
    }

    pub fn compiled(&self) -> &CompiledLayout {
        &self.layout
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn mapper(&self, field: &str) -> Option<&Mapper> {
        self.mappers.get(field)
    }

    /// Packs raw values given in field declaration order.
    pub fn pack(&self, values: &[Value]) -> Result<Vec<u8>, PackError> {
        self.layout.pack(values)
    }

    /// Packs raw values into `buf` at `offset`.
    pub fn pack_into(&self, buf: &mut [u8], offset: usize, values: &[Value]) -> Result<(), PackError> {
        self.layout.pack_into(buf, offset, values)
    }

    /// Unpacks a buffer of exactly [size](Self::size) bytes, applying mappers.
    pub fn unpack(&self, buf: &[u8]) -> Result<Record, UnpackError> {
        let raw = self.layout.unpack(buf)?;
        self.finish(raw)
    }

    /// Unpacks one record starting at `offset`, applying mappers.
    pub fn unpack_from(&self, buf: &[u8], offset: usize) -> Result<Record, UnpackError> {
        let raw = self.layout.unpack_from(buf, offset)?;
        self.finish(raw)
    }

    /// Lazily unpacks consecutive records. Fails up front unless `buf` holds a whole number of
    /// records.
    pub fn iter_unpack<'a>(&'a self, buf: &'a [u8]) -> Result<Records<'a>, UnpackError> {
        Ok(Records {
            record: self,
            inner: self.layout.iter_unpack(buf)?,
        })
    }

    fn finish(&self, raw: Vec<Value>) -> Result<Record, UnpackError> {
        if self.mappers.is_empty() {
            return Ok(self.record_type.make(raw)?);
        }

        let values = self
            .record_type
            .fields()
            .iter()
            .zip(raw)
            .map(|(field, value)| match self.mappers.get(field) {
                Some(mapper) => mapper.apply(value).map_err(|source| UnpackError::Mapper {
                    field: field.clone(),
                    source,
                }),
                None => Ok(value),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.record_type.make(values)?)
    }
}

/// Iterator over the records of a buffer, see [FormattedRecord::iter_unpack].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    record: &'a FormattedRecord,
    inner: IterUnpack<'a>,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, UnpackError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|raw| self.record.finish(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Records<'_> {}
