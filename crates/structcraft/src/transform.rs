//! Decode-time mappers.
//!
//! A [Mapper] turns the raw decoded [Value] of one field into the value stored in the record.
//! Closures cover anything; [Transform] covers the usual cases declaratively. A transform sets up
//! at most one stage:
//!
//! 1. `scale`/`offset` on numbers, producing a float
//! 2. `enum_map` lookup of integer codes
//! 3. text decoding of byte fields (`encoding`, `zero_terminated`, `trim`)
//! 4. hex rendering of byte fields, e.g. MAC addresses

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::value::Value;

/// Errors raised while mapping a raw value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Wrong value variant for the configured stage.
    #[error("value type doesn't match the transform")]
    InvalidType,
    /// More than one of the numeric, label, text and hex stages is configured.
    #[error("transform configures more than one stage")]
    ConflictingStages,
    #[error("no enum label for {0}")]
    InvalidEnumValue(i64),
    #[error("bytes are not valid for the encoding")]
    InvalidEncoding,
    #[error("byte is not ASCII")]
    InvalidAsciiByteValue,
    /// NaN or infinite scale or offset.
    #[error("scale and offset must be finite")]
    InvalidScaleOffset,
    /// Failure reported by a user mapper.
    #[error("{0}")]
    Custom(String),
}

type MapFn = dyn Fn(Value) -> Result<Value, TransformError> + Send + Sync;

/// A shareable decode-time transform for one or more fields.
///
/// Cloning is cheap; clones share the same function.
#[derive(Clone)]
pub struct Mapper(Arc<MapFn>);

impl Mapper {
    /// Wraps an infallible function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Mapper(Arc::new(move |value| Ok(f(value))))
    }

    /// Wraps a function that may reject a raw value.
    pub fn try_new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, TransformError> + Send + Sync + 'static,
    {
        Mapper(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Result<Value, TransformError> {
        (self.0)(value)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper").finish_non_exhaustive()
    }
}

impl From<Transform> for Mapper {
    fn from(transform: Transform) -> Self {
        Mapper::try_new(move |value| transform.apply(value))
    }
}

/// Text encoding of byte fields decoded to strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    /// Bytes above 0x7F are rejected.
    Ascii,
}

/// Declarative mapper.
///
/// Configure with the chaining setters, then [apply](Transform::apply) it directly or turn it
/// into a [Mapper] for a named field. Numeric modifiers turn integers into floats.
///
/// ```
/// use structcraft::{transform::Transform, value::Value};
///
/// let mut celsius = Transform::new();
/// celsius.set_scale(0.5).set_offset(-40.0);
/// assert_eq!(celsius.apply(Value::UInt(130)).unwrap(), Value::Float(25.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Transform {
    /// Multiplier for numeric values.
    pub scale: Option<f64>,
    /// Added after scaling.
    pub offset: Option<f64>,

    /// Decode byte fields to text.
    pub encoding: Option<Encoding>,
    /// Cut decoded bytes at the first NUL.
    pub zero_terminated: Option<bool>,
    /// Strip surrounding whitespace from decoded text.
    pub trim: Option<bool>,

    /// Integer code to label lookup.
    pub enum_map: Option<HashMap<i64, String>>,

    /// Render byte fields as lowercase hex pairs joined by this separator.
    pub hex_separator: Option<String>,
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    /// `value * scale + offset`
    pub fn set_scale(&mut self, scale: f64) -> &mut Self {
        self.scale = Some(scale);
        self
    }

    pub fn set_offset(&mut self, offset: f64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn set_encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn set_zero_terminated(&mut self, enabled: bool) -> &mut Self {
        self.zero_terminated = Some(enabled);
        self
    }

    pub fn set_trim(&mut self, enabled: bool) -> &mut Self {
        self.trim = Some(enabled);
        self
    }

    pub fn set_enum_map(&mut self, labels: HashMap<i64, String>) -> &mut Self {
        self.enum_map = Some(labels);
        self
    }

    pub fn set_hex_separator(&mut self, separator: impl Into<String>) -> &mut Self {
        self.hex_separator = Some(separator.into());
        self
    }

    /// Maps one raw value: numeric modifiers, then labels, then text, then hex.
    pub fn apply(&self, raw: Value) -> Result<Value, TransformError> {
        self.check()?;

        let value = self.rescale(raw);
        let value = self.label(value)?;
        let value = self.decode_text(value)?;
        self.render_hex(value)
    }

    /// At most one of the numeric, label, text and hex stages may be configured.
    fn check(&self) -> Result<(), TransformError> {
        let finite = |v: Option<f64>| v.is_none_or(f64::is_finite);
        if !finite(self.scale) || !finite(self.offset) {
            return Err(TransformError::InvalidScaleOffset);
        }

        let stages = [
            self.scale.is_some() || self.offset.is_some(),
            self.enum_map.is_some(),
            self.encoding.is_some(),
            self.hex_separator.is_some(),
        ];
        if stages.iter().filter(|on| **on).count() > 1 {
            return Err(TransformError::ConflictingStages);
        }

        Ok(())
    }

    fn rescale(&self, value: Value) -> Value {
        if self.scale.is_none() && self.offset.is_none() {
            return value;
        }

        let (scale, offset) = (self.scale.unwrap_or(1.0), self.offset.unwrap_or(0.0));
        match value.as_f64() {
            Some(v) => Value::Float(v * scale + offset),
            None => value,
        }
    }

    fn label(&self, value: Value) -> Result<Value, TransformError> {
        let Some(labels) = &self.enum_map else {
            return Ok(value);
        };

        let code = match value {
            Value::Char(c) => i64::from(c),
            Value::Int(_) | Value::UInt(_) => value.as_i64().ok_or(TransformError::InvalidType)?,
            _ => return Err(TransformError::InvalidType),
        };

        match labels.get(&code) {
            Some(label) => Ok(Value::String(label.clone())),
            None => Err(TransformError::InvalidEnumValue(code)),
        }
    }

    fn decode_text(&self, value: Value) -> Result<Value, TransformError> {
        let Some(encoding) = &self.encoding else {
            return Ok(value);
        };

        let mut bytes = byte_input(value)?;
        if self.zero_terminated == Some(true) {
            if let Some(nul) = bytes.iter().position(|&b| b == 0) {
                bytes.truncate(nul);
            }
        }

        if *encoding == Encoding::Ascii && !bytes.is_ascii() {
            return Err(TransformError::InvalidAsciiByteValue);
        }

        let text = String::from_utf8(bytes).map_err(|_| TransformError::InvalidEncoding)?;
        Ok(Value::String(match self.trim {
            Some(true) => text.trim().to_owned(),
            _ => text,
        }))
    }

    fn render_hex(&self, value: Value) -> Result<Value, TransformError> {
        let Some(separator) = &self.hex_separator else {
            return Ok(value);
        };

        let pairs: Vec<String> = byte_input(value)?
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Ok(Value::String(pairs.join(separator)))
    }
}

fn byte_input(value: Value) -> Result<Vec<u8>, TransformError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        Value::Char(c) => Ok(vec![c]),
        _ => Err(TransformError::InvalidType),
    }
}
