//! JSON-deserializable record definitions.
//!
//! A [RecordDef] describes a named record format as data, for example a definition file shipped
//! with your application. Converting it into a [NamedLayoutBuilder] replays every field through
//! the builder, so the same validation applies as for hand-written builder chains.
//!
//! ```
//! use structcraft::{named::NamedLayoutBuilder, serde::RecordDef, value::Value};
//!
//! let def: RecordDef = serde_json::from_str(r#"{
//!     "name": "Reading",
//!     "byte_order": "Big",
//!     "fields": [
//!         { "type": "UInt16", "names": ["sensor"] },
//!         { "type": "Int16", "names": ["temp"], "transform": { "scale": 0.5 } }
//!     ]
//! }"#).unwrap();
//!
//! let record = NamedLayoutBuilder::try_from(def)?.build_formatted_record()?;
//! let reading = record.unpack(&[0x00, 0x07, 0x00, 0xd2])?;
//! assert_eq!(reading["sensor"], Value::UInt(7));
//! assert_eq!(reading["temp"], Value::Float(105.0));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    byte_order::ByteOrder,
    errors::LayoutError,
    field::Kind,
    named::{Field, Fields, NamedLayoutBuilder},
    transform::{Encoding, Mapper, Transform},
};

/// Errors produced when replaying a [RecordDef].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("field #{index} of type `{kind}` takes {expected} name(s), found {found}")]
    NameCount {
        index: usize,
        kind: Kind,
        expected: usize,
        found: usize,
    },
    #[error("field #{index} skips bytes and can't carry a transform")]
    TransformOnPadding { index: usize },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Byte order and alignment of a record definition.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderDef {
    #[default]
    NativeAligned,
    Native,
    Little,
    Big,
    Network,
}

impl From<ByteOrderDef> for ByteOrder {
    fn from(def: ByteOrderDef) -> Self {
        match def {
            ByteOrderDef::NativeAligned => ByteOrder::NativeAligned,
            ByteOrderDef::Native => ByteOrder::Native,
            ByteOrderDef::Little => ByteOrder::Little,
            ByteOrderDef::Big => ByteOrder::Big,
            ByteOrderDef::Network => ByteOrder::Network,
        }
    }
}

/// Top-level record definition.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordDef {
    /// Record type name.
    pub name: String,
    /// Defaults to native alignment.
    #[serde(default)]
    pub byte_order: ByteOrderDef,
    /// Fields and skips in layout order.
    pub fields: Vec<FieldDef>,
}

/// One builder step: a run of scalars, a byte field or a skip.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    #[serde(flatten)]
    pub kind: KindDef,
    /// One name per scalar slot; exactly one for byte fields; none for skips.
    #[serde(default)]
    pub names: Vec<String>,
    /// Optional decode transform for every name of this step.
    #[serde(default)]
    pub transform: Option<TransformDef>,
}

/// Kind of a [FieldDef], tagged by `type`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum KindDef {
    Bool,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Long,
    ULong,
    SSize,
    USize,
    Half,
    Float32,
    Float64,
    Pointer,
    Bytes { length: usize },
    PascalBytes { max_length: usize },
    Skip { count: usize },
    SkipTo { offset: usize },
}

/// What a [KindDef] asks the builder to do.
enum Step {
    Scalar(Kind),
    Bytes(usize),
    PascalBytes(usize),
    Skip(usize),
    SkipTo(usize),
}

impl KindDef {
    fn step(self) -> Step {
        let kind = match self {
            KindDef::Bool => Kind::Bool,
            KindDef::Char => Kind::Char,
            KindDef::Int8 => Kind::Int8,
            KindDef::UInt8 => Kind::UInt8,
            KindDef::Int16 => Kind::Int16,
            KindDef::UInt16 => Kind::UInt16,
            KindDef::Int32 => Kind::Int32,
            KindDef::UInt32 => Kind::UInt32,
            KindDef::Int64 => Kind::Int64,
            KindDef::UInt64 => Kind::UInt64,
            KindDef::Long => Kind::Long,
            KindDef::ULong => Kind::ULong,
            KindDef::SSize => Kind::SSize,
            KindDef::USize => Kind::USize,
            KindDef::Half => Kind::Half,
            KindDef::Float32 => Kind::Float32,
            KindDef::Float64 => Kind::Float64,
            KindDef::Pointer => Kind::Pointer,
            KindDef::Bytes { length } => return Step::Bytes(length),
            KindDef::PascalBytes { max_length } => return Step::PascalBytes(max_length),
            KindDef::Skip { count } => return Step::Skip(count),
            KindDef::SkipTo { offset } => return Step::SkipTo(offset),
        };
        Step::Scalar(kind)
    }
}

/// Serialized form of [Encoding].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum EncodingDef {
    Utf8,
    Ascii,
}

impl From<EncodingDef> for Encoding {
    fn from(def: EncodingDef) -> Self {
        match def {
            EncodingDef::Utf8 => Encoding::Utf8,
            EncodingDef::Ascii => Encoding::Ascii,
        }
    }
}

/// Declarative decode transform, see [Transform].
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct TransformDef {
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub offset: Option<f64>,

    #[serde(default)]
    pub encoding: Option<EncodingDef>,
    #[serde(default)]
    pub zero_terminated: Option<bool>,
    #[serde(default)]
    pub trim: Option<bool>,

    /// Integer code to label. JSON object keys are parsed as integers.
    #[serde(default)]
    pub enum_map: Option<HashMap<i64, String>>,

    #[serde(default)]
    pub hex_separator: Option<String>,
}

impl From<TransformDef> for Transform {
    fn from(def: TransformDef) -> Self {
        Transform {
            scale: def.scale,
            offset: def.offset,
            encoding: def.encoding.map(Into::into),
            zero_terminated: def.zero_terminated,
            trim: def.trim,
            enum_map: def.enum_map,
            hex_separator: def.hex_separator,
        }
    }
}

impl TryFrom<RecordDef> for NamedLayoutBuilder {
    type Error = DefinitionError;

    fn try_from(def: RecordDef) -> Result<Self, Self::Error> {
        let mut builder = NamedLayoutBuilder::new(def.name);
        builder.set_byte_order(def.byte_order.into())?;

        for (index, field) in def.fields.into_iter().enumerate() {
            let mapper = field.transform.map(|t| Mapper::from(Transform::from(t)));

            match field.kind.step() {
                Step::Scalar(kind) => {
                    let mut fields = Fields::new(field.names);
                    if let Some(mapper) = mapper {
                        fields = fields.mapped(mapper);
                    }
                    builder.add_fields(kind, fields)?;
                }
                Step::Bytes(length) => {
                    let named = single_name(index, Kind::Bytes, field.names, mapper)?;
                    builder.bytes(named, length)?;
                }
                Step::PascalBytes(max_length) => {
                    let named = single_name(index, Kind::PascalBytes, field.names, mapper)?;
                    builder.pascal_bytes(named, max_length)?;
                }
                Step::Skip(count) => {
                    no_names(index, &field.names, mapper.as_ref())?;
                    builder.skip_bytes(count)?;
                }
                Step::SkipTo(offset) => {
                    no_names(index, &field.names, mapper.as_ref())?;
                    builder.skip_to_offset(offset)?;
                }
            }
        }

        Ok(builder)
    }
}

fn single_name(
    index: usize,
    kind: Kind,
    mut names: Vec<String>,
    mapper: Option<Mapper>,
) -> Result<Field, DefinitionError> {
    if names.len() != 1 {
        return Err(DefinitionError::NameCount {
            index,
            kind,
            expected: 1,
            found: names.len(),
        });
    }

    let field = Field::new(names.remove(0));
    Ok(match mapper {
        Some(mapper) => field.mapped(mapper),
        None => field,
    })
}

fn no_names(index: usize, names: &[String], mapper: Option<&Mapper>) -> Result<(), DefinitionError> {
    if !names.is_empty() {
        return Err(DefinitionError::NameCount {
            index,
            kind: Kind::Padding,
            expected: 0,
            found: names.len(),
        });
    }
    if mapper.is_some() {
        return Err(DefinitionError::TransformOnPadding { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn parse(json: &str) -> RecordDef {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_ethernet_definition() {
        let def = parse(
            r#"{
                "name": "EthernetFrame",
                "byte_order": "Little",
                "fields": [
                    { "type": "Bytes", "length": 6, "names": ["destination"],
                      "transform": { "hex_separator": ":" } },
                    { "type": "Bytes", "length": 6, "names": ["source"],
                      "transform": { "hex_separator": ":" } },
                    { "type": "Int16", "names": ["packet_type"],
                      "transform": { "enum_map": { "8": "IPv4", "145": "VlanTagged" } } }
                ]
            }"#,
        );

        let builder = NamedLayoutBuilder::try_from(def).unwrap();
        assert_eq!(builder.render_layout(), "<6s6sh");

        let record = builder.build_formatted_record().unwrap();
        let frame = record
            .unpack(b"\x80\x00\x20\x7a\x3f\x3e\x80\x00\x20\x20\x3a\xae\x08\x00")
            .unwrap();
        assert_eq!(frame["destination"], Value::String("80:00:20:7a:3f:3e".into()));
        assert_eq!(frame["source"], Value::String("80:00:20:20:3a:ae".into()));
        assert_eq!(frame["packet_type"], Value::String("IPv4".into()));
    }

    #[test]
    fn test_default_byte_order_and_skips() {
        let def = parse(
            r#"{
                "name": "Padded",
                "fields": [
                    { "type": "Char", "names": ["tag"] },
                    { "type": "SkipTo", "offset": 4 },
                    { "type": "Int32", "names": ["a", "b"] },
                    { "type": "Skip", "count": 2 }
                ]
            }"#,
        );

        let builder = NamedLayoutBuilder::try_from(def).unwrap();
        assert_eq!(builder.byte_order(), ByteOrder::NativeAligned);
        assert_eq!(builder.render_layout(), "c3x2i2x");
        assert_eq!(builder.field_names(), &["tag", "a", "b"]);
    }

    #[test]
    fn test_every_scalar_kind_adds_one_slot_per_name() {
        let kinds = [
            KindDef::Bool,
            KindDef::Char,
            KindDef::Int8,
            KindDef::UInt8,
            KindDef::Int16,
            KindDef::UInt16,
            KindDef::Int32,
            KindDef::UInt32,
            KindDef::Int64,
            KindDef::UInt64,
            KindDef::Long,
            KindDef::ULong,
            KindDef::SSize,
            KindDef::USize,
            KindDef::Half,
            KindDef::Float32,
            KindDef::Float64,
            KindDef::Pointer,
        ];
        let def = RecordDef {
            name: "AllScalars".into(),
            byte_order: ByteOrderDef::NativeAligned,
            fields: kinds
                .iter()
                .enumerate()
                .map(|(i, kind)| FieldDef {
                    kind: *kind,
                    names: vec![format!("a{i}"), format!("b{i}")],
                    transform: None,
                })
                .collect(),
        };

        let builder = NamedLayoutBuilder::try_from(def).unwrap();
        assert_eq!(
            builder.render_layout(),
            "2?2c2b2B2h2H2i2I2q2Q2l2L2n2N2e2f2d2P"
        );
        assert_eq!(builder.field_names().len(), 2 * kinds.len());
    }

    #[test]
    fn test_byte_field_needs_one_name() {
        let def = parse(r#"{ "name": "R", "fields": [ { "type": "PascalBytes", "max_length": 4, "names": ["a", "b"] } ] }"#);
        assert_eq!(
            NamedLayoutBuilder::try_from(def).unwrap_err(),
            DefinitionError::NameCount {
                index: 0,
                kind: Kind::PascalBytes,
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_skip_rejects_names_and_transforms() {
        let def = parse(r#"{ "name": "R", "fields": [ { "type": "Skip", "count": 1, "names": ["x"] } ] }"#);
        assert!(matches!(
            NamedLayoutBuilder::try_from(def),
            Err(DefinitionError::NameCount { expected: 0, .. })
        ));

        let def = parse(
            r#"{ "name": "R", "fields": [ { "type": "Skip", "count": 1, "transform": { "trim": true } } ] }"#,
        );
        assert_eq!(
            NamedLayoutBuilder::try_from(def).unwrap_err(),
            DefinitionError::TransformOnPadding { index: 0 }
        );
    }

    #[test]
    fn test_builder_validation_applies() {
        let def = parse(
            r#"{ "name": "R", "byte_order": "Network", "fields": [ { "type": "Pointer", "names": ["p"] } ] }"#,
        );
        assert_eq!(
            NamedLayoutBuilder::try_from(def).unwrap_err(),
            DefinitionError::Layout(LayoutError::NativeOnlyKind {
                kind: Kind::Pointer,
                order: ByteOrder::Network
            })
        );

        let def = parse(
            r#"{ "name": "R", "byte_order": "Big", "fields": [ { "type": "Int32", "names": ["a"] }, { "type": "SkipTo", "offset": 2 } ] }"#,
        );
        assert!(matches!(
            NamedLayoutBuilder::try_from(def),
            Err(DefinitionError::Layout(LayoutError::InvalidOffset { .. }))
        ));
    }

    #[test]
    fn test_string_transform() {
        let def = parse(
            r#"{
                "name": "Label",
                "byte_order": "Big",
                "fields": [
                    { "type": "Bytes", "length": 8, "names": ["text"],
                      "transform": { "encoding": "Ascii", "zero_terminated": true, "trim": true } }
                ]
            }"#,
        );
        let record = NamedLayoutBuilder::try_from(def)
            .unwrap()
            .build_formatted_record()
            .unwrap();
        assert_eq!(
            record.unpack(b" hi\0junk").unwrap()["text"],
            Value::String("hi".into())
        );
    }

    #[test]
    fn test_definition_serializes_back() {
        let def = RecordDef {
            name: "R".into(),
            byte_order: ByteOrderDef::Big,
            fields: vec![FieldDef {
                kind: KindDef::Bytes { length: 3 },
                names: vec!["b".into()],
                transform: None,
            }],
        };
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["fields"][0]["type"], "Bytes");
        assert_eq!(json["fields"][0]["length"], 3);
        assert_eq!(json["byte_order"], "Big");
    }
}
