//! # structcraft
//!
//! A fluent builder for fixed binary record layouts.
//!
//! Describe a record field by field (integers, floats, fixed and length-prefixed byte runs,
//! padding) under one of five byte-order modes. The builder emits the shortest equivalent layout
//! string, tracks the byte offset as you go, and compiles into a reusable codec that packs value
//! tuples into bytes and unpacks bytes into named records, with optional per-field mappers
//! applied on decode.
//!
//! ## Example
//!
//! ```
//! use structcraft::{
//!     named::{Field, NamedLayoutBuilder},
//!     transform::Transform,
//!     value::Value,
//! };
//!
//! let mut hex = Transform::new();
//! hex.set_hex_separator(":");
//!
//! let mut builder = NamedLayoutBuilder::new("EthernetFrame");
//! builder
//!     .little_endian()?
//!     .bytes(Field::new("destination").mapped(hex.clone().into()), 6)?
//!     .bytes(Field::new("source").mapped(hex.into()), 6)?
//!     .uint16("packet_type")?;
//! assert_eq!(builder.render_layout(), "<6s6sH");
//!
//! let frame = builder.build_formatted_record()?;
//! let record = frame.unpack(b"\x80\x00\x20\x7a\x3f\x3e\x80\x00\x20\x20\x3a\xae\x08\x00")?;
//! assert_eq!(record["source"], Value::String("80:00:20:20:3a:ae".into()));
//! assert_eq!(record["packet_type"], Value::UInt(8));
//! # Ok::<(), structcraft::Error>(())
//! ```

pub mod bits;
pub mod byte_order;
pub mod compiled;
pub mod errors;
pub mod field;
pub mod layout;
pub mod named;
pub mod record;
pub mod transform;
pub mod value;

#[cfg(feature = "serde")]
pub mod serde;

pub use errors::Error;
pub use layout::LayoutBuilder;
pub use named::NamedLayoutBuilder;
pub use record::{FormattedRecord, Record};
pub use value::Value;
