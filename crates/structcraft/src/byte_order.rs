//! Byte order and alignment modes of a layout.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use crate::errors::LayoutError;

/// Byte order, size and alignment policy applied to a whole layout.
///
/// Only [ByteOrder::NativeAligned] uses platform sizes and inserts alignment padding; every
/// other mode uses standard sizes and packs fields back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Native byte order, native sizes and native alignment (`@`, or no prefix).
    #[default]
    NativeAligned,
    /// Native byte order, standard sizes, no alignment (`=`).
    Native,
    /// Little-endian, standard sizes, no alignment (`<`).
    Little,
    /// Big-endian, standard sizes, no alignment (`>`).
    Big,
    /// Network order (big-endian), standard sizes, no alignment (`!`).
    Network,
}

/// Concrete endianness a [ByteOrder] resolves to on the current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Endian {
    Little,
    Big,
}

impl ByteOrder {
    /// Prefix character of this mode in a rendered layout. Native alignment renders no prefix.
    pub fn prefix(self) -> Option<char> {
        match self {
            ByteOrder::NativeAligned => None,
            ByteOrder::Native => Some('='),
            ByteOrder::Little => Some('<'),
            ByteOrder::Big => Some('>'),
            ByteOrder::Network => Some('!'),
        }
    }

    /// Parses a layout prefix character.
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '@' => Some(ByteOrder::NativeAligned),
            '=' => Some(ByteOrder::Native),
            '<' => Some(ByteOrder::Little),
            '>' => Some(ByteOrder::Big),
            '!' => Some(ByteOrder::Network),
            _ => None,
        }
    }

    /// True for the one mode that uses platform sizes and alignment.
    pub fn is_aligned(self) -> bool {
        self == ByteOrder::NativeAligned
    }

    /// Checks that a layout with existing fields may switch from `self` to `requested`.
    ///
    /// Moving between the packed modes is always allowed; moving into or out of native
    /// alignment is only allowed while the layout is still empty.
    pub fn ensure_transition(self, requested: ByteOrder, has_fields: bool) -> Result<(), LayoutError> {
        if !has_fields || self == requested {
            return Ok(());
        }

        if self.is_aligned() || requested.is_aligned() {
            return Err(LayoutError::InvalidTransition {
                current: self,
                requested,
            });
        }

        Ok(())
    }

    pub(crate) fn endian(self) -> Endian {
        match self {
            ByteOrder::NativeAligned | ByteOrder::Native => {
                if cfg!(target_endian = "big") {
                    Endian::Big
                } else {
                    Endian::Little
                }
            }
            ByteOrder::Little => Endian::Little,
            ByteOrder::Big | ByteOrder::Network => Endian::Big,
        }
    }
}

impl Endian {
    pub(crate) fn read_uint(self, buf: &[u8], nbytes: usize) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_uint(buf, nbytes),
            Endian::Big => BigEndian::read_uint(buf, nbytes),
        }
    }

    pub(crate) fn read_int(self, buf: &[u8], nbytes: usize) -> i64 {
        match self {
            Endian::Little => LittleEndian::read_int(buf, nbytes),
            Endian::Big => BigEndian::read_int(buf, nbytes),
        }
    }

    pub(crate) fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    pub(crate) fn read_f32(self, buf: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(buf),
            Endian::Big => BigEndian::read_f32(buf),
        }
    }

    pub(crate) fn read_f64(self, buf: &[u8]) -> f64 {
        match self {
            Endian::Little => LittleEndian::read_f64(buf),
            Endian::Big => BigEndian::read_f64(buf),
        }
    }

    /// `n` must fit in `nbytes`.
    pub(crate) fn write_uint(self, buf: &mut [u8], n: u64, nbytes: usize) {
        match self {
            Endian::Little => LittleEndian::write_uint(buf, n, nbytes),
            Endian::Big => BigEndian::write_uint(buf, n, nbytes),
        }
    }

    /// `n` must fit in `nbytes`.
    pub(crate) fn write_int(self, buf: &mut [u8], n: i64, nbytes: usize) {
        match self {
            Endian::Little => LittleEndian::write_int(buf, n, nbytes),
            Endian::Big => BigEndian::write_int(buf, n, nbytes),
        }
    }

    pub(crate) fn write_u16(self, buf: &mut [u8], n: u16) {
        match self {
            Endian::Little => LittleEndian::write_u16(buf, n),
            Endian::Big => BigEndian::write_u16(buf, n),
        }
    }

    pub(crate) fn write_f32(self, buf: &mut [u8], n: f32) {
        match self {
            Endian::Little => LittleEndian::write_f32(buf, n),
            Endian::Big => BigEndian::write_f32(buf, n),
        }
    }

    pub(crate) fn write_f64(self, buf: &mut [u8], n: f64) {
        match self {
            Endian::Little => LittleEndian::write_f64(buf, n),
            Endian::Big => BigEndian::write_f64(buf, n),
        }
    }
}
