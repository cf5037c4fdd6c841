//! Low-level numeric helpers: alignment, integer range checks and half-precision floats.

/// Largest record size in bytes. A record must fit in one allocation.
pub const MAX_SIZE: usize = isize::MAX as usize;

/// Rounds `offset` up to a multiple of `align`. `None` on overflow.
pub fn align_up(offset: usize, align: usize) -> Option<usize> {
    if align <= 1 {
        return Some(offset);
    }

    let rem = offset % align;
    if rem == 0 {
        Some(offset)
    } else {
        offset.checked_add(align - rem)
    }
}

/// Whether `value` fits in a signed integer of `width` bytes (1..=8).
pub fn fits_signed(value: i64, width: usize) -> bool {
    if width >= 8 {
        return true;
    }

    let bits = width * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}

/// Whether `value` fits in an unsigned integer of `width` bytes (1..=8).
pub fn fits_unsigned(value: u64, width: usize) -> bool {
    if width >= 8 {
        return true;
    }

    value >> (width * 8) == 0
}

/// Widens IEEE 754 half-precision bits to an `f64`. Exact for every input.
pub fn f16_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = ((bits >> 10) & 0x1f) as i32;
    let mant = (bits & 0x03ff) as f64;

    match exp {
        0 => sign * mant * 2f64.powi(-24),
        0x1f if mant == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN.copysign(sign),
        _ => sign * (1.0 + mant / 1024.0) * 2f64.powi(exp - 15),
    }
}

/// Narrows an `f64` to IEEE 754 half-precision bits, rounding half to even.
///
/// Returns `None` when a finite value is too large for half precision. Infinities and NaN are
/// preserved, values below the smallest subnormal flush to signed zero.
pub fn f64_to_f16(value: f64) -> Option<u16> {
    let sign: u16 = if value.is_sign_negative() { 0x8000 } else { 0 };

    if value.is_nan() {
        return Some(sign | 0x7e00);
    }
    if value.is_infinite() {
        return Some(sign | 0x7c00);
    }

    let bits = value.abs().to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // f64 zero or subnormal, far below half's range
        return Some(sign);
    }

    // value = f * 2^e with 1 <= f < 2
    let mut f = f64::from_bits((bits & 0x000f_ffff_ffff_ffff) | (1023u64 << 52));
    let mut e = biased - 1023;

    if e >= 16 {
        return None;
    } else if e < -25 {
        f = 0.0;
        e = 0;
    } else if e < -14 {
        f *= 2f64.powi(14 + e);
        e = 0;
    } else {
        e += 15;
        f -= 1.0;
    }

    f *= 1024.0;
    let mut mant = f as u16;
    let rest = f - mant as f64;

    if rest > 0.5 || (rest == 0.5 && mant % 2 == 1) {
        mant += 1;
        if mant == 1024 {
            mant = 0;
            e += 1;
            if e == 31 {
                return None;
            }
        }
    }

    Some(sign | ((e as u16) << 10) | mant)
}
