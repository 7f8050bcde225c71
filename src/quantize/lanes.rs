//! Portable 4 x 4-lane rendition of the NEON finalizer. Each helper mirrors
//! one vector instruction so both builds share the same rounding steps.

use super::{saturating_rounding_doubling_high_mul, FixedPoint, VECTOR_WIDTH};

type I32x4 = [i32; 4];

#[inline]
fn qrdmulh_n(a: I32x4, b: i32) -> I32x4 {
    a.map(|x| saturating_rounding_doubling_high_mul(x, b))
}

/// Rounding right shift on a 64-bit intermediate, like `vrshl` with a
/// negative shift.
#[inline]
fn rounding_shift_right(x: i32, exponent: i32) -> i32 {
    if exponent == 0 {
        return x;
    }
    ((x as i64 + (1i64 << (exponent - 1))) >> exponent) as i32
}

/// Negative inputs are nudged down by one before the rounding shift, which
/// turns round-half-up into round-half-away-from-zero.
#[inline]
fn rounding_divide_by_pow2(x: I32x4, exponent: i32) -> I32x4 {
    let shift = exponent.wrapping_neg();
    x.map(|v| {
        let fixup = (v & shift) >> 31;
        rounding_shift_right(v.saturating_add(fixup), exponent)
    })
}

#[inline]
fn narrow_s32_to_s16(x: i32) -> i16 {
    x.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[inline]
fn narrow_s16_to_u8(x: i16) -> u8 {
    x.clamp(0, u8::MAX as i16) as u8
}

pub(super) fn finalize_x16<const BOUNDED: bool>(acc: [i32; VECTOR_WIDTH], fp: &FixedPoint, min: u8, max: u8) -> [u8; VECTOR_WIDTH] {
    let mut out = [0u8; VECTOR_WIDTH];
    for (q, chunk) in acc.chunks_exact(4).enumerate() {
        let v: I32x4 = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let v = qrdmulh_n(v, fp.multiplier);
        let v = rounding_divide_by_pow2(v, fp.shift);
        let v = v.map(|x| x.wrapping_add(fp.offset).max(0));
        for (i, x) in v.into_iter().enumerate() {
            out[q * 4 + i] = narrow_s16_to_u8(narrow_s32_to_s16(x));
        }
    }
    if BOUNDED {
        for o in &mut out {
            *o = (*o).max(min).min(max);
        }
    }
    out
}
