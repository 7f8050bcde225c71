//! Fixed-point requantization: scalar kernels plus the 16-wide finalizer.

#[cfg(not(all(target_arch = "aarch64", feature = "simd-neon")))]
mod lanes;
#[cfg(all(target_arch = "aarch64", feature = "simd-neon"))]
mod neon;

use crate::error::{Error, Result};

/// Elements handled per vector step.
pub const VECTOR_WIDTH: usize = 16;

/// Q31 multiplier, right shift and output offset applied to every accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedPoint {
    pub multiplier: i32,
    pub shift: i32,
    pub offset: i32,
}

/// Output clamp, fixed once per configured kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampPolicy {
    /// Saturate to `[0, 255]` only.
    FullRange,
    /// Saturate, then clamp to `[min, max]`.
    Bounded { min: u8, max: u8 },
}

impl ClampPolicy {
    /// `min == max` and `[0, 255]` both mean no extra bound. Expects
    /// `0 <= min <= max <= 255`.
    pub fn select(min: i32, max: i32) -> Self {
        let bounded = min != max && !(min == 0 && max == 255);
        if bounded {
            ClampPolicy::Bounded { min: min as u8, max: max as u8 }
        } else {
            ClampPolicy::FullRange
        }
    }

    pub fn is_bounded(self) -> bool { matches!(self, ClampPolicy::Bounded { .. }) }

    /// Clamp range; `[0, 255]` for the full-range policy.
    pub fn bounds(self) -> (u8, u8) {
        match self {
            ClampPolicy::FullRange => (0, u8::MAX),
            ClampPolicy::Bounded { min, max } => (min, max),
        }
    }
}

/// `(2ab + 2^31) >> 32`, saturating the single overflow case `MIN * MIN`.
#[inline]
pub fn saturating_rounding_doubling_high_mul(a: i32, b: i32) -> i32 {
    if a == i32::MIN && b == i32::MIN {
        return i32::MAX;
    }
    let ab = a as i64 * b as i64;
    ((2 * ab + (1i64 << 31)) >> 32) as i32
}

/// Divide by `2^exponent` rounding half away from zero. Callers keep
/// `exponent` in `0..=31`; `configure` rejects any other shift.
#[inline]
pub(crate) fn rounding_divide_by_pow2(x: i32, exponent: i32) -> i32 {
    debug_assert!((0..=31).contains(&exponent), "shift {} out of range", exponent);
    let mask = ((1i64 << exponent) - 1) as i32;
    let threshold = (mask >> 1) + i32::from(x < 0);
    (x >> exponent) + i32::from((x & mask) > threshold)
}

/// Requantize one accumulator (bias already added). `min`/`max` are only
/// applied when `BOUNDED`.
#[inline]
pub(crate) fn finalize_quantization<const BOUNDED: bool>(acc: i32, fp: &FixedPoint, min: u8, max: u8) -> u8 {
    let v = saturating_rounding_doubling_high_mul(acc, fp.multiplier);
    let v = rounding_divide_by_pow2(v, fp.shift).wrapping_add(fp.offset);
    let out = v.clamp(0, 255) as u8;
    if BOUNDED { out.max(min).min(max) } else { out }
}

/// Requantize 16 accumulators; element-wise equal to `finalize_quantization`.
#[inline]
pub(crate) fn finalize_quantization_x16<const BOUNDED: bool>(acc: [i32; VECTOR_WIDTH], fp: &FixedPoint, min: u8, max: u8) -> [u8; VECTOR_WIDTH] {
    #[cfg(all(target_arch = "aarch64", feature = "simd-neon"))]
    {
        neon::finalize_x16::<BOUNDED>(acc, fp, min, max)
    }
    #[cfg(not(all(target_arch = "aarch64", feature = "simd-neon")))]
    {
        lanes::finalize_x16::<BOUNDED>(acc, fp, min, max)
    }
}

/// Lane-wise wrapping add, used to fuse the bias.
#[inline]
pub(crate) fn add_x16(a: [i32; VECTOR_WIDTH], b: [i32; VECTOR_WIDTH]) -> [i32; VECTOR_WIDTH] {
    std::array::from_fn(|i| a[i].wrapping_add(b[i]))
}

/// Scalar requantization of a whole row-major buffer. `bias`, when given,
/// is indexed by the position within a row of `bias.len()` elements.
///
/// Panics if `fp.shift` is outside `0..=31`.
pub fn requantize_reference(acc: &[i32], bias: Option<&[i32]>, fp: &FixedPoint, policy: ClampPolicy) -> Vec<u8> {
    assert!((0..=31).contains(&fp.shift), "shift {} not in [0, 31]", fp.shift);
    let (min, max) = policy.bounds();
    acc.iter()
        .enumerate()
        .map(|(i, &v)| {
            let v = match bias {
                Some(b) if !b.is_empty() => v.wrapping_add(b[i % b.len()]),
                _ => v,
            };
            if policy.is_bounded() {
                finalize_quantization::<true>(v, fp, min, max)
            } else {
                finalize_quantization::<false>(v, fp, min, max)
            }
        })
        .collect()
}

/// Convert a real scale in `(0, 1)` to a Q31 multiplier and right shift.
pub fn quantize_multiplier(scale: f64) -> Result<(i32, i32)> {
    if !(scale > 0.0 && scale < 1.0) {
        return Err(Error::InvalidArgument(format!("scale {} not in (0, 1)", scale)));
    }
    let mut q = scale;
    let mut shift = 0i32;
    while q < 0.5 {
        q *= 2.0;
        shift += 1;
    }
    let mut q_fixed = (q * (1i64 << 31) as f64).round() as i64;
    if q_fixed == 1i64 << 31 {
        q_fixed /= 2;
        shift -= 1;
    }
    if shift < 0 {
        // Rounded up to exactly 1.0; nearest representable value below it.
        return Ok((i32::MAX, 0));
    }
    if shift > 31 {
        return Err(Error::InvalidArgument(format!("scale {} needs shift {} > 31", scale, shift)));
    }
    Ok((q_fixed as i32, shift))
}
