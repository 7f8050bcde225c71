use super::{FixedPoint, VECTOR_WIDTH};
use core::arch::aarch64::*;

pub(super) fn finalize_x16<const BOUNDED: bool>(acc: [i32; VECTOR_WIDTH], fp: &FixedPoint, min: u8, max: u8) -> [u8; VECTOR_WIDTH] {
    let mut out = [0u8; VECTOR_WIDTH];
    // SAFETY: NEON is baseline on aarch64; loads and the store stay inside the local arrays.
    unsafe {
        let offset = vdupq_n_s32(fp.offset);
        let zero = vdupq_n_s32(0);
        let shift = vdupq_n_s32(-fp.shift);
        let p = acc.as_ptr();
        let mut v = [vld1q_s32(p), vld1q_s32(p.add(4)), vld1q_s32(p.add(8)), vld1q_s32(p.add(12))];
        for x in v.iter_mut() {
            let m = vqrdmulhq_n_s32(*x, fp.multiplier);
            let fixup = vshrq_n_s32::<31>(vandq_s32(m, shift));
            let r = vrshlq_s32(vqaddq_s32(m, fixup), shift);
            *x = vmaxq_s32(vaddq_s32(r, offset), zero);
        }
        let lo = vcombine_s16(vqmovn_s32(v[0]), vqmovn_s32(v[1]));
        let hi = vcombine_s16(vqmovn_s32(v[2]), vqmovn_s32(v[3]));
        let mut u = vcombine_u8(vqmovun_s16(lo), vqmovun_s16(hi));
        if BOUNDED {
            u = vminq_u8(vmaxq_u8(u, vdupq_n_u8(min)), vdupq_n_u8(max));
        }
        vst1q_u8(out.as_mut_ptr(), u);
    }
    out
}
