//! The codec between packed IEEE-754 bit strings and the unpacked working
//! form.

use crate::backend::{Backend, BvT, PropT};
use crate::float::{Format, UnpackedFloat};

/// Decode a packed float. NaN payloads are discarded: every NaN pattern
/// decodes to "a NaN".
pub fn unpack<B: Backend>(format: &Format, packed_float: &B::Ubv) -> UnpackedFloat<B> {
    let p_width = format.packed_width();
    let ex_width = format.packed_exponent_width();
    let sig_width = format.packed_significand_width();

    debug_assert_eq!(packed_float.width(), p_width);

    // Extract the fields
    let packed_significand = packed_float.extract(sig_width - 1, 0);
    let packed_exponent = packed_float.extract(sig_width + ex_width - 1, sig_width);
    let sign = packed_float
        .extract(p_width - 1, sig_width + ex_width)
        .is_all_ones();

    // Prepare the normal and subnormal cases
    let unpacked_ex_width = UnpackedFloat::<B>::exponent_width(format);
    let unpacked_sig_width = UnpackedFloat::<B>::significand_width(format);

    // The unpacked exponent is wider, so the bias subtract cannot overflow.
    debug_assert!(unpacked_ex_width > ex_width);
    let biased_exponent = packed_exponent
        .extend(unpacked_ex_width - ex_width)
        .reinterpret()
        .sub(&UnpackedFloat::<B>::bias(format));

    let significand_with_leading_zero =
        packed_significand.extend(unpacked_sig_width - sig_width);
    let significand_with_leading_one = UnpackedFloat::<B>::leading_one(unpacked_sig_width)
        .bit_or(&significand_with_leading_zero);

    let uf_normal = UnpackedFloat::<B>::new(
        sign.clone(),
        biased_exponent,
        significand_with_leading_one,
    );
    let uf_subnormal_base = UnpackedFloat::<B>::new(
        sign.clone(),
        UnpackedFloat::<B>::min_normal_exponent(format),
        significand_with_leading_zero.clone(),
    );

    // Analyse
    let zero_exponent = packed_exponent.is_all_zeros();
    let ones_exponent = packed_exponent.is_all_ones();
    let zero_significand = significand_with_leading_zero.is_all_zeros();

    // Identify the cases
    let is_zero = zero_exponent.and(&zero_significand);
    let is_subnormal = zero_exponent.and(&zero_significand.not());
    let is_inf = ones_exponent.and(&zero_significand);
    let is_nan = ones_exponent.and(&zero_significand.not());

    // Splice together
    let uf = UnpackedFloat::select(
        &is_nan,
        &UnpackedFloat::make_nan(format),
        &UnpackedFloat::select(
            &is_inf,
            &UnpackedFloat::make_inf(format, sign.clone()),
            &UnpackedFloat::select(
                &is_zero,
                &UnpackedFloat::make_zero(format, sign),
                &UnpackedFloat::select(
                    &is_subnormal.not(),
                    &uf_normal,
                    &uf_subnormal_base.normalise_up(format),
                ),
            ),
        ),
    );

    B::postcondition(&uf.valid(format));

    uf
}

/// Encode an unpacked value. NaN packs to the canonical quiet NaN.
pub fn pack<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Ubv {
    B::precondition(&uf.valid(format));

    // Sign
    let packed_sign = B::Ubv::from_prop(uf.sign());

    // Exponent
    let packed_ex_width = format.packed_exponent_width();

    let in_normal_range = uf.in_normal_range(format, &B::Prop::lit(true));
    // Default values ensure the range dichotomy is complete.
    B::invariant(&in_normal_range.or(&uf.in_subnormal_range(format, &B::Prop::lit(true))));
    let in_subnormal_range = in_normal_range.not();

    let biased_exp = uf.exponent().add(&UnpackedFloat::<B>::bias(format));
    // Correct for normal values only; subnormals may still be negative.
    let packed_biased_exp = biased_exp.reinterpret().extract(packed_ex_width - 1, 0);

    let max_exp = B::Ubv::all_ones(packed_ex_width);
    let min_exp = B::Ubv::zero(packed_ex_width);

    let has_max_exp = uf.nan().or(uf.inf());
    let has_min_exp = uf.zero().or(&in_subnormal_range);
    let has_fixed_exp = has_max_exp.or(&has_min_exp);

    let packed_exp = B::Ubv::select(
        &has_fixed_exp,
        &B::Ubv::select(&has_max_exp, &max_exp, &min_exp),
        &packed_biased_exp,
    );

    // Significand
    let packed_sig_width = format.packed_significand_width();
    let unpacked_significand = uf.significand();

    debug_assert_eq!(packed_sig_width, unpacked_significand.width() - 1);
    let drop_leading_one = unpacked_significand.extract(packed_sig_width - 1, 0);
    let corrected_subnormal = unpacked_significand
        .shift_right(
            &uf.subnormal_amount(format)
                .reinterpret()
                .match_width(unpacked_significand),
        )
        .extract(packed_sig_width - 1, 0);

    let has_fixed_significand = uf.nan().or(uf.inf()).or(uf.zero());

    let packed_sig = B::Ubv::select(
        &has_fixed_significand,
        &B::Ubv::select(
            uf.nan(),
            &UnpackedFloat::<B>::nan_pattern(packed_sig_width),
            &B::Ubv::zero(packed_sig_width),
        ),
        &B::Ubv::select(&in_normal_range, &drop_leading_one, &corrected_subnormal),
    );

    // Finish up
    let packed = packed_sign.append(&packed_exp).append(&packed_sig);

    debug_assert_eq!(packed.width(), format.packed_width());

    packed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Exec, UWord};
    use crate::float::{FP16, FP32, FP64};
    use crate::utils::Lfsr;

    fn roundtrip16(bits: u16) -> u16 {
        let uf = unpack::<Exec>(&FP16, &UWord::new(16, bits as u128));
        pack::<Exec>(&FP16, &uf).as_u128() as u16
    }

    #[test]
    fn test_roundtrip_all_binary16() {
        // Every pattern survives the codec, except NaNs which canonicalise.
        for bits in 0..=u16::MAX {
            let exp_field = (bits >> 10) & 0x1f;
            let sig_field = bits & 0x3ff;
            let is_nan = exp_field == 0x1f && sig_field != 0;
            let out = roundtrip16(bits);
            if is_nan {
                assert_eq!(out, 0x7e00, "bits={:#06x}", bits);
            } else {
                assert_eq!(out, bits, "bits={:#06x}", bits);
            }
        }
    }

    #[test]
    fn test_unpack_classification_binary32() {
        let mut lfsr = Lfsr::new();
        for _ in 0..20000 {
            let bits = lfsr.get();
            let f = f32::from_bits(bits);
            let uf = unpack::<Exec>(&FP32, &UWord::new(32, bits as u128));
            assert_eq!(*uf.nan(), f.is_nan(), "bits={:#010x}", bits);
            assert_eq!(*uf.inf(), f.is_infinite(), "bits={:#010x}", bits);
            assert_eq!(*uf.zero(), f == 0.0 && !f.is_nan(), "bits={:#010x}", bits);
            if !f.is_nan() {
                assert_eq!(*uf.sign(), f.is_sign_negative(), "bits={:#010x}", bits);
            }
            assert!(uf.valid(&FP32));
        }
    }

    #[test]
    fn test_roundtrip_binary32_binary64() {
        let mut lfsr = Lfsr::new();
        for _ in 0..20000 {
            let bits32 = lfsr.get();
            let uf = unpack::<Exec>(&FP32, &UWord::new(32, bits32 as u128));
            let repacked = pack::<Exec>(&FP32, &uf).as_u128() as u32;
            if f32::from_bits(bits32).is_nan() {
                assert_eq!(repacked, 0x7fc0_0000);
            } else {
                assert_eq!(repacked, bits32);
            }

            let bits64 = lfsr.get64();
            let uf = unpack::<Exec>(&FP64, &UWord::new(64, bits64 as u128));
            let repacked = pack::<Exec>(&FP64, &uf).as_u128() as u64;
            if f64::from_bits(bits64).is_nan() {
                assert_eq!(repacked, 0x7ff8_0000_0000_0000);
            } else {
                assert_eq!(repacked, bits64);
            }
        }
    }

    #[test]
    fn test_unpack_subnormals() {
        // The smallest subnormal normalises all the way down.
        let uf = unpack::<Exec>(&FP32, &UWord::new(32, 1));
        assert_eq!(uf.exponent().as_i128(), -149);
        assert!(uf.significand().extract(23, 23).is_all_ones());
        assert!(uf.valid(&FP32));

        // The largest subnormal sits just below the normal range.
        let uf = unpack::<Exec>(&FP32, &UWord::new(32, 0x007f_ffff));
        assert_eq!(uf.exponent().as_i128(), -127);
        assert!(uf.valid(&FP32));
    }
}
