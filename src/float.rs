//! The working representation of a floating-point number. This differs
//! from the packed representation in a few ways:
//!
//!  1. Explicit flags for NaN, Inf and Zero.
//!  2. The exponent is unbiased.
//!  3. The hidden bit is explicit.
//!  4. Subnormals are normalised.
//!
//! This makes numbers more uniform and makes it easier to implement
//! compact and efficient algorithms.

use crate::backend::{Backend, BvT, PropT};
use crate::ops::{bv_max, normalise_shift, order_encode};

/// Defines the supported rounding modes.
/// See IEEE754-2019 Section 4.3 Rounding-direction attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    NearestTiesToEven,
    NearestTiesToAway,
    Zero,
    Positive,
    Negative,
}

/// The floating-point format: the number of bits in the exponent field and
/// in the significand *including* the hidden bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// The number of bits that define the range of the exponent.
    exponent: usize,
    /// The number of bits in the significand (mantissa + 1).
    significand: usize,
}

impl Format {
    pub const fn new(exponent: usize, significand: usize) -> Self {
        Format {
            exponent,
            significand,
        }
    }

    /// Returns the length of the exponent field in bits.
    pub fn exponent_width(&self) -> usize {
        self.exponent
    }

    /// Returns the length of the significand in bits, hidden bit included.
    pub fn significand_width(&self) -> usize {
        self.significand
    }

    /// The width of the packed encoding: `[sign:1][exponent:e][fraction:s-1]`.
    pub fn packed_width(&self) -> usize {
        self.exponent + self.significand
    }

    pub fn packed_exponent_width(&self) -> usize {
        self.exponent
    }

    /// The hidden bit is not stored.
    pub fn packed_significand_width(&self) -> usize {
        self.significand - 1
    }
}

// IEEE 754-2019
// Table 3.5 — Binary interchange format parameters.

/// Predefined binary16 format with 5 exponent bits and 11 significand bits.
pub const FP16: Format = Format::new(5, 11);
/// Predefined binary32 format with 8 exponent bits and 24 significand bits.
pub const FP32: Format = Format::new(8, 24);
/// Predefined binary64 format with 11 exponent bits and 53 significand bits.
pub const FP64: Format = Format::new(11, 53);
/// Predefined binary128 format with 15 exponent bits and 113 significand bits.
pub const FP128: Format = Format::new(15, 113);

/// The working form of a floating-point number over the back-end `B`.
///
/// The flags, exponent and significand are carried together with an
/// *effective* format; `valid` states the well-formedness contract that
/// every operation preserves.
pub struct UnpackedFloat<B: Backend> {
    nan: B::Prop,
    inf: B::Prop,
    zero: B::Prop,
    sign: B::Prop,
    exponent: B::Sbv,
    significand: B::Ubv,
}

impl<B: Backend> Clone for UnpackedFloat<B> {
    fn clone(&self) -> Self {
        UnpackedFloat {
            nan: self.nan.clone(),
            inf: self.inf.clone(),
            zero: self.zero.clone(),
            sign: self.sign.clone(),
            exponent: self.exponent.clone(),
            significand: self.significand.clone(),
        }
    }
}

impl<B: Backend> UnpackedFloat<B> {
    /// A number (no flag set) from sign, unbiased exponent and significand.
    pub fn new(sign: B::Prop, exponent: B::Sbv, significand: B::Ubv) -> Self {
        UnpackedFloat {
            nan: B::Prop::lit(false),
            inf: B::Prop::lit(false),
            zero: B::Prop::lit(false),
            sign,
            exponent,
            significand,
        }
    }

    /// A value from all six fields; used by `select` and the codec.
    pub fn from_parts(
        nan: B::Prop,
        inf: B::Prop,
        zero: B::Prop,
        sign: B::Prop,
        exponent: B::Sbv,
        significand: B::Ubv,
    ) -> Self {
        UnpackedFloat {
            nan,
            inf,
            zero,
            sign,
            exponent,
            significand,
        }
    }

    /// Copy with the sign overwritten; NaN keeps its (false) sign.
    pub fn with_sign(&self, sign: B::Prop) -> Self {
        UnpackedFloat {
            nan: self.nan.clone(),
            inf: self.inf.clone(),
            zero: self.zero.clone(),
            sign: B::Prop::select(&self.nan, &self.sign, &sign),
            exponent: self.exponent.clone(),
            significand: self.significand.clone(),
        }
    }

    pub fn nan(&self) -> &B::Prop {
        &self.nan
    }
    pub fn inf(&self) -> &B::Prop {
        &self.inf
    }
    pub fn zero(&self) -> &B::Prop {
        &self.zero
    }
    pub fn sign(&self) -> &B::Prop {
        &self.sign
    }
    pub fn exponent(&self) -> &B::Sbv {
        &self.exponent
    }
    pub fn significand(&self) -> &B::Ubv {
        &self.significand
    }

    pub fn is_positive_inf(&self) -> B::Prop {
        self.inf.and(&self.sign.not())
    }
    pub fn is_negative_inf(&self) -> B::Prop {
        self.inf.and(&self.sign)
    }

    // The default exponent and significand are used for special values.
    // They also flow through the ordinary arithmetic paths, so they are
    // chosen to be a valid number (the value 1.0), which keeps the "valid"
    // invariant provable on every path.

    fn default_exponent(format: &Format) -> B::Sbv {
        B::Sbv::zero(Self::exponent_width(format))
    }

    fn default_significand(format: &Format) -> B::Ubv {
        Self::leading_one(Self::significand_width(format))
    }

    pub fn make_zero(format: &Format, sign: B::Prop) -> Self {
        UnpackedFloat {
            nan: B::Prop::lit(false),
            inf: B::Prop::lit(false),
            zero: B::Prop::lit(true),
            sign,
            exponent: Self::default_exponent(format),
            significand: Self::default_significand(format),
        }
    }

    pub fn make_inf(format: &Format, sign: B::Prop) -> Self {
        UnpackedFloat {
            nan: B::Prop::lit(false),
            inf: B::Prop::lit(true),
            zero: B::Prop::lit(false),
            sign,
            exponent: Self::default_exponent(format),
            significand: Self::default_significand(format),
        }
    }

    pub fn make_nan(format: &Format) -> Self {
        UnpackedFloat {
            nan: B::Prop::lit(true),
            inf: B::Prop::lit(false),
            zero: B::Prop::lit(false),
            sign: B::Prop::lit(false),
            exponent: Self::default_exponent(format),
            significand: Self::default_significand(format),
        }
    }

    /// The number of exponent bits in the unpacked form.
    ///
    /// There is one more exponent above 0 than below, the opposite of two's
    /// complement; this is not a problem because the highest packed exponent
    /// encodes Inf and NaN and never appears unpacked. The width does have
    /// to grow beyond the packed width so that every subnormal can be
    /// normalised.
    pub fn exponent_width(format: &Format) -> usize {
        let mut width = format.exponent_width();

        let minimum_exponent =
            ((1u64 << (width - 1)) - 2) + (format.significand_width() as u64 - 1);

        while (1u64 << (width - 1)) < minimum_exponent {
            width += 1;
        }

        width
    }

    /// Hidden bit is already included in the floating-point format.
    pub fn significand_width(format: &Format) -> usize {
        format.significand_width()
    }

    // These all evaluate to literal values but are given as bit-vectors to
    // make their use easier and to avoid concerns of overflow.

    pub fn bias(format: &Format) -> B::Sbv {
        let w = Self::exponent_width(format);
        let one = B::Sbv::one(w);
        one.shift_left(&B::Sbv::constant(
            w,
            (format.exponent_width() - 1) as u64,
        ))
        .sub(&one)
    }

    pub fn max_normal_exponent(format: &Format) -> B::Sbv {
        Self::bias(format)
    }

    pub fn min_normal_exponent(format: &Format) -> B::Sbv {
        let w = Self::exponent_width(format);
        Self::bias(format).sub(&B::Sbv::one(w)).neg()
    }

    pub fn max_subnormal_exponent(format: &Format) -> B::Sbv {
        Self::bias(format).neg()
    }

    pub fn min_subnormal_exponent(format: &Format) -> B::Sbv {
        let w = Self::exponent_width(format);
        Self::max_subnormal_exponent(format).sub(&B::Sbv::constant(
            w,
            (Self::significand_width(format) - 2) as u64,
        ))
    }

    /// Note the scalar return type as this is used for iteration in the
    /// remainder loop.
    pub fn maximum_exponent_difference(format: &Format) -> usize {
        let max_normal_exp = (1usize << (format.exponent_width() - 1)) - 1;
        let below_min_normal = max_normal_exp + (Self::significand_width(format) - 2);
        max_normal_exp + below_min_normal
    }

    /// `known_in_format` uses the format invariant to simplify the test.
    pub fn in_normal_range(&self, format: &Format, known_in_format: &B::Prop) -> B::Prop {
        Self::min_normal_exponent(format).le(&self.exponent).and(
            &self
                .exponent
                .le(&Self::max_normal_exponent(format))
                .or(known_in_format),
        )
    }

    /// `known_in_format` uses the format invariant to simplify the test.
    pub fn in_subnormal_range(&self, format: &Format, known_in_format: &B::Prop) -> B::Prop {
        // To share tests with the normal-range test...
        let upper_bound = Self::min_normal_exponent(format).le(&self.exponent).not();

        Self::min_subnormal_exponent(format)
            .le(&self.exponent)
            .or(known_in_format)
            .and(&upper_bound)
    }

    pub fn in_normal_or_subnormal_range(
        &self,
        format: &Format,
        known_in_format: &B::Prop,
    ) -> B::Prop {
        Self::min_subnormal_exponent(format)
            .le(&self.exponent)
            .and(&self.exponent.le(&Self::max_normal_exponent(format)))
            .or(known_in_format)
    }

    /// The right shift needed before packing to represent a subnormal.
    pub fn subnormal_amount(&self, format: &Format) -> B::Sbv {
        let w = self.exponent.width();
        bv_max(
            &Self::min_normal_exponent(format).sub(&self.exponent),
            &B::Sbv::zero(w),
        )
    }

    /// A significand-sized vector with only the hidden-bit position set.
    pub fn leading_one(significand_width: usize) -> B::Ubv {
        B::Ubv::one(significand_width).shift_left(&B::Ubv::constant(
            significand_width,
            (significand_width - 1) as u64,
        ))
    }

    /// The canonical quiet NaN significand. For a qNaN, change for sNaN.
    pub fn nan_pattern(significand_width: usize) -> B::Ubv {
        Self::leading_one(significand_width)
    }

    /// Widen into an extended format: the exponent grows by `exp_extension`
    /// bits, the significand gains `sig_extension` low bits.
    pub fn extend(&self, exp_extension: usize, sig_extension: usize) -> Self {
        let extended_sig_width = self.significand.width() + sig_extension;
        UnpackedFloat {
            nan: self.nan.clone(),
            inf: self.inf.clone(),
            zero: self.zero.clone(),
            sign: self.sign.clone(),
            exponent: self.exponent.extend(exp_extension),
            significand: self.significand.extend(sig_extension).shift_left(
                &B::Ubv::constant(extended_sig_width, sig_extension as u64),
            ),
        }
    }

    /// Moves the leading 1 up to the correct position, adjusting the
    /// exponent as required.
    pub fn normalise_up(&self, _format: &Format) -> Self {
        // Should not be attempting to normalise special values.
        B::precondition(&self.nan.or(&self.inf).or(&self.zero).not());

        let normal = normalise_shift(&self.significand);

        let exponent_width = self.exponent.width();
        // May lose data for very small exponents and very large significands.
        debug_assert!(normal.shift_amount.width() < exponent_width);

        let signed_align_amount = normal.shift_amount.resize(exponent_width).reinterpret();
        let corrected_exponent = self.exponent.sub(&signed_align_amount);

        UnpackedFloat::new(self.sign.clone(), corrected_exponent, normal.normalised)
    }

    /// As `normalise_up` but returns a zero of the right sign when the
    /// significand is all zeros.
    pub fn normalise_up_detect_zero(&self, format: &Format) -> Self {
        B::precondition(&self.nan.or(&self.inf).or(&self.zero).not());

        let normal = normalise_shift(&self.significand);

        let exponent_width = self.exponent.width();
        debug_assert!(normal.shift_amount.width() < exponent_width);

        let signed_align_amount = normal.shift_amount.resize(exponent_width).reinterpret();
        let corrected_exponent = self.exponent.sub(&signed_align_amount);

        Self::select(
            &normal.is_zero,
            &Self::make_zero(format, self.sign.clone()),
            &UnpackedFloat::new(self.sign.clone(), corrected_exponent, normal.normalised),
        )
    }

    /// Is this a well formed unpacked value of the given format?
    /// The format is needed to ensure that subnormals are correct.
    /// This invariant does not hold at all points in the code.
    pub fn valid(&self, format: &Format) -> B::Prop {
        let ex_width = Self::exponent_width(format);
        let sig_width = Self::significand_width(format);

        debug_assert_eq!(ex_width, self.exponent.width());
        debug_assert_eq!(sig_width, self.significand.width());

        // At most one flag is true
        let at_most_one_flag = self
            .nan
            .and(&self.inf)
            .not()
            .and(&self.nan.and(&self.zero).not())
            .and(&self.inf.and(&self.zero).not());

        // If one flag is true then exponent and significand are defaults
        let one_flag = self.nan.or(&self.inf).or(&self.zero);
        let exponent_is_default = Self::default_exponent(format).eq_bv(&self.exponent);
        let significand_is_default = Self::default_significand(format).eq_bv(&self.significand);
        let flag_implies_defaults = one_flag
            .implies(&exponent_is_default)
            .and(&one_flag.implies(&significand_is_default));

        // NaN has sign = 0
        let nan_implies_sign_false = self.nan.implies(&self.sign.not());

        // Exponent is in range
        let exponent_in_range = self.in_normal_or_subnormal_range(format, &B::Prop::lit(false));

        // Has a leading one
        let has_leading_one = Self::leading_one(sig_width)
            .bit_and(&self.significand)
            .is_all_zeros()
            .not();

        // Subnormal numbers require an additional check to make sure they
        // do not have an unrepresentable amount of significand bits.
        let subnormal_amount = self.subnormal_amount(format);
        let mask = order_encode(
            &subnormal_amount
                .reinterpret()
                .match_width(&self.significand),
        );
        let correctly_abbreviated = mask.bit_and(&self.significand).is_all_zeros();
        let subnormal_implies_trailing_zeros = self
            .in_subnormal_range(format, &B::Prop::lit(false))
            .implies(&correctly_abbreviated);

        at_most_one_flag
            .and(&flag_implies_defaults)
            .and(&nan_implies_sign_false)
            .and(&exponent_in_range)
            .and(&has_leading_one)
            .and(&subnormal_implies_trailing_zeros)
    }

    /// If-then-else over whole unpacked values.
    pub fn select(cond: &B::Prop, then: &Self, other: &Self) -> Self {
        UnpackedFloat {
            nan: B::Prop::select(cond, &then.nan, &other.nan),
            inf: B::Prop::select(cond, &then.inf, &other.inf),
            zero: B::Prop::select(cond, &then.zero, &other.zero),
            sign: B::Prop::select(cond, &then.sign, &other.sign),
            exponent: B::Sbv::select(cond, &then.exponent, &other.exponent),
            significand: B::Ubv::select(cond, &then.significand, &other.significand),
        }
    }
}
