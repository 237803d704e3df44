//!
//! BVFloat is an implementation of IEEE-754
//! [floating point](https://en.wikipedia.org/wiki/IEEE_754) arithmetic as a
//! library of algorithms over an abstract bit-vector back-end. The same
//! algorithm text computes concrete results when instantiated with the
//! executable back-end, and builds word-level expression graphs when
//! instantiated with a symbolic back-end, so every operation is encoded
//! once rather than once per back-end.
//!
//! ### Example
//! ```
//!  use bvfloat::{add, pack, unpack, Exec, RoundingMode, UWord, FP32};
//!
//!  // Decode two binary32 numbers into the working form.
//!  let one = unpack::<Exec>(&FP32, &UWord::new(32, 0x3f80_0000));
//!  let two = unpack::<Exec>(&FP32, &UWord::new(32, 0x4000_0000));
//!
//!  // 1.0 + 2.0, rounding to nearest, ties to even.
//!  let sum = add(&FP32, &RoundingMode::NearestTiesToEven, &one, &two, &true);
//!
//!  assert_eq!(pack::<Exec>(&FP32, &sum).as_u128(), 0x4040_0000);
//! ```
//!
//! The unpacked working form carries explicit NaN / infinity / zero flags,
//! an unbiased exponent and a significand with the hidden bit made
//! explicit; subnormals are kept normalised. `unpack` and `pack` convert
//! between it and the standard interchange encodings:
//!
//! ```
//!  use bvfloat::{sqrt, pack, unpack, Exec, RoundingMode, UWord, FP32};
//!
//!  let four = unpack::<Exec>(&FP32, &UWord::new(32, 0x4080_0000));
//!  let root = sqrt(&FP32, &RoundingMode::NearestTiesToEven, &four);
//!  assert_eq!(pack::<Exec>(&FP32, &root).as_u128(), 0x4000_0000); // 2.0
//! ```
//!
//! Formats are runtime values, so non-standard widths work the same way:
//! ```
//!  use bvfloat::{Format, UnpackedFloat, Exec};
//!
//!  // A toy format with 6 exponent bits and 9 significand bits.
//!  let fmt = Format::new(6, 9);
//!  let nan = UnpackedFloat::<Exec>::make_nan(&fmt);
//!  assert!(*nan.nan());
//! ```
//!
//! There are no runtime errors anywhere in the arithmetic: IEEE-754
//! exceptional conditions produce the default NaN / infinity / zero
//! results, and conversions to integers take the value to return when the
//! input is out of range.

#![no_std]

#[cfg(feature = "std")]
extern crate std;

mod add;
mod arithmetic;
mod backend;
mod cast;
mod compare;
mod exec;
mod float;
pub mod ops;
mod packing;
mod rounder;
pub mod utils;

pub use self::add::{
    add, add_exponent_compare, add_with_bypass, arithmetic_add, dual_path_add,
    is_catastrophic_cancellation, ExponentCompareInfo, FloatWithKnownFlags,
};
pub use self::arithmetic::{
    divide, fma, multiply, remainder, remainder_with_rounding, sqrt,
};
pub use self::backend::{Backend, BvT, PropT, RmT};
pub use self::cast::{
    convert_float_to_float, convert_float_to_sbv, convert_float_to_ubv,
    convert_sbv_to_float, convert_ubv_to_float, round_to_integral,
};
pub use self::compare::{
    absolute, ieee754_equal, is_finite, is_infinite, is_nan, is_negative, is_normal,
    is_positive, is_subnormal, is_zero, less_than, less_than_or_equal, max, min, negate,
    smtlib_equal,
};
pub use self::exec::{Exec, SWord, UWord};
pub use self::float::{Format, RoundingMode, UnpackedFloat, FP128, FP16, FP32, FP64};
pub use self::packing::{pack, unpack};
pub use self::rounder::{custom_rounder, round, KnownFlags};
pub use self::utils::Lfsr;
