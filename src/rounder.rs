//! Rounding arbitrary length unpacked floats back to their correct length.
//!
//! Every arithmetic primitive produces an extended unpacked value (wider
//! exponent, significand with at least a guard and a sticky bit) and hands
//! it to the rounder. The rounder extracts the guard and sticky bits at the
//! right position (fixed for the normal range, variable for subnormals),
//! makes the rounding decision, performs the conditional increment and
//! reconstructs overflowed and underflowed results.

use crate::backend::{Backend, BvT, PropT, RmT};
use crate::float::{Format, UnpackedFloat};
use crate::ops::{collar, conditional_increment, expanding_subtract, order_encode};

/// The final reconstruction of the rounded result.
/// Handles the overflow and underflow conditions.
pub(crate) fn rounder_special_cases<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    rounded_result: &UnpackedFloat<B>,
    overflow: &B::Prop,
    underflow: &B::Prop,
    is_zero: &B::Prop,
) -> UnpackedFloat<B> {
    let sign = rounded_result.sign();

    // On overflow either return inf or max
    let return_inf = rounding_mode
        .eq_rm(&B::rne())
        .or(&rounding_mode.eq_rm(&B::rna()))
        .or(&rounding_mode.eq_rm(&B::rtp()).and(&sign.not()))
        .or(&rounding_mode.eq_rm(&B::rtn()).and(sign));

    // On underflow either return 0 or the minimum subnormal
    let return_zero = rounding_mode
        .eq_rm(&B::rne())
        .or(&rounding_mode.eq_rm(&B::rna()))
        .or(&rounding_mode.eq_rm(&B::rtz()))
        .or(&rounding_mode.eq_rm(&B::rtp()).and(sign))
        .or(&rounding_mode.eq_rm(&B::rtn()).and(&sign.not()));

    let sig_width = UnpackedFloat::<B>::significand_width(format);

    let inf = UnpackedFloat::<B>::make_inf(format, sign.clone());
    let max = UnpackedFloat::<B>::new(
        sign.clone(),
        UnpackedFloat::<B>::max_normal_exponent(format),
        B::Ubv::all_ones(sig_width),
    );
    let min = UnpackedFloat::<B>::new(
        sign.clone(),
        UnpackedFloat::<B>::min_subnormal_exponent(format),
        UnpackedFloat::<B>::leading_one(sig_width),
    );
    let zero = UnpackedFloat::<B>::make_zero(format, sign.clone());

    UnpackedFloat::select(
        is_zero,
        &zero,
        &UnpackedFloat::select(
            underflow,
            &UnpackedFloat::select(&return_zero, &zero, &min),
            &UnpackedFloat::select(
                overflow,
                &UnpackedFloat::select(&return_inf, &inf, &max),
                rounded_result,
            ),
        ),
    )
}

/// Decide whether to round up or not.
pub(crate) fn rounding_decision<B: Backend>(
    rounding_mode: &B::Rm,
    sign: &B::Prop,
    significand_even: &B::Prop,
    guard_bit: &B::Prop,
    sticky_bit: &B::Prop,
    known_round_down: &B::Prop,
) -> B::Prop {
    let round_up_rne = rounding_mode
        .eq_rm(&B::rne())
        .and(guard_bit)
        .and(&sticky_bit.or(&significand_even.not()));
    let round_up_rna = rounding_mode.eq_rm(&B::rna()).and(guard_bit);
    let round_up_rtp = rounding_mode
        .eq_rm(&B::rtp())
        .and(&sign.not())
        .and(&guard_bit.or(sticky_bit));
    let round_up_rtn = rounding_mode
        .eq_rm(&B::rtn())
        .and(sign)
        .and(&guard_bit.or(sticky_bit));
    // Round toward zero never rounds up.

    known_round_down
        .not()
        .and(&round_up_rne.or(&round_up_rna).or(&round_up_rtp).or(&round_up_rtn))
}

pub struct SignificandRounderResult<B: Backend> {
    pub significand: B::Ubv,
    pub increment_exponent: B::Prop,
}

/// Round a significand to a fixed width. If `known_round_down` is true
/// this should simplify to just an extract. Not quite the same as either
/// rounder so it cannot be refactored into them.
pub(crate) fn fixed_position_round<B: Backend>(
    rounding_mode: &B::Rm,
    sign: &B::Prop,
    significand: &B::Ubv,
    target_width: usize,
    known_leading_one: &B::Prop,
    known_round_down: &B::Prop,
) -> SignificandRounderResult<B> {
    let sig_width = significand.width();
    debug_assert!(sig_width >= target_width + 2);

    // Extract, extended to catch the overflow
    let extracted_significand = significand
        .extract(sig_width - 1, sig_width - target_width)
        .extend(1);

    let significand_even = extracted_significand.extract(0, 0).is_all_zeros();

    // Normal guard and sticky bits
    let guard_bit_position = sig_width - (target_width + 1);
    let guard_bit = significand
        .extract(guard_bit_position, guard_bit_position)
        .is_all_ones();
    let sticky_bit = significand
        .extract(guard_bit_position - 1, 0)
        .is_all_zeros()
        .not();

    // Rounding decision
    let round_up = rounding_decision::<B>(
        rounding_mode,
        sign,
        &significand_even,
        &guard_bit,
        &sticky_bit,
        known_round_down,
    );

    // Conditional increment
    let rounded_significand = conditional_increment(&round_up, &extracted_significand);

    let overflow_bit = rounded_significand
        .extract(target_width, target_width)
        .bit_and(&B::Ubv::from_prop(&round_up));
    // Cheaper than a conditional shift
    let carry_up_mask = overflow_bit
        .bit_or(&B::Ubv::from_prop(known_leading_one))
        .append(&B::Ubv::zero(target_width - 1));

    SignificandRounderResult {
        significand: rounded_significand
            .extract(target_width - 1, 0)
            .bit_or(&carry_up_mask),
        increment_exponent: overflow_bit.is_all_ones(),
    }
}

/// Round a significand at a run-time chosen position. If `known_round_down`
/// is true this should simplify to just a mask.
pub(crate) fn variable_position_round<B: Backend>(
    rounding_mode: &B::Rm,
    sign: &B::Prop,
    significand: &B::Ubv,
    round_position: &B::Ubv,
    known_leading_one: &B::Prop,
    known_round_down: &B::Prop,
) -> SignificandRounderResult<B> {
    let sig_width = significand.width();

    // Set up the significand:
    // round-up-from-sticky and overflow bits at the MSB, (fall-back) guard
    // and sticky bits at the LSB.
    let expanded_significand = significand.extend(2).append(&B::Ubv::zero(2));
    let exsig_width = expanded_significand.width();

    // Identify the increment, guard and sticky bits
    let increment_location = B::Ubv::constant(exsig_width, 0x4)
        .shift_left(&round_position.match_width(&expanded_significand));
    let guard_location = increment_location.shift_right(&B::Ubv::one(exsig_width));
    let sticky_locations = guard_location.decrement();

    let significand_even = increment_location
        .bit_and(&expanded_significand)
        .is_all_zeros();
    let guard_bit = guard_location
        .bit_and(&expanded_significand)
        .is_all_zeros()
        .not();
    let sticky_bit = sticky_locations
        .bit_and(&expanded_significand)
        .is_all_zeros()
        .not();

    // Rounding decision
    let round_up = rounding_decision::<B>(
        rounding_mode,
        sign,
        &significand_even,
        &guard_bit,
        &sticky_bit,
        known_round_down,
    );

    // Conditional increment
    let rounded_significand = expanded_significand.add(&B::Ubv::select(
        &round_up,
        &increment_location,
        &B::Ubv::zero(exsig_width),
    ));

    // Mask out the rounded bits and extract; the LSB is wrong but gets cut.
    let masked_rounded_significand = rounded_significand.bit_and(
        &sticky_locations
            .shift_left(&B::Ubv::one(exsig_width))
            .bit_not(),
    );

    // Only true when rounding up and the whole significand is sticky.
    let round_up_from_sticky = rounded_significand.extract(exsig_width - 1, exsig_width - 1);
    let overflow_bit = rounded_significand.extract(exsig_width - 2, exsig_width - 2);
    let mask_trigger = round_up_from_sticky
        .bit_or(&overflow_bit)
        .bit_and(&B::Ubv::from_prop(&round_up));
    // Cheaper than a conditional shift
    let carry_up_mask = mask_trigger
        .bit_or(&B::Ubv::from_prop(known_leading_one))
        .append(&B::Ubv::zero(sig_width - 1));

    SignificandRounderResult {
        significand: masked_rounded_significand
            .extract(sig_width + 1, 2)
            .bit_or(&carry_up_mask),
        increment_exponent: mask_trigger.is_all_ones(),
    }
}

/// Flags a caller can assert to prune rounder branches that its operation
/// makes impossible. All-false knowledge gives the plain rounder.
pub struct KnownFlags<B: Backend> {
    pub no_overflow: B::Prop,
    pub no_underflow: B::Prop,
    /// The significand does not need to be changed.
    pub exact: B::Prop,
    /// If the value is subnormal then it is exact.
    pub subnormal_exact: B::Prop,
    /// Incrementing the significand cannot overflow it.
    pub no_significand_overflow: B::Prop,
}

impl<B: Backend> KnownFlags<B> {
    pub fn new(
        no_overflow: B::Prop,
        no_underflow: B::Prop,
        exact: B::Prop,
        subnormal_exact: B::Prop,
        no_significand_overflow: B::Prop,
    ) -> Self {
        KnownFlags {
            no_overflow,
            no_underflow,
            exact,
            subnormal_exact,
            no_significand_overflow,
        }
    }

    /// Know nothing; every branch stays live.
    pub fn none() -> Self {
        KnownFlags {
            no_overflow: B::Prop::lit(false),
            no_underflow: B::Prop::lit(false),
            exact: B::Prop::lit(false),
            subnormal_exact: B::Prop::lit(false),
            no_significand_overflow: B::Prop::lit(false),
        }
    }
}

/// Round an extended unpacked value into `format`.
pub fn round<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    uf: &UnpackedFloat<B>,
) -> UnpackedFloat<B> {
    custom_rounder(format, rounding_mode, uf, &KnownFlags::none())
}

/// The rounder with caller-supplied knowledge.
///
/// The input is not required to be valid in any format:
///  1. The exponent and significand are extended and their values may be
///     out of range.
///  2. The leading bit of the significand should be 1 for a meaningful
///     answer; after a near-path cancellation it may not be, but then the
///     result is not used, so it may be incorrect.
pub fn custom_rounder<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    uf: &UnpackedFloat<B>,
    known: &KnownFlags<B>,
) -> UnpackedFloat<B> {
    let psig = uf.significand();
    let sig_width = psig.width();
    let sig = psig.bit_or(&UnpackedFloat::<B>::leading_one(sig_width));

    // Must have round and sticky bits
    let target_significand_width = UnpackedFloat::<B>::significand_width(format);
    debug_assert!(sig_width >= target_significand_width + 2);

    // Must have at least enough exponent bits
    let exp = uf.exponent();
    let exp_width = exp.width();
    let target_exponent_width = UnpackedFloat::<B>::exponent_width(format);
    debug_assert!(exp_width >= target_exponent_width);

    // Special values are not rounded; they carry default exponents and
    // significands which pass through unharmed and the flags are copied by
    // the callers' special-case handling.

    /*** Early underflow and overflow detection ***/
    let exponent_extension = exp_width - target_exponent_width;
    let max_normal_extended =
        UnpackedFloat::<B>::max_normal_exponent(format).extend(exponent_extension);
    let min_subnormal_less_one =
        UnpackedFloat::<B>::min_subnormal_exponent(format)
            .extend(exponent_extension)
            .decrement();

    let early_overflow = exp.gt(&max_normal_extended);
    let early_underflow = exp.lt(&min_subnormal_less_one);

    let potential_late_overflow = exp.eq_bv(&max_normal_extended);
    let potential_late_underflow = exp.eq_bv(&min_subnormal_less_one);

    /*** Normal or subnormal rounding? ***/
    let normal_rounding_range = exp.ge(
        &UnpackedFloat::<B>::min_normal_exponent(format).extend(exponent_extension),
    );
    let normal_rounding = normal_rounding_range.or(&known.subnormal_exact);

    /*** Round to the correct significand ***/
    // Extended to catch the overflow
    let extracted_significand = sig
        .extract(sig_width - 1, sig_width - target_significand_width)
        .extend(1);

    // Normal guard and sticky bits
    let guard_bit_position = sig_width - (target_significand_width + 1);
    let guard_bit = sig
        .extract(guard_bit_position, guard_bit_position)
        .is_all_ones();
    let sticky_bit = sig
        .extract(guard_bit_position - 1, 0)
        .is_all_zeros()
        .not();

    // For subnormals, locating the guard and sticky bits is more involved.
    // uf is not in the target format, so its own subnormal_amount is not
    // usable here. Negative if normal, giving a full mask whose result is
    // then ignored.
    let subnormal_amount = expanding_subtract(
        &UnpackedFloat::<B>::min_normal_exponent(format).match_width(exp),
        exp,
    );
    B::invariant(
        &subnormal_amount
            .lt(&B::Sbv::constant(exp_width + 1, (sig_width - 1) as u64))
            .or(&early_underflow),
    );

    let subnormal_shift_prepared = subnormal_amount
        .reinterpret()
        .match_width(&extracted_significand);

    // Compute the masks; if all ones it will not be used.
    let subnormal_mask = order_encode(&subnormal_shift_prepared);
    // +1 as the significand extract is extended
    let subnormal_sticky_mask =
        subnormal_mask.shift_right(&B::Ubv::one(target_significand_width + 1));

    // Apply
    let subnormal_masked_significand =
        extracted_significand.bit_and(&subnormal_mask.bit_not());
    let subnormal_mask_removed = extracted_significand.bit_and(&subnormal_mask);

    let subnormal_guard_bit = subnormal_mask_removed
        .bit_and(&subnormal_sticky_mask.bit_not())
        .is_all_zeros()
        .not();
    let subnormal_sticky_bit = guard_bit.or(&sticky_bit).or(
        &subnormal_mask_removed
            .bit_and(&subnormal_sticky_mask)
            .is_all_zeros()
            .not(),
    );

    // The only case where this loses information is early underflow.
    let subnormal_increment_amount = subnormal_mask
        .modular_left_shift(&B::Ubv::one(target_significand_width + 1))
        .bit_and(&subnormal_mask.bit_not());
    B::invariant(
        &subnormal_increment_amount
            .is_all_zeros()
            .implies(&early_underflow.or(&normal_rounding)),
    );

    // Choose the right bits dependent on the rounding range
    let chosen_guard_bit = B::Prop::select(&normal_rounding, &guard_bit, &subnormal_guard_bit);
    let chosen_sticky_bit =
        B::Prop::select(&normal_rounding, &sticky_bit, &subnormal_sticky_bit);

    let significand_even = B::Prop::select(
        &normal_rounding,
        &extracted_significand.extract(0, 0).is_all_zeros(),
        &extracted_significand
            .bit_and(&subnormal_increment_amount)
            .is_all_zeros(),
    );
    let round_up = rounding_decision::<B>(
        rounding_mode,
        uf.sign(),
        &significand_even,
        &chosen_guard_bit,
        &chosen_sticky_bit,
        &known
            .exact
            .or(&known.subnormal_exact.and(&normal_rounding_range.not())),
    );

    // Convert the round up flag to an increment
    let leading_one = UnpackedFloat::<B>::leading_one(target_significand_width);

    let normal_round_up_amount =
        B::Ubv::from_prop(&round_up).match_width(&extracted_significand);
    let subnormal_round_up_mask = B::Ubv::from_prop(&round_up)
        .append(&B::Ubv::zero(target_significand_width))
        .sign_extend_right_shift(&B::Ubv::constant(
            target_significand_width + 1,
            target_significand_width as u64,
        ));
    let subnormal_round_up_amount =
        subnormal_round_up_mask.bit_and(&subnormal_increment_amount);

    let raw_rounded_significand = B::Ubv::select(
        &normal_rounding,
        &extracted_significand,
        &subnormal_masked_significand,
    )
    .add(&B::Ubv::select(
        &normal_rounding,
        &normal_round_up_amount,
        &subnormal_round_up_amount,
    ));

    // We might have lost the leading one; if so, re-add and note that the
    // exponent needs an increment.
    let significand_overflow = raw_rounded_significand
        .extract(target_significand_width, target_significand_width)
        .is_all_ones();
    B::invariant(&significand_overflow.implies(&round_up));

    let extracted_rounded_significand =
        raw_rounded_significand.extract(target_significand_width - 1, 0);
    let rounded_significand = extracted_rounded_significand.bit_or(&leading_one);

    /*** Round to the correct exponent ***/
    let extended_exponent = exp.extend(1);

    // The round up is implied but kept for signal forwarding.
    let increment_exponent_needed = round_up.and(&significand_overflow);
    let increment_exponent = known
        .no_significand_overflow
        .not()
        .and(&increment_exponent_needed);
    B::invariant(
        &known
            .no_significand_overflow
            .implies(&increment_exponent_needed.not()),
    );

    let corrected_exponent = conditional_increment(&increment_exponent, &extended_exponent);

    // Track overflows and underflows
    let max_normal =
        UnpackedFloat::<B>::max_normal_exponent(format).match_width(&corrected_exponent);
    let min_subnormal =
        UnpackedFloat::<B>::min_subnormal_exponent(format).match_width(&corrected_exponent);

    let corrected_exponent_in_range = collar(&corrected_exponent, &min_subnormal, &max_normal);

    let current_exponent_width = corrected_exponent_in_range.width();
    let rounded_exponent =
        corrected_exponent_in_range.contract(current_exponent_width - target_exponent_width);

    /*** Finish ***/
    let computed_overflow = potential_late_overflow.and(&increment_exponent_needed);
    let computed_underflow = potential_late_underflow.and(&increment_exponent_needed.not());

    let late_overflow = early_overflow.not().and(&computed_overflow);
    let late_underflow = early_underflow.not().and(&computed_underflow);

    let overflow = known
        .no_overflow
        .not()
        .and(&late_overflow.or(&early_overflow));
    let underflow = known
        .no_underflow
        .not()
        .and(&late_underflow.or(&early_underflow));

    let rounded_result =
        UnpackedFloat::<B>::new(uf.sign().clone(), rounded_exponent, rounded_significand);
    let result = rounder_special_cases(
        format,
        rounding_mode,
        &rounded_result,
        &overflow,
        &underflow,
        uf.zero(),
    );

    B::postcondition(&result.valid(format));

    result
}
