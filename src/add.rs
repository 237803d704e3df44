//! Addition and subtraction of unpacked floats.
//!
//! The design is based on a two-path adder. There are five cases of
//! interest:
//!  1. effective add / very far : set the sticky bit only
//!  2. effective add / far or near : align and add, realign down if needed
//!  3. effective sub / very far : decrement, re-normalise and set sticky
//!  4. effective sub / far : align and subtract, realign up if needed
//!  5. effective sub / near : align, subtract and normalise up
//!
//! The compacted single-path version (`arithmetic_add`) handles all of
//! them with one alignment and one sum and is the default; the literal
//! two-path version (`dual_path_add`) is kept as an alternative encoding.

use crate::backend::{Backend, BvT, PropT, RmT};
use crate::compare::negate;
use crate::float::{Format, UnpackedFloat};
use crate::ops::{
    conditional_left_shift_one, conditional_negate, conditional_right_shift_one,
    expanding_subtract, right_shift_sticky_bit, sticky_right_shift,
};
use crate::rounder::{custom_rounder, rounding_decision, KnownFlags};

/// What the exponent comparison tells us about the alignment of the two
/// operands.
pub struct ExponentCompareInfo<B: Backend> {
    pub left_is_max: B::Prop,
    pub max_exponent: B::Sbv,
    pub absolute_exponent_difference: B::Sbv,
    pub diff_is_zero: B::Prop,
    pub diff_is_one: B::Prop,
    pub diff_is_greater_than_precision: B::Prop,
    pub diff_is_two_to_precision: B::Prop,
    pub diff_is_greater_than_precision_plus_one: B::Prop,
}

pub fn add_exponent_compare<B: Backend>(
    exponent_width: usize,
    significand_width: usize,
    left_exponent: &B::Sbv,
    right_exponent: &B::Sbv,
    known_in_correct_order: &B::Prop,
) -> ExponentCompareInfo<B> {
    debug_assert_eq!(left_exponent.width() + 1, exponent_width);
    debug_assert_eq!(right_exponent.width() + 1, exponent_width);

    let exponent_difference =
        left_exponent.extend(1).sub(&right_exponent.extend(1));

    let sign_bit = exponent_difference
        .reinterpret()
        .extract(exponent_width - 1, exponent_width - 1)
        .is_all_ones();
    let left_is_max = known_in_correct_order.or(&sign_bit.not());

    let max_exponent = B::Sbv::select(
        &left_is_max,
        &left_exponent.extend(1),
        &right_exponent.extend(1),
    );
    // The largest negative value is not obtainable so negation is safe.
    let absolute_exponent_difference = B::Sbv::select(
        &left_is_max,
        &exponent_difference,
        &exponent_difference.modular_negate(),
    );

    B::invariant(&B::Sbv::zero(exponent_width).le(&absolute_exponent_difference));

    let diff_is_zero = absolute_exponent_difference.eq_bv(&B::Sbv::zero(exponent_width));
    let diff_is_one = absolute_exponent_difference.eq_bv(&B::Sbv::one(exponent_width));
    let diff_is_greater_than_precision = B::Sbv::constant(
        exponent_width,
        significand_width as u64,
    )
    .lt(&absolute_exponent_difference);
    let diff_is_two_to_precision = diff_is_zero
        .not()
        .and(&diff_is_one.not())
        .and(&diff_is_greater_than_precision.not());
    let diff_is_greater_than_precision_plus_one = B::Sbv::constant(
        exponent_width,
        (significand_width + 1) as u64,
    )
    .lt(&absolute_exponent_difference);

    ExponentCompareInfo {
        left_is_max,
        max_exponent,
        absolute_exponent_difference,
        diff_is_zero,
        diff_is_one,
        diff_is_greater_than_precision,
        diff_is_two_to_precision,
        diff_is_greater_than_precision_plus_one,
    }
}

/// An unrounded result plus what the operation knows about the rounder
/// branches it cannot take.
pub struct FloatWithKnownFlags<B: Backend> {
    pub uf: UnpackedFloat<B>,
    pub known: KnownFlags<B>,
}

/// The arithmetic (normal / subnormal) case of addition, in a format
/// extended by one exponent bit and guard and sticky significand bits.
///
/// Note that this needs the rounding mode; an oddity due to the way the
/// sign of a fully cancelled result is generated.
pub fn arithmetic_add<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    is_add: &B::Prop,
    known_in_correct_order: &B::Prop,
    ec: &ExponentCompareInfo<B>,
) -> FloatWithKnownFlags<B> {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    // Work out if an effective subtraction
    let effective_add = left.sign().xor(right.sign()).xor(is_add);

    let exponent_width = left.exponent().width() + 1;
    let significand_width = left.significand().width();
    debug_assert!(exponent_width <= significand_width);

    /* The exponent difference and effective add imply a large amount about
    ** the output exponent and flags; R denotes reachable via rounding up:
    **
    ** Case       A. max(l,r)+1     B. max(l,r)   C. max(l,r)-1   D. max-k     E. zero
    ** Eff. Add
    **  diff = 0     Y, sticky 0
    **  diff = 1     Y, sticky 0, R   Y, sticky 0
    **  diff : [2,p] R                Y
    **  diff > p     R                Y
    **
    ** Eff. Sub
    **  diff = 0                                    Y, exact       Y, exact     Y
    **  diff = 1                      Y, sticky 0   Y, exact       Y, exact
    **  diff : [2,p]                  Y, R          Y
    **  diff > p                      Y, R          Y
    */

    // Rounder flags
    let no_overflow = effective_add.not();
    let no_underflow = B::Prop::lit(true);
    let subnormal_exact = B::Prop::lit(true);
    let no_significand_overflow = effective_add.and(&ec.diff_is_zero).or(
        &effective_add
            .not()
            .and(&ec.diff_is_zero.or(&ec.diff_is_one)),
    );

    let sticky_bit_is_zero = ec.diff_is_zero.or(&ec.diff_is_one);

    // Work out the ordering
    let left_larger = known_in_correct_order.or(&ec.left_is_max.and(
        &ec.diff_is_zero
            .not()
            .or(&left.significand().ge(right.significand())),
    ));

    // Extend the significands to give room for the carry plus the guard
    // and sticky bits
    let lsig = B::Ubv::select(&left_larger, left.significand(), right.significand())
        .extend(1)
        .append(&B::Ubv::zero(2));
    let ssig = B::Ubv::select(&left_larger, right.significand(), left.significand())
        .extend(1)
        .append(&B::Ubv::zero(2));

    let result_sign = B::Prop::select(
        &left_larger,
        left.sign(),
        &is_add.not().xor(right.sign()),
    );

    // Extended so no information is lost; negate before the shift so that
    // sign-extension works.
    let negated_smaller = conditional_negate(&effective_add.not(), &ssig);

    let shift_amount = ec
        .absolute_exponent_difference
        .reinterpret() // Safe as >= 0
        .resize(negated_smaller.width()); // Safe while significands are wider than exponents

    // Shift the smaller significand
    let shifted = sticky_right_shift(&negated_smaller, &shift_amount);

    // Fast path the common case; +1 to avoid issues with the guard bit
    let negated_aligned_smaller = B::Ubv::select(
        &ec.diff_is_greater_than_precision_plus_one,
        &B::Ubv::select(
            &effective_add,
            &B::Ubv::zero(negated_smaller.width()),
            &B::Ubv::zero(negated_smaller.width()).bit_not(),
        ),
        &shifted.sign_extended_result,
    );
    // Has to be separate otherwise the align up may convert it to the
    // guard bit.
    let shifted_sticky_bit = B::Ubv::select(
        &ec.diff_is_greater_than_precision,
        &B::Ubv::one(negated_smaller.width()),
        &shifted.sticky_bit,
    );

    // Sum and re-align
    let sum = lsig.modular_add(&negated_aligned_smaller);

    let sum_width = sum.width();
    let top_bit = sum.extract(sum_width - 1, sum_width - 1);
    let aligned_bit = sum.extract(sum_width - 2, sum_width - 2);
    let lower_bit = sum.extract(sum_width - 3, sum_width - 3);

    let overflow = top_bit.is_all_zeros().not();
    let cancel = top_bit.is_all_zeros().and(&aligned_bit.is_all_zeros());
    let minor_cancel = cancel.and(&lower_bit.is_all_ones());
    let major_cancel = cancel.and(&lower_bit.is_all_zeros());
    let full_cancel = major_cancel.and(&sum.is_all_zeros());

    B::invariant(&effective_add.and(&ec.diff_is_zero).implies(&overflow));
    B::invariant(&overflow.implies(
        &effective_add.and(&ec.diff_is_greater_than_precision.not()),
    ));
    B::invariant(&cancel.implies(&effective_add.not()));
    B::invariant(&major_cancel.implies(&ec.diff_is_zero.or(&ec.diff_is_one)));

    let exact = cancel.and(&ec.diff_is_zero.or(&ec.diff_is_one)); // For completeness

    let aligned_sum = conditional_left_shift_one(
        &minor_cancel,
        &conditional_right_shift_one(&overflow, &sum),
    );

    let exponent_correction_term = B::Sbv::select(
        &minor_cancel,
        &B::Sbv::one(exponent_width).neg(),
        &B::Sbv::select(
            &overflow,
            &B::Sbv::one(exponent_width),
            &B::Sbv::zero(exponent_width),
        ),
    );

    let corrected_exponent = ec.max_exponent.add(&exponent_correction_term); // Safe due to extension

    // Watch closely...
    let sticky_bit = B::Ubv::select(
        &sticky_bit_is_zero.or(&major_cancel),
        &B::Ubv::zero(sum_width),
        &shifted_sticky_bit.bit_or(
            &B::Ubv::select(&overflow.not(), &B::Ubv::zero(1), &sum.extract(0, 0))
                .extend(sum_width - 1),
        ),
    );

    // Put it back together
    let sum_result = UnpackedFloat::<B>::new(
        result_sign,
        corrected_exponent,
        aligned_sum.bit_or(&sticky_bit).contract(1),
    );

    // We return something in an extended format:
    //  * one extra exponent bit to deal with the overflow case,
    //  * two extra significand bits for the guard and sticky bits.
    let extended_format = Format::new(
        format.exponent_width() + 1,
        format.significand_width() + 2,
    );

    // Deal with the major cancellation case. It would be nice to use
    // normalise_up_detect_zero but the sign of the zero depends on the
    // rounding mode.
    let addition_result = UnpackedFloat::select(
        &full_cancel,
        &UnpackedFloat::make_zero(&extended_format, rounding_mode.eq_rm(&B::rtn())),
        &UnpackedFloat::select(
            &major_cancel,
            &sum_result.normalise_up(&extended_format),
            &sum_result,
        ),
    );

    // All subnormals generated by addition are exact, so with the extended
    // exponent the result is valid in the extended format.
    B::postcondition(&addition_result.valid(&extended_format));

    FloatWithKnownFlags {
        uf: addition_result,
        known: KnownFlags::new(
            no_overflow,
            no_underflow,
            exact,
            subnormal_exact,
            no_significand_overflow,
        ),
    }
}

/// The fully general special-case wrapper.
///
/// `left_id` is the value returned in the "right is zero" identity case;
/// fused multiply-add computes the flags for `left` and the identity value
/// differently so they are separate arguments. `return_left` /
/// `return_right` allow the very-far-path bypass.
///
/// Subtle trick: as the input to this will have been rounded it has an ITE
/// with default values "on top", thus doing the special cases first
/// (inner) rather than last (outer) allows them to be compacted better.
pub fn add_addition_special_cases_complete<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    left_id: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    return_left: &B::Prop,
    return_right: &B::Prop,
    addition_result: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    // NaN
    let either_argument_nan = left.nan().or(right.nan());
    let both_infinity = left.inf().and(right.inf());
    let signs_match = left.sign().eq_prop(right.sign());
    let compatable_signs = is_add.xor(&signs_match.not());

    let generates_nan = either_argument_nan.or(&both_infinity.and(&compatable_signs.not()));

    // Inf
    let generates_inf = both_infinity
        .and(&compatable_signs)
        .or(&left.inf().and(&right.inf().not()))
        .or(&left.inf().not().and(right.inf()));

    let sign_of_inf = B::Prop::select(
        left.inf(),
        left.sign(),
        &is_add.xor(&right.sign().not()),
    );

    // Zero
    let both_zero = left.zero().and(right.zero());
    let flip_right_sign = is_add.not().xor(right.sign());
    let sign_of_zero = B::Prop::select(
        &rounding_mode.eq_rm(&B::rtn()),
        &left.sign().or(&flip_right_sign),
        &left.sign().and(&flip_right_sign),
    );

    let id_left = left.zero().not().and(right.zero());
    let id_right = left.zero().and(&right.zero().not());

    // At most one of id_left, id_right, generates_nan, generates_inf and
    // both_zero is true.
    UnpackedFloat::select(
        &id_right.or(return_right),
        &UnpackedFloat::select(is_add, right, &negate(format, right)),
        &UnpackedFloat::select(
            &id_left.or(return_left),
            left_id,
            &UnpackedFloat::select(
                &generates_nan,
                &UnpackedFloat::make_nan(format),
                &UnpackedFloat::select(
                    &generates_inf,
                    &UnpackedFloat::make_inf(format, sign_of_inf),
                    &UnpackedFloat::select(
                        &both_zero,
                        &UnpackedFloat::make_zero(format, sign_of_zero),
                        addition_result,
                    ),
                ),
            ),
        ),
    )
}

/// As the complete version but with the identity case distinguished; this
/// is the form fused multiply-add needs.
pub fn add_addition_special_cases_with_id<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    left_id: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    addition_result: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    add_addition_special_cases_complete(
        format,
        rounding_mode,
        left,
        left_id,
        right,
        &B::Prop::lit(false),
        &B::Prop::lit(false),
        addition_result,
        is_add,
    )
}

/// This is the usual case; use this one.
pub fn add_addition_special_cases<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    addition_result: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    add_addition_special_cases_complete(
        format,
        rounding_mode,
        left,
        left,
        right,
        &B::Prop::lit(false),
        &B::Prop::lit(false),
        addition_result,
        is_add,
    )
}

/// Add (or subtract, when `is_add` is false) two unpacked floats.
pub fn add<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    let known_in_correct_order = B::Prop::lit(false);

    let ec = add_exponent_compare::<B>(
        left.exponent().width() + 1,
        left.significand().width(),
        left.exponent(),
        right.exponent(),
        &known_in_correct_order,
    );

    let addition_result = arithmetic_add(
        format,
        rounding_mode,
        left,
        right,
        is_add,
        &known_in_correct_order,
        &ec,
    );

    let rounded_addition_result = custom_rounder(
        format,
        rounding_mode,
        &addition_result.uf,
        &addition_result.known,
    );

    let result = add_addition_special_cases(
        format,
        rounding_mode,
        left,
        right,
        &rounded_addition_result,
        is_add,
    );

    B::postcondition(&result.valid(format));

    result
}

/// As `add`, but when the exponent difference exceeds the significand
/// length plus one the result is taken directly from the larger operand
/// (possibly stepped by an ulp through the rounding decision). Rare in
/// execution but common in proving.
pub fn add_with_bypass<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    let known_in_correct_order = B::Prop::lit(false);

    let ec = add_exponent_compare::<B>(
        left.exponent().width() + 1,
        left.significand().width(),
        left.exponent(),
        right.exponent(),
        &known_in_correct_order,
    );

    let addition_result = arithmetic_add(
        format,
        rounding_mode,
        left,
        right,
        is_add,
        &known_in_correct_order,
        &ec,
    );

    let rounded_addition_result = custom_rounder(
        format,
        rounding_mode,
        &addition_result.uf,
        &addition_result.known,
    );

    // Given there have to be cases for "return left" and "return right" to
    // handle zeros, we might as well use them when addition behaves like
    // max. Note that this is possible but more complex with just
    // diff_is_greater_than_precision.
    let enable_bypass = ec
        .diff_is_greater_than_precision_plus_one
        .and(&left.nan().not())
        .and(&left.inf().not())
        .and(&left.zero().not())
        .and(&right.nan().not())
        .and(&right.inf().not())
        .and(&right.zero().not());

    // Duplication but easier to recompute than to pass
    let effective_add = left.sign().xor(right.sign()).xor(is_add);
    // CAUTION : only true in the enable_bypass case!
    let result_sign = B::Prop::select(
        &known_in_correct_order.or(&ec.left_is_max),
        left.sign(),
        &is_add.not().xor(right.sign()),
    );

    // An optimisation that assumes only RNE uses the even bit; this needs
    // to change to implement round-to-odd or the
    // diff_is_greater_than_precision case.
    let significand_even = B::Prop::lit(true);
    let far_round_up = rounding_decision::<B>(
        rounding_mode,
        &result_sign,
        &significand_even,
        &effective_add.not(),
        &B::Prop::lit(true),
        &B::Prop::lit(false),
    );

    // Unchanged if adding and rounded down, or subtracting and rounded up
    let round_in_correct_direction = effective_add.xor(&far_round_up);

    let return_left = enable_bypass
        .and(&ec.left_is_max)
        .and(&round_in_correct_direction);
    let return_right = enable_bypass
        .and(&ec.left_is_max.not())
        .and(&round_in_correct_direction);

    let result = add_addition_special_cases_complete(
        format,
        rounding_mode,
        left,
        left,
        right,
        &return_left,
        &return_right,
        &rounded_addition_result,
        is_add,
    );

    B::postcondition(&result.valid(format));

    result
}

/// The literal two-path adder.
pub fn dual_path_arithmetic_add<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    let extended_format = Format::new(
        format.exponent_width() + 1,
        format.significand_width() + 2,
    );

    // Compute the exponent difference and swap the two arguments if needed
    let initial_exponent_difference =
        expanding_subtract(left.exponent(), right.exponent());
    let ed_width = initial_exponent_difference.width();
    let ed_width_zero = B::Sbv::zero(ed_width);
    let ordering_correct = initial_exponent_difference.gt(&ed_width_zero).or(
        &initial_exponent_difference
            .eq_bv(&ed_width_zero)
            .and(&left.significand().ge(right.significand())),
    );

    let larger = UnpackedFloat::select(&ordering_correct, left, right);
    let smaller = UnpackedFloat::select(&ordering_correct, right, left);
    let exponent_difference = B::Sbv::select(
        &ordering_correct,
        &initial_exponent_difference,
        &initial_exponent_difference.modular_negate(),
    );

    let result_sign = B::Prop::select(
        &ordering_correct,
        left.sign(),
        &is_add.not().xor(right.sign()),
    );

    // Work out if an effective subtraction
    let effective_add = larger.sign().xor(smaller.sign()).xor(is_add);

    // Extend the significands to give room for the carry plus the guard
    // and sticky bits
    let lsig = larger.significand().extend(1).append(&B::Ubv::zero(2));
    let ssig = smaller.significand().extend(1).append(&B::Ubv::zero(2));

    // The near path is only needed for things that can cancel more than
    // one bit.
    let far_path = exponent_difference
        .gt(&B::Sbv::one(ed_width))
        .or(&effective_add);

    // Far path : align
    let negated_smaller = B::Ubv::select(&effective_add, &ssig, &ssig.modular_negate());

    let shift_amount = exponent_difference
        .reinterpret() // Safe as >= 0
        .resize(ssig.width());

    let negated_aligned_smaller = negated_smaller.sign_extend_right_shift(&shift_amount);
    // Has to be separate otherwise the align up may convert it to the
    // guard bit.
    let shifted_sticky_bit = right_shift_sticky_bit(&negated_smaller, &shift_amount);

    // Far path : sum and re-align
    let sum = lsig.modular_add(&negated_aligned_smaller);

    let sum_width = sum.width();
    let top_bit = sum.extract(sum_width - 1, sum_width - 1);
    let center_bit = sum.extract(sum_width - 2, sum_width - 2);

    let no_overflow = top_bit.is_all_zeros(); // Only correct for an effective add
    let no_cancel = center_bit.is_all_ones();

    let aligned_sum = B::Ubv::select(
        &effective_add,
        &B::Ubv::select(
            &no_overflow,
            &sum,
            // Cheap sticky right shift
            &sum
                .shift_right(&B::Ubv::one(sum_width))
                .bit_or(&sum.bit_and(&B::Ubv::one(sum_width))),
        ),
        &B::Ubv::select(
            &no_cancel,
            &sum,
            // When this loses data the result is not used.
            &sum.modular_left_shift(&B::Ubv::one(sum_width)),
        ),
    );

    // So that increment and decrement do not overflow
    let extended_larger_exponent = larger.exponent().extend(1);
    let corrected_exponent = B::Sbv::select(
        &effective_add,
        &B::Sbv::select(
            &no_overflow,
            &extended_larger_exponent,
            &extended_larger_exponent.increment(),
        ),
        &B::Sbv::select(
            &no_cancel,
            &extended_larger_exponent,
            &extended_larger_exponent.decrement(),
        ),
    );

    // Far path : construct the result
    let far_path_result = UnpackedFloat::<B>::new(
        result_sign.clone(),
        corrected_exponent,
        aligned_sum.bit_or(&shifted_sticky_bit).contract(1),
    );

    // Near path : align
    let exponent_difference_all_zeros = exponent_difference.is_all_zeros();
    let near_aligned_smaller = B::Ubv::select(
        &exponent_difference_all_zeros,
        &ssig,
        &ssig.shift_right(&B::Ubv::one(ssig.width())),
    );

    // Near path : sum and realign
    let near_sum = lsig.sub(&near_aligned_smaller);

    let full_cancel = near_sum.is_all_zeros();
    let near_no_cancel = near_sum.extract(sum_width - 2, sum_width - 2).is_all_ones();

    // In the case this is used, the cut bits are all 0.
    let chopped_near_sum = near_sum.extract(sum_width - 3, 1);
    let cancellation = UnpackedFloat::<B>::new(
        result_sign.clone(),
        larger.exponent().decrement(),
        chopped_near_sum,
    );

    // Near path : construct the result
    let near_path_result =
        UnpackedFloat::<B>::new(result_sign, extended_larger_exponent, near_sum.contract(1));

    // Bring the paths together
    let addition_result = UnpackedFloat::select(
        &far_path,
        &far_path_result,
        &UnpackedFloat::select(
            &full_cancel,
            &UnpackedFloat::make_zero(&extended_format, rounding_mode.eq_rm(&B::rtn())),
            &UnpackedFloat::select(
                &near_no_cancel,
                &near_path_result,
                &cancellation.normalise_up(format).extend(1, 2),
            ),
        ),
    );

    B::postcondition(&addition_result.valid(&extended_format));

    addition_result
}

/// True if and only if adding these would be a catastrophic cancellation,
/// i.e. the addition cancels `cancel_amount` or more of the leading
/// significand bits, leaving only low bits.
pub fn is_catastrophic_cancellation<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    cancel_amount: usize,
    is_add: &B::Prop,
) -> B::Prop {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));
    // Cancelling 0 bits is not meaningful and cancelling 1 is common on
    // subtract and arguably not an error; more than the significand is
    // impossible.
    debug_assert!(cancel_amount >= 2);
    debug_assert!(cancel_amount <= format.significand_width());

    // 1. It has to be an effective subtraction
    let effective_add = left.sign().xor(right.sign()).xor(is_add);

    // 2. Both operands must be normal or subnormal numbers
    let left_special = left.nan().or(left.inf()).or(left.zero());
    let right_special = right.nan().or(right.inf()).or(right.zero());

    // 3.A. the exponents are equal and so are the leading bits, or
    // 3.B. the difference is one and the significands sit either side of
    //      a power of two
    let known_in_correct_order = B::Prop::lit(false);
    let ec = add_exponent_compare::<B>(
        left.exponent().width() + 1,
        left.significand().width(),
        left.exponent(),
        right.exponent(),
        &known_in_correct_order,
    );

    // The MSB of the significand can be ignored as by the invariants it is
    // always 1.
    let significand_width = format.significand_width();
    let top_bit = significand_width - 2;
    let bottom_bit = significand_width - cancel_amount;

    let left_extract = left.significand().extract(top_bit, bottom_bit);
    let right_extract = right.significand().extract(top_bit, bottom_bit);

    B::Prop::select(
        &effective_add
            .not()
            .and(&left_special.not())
            .and(&right_special.not()),
        &B::Prop::select(
            &ec.diff_is_zero,
            &left_extract.eq_bv(&right_extract),
            &B::Prop::select(
                &ec.diff_is_one,
                &B::Prop::select(
                    &ec.left_is_max,
                    &left_extract
                        .is_all_zeros()
                        .and(&right_extract.is_all_ones()),
                    &right_extract
                        .is_all_zeros()
                        .and(&left_extract.is_all_ones()),
                ),
                &B::Prop::lit(false),
            ),
        ),
        &B::Prop::lit(false),
    )
}

/// Addition via the two-path adder and the plain rounder.
pub fn dual_path_add<B: Backend>(
    format: &Format,
    rounding_mode: &B::Rm,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    is_add: &B::Prop,
) -> UnpackedFloat<B> {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    let addition_result = dual_path_arithmetic_add(format, rounding_mode, left, right, is_add);

    let rounded_addition_result =
        crate::rounder::round(format, rounding_mode, &addition_result);

    let result = add_addition_special_cases(
        format,
        rounding_mode,
        left,
        right,
        &rounded_addition_result,
        is_add,
    );

    B::postcondition(&result.valid(format));

    result
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::exec::{Exec, UWord};
    use crate::float::RoundingMode::{self, *};
    use crate::float::{FP32, FP64};
    use crate::packing::{pack, unpack};
    use crate::utils::{get_special_test_values, Lfsr};

    fn add32(rm: RoundingMode, a: u32, b: u32, is_add: bool) -> u32 {
        let x = unpack::<Exec>(&FP32, &UWord::new(32, a as u128));
        let y = unpack::<Exec>(&FP32, &UWord::new(32, b as u128));
        let r = add(&FP32, &rm, &x, &y, &is_add);
        pack::<Exec>(&FP32, &r).as_u128() as u32
    }

    fn add64(rm: RoundingMode, a: u64, b: u64, is_add: bool) -> u64 {
        let x = unpack::<Exec>(&FP64, &UWord::new(64, a as u128));
        let y = unpack::<Exec>(&FP64, &UWord::new(64, b as u128));
        let r = add(&FP64, &rm, &x, &y, &is_add);
        pack::<Exec>(&FP64, &r).as_u128() as u64
    }

    // Check against the host float, bit identical or both NaN.
    fn check32(a: f32, b: f32, is_add: bool) {
        let expected = if is_add { a + b } else { a - b };
        let got = f32::from_bits(add32(NearestTiesToEven, a.to_bits(), b.to_bits(), is_add));
        assert!(
            expected.is_nan() && got.is_nan() || expected.to_bits() == got.to_bits(),
            "{} {} {} -> {:#010x} expected {:#010x}",
            a,
            if is_add { "+" } else { "-" },
            b,
            got.to_bits(),
            expected.to_bits()
        );
    }

    #[test]
    fn test_add_simple() {
        // 1.0 + 1.0 == 2.0
        assert_eq!(add32(NearestTiesToEven, 0x3f80_0000, 0x3f80_0000, true), 0x4000_0000);
        // +Inf + -Inf == qNaN
        assert_eq!(add32(NearestTiesToEven, 0x7f80_0000, 0xff80_0000, true), 0x7fc0_0000);
        // min subnormal + min subnormal
        assert_eq!(add32(NearestTiesToEven, 0x0000_0001, 0x0000_0001, true), 0x0000_0002);
    }

    #[test]
    fn test_add_special_values() {
        for v0 in get_special_test_values() {
            for v1 in get_special_test_values() {
                check32(v0 as f32, v1 as f32, true);
                check32(v0 as f32, v1 as f32, false);
            }
        }
    }

    #[test]
    fn test_add_random_vals() {
        let mut lfsr = Lfsr::new();
        for _ in 0..50000 {
            let a = f32::from_bits(lfsr.get());
            let b = f32::from_bits(lfsr.get());
            check32(a, b, true);
            check32(a, b, false);
        }
    }

    #[test]
    fn test_add_random_vals_f64() {
        let mut lfsr = Lfsr::new();
        for _ in 0..20000 {
            let a = f64::from_bits(lfsr.get64());
            let b = f64::from_bits(lfsr.get64());
            let r0 = f64::from_bits(add64(NearestTiesToEven, a.to_bits(), b.to_bits(), true));
            let r1 = a + b;
            assert!(r1.is_nan() && r0.is_nan() || r0.to_bits() == r1.to_bits());
        }
    }

    #[test]
    fn test_add_denormals() {
        let values = [
            0x0000_0001u32,
            0x0000_0010,
            0x007f_ffff,
            0x0080_0000,
            0x0080_0001,
            0x8000_0001,
            0x807f_ffff,
        ];
        for a in values {
            for b in values {
                check32(f32::from_bits(a), f32::from_bits(b), true);
                check32(f32::from_bits(a), f32::from_bits(b), false);
            }
        }
    }

    #[test]
    fn test_add_zero_signs() {
        let pz = 0x0000_0000u32;
        let nz = 0x8000_0000u32;
        // Table 6.3: the sign of an exact zero sum.
        for rm in [NearestTiesToEven, NearestTiesToAway, Zero, Positive] {
            assert_eq!(add32(rm, pz, pz, true), pz);
            assert_eq!(add32(rm, nz, nz, true), nz);
            assert_eq!(add32(rm, pz, nz, true), pz);
            assert_eq!(add32(rm, nz, pz, true), pz);
        }
        // Round toward negative prefers -0.
        assert_eq!(add32(Negative, pz, pz, true), pz);
        assert_eq!(add32(Negative, nz, nz, true), nz);
        assert_eq!(add32(Negative, pz, nz, true), nz);
        assert_eq!(add32(Negative, nz, pz, true), nz);
        // x - x is an exact cancelled zero of the same table.
        let one = 0x3f80_0000u32;
        assert_eq!(add32(NearestTiesToEven, one, one, false), pz);
        assert_eq!(add32(Negative, one, one, false), nz);
    }

    #[test]
    fn test_add_directed_rounding() {
        let one = 0x3f80_0000u32;
        let min_sub = 0x0000_0001u32;
        // 1.0 + tiny: the sum is inexact so the directed modes step.
        assert_eq!(add32(Positive, one, min_sub, true), one + 1);
        assert_eq!(add32(Negative, one, min_sub, true), one);
        assert_eq!(add32(Zero, one, min_sub, true), one);
        assert_eq!(add32(NearestTiesToEven, one, min_sub, true), one);
        // 1.0 - tiny rounds down to the next representable under RTN/RTZ.
        assert_eq!(add32(Negative, one, min_sub, false), 0x3f7f_ffff);
        assert_eq!(add32(Zero, one, min_sub, false), 0x3f7f_ffff);
        assert_eq!(add32(Positive, one, min_sub, false), one);
    }

    #[test]
    fn test_add_overflow_rounding() {
        let max = 0x7f7f_ffffu32; // Largest finite binary32.
        assert_eq!(add32(NearestTiesToEven, max, max, true), 0x7f80_0000);
        assert_eq!(add32(Zero, max, max, true), max);
        assert_eq!(add32(Negative, max, max, true), max);
        assert_eq!(add32(Positive, max, max, true), 0x7f80_0000);
    }

    #[test]
    fn test_add_with_bypass_matches_add() {
        let mut lfsr = Lfsr::new();
        let modes = [NearestTiesToEven, NearestTiesToAway, Zero, Positive, Negative];
        for _ in 0..4000 {
            let a = lfsr.get();
            let b = lfsr.get();
            for rm in modes {
                for is_add in [true, false] {
                    let x = unpack::<Exec>(&FP32, &UWord::new(32, a as u128));
                    let y = unpack::<Exec>(&FP32, &UWord::new(32, b as u128));
                    let plain = pack::<Exec>(&FP32, &add(&FP32, &rm, &x, &y, &is_add));
                    let bypass =
                        pack::<Exec>(&FP32, &add_with_bypass(&FP32, &rm, &x, &y, &is_add));
                    assert_eq!(plain.as_u128(), bypass.as_u128(), "a={:#x} b={:#x}", a, b);
                }
            }
        }
        // Force the very-far path for both orders and both signs.
        let big = 0x7f00_0000u32;
        let small = 0x0080_0000u32;
        for rm in modes {
            for (a, b) in [(big, small), (small, big), (big | 0x8000_0000, small)] {
                for is_add in [true, false] {
                    assert_eq!(
                        add32(rm, a, b, is_add),
                        {
                            let x = unpack::<Exec>(&FP32, &UWord::new(32, a as u128));
                            let y = unpack::<Exec>(&FP32, &UWord::new(32, b as u128));
                            pack::<Exec>(&FP32, &add_with_bypass(&FP32, &rm, &x, &y, &is_add))
                                .as_u128() as u32
                        },
                        "a={:#x} b={:#x}",
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_catastrophic_cancellation() {
        let uf = |bits: u32| unpack::<Exec>(&FP32, &UWord::new(32, bits as u128));
        let cc = |a: u32, b: u32, amount: usize, is_add: bool| {
            is_catastrophic_cancellation(&FP32, &uf(a), &uf(b), amount, &is_add)
        };
        // 1.75 - (1.75 - ulp) shares the two leading fraction bits.
        assert!(cc(0x3fe0_0000, 0x3fdf_ffff, 2, false));
        // Neighbouring values share their whole leading prefix.
        assert!(cc(0x3fe0_0001, 0x3fe0_0000, 8, false));
        assert!(cc(0x3fe0_0001, 0x3fe0_0000, 23, false));
        // 2.0 - (2.0 - ulp) cancels across the power of two.
        assert!(cc(0x4000_0000, 0x3fff_ffff, 2, false));
        assert!(cc(0x3fff_ffff, 0x4000_0000, 2, false));
        // 1.5 - 1.25 only cancels a single bit.
        assert!(!cc(0x3fc0_0000, 0x3fa0_0000, 2, false));
        // Effective additions and special values never qualify.
        assert!(!cc(0x3fe0_0000, 0x3fdf_ffff, 2, true));
        assert!(cc(0x3fe0_0000, 0xbfdf_ffff, 2, true));
        assert!(!cc(0x7f80_0000, 0x7f80_0000, 2, false));
        assert!(!cc(0x0000_0000, 0x0000_0000, 2, false));
    }

    #[test]
    fn test_dual_path_matches_add() {
        let mut lfsr = Lfsr::new();
        for _ in 0..10000 {
            let a = lfsr.get();
            let b = lfsr.get();
            let x = unpack::<Exec>(&FP32, &UWord::new(32, a as u128));
            let y = unpack::<Exec>(&FP32, &UWord::new(32, b as u128));
            for is_add in [true, false] {
                let plain = pack::<Exec>(
                    &FP32,
                    &add(&FP32, &NearestTiesToEven, &x, &y, &is_add),
                );
                let dual = pack::<Exec>(
                    &FP32,
                    &dual_path_add(&FP32, &NearestTiesToEven, &x, &y, &is_add),
                );
                assert_eq!(plain.as_u128(), dual.as_u128(), "a={:#x} b={:#x}", a, b);
            }
        }
    }
}
