//! Comparisons, classification and sign manipulation.
//!
//! Two equalities are provided: `smtlib_equal` is structural (every NaN is
//! equal to every NaN, zeros keep their signs apart), `ieee754_equal` is
//! the standard's `=` (NaN unequal to everything, -0 = +0).

use crate::backend::{Backend, BvT, PropT};
use crate::float::{Format, UnpackedFloat};

/// SMT-LIB equality.
pub fn smtlib_equal<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
) -> B::Prop {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    // Relies on a number of properties of the unpacked format, particularly
    // the use of default exponents, significands and signs.
    let flags_equal = left
        .nan()
        .eq_prop(right.nan())
        .and(&left.inf().eq_prop(right.inf()))
        .and(&left.zero().eq_prop(right.zero()))
        .and(&left.sign().eq_prop(right.sign()));

    let flags_and_exponent = flags_equal.and(&left.exponent().eq_bv(right.exponent()));

    B::Prop::select(
        &flags_and_exponent,
        &left.significand().eq_bv(right.significand()),
        &B::Prop::lit(false),
    )
}

/// IEEE-754 equality (not actually an equivalence relation but ...).
pub fn ieee754_equal<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
) -> B::Prop {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    // All comparisons with NaN are false
    let neither_nan = left.nan().not().and(&right.nan().not());

    // Both zeros are equal
    let both_zero = left.zero().and(right.zero());
    let neither_zero = left.zero().not().and(&right.zero().not());

    let flags_and_exponent = neither_nan.and(&both_zero.or(&neither_zero.and(
        &left
            .inf()
            .eq_prop(right.inf())
            .and(&left.sign().eq_prop(right.sign()))
            .and(&left.exponent().eq_bv(right.exponent())),
    )));

    B::Prop::select(
        &flags_and_exponent,
        &left.significand().eq_bv(right.significand()),
        &B::Prop::lit(false),
    )
}

/// The common comparison code: `<=` when `equality` is set, `<` otherwise,
/// with IEEE-754 semantics for NaN (unordered with everything, not even
/// equal to itself).
fn ordering<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    equality: &B::Prop,
) -> B::Prop {
    B::precondition(&left.valid(format));
    B::precondition(&right.valid(format));

    // All comparisons with NaN are false
    let neither_nan = left.nan().not().and(&right.nan().not());

    // Either is an infinity (wrong in the case of NaN but corrected)
    let inf_case = left
        .is_negative_inf()
        .and(&B::Prop::select(
            equality,
            &B::Prop::lit(true),
            &right.is_negative_inf().not(),
        ))
        .or(&right.is_positive_inf().and(&B::Prop::select(
            equality,
            &B::Prop::lit(true),
            &left.is_positive_inf().not(),
        )))
        .or(&B::Prop::select(
            equality,
            &left
                .inf()
                .and(right.inf())
                .and(&left.sign().eq_prop(right.sign())),
            &B::Prop::lit(false),
        ));

    // Either is a zero (wrong in the case of NaN but corrected)
    let zero_case = left
        .zero()
        .and(&right.zero().not())
        .and(&right.sign().not())
        .or(&right.zero().and(&left.zero().not()).and(left.sign()))
        .or(&B::Prop::select(
            equality,
            &left.zero().and(right.zero()),
            &B::Prop::lit(false),
        ));

    // Normal and subnormal case
    let normal_or_subnormal = neither_nan
        .and(&left.inf().not())
        .and(&right.inf().not())
        .and(&left.zero().not())
        .and(&right.zero().not());

    let negative_less_than_positive =
        normal_or_subnormal.and(left.sign()).and(&right.sign().not());

    let exponent_needed = normal_or_subnormal.and(&left.sign().eq_prop(right.sign()));

    let positive_case = left
        .sign()
        .not()
        .and(&right.sign().not())
        .and(&left.exponent().lt(right.exponent()));
    let negative_case = left
        .sign()
        .and(right.sign())
        .and(&left.exponent().gt(right.exponent()));

    let exponent_equal = left.exponent().eq_bv(right.exponent());

    let significand_needed = exponent_needed.and(&exponent_equal);

    let positive_ex_eq_case = left
        .sign()
        .not()
        .and(&right.sign().not())
        .and(&left.significand().lt(right.significand()));
    let negative_ex_eq_case = left
        .sign()
        .and(right.sign())
        .and(&left.significand().gt(right.significand()));

    let positive_ex_eq_case_eq = left
        .sign()
        .not()
        .and(&right.sign().not())
        .and(&left.significand().le(right.significand()));
    let negative_ex_eq_case_eq = left
        .sign()
        .and(right.sign())
        .and(&left.significand().ge(right.significand()));

    B::Prop::select(
        &normal_or_subnormal.not(),
        &neither_nan.and(&inf_case.or(&zero_case)),
        &B::Prop::select(
            &exponent_needed.not(),
            &negative_less_than_positive,
            &B::Prop::select(
                &significand_needed.not(),
                &positive_case.or(&negative_case),
                &B::Prop::select(
                    equality,
                    &positive_ex_eq_case_eq.or(&negative_ex_eq_case_eq),
                    &positive_ex_eq_case.or(&negative_ex_eq_case),
                ),
            ),
        ),
    )
}

pub fn less_than<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
) -> B::Prop {
    ordering(format, left, right, &B::Prop::lit(false))
}

pub fn less_than_or_equal<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
) -> B::Prop {
    ordering(format, left, right, &B::Prop::lit(true))
}

/// IEEE-754 maxNum. `zero_case` picks which zero wins for max(+0,-0);
/// the standard allows either.
pub fn max<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    zero_case: &B::Prop,
) -> UnpackedFloat<B> {
    UnpackedFloat::select(
        &left.nan().or(&ordering(format, left, right, zero_case)),
        right,
        left,
    )
}

/// IEEE-754 minNum; see `max` for the zero handling.
pub fn min<B: Backend>(
    format: &Format,
    left: &UnpackedFloat<B>,
    right: &UnpackedFloat<B>,
    zero_case: &B::Prop,
) -> UnpackedFloat<B> {
    UnpackedFloat::select(
        &right.nan().or(&ordering(format, left, right, zero_case)),
        left,
        right,
    )
}

/*** Classification ***/

pub fn is_normal<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan()
        .not()
        .and(&uf.inf().not())
        .and(&uf.zero().not())
        .and(&uf.in_normal_range(format, &B::Prop::lit(true)))
}

pub fn is_subnormal<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan()
        .not()
        .and(&uf.inf().not())
        .and(&uf.zero().not())
        .and(&uf.in_subnormal_range(format, &B::Prop::lit(true)))
}

pub fn is_zero<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.zero().clone()
}

pub fn is_infinite<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.inf().clone()
}

pub fn is_nan<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan().clone()
}

// Note these are the SMT-LIB semantics; NaN is neither positive nor negative.

pub fn is_positive<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan().not().and(&uf.sign().not())
}

pub fn is_negative<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan().not().and(uf.sign())
}

// C semantics

pub fn is_finite<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> B::Prop {
    B::precondition(&uf.valid(format));

    uf.nan().not().and(&uf.inf().not())
}

/*** Sign manipulation ***/

pub fn negate<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> UnpackedFloat<B> {
    B::precondition(&uf.valid(format));

    let result = uf.with_sign(uf.sign().not());

    B::postcondition(&result.valid(format));

    result
}

pub fn absolute<B: Backend>(format: &Format, uf: &UnpackedFloat<B>) -> UnpackedFloat<B> {
    B::precondition(&uf.valid(format));

    let result = uf.with_sign(B::Prop::lit(false));

    B::postcondition(&result.valid(format));

    result
}
