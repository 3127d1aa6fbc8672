use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
///
/// Every resource amount, capacity, multiplier and price in the simulation
/// uses this type so that ticks are bit-identical on every platform.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Balances at or below this value are pruned from resource maps.
pub const AMOUNT_EPSILON: Fixed64 = Fixed64::from_bits(1 << 12);

/// Convert an f64 to Fixed64, discarding values that are not finite or do
/// not fit. Use only at the content/UI boundary, never in the tick loop.
#[inline]
pub fn checked_amount(v: f64) -> Option<Fixed64> {
    if !v.is_finite() {
        return None;
    }
    Fixed64::checked_from_num(v)
}

/// Convert an f64 to Fixed64 (saturating). Use only for initialization.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    checked_amount(v).unwrap_or(if v.is_sign_negative() {
        Fixed64::MIN
    } else {
        Fixed64::MAX
    })
}

/// Convert Fixed64 to f64. Use only for display, never in the tick loop.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Whole-number Fixed64 from an integer count (levels, stacks, ticks).
#[inline]
pub fn from_count(n: u32) -> Fixed64 {
    Fixed64::saturating_from_num(n)
}

/// `ceil(a / b)`, or `None` when `b` is not positive.
#[inline]
pub fn ceil_div(a: Fixed64, b: Fixed64) -> Option<Fixed64> {
    if b <= Fixed64::ZERO {
        return None;
    }
    a.checked_div(b).map(|q| q.saturating_ceil())
}

/// `a / b` with zero for a non-positive divisor.
#[inline]
pub fn div_or_zero(a: Fixed64, b: Fixed64) -> Fixed64 {
    if b <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    a.checked_div(b).unwrap_or(Fixed64::MAX)
}
