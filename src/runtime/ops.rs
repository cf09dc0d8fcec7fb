//! Trapping numeric helpers for translated code
//!
//! The translator lowers every instruction that can fault into a call to one
//! of these helpers, so integer faults reach the trap translator as a
//! classified [`Trap`] instead of as undefined behaviour.

use super::trap::{Trap, TrapKind};

fn divide_by_zero() -> Trap {
    Trap::new(TrapKind::IntegerDivideByZero)
}

fn overflow() -> Trap {
    Trap::new(TrapKind::IntegerOverflow)
}

/// i32.div_s: traps on a zero divisor and on `i32::MIN / -1`
pub fn i32_div_s(c1: i32, c2: i32) -> Result<i32, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    c1.checked_div(c2).ok_or_else(overflow)
}

pub fn i32_div_u(c1: i32, c2: i32) -> Result<i32, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(((c1 as u32) / (c2 as u32)) as i32)
}

/// i32.rem_s: `i32::MIN % -1` is 0, not a fault
pub fn i32_rem_s(c1: i32, c2: i32) -> Result<i32, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(c1.wrapping_rem(c2))
}

pub fn i32_rem_u(c1: i32, c2: i32) -> Result<i32, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(((c1 as u32) % (c2 as u32)) as i32)
}

pub fn i64_div_s(c1: i64, c2: i64) -> Result<i64, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    c1.checked_div(c2).ok_or_else(overflow)
}

pub fn i64_div_u(c1: i64, c2: i64) -> Result<i64, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(((c1 as u64) / (c2 as u64)) as i64)
}

pub fn i64_rem_s(c1: i64, c2: i64) -> Result<i64, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(c1.wrapping_rem(c2))
}

pub fn i64_rem_u(c1: i64, c2: i64) -> Result<i64, Trap> {
    if c2 == 0 {
        return Err(divide_by_zero());
    }
    Ok(((c1 as u64) % (c2 as u64)) as i64)
}

/// i32.trunc_f64_s: NaN is an invalid conversion, anything that does not fit
/// after truncation (including infinities) is an overflow
pub fn i32_trunc_f64_s(value: f64) -> Result<i32, Trap> {
    if value.is_nan() {
        return Err(Trap::new(TrapKind::InvalidConversion));
    }

    let truncated = value.trunc();
    const MIN: f64 = -2147483648.0;
    const MAX: f64 = 2147483648.0;
    if !(MIN..MAX).contains(&truncated) {
        return Err(overflow());
    }
    Ok(truncated as i32)
}

pub fn i32_trunc_f64_u(value: f64) -> Result<i32, Trap> {
    if value.is_nan() {
        return Err(Trap::new(TrapKind::InvalidConversion));
    }

    // -0.5 truncates to -0.0, which is in range
    let truncated = value.trunc();
    if truncated == 0.0 {
        return Ok(0);
    }

    const MAX: f64 = 4294967296.0;
    if !(0.0..MAX).contains(&truncated) {
        return Err(overflow());
    }
    Ok(truncated as u32 as i32)
}
