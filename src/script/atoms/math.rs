//! # Mathematical Operations
//!
//! ## Atoms Provided
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `//`, `%`, `**`
//! - **Math Functions**: `abs`, `min`, `max`, `round`, `sqrt`
//!
//! Integer arithmetic stays integral until a float is involved. `/` always
//! yields a float.

use crate::script::atoms::helpers::{expect_arity, expect_arity_range, expect_min_arity, integer, number};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::value::Value;

fn all_ints(args: &[Value]) -> bool {
    args.iter().all(|v| matches!(v, Value::Int(_)))
}

fn overflow(ctx: &CallContext<'_>) -> Raised {
    ctx.raise("ArithmeticError", "integer overflow")
}

fn zero_division(ctx: &CallContext<'_>, message: &str) -> Raised {
    ctx.raise("ZeroDivisionError", message)
}

// ============================================================================
// ARITHMETIC OPERATIONS
// ============================================================================

/// Adds numbers, or concatenates strings or lists.
///
/// Usage: (+ <a> <b> ...)
///
/// Example:
///   (+ 1 2 3)      ; => 6
///   (+ "ab" "cd")  ; => "abcd"
pub const ATOM_ADD: AtomFn = |ctx, args| {
    if !args.is_empty() && args.iter().all(|v| matches!(v, Value::Str(_))) {
        let joined: String = args.iter().filter_map(Value::as_str).collect();
        return Ok(Value::Str(joined));
    }
    if !args.is_empty() && args.iter().all(|v| matches!(v, Value::List(_))) {
        let mut items = Vec::new();
        for arg in &args {
            if let Value::List(list) = arg {
                items.extend(list.borrow().iter().cloned());
            }
        }
        return Ok(Value::list(items));
    }
    if all_ints(&args) {
        let mut sum: i64 = 0;
        for arg in &args {
            if let Value::Int(i) = arg {
                sum = sum.checked_add(*i).ok_or_else(|| overflow(ctx))?;
            }
        }
        return Ok(Value::Int(sum));
    }
    let mut sum = 0.0;
    for arg in &args {
        sum += number(ctx, "+", arg)?;
    }
    Ok(Value::Float(sum))
};

/// Subtracts numbers; negates a single argument.
///
/// Usage: (- <a> <b> ...)
///
/// Example:
///   (- 5 2) ; => 3
///   (- 4)   ; => -4
pub const ATOM_SUB: AtomFn = |ctx, args| {
    expect_min_arity(ctx, "-", &args, 1)?;
    if all_ints(&args) {
        let ints: Vec<i64> = args
            .iter()
            .filter_map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        if ints.len() == 1 {
            return ints[0].checked_neg().map(Value::Int).ok_or_else(|| overflow(ctx));
        }
        let mut result = ints[0];
        for i in &ints[1..] {
            result = result.checked_sub(*i).ok_or_else(|| overflow(ctx))?;
        }
        return Ok(Value::Int(result));
    }
    let first = number(ctx, "-", &args[0])?;
    if args.len() == 1 {
        return Ok(Value::Float(-first));
    }
    let mut result = first;
    for arg in &args[1..] {
        result -= number(ctx, "-", arg)?;
    }
    Ok(Value::Float(result))
};

/// Multiplies numbers; repeats a string by an int.
///
/// Usage: (* <a> <b> ...)
///
/// Example:
///   (* 2 3 4)  ; => 24
///   (* "ab" 2) ; => "abab"
pub const ATOM_MUL: AtomFn = |ctx, args| {
    if let [Value::Str(s), Value::Int(n)] = args.as_slice() {
        return Ok(Value::Str(s.repeat((*n).max(0) as usize)));
    }
    if all_ints(&args) {
        let mut product: i64 = 1;
        for arg in &args {
            if let Value::Int(i) = arg {
                product = product.checked_mul(*i).ok_or_else(|| overflow(ctx))?;
            }
        }
        return Ok(Value::Int(product));
    }
    let mut product = 1.0;
    for arg in &args {
        product *= number(ctx, "*", arg)?;
    }
    Ok(Value::Float(product))
};

/// True division.
///
/// Usage: (/ <a> <b>)
///
///   Returns: Float. Raises ZeroDivisionError when <b> is zero.
///
/// Example:
///   (/ 7 2) ; => 3.5
pub const ATOM_DIV: AtomFn = |ctx, args| {
    expect_arity(ctx, "/", &args, 2)?;
    let a = number(ctx, "/", &args[0])?;
    let b = number(ctx, "/", &args[1])?;
    if b == 0.0 {
        return Err(zero_division(ctx, "division by zero"));
    }
    Ok(Value::Float(a / b))
};

/// Floor division.
///
/// Usage: (// <a> <b>)
///
/// Example:
///   (// 7 2)  ; => 3
///   (// -7 2) ; => -4
pub const ATOM_FLOOR_DIV: AtomFn = |ctx, args| {
    expect_arity(ctx, "//", &args, 2)?;
    if let [Value::Int(a), Value::Int(b)] = args.as_slice() {
        if *b == 0 {
            return Err(zero_division(ctx, "integer division or modulo by zero"));
        }
        let quotient = a.checked_div(*b).ok_or_else(|| overflow(ctx))?;
        let adjust = a % b != 0 && ((*a < 0) != (*b < 0));
        return Ok(Value::Int(if adjust { quotient - 1 } else { quotient }));
    }
    let a = number(ctx, "//", &args[0])?;
    let b = number(ctx, "//", &args[1])?;
    if b == 0.0 {
        return Err(zero_division(ctx, "float floor division by zero"));
    }
    Ok(Value::Float((a / b).floor()))
};

/// Modulo; the result takes the sign of the divisor.
///
/// Usage: (% <a> <b>)
///
/// Example:
///   (% 7 3)  ; => 1
///   (% -7 3) ; => 2
pub const ATOM_MOD: AtomFn = |ctx, args| {
    expect_arity(ctx, "%", &args, 2)?;
    if let [Value::Int(a), Value::Int(b)] = args.as_slice() {
        if *b == 0 {
            return Err(zero_division(ctx, "integer division or modulo by zero"));
        }
        let r = a.checked_rem(*b).ok_or_else(|| overflow(ctx))?;
        return Ok(Value::Int(if r != 0 && ((r < 0) != (*b < 0)) { r + b } else { r }));
    }
    let a = number(ctx, "%", &args[0])?;
    let b = number(ctx, "%", &args[1])?;
    if b == 0.0 {
        return Err(zero_division(ctx, "float modulo"));
    }
    Ok(Value::Float(a - b * (a / b).floor()))
};

/// Exponentiation.
///
/// Usage: (** <base> <exp>)
///
/// Example:
///   (** 2 10)  ; => 1024
///   (** 2 -1)  ; => 0.5
pub const ATOM_POW: AtomFn = |ctx, args| {
    expect_arity(ctx, "**", &args, 2)?;
    if let [Value::Int(base), Value::Int(exp)] = args.as_slice() {
        if *exp >= 0 {
            let exp = u32::try_from(*exp).map_err(|_| overflow(ctx))?;
            return base.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow(ctx));
        }
    }
    let base = number(ctx, "**", &args[0])?;
    let exp = number(ctx, "**", &args[1])?;
    if base == 0.0 && exp < 0.0 {
        return Err(zero_division(ctx, "0.0 cannot be raised to a negative power"));
    }
    Ok(Value::Float(base.powf(exp)))
};

// ============================================================================
// MATH FUNCTIONS
// ============================================================================

/// Absolute value.
///
/// Usage: (abs <n>)
pub const ATOM_ABS: AtomFn = |ctx, args| {
    expect_arity(ctx, "abs", &args, 1)?;
    match &args[0] {
        Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| overflow(ctx)),
        other => Ok(Value::Float(number(ctx, "abs", other)?.abs())),
    }
};

fn extreme(ctx: &CallContext<'_>, name: &str, args: Vec<Value>, pick_greater: bool) -> Result<Value, Raised> {
    let candidates = match args.as_slice() {
        [Value::List(items)] => items.borrow().clone(),
        _ => args,
    };
    let Some(first) = candidates.first().cloned() else {
        return Err(ctx.raise("ValueError", format!("{}() arg is an empty sequence", name)));
    };
    let mut best = first;
    let mut best_n = number(ctx, name, &best)?;
    for candidate in candidates.into_iter().skip(1) {
        let n = number(ctx, name, &candidate)?;
        if (pick_greater && n > best_n) || (!pick_greater && n < best_n) {
            best = candidate;
            best_n = n;
        }
    }
    Ok(best)
}

/// Smallest argument, or smallest element of a single list argument.
///
/// Usage: (min <a> <b> ...) | (min <list>)
pub const ATOM_MIN: AtomFn = |ctx, args| extreme(ctx, "min", args, false);

/// Largest argument, or largest element of a single list argument.
///
/// Usage: (max <a> <b> ...) | (max <list>)
pub const ATOM_MAX: AtomFn = |ctx, args| extreme(ctx, "max", args, true);

/// Rounds half away from zero. Without digits the result is an int.
///
/// Usage: (round <n> [digits])
///
/// Example:
///   (round 2.6)      ; => 3
///   (round 3.14159 2) ; => 3.14
pub const ATOM_ROUND: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "round", &args, 1, 2)?;
    let n = number(ctx, "round", &args[0])?;
    match args.get(1) {
        None => match &args[0] {
            Value::Int(i) => Ok(Value::Int(*i)),
            _ => Ok(Value::Int(n.round() as i64)),
        },
        Some(digits) => {
            let digits = integer(ctx, "round", digits)?;
            let factor = 10f64.powi(digits as i32);
            Ok(Value::Float((n * factor).round() / factor))
        }
    }
};

/// Square root.
///
/// Usage: (sqrt <n>)
///
///   Raises ValueError for negative input.
pub const ATOM_SQRT: AtomFn = |ctx, args| {
    expect_arity(ctx, "sqrt", &args, 1)?;
    let n = number(ctx, "sqrt", &args[0])?;
    if n < 0.0 {
        return Err(ctx.raise("ValueError", "math domain error"));
    }
    Ok(Value::Float(n.sqrt()))
};

pub fn register_math_atoms(registry: &mut AtomRegistry) {
    registry.register("+", ATOM_ADD);
    registry.register("-", ATOM_SUB);
    registry.register("*", ATOM_MUL);
    registry.register("/", ATOM_DIV);
    registry.register("//", ATOM_FLOOR_DIV);
    registry.register("%", ATOM_MOD);
    registry.register("**", ATOM_POW);
    registry.register("abs", ATOM_ABS);
    registry.register("min", ATOM_MIN);
    registry.register("max", ATOM_MAX);
    registry.register("round", ATOM_ROUND);
    registry.register("sqrt", ATOM_SQRT);
}
