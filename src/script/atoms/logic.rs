//! # Logic and Comparison Operations
//!
//! ## Atoms Provided
//!
//! - **Equality**: `=`, `!=`
//! - **Ordering**: `<`, `>`, `<=`, `>=` (numbers with numbers, strings with strings)
//! - **Negation**: `not`

use std::cmp::Ordering;

use crate::script::atoms::helpers::{expect_arity, expect_min_arity};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::value::Value;

/// Orders two values, raising TypeError for incomparable kinds.
pub fn compare(ctx: &CallContext<'_>, op: &str, a: &Value, b: &Value) -> Result<Ordering, Raised> {
    let ordering = match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    };
    ordering.ok_or_else(|| {
        ctx.raise(
            "TypeError",
            format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op,
                a.type_name(),
                b.type_name()
            ),
        )
    })
}

fn chain(
    ctx: &CallContext<'_>,
    op: &str,
    args: &[Value],
    accept: fn(Ordering) -> bool,
) -> Result<Value, Raised> {
    expect_min_arity(ctx, op, args, 2)?;
    for pair in args.windows(2) {
        if !accept(compare(ctx, op, &pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// True if all arguments are equal.
///
/// Usage: (= <a> <b> ...)
///
/// Example:
///   (= 1 1.0)    ; => true
///   (= "a" "b")  ; => false
pub const ATOM_EQ: AtomFn = |ctx, args| {
    expect_min_arity(ctx, "=", &args, 2)?;
    Ok(Value::Bool(args.windows(2).all(|w| w[0].equals(&w[1]))))
};

/// True if the two arguments differ.
///
/// Usage: (!= <a> <b>)
pub const ATOM_NEQ: AtomFn = |ctx, args| {
    expect_arity(ctx, "!=", &args, 2)?;
    Ok(Value::Bool(!args[0].equals(&args[1])))
};

/// Usage: (< <a> <b> ...)
pub const ATOM_LT: AtomFn = |ctx, args| chain(ctx, "<", &args, |o| o == Ordering::Less);

/// Usage: (> <a> <b> ...)
pub const ATOM_GT: AtomFn = |ctx, args| chain(ctx, ">", &args, |o| o == Ordering::Greater);

/// Usage: (<= <a> <b> ...)
pub const ATOM_LE: AtomFn = |ctx, args| chain(ctx, "<=", &args, |o| o != Ordering::Greater);

/// Usage: (>= <a> <b> ...)
pub const ATOM_GE: AtomFn = |ctx, args| chain(ctx, ">=", &args, |o| o != Ordering::Less);

/// Logical negation by truthiness.
///
/// Usage: (not <value>)
///
/// Example:
///   (not nil) ; => true
pub const ATOM_NOT: AtomFn = |ctx, args| {
    expect_arity(ctx, "not", &args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
};

pub fn register_logic_atoms(registry: &mut AtomRegistry) {
    registry.register("=", ATOM_EQ);
    registry.register("!=", ATOM_NEQ);
    registry.register("<", ATOM_LT);
    registry.register(">", ATOM_GT);
    registry.register("<=", ATOM_LE);
    registry.register(">=", ATOM_GE);
    registry.register("not", ATOM_NOT);
}
