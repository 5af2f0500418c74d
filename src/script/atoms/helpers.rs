//! # Atom Helper Infrastructure
//!
//! Arity checks and typed argument extraction shared by all atom modules.
//! Every helper reports failure as a script exception raised at the call span.

use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::value::{DictRef, ListRef, Value};

pub type AtomResult<T> = Result<T, Raised>;

pub fn expect_arity(ctx: &CallContext<'_>, name: &str, args: &[Value], n: usize) -> AtomResult<()> {
    if args.len() == n {
        return Ok(());
    }
    Err(ctx.raise(
        "TypeError",
        format!("{}() takes {} arguments ({} given)", name, n, args.len()),
    ))
}

pub fn expect_arity_range(
    ctx: &CallContext<'_>,
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> AtomResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    Err(ctx.raise(
        "TypeError",
        format!(
            "{}() takes {} to {} arguments ({} given)",
            name,
            min,
            max,
            args.len()
        ),
    ))
}

pub fn expect_min_arity(ctx: &CallContext<'_>, name: &str, args: &[Value], min: usize) -> AtomResult<()> {
    if args.len() >= min {
        return Ok(());
    }
    Err(ctx.raise(
        "TypeError",
        format!("{}() takes at least {} arguments ({} given)", name, min, args.len()),
    ))
}

fn type_mismatch(ctx: &CallContext<'_>, name: &str, expected: &str, found: &Value) -> Raised {
    ctx.raise(
        "TypeError",
        format!("{}() expected {}, found {}", name, expected, found.type_name()),
    )
}

pub fn number(ctx: &CallContext<'_>, name: &str, value: &Value) -> AtomResult<f64> {
    value
        .as_number()
        .ok_or_else(|| type_mismatch(ctx, name, "a number", value))
}

pub fn integer(ctx: &CallContext<'_>, name: &str, value: &Value) -> AtomResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(type_mismatch(ctx, name, "an int", other)),
    }
}

pub fn string<'v>(ctx: &CallContext<'_>, name: &str, value: &'v Value) -> AtomResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| type_mismatch(ctx, name, "a str", value))
}

pub fn list(ctx: &CallContext<'_>, name: &str, value: &Value) -> AtomResult<ListRef> {
    match value {
        Value::List(items) => Ok(items.clone()),
        other => Err(type_mismatch(ctx, name, "a list", other)),
    }
}

pub fn dict(ctx: &CallContext<'_>, name: &str, value: &Value) -> AtomResult<DictRef> {
    match value {
        Value::Dict(map) => Ok(map.clone()),
        other => Err(type_mismatch(ctx, name, "a dict", other)),
    }
}

/// Resolves a possibly negative index against a sequence length.
pub fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}
