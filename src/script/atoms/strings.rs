//! # String Operations
//!
//! ## Atoms Provided
//!
//! - **Conversion**: `str`, `format`
//! - **Case and trimming**: `upper`, `lower`, `strip`
//! - **Splitting**: `split`, `join`
//! - **Inspection**: `starts-with?`, `ends-with?`
//! - **Rewriting**: `replace`

use crate::script::atoms::helpers::{expect_arity, expect_arity_range, expect_min_arity, list, string};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::value::Value;

/// Concatenates the display form of every argument.
///
/// Usage: (str <a> <b> ...)
///
/// Example:
///   (str "n=" 3) ; => "n=3"
pub const ATOM_STR: AtomFn = |_ctx, args| {
    let joined: String = args.iter().map(|v| v.to_string()).collect();
    Ok(Value::Str(joined))
};

/// Usage: (upper <s>)
pub const ATOM_UPPER: AtomFn = |ctx, args| {
    expect_arity(ctx, "upper", &args, 1)?;
    Ok(Value::Str(string(ctx, "upper", &args[0])?.to_uppercase()))
};

/// Usage: (lower <s>)
pub const ATOM_LOWER: AtomFn = |ctx, args| {
    expect_arity(ctx, "lower", &args, 1)?;
    Ok(Value::Str(string(ctx, "lower", &args[0])?.to_lowercase()))
};

/// Removes leading and trailing whitespace.
///
/// Usage: (strip <s>)
pub const ATOM_STRIP: AtomFn = |ctx, args| {
    expect_arity(ctx, "strip", &args, 1)?;
    Ok(Value::Str(string(ctx, "strip", &args[0])?.trim().to_string()))
};

/// Splits on a separator, or on runs of whitespace when none is given.
///
/// Usage: (split <s> [sep])
///
/// Example:
///   (split "a,b" ",")  ; => ["a", "b"]
///   (split " a  b ")  ; => ["a", "b"]
pub const ATOM_SPLIT: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "split", &args, 1, 2)?;
    let s = string(ctx, "split", &args[0])?;
    let parts: Vec<Value> = match args.get(1) {
        None => s.split_whitespace().map(Value::str).collect(),
        Some(sep) => {
            let sep = string(ctx, "split", sep)?;
            if sep.is_empty() {
                return Err(ctx.raise("ValueError", "empty separator"));
            }
            s.split(sep).map(Value::str).collect()
        }
    };
    Ok(Value::list(parts))
};

/// Joins a list of strings with a separator.
///
/// Usage: (join <sep> <list>)
///
/// Example:
///   (join "-" (list "a" "b")) ; => "a-b"
pub const ATOM_JOIN: AtomFn = |ctx, args| {
    expect_arity(ctx, "join", &args, 2)?;
    let sep = string(ctx, "join", &args[0])?;
    let items = list(ctx, "join", &args[1])?;
    let mut parts = Vec::new();
    for (i, item) in items.borrow().iter().enumerate() {
        match item {
            Value::Str(s) => parts.push(s.clone()),
            other => {
                return Err(ctx.raise(
                    "TypeError",
                    format!(
                        "sequence item {}: expected str instance, {} found",
                        i,
                        other.type_name()
                    ),
                ))
            }
        }
    }
    Ok(Value::Str(parts.join(sep)))
};

/// Usage: (starts-with? <s> <prefix>)
pub const ATOM_STARTS_WITH: AtomFn = |ctx, args| {
    expect_arity(ctx, "starts-with?", &args, 2)?;
    let s = string(ctx, "starts-with?", &args[0])?;
    let prefix = string(ctx, "starts-with?", &args[1])?;
    Ok(Value::Bool(s.starts_with(prefix)))
};

/// Usage: (ends-with? <s> <suffix>)
pub const ATOM_ENDS_WITH: AtomFn = |ctx, args| {
    expect_arity(ctx, "ends-with?", &args, 2)?;
    let s = string(ctx, "ends-with?", &args[0])?;
    let suffix = string(ctx, "ends-with?", &args[1])?;
    Ok(Value::Bool(s.ends_with(suffix)))
};

/// Replaces every occurrence of `old` with `new`.
///
/// Usage: (replace <s> <old> <new>)
pub const ATOM_REPLACE: AtomFn = |ctx, args| {
    expect_arity(ctx, "replace", &args, 3)?;
    let s = string(ctx, "replace", &args[0])?;
    let old = string(ctx, "replace", &args[1])?;
    let new = string(ctx, "replace", &args[2])?;
    Ok(Value::Str(s.replace(old, new)))
};

/// Fills each `{}` in the template with the next argument's display form.
///
/// Usage: (format <template> <a> ...)
///
/// Example:
///   (format "{} + {} = {}" 1 2 3) ; => "1 + 2 = 3"
pub const ATOM_FORMAT: AtomFn = |ctx, args| {
    expect_min_arity(ctx, "format", &args, 1)?;
    let template = string(ctx, "format", &args[0])?;
    let mut values = args[1..].iter();
    let mut out = String::with_capacity(template.len());
    let mut pieces = template.split("{}").peekable();
    let mut index = 0;
    while let Some(piece) = pieces.next() {
        out.push_str(piece);
        if pieces.peek().is_none() {
            break;
        }
        match values.next() {
            Some(value) => out.push_str(&value.to_string()),
            None => {
                return Err(ctx.raise(
                    "IndexError",
                    format!("Replacement index {} out of range", index),
                ))
            }
        }
        index += 1;
    }
    Ok(Value::Str(out))
};

pub fn register_string_atoms(registry: &mut AtomRegistry) {
    registry.register("str", ATOM_STR);
    registry.register("upper", ATOM_UPPER);
    registry.register("lower", ATOM_LOWER);
    registry.register("strip", ATOM_STRIP);
    registry.register("split", ATOM_SPLIT);
    registry.register("join", ATOM_JOIN);
    registry.register("starts-with?", ATOM_STARTS_WITH);
    registry.register("ends-with?", ATOM_ENDS_WITH);
    registry.register("replace", ATOM_REPLACE);
    registry.register("format", ATOM_FORMAT);
}
