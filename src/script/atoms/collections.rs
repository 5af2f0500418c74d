//! # Collection Operations
//!
//! Lists and dicts are shared, mutable references. Atoms ending in `!`
//! mutate their first argument in place; the rest return new values.
//!
//! ## Atoms Provided
//!
//! - **Construction**: `list`, `dict`, `range`, `copy`
//! - **Access**: `len`, `get`, `keys`, `values`, `contains?`
//! - **Mutation**: `put!`, `append!`, `pop!`
//! - **Ordering**: `sort`, `reverse`

use indexmap::IndexMap;
use std::cmp::Ordering;
use unicode_segmentation::UnicodeSegmentation;

use crate::script::atoms::helpers::{
    dict, expect_arity, expect_arity_range, integer, list, normalize_index, string,
};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::value::Value;

fn key_error(ctx: &CallContext<'_>, key: &str) -> Raised {
    ctx.raise("KeyError", format!("'{}'", key))
}

fn dict_key(ctx: &CallContext<'_>, value: &Value) -> Result<String, Raised> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(ctx.raise(
            "TypeError",
            format!("dict keys must be str, not {}", other.type_name()),
        )),
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Builds a list from its arguments.
///
/// Usage: (list <a> <b> ...)
pub const ATOM_LIST: AtomFn = |_ctx, args| Ok(Value::list(args));

/// Builds a dict from alternating keys and values.
///
/// Usage: (dict <key> <value> ...)
///
/// Example:
///   (dict "a" 1 "b" 2) ; => {"a": 1, "b": 2}
pub const ATOM_DICT: AtomFn = |ctx, args| {
    if args.len() % 2 != 0 {
        return Err(ctx.raise("TypeError", "dict() expects key/value pairs"));
    }
    let mut entries = IndexMap::new();
    for pair in args.chunks(2) {
        entries.insert(dict_key(ctx, &pair[0])?, pair[1].clone());
    }
    Ok(Value::dict(entries))
};

/// Integer range, end exclusive.
///
/// Usage: (range <end>) | (range <start> <end> [step])
///
/// Example:
///   (range 3)       ; => [0, 1, 2]
///   (range 10 0 -5) ; => [10, 5]
pub const ATOM_RANGE: AtomFn = |ctx, args| {
    let bounds = args
        .iter()
        .map(|a| integer(ctx, "range", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, end, step) = match bounds.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] => (*start, *end, *step),
        _ => {
            expect_arity_range(ctx, "range", &args, 1, 3)?;
            return Ok(Value::Nil);
        }
    };
    if step == 0 {
        return Err(ctx.raise("ValueError", "range() arg 3 must not be zero"));
    }
    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        items.push(Value::Int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::list(items))
};

/// Shallow copy of a list or dict; other values are returned as is.
///
/// Usage: (copy <collection>)
pub const ATOM_COPY: AtomFn = |ctx, args| {
    expect_arity(ctx, "copy", &args, 1)?;
    Ok(match &args[0] {
        Value::List(items) => Value::list(items.borrow().clone()),
        Value::Dict(map) => Value::dict(map.borrow().clone()),
        other => other.clone(),
    })
};

// ============================================================================
// ACCESS
// ============================================================================

/// Length of a string, list or dict.
///
/// Usage: (len <collection>)
pub const ATOM_LEN: AtomFn = |ctx, args| {
    expect_arity(ctx, "len", &args, 1)?;
    args[0]
        .length()
        .map(|n| Value::Int(n as i64))
        .ok_or_else(|| {
            ctx.raise(
                "TypeError",
                format!("object of type '{}' has no len()", args[0].type_name()),
            )
        })
};

/// Element of a list or string by index, or of a dict by key.
///
/// Usage: (get <collection> <key> [default])
///
///   Raises IndexError/KeyError when absent and no default is given.
///
/// Example:
///   (get (list 1 2 3) -1)   ; => 3
///   (get (dict) "x" 0)      ; => 0
pub const ATOM_GET: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "get", &args, 2, 3)?;
    let default = args.get(2).cloned();
    match &args[0] {
        Value::List(items) => {
            let index = integer(ctx, "get", &args[1])?;
            let items = items.borrow();
            match normalize_index(index, items.len()) {
                Some(i) => Ok(items[i].clone()),
                None => default.ok_or_else(|| ctx.raise("IndexError", "list index out of range")),
            }
        }
        Value::Str(s) => {
            let index = integer(ctx, "get", &args[1])?;
            let chars: Vec<char> = s.chars().collect();
            match normalize_index(index, chars.len()) {
                Some(i) => Ok(Value::Str(chars[i].to_string())),
                None => default.ok_or_else(|| ctx.raise("IndexError", "string index out of range")),
            }
        }
        Value::Dict(map) => {
            let key = dict_key(ctx, &args[1])?;
            let found = map.borrow().get(&key).cloned();
            match found {
                Some(value) => Ok(value),
                None => default.ok_or_else(|| key_error(ctx, &key)),
            }
        }
        other => Err(ctx.raise(
            "TypeError",
            format!("'{}' object is not subscriptable", other.type_name()),
        )),
    }
};

/// Keys of a dict, in insertion order.
///
/// Usage: (keys <dict>)
pub const ATOM_KEYS: AtomFn = |ctx, args| {
    expect_arity(ctx, "keys", &args, 1)?;
    let map = dict(ctx, "keys", &args[0])?;
    let keys = map.borrow().keys().cloned().map(Value::Str).collect();
    Ok(Value::list(keys))
};

/// Values of a dict, in insertion order.
///
/// Usage: (values <dict>)
pub const ATOM_VALUES: AtomFn = |ctx, args| {
    expect_arity(ctx, "values", &args, 1)?;
    let map = dict(ctx, "values", &args[0])?;
    let values = map.borrow().values().cloned().collect();
    Ok(Value::list(values))
};

/// Membership: list element, dict key, or substring.
///
/// Usage: (contains? <collection> <item>)
pub const ATOM_CONTAINS: AtomFn = |ctx, args| {
    expect_arity(ctx, "contains?", &args, 2)?;
    let found = match (&args[0], &args[1]) {
        (Value::List(items), item) => items.borrow().iter().any(|v| v.equals(item)),
        (Value::Dict(map), Value::Str(key)) => map.borrow().contains_key(key),
        (Value::Dict(_), _) => false,
        (Value::Str(s), Value::Str(part)) => s.contains(part.as_str()),
        (Value::Str(_), other) => {
            return Err(ctx.raise(
                "TypeError",
                format!("'in <string>' requires string as left operand, not {}", other.type_name()),
            ))
        }
        (other, _) => {
            return Err(ctx.raise(
                "TypeError",
                format!("argument of type '{}' is not iterable", other.type_name()),
            ))
        }
    };
    Ok(Value::Bool(found))
};

// ============================================================================
// MUTATION
// ============================================================================

/// Sets a list slot or dict entry in place.
///
/// Usage: (put! <collection> <key> <value>)
pub const ATOM_PUT: AtomFn = |ctx, args| {
    expect_arity(ctx, "put!", &args, 3)?;
    match &args[0] {
        Value::List(items) => {
            let index = integer(ctx, "put!", &args[1])?;
            let mut items = items.borrow_mut();
            let Some(i) = normalize_index(index, items.len()) else {
                return Err(ctx.raise("IndexError", "list assignment index out of range"));
            };
            items[i] = args[2].clone();
        }
        Value::Dict(map) => {
            let key = dict_key(ctx, &args[1])?;
            map.borrow_mut().insert(key, args[2].clone());
        }
        other => {
            return Err(ctx.raise(
                "TypeError",
                format!("'{}' object does not support item assignment", other.type_name()),
            ))
        }
    }
    Ok(Value::Nil)
};

/// Appends to a list in place.
///
/// Usage: (append! <list> <item>)
pub const ATOM_APPEND: AtomFn = |ctx, args| {
    expect_arity(ctx, "append!", &args, 2)?;
    let items = list(ctx, "append!", &args[0])?;
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Nil)
};

/// Removes and returns an element.
///
/// Usage: (pop! <list> [index]) | (pop! <dict> <key> [default])
pub const ATOM_POP: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "pop!", &args, 1, 3)?;
    match &args[0] {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(ctx.raise("IndexError", "pop from empty list"));
            }
            let index = match args.get(1) {
                Some(index) => integer(ctx, "pop!", index)?,
                None => -1,
            };
            let Some(i) = normalize_index(index, items.len()) else {
                return Err(ctx.raise("IndexError", "pop index out of range"));
            };
            Ok(items.remove(i))
        }
        Value::Dict(map) => {
            let Some(key) = args.get(1) else {
                return Err(ctx.raise("TypeError", "pop!() on a dict expects a key"));
            };
            let key = dict_key(ctx, key)?;
            let removed = map.borrow_mut().shift_remove(&key);
            match removed {
                Some(value) => Ok(value),
                None => args.get(2).cloned().ok_or_else(|| key_error(ctx, &key)),
            }
        }
        other => Err(ctx.raise(
            "TypeError",
            format!("pop!() expected a list or dict, found {}", other.type_name()),
        )),
    }
};

// ============================================================================
// ORDERING
// ============================================================================

/// New list sorted ascending. Elements must be all numbers or all strings.
///
/// Usage: (sort <list>)
pub const ATOM_SORT: AtomFn = |ctx, args| {
    expect_arity(ctx, "sort", &args, 1)?;
    let items = list(ctx, "sort", &args[0])?;
    let mut items = items.borrow().clone();
    let all_numbers = items.iter().all(|v| v.as_number().is_some());
    let all_strings = items.iter().all(|v| matches!(v, Value::Str(_)));
    if !all_numbers && !all_strings {
        return Err(ctx.raise("TypeError", "sort() requires all numbers or all strings"));
    }
    items.sort_by(|a, b| match (a, b) {
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => a
            .as_number()
            .partial_cmp(&b.as_number())
            .unwrap_or(Ordering::Equal),
    });
    Ok(Value::list(items))
};

/// New list in reverse order, or a string reversed by grapheme cluster.
///
/// Usage: (reverse <list-or-string>)
///
/// Example:
///   (reverse "abc") ; => "cba"
pub const ATOM_REVERSE: AtomFn = |ctx, args| {
    expect_arity(ctx, "reverse", &args, 1)?;
    match &args[0] {
        Value::Str(_) => {
            let s = string(ctx, "reverse", &args[0])?;
            Ok(Value::Str(s.graphemes(true).rev().collect()))
        }
        other => {
            let items = list(ctx, "reverse", other)?;
            let reversed = items.borrow().iter().rev().cloned().collect();
            Ok(Value::list(reversed))
        }
    }
};

pub fn register_collection_atoms(registry: &mut AtomRegistry) {
    registry.register("list", ATOM_LIST);
    registry.register("dict", ATOM_DICT);
    registry.register("range", ATOM_RANGE);
    registry.register("copy", ATOM_COPY);
    registry.register("len", ATOM_LEN);
    registry.register("get", ATOM_GET);
    registry.register("keys", ATOM_KEYS);
    registry.register("values", ATOM_VALUES);
    registry.register("contains?", ATOM_CONTAINS);
    registry.register("put!", ATOM_PUT);
    registry.register("append!", ATOM_APPEND);
    registry.register("pop!", ATOM_POP);
    registry.register("sort", ATOM_SORT);
    registry.register("reverse", ATOM_REVERSE);
}
