//! # Object Reflection
//!
//! ## Atoms Provided
//!
//! - **Types**: `type-name`, `isinstance?`
//! - **Attributes**: `getattr`, `setattr!`, `hasattr?`
//! - **Exceptions**: `error-message`

use crate::script::atoms::helpers::{expect_arity, expect_arity_range, string};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::eval::{instance_of, lookup_member};
use crate::script::value::Value;

/// Runtime type name of a value.
///
/// Usage: (type-name <value>)
///
/// Example:
///   (type-name 1.5) ; => "float"
pub const ATOM_TYPE_NAME: AtomFn = |ctx, args| {
    expect_arity(ctx, "type-name", &args, 1)?;
    Ok(Value::Str(args[0].type_name()))
};

/// Inheritance-aware type test against a class or a type name.
///
/// Usage: (isinstance? <value> <class-or-name>)
///
/// Example:
///   (isinstance? (ValueError "x") Exception) ; => true
///   (isinstance? 3 "int")                    ; => true
pub const ATOM_ISINSTANCE: AtomFn = |ctx, args| {
    expect_arity(ctx, "isinstance?", &args, 2)?;
    let matched = match &args[1] {
        Value::Class(class) => instance_of(&args[0], class),
        Value::Str(name) => args[0].type_lineage().iter().any(|n| n == name),
        other => {
            return Err(ctx.raise(
                "TypeError",
                format!("isinstance?() arg 2 must be a class or str, not {}", other.type_name()),
            ))
        }
    };
    Ok(Value::Bool(matched))
};

/// Reads an attribute by name, with an optional default.
///
/// Usage: (getattr <object> <name> [default])
pub const ATOM_GETATTR: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "getattr", &args, 2, 3)?;
    let name = string(ctx, "getattr", &args[1])?;
    match (lookup_member(&args[0], name), args.get(2)) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => ctx.interpreter().get_member(&args[0], name, ctx.span),
    }
};

/// Sets an attribute by name.
///
/// Usage: (setattr! <object> <name> <value>)
pub const ATOM_SETATTR: AtomFn = |ctx, args| {
    expect_arity(ctx, "setattr!", &args, 3)?;
    let name = string(ctx, "setattr!", &args[1])?;
    ctx.interpreter()
        .set_member(&args[0], name, args[2].clone(), ctx.span)?;
    Ok(Value::Nil)
};

/// Usage: (hasattr? <object> <name>)
pub const ATOM_HASATTR: AtomFn = |ctx, args| {
    expect_arity(ctx, "hasattr?", &args, 2)?;
    let name = string(ctx, "hasattr?", &args[1])?;
    Ok(Value::Bool(lookup_member(&args[0], name).is_some()))
};

/// Message carried by an exception.
///
/// Usage: (error-message <exception>)
pub const ATOM_ERROR_MESSAGE: AtomFn = |ctx, args| {
    expect_arity(ctx, "error-message", &args, 1)?;
    match args[0].as_exception() {
        Some(exception) => Ok(Value::Str(exception.message())),
        None => Err(ctx.raise(
            "TypeError",
            format!("error-message() expected an exception, found {}", args[0].type_name()),
        )),
    }
};

pub fn register_object_atoms(registry: &mut AtomRegistry) {
    registry.register("type-name", ATOM_TYPE_NAME);
    registry.register("isinstance?", ATOM_ISINSTANCE);
    registry.register("getattr", ATOM_GETATTR);
    registry.register("setattr!", ATOM_SETATTR);
    registry.register("hasattr?", ATOM_HASATTR);
    registry.register("error-message", ATOM_ERROR_MESSAGE);
}
