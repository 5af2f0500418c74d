//! # Randomness
//!
//! Draws from the calling unit's own PRNG, so a fixed seed makes a unit's
//! random choices reproducible across runs.

use rand::Rng;

use crate::script::atoms::helpers::{expect_arity, integer};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::value::Value;

/// Pseudo-random float in [0.0, 1.0).
///
/// Usage: (random)
pub const ATOM_RANDOM: AtomFn = |ctx, args| {
    expect_arity(ctx, "random", &args, 0)?;
    let value = ctx.unit().with_rng(|rng| rng.gen::<f64>());
    Ok(Value::Float(value))
};

/// Pseudo-random int in [lo, hi], both inclusive.
///
/// Usage: (random-int <lo> <hi>)
///
/// Example:
///   (random-int 1 6) ; => 4 (example)
pub const ATOM_RANDOM_INT: AtomFn = |ctx, args| {
    expect_arity(ctx, "random-int", &args, 2)?;
    let lo = integer(ctx, "random-int", &args[0])?;
    let hi = integer(ctx, "random-int", &args[1])?;
    if lo > hi {
        return Err(ctx.raise("ValueError", format!("empty range for random-int ({}, {})", lo, hi)));
    }
    let value = ctx.unit().with_rng(|rng| rng.gen_range(lo..=hi));
    Ok(Value::Int(value))
};

pub fn register_random_atoms(registry: &mut AtomRegistry) {
    registry.register("random", ATOM_RANDOM);
    registry.register("random-int", ATOM_RANDOM_INT);
}
