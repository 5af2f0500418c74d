//! # I/O Operations
//!
//! Output goes to the calling unit's captured streams, input comes from the
//! stdin text supplied to the current load. File atoms touch the real
//! filesystem; their failures surface as `OSError` subclasses.
//!
//! ## Atoms Provided
//!
//! - **Streams**: `print`, `eprint`, `input`
//! - **Files**: `read-file`, `write-file`, `delete-file`, `file-exists?`

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::script::atoms::helpers::{expect_arity, expect_arity_range, string};
use crate::script::atoms::{AtomFn, AtomRegistry};
use crate::script::eval::CallContext;
use crate::script::exceptions::Raised;
use crate::script::value::Value;

fn os_error(ctx: &CallContext<'_>, error: &std::io::Error, path: &str) -> Raised {
    match error.kind() {
        ErrorKind::NotFound => ctx.raise(
            "FileNotFoundError",
            format!("[Errno 2] No such file or directory: '{}'", path),
        ),
        _ => ctx.raise("OSError", format!("{}: '{}'", error, path)),
    }
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// STREAMS
// ============================================================================

/// Writes the arguments, space separated, plus a newline to stdout.
///
/// Usage: (print <a> <b> ...)
///
/// Example:
///   (print "total:" 3) ; stdout: "total: 3\n"
pub const ATOM_PRINT: AtomFn = |ctx, args| {
    ctx.unit().write_stdout(&format!("{}\n", joined(&args)));
    Ok(Value::Nil)
};

/// Like `print`, but to stderr.
///
/// Usage: (eprint <a> <b> ...)
pub const ATOM_EPRINT: AtomFn = |ctx, args| {
    ctx.unit().write_stderr(&format!("{}\n", joined(&args)));
    Ok(Value::Nil)
};

/// Reads the next line of supplied input. The prompt, if any, goes to stdout.
///
/// Usage: (input [prompt])
///
///   Raises ValueError when input is exhausted.
pub const ATOM_INPUT: AtomFn = |ctx, args| {
    expect_arity_range(ctx, "input", &args, 0, 1)?;
    if let Some(prompt) = args.first() {
        ctx.unit().write_stdout(&prompt.to_string());
    }
    ctx.unit()
        .read_line()
        .map(Value::Str)
        .ok_or_else(|| ctx.raise("ValueError", "EOF when reading a line"))
};

// ============================================================================
// FILES
// ============================================================================

/// Usage: (read-file <path>)
pub const ATOM_READ_FILE: AtomFn = |ctx, args| {
    expect_arity(ctx, "read-file", &args, 1)?;
    let path = string(ctx, "read-file", &args[0])?;
    fs::read_to_string(path)
        .map(Value::Str)
        .map_err(|e| os_error(ctx, &e, path))
};

/// Writes `content` (display form) to `path`, replacing existing content.
///
/// Usage: (write-file <path> <content>)
pub const ATOM_WRITE_FILE: AtomFn = |ctx, args| {
    expect_arity(ctx, "write-file", &args, 2)?;
    let path = string(ctx, "write-file", &args[0])?;
    fs::write(path, args[1].to_string()).map_err(|e| os_error(ctx, &e, path))?;
    Ok(Value::Nil)
};

/// Usage: (delete-file <path>)
pub const ATOM_DELETE_FILE: AtomFn = |ctx, args| {
    expect_arity(ctx, "delete-file", &args, 1)?;
    let path = string(ctx, "delete-file", &args[0])?;
    fs::remove_file(path).map_err(|e| os_error(ctx, &e, path))?;
    Ok(Value::Nil)
};

/// Usage: (file-exists? <path>)
pub const ATOM_FILE_EXISTS: AtomFn = |ctx, args| {
    expect_arity(ctx, "file-exists?", &args, 1)?;
    let path = string(ctx, "file-exists?", &args[0])?;
    Ok(Value::Bool(Path::new(path).exists()))
};

pub fn register_io_atoms(registry: &mut AtomRegistry) {
    registry.register("print", ATOM_PRINT);
    registry.register("eprint", ATOM_EPRINT);
    registry.register("input", ATOM_INPUT);
    registry.register("read-file", ATOM_READ_FILE);
    registry.register("write-file", ATOM_WRITE_FILE);
    registry.register("delete-file", ATOM_DELETE_FILE);
    registry.register("file-exists?", ATOM_FILE_EXISTS);
}
