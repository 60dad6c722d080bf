use crate::runtime::{
    RuntimeContext, RuntimeError, RuntimeErrorKind,
    value::{self, Value},
};

use super::helpers::{arg_bool, arg_number, arg_string, check_arity};

pub(super) fn builtin_equals(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "equals")?;
    let same = value::equals(&args[0], &args[1])?;
    Ok(ctx.types().make_bool(same))
}

pub(super) fn builtin_not(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "not")?;
    let b = arg_bool(&args, 0, "not")?;
    Ok(ctx.types().make_bool(!b))
}

pub(super) fn builtin_less_than(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "less_than")?;
    let a = arg_number(&args, 0, "less_than")?;
    let b = arg_number(&args, 1, "less_than")?;
    Ok(ctx.types().make_bool(a < b))
}

pub(super) fn builtin_cond(_: &mut dyn RuntimeContext, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 3, "cond")?;
    let chosen = if arg_bool(&args, 0, "cond")? { 1 } else { 2 };
    Ok(args.swap_remove(chosen))
}

pub(super) fn builtin_assert(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "assert")?;
    if !arg_bool(&args, 0, "assert")? {
        return Err(RuntimeErrorKind::AssertionFailed.into());
    }
    Ok(ctx.types().null())
}

pub(super) fn builtin_raise(_: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "raise")?;
    let message = arg_string(&args, 0, "raise")?;
    Err(RuntimeErrorKind::UserRaised(message.to_string()).into())
}

/// Writes the inputs, separated by spaces, to the `info` log.
pub(super) fn builtin_print(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let line: Vec<String> = args.iter().map(value::to_string).collect();
    log::info!("{}", line.join(" "));
    Ok(ctx.types().null())
}

pub(super) fn builtin_to_string(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "to_string")?;
    Ok(ctx.types().make_string(&value::to_string(&args[0])))
}

pub(super) fn builtin_concat(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let joined: String = args.iter().map(value::to_string).collect();
    Ok(ctx.types().make_string(&joined))
}

/// Fresh on every evaluation; the counter belongs to the world.
pub(super) fn builtin_unique_id(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 0, "unique_id")?;
    let id = ctx.next_unique_id();
    Ok(ctx.types().make_int(id))
}

/// True on the first evaluation and whenever the input differs from the
/// value seen last time.
pub(super) fn builtin_changed(ctx: &mut dyn RuntimeContext, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "changed")?;
    let current = args.swap_remove(0);
    let changed = match ctx.state() {
        Some(slot) => {
            let changed = slot.is_null() || !value::equals(slot, &current).unwrap_or(false);
            *slot = current;
            changed
        }
        None => true,
    };
    Ok(ctx.types().make_bool(changed))
}
