use crate::runtime::{RuntimeContext, RuntimeError, value::Value};

use super::helpers::{arg_int, arg_number, check_arity};

pub(super) fn builtin_add_i(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "add_i")?;
    let a = arg_int(&args, 0, "add_i")?;
    let b = arg_int(&args, 1, "add_i")?;
    Ok(ctx.types().make_int(a.wrapping_add(b)))
}

pub(super) fn builtin_add_f(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "add_f")?;
    let a = arg_number(&args, 0, "add_f")?;
    let b = arg_number(&args, 1, "add_f")?;
    Ok(ctx.types().make_float(a + b))
}

pub(super) fn builtin_sub_i(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "sub_i")?;
    let a = arg_int(&args, 0, "sub_i")?;
    let b = arg_int(&args, 1, "sub_i")?;
    Ok(ctx.types().make_int(a.wrapping_sub(b)))
}

pub(super) fn builtin_sub_f(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "sub_f")?;
    let a = arg_number(&args, 0, "sub_f")?;
    let b = arg_number(&args, 1, "sub_f")?;
    Ok(ctx.types().make_float(a - b))
}

pub(super) fn builtin_mult_i(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "mult_i")?;
    let a = arg_int(&args, 0, "mult_i")?;
    let b = arg_int(&args, 1, "mult_i")?;
    Ok(ctx.types().make_int(a.wrapping_mul(b)))
}

pub(super) fn builtin_mult_f(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "mult_f")?;
    let a = arg_number(&args, 0, "mult_f")?;
    let b = arg_number(&args, 1, "mult_f")?;
    Ok(ctx.types().make_float(a * b))
}

/// Always float division; dividing by zero gives an infinity.
pub(super) fn builtin_div(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "div")?;
    let a = arg_number(&args, 0, "div")?;
    let b = arg_number(&args, 1, "div")?;
    Ok(ctx.types().make_float(a / b))
}

pub(super) fn builtin_neg(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "neg")?;
    let x = arg_number(&args, 0, "neg")?;
    Ok(ctx.types().make_float(-x))
}

/// Angles are in radians.
pub(super) fn builtin_sin(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "sin")?;
    let x = arg_number(&args, 0, "sin")?;
    Ok(ctx.types().make_float(x.sin()))
}

pub(super) fn builtin_cos(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "cos")?;
    let x = arg_number(&args, 0, "cos")?;
    Ok(ctx.types().make_float(x.cos()))
}
