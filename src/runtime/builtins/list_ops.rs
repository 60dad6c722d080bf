use crate::runtime::{
    RuntimeContext, RuntimeError, RuntimeErrorKind,
    value::{Storage, Value},
};

use super::helpers::{arg_bool, arg_int, arg_list, check_arity, check_arity_range, invalid_input};

pub(super) fn builtin_list(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(ctx.types().make_list(args))
}

/// Element count of a list, character count of a string.
pub(super) fn builtin_length(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "length")?;
    let count = match args[0].storage() {
        Storage::List(items) => items.len(),
        Storage::String(s) => s.chars().count(),
        _ => return Err(invalid_input("length", 0, "List or string", &args[0])),
    };
    Ok(ctx.types().make_int(count as i64))
}

pub(super) fn builtin_get_index(_: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "get_index")?;
    let items = arg_list(&args, 0, "get_index")?;
    let index = arg_int(&args, 1, "get_index")?;
    usize::try_from(index)
        .ok()
        .and_then(|i| items.get(i))
        .cloned()
        .ok_or_else(|| {
            RuntimeError::new(RuntimeErrorKind::IndexOutOfRange {
                index,
                length: items.len(),
            })
        })
}

/// Keeps each item whose mask entry is true. The result has the type of the
/// input list.
pub(super) fn builtin_filter(_: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "filter")?;
    let items = arg_list(&args, 0, "filter")?;
    let mask = arg_list(&args, 1, "filter")?;
    if items.len() != mask.len() {
        return Err(RuntimeError::new(RuntimeErrorKind::InputsLengthMismatch {
            left: items.len(),
            right: mask.len(),
        }));
    }
    let mut kept = Vec::new();
    for (index, (item, keep)) in items.iter().zip(mask).enumerate() {
        match keep.as_bool() {
            Some(true) => kept.push(item.clone()),
            Some(false) => {}
            None => return Err(invalid_input("filter", index, "bool", keep)),
        }
    }
    Ok(Value::new(args[0].type_().clone(), Storage::List(kept)))
}

/// `range(end)` or `range(start, end)`, end exclusive.
pub(super) fn builtin_range(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity_range(&args, 1, 2, "range")?;
    let (start, end) = if args.len() == 1 {
        (0, arg_int(&args, 0, "range")?)
    } else {
        (arg_int(&args, 0, "range")?, arg_int(&args, 1, "range")?)
    };
    let types = ctx.types();
    let items = (start..end).map(|i| types.make_int(i)).collect();
    Ok(types.make_list(items))
}

/// Appends the items of every list input.
pub(super) fn builtin_concat_lists(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut out = Vec::new();
    for index in 0..args.len() {
        out.extend_from_slice(arg_list(&args, index, "extend")?);
    }
    Ok(ctx.types().make_list(out))
}

pub(super) fn builtin_any_true(ctx: &mut dyn RuntimeContext, args: Vec<Value>) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "any_true")?;
    let items = arg_list(&args, 0, "any_true")?;
    let mut found = false;
    for index in 0..items.len() {
        found |= arg_bool(items, index, "any_true")?;
    }
    Ok(ctx.types().make_bool(found))
}
