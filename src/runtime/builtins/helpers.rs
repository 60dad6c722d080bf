use crate::runtime::{RuntimeError, RuntimeErrorKind, value::Value};

pub(super) fn arity_error(name: &str, expected: &str, got: usize) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::WrongNumberOfInputs {
        function: name.to_string(),
        found: got,
        expected: expected.to_string(),
    })
}

pub(super) fn check_arity(args: &[Value], expected: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(arity_error(name, &expected.to_string(), args.len()));
    }
    Ok(())
}

pub(super) fn check_arity_range(args: &[Value], min: usize, max: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        return Err(arity_error(name, &format!("{}-{}", min, max), args.len()));
    }
    Ok(())
}

pub(super) fn invalid_input(name: &str, index: usize, expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::InvalidInput {
        function: name.to_string(),
        index,
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    })
}

fn arg<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a Value, RuntimeError> {
    args.get(index)
        .ok_or_else(|| arity_error(name, &(index + 1).to_string(), args.len()))
}

pub(super) fn arg_number(args: &[Value], index: usize, name: &str) -> Result<f64, RuntimeError> {
    let value = arg(args, index, name)?;
    value.as_number().ok_or_else(|| invalid_input(name, index, "number", value))
}

pub(super) fn arg_int(args: &[Value], index: usize, name: &str) -> Result<i64, RuntimeError> {
    let value = arg(args, index, name)?;
    value.as_int().ok_or_else(|| invalid_input(name, index, "int", value))
}

pub(super) fn arg_bool(args: &[Value], index: usize, name: &str) -> Result<bool, RuntimeError> {
    let value = arg(args, index, name)?;
    value.as_bool().ok_or_else(|| invalid_input(name, index, "bool", value))
}

pub(super) fn arg_list<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a [Value], RuntimeError> {
    let value = arg(args, index, name)?;
    value.as_list().ok_or_else(|| invalid_input(name, index, "List", value))
}

pub(super) fn arg_string<'a>(args: &'a [Value], index: usize, name: &str) -> Result<&'a str, RuntimeError> {
    let value = arg(args, index, name)?;
    value.as_str().ok_or_else(|| invalid_input(name, index, "string", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::BuiltinTypes;

    #[test]
    fn arity_messages() {
        let types = BuiltinTypes::new();
        let err = check_arity(&[types.make_int(1)], 2, "add_i").unwrap_err();
        assert_eq!(err.to_string(), "Wrong number of inputs to add_i (found 1, expected 2)");
        let err = check_arity_range(&[], 1, 2, "print").unwrap_err();
        assert_eq!(err.to_string(), "Wrong number of inputs to print (found 0, expected 1-2)");
    }

    #[test]
    fn typed_arguments() {
        let types = BuiltinTypes::new();
        let args = vec![types.make_int(3), types.make_string("x")];
        assert_eq!(arg_number(&args, 0, "f").unwrap(), 3.0);
        assert_eq!(arg_string(&args, 1, "f").unwrap(), "x");
        let err = arg_bool(&args, 1, "f").unwrap_err();
        assert_eq!(err.to_string(), "f expected input 1 to be bool, got string");
        assert!(arg_list(&args, 5, "f").is_err());
    }
}
