use super::{ErrorCode, ErrorType};

pub const UNKNOWN_FUNCTION: ErrorCode = ErrorCode {
    code: "E2000",
    title: "UNKNOWN FUNCTION",
    error_type: ErrorType::Static,
    hint: Some("Check that the function is defined or registered before it is called."),
};

pub const UNKNOWN_IDENTIFIER: ErrorCode = ErrorCode {
    code: "E2001",
    title: "UNKNOWN IDENTIFIER",
    error_type: ErrorType::Static,
    hint: Some("Names resolve when the term is built; bind the name before using it."),
};

pub const UNKNOWN_FIELD: ErrorCode = ErrorCode {
    code: "E2002",
    title: "UNKNOWN FIELD",
    error_type: ErrorType::Static,
    hint: None,
};

pub const UNKNOWN_TYPE: ErrorCode = ErrorCode {
    code: "E2003",
    title: "UNKNOWN TYPE",
    error_type: ErrorType::Static,
    hint: Some("Register the type with the world before declaring values of it."),
};

pub const INPUT_TYPE_MISMATCH: ErrorCode = ErrorCode {
    code: "E2004",
    title: "INPUT TYPE MISMATCH",
    error_type: ErrorType::Static,
    hint: None,
};

pub const NULL_FUNCTION: ErrorCode = ErrorCode {
    code: "E2005",
    title: "NULL FUNCTION",
    error_type: ErrorType::Static,
    hint: Some("The function this term applied was deleted."),
};

pub const NULL_INPUT: ErrorCode = ErrorCode {
    code: "E2006",
    title: "NULL INPUT",
    error_type: ErrorType::Static,
    hint: Some("An input of this term was deleted."),
};

pub const WRONG_NUMBER_OF_INPUTS: ErrorCode = ErrorCode {
    code: "E2007",
    title: "WRONG NUMBER OF INPUTS",
    error_type: ErrorType::Static,
    hint: None,
};

pub const INPUT_CYCLE: ErrorCode = ErrorCode {
    code: "E2008",
    title: "INPUT CYCLE",
    error_type: ErrorType::Static,
    hint: None,
};
