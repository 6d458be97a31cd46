use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Every diagnostic the compiler can raise. The `Display` form of each
/// variant is the exact text written to standard error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Lexical error: {0}")]
    Lexical(String),

    #[error("Parse error: Expected: {expected}, Found: {found}")]
    Syntax { expected: String, found: String },

    #[error("The identifier {0} has already been declared.")]
    MultiplyDefined(String),

    #[error("The identifier {0} has not been declared.")]
    Undeclared(String),

    #[error("Type error: expected {expected} found {found}.")]
    TypeMismatch { expected: String, found: String },

    #[error("Type error: expected {expected} or {alternative}, found {found}.")]
    TypeMismatchEither {
        expected: String,
        alternative: String,
        found: String,
    },
}
