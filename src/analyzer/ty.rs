use strum::Display;

/// Types flowing through declarations and expressions. `Unknown` is the
/// transient state of an identifier list before its `:` type arrives, `No`
/// marks an absent expression suffix, and `Garbage` is the uninitialized
/// sentinel that survives only past reported errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ExprType {
    Int,
    Bool,
    Program,
    Procedure,
    Unknown,
    No,
    Garbage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_diagnostic_form() {
        assert_eq!(ExprType::Int.to_string(), "INT");
        assert_eq!(ExprType::Bool.to_string(), "BOOL");
        assert_eq!(ExprType::Procedure.to_string(), "PROCEDURE");
        assert_eq!(ExprType::Garbage.to_string(), "GARBAGE");
    }
}
