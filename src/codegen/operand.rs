use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Register;

/// Where an expression result currently lives. Operands are produced by
/// factor parsing and flow upward through the expression productions; at
/// each binary operator the left operand is rewritten in place to the result
/// location and the right operand is consumed.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Register(Register),
    Immediate(i32),
    Memory(String),
}

/// Shared handle to an operand. The slot held by an enclosing production is
/// the same slot the spill routine rewrites when register pressure evicts
/// its value, so both must observe one descriptor.
pub type OperandSlot = Rc<RefCell<Operand>>;

impl Operand {
    pub fn into_slot(self) -> OperandSlot {
        Rc::new(RefCell::new(self))
    }
}

impl fmt::Display for Operand {
    /// IR spelling of the operand: `R2`, `17`, `a`, `spill1`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(register) => write!(f, "{register}"),
            Operand::Immediate(value) => write!(f, "{value}"),
            Operand::Memory(label) => write!(f, "{label}"),
        }
    }
}
