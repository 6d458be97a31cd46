mod emitter;
mod operand;
mod register;
mod spill;

pub use emitter::{BinaryInst, BranchCond, Emitter, UnaryInst};
pub use operand::{Operand, OperandSlot};
pub use register::{Register, RegisterAllocator, NUM_REGISTERS};
pub use spill::SpillTable;
