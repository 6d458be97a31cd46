use std::collections::HashMap;
use std::fmt::Write;

use strum::Display;

use super::{Operand, Register};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BinaryInst {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum UnaryInst {
    Neg,
    Not,
    Outb,
}

/// Conditional branches test one register: `BREZ` on zero, `BRNE` on
/// negative, `BRPO` on positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BranchCond {
    Brez,
    Brne,
    Brpo,
}

/// Append-only IR text stream plus the label factory.
///
/// Labels go on their own line, instructions are indented, comments sit at
/// column zero. Each label prefix counts independently from 1, so the first
/// spill cell is `spill1` and the first else target is `else1`.
#[derive(Debug, Default)]
pub struct Emitter {
    output: String,
    label_counters: HashMap<String, usize>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_label(&mut self, prefix: &str) -> String {
        let counter = self.label_counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}{counter}")
    }

    pub fn emit_label(&mut self, label: &str) {
        let _ = writeln!(self.output, "{label}:");
    }

    pub fn emit_comment(&mut self, text: &str) {
        let _ = writeln!(self.output, "; {text}");
    }

    pub fn emit_halt(&mut self) {
        self.output.push_str("    HALT\n");
    }

    /// Reserve `size` storage cells under `label`.
    pub fn emit_data_directive(&mut self, label: &str, size: u32) {
        let _ = writeln!(self.output, "{label}: DATA {size}");
    }

    /// Move into a register from a register, an immediate, or memory.
    pub fn emit_move_to_reg(&mut self, dst: Register, src: &Operand) {
        let _ = writeln!(self.output, "    MOVE {dst}, {src}");
    }

    /// Move a register's value into the memory cell named by `label`.
    pub fn emit_move_to_mem(&mut self, label: &str, src: Register) {
        let _ = writeln!(self.output, "    MOVE {label}, {src}");
    }

    pub fn emit_1addr(&mut self, inst: UnaryInst, reg: Register) {
        let _ = writeln!(self.output, "    {inst} {reg}");
    }

    pub fn emit_2addr(&mut self, inst: BinaryInst, dst: Register, src: &Operand) {
        let _ = writeln!(self.output, "    {inst} {dst}, {src}");
    }

    pub fn emit_branch(&mut self, target: &str) {
        let _ = writeln!(self.output, "    BR {target}");
    }

    pub fn emit_branch_if(&mut self, cond: BranchCond, reg: Register, target: &str) {
        let _ = writeln!(self.output, "    {cond} {reg}, {target}");
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}
