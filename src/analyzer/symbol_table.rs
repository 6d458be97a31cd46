use std::fmt::Write;

use super::ExprType;

#[derive(Clone, Debug)]
struct SymbolEntry {
    name: String,
    env: String,
    ty: ExprType,
    ordinal: Option<usize>,
}

/// Flat, append-only symbol table keyed by (name, environment).
///
/// Environments are names: `_EXTERNAL` for the program entry itself, the
/// program name for globals and procedure names, and a procedure's name for
/// its formals and locals. Lookups inside a procedure environment fall
/// through to the program environment so that globals and procedure names
/// stay visible in procedure bodies.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    global_env: Option<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. The caller guarantees (name, env) is not yet
    /// declared. Installing the `PROGRAM`-typed entry records its name as
    /// the global environment consulted by lookup fallback.
    pub fn install(&mut self, name: &str, env: &str, ty: ExprType) {
        if ty == ExprType::Program {
            self.global_env = Some(name.to_string());
        }
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            env: env.to_string(),
            ty,
            ordinal: None,
        });
    }

    /// Append a formal parameter with its 0-based position in the declaring
    /// procedure.
    pub fn install_formal(&mut self, name: &str, env: &str, ty: ExprType, ordinal: usize) {
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            env: env.to_string(),
            ty,
            ordinal: Some(ordinal),
        });
    }

    fn lookup(&self, name: &str, env: &str) -> Option<&SymbolEntry> {
        let hit = self
            .entries
            .iter()
            .find(|e| e.name == name && e.env == env);
        if hit.is_some() {
            return hit;
        }
        match &self.global_env {
            Some(global) if global != env => self
                .entries
                .iter()
                .find(|e| e.name == name && &e.env == global),
            _ => None,
        }
    }

    pub fn is_decl(&self, name: &str, env: &str) -> bool {
        self.lookup(name, env).is_some()
    }

    pub fn get_type(&self, name: &str, env: &str) -> ExprType {
        self.lookup(name, env)
            .map(|e| e.ty)
            .unwrap_or(ExprType::Garbage)
    }

    /// Declared type of the ordinal-th formal parameter of `proc`.
    pub fn formal_type(&self, proc: &str, ordinal: usize) -> ExprType {
        self.entries
            .iter()
            .find(|e| e.env == proc && e.ordinal == Some(ordinal))
            .map(|e| e.ty)
            .unwrap_or(ExprType::Garbage)
    }

    /// Stamp `ty` on every entry still typed `UNKNOWN`. Earlier declaration
    /// groups were already stamped, so this reaches exactly the identifiers
    /// installed since the previous call.
    pub fn update_type(&mut self, ty: ExprType) {
        for entry in &mut self.entries {
            if entry.ty == ExprType::Unknown {
                entry.ty = ty;
            }
        }
    }

    /// Diagnostic listing, one entry per line.
    pub fn dump(&self) -> String {
        let mut out = String::from("Symbol table:\n");
        for entry in &self.entries {
            match entry.ordinal {
                Some(ordinal) => {
                    let _ = writeln!(
                        out,
                        "  {} in {} : {} (formal {})",
                        entry.name, entry.env, entry.ty, ordinal
                    );
                }
                None => {
                    let _ = writeln!(out, "  {} in {} : {}", entry.name, entry.env, entry.ty);
                }
            }
        }
        out
    }
}
