use crate::{backend::assembler::Reg, index::simple_index, intern::InternedSymbol, ir::ty::Type};

simple_index! {
    /// Identifies an instruction within its function's arena. Doubles as
    /// the handle for the value the instruction computes.
    pub struct InstId;
}

simple_index! {
    /// Identifies a local variable within its function.
    pub struct LocalId;
}

simple_index! {
    /// Identifies a global variable within the module.
    pub struct GlobalId;
}

simple_index! {
    /// Identifies a function within the module.
    pub struct FuncId;
}

/// A value usable as an instruction operand. Instructions are themselves
/// values (`Temp`), which gives the IR its register-like temporaries
/// without full SSA form. `Reg` is synthesized only by the backend for
/// values pinned to a physical register (calling-convention moves).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Const(i32),
    Global(GlobalId),
    Local(LocalId),
    /// The k-th incoming formal parameter of the current function.
    Param(u8),
    /// The result of the instruction at this arena index.
    Temp(InstId),
    /// A physical register, bound by the calling convention.
    Reg(Reg),
}

impl Operand {
    pub fn as_const(self) -> Option<i32> {
        match self {
            Operand::Const(v) => Some(v),
            _ => None,
        }
    }
}

/// A function-local variable: named source variables, the return-value
/// slot and the temporaries created by the bool-to-int primitive.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: Option<InternedSymbol>,
    pub ty: Type,
}

/// A module-level variable. The initializer must be a compile-time
/// constant; enforcing that is the lowering engine's job.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: InternedSymbol,
    pub ty: Type,
    pub initializer: Option<i32>,
}
