use crate::ir::{
    ty::ArrayType,
    value::{FuncId, InstId, Operand},
};

/// IR binary operators. Comparisons produce an i1 that the lowering
/// engine materializes to 0/1 before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    /// ARM condition-code suffix for a comparison operator.
    pub fn condition_suffix(self) -> &'static str {
        match self {
            BinaryOp::Lt => "lt",
            BinaryOp::Gt => "gt",
            BinaryOp::Le => "le",
            BinaryOp::Ge => "ge",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            _ => unreachable!("arithmetic operator has no condition suffix"),
        }
    }
}

/// One linear IR instruction. Instructions live in their function's arena
/// and are referenced by [`InstId`]; emission order is the function's
/// `code` list, which a `Label` only joins once it is placed.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Entry,
    Exit {
        value: Option<Operand>,
    },
    /// Branch target. Carries no payload; its identity is its arena index.
    Label,
    Jump {
        target: InstId,
    },
    Branch {
        condition: Operand,
        positive: InstId,
        negative: InstId,
    },
    Move {
        destination: Operand,
        source: Operand,
    },
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    Call {
        callee: FuncId,
        arguments: Vec<Operand>,
    },
    /// Bookkeeping marker for one outgoing call argument; emits no code.
    Arg {
        value: Operand,
    },
    LoadArray {
        address: Operand,
        offset: Operand,
    },
    StoreArray {
        address: Operand,
        offset: Operand,
        value: Operand,
    },
    /// A partial array access: an address plus the unconsumed trailing
    /// dimensions, usable for further indexing but not yet a scalar.
    ArraySlice {
        address: Operand,
        ty: ArrayType,
    },
}

impl Inst {
    /// Whether this instruction computes a value, i.e. whether
    /// `Operand::Temp` of its id is meaningful. `Call` results are only
    /// meaningful for non-void callees; the backend checks the callee's
    /// return type before using one.
    pub fn has_result(&self) -> bool {
        matches!(
            self,
            Inst::Binary { .. } | Inst::Call { .. } | Inst::LoadArray { .. } | Inst::ArraySlice { .. }
        )
    }
}
