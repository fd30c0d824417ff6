use crate::{
    index::IndexVec,
    intern::InternedSymbol,
    ir::{
        instruction::Inst,
        ty::Type,
        value::{InstId, Local, LocalId},
    },
};

/// A formal parameter: the incoming value the caller provides. Lowering
/// copies each one into a fresh local before the body runs.
#[derive(Debug, Clone)]
pub struct FormalParam {
    pub name: InternedSymbol,
    pub ty: Type,
}

#[derive(Debug)]
pub struct Function {
    pub name: InternedSymbol,
    pub return_ty: Type,
    pub params: Vec<FormalParam>,

    /// Arena of every instruction created for this function. An
    /// instruction's index is stable for the function's lifetime.
    pub insts: IndexVec<InstId, Inst>,
    /// Program order. Labels enter this list only when placed.
    pub code: Vec<InstId>,

    pub locals: IndexVec<LocalId, Local>,
    /// Slot every `return` moves its value into; `None` for void.
    pub return_value: Option<LocalId>,
    /// The single label all `return`s jump to; the epilogue is emitted
    /// exactly once, there.
    pub exit_label: Option<InstId>,

    /// Largest argument count among this function's call sites, used for
    /// stack-frame sizing.
    pub max_call_args: usize,
    pub has_call: bool,
}

impl Function {
    pub fn new(name: InternedSymbol, return_ty: Type) -> Self {
        Self {
            name,
            return_ty,
            params: Vec::new(),
            insts: IndexVec::new(),
            code: Vec::new(),
            locals: IndexVec::new(),
            return_value: None,
            exit_label: None,
            max_call_args: 0,
            has_call: false,
        }
    }

    /// Adds an instruction to the arena without placing it in program
    /// order. The returned id doubles as the instruction's value.
    pub fn new_inst(&mut self, inst: Inst) -> InstId {
        self.insts.push(inst)
    }

    /// Creates a label that can be branched to before it is placed.
    pub fn new_label(&mut self) -> InstId {
        self.insts.push(Inst::Label)
    }

    pub fn new_local(&mut self, ty: Type, name: Option<InternedSymbol>) -> LocalId {
        self.locals.push(Local { name, ty })
    }

    pub fn place(&mut self, id: InstId) {
        self.code.push(id);
    }

    pub fn place_all(&mut self, ids: &[InstId]) {
        self.code.extend_from_slice(ids);
    }
}
