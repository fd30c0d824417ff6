//! The symbol/value model: scoped variable creation, function
//! registration and lookup, current-function tracking. Lowering mutates
//! it strictly in program order (enter scope, lower body, leave scope).

use hashbrown::HashMap;

use crate::{
    index::IndexVec,
    intern::InternedSymbol,
    ir::{
        function::Function,
        instruction::Inst,
        ty::Type,
        value::{FuncId, Global, GlobalId, InstId, Operand},
    },
};

#[derive(Debug)]
pub struct Module {
    pub functions: IndexVec<FuncId, Function>,
    pub globals: IndexVec<GlobalId, Global>,

    function_names: HashMap<InternedSymbol, FuncId>,
    /// Innermost scope last. The outermost entry holds globals and is
    /// never popped.
    scopes: Vec<HashMap<InternedSymbol, Operand>>,
    current: Option<FuncId>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Self {
            functions: IndexVec::new(),
            globals: IndexVec::new(),
            function_names: HashMap::new(),
            scopes: vec![HashMap::new()],
            current: None,
        }
    }

    /* Function registry */

    /// Registers a new function; fails on a duplicate name.
    pub fn new_function(&mut self, name: InternedSymbol, return_ty: Type) -> Option<FuncId> {
        if self.function_names.contains_key(&name) {
            return None;
        }

        let id = self.functions.push(Function::new(name, return_ty));
        self.function_names.insert(name, id);
        Some(id)
    }

    pub fn find_function(&self, name: InternedSymbol) -> Option<FuncId> {
        self.function_names.get(&name).copied()
    }

    pub fn set_current_function(&mut self, id: Option<FuncId>) {
        self.current = id;
    }

    pub fn current_function(&self) -> Option<FuncId> {
        self.current
    }

    pub fn cur(&self) -> &Function {
        &self.functions[self.current.expect("no current function")]
    }

    pub fn cur_mut(&mut self) -> &mut Function {
        let id = self.current.expect("no current function");
        &mut self.functions[id]
    }

    /* Instruction factories, forwarding to the current function */

    pub fn new_inst(&mut self, inst: Inst) -> InstId {
        self.cur_mut().new_inst(inst)
    }

    pub fn new_label(&mut self) -> InstId {
        self.cur_mut().new_label()
    }

    /* Scoped variables */

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn leave_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "cannot leave the global scope");
        self.scopes.pop();
    }

    /// Creates a variable in the innermost scope: a function local inside
    /// a function, a global otherwise.
    pub fn new_var(&mut self, ty: Type, name: Option<InternedSymbol>) -> Operand {
        let operand = match self.current {
            Some(func) => Operand::Local(self.functions[func].new_local(ty, name)),
            None => {
                let name = name.expect("global variables are always named");
                Operand::Global(self.globals.push(Global {
                    name,
                    ty,
                    initializer: None,
                }))
            }
        };

        if let Some(name) = name {
            self.scopes
                .last_mut()
                .expect("scope stack is never empty")
                .insert(name, operand);
        }

        operand
    }

    /// Innermost-scope-first variable lookup.
    pub fn find_var(&self, name: InternedSymbol) -> Option<Operand> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .copied()
    }

    pub fn const_int(&self, value: i32) -> Operand {
        Operand::Const(value)
    }

    /// The type of a value operand in the context of `func`.
    pub fn operand_ty(&self, func: &Function, operand: Operand) -> Type {
        match operand {
            Operand::Const(_) | Operand::Reg(_) => Type::Int,
            Operand::Global(id) => self.globals[id].ty.clone(),
            Operand::Local(id) => func.locals[id].ty.clone(),
            Operand::Param(k) => func
                .params
                .get(k as usize)
                .map(|p| p.ty.clone())
                .unwrap_or(Type::Int),
            Operand::Temp(id) => match &func.insts[id] {
                Inst::Binary { op, .. } if op.is_comparison() => Type::Bool,
                Inst::ArraySlice { ty, .. } => Type::Array(ty.clone()),
                Inst::Call { callee, .. } => self.functions[*callee].return_ty.clone(),
                _ => Type::Int,
            },
        }
    }
}
