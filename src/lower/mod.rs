//! The IR lowering engine: walks the AST operator tag by operator tag,
//! producing linear IR and filling in each visited node's `value` and
//! `instructions` slots post-order. Expressions are evaluated strictly
//! left to right; `&&`/`||` become explicit short-circuit branch trees;
//! comparison and logical results are materialized to a canonical 0/1
//! integer through a shared bool-to-int primitive.

pub mod error;

use crate::{
    ast::{AstBinaryOp, AstKind, AstNode},
    diagnostics::log_warning,
    ir::{
        function::FormalParam,
        instruction::{BinaryOp, Inst},
        module::Module,
        ty::{ArrayType, Type, WORD_SIZE},
        value::{InstId, Operand},
    },
    lower::error::LowerError,
};

type LowerResult = Result<(), LowerError>;

/// Innermost loop's branch targets, pushed on loop entry and popped on
/// exit. `break` jumps to `end`, `continue` to `condition`.
#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    condition: InstId,
    end: InstId,
}

pub struct Lowering<'m> {
    module: &'m mut Module,
    loops: Vec<LoopLabels>,
}

/// Lowers a compile unit into `module`. On failure the module's contents
/// are unspecified and must not be handed to the backend.
pub fn generate_ir(module: &mut Module, root: &mut AstNode) -> LowerResult {
    Lowering {
        module,
        loops: Vec::new(),
    }
    .lower(root)
}

impl<'m> Lowering<'m> {
    fn lower(&mut self, node: &mut AstNode) -> LowerResult {
        match node.kind {
            AstKind::CompileUnit => self.lower_compile_unit(node),
            AstKind::FunctionDef => self.lower_function_def(node),
            AstKind::Block => self.lower_block(node, true),
            AstKind::DeclStmt => self.lower_decl_stmt(node),
            AstKind::VarDecl => self.lower_var_decl(node),
            AstKind::If => self.lower_if(node),
            AstKind::While => self.lower_while(node),
            AstKind::Break => self.lower_break(node),
            AstKind::Continue => self.lower_continue(node),
            AstKind::Return => self.lower_return(node),
            AstKind::Assign => self.lower_assign(node),
            AstKind::Binary(AstBinaryOp::And) => self.lower_and(node),
            AstKind::Binary(AstBinaryOp::Or) => self.lower_or(node),
            AstKind::Binary(op) => match ir_binary_op(op) {
                op if op.is_comparison() => self.lower_comparison(node, op),
                op => self.lower_arithmetic(node, op),
            },
            AstKind::Neg => self.lower_neg(node),
            AstKind::Not => self.lower_not(node),
            AstKind::ArrayAccess => self.lower_array_access(node),
            AstKind::FuncCall => self.lower_func_call(node),
            AstKind::LeafInt => self.lower_leaf_int(node),
            AstKind::LeafVar => self.lower_leaf_var(node),
            AstKind::LeafType | AstKind::Empty => Ok(()),
            // Structural tags only ever visited through their parent's
            // handler; reaching one directly is tolerated as a no-op.
            AstKind::FormalParams
            | AstKind::FormalParam
            | AstKind::ArrayDims
            | AstKind::VarDef
            | AstKind::ArrayDef
            | AstKind::CallArgs => {
                log_warning!("no lowering handler for {:?}, skipping", node.kind);
                Ok(())
            }
        }
    }

    /// Expression handlers create instructions in the current function;
    /// at global scope only constants are allowed (global initializers).
    fn require_function(&self) -> LowerResult {
        if self.module.current_function().is_none() {
            return Err(LowerError::NonConstantGlobalInitializer);
        }

        Ok(())
    }

    fn lower_compile_unit(&mut self, node: &mut AstNode) -> LowerResult {
        self.module.set_current_function(None);

        for child in node.children.iter_mut() {
            self.lower(child)?;
        }

        Ok(())
    }

    fn lower_function_def(&mut self, node: &mut AstNode) -> LowerResult {
        if self.module.current_function().is_some() {
            return Err(LowerError::NestedFunctionDefinition);
        }

        let name = node.name.ok_or(LowerError::MalformedNode("unnamed function"))?;
        let return_ty = node.children[0]
            .ty
            .clone()
            .ok_or(LowerError::MalformedNode("function without return type"))?;

        let func_id = self
            .module
            .new_function(name, return_ty.clone())
            .ok_or(LowerError::DuplicateFunction(name))?;
        self.module.set_current_function(Some(func_id));
        self.module.enter_scope();

        let entry = self.module.new_inst(Inst::Entry);
        self.module.cur_mut().place(entry);

        // The exit label exists up front so every `return` can target it;
        // it is placed only once, ahead of the epilogue.
        let exit_label = self.module.new_label();
        self.module.cur_mut().exit_label = Some(exit_label);

        self.lower_formal_params(&mut node.children[1])?;

        // Return-value slot, zero-initialized for non-void functions.
        let mut return_value = None;
        if !return_ty.is_void() {
            let slot = self.module.new_var(Type::Int, None);
            if let Operand::Local(local) = slot {
                self.module.cur_mut().return_value = Some(local);
            }
            let init = self.module.new_inst(Inst::Move {
                destination: slot,
                source: Operand::Const(0),
            });
            self.module.cur_mut().place(init);
            return_value = Some(slot);
        }

        // The function scope doubles as the body block's scope.
        self.lower_block(&mut node.children[2], false)?;
        let body = node.children[2].instructions.clone();
        self.module.cur_mut().place_all(&body);

        self.module.cur_mut().place(exit_label);
        let exit = self.module.new_inst(Inst::Exit {
            value: return_value,
        });
        self.module.cur_mut().place(exit);

        self.module.leave_scope();
        self.module.set_current_function(None);
        Ok(())
    }

    fn lower_formal_params(&mut self, node: &mut AstNode) -> LowerResult {
        // Resolve every parameter type first: array parameters get an
        // elided (zero) leading extent followed by the declared ones.
        for param in node.children.iter_mut() {
            let name = param
                .name
                .ok_or(LowerError::MalformedNode("unnamed formal parameter"))?;
            let mut ty = param.children[0]
                .ty
                .clone()
                .ok_or(LowerError::MalformedNode("untyped formal parameter"))?;

            if let Some(dims_node) = param.children.get_mut(1) {
                let mut dims = vec![0];
                for dim in dims_node.children.iter_mut() {
                    self.lower(dim)?;
                    dims.push(dim.value.and_then(Operand::as_const).unwrap_or(10));
                }
                ty = Type::Array(ArrayType::new(ty, dims));
            }

            self.module.cur_mut().params.push(FormalParam { name, ty });
        }

        // Then one fresh local and one move per parameter, copying the
        // incoming value into the function's own storage.
        for k in 0..self.module.cur().params.len() {
            let FormalParam { name, ty } = self.module.cur().params[k].clone();
            let local = self.module.new_var(ty, Some(name));
            let mv = self.module.new_inst(Inst::Move {
                destination: local,
                source: Operand::Param(k as u8),
            });
            self.module.cur_mut().place(mv);
        }

        Ok(())
    }

    fn lower_block(&mut self, node: &mut AstNode, own_scope: bool) -> LowerResult {
        if own_scope {
            self.module.enter_scope();
        }

        let mut seq = Vec::new();
        for child in node.children.iter_mut() {
            self.lower(child)?;
            seq.extend_from_slice(&child.instructions);
        }

        if own_scope {
            self.module.leave_scope();
        }

        node.instructions = seq;
        Ok(())
    }

    fn lower_decl_stmt(&mut self, node: &mut AstNode) -> LowerResult {
        let mut seq = Vec::new();
        for child in node.children.iter_mut() {
            self.lower(child)?;
            seq.extend_from_slice(&child.instructions);
        }

        node.instructions = seq;
        Ok(())
    }

    fn lower_var_decl(&mut self, node: &mut AstNode) -> LowerResult {
        let ty = node.children[0]
            .ty
            .clone()
            .ok_or(LowerError::MalformedNode("untyped declaration"))?;

        let mut seq = Vec::new();
        let def = &mut node.children[1];
        let name = def
            .name
            .ok_or(LowerError::MalformedNode("unnamed declaration"))?;

        let value = match def.kind {
            AstKind::VarDef => {
                let var = self.module.new_var(ty, Some(name));

                if let Some(init) = def.children.first_mut() {
                    self.lower_init(init, var, &mut seq)?;
                }

                var
            }
            AstKind::ArrayDef => {
                let dims_node = &mut def.children[0];
                let mut dims = Vec::new();
                for dim in dims_node.children.iter_mut() {
                    self.lower(dim)?;
                    seq.extend_from_slice(&dim.instructions);
                    // Non-constant extents fall back to a default of 10.
                    dims.push(dim.value.and_then(Operand::as_const).unwrap_or(10));
                }

                self.module
                    .new_var(Type::Array(ArrayType::new(ty, dims)), Some(name))
            }
            _ => return Err(LowerError::MalformedNode("unknown declarator")),
        };

        node.value = Some(value);
        node.instructions = seq;
        Ok(())
    }

    fn lower_init(
        &mut self,
        init: &mut AstNode,
        var: Operand,
        seq: &mut Vec<InstId>,
    ) -> LowerResult {
        self.lower(init)?;
        let value = init
            .value
            .ok_or(LowerError::MalformedNode("initializer has no value"))?;

        match var {
            Operand::Global(global) => {
                let constant = value
                    .as_const()
                    .ok_or(LowerError::NonConstantGlobalInitializer)?;
                self.module.globals[global].initializer = Some(constant);
            }
            _ => {
                seq.extend_from_slice(&init.instructions);
                seq.push(self.module.new_inst(Inst::Move {
                    destination: var,
                    source: value,
                }));
            }
        }

        Ok(())
    }

    fn lower_leaf_int(&mut self, node: &mut AstNode) -> LowerResult {
        let value = node
            .int_value
            .ok_or(LowerError::MalformedNode("integer leaf without a value"))?;
        node.value = Some(self.module.const_int(value));
        node.instructions.clear();
        Ok(())
    }

    fn lower_leaf_var(&mut self, node: &mut AstNode) -> LowerResult {
        let name = node
            .name
            .ok_or(LowerError::MalformedNode("identifier leaf without a name"))?;
        node.value = Some(
            self.module
                .find_var(name)
                .ok_or(LowerError::UndefinedVariable(name))?,
        );
        node.instructions.clear();
        Ok(())
    }

    /// Lowers both operands of a binary node left to right, returning
    /// their values. The operands' instructions are appended to `seq` in
    /// the same order.
    fn lower_operands(
        &mut self,
        node: &mut AstNode,
        seq: &mut Vec<InstId>,
    ) -> Result<(Operand, Operand), LowerError> {
        let [lhs, rhs] = node.children.as_mut_slice() else {
            return Err(LowerError::MalformedNode("binary node needs two operands"));
        };

        self.lower(lhs)?;
        self.lower(rhs)?;

        seq.extend_from_slice(&lhs.instructions);
        seq.extend_from_slice(&rhs.instructions);

        let l = lhs
            .value
            .ok_or(LowerError::MalformedNode("operand has no value"))?;
        let r = rhs
            .value
            .ok_or(LowerError::MalformedNode("operand has no value"))?;
        Ok((l, r))
    }

    fn lower_arithmetic(&mut self, node: &mut AstNode, op: BinaryOp) -> LowerResult {
        self.require_function()?;

        let mut seq = Vec::new();
        let (lhs, rhs) = self.lower_operands(node, &mut seq)?;

        let inst = self.module.new_inst(Inst::Binary { op, lhs, rhs });
        seq.push(inst);

        node.value = Some(Operand::Temp(inst));
        node.instructions = seq;
        Ok(())
    }

    fn lower_comparison(&mut self, node: &mut AstNode, op: BinaryOp) -> LowerResult {
        self.require_function()?;

        let mut seq = Vec::new();
        let (lhs, rhs) = self.lower_operands(node, &mut seq)?;

        let cmp = self.module.new_inst(Inst::Binary { op, lhs, rhs });
        seq.push(cmp);

        node.value = Some(self.convert_bool_to_int(&mut seq, Operand::Temp(cmp)));
        node.instructions = seq;
        Ok(())
    }

    /// The shared bool-to-int primitive: materializes an i1 as a
    /// canonical 0/1 integer through an explicit branch diamond.
    fn convert_bool_to_int(&mut self, seq: &mut Vec<InstId>, bool_value: Operand) -> Operand {
        let result = self.module.new_var(Type::Int, None);
        let l_true = self.module.new_label();
        let l_false = self.module.new_label();
        let l_end = self.module.new_label();

        seq.push(self.module.new_inst(Inst::Branch {
            condition: bool_value,
            positive: l_true,
            negative: l_false,
        }));

        seq.push(l_true);
        seq.push(self.module.new_inst(Inst::Move {
            destination: result,
            source: Operand::Const(1),
        }));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_false);
        seq.push(self.module.new_inst(Inst::Move {
            destination: result,
            source: Operand::Const(0),
        }));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_end);
        result
    }

    fn lower_and(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let [lhs, rhs] = node.children.as_mut_slice() else {
            return Err(LowerError::MalformedNode("`&&` needs two operands"));
        };
        self.lower(lhs)?;
        self.lower(rhs)?;
        let lhs_value = lhs.value.ok_or(LowerError::MalformedNode("operand has no value"))?;
        let rhs_value = rhs.value.ok_or(LowerError::MalformedNode("operand has no value"))?;
        let lhs_insts = lhs.instructions.clone();
        let rhs_insts = rhs.instructions.clone();

        let l_rhs = self.module.new_label();
        let l_false = self.module.new_label();
        let l_end = self.module.new_label();

        let mut seq = lhs_insts;
        let cmp_l = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Ne,
            lhs: lhs_value,
            rhs: Operand::Const(0),
        });
        seq.push(cmp_l);

        // Left false short-circuits straight to the 0 result; the right
        // operand's instructions sit behind `l_rhs` and are never reached
        // on that path.
        seq.push(self.module.new_inst(Inst::Branch {
            condition: Operand::Temp(cmp_l),
            positive: l_rhs,
            negative: l_false,
        }));

        seq.push(l_rhs);
        seq.extend_from_slice(&rhs_insts);
        let cmp_r = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Ne,
            lhs: rhs_value,
            rhs: Operand::Const(0),
        });
        seq.push(cmp_r);

        let result = self.convert_bool_to_int(&mut seq, Operand::Temp(cmp_r));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_false);
        seq.push(self.module.new_inst(Inst::Move {
            destination: result,
            source: Operand::Const(0),
        }));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_end);

        node.value = Some(result);
        node.instructions = seq;
        Ok(())
    }

    fn lower_or(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let [lhs, rhs] = node.children.as_mut_slice() else {
            return Err(LowerError::MalformedNode("`||` needs two operands"));
        };
        self.lower(lhs)?;
        self.lower(rhs)?;
        let lhs_value = lhs.value.ok_or(LowerError::MalformedNode("operand has no value"))?;
        let rhs_value = rhs.value.ok_or(LowerError::MalformedNode("operand has no value"))?;
        let lhs_insts = lhs.instructions.clone();
        let rhs_insts = rhs.instructions.clone();

        let l_rhs = self.module.new_label();
        let l_true = self.module.new_label();
        let l_end = self.module.new_label();

        let mut seq = lhs_insts;
        let cmp_l = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Ne,
            lhs: lhs_value,
            rhs: Operand::Const(0),
        });
        seq.push(cmp_l);

        // Left true short-circuits straight to the 1 result.
        seq.push(self.module.new_inst(Inst::Branch {
            condition: Operand::Temp(cmp_l),
            positive: l_true,
            negative: l_rhs,
        }));

        seq.push(l_rhs);
        seq.extend_from_slice(&rhs_insts);
        let cmp_r = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Ne,
            lhs: rhs_value,
            rhs: Operand::Const(0),
        });
        seq.push(cmp_r);

        let result = self.convert_bool_to_int(&mut seq, Operand::Temp(cmp_r));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_true);
        seq.push(self.module.new_inst(Inst::Move {
            destination: result,
            source: Operand::Const(1),
        }));
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_end);

        node.value = Some(result);
        node.instructions = seq;
        Ok(())
    }

    fn lower_not(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let operand = &mut node.children[0];
        self.lower(operand)?;
        let value = operand
            .value
            .ok_or(LowerError::MalformedNode("operand has no value"))?;

        let mut seq = operand.instructions.clone();
        let eq = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Eq,
            lhs: value,
            rhs: Operand::Const(0),
        });
        seq.push(eq);

        node.value = Some(self.convert_bool_to_int(&mut seq, Operand::Temp(eq)));
        node.instructions = seq;
        Ok(())
    }

    fn lower_neg(&mut self, node: &mut AstNode) -> LowerResult {
        let operand = &mut node.children[0];
        self.lower(operand)?;
        let value = operand
            .value
            .ok_or(LowerError::MalformedNode("operand has no value"))?;

        // At global scope only constant operands fold.
        if self.module.current_function().is_none() {
            let constant = value
                .as_const()
                .ok_or(LowerError::NonConstantGlobalInitializer)?;
            node.value = Some(self.module.const_int(-constant));
            node.instructions.clear();
            return Ok(());
        }

        let mut seq = operand.instructions.clone();

        // Comparison results are already materialized to 0/1 integers,
        // so negation is always `0 - x`.
        let sub = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Sub,
            lhs: Operand::Const(0),
            rhs: value,
        });
        seq.push(sub);

        node.value = Some(Operand::Temp(sub));
        node.instructions = seq;
        Ok(())
    }

    fn lower_if(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        for child in node.children.iter_mut() {
            self.lower(child)?;
        }

        let condition = node.children[0]
            .value
            .ok_or(LowerError::MalformedNode("`if` condition has no value"))?;

        let l_then = self.module.new_label();
        let l_else = self.module.new_label();
        let l_end = self.module.new_label();

        let mut seq = node.children[0].instructions.clone();

        // A constant condition collapses to an unconditional jump; no
        // runtime comparison is emitted for it.
        match condition.as_const() {
            Some(c) => {
                let target = if c != 0 { l_then } else { l_else };
                seq.push(self.module.new_inst(Inst::Jump { target }));
            }
            None => {
                seq.push(self.module.new_inst(Inst::Branch {
                    condition,
                    positive: l_then,
                    negative: l_else,
                }));
            }
        }

        seq.push(l_then);
        seq.extend_from_slice(&node.children[1].instructions);
        seq.push(self.module.new_inst(Inst::Jump { target: l_end }));

        seq.push(l_else);
        if let Some(els) = node.children.get(2) {
            seq.extend_from_slice(&els.instructions);
        }
        // The else branch falls through to the end label.

        seq.push(l_end);

        node.instructions = seq;
        Ok(())
    }

    fn lower_while(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let l_cond = self.module.new_label();
        let l_body = self.module.new_label();
        let l_end = self.module.new_label();

        // Pushed before the body is lowered so that nested `break`/
        // `continue` see only their own innermost loop.
        self.loops.push(LoopLabels {
            condition: l_cond,
            end: l_end,
        });
        let result = self.lower_while_parts(node, l_cond, l_body, l_end);
        self.loops.pop();
        result
    }

    fn lower_while_parts(
        &mut self,
        node: &mut AstNode,
        l_cond: InstId,
        l_body: InstId,
        l_end: InstId,
    ) -> LowerResult {
        for child in node.children.iter_mut() {
            self.lower(child)?;
        }

        let condition = node.children[0]
            .value
            .ok_or(LowerError::MalformedNode("`while` condition has no value"))?;

        let mut seq = vec![l_cond];
        seq.extend_from_slice(&node.children[0].instructions);

        match condition.as_const() {
            // Constant conditions fold exactly like `if`: an infinite
            // loop jumps straight into the body, `while(0)` skips it.
            Some(c) => {
                let target = if c != 0 { l_body } else { l_end };
                seq.push(self.module.new_inst(Inst::Jump { target }));
            }
            None => {
                seq.push(self.module.new_inst(Inst::Branch {
                    condition,
                    positive: l_body,
                    negative: l_end,
                }));
            }
        }

        seq.push(l_body);
        seq.extend_from_slice(&node.children[1].instructions);
        seq.push(self.module.new_inst(Inst::Jump { target: l_cond }));

        seq.push(l_end);

        node.instructions = seq;
        Ok(())
    }

    fn lower_break(&mut self, node: &mut AstNode) -> LowerResult {
        let labels = *self.loops.last().ok_or(LowerError::BreakOutsideLoop)?;
        let jump = self.module.new_inst(Inst::Jump { target: labels.end });
        node.instructions = vec![jump];
        Ok(())
    }

    fn lower_continue(&mut self, node: &mut AstNode) -> LowerResult {
        let labels = *self.loops.last().ok_or(LowerError::ContinueOutsideLoop)?;
        let jump = self.module.new_inst(Inst::Jump {
            target: labels.condition,
        });
        node.instructions = vec![jump];
        Ok(())
    }

    fn lower_return(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let mut seq = Vec::new();

        if let Some(expr) = node.children.first_mut() {
            self.lower(expr)?;
            let value = expr
                .value
                .ok_or(LowerError::MalformedNode("`return` expression has no value"))?;
            seq.extend_from_slice(&expr.instructions);

            // Void functions simply ignore a (malformed) returned value.
            if let Some(slot) = self.module.cur().return_value {
                seq.push(self.module.new_inst(Inst::Move {
                    destination: Operand::Local(slot),
                    source: value,
                }));
            }

            node.value = Some(value);
        }

        // All returns share the function's single exit label, where the
        // epilogue is emitted exactly once.
        let exit_label = self
            .module
            .cur()
            .exit_label
            .ok_or(LowerError::MalformedNode("`return` outside of a function"))?;
        seq.push(self.module.new_inst(Inst::Jump { target: exit_label }));

        node.instructions = seq;
        Ok(())
    }

    fn lower_assign(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let [lhs, rhs] = node.children.as_mut_slice() else {
            return Err(LowerError::MalformedNode("assignment needs two operands"));
        };

        self.lower(lhs)?;
        self.lower(rhs)?;

        let target = lhs
            .value
            .ok_or(LowerError::MalformedNode("assignment target has no value"))?;
        let value = rhs
            .value
            .ok_or(LowerError::MalformedNode("assigned value has no value"))?;

        // The value's instructions come first, then the target's (index
        // computation for array stores).
        let mut seq = rhs.instructions.clone();
        seq.extend_from_slice(&lhs.instructions);

        if lhs.kind == AstKind::ArrayAccess {
            // An array-access target stores through the address its own
            // lowering cached, instead of the loaded element value.
            let address = lhs
                .cached_address
                .ok_or(LowerError::MalformedNode("array store without an address"))?;
            seq.push(self.module.new_inst(Inst::StoreArray {
                address,
                offset: Operand::Const(0),
                value,
            }));
        } else {
            seq.push(self.module.new_inst(Inst::Move {
                destination: target,
                source: value,
            }));
        }

        node.value = Some(value);
        node.instructions = seq;
        Ok(())
    }

    fn lower_array_access(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let name = node.children[0]
            .name
            .ok_or(LowerError::MalformedNode("array access without a name"))?;

        let mut seq = Vec::new();

        // Indices first, left to right.
        let mut indices = Vec::new();
        {
            let dims_node = &mut node.children[1];
            for index in dims_node.children.iter_mut() {
                self.lower(index)?;
                seq.extend_from_slice(&index.instructions);
                indices.push(
                    index
                        .value
                        .ok_or(LowerError::MalformedNode("array index has no value"))?,
                );
            }
        }

        self.lower(&mut node.children[0])?;
        let base = node.children[0]
            .value
            .ok_or(LowerError::MalformedNode("array base has no value"))?;
        seq.extend_from_slice(&node.children[0].instructions);

        let Type::Array(array_ty) = self.module.operand_ty(self.module.cur(), base) else {
            return Err(LowerError::NotAnArray(name));
        };
        let dims = array_ty.dims.clone();
        let element_ty = (*array_ty.element).clone();

        let accessed = indices.len();
        let is_full_access = accessed == dims.len();

        // Horner accumulation over the declared extents:
        // offset = ((i0 * d1 + i1) * d2 + i2) ...
        let mut offset = if accessed == 0 {
            Operand::Const(0)
        } else {
            indices[0]
        };
        for i in 1..accessed {
            let mul = self.module.new_inst(Inst::Binary {
                op: BinaryOp::Mul,
                lhs: offset,
                rhs: Operand::Const(dims[i]),
            });
            seq.push(mul);
            let add = self.module.new_inst(Inst::Binary {
                op: BinaryOp::Add,
                lhs: Operand::Temp(mul),
                rhs: indices[i],
            });
            seq.push(add);
            offset = Operand::Temp(add);
        }

        // A partial access scales by the product of the unconsumed
        // trailing dimensions, yielding an element-granular offset for
        // the resulting slice.
        if !is_full_access {
            let remaining: i32 = dims[accessed..].iter().product();
            if remaining > 1 {
                let mul = self.module.new_inst(Inst::Binary {
                    op: BinaryOp::Mul,
                    lhs: offset,
                    rhs: Operand::Const(remaining),
                });
                seq.push(mul);
                offset = Operand::Temp(mul);
            }
        }

        // Byte offset and final element address.
        let byte_offset = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Mul,
            lhs: offset,
            rhs: Operand::Const(WORD_SIZE),
        });
        seq.push(byte_offset);
        let address = self.module.new_inst(Inst::Binary {
            op: BinaryOp::Add,
            lhs: base,
            rhs: Operand::Temp(byte_offset),
        });
        seq.push(address);

        if is_full_access {
            let load = self.module.new_inst(Inst::LoadArray {
                address: Operand::Temp(address),
                offset: Operand::Const(0),
            });
            seq.push(load);
            node.value = Some(Operand::Temp(load));
            // Remembered for a later visit of this node as an l-value.
            node.cached_address = Some(Operand::Temp(address));
        } else {
            let slice = self.module.new_inst(Inst::ArraySlice {
                address: Operand::Temp(address),
                ty: ArrayType::new(element_ty, dims[accessed..].to_vec()),
            });
            seq.push(slice);
            node.value = Some(Operand::Temp(slice));
            node.cached_address = None;
        }

        node.instructions = seq;
        Ok(())
    }

    fn lower_func_call(&mut self, node: &mut AstNode) -> LowerResult {
        self.require_function()?;

        let name = node
            .name
            .ok_or(LowerError::MalformedNode("call without a callee name"))?;
        let line = node.line.unwrap_or(0);

        // Functions must be defined before they are called.
        let callee = self
            .module
            .find_function(name)
            .ok_or(LowerError::UndefinedFunction { name, line })?;

        self.module.cur_mut().has_call = true;

        let mut seq = Vec::new();
        let mut arguments = Vec::new();

        let args_node = &mut node.children[0];
        let arg_count = args_node.children.len();
        if arg_count > self.module.cur().max_call_args {
            self.module.cur_mut().max_call_args = arg_count;
        }

        // Arguments evaluate left to right. An array-typed argument's
        // value is the array itself, which the backend materializes as
        // its base address (no copy).
        for arg in args_node.children.iter_mut() {
            self.lower(arg)?;
            seq.extend_from_slice(&arg.instructions);
            arguments.push(
                arg.value
                    .ok_or(LowerError::MalformedNode("argument has no value"))?,
            );
        }

        let expected = self.module.functions[callee].params.len();
        if arguments.len() != expected {
            return Err(LowerError::ArityMismatch {
                name,
                line,
                expected,
                found: arguments.len(),
            });
        }

        let call = self.module.new_inst(Inst::Call { callee, arguments });
        seq.push(call);

        // May be void; consumers check the callee's return type.
        node.value = Some(Operand::Temp(call));
        node.instructions = seq;
        Ok(())
    }
}

fn ir_binary_op(op: AstBinaryOp) -> BinaryOp {
    match op {
        AstBinaryOp::Add => BinaryOp::Add,
        AstBinaryOp::Sub => BinaryOp::Sub,
        AstBinaryOp::Mul => BinaryOp::Mul,
        AstBinaryOp::Div => BinaryOp::Div,
        AstBinaryOp::Mod => BinaryOp::Mod,
        AstBinaryOp::Lt => BinaryOp::Lt,
        AstBinaryOp::Gt => BinaryOp::Gt,
        AstBinaryOp::Le => BinaryOp::Le,
        AstBinaryOp::Ge => BinaryOp::Ge,
        AstBinaryOp::Eq => BinaryOp::Eq,
        AstBinaryOp::Ne => BinaryOp::Ne,
        AstBinaryOp::And | AstBinaryOp::Or => {
            unreachable!("short-circuit operators never map to an IR opcode")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::ir::ty::Type;

    fn int_function(name: &str, body: Vec<AstNode>) -> AstNode {
        AstNode::function_def(
            name,
            Type::Int,
            AstNode::formal_params(vec![]),
            AstNode::block(body),
        )
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let mut module = Module::new();
        let mut root =
            AstNode::compile_unit(vec![int_function("f", vec![AstNode::break_stmt()])]);

        assert_eq!(
            generate_ir(&mut module, &mut root),
            Err(LowerError::BreakOutsideLoop)
        );
    }

    #[test]
    fn continue_outside_loop_is_an_error() {
        let mut module = Module::new();
        let mut root =
            AstNode::compile_unit(vec![int_function("f", vec![AstNode::continue_stmt()])]);

        assert_eq!(
            generate_ir(&mut module, &mut root),
            Err(LowerError::ContinueOutsideLoop)
        );
    }

    #[test]
    fn undefined_variable_aborts_lowering() {
        let mut module = Module::new();
        let mut root = AstNode::compile_unit(vec![int_function(
            "f",
            vec![AstNode::return_stmt(Some(AstNode::ident("ghost")))],
        )]);

        let result = generate_ir(&mut module, &mut root);
        assert!(matches!(result, Err(LowerError::UndefinedVariable(_))));
    }

    #[test]
    fn global_initializer_must_be_constant() {
        let mut module = Module::new();
        let mut root = AstNode::compile_unit(vec![AstNode::decl_stmt(vec![AstNode::var_decl(
            Type::Int,
            AstNode::var_def(
                "g",
                Some(AstNode::binary(
                    AstBinaryOp::Add,
                    AstNode::int(1),
                    AstNode::int(2),
                )),
            ),
        )])]);

        assert_eq!(
            generate_ir(&mut module, &mut root),
            Err(LowerError::NonConstantGlobalInitializer)
        );
    }

    #[test]
    fn negated_constant_global_initializer_folds() {
        let mut module = Module::new();
        let mut root = AstNode::compile_unit(vec![AstNode::decl_stmt(vec![AstNode::var_decl(
            Type::Int,
            AstNode::var_def("g", Some(AstNode::neg(AstNode::int(5)))),
        )])]);

        generate_ir(&mut module, &mut root).unwrap();
        assert_eq!(module.globals.raw[0].initializer, Some(-5));
    }

    #[test]
    fn nested_function_definitions_are_rejected() {
        let mut module = Module::new();

        // Hand-assembled: a function whose body block contains another
        // function definition.
        let inner = int_function("inner", vec![]);
        let mut root = AstNode::compile_unit(vec![int_function("outer", vec![inner])]);

        assert_eq!(
            generate_ir(&mut module, &mut root),
            Err(LowerError::NestedFunctionDefinition)
        );
    }
}
