//! ARM32 instruction selection. One IR instruction at a time: operands
//! are materialized into scratch registers, the result is computed and
//! written straight back to its frame slot, and every register is
//! returned to the pool before the next instruction. Values never stay
//! in registers across an instruction boundary, so control flow needs no
//! shuffling at join points.

use crate::{
    backend::{
        allocator::ScratchAllocator,
        assembler::{ARG_REGS, Assembler, Reg, is_arm_immediate, is_mem_offset},
        frame::FrameLayout,
    },
    diagnostics::log_error,
    index::Index,
    ir::{
        function::Function,
        instruction::{BinaryOp, Inst},
        module::Module,
        pretty_print::format_inst,
        value::{FuncId, InstId, Operand},
    },
};

pub struct InstSelector<'a> {
    function: &'a Function,
    func_id: FuncId,
    module: &'a Module,
    frame: &'a FrameLayout,
    asm: Assembler<'a>,
    alloc: ScratchAllocator,
    /// Arg marker values seen since the last call, checked one by one
    /// against the call's own argument list.
    pending_args: Vec<Operand>,
    show_ir: bool,
}

/// Describes how the `k`-th argument marker disagrees with the value the
/// call actually passes, if it does. A register marker in the first four
/// positions names the marshalling register instead of the value, so it
/// is checked against the calling convention rather than the operand.
fn check_arg_marker(k: usize, marker: Operand, argument: Operand) -> Option<String> {
    match marker {
        Operand::Reg(reg) if k < ARG_REGS.len() => (reg != ARG_REGS[k])
            .then(|| format!("argument {k} is marked for {reg} but is passed in {}", ARG_REGS[k])),
        Operand::Reg(reg) => {
            Some(format!("argument {k} is marked for {reg} but is passed on the stack"))
        }
        _ => (marker != argument)
            .then(|| format!("argument {k} marker does not match the value the call passes")),
    }
}

impl<'a> InstSelector<'a> {
    pub fn new(
        function: &'a Function,
        func_id: FuncId,
        module: &'a Module,
        frame: &'a FrameLayout,
        show_ir: bool,
    ) -> Self {
        Self {
            function,
            func_id,
            module,
            frame,
            asm: Assembler::new(function, module, frame),
            alloc: ScratchAllocator::new(),
            pending_args: Vec::new(),
            show_ir,
        }
    }

    pub fn run(mut self) -> String {
        self.asm.global_label(self.function.name.value());

        for &id in &self.function.code {
            if self.show_ir {
                let text = format_inst(self.function, self.module, id);
                self.asm.comment(strip_ansi_escapes::strip_str(text));
            }

            self.translate(id);
        }

        self.asm.into_output()
    }

    /// Labels are unique per module: function index, then arena index.
    fn label_name(&self, id: InstId) -> String {
        format!(".L{}_{}", self.func_id.index(), id.index())
    }

    /// Brings `operand`'s value into a register. A register-bound operand
    /// is used where it already lives; anything else gets a scratch
    /// register and a load.
    fn materialize(&mut self, operand: Operand) -> Reg {
        match operand {
            Operand::Reg(reg) => reg,
            Operand::Param(k) if (k as usize) < ARG_REGS.len() => ARG_REGS[k as usize],
            _ => {
                if let Some(reg) = self.alloc.reg_of(operand) {
                    return reg;
                }

                let reg = self.alloc.allocate(Some(operand));
                self.asm.load_operand(reg, operand);
                reg
            }
        }
    }

    /// Releases the scratch register `materialize` gave `operand`, if it
    /// got one.
    fn release(&mut self, operand: Operand) {
        match operand {
            Operand::Reg(_) => {}
            Operand::Param(k) if (k as usize) < ARG_REGS.len() => {}
            _ => self.alloc.free_operand(operand),
        }
    }

    /// Writes an instruction result from `reg` to its frame slot and
    /// frees the register.
    fn retire_result(&mut self, id: InstId, reg: Reg) {
        self.asm.store_operand(reg, Operand::Temp(id));
        self.alloc.free_reg(reg);
    }

    fn translate(&mut self, id: InstId) {
        match &self.function.insts[id] {
            Inst::Entry => self.asm.function_prologue(),
            Inst::Exit { value } => {
                if let Some(value) = *value {
                    self.asm.load_operand(Reg::R0, value);
                }
                self.asm.function_epilogue();
            }
            Inst::Label => {
                let name = self.label_name(id);
                self.asm.label(name);
            }
            Inst::Jump { target } => {
                let target = self.label_name(*target);
                self.asm.emit(format!("b {target}"));
            }
            Inst::Branch {
                condition,
                positive,
                negative,
            } => self.translate_branch(*condition, *positive, *negative),
            Inst::Move {
                destination,
                source,
            } => {
                let (destination, source) = (*destination, *source);
                let reg = self.materialize(source);
                self.asm.store_operand(reg, destination);
                self.release(source);
            }
            Inst::Binary { op, lhs, rhs } => self.translate_binary(id, *op, *lhs, *rhs),
            Inst::Call { callee, arguments } => {
                self.translate_call(id, *callee, arguments.clone())
            }
            Inst::Arg { value } => {
                // Bookkeeping only; the call emits the marshalling code.
                self.pending_args.push(*value);
            }
            Inst::LoadArray { address, offset } => {
                self.translate_load_array(id, *address, *offset)
            }
            Inst::StoreArray {
                address,
                offset,
                value,
            } => self.translate_store_array(*address, *offset, *value),
            Inst::ArraySlice { address, .. } => {
                let address = *address;
                let reg = self.materialize(address);
                // A slice's value is its element address.
                self.asm.store_operand(reg, Operand::Temp(id));
                self.release(address);
            }
        }
    }

    /// `cmp #0; bne positive; b negative`. The condition is always a
    /// materialized integer by this point.
    fn translate_branch(&mut self, condition: Operand, positive: InstId, negative: InstId) {
        let reg = self.materialize(condition);
        self.asm.emit(format!("cmp {reg}, #0"));
        self.release(condition);

        let positive = self.label_name(positive);
        let negative = self.label_name(negative);
        self.asm.emit(format!("bne {positive}"));
        self.asm.emit(format!("b {negative}"));
    }

    fn translate_binary(&mut self, id: InstId, op: BinaryOp, lhs: Operand, rhs: Operand) {
        if op.is_comparison() {
            return self.translate_comparison(id, op, lhs, rhs);
        }

        let l = self.materialize(lhs);
        let r = self.materialize(rhs);
        let d = self.alloc.allocate(Some(Operand::Temp(id)));

        match op {
            BinaryOp::Add => self.asm.emit(format!("add {d}, {l}, {r}")),
            BinaryOp::Sub => self.asm.emit(format!("sub {d}, {l}, {r}")),
            BinaryOp::Mul => self.asm.emit(format!("mul {d}, {l}, {r}")),
            BinaryOp::Div => self.asm.emit(format!("sdiv {d}, {l}, {r}")),
            BinaryOp::Mod => {
                // l - (l / r) * r
                let q = self.alloc.allocate(None);
                self.asm.emit(format!("sdiv {q}, {l}, {r}"));
                self.asm.emit(format!("mul {q}, {q}, {r}"));
                self.asm.emit(format!("sub {d}, {l}, {q}"));
                self.alloc.free_reg(q);
            }
            _ => unreachable!("comparison handled above"),
        }

        self.release(lhs);
        self.release(rhs);
        self.retire_result(id, d);
    }

    /// `cmp; mov #0; mov<cond> #1`, leaving a canonical 0/1 result.
    fn translate_comparison(&mut self, id: InstId, op: BinaryOp, lhs: Operand, rhs: Operand) {
        let l = self.materialize(lhs);

        match rhs.as_const() {
            Some(c) if is_arm_immediate(c) => {
                self.asm.emit(format!("cmp {l}, #{c}"));
            }
            _ => {
                let r = self.materialize(rhs);
                self.asm.emit(format!("cmp {l}, {r}"));
                self.release(rhs);
            }
        }
        self.release(lhs);

        let d = self.alloc.allocate(Some(Operand::Temp(id)));
        self.asm.emit(format!("mov {d}, #0"));
        self.asm.emit(format!("mov{} {d}, #1", op.condition_suffix()));
        self.retire_result(id, d);
    }

    fn translate_call(&mut self, id: InstId, callee: FuncId, arguments: Vec<Operand>) {
        let target = &self.module.functions[callee];

        if !self.pending_args.is_empty() {
            if self.pending_args.len() != arguments.len() {
                log_error!(
                    "call to `{}` carries {} argument markers but passes {} arguments",
                    target.name,
                    self.pending_args.len(),
                    arguments.len()
                );
            }
            for (k, (&marker, &argument)) in self.pending_args.iter().zip(&arguments).enumerate() {
                if let Some(problem) = check_arg_marker(k, marker, argument) {
                    log_error!("call to `{}`: {problem}", target.name);
                }
            }
            self.pending_args.clear();
        }

        // Stack arguments first, while r0-r3 are still free for scratch.
        for (k, &argument) in arguments.iter().enumerate().skip(ARG_REGS.len()) {
            let reg = self.materialize(argument);
            let offset = self.frame.outgoing_arg_offset(k);
            self.asm.emit(format!("str {reg}, [sp, #{offset}]"));
            self.release(argument);
        }

        // Then the register arguments, each pinned to its slot.
        for (k, &argument) in arguments.iter().take(ARG_REGS.len()).enumerate() {
            let reg = ARG_REGS[k];
            self.alloc.allocate_reg(reg, None);
            self.asm.load_operand(reg, argument);
        }

        self.asm.emit(format!("bl {}", target.name));

        for &reg in ARG_REGS.iter().take(arguments.len()) {
            self.alloc.free_reg(reg);
        }

        if !target.return_ty.is_void() {
            self.asm.store_operand(Reg::R0, Operand::Temp(id));
        }
    }

    fn translate_load_array(&mut self, id: InstId, address: Operand, offset: Operand) {
        let a = self.materialize(address);
        let d = self.alloc.allocate(Some(Operand::Temp(id)));

        match offset.as_const() {
            Some(0) => self.asm.emit(format!("ldr {d}, [{a}]")),
            Some(c) if is_mem_offset(c) => self.asm.emit(format!("ldr {d}, [{a}, #{c}]")),
            _ => {
                let o = self.materialize(offset);
                self.asm.emit(format!("ldr {d}, [{a}, {o}]"));
                self.release(offset);
            }
        }

        self.release(address);
        self.retire_result(id, d);
    }

    fn translate_store_array(&mut self, address: Operand, offset: Operand, value: Operand) {
        let v = self.materialize(value);
        let a = self.materialize(address);

        match offset.as_const() {
            Some(0) => self.asm.emit(format!("str {v}, [{a}]")),
            Some(c) if is_mem_offset(c) => self.asm.emit(format!("str {v}, [{a}, #{c}]")),
            _ => {
                let o = self.materialize(offset);
                self.asm.emit(format!("str {v}, [{a}, {o}]"));
                self.release(offset);
            }
        }

        self.release(address);
        self.release(value);
    }
}
