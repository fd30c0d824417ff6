//! ARM32 register model, immediate encoding checks and the textual
//! assembly buffer the instruction selector writes into.

use itertools::Itertools;

use crate::{
    ir::{
        function::Function,
        module::Module,
        ty::Type,
        value::{GlobalId, Operand},
    },
    backend::frame::FrameLayout,
};

/// The general purpose registers visible to the selector. `r11` serves
/// as the frame pointer and `r10` is reserved as the address scratch for
/// frame offsets that do not fit an `ldr`/`str` immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    Fp,
    Sp,
    Lr,
    Pc,
}

/// Argument registers in AAPCS order.
pub const ARG_REGS: [Reg; 4] = [Reg::R0, Reg::R1, Reg::R2, Reg::R3];

/// Scratch pool in allocation order. The callee-saved registers come
/// first so that argument registers stay free for as long as possible.
pub const SCRATCH_POOL: [Reg; 10] = [
    Reg::R4,
    Reg::R5,
    Reg::R6,
    Reg::R7,
    Reg::R8,
    Reg::R9,
    Reg::R0,
    Reg::R1,
    Reg::R2,
    Reg::R3,
];

/// Address scratch, never part of the pool.
pub const ADDR_TMP: Reg = Reg::R10;

/// Whether `value` is encodable as an ARM data-processing immediate:
/// an 8-bit value rotated right by an even amount.
pub fn is_arm_immediate(value: i32) -> bool {
    let value = value as u32;
    (0..16).any(|rot| value.rotate_left(rot * 2) <= 0xff)
}

/// Whether `offset` fits the signed 12-bit immediate of `ldr`/`str`.
pub fn is_mem_offset(offset: i32) -> bool {
    (-4095..=4095).contains(&offset)
}

/// Emission buffer for a single function. Owns no IR; it resolves
/// operands against the function, its frame layout and the module's
/// global table.
pub struct Assembler<'a> {
    output: String,
    function: &'a Function,
    module: &'a Module,
    frame: &'a FrameLayout,
}

impl<'a> Assembler<'a> {
    pub fn new(function: &'a Function, module: &'a Module, frame: &'a FrameLayout) -> Self {
        Self {
            output: String::new(),
            function,
            module,
            frame,
        }
    }

    pub fn into_output(self) -> String {
        self.output
    }

    fn push_line(&mut self, string: impl AsRef<str>) {
        self.output.push_str(string.as_ref());
        self.output.push('\n');
    }

    pub fn emit(&mut self, string: impl AsRef<str>) {
        self.output.push_str("    ");
        self.push_line(string);
    }

    pub fn global_label(&mut self, name: &str) {
        self.push_line(format!(".globl {name}"));
        self.push_line(format!("{name}:"));
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        self.push_line(format!("{}:", name.as_ref()));
    }

    pub fn comment(&mut self, comment: impl AsRef<str>) {
        self.emit(format!("@ {}", comment.as_ref()));
    }

    /// `push {protected}; mov fp, sp; sub sp, sp, #frame`.
    pub fn function_prologue(&mut self) {
        let protected = self.frame.protected.iter().map(Reg::to_string).join(", ");
        self.emit(format!("push {{{protected}}}"));
        self.emit("mov fp, sp");

        if self.frame.size > 0 {
            if is_arm_immediate(self.frame.size) {
                self.emit(format!("sub sp, sp, #{}", self.frame.size));
            } else {
                self.emit(format!("ldr {ADDR_TMP}, ={}", self.frame.size));
                self.emit(format!("sub sp, sp, {ADDR_TMP}"));
            }
        }
    }

    /// `mov sp, fp; pop {protected}; bx lr`.
    pub fn function_epilogue(&mut self) {
        self.emit("mov sp, fp");

        let protected = self.frame.protected.iter().map(Reg::to_string).join(", ");
        self.emit(format!("pop {{{protected}}}"));
        self.emit("bx lr");
    }

    pub fn load_immediate(&mut self, destination: Reg, value: i32) {
        if is_arm_immediate(value) {
            self.emit(format!("mov {destination}, #{value}"));
        } else if is_arm_immediate(!value) {
            self.emit(format!("mvn {destination}, #{}", !value));
        } else {
            self.emit(format!("ldr {destination}, ={value}"));
        }
    }

    fn global_name(&self, id: GlobalId) -> &'static str {
        self.module.globals[id].name.value()
    }

    /// Reads a frame slot, detouring through the address scratch when
    /// the offset does not fit an `ldr` immediate.
    fn load_frame_slot(&mut self, destination: Reg, offset: i32) {
        if is_mem_offset(offset) {
            self.emit(format!("ldr {destination}, [fp, #{offset}]"));
        } else {
            self.emit(format!("ldr {ADDR_TMP}, ={offset}"));
            self.emit(format!("ldr {destination}, [fp, {ADDR_TMP}]"));
        }
    }

    fn store_frame_slot(&mut self, source: Reg, offset: i32) {
        if is_mem_offset(offset) {
            self.emit(format!("str {source}, [fp, #{offset}]"));
        } else {
            self.emit(format!("ldr {ADDR_TMP}, ={offset}"));
            self.emit(format!("str {source}, [fp, {ADDR_TMP}]"));
        }
    }

    /// Computes `fp + offset` into `destination` (a declared array's base
    /// address).
    fn frame_address(&mut self, destination: Reg, offset: i32) {
        if is_arm_immediate(-offset) {
            self.emit(format!("sub {destination}, fp, #{}", -offset));
        } else {
            self.emit(format!("ldr {destination}, ={offset}"));
            self.emit(format!("add {destination}, fp, {destination}"));
        }
    }

    /// Materializes `operand`'s value into `destination`. Array-typed
    /// operands materialize as their base address.
    pub fn load_operand(&mut self, destination: Reg, operand: Operand) {
        match operand {
            Operand::Const(value) => self.load_immediate(destination, value),
            Operand::Global(id) => {
                let name = self.global_name(id);
                self.emit(format!("ldr {destination}, ={name}"));
                if !self.module.globals[id].ty.is_array() {
                    self.emit(format!("ldr {destination}, [{destination}]"));
                }
            }
            Operand::Local(id) => {
                let offset = self.frame.local_offset(id);
                match &self.function.locals[id].ty {
                    // A declared array's slot block *is* the array; an
                    // unsized parameter array's slot holds the caller's
                    // base pointer instead.
                    Type::Array(array) if !array.is_unsized() => {
                        self.frame_address(destination, offset);
                    }
                    _ => self.load_frame_slot(destination, offset),
                }
            }
            Operand::Param(k) => {
                let k = k as usize;
                if k < ARG_REGS.len() {
                    let source = ARG_REGS[k];
                    if source != destination {
                        self.emit(format!("mov {destination}, {source}"));
                    }
                } else {
                    self.load_frame_slot(destination, self.frame.incoming_arg_offset(k));
                }
            }
            Operand::Temp(id) => self.load_frame_slot(destination, self.frame.temp_offset(id)),
            Operand::Reg(reg) => {
                if reg != destination {
                    self.emit(format!("mov {destination}, {reg}"));
                }
            }
        }
    }

    /// Writes `source` back to `operand`'s home location.
    pub fn store_operand(&mut self, source: Reg, operand: Operand) {
        match operand {
            Operand::Global(id) => {
                let name = self.global_name(id);
                self.emit(format!("ldr {ADDR_TMP}, ={name}"));
                self.emit(format!("str {source}, [{ADDR_TMP}]"));
            }
            Operand::Local(id) => self.store_frame_slot(source, self.frame.local_offset(id)),
            Operand::Temp(id) => self.store_frame_slot(source, self.frame.temp_offset(id)),
            Operand::Reg(reg) => {
                if reg != source {
                    self.emit(format!("mov {reg}, {source}"));
                }
            }
            Operand::Const(_) | Operand::Param(_) => {
                unreachable!("constants and parameters are not store targets")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_immediate_encoding() {
        assert!(is_arm_immediate(0));
        assert!(is_arm_immediate(255));
        assert!(is_arm_immediate(0xff00));
        assert!(is_arm_immediate(0xc000_0034_u32 as i32));
        assert!(!is_arm_immediate(257));
        assert!(!is_arm_immediate(0x101));
        assert!(!is_arm_immediate(-1_000_000));
    }

    #[test]
    fn memory_offset_range() {
        assert!(is_mem_offset(0));
        assert!(is_mem_offset(-4095));
        assert!(is_mem_offset(4095));
        assert!(!is_mem_offset(4096));
        assert!(!is_mem_offset(-4096));
    }

    #[test]
    fn register_names() {
        assert_eq!(Reg::R0.to_string(), "r0");
        assert_eq!(Reg::R10.to_string(), "r10");
        assert_eq!(Reg::Fp.to_string(), "fp");
        assert_eq!(Reg::Lr.to_string(), "lr");
    }
}
