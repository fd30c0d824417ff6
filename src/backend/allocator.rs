//! Register allocation at its most frugal: a fixed scratch pool, handed
//! out per IR instruction and returned the moment an operand is done
//! with. Values live in their frame slots between instructions, so no
//! binding ever has to survive a branch.

use hashbrown::HashMap;

use crate::{
    backend::assembler::{Reg, SCRATCH_POOL},
    ir::value::Operand,
};

#[derive(Debug, Default)]
pub struct ScratchAllocator {
    in_use: Vec<Reg>,
    /// Which value a busy register currently holds, if any. Allocations
    /// for the same operand are coalesced through this map.
    bindings: HashMap<Operand, Reg>,
}

impl ScratchAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grabs a free register from the pool, optionally bound to `value`.
    /// Asking for an operand that already has a live binding returns the
    /// existing register instead of a second one.
    ///
    /// Panics when the pool is exhausted; with per-instruction lifetimes
    /// that means the selector leaked a register.
    pub fn allocate(&mut self, value: Option<Operand>) -> Reg {
        if let Some(value) = value {
            if let Some(&reg) = self.bindings.get(&value) {
                return reg;
            }
        }

        let reg = SCRATCH_POOL
            .iter()
            .copied()
            .find(|reg| !self.in_use.contains(reg))
            .unwrap_or_else(|| panic!("scratch register pool exhausted"));

        self.in_use.push(reg);
        if let Some(value) = value {
            self.bindings.insert(value, reg);
        }

        reg
    }

    /// Claims a specific register (argument marshalling wants r0-r3 by
    /// name). Panics if it is already busy.
    pub fn allocate_reg(&mut self, reg: Reg, value: Option<Operand>) {
        assert!(
            !self.in_use.contains(&reg),
            "{reg} is already allocated"
        );

        self.in_use.push(reg);
        if let Some(value) = value {
            self.bindings.insert(value, reg);
        }
    }

    pub fn reg_of(&self, value: Operand) -> Option<Reg> {
        self.bindings.get(&value).copied()
    }

    pub fn is_free(&self, reg: Reg) -> bool {
        !self.in_use.contains(&reg)
    }

    /// Returns `reg` to the pool along with any binding pointing at it.
    pub fn free_reg(&mut self, reg: Reg) {
        self.in_use.retain(|&r| r != reg);
        self.bindings.retain(|_, &mut r| r != reg);
    }

    /// Frees the register bound to `value`, if any. A no-op for operands
    /// that were never materialized (constants already folded, say).
    pub fn free_operand(&mut self, value: Operand) {
        if let Some(reg) = self.bindings.remove(&value) {
            self.in_use.retain(|&r| r != reg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_order_and_reuse() {
        let mut alloc = ScratchAllocator::new();

        let a = alloc.allocate(None);
        let b = alloc.allocate(None);
        assert_eq!(a, Reg::R4);
        assert_eq!(b, Reg::R5);

        alloc.free_reg(a);
        assert_eq!(alloc.allocate(None), Reg::R4);
    }

    #[test]
    fn binding_is_coalesced() {
        let mut alloc = ScratchAllocator::new();

        let value = Operand::Const(7);
        let first = alloc.allocate(Some(value));
        let second = alloc.allocate(Some(value));
        assert_eq!(first, second);

        alloc.free_operand(value);
        assert!(alloc.is_free(first));
    }

    #[test]
    fn forced_allocation_reserves_named_register() {
        let mut alloc = ScratchAllocator::new();

        alloc.allocate_reg(Reg::R0, None);
        alloc.allocate_reg(Reg::R1, None);

        // The pool skips busy registers.
        for _ in 0..8 {
            let reg = alloc.allocate(None);
            assert_ne!(reg, Reg::R0);
            assert_ne!(reg, Reg::R1);
        }
    }

    #[test]
    #[should_panic(expected = "exhausted")]
    fn exhaustion_panics() {
        let mut alloc = ScratchAllocator::new();
        for _ in 0..=SCRATCH_POOL.len() {
            alloc.allocate(None);
        }
    }
}
