//! Stack frame layout for a function: one slot per local (arrays get
//! their full extent), one word per instruction result, and an outgoing
//! argument area at the bottom for calls with more than four arguments.
//!
//! ```text
//!     caller frame
//!     incoming args 5+      <- [fp, #4*protected + 4*(k-4)]
//!     saved lr (if any)
//!     saved fp              <- fp
//!     locals, temps         <- [fp, #-4] downward
//!     outgoing args 5+      <- [sp, #0] upward
//! ```

use hashbrown::HashMap;

use crate::{
    backend::assembler::Reg,
    ir::{
        function::Function,
        ty::WORD_SIZE,
        value::{InstId, LocalId},
    },
};

#[derive(Debug)]
pub struct FrameLayout {
    /// Registers saved by the prologue, in push order. Always contains
    /// `fp`; `lr` joins it when the function makes calls.
    pub protected: Vec<Reg>,
    /// Total `sub sp` amount, 8-byte aligned.
    pub size: i32,
    local_offsets: HashMap<LocalId, i32>,
    temp_offsets: HashMap<InstId, i32>,
}

impl FrameLayout {
    pub fn compute(function: &Function) -> Self {
        let mut protected = vec![Reg::Fp];
        if function.has_call {
            protected.push(Reg::Lr);
        }

        let mut offset = 0;
        let mut local_offsets = HashMap::new();
        for (id, local) in function.locals.enumerate() {
            // An unsized parameter array reports size 0 but its slot
            // still holds the caller's base pointer.
            offset += local.ty.size().max(WORD_SIZE);
            local_offsets.insert(id, -offset);
        }

        // Only placed instructions get result slots; discarded ones in
        // the arena never execute.
        let mut temp_offsets = HashMap::new();
        for &id in &function.code {
            if function.insts[id].has_result() {
                offset += WORD_SIZE;
                temp_offsets.insert(id, -offset);
            }
        }

        let outgoing = function.max_call_args.saturating_sub(4) as i32 * WORD_SIZE;
        let size = (offset + outgoing + 7) & !7;

        Self {
            protected,
            size,
            local_offsets,
            temp_offsets,
        }
    }

    pub fn local_offset(&self, id: LocalId) -> i32 {
        self.local_offsets[&id]
    }

    pub fn temp_offset(&self, id: InstId) -> i32 {
        self.temp_offsets[&id]
    }

    /// Frame-pointer-relative offset of incoming argument `k` (k >= 4),
    /// just above the registers the prologue saved.
    pub fn incoming_arg_offset(&self, k: usize) -> i32 {
        (self.protected.len() * 4 + (k - 4) * 4) as i32
    }

    /// Stack-pointer-relative offset of outgoing argument `k` (k >= 4).
    pub fn outgoing_arg_offset(&self, k: usize) -> i32 {
        ((k - 4) * 4) as i32
    }
}
