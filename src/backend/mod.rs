//! The ARM32 backend: frame layout, per-instruction register
//! allocation, instruction selection and assembly emission.

pub mod allocator;
pub mod assembler;
pub mod emit;
pub mod frame;
pub mod selector;

pub use emit::{CodegenOptions, emit_module};
