//! Linear IR: a flat, ordered instruction list per function, where every
//! value-producing instruction is itself usable as an operand. Control
//! flow is already reduced to labels and jumps; register allocation has
//! not happened yet.

pub mod function;
pub mod instruction;
pub mod module;
pub mod pretty_print;
pub mod ty;
pub mod value;
