//! The middle and back end of a MiniC compiler.
//!
//! The front half of this crate ([`lower`]) walks an abstract syntax
//! tree ([`ast`]) and produces a linear intermediate representation
//! ([`ir`]): explicit labels, jumps and three-address instructions, one
//! function at a time. The back half ([`backend`]) selects ARM32
//! instructions for that IR with a per-instruction scratch register
//! allocator and prints GNU-syntax assembly.
//!
//! ```no_run
//! use minicc::{CodegenOptions, ast::AstNode, compile, ir::ty::Type};
//!
//! let mut root = AstNode::compile_unit(vec![AstNode::function_def(
//!     "main",
//!     Type::Int,
//!     AstNode::formal_params(vec![]),
//!     AstNode::block(vec![AstNode::return_stmt(Some(AstNode::int(0)))]),
//! )]);
//!
//! let asm = compile(&mut root, &CodegenOptions::default()).unwrap();
//! println!("{asm}");
//! ```

pub mod ast;
pub mod backend;
pub mod diagnostics;
pub mod index;
pub mod intern;
pub mod ir;
pub mod lower;

pub use backend::{CodegenOptions, emit_module};
pub use ir::module::Module;
pub use lower::{error::LowerError, generate_ir};

/// Lowers `root` into a fresh [`Module`] and selects ARM32 assembly for
/// it in one step.
pub fn compile(
    root: &mut ast::AstNode,
    options: &CodegenOptions,
) -> Result<String, LowerError> {
    let mut module = Module::new();
    lower::generate_ir(&mut module, root)?;
    Ok(backend::emit_module(&module, options))
}
