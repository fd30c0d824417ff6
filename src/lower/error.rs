use thiserror::Error;

use crate::intern::InternedSymbol;

/// Semantic failures detected while lowering the AST. Each one aborts
/// the enclosing construct's lowering; the partially built instruction
/// sequence is discarded by the caller, never emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error("variable `{0}` is not defined")]
    UndefinedVariable(InternedSymbol),

    #[error("line {line}: function `{name}` is not defined or declared")]
    UndefinedFunction { name: InternedSymbol, line: u32 },

    #[error("line {line}: call to `{name}` passes {found} arguments, expected {expected}")]
    ArityMismatch {
        name: InternedSymbol,
        line: u32,
        expected: usize,
        found: usize,
    },

    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,

    #[error("global variable initializer must be a constant expression")]
    NonConstantGlobalInitializer,

    #[error("function `{0}` is already defined")]
    DuplicateFunction(InternedSymbol),

    #[error("function definitions cannot be nested")]
    NestedFunctionDefinition,

    #[error("`{0}` is not an array")]
    NotAnArray(InternedSymbol),

    #[error("malformed AST node: {0}")]
    MalformedNode(&'static str),
}
