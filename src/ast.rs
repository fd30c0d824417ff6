//! The abstract syntax tree consumed by the IR lowering engine. The parser
//! that produces it is out of scope for this crate; tests and embedders
//! construct trees directly through the builder constructors below.
//!
//! Children appear in a fixed order per operator:
//!
//! - `FunctionDef`: return type leaf, formal parameter list, body block
//! - `FormalParam`: type leaf, optional dimension list (array parameter)
//! - `VarDecl`: type leaf, `VarDef` or `ArrayDef`
//! - `VarDef`: optional initializer expression
//! - `ArrayDef`: dimension list
//! - `ArrayAccess`: identifier leaf, dimension index list
//! - `If`: condition, then branch, optional else branch
//! - `While`: condition, body
//! - `Assign`: target, value
//! - `FuncCall`: argument list

use crate::{
    intern::InternedSymbol,
    ir::{
        ty::Type,
        value::{InstId, Operand},
    },
};

/// Binary operators as they appear in source. `And`/`Or` never reach the
/// IR; lowering expands them into short-circuit branch trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstKind {
    CompileUnit,
    FunctionDef,
    FormalParams,
    FormalParam,
    Block,
    DeclStmt,
    VarDecl,
    VarDef,
    ArrayDef,
    ArrayDims,
    ArrayAccess,
    If,
    While,
    Break,
    Continue,
    Return,
    Assign,
    Binary(AstBinaryOp),
    Neg,
    Not,
    FuncCall,
    CallArgs,
    /// An empty statement; stands in for an absent branch or loop body.
    Empty,
    LeafInt,
    LeafVar,
    LeafType,
}

#[derive(Debug)]
pub struct AstNode {
    pub kind: AstKind,
    pub children: Vec<AstNode>,

    pub name: Option<InternedSymbol>,
    pub int_value: Option<i32>,
    pub ty: Option<Type>,
    pub line: Option<u32>,

    /// The IR operand this node evaluates to, filled in post-order by
    /// lowering. `None` for void constructs.
    pub value: Option<Operand>,
    /// The IR that must be emitted, in order, before `value` is valid.
    /// Once set by this node's handler it is only ever concatenated into
    /// the parent's sequence, never mutated by another node.
    pub instructions: Vec<InstId>,
    /// Element address computed by a full array access, read back when the
    /// same node is reached again as an assignment target.
    pub cached_address: Option<Operand>,
}

impl AstNode {
    pub fn new(kind: AstKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            name: None,
            int_value: None,
            ty: None,
            line: None,
            value: None,
            instructions: Vec::new(),
            cached_address: None,
        }
    }

    fn with_children(kind: AstKind, children: Vec<AstNode>) -> Self {
        let mut node = Self::new(kind);
        node.children = children;
        node
    }

    pub fn compile_unit(items: Vec<AstNode>) -> Self {
        Self::with_children(AstKind::CompileUnit, items)
    }

    pub fn function_def(
        name: &str,
        return_ty: Type,
        params: AstNode,
        body: AstNode,
    ) -> Self {
        let mut node = Self::with_children(
            AstKind::FunctionDef,
            vec![Self::leaf_type(return_ty), params, body],
        );
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn formal_params(params: Vec<AstNode>) -> Self {
        Self::with_children(AstKind::FormalParams, params)
    }

    /// A scalar formal parameter.
    pub fn formal_param(name: &str, ty: Type) -> Self {
        let mut node = Self::with_children(AstKind::FormalParam, vec![Self::leaf_type(ty)]);
        node.name = Some(InternedSymbol::new(name));
        node
    }

    /// An array formal parameter; `dims` holds the extents after the
    /// elided leading dimension.
    pub fn array_param(name: &str, element_ty: Type, dims: Vec<AstNode>) -> Self {
        let mut node = Self::with_children(
            AstKind::FormalParam,
            vec![Self::leaf_type(element_ty), Self::array_dims(dims)],
        );
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn block(statements: Vec<AstNode>) -> Self {
        Self::with_children(AstKind::Block, statements)
    }

    pub fn decl_stmt(decls: Vec<AstNode>) -> Self {
        Self::with_children(AstKind::DeclStmt, decls)
    }

    pub fn var_decl(ty: Type, def: AstNode) -> Self {
        Self::with_children(AstKind::VarDecl, vec![Self::leaf_type(ty), def])
    }

    pub fn var_def(name: &str, init: Option<AstNode>) -> Self {
        let mut node = Self::with_children(AstKind::VarDef, init.into_iter().collect());
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn array_def(name: &str, dims: Vec<AstNode>) -> Self {
        let mut node = Self::with_children(AstKind::ArrayDef, vec![Self::array_dims(dims)]);
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn array_dims(dims: Vec<AstNode>) -> Self {
        Self::with_children(AstKind::ArrayDims, dims)
    }

    pub fn array_access(name: &str, indices: Vec<AstNode>) -> Self {
        Self::with_children(
            AstKind::ArrayAccess,
            vec![Self::ident(name), Self::array_dims(indices)],
        )
    }

    pub fn if_stmt(condition: AstNode, then: AstNode, els: Option<AstNode>) -> Self {
        let mut children = vec![condition, then];
        children.extend(els);
        Self::with_children(AstKind::If, children)
    }

    pub fn while_stmt(condition: AstNode, body: AstNode) -> Self {
        Self::with_children(AstKind::While, vec![condition, body])
    }

    pub fn break_stmt() -> Self {
        Self::new(AstKind::Break)
    }

    pub fn continue_stmt() -> Self {
        Self::new(AstKind::Continue)
    }

    pub fn return_stmt(value: Option<AstNode>) -> Self {
        Self::with_children(AstKind::Return, value.into_iter().collect())
    }

    pub fn assign(target: AstNode, value: AstNode) -> Self {
        Self::with_children(AstKind::Assign, vec![target, value])
    }

    pub fn binary(op: AstBinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
        Self::with_children(AstKind::Binary(op), vec![lhs, rhs])
    }

    pub fn neg(operand: AstNode) -> Self {
        Self::with_children(AstKind::Neg, vec![operand])
    }

    pub fn not(operand: AstNode) -> Self {
        Self::with_children(AstKind::Not, vec![operand])
    }

    pub fn call(name: &str, arguments: Vec<AstNode>) -> Self {
        let mut node =
            Self::with_children(AstKind::FuncCall, vec![Self::with_children(
                AstKind::CallArgs,
                arguments,
            )]);
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn empty() -> Self {
        Self::new(AstKind::Empty)
    }

    pub fn int(value: i32) -> Self {
        let mut node = Self::new(AstKind::LeafInt);
        node.int_value = Some(value);
        node
    }

    pub fn ident(name: &str) -> Self {
        let mut node = Self::new(AstKind::LeafVar);
        node.name = Some(InternedSymbol::new(name));
        node
    }

    pub fn leaf_type(ty: Type) -> Self {
        let mut node = Self::new(AstKind::LeafType);
        node.ty = Some(ty);
        node
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}
