//! Gale Desugared AST
//!
//! Data model for the desugared source program. The external frontend
//! (lexer, parser, desugarer) produces these nodes; the type checker keys
//! its results on the `NodeId` carried by every expression node.

pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::{Decl, File, FuncDecl, ImportSpec, Receiver, TypeSpec, VarSpec};
pub use expr::{
    BasicLit, BinOp, BinaryExpr, CallExpr, CompositeElem, CompositeLit, Expr, FuncLit, Ident,
    IndexExpr, LitKind, SelectorExpr, SliceExpr, StarExpr, TypeAssertExpr, TypeRefExpr, UnOp,
    UnaryExpr,
};
pub use stmt::{
    AssignStmt, Block, BranchKind, BranchStmt, CaseClause, CommClause, CommOp, ForStmt, IfStmt,
    IncDecStmt, LabeledStmt, RangeStmt, ReturnStmt, SelectStmt, SendStmt, Stmt, SwitchStmt,
    TypeCase, TypeSwitchStmt, VarDecl,
};

/// Identity of an AST node, assigned by the frontend.
///
/// The Type Oracle keys all of its per-node answers (types, constant
/// values, object resolution, selections) on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }
}
