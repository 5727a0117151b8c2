//! Statement AST nodes

use crate::expr::{BinOp, CallExpr, Expr, Ident};

/// A braced statement list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Local variable declaration: `var a, b T = e1, e2`
    Var(VarDecl),

    /// Assignment or short declaration: `a, b = x, y`, `a := x`, `a += x`
    Assign(AssignStmt),

    /// Expression statement
    Expr(Expr),

    /// Channel send: `ch <- v`
    Send(SendStmt),

    /// `x++` / `x--`
    IncDec(IncDecStmt),

    Return(ReturnStmt),
    If(IfStmt),
    For(ForStmt),
    Range(RangeStmt),
    Switch(SwitchStmt),
    TypeSwitch(TypeSwitchStmt),
    Select(SelectStmt),

    /// `go f(x)`
    Go(CallExpr),

    /// `defer f(x)`
    Defer(CallExpr),

    /// break/continue/goto/fallthrough
    Branch(BranchStmt),

    Labeled(LabeledStmt),
    Block(Block),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub names: Vec<Ident>,
    /// Empty means zero-initialized.
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub rhs: Vec<Expr>,
    /// `Some(op)` for compound assignment (`x += y`).
    pub op: Option<BinOp>,
    /// `true` for `:=`
    pub define: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SendStmt {
    pub chan: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncDecStmt {
    pub x: Expr,
    pub inc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub results: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub then: Block,
    /// `else` branch: either a `Block` or another `If`.
    pub els: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    /// `None` means an unconditional loop.
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeStmt {
    pub key: Option<Ident>,
    pub value: Option<Ident>,
    pub define: bool,
    pub subject: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub init: Option<Box<Stmt>>,
    /// `None` means `switch { ... }` (conditions are boolean).
    pub tag: Option<Expr>,
    pub cases: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    /// Empty means `default`.
    pub exprs: Vec<Expr>,
    pub body: Vec<Stmt>,
}

impl CaseClause {
    pub fn is_default(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Whether the clause body ends with `fallthrough`.
    pub fn falls_through(&self) -> bool {
        matches!(
            self.body.last(),
            Some(Stmt::Branch(BranchStmt { kind: BranchKind::Fallthrough, .. }))
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSwitchStmt {
    pub init: Option<Box<Stmt>>,
    /// `v := x.(type)` binding; bound per case at the narrowed type.
    pub binding: Option<Ident>,
    pub subject: Expr,
    pub cases: Vec<TypeCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeCase {
    /// Listed case types (`TypeRef` exprs); `None` entries mean `nil`.
    /// Empty means `default`.
    pub types: Vec<Option<Expr>>,
    pub body: Vec<Stmt>,
}

impl TypeCase {
    pub fn is_default(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub cases: Vec<CommClause>,
}

/// One select clause; `comm: None` is the `default` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CommClause {
    pub comm: Option<CommOp>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommOp {
    Send { chan: Expr, value: Expr },
    /// `v, ok := <-ch` (0..2 left-hand sides)
    Recv { lhs: Vec<Expr>, define: bool, chan: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchStmt {
    pub kind: BranchKind,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStmt {
    pub label: String,
    pub stmt: Box<Stmt>,
}
