//! Expression AST nodes

use crate::NodeId;

/// Expression (produces a value)
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Identifier: `x`, `fmt`
    Ident(Ident),

    /// Basic literal: `42`, `3.14`, `"hello"`, `'x'`
    Lit(BasicLit),

    /// Composite literal: `T{...}`, `[]int{1, 2}`, `map[string]int{...}`
    Composite(CompositeLit),

    /// Function literal: `func(x int) int { ... }`
    FuncLit(FuncLit),

    /// Unary expression: `-x`, `!x`, `^x`, `&x`, `<-ch`
    Unary(UnaryExpr),

    /// Binary expression: `x + y`, `x == y`, `x && y`
    Binary(BinaryExpr),

    /// Call or conversion: `f(x)`, `T(x)`
    Call(CallExpr),

    /// Index expression: `a[i]`, `m[k]`
    Index(IndexExpr),

    /// Slice expression: `a[lo:hi]`, `a[lo:hi:max]`
    Slice(SliceExpr),

    /// Selector: `x.f`, `pkg.Name`
    Selector(SelectorExpr),

    /// Pointer dereference: `*p`
    Star(StarExpr),

    /// Type assertion: `x.(T)`
    TypeAssert(TypeAssertExpr),

    /// A type used in expression position (conversion target, composite
    /// literal type, `make`/`new` argument). The Oracle maps its node to
    /// the denoted type.
    TypeRef(TypeRefExpr),
}

impl Expr {
    /// The node identity the Oracle keys on.
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Ident(e) => e.id,
            Expr::Lit(e) => e.id,
            Expr::Composite(e) => e.id,
            Expr::FuncLit(e) => e.id,
            Expr::Unary(e) => e.id,
            Expr::Binary(e) => e.id,
            Expr::Call(e) => e.id,
            Expr::Index(e) => e.id,
            Expr::Slice(e) => e.id,
            Expr::Selector(e) => e.id,
            Expr::Star(e) => e.id,
            Expr::TypeAssert(e) => e.id,
            Expr::TypeRef(e) => e.id,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Lit(_))
    }
}

/// Identifier with node identity
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
}

impl Ident {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Blank identifier `_`
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

/// Literal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

/// Basic literal. The raw text is kept for diagnostics only; the Oracle
/// supplies the evaluated constant value.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicLit {
    pub id: NodeId,
    pub kind: LitKind,
    pub raw: String,
}

/// One element of a composite literal, optionally keyed
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeElem {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// Composite literal. The literal's type is `Oracle::type_of(id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    pub id: NodeId,
    pub elems: Vec<CompositeElem>,
}

/// Function literal. Parameter and result objects resolve through the
/// Oracle; named results are listed so defers can mutate them.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncLit {
    pub id: NodeId,
    pub params: Vec<Ident>,
    pub named_results: Vec<Ident>,
    pub body: crate::stmt::Block,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `^x` (bitwise complement)
    BitNot,
    /// `&x`
    Addr,
    /// `<-ch`
    Recv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub id: NodeId,
    pub op: UnOp,
    pub x: Box<Expr>,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    AndNot,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LAnd,
    LOr,
}

impl BinOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub id: NodeId,
    pub op: BinOp,
    pub x: Box<Expr>,
    pub y: Box<Expr>,
}

/// Call or conversion. `spread` marks `f(xs...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub id: NodeId,
    pub fun: Box<Expr>,
    pub args: Vec<Expr>,
    pub spread: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub id: NodeId,
    pub x: Box<Expr>,
    pub index: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceExpr {
    pub id: NodeId,
    pub x: Box<Expr>,
    pub low: Option<Box<Expr>>,
    pub high: Option<Box<Expr>>,
    pub max: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorExpr {
    pub id: NodeId,
    pub x: Box<Expr>,
    pub sel: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StarExpr {
    pub id: NodeId,
    pub x: Box<Expr>,
}

/// `x.(T)`; `ty` is a `TypeRef`. Whether one or two results are produced
/// depends on the assignment context.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAssertExpr {
    pub id: NodeId,
    pub x: Box<Expr>,
    pub ty: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeRefExpr {
    pub id: NodeId,
}
