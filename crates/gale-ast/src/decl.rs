//! Top-level declaration AST nodes

use crate::expr::{Expr, Ident};
use crate::stmt::{Block, Stmt};

/// One source fragment (a file, or a REPL input)
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package_name: String,
    pub decls: Vec<Decl>,
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarSpec),
    Type(TypeSpec),
    Import(ImportSpec),
    /// A bare top-level statement (REPL fragment); always emitted.
    Stmt(Stmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: Ident,
    pub recv: Option<Receiver>,
    pub params: Vec<Ident>,
    pub named_results: Vec<Ident>,
    /// `None` for bodyless (externally provided) functions.
    pub body: Option<Block>,
}

impl FuncDecl {
    pub fn is_method(&self) -> bool {
        self.recv.is_some()
    }
}

/// Method receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub type_name: String,
    pub pointer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarSpec {
    pub names: Vec<Ident>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub path: String,
    pub alias: Option<Ident>,
}
