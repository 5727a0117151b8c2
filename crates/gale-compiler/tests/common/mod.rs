//! Shared fixture for the lowering tests: a hand-populated `Oracle`
//! standing in for the external type checker, plus constructors for the
//! typed AST shapes the tests feed through `FuncContext`.

#![allow(dead_code)]

use gale_ast::{
    BasicLit, BinOp, BinaryExpr, Block, CallExpr, Expr, Ident, LitKind, NodeId, SelectorExpr,
    Stmt, UnOp, UnaryExpr,
};
use gale_compiler::{DepKey, FuncContext, PackageScope};
use gale_types::{
    BasicKind, Builtin, ChanDir, ConstValue, Object, ObjectId, ObjectKind, Oracle, Selection,
    SelectionKind, Type, TypeId,
};

pub struct Host {
    pub oracle: Oracle,
    next_node: u32,
}

impl Host {
    pub fn new() -> Self {
        Host { oracle: Oracle::new(), next_node: 0 }
    }

    pub fn node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId::new(self.next_node)
    }

    // -- types --------------------------------------------------------

    pub fn int(&self) -> TypeId {
        self.oracle.types.basic(BasicKind::Int)
    }

    pub fn uint8(&self) -> TypeId {
        self.oracle.types.basic(BasicKind::Uint8)
    }

    pub fn int64(&self) -> TypeId {
        self.oracle.types.basic(BasicKind::Int64)
    }

    pub fn bool_ty(&self) -> TypeId {
        self.oracle.types.basic(BasicKind::Bool)
    }

    pub fn string_ty(&self) -> TypeId {
        self.oracle.types.basic(BasicKind::String)
    }

    pub fn chan_of(&mut self, elem: TypeId) -> TypeId {
        self.oracle.types.chan_of(elem, ChanDir::Both)
    }

    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        self.oracle.types.slice_of(elem)
    }

    pub fn map_of(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.oracle.types.map_of(key, value)
    }

    pub fn empty_interface(&mut self) -> TypeId {
        self.oracle.types.intern(Type::Interface { methods: Vec::new() })
    }

    pub fn sig(&mut self, params: Vec<TypeId>, results: Vec<TypeId>) -> TypeId {
        self.oracle.types.intern(Type::Signature { params, results, variadic: false })
    }

    /// A declared package-level named type over `underlying`.
    pub fn named(&mut self, name: &str, underlying: TypeId) -> TypeId {
        let obj = self.oracle.add_object(Object {
            pkg: "main".to_string(),
            name: name.to_string(),
            kind: ObjectKind::TypeName,
            package_level: true,
        });
        self.oracle.types.intern(Type::Named { obj, underlying })
    }

    // -- objects ------------------------------------------------------

    /// Function-local variable.
    pub fn local(&mut self, name: &str) -> ObjectId {
        self.oracle.add_object(Object {
            pkg: "main".to_string(),
            name: name.to_string(),
            kind: ObjectKind::Var,
            package_level: false,
        })
    }

    /// Package-level function.
    pub fn pkg_func(&mut self, name: &str) -> ObjectId {
        self.oracle.add_object(Object {
            pkg: "main".to_string(),
            name: name.to_string(),
            kind: ObjectKind::Func,
            package_level: true,
        })
    }

    pub fn builtin(&mut self, name: &str, b: Builtin) -> ObjectId {
        self.oracle.add_object(Object {
            pkg: String::new(),
            name: name.to_string(),
            kind: ObjectKind::Builtin(b),
            package_level: true,
        })
    }

    // -- typed AST nodes ----------------------------------------------

    /// An identifier use of `obj`, carrying `ty`.
    pub fn use_ident(&mut self, name: &str, obj: ObjectId, ty: TypeId) -> Ident {
        let id = self.node();
        self.oracle.bind_use(id, obj);
        self.oracle.bind_type(id, ty);
        Ident::new(id, name)
    }

    pub fn use_expr(&mut self, name: &str, obj: ObjectId, ty: TypeId) -> Expr {
        Expr::Ident(self.use_ident(name, obj, ty))
    }

    /// An identifier that only declares (no type binding needed beyond `ty`).
    pub fn decl_ident(&mut self, name: &str, ty: TypeId) -> Ident {
        let obj = self.local(name);
        self.use_ident(name, obj, ty)
    }

    pub fn int_lit(&mut self, v: i64) -> Expr {
        let id = self.node();
        self.oracle.bind_const(id, ConstValue::Int(v as i128));
        let int = self.int();
        self.oracle.bind_type(id, int);
        Expr::Lit(BasicLit { id, kind: LitKind::Int, raw: v.to_string() })
    }

    /// The untyped `nil`; the lowering picks its shape from context.
    pub fn nil(&mut self) -> Expr {
        let id = self.node();
        let nil_ty = self.oracle.types.basic(BasicKind::UntypedNil);
        self.oracle.bind_type(id, nil_ty);
        Expr::Ident(Ident::new(id, "nil"))
    }

    pub fn str_lit(&mut self, s: &str) -> Expr {
        let id = self.node();
        self.oracle.bind_const(id, ConstValue::Str(s.to_string()));
        let string = self.string_ty();
        self.oracle.bind_type(id, string);
        Expr::Lit(BasicLit { id, kind: LitKind::String, raw: format!("{:?}", s) })
    }

    /// Binary operation typed `ty` (the result type; comparisons are bool).
    pub fn binary(&mut self, op: BinOp, x: Expr, y: Expr, ty: TypeId) -> Expr {
        let id = self.node();
        self.oracle.bind_type(id, ty);
        Expr::Binary(BinaryExpr { id, op, x: Box::new(x), y: Box::new(y) })
    }

    pub fn recv_expr(&mut self, chan: Expr, elem: TypeId) -> Expr {
        let id = self.node();
        self.oracle.bind_type(id, elem);
        Expr::Unary(UnaryExpr { id, op: UnOp::Recv, x: Box::new(chan) })
    }

    pub fn call(&mut self, fun: Expr, args: Vec<Expr>, ty: TypeId) -> Expr {
        let id = self.node();
        self.oracle.bind_type(id, ty);
        Expr::Call(CallExpr { id, fun: Box::new(fun), args, spread: false })
    }

    /// A method call `x.method(args)` resolved against `sig`.
    pub fn method_call(
        &mut self,
        x: Expr,
        method: &str,
        sig: TypeId,
        args: Vec<Expr>,
        result: TypeId,
    ) -> Expr {
        let obj = self.oracle.add_object(Object {
            pkg: "main".to_string(),
            name: method.to_string(),
            kind: ObjectKind::Func,
            package_level: false,
        });
        let sel_id = self.node();
        self.oracle.bind_selection(sel_id, Selection { kind: SelectionKind::Method, obj });
        self.oracle.bind_type(sel_id, sig);
        let name_id = self.node();
        let sel = SelectorExpr { id: sel_id, x: Box::new(x), sel: Ident::new(name_id, method) };
        self.call(Expr::Selector(sel), args, result)
    }

    /// A call whose site the checker marked as possibly blocking.
    pub fn blocking_call(&mut self, fun: Expr, args: Vec<Expr>, ty: TypeId) -> Expr {
        let e = self.call(fun, args, ty);
        self.oracle.mark_blocking_call(e.id());
        e
    }

    // -- lowering -----------------------------------------------------

    /// Lower a function with the given parameter idents and result types.
    pub fn emit(
        &self,
        params: &[Ident],
        results: &[TypeId],
        body: Vec<Stmt>,
        flattened: bool,
        deferring: bool,
    ) -> String {
        let mut scope = PackageScope::new("main", false);
        let mut cx = FuncContext::new(&self.oracle, &mut scope);
        cx.flattened = flattened;
        cx.deferring = deferring;
        cx.emit_function(None, params, &[], results, &Block::new(body))
    }

    /// Lower a function and also return the dependency edges recorded
    /// for its declaration.
    pub fn emit_with_deps(
        &self,
        params: &[Ident],
        results: &[TypeId],
        body: Vec<Stmt>,
    ) -> (String, Vec<DepKey>) {
        let mut scope = PackageScope::new("main", false);
        let mut cx = FuncContext::new(&self.oracle, &mut scope);
        let text = cx.emit_function(None, params, &[], results, &Block::new(body));
        let mut deps: Vec<DepKey> = cx.deps.iter().cloned().collect();
        deps.sort();
        (text, deps)
    }

    /// Same, with named results.
    pub fn emit_named(
        &self,
        params: &[Ident],
        named_results: &[Ident],
        results: &[TypeId],
        body: Vec<Stmt>,
        deferring: bool,
    ) -> String {
        let mut scope = PackageScope::new("main", false);
        let mut cx = FuncContext::new(&self.oracle, &mut scope);
        cx.deferring = deferring;
        cx.emit_function(None, params, named_results, results, &Block::new(body))
    }
}
