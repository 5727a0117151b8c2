//! Expression lowering: numeric width fixups, 64-bit arithmetic,
//! constants, `nil`, interface boxing, and builtin calls.

mod common;

use common::Host;
use gale_ast::{BinOp, Expr, IndexExpr, ReturnStmt, Stmt, VarDecl};
use gale_compiler::{select_alive, Decl, DepKey};
use gale_types::{Builtin, Type};

#[test]
fn test_int_arithmetic_truncates_to_32_bits() {
    let mut h = Host::new();
    let int = h.int();
    let xo = h.local("x");
    let param = h.use_ident("x", xo, int);
    let x = h.use_expr("x", xo, int);
    let one = h.int_lit(1);
    let sum = h.binary(BinOp::Add, x, one, int);
    let js = h.emit(
        &[param],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![sum] })],
        false,
        false,
    );
    assert_eq!(js, "function(x) {\n\treturn ((x + 1) >> 0);\n}");
}

#[test]
fn test_uint8_arithmetic_wraps_at_the_byte() {
    let mut h = Host::new();
    let u8t = h.uint8();
    let xo = h.local("x");
    let yo = h.local("y");
    let px = h.use_ident("x", xo, u8t);
    let py = h.use_ident("y", yo, u8t);
    let x = h.use_expr("x", xo, u8t);
    let y = h.use_expr("y", yo, u8t);
    let sum = h.binary(BinOp::Add, x, y, u8t);
    let js = h.emit(
        &[px, py],
        &[u8t],
        vec![Stmt::Return(ReturnStmt { results: vec![sum] })],
        false,
        false,
    );
    assert!(js.contains("return ((x + y) << 24 >>> 24);"), "got: {}", js);
}

#[test]
fn test_integer_division_guards_division_by_zero() {
    let mut h = Host::new();
    let int = h.int();
    let xo = h.local("x");
    let yo = h.local("y");
    let px = h.use_ident("x", xo, int);
    let py = h.use_ident("y", yo, int);
    let x = h.use_expr("x", xo, int);
    let y = h.use_expr("y", yo, int);
    let q = h.binary(BinOp::Div, x, y, int);
    let js = h.emit(
        &[px, py],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![q] })],
        false,
        false,
    );
    assert!(js.contains("$idiv(x, y)"), "got: {}", js);
}

#[test]
fn test_string_concatenation_stays_plain() {
    let mut h = Host::new();
    let string = h.string_ty();
    let ao = h.local("a");
    let bo = h.local("b");
    let pa = h.use_ident("a", ao, string);
    let pb = h.use_ident("b", bo, string);
    let a = h.use_expr("a", ao, string);
    let b = h.use_expr("b", bo, string);
    let cat = h.binary(BinOp::Add, a, b, string);
    let js = h.emit(
        &[pa, pb],
        &[string],
        vec![Stmt::Return(ReturnStmt { results: vec![cat] })],
        false,
        false,
    );
    assert!(js.contains("return (a + b);"), "got: {}", js);
    assert!(!js.contains(">> 0"), "string concat must not get a numeric fixup: {}", js);
}

#[test]
fn test_int64_lowers_through_pair_calls() {
    let mut h = Host::new();
    let i64t = h.int64();
    let bool_ty = h.bool_ty();
    let xo = h.local("x");
    let yo = h.local("y");
    let px = h.use_ident("x", xo, i64t);
    let py = h.use_ident("y", yo, i64t);

    let x = h.use_expr("x", xo, i64t);
    let y = h.use_expr("y", yo, i64t);
    let sum = h.binary(BinOp::Add, x, y, i64t);
    let js = h.emit(
        &[px.clone(), py.clone()],
        &[i64t],
        vec![Stmt::Return(ReturnStmt { results: vec![sum] })],
        false,
        false,
    );
    assert!(js.contains("return $add64(x, y);"), "got: {}", js);

    let x = h.use_expr("x", xo, i64t);
    let y = h.use_expr("y", yo, i64t);
    let lt = h.binary(BinOp::Lt, x, y, bool_ty);
    let js = h.emit(
        &[px, py],
        &[bool_ty],
        vec![Stmt::Return(ReturnStmt { results: vec![lt] })],
        false,
        false,
    );
    assert!(js.contains("return $less64(x, y);"), "got: {}", js);
}

#[test]
fn test_constant_formats_at_the_assignment_type() {
    let mut h = Host::new();
    let u8t = h.uint8();
    let x = h.decl_ident("x", u8t);
    // uint8(300) wraps to 44 at compile time.
    let lit = h.int_lit(300);
    let js = h.emit(
        &[],
        &[],
        vec![Stmt::Var(VarDecl { names: vec![x], values: vec![lit] })],
        false,
        false,
    );
    assert_eq!(js, "function() {\n\tvar x = 44;\n}");
}

#[test]
fn test_int64_constant_splits_into_high_and_low() {
    let mut h = Host::new();
    let i64t = h.int64();
    let x = h.decl_ident("x", i64t);
    let lit = h.int_lit(1);
    let js = h.emit(
        &[],
        &[],
        vec![Stmt::Var(VarDecl { names: vec![x], values: vec![lit] })],
        false,
        false,
    );
    assert_eq!(js, "function() {\n\tvar x = new $Int64(0, 1);\n}");
}

#[test]
fn test_nil_takes_the_shape_of_its_context() {
    let mut h = Host::new();
    let int = h.int();
    let slice = h.slice_of(int);
    let nil = h.nil();
    let js = h.emit(
        &[],
        &[slice],
        vec![Stmt::Return(ReturnStmt { results: vec![nil] })],
        false,
        false,
    );
    assert!(js.contains("return $nilSlice;"), "got: {}", js);

    let map = h.map_of(int, int);
    let nil = h.nil();
    let js = h.emit(
        &[],
        &[map],
        vec![Stmt::Return(ReturnStmt { results: vec![nil] })],
        false,
        false,
    );
    assert!(js.contains("return null;"), "got: {}", js);
}

#[test]
fn test_concrete_value_boxes_when_becoming_interface() {
    let mut h = Host::new();
    let int = h.int();
    let iface = h.empty_interface();
    let xo = h.local("x");
    let param = h.use_ident("x", xo, int);
    let x = h.use_expr("x", xo, int);
    let js = h.emit(
        &[param],
        &[iface],
        vec![Stmt::Return(ReturnStmt { results: vec![x] })],
        false,
        false,
    );
    assert!(js.contains("return $iface($Int, x);"), "got: {}", js);
}

#[test]
fn test_len_reads_the_representation_directly() {
    let mut h = Host::new();
    let int = h.int();
    let string = h.string_ty();
    let slice = h.slice_of(int);
    let len = h.builtin("len", Builtin::Len);

    let so = h.local("s");
    let ps = h.use_ident("s", so, slice);
    let s = h.use_expr("s", so, slice);
    let f = h.use_expr("len", len, int);
    let call = h.call(f, vec![s], int);
    let js = h.emit(
        &[ps],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![call] })],
        false,
        false,
    );
    assert!(js.contains("return s.$length;"), "got: {}", js);

    let to = h.local("t");
    let pt = h.use_ident("t", to, string);
    let t = h.use_expr("t", to, string);
    let f = h.use_expr("len", len, int);
    let call = h.call(f, vec![t], int);
    let js = h.emit(
        &[pt],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![call] })],
        false,
        false,
    );
    assert!(js.contains("return t.length;"), "got: {}", js);
}

#[test]
fn test_method_call_keeps_the_owner_type_alive() {
    let mut h = Host::new();
    let int = h.int();
    let t = h.named("T", int);
    let to = h.local("t");
    let param = h.use_ident("t", to, t);
    let recv = h.use_expr("t", to, t);
    let sig = h.sig(vec![], vec![int]);
    let call = h.method_call(recv, "M", sig, vec![], int);
    let (_, deps) = h.emit_with_deps(
        &[param],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![call] })],
    );
    assert!(deps.contains(&DepKey::object("main", "T")), "deps: {:?}", deps);
    assert!(deps.contains(&DepKey::method_name("M")), "deps: {:?}", deps);

    // With the owner edge recorded, selection keeps both the type
    // declaration and the attached method.
    let decls = vec![
        Decl { keys: vec![DepKey::object("main", "main")], deps, ..Decl::default() },
        Decl { keys: vec![DepKey::object("main", "T")], ..Decl::default() },
        Decl { keys: vec![DepKey::method("main", "T", "M")], ..Decl::default() },
    ];
    assert_eq!(select_alive(&decls), vec![0, 1, 2]);
}

#[test]
fn test_method_on_named_basic_dispatches_through_the_descriptor() {
    let mut h = Host::new();
    let int = h.int();

    // A named type over a basic is a raw primitive at run time; its
    // methods dispatch through the descriptor's prototype explicitly.
    let celsius = h.named("Celsius", int);
    let co = h.local("c");
    let pc = h.use_ident("c", co, celsius);
    let c = h.use_expr("c", co, celsius);
    let sig = h.sig(vec![int], vec![int]);
    let two = h.int_lit(2);
    let call = h.method_call(c, "Scale", sig, vec![two], int);
    let js = h.emit(
        &[pc],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![call] })],
        false,
        false,
    );
    assert!(
        js.contains("$pkg.Celsius.prototype.Scale.call(c, 2)"),
        "got: {}",
        js
    );

    // A named struct receiver is an object and keeps plain dispatch.
    let st = h.oracle.types.intern(Type::Struct { fields: Vec::new() });
    let point = h.named("Point", st);
    let po = h.local("p");
    let pp = h.use_ident("p", po, point);
    let p = h.use_expr("p", po, point);
    let sig = h.sig(vec![], vec![int]);
    let call = h.method_call(p, "Norm", sig, vec![], int);
    let js = h.emit(
        &[pp],
        &[int],
        vec![Stmt::Return(ReturnStmt { results: vec![call] })],
        false,
        false,
    );
    assert!(js.contains("p.Norm()"), "got: {}", js);
}

#[test]
fn test_string_index_is_bounds_guarded() {
    let mut h = Host::new();
    let string = h.string_ty();
    let u8t = h.uint8();
    let int = h.int();
    let so = h.local("s");
    let ps = h.use_ident("s", so, string);
    let s = h.use_expr("s", so, string);
    let io = h.local("i");
    let pi = h.use_ident("i", io, int);
    let i = h.use_expr("i", io, int);
    let id = h.node();
    h.oracle.bind_type(id, u8t);
    let ix = Expr::Index(IndexExpr { id, x: Box::new(s), index: Box::new(i) });
    let js = h.emit(
        &[ps, pi],
        &[u8t],
        vec![Stmt::Return(ReturnStmt { results: vec![ix] })],
        false,
        false,
    );
    assert!(js.contains("return $indexString(s, i);"), "got: {}", js);
}
