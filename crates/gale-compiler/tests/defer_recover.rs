//! `defer`, `panic`, and `recover`: the protected-invocation wrapper,
//! eager argument capture, and result traffic through `finally`.

mod common;

use common::Host;
use gale_ast::{AssignStmt, CallExpr, Expr, ReturnStmt, SendStmt, Stmt};
use gale_types::Builtin;

fn deferred_call(h: &mut Host, fun: Expr, args: Vec<Expr>) -> Stmt {
    let id = h.node();
    Stmt::Defer(CallExpr { id, fun: Box::new(fun), args, spread: false })
}

#[test]
fn test_defer_captures_arguments_at_defer_time() {
    let mut h = Host::new();
    let int = h.int();
    let sig = h.sig(vec![int], vec![]);
    let fo = h.pkg_func("f");
    let xo = h.local("x");
    let px = h.use_ident("x", xo, int);
    let f = h.use_expr("f", fo, sig);
    let x = h.use_expr("x", xo, int);
    let stmt = deferred_call(&mut h, f, vec![x]);
    let js = h.emit(&[px], &[], vec![stmt], false, true);
    assert!(js.contains("var $deferred = [], $err = null;"), "got: {}", js);
    assert!(js.contains("try {"), "got: {}", js);
    assert!(
        js.contains(
            "$deferred.push((function($f, $a0) { return function() { $f($a0); }; })(f, x));"
        ),
        "got: {}",
        js
    );
    assert!(js.contains("$err = $callDeferred($deferred, $err);"), "got: {}", js);
    assert!(js.contains("if ($err !== null) { $throw($err); }"), "got: {}", js);
}

#[test]
fn test_deferred_panic_boxes_its_argument() {
    let mut h = Host::new();
    let int = h.int();
    let panic_obj = h.builtin("panic", Builtin::Panic);
    let p = h.use_expr("panic", panic_obj, int);
    let xo = h.local("x");
    let px = h.use_ident("x", xo, int);
    let x = h.use_expr("x", xo, int);
    let stmt = deferred_call(&mut h, p, vec![x]);
    let js = h.emit(&[px], &[], vec![stmt], false, true);
    assert!(
        js.contains(
            "$deferred.push((function($v) { return function() { $panic($v); }; })($iface($Int, x)));"
        ),
        "got: {}",
        js
    );
}

#[test]
fn test_recover_reads_the_pending_panic() {
    let mut h = Host::new();
    let iface = h.empty_interface();
    let recover_obj = h.builtin("recover", Builtin::Recover);
    let f = h.use_expr("recover", recover_obj, iface);
    let call = h.call(f, vec![], iface);
    let r = h.decl_ident("r", iface);
    let js = h.emit(
        &[],
        &[],
        vec![Stmt::Assign(AssignStmt {
            lhs: vec![Expr::Ident(r)],
            rhs: vec![call],
            op: None,
            define: true,
        })],
        false,
        true,
    );
    assert!(js.contains("var r = $recover();"), "got: {}", js);
}

#[test]
fn test_flattened_defer_distinguishes_suspension_from_exit() {
    let mut h = Host::new();
    let int = h.int();
    let chan = h.chan_of(int);
    let sig = h.sig(vec![], vec![]);
    let go_ = h.pkg_func("g");
    let g = h.use_expr("g", go_, sig);
    let stmt = deferred_call(&mut h, g, vec![]);
    let co = h.local("ch");
    let pc = h.use_ident("ch", co, chan);
    let ch = h.use_expr("ch", co, chan);
    let one = h.int_lit(1);
    let js = h.emit(
        &[pc],
        &[],
        vec![stmt, Stmt::Send(SendStmt { chan: ch, value: one })],
        true,
        true,
    );
    assert!(js.contains("var $deferred = [], $err = null, $s = 0, $r;"), "got: {}", js);
    assert!(
        js.contains("var $body = function() { try { s: while (true) { switch ($s) { case 0:"),
        "got: {}",
        js
    );
    // A parked goroutine must not run its defers yet.
    assert!(
        js.contains("catch (err) { $err = err; $s = -1; } finally { if (!$curGoroutine.asleep) {"),
        "got: {}",
        js
    );
}

#[test]
fn test_named_result_flows_out_through_finally() {
    let mut h = Host::new();
    let int = h.int();
    let sig = h.sig(vec![], vec![]);
    let go_ = h.pkg_func("g");
    let g = h.use_expr("g", go_, sig);
    let stmt = deferred_call(&mut h, g, vec![]);
    let n = h.decl_ident("n", int);
    let one = h.int_lit(1);
    let js = h.emit_named(
        &[],
        &[n],
        &[int],
        vec![stmt, Stmt::Return(ReturnStmt { results: vec![one] })],
        true,
    );
    assert!(js.contains("var n = 0;"), "got: {}", js);
    assert!(js.contains("n = 1;"), "got: {}", js);
    // The finally clause carries the named result out past the defers.
    assert!(js.contains("return n;"), "got: {}", js);
}
