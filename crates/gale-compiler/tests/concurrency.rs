//! Channel operations, `select`, `go`, and blocking calls all lower into
//! the flattened dispatch shape: the function parks by returning out of
//! `$body` and resumes at a numbered case with the result in `$r`.

mod common;

use common::Host;
use gale_ast::{
    AssignStmt, CallExpr, CommClause, CommOp, Expr, RangeStmt, SelectStmt, SendStmt, Stmt,
};

#[test]
fn test_send_parks_and_resumes_at_the_next_case() {
    let mut h = Host::new();
    let int = h.int();
    let chan = h.chan_of(int);
    let co = h.local("ch");
    let pc = h.use_ident("ch", co, chan);
    let ch = h.use_expr("ch", co, chan);
    let one = h.int_lit(1);
    let js = h.emit(
        &[pc],
        &[],
        vec![Stmt::Send(SendStmt { chan: ch, value: one })],
        true,
        false,
    );
    assert_eq!(
        js,
        "function(ch) {\n\
         \tvar $s = 0, $r;\n\
         \tvar $body = function() { s: while (true) { switch ($s) { case 0:\n\
         \t\t$s = 1; return $send(ch, 1, $body);\n\
         \tcase 1:\n\
         \t\t$r = $curGoroutine.result;\n\
         \t} return; } };\n\
         \treturn $body();\n\
         }"
    );
}

#[test]
fn test_receive_destructures_value_and_ok() {
    let mut h = Host::new();
    let int = h.int();
    let bool_ty = h.bool_ty();
    let chan = h.chan_of(int);
    let co = h.local("ch");
    let pc = h.use_ident("ch", co, chan);
    let ch = h.use_expr("ch", co, chan);
    let recv = h.recv_expr(ch, int);
    let v = h.decl_ident("v", int);
    let ok = h.decl_ident("ok", bool_ty);
    let js = h.emit(
        &[pc],
        &[],
        vec![Stmt::Assign(AssignStmt {
            lhs: vec![Expr::Ident(v), Expr::Ident(ok)],
            rhs: vec![recv],
            op: None,
            define: true,
        })],
        true,
        false,
    );
    assert!(js.contains("$s = 1; return $recv(ch, $body);"), "got: {}", js);
    assert!(js.contains("$r = $curGoroutine.result;"), "got: {}", js);
    assert!(js.contains("_tuple = $r;"), "got: {}", js);
    assert!(js.contains("v = _tuple[0];"), "got: {}", js);
    assert!(js.contains("ok = _tuple[1];"), "got: {}", js);
    // Locals hoist out of the dispatch closure.
    assert!(js.contains("var $s = 0, $r, _tuple, v, ok;"), "got: {}", js);
}

#[test]
fn test_select_parks_on_the_whole_clause_set() {
    let mut h = Host::new();
    let int = h.int();
    let chan = h.chan_of(int);
    let co = h.local("ch");
    let pc = h.use_ident("ch", co, chan);
    let ch = h.use_expr("ch", co, chan);
    let v = h.decl_ident("v", int);
    let js = h.emit(
        &[pc],
        &[],
        vec![Stmt::Select(SelectStmt {
            cases: vec![
                CommClause {
                    comm: Some(CommOp::Recv {
                        lhs: vec![Expr::Ident(v)],
                        define: true,
                        chan: ch,
                    }),
                    body: vec![],
                },
                CommClause { comm: None, body: vec![] },
            ],
        })],
        true,
        false,
    );
    assert!(
        js.contains("$s = 1; return $select([[ch, $RECV], []], $body);"),
        "got: {}",
        js
    );
    assert!(js.contains("if ($r[0] === 0) {"), "got: {}", js);
    assert!(js.contains("v = $r[1];"), "got: {}", js);
    assert!(js.contains("if ($r[0] === 1) {"), "got: {}", js);
}

#[test]
fn test_go_hands_the_call_to_the_scheduler() {
    let mut h = Host::new();
    let int = h.int();
    let sig = h.sig(vec![int], vec![]);
    let fo = h.pkg_func("f");
    let xo = h.local("x");
    let px = h.use_ident("x", xo, int);
    let f = h.use_ident("f", fo, sig);
    let x = h.use_expr("x", xo, int);
    let call_id = h.node();
    let js = h.emit(
        &[px],
        &[],
        vec![Stmt::Go(CallExpr {
            id: call_id,
            fun: Box::new(Expr::Ident(f)),
            args: vec![x],
            spread: false,
        })],
        false,
        false,
    );
    assert!(js.contains("$go(f, [x]); $schedule();"), "got: {}", js);
}

#[test]
fn test_range_over_channel_exits_when_closed() {
    let mut h = Host::new();
    let int = h.int();
    let chan = h.chan_of(int);
    let co = h.local("ch");
    let pc = h.use_ident("ch", co, chan);
    let ch = h.use_expr("ch", co, chan);
    let v = h.decl_ident("v", int);
    let js = h.emit(
        &[pc],
        &[],
        vec![Stmt::Range(RangeStmt {
            key: Some(v),
            value: None,
            define: true,
            subject: ch,
            body: gale_ast::Block::new(vec![]),
        })],
        true,
        false,
    );
    assert!(js.contains("return $recv(_ref, $body);"), "got: {}", js);
    // ok=false means drained and closed; jump to the loop's end case.
    assert!(js.contains("if (!($r[1])) { $s = 2; continue s; }"), "got: {}", js);
    assert!(js.contains("v = $r[0];"), "got: {}", js);
}

#[test]
fn test_blocking_call_parks_through_a_thunk() {
    let mut h = Host::new();
    let int = h.int();
    let sig = h.sig(vec![], vec![int]);
    let fo = h.pkg_func("f");
    let f = h.use_expr("f", fo, sig);
    let call = h.blocking_call(f, vec![], int);
    let x = h.decl_ident("x", int);
    let js = h.emit(
        &[],
        &[],
        vec![Stmt::Assign(AssignStmt {
            lhs: vec![Expr::Ident(x)],
            rhs: vec![call],
            op: None,
            define: true,
        })],
        true,
        false,
    );
    assert!(
        js.contains("$s = 1; return $invoke(function() { return f(); }, $body);"),
        "got: {}",
        js
    );
    assert!(js.contains("x = $r;"), "got: {}", js);
}
