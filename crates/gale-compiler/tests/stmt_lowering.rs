//! Statement and control-flow lowering in the direct (structured) shape,
//! plus `goto`, which always needs the dispatch loop.

mod common;

use common::Host;
use gale_ast::{
    AssignStmt, BinOp, BranchKind, BranchStmt, CaseClause, Expr, IncDecStmt, IndexExpr,
    LabeledStmt, RangeStmt, ReturnStmt, Stmt, SwitchStmt,
};

#[test]
fn test_counted_loop_compiles_to_a_labeled_while() {
    let mut h = Host::new();
    let int = h.int();
    let bool_ty = h.bool_ty();
    let no = h.local("n");
    let pn = h.use_ident("n", no, int);
    let io = h.local("i");

    let i_decl = h.use_expr("i", io, int);
    let zero = h.int_lit(0);
    let init = Stmt::Assign(AssignStmt {
        lhs: vec![i_decl],
        rhs: vec![zero],
        op: None,
        define: true,
    });
    let i_cond = h.use_expr("i", io, int);
    let n = h.use_expr("n", no, int);
    let cond = h.binary(BinOp::Lt, i_cond, n, bool_ty);
    let i_post = h.use_expr("i", io, int);
    let post = Stmt::IncDec(IncDecStmt { x: i_post, inc: true });

    let js = h.emit(
        &[pn],
        &[],
        vec![Stmt::For(gale_ast::ForStmt {
            init: Some(Box::new(init)),
            cond: Some(cond),
            post: Some(Box::new(post)),
            body: gale_ast::Block::new(vec![]),
        })],
        false,
        false,
    );
    assert!(js.contains("var i = 0;"), "got: {}", js);
    assert!(js.contains("l$1: while (true) {"), "got: {}", js);
    assert!(js.contains("if (!((i < n))) { break l$1; }"), "got: {}", js);
    // The post statement runs outside the continue-target block.
    assert!(js.contains("i = (i + 1) >> 0;"), "got: {}", js);
}

#[test]
fn test_continue_jumps_to_the_post_statement() {
    let mut h = Host::new();
    let int = h.int();
    let io = h.local("i");
    let i_post = h.use_expr("i", io, int);
    let post = Stmt::IncDec(IncDecStmt { x: i_post, inc: true });

    let js = h.emit(
        &[],
        &[],
        vec![Stmt::For(gale_ast::ForStmt {
            init: None,
            cond: None,
            post: Some(Box::new(post)),
            body: gale_ast::Block::new(vec![Stmt::Branch(BranchStmt {
                kind: BranchKind::Continue,
                label: None,
            })]),
        })],
        false,
        false,
    );
    // The inner labeled block is the continue target; breaking it falls
    // through to the post statement.
    assert!(js.contains("l$2: {"), "got: {}", js);
    assert!(js.contains("break l$2;"), "got: {}", js);
}

fn int_switch(h: &mut Host, cases: Vec<CaseClause>) -> String {
    let int = h.int();
    let xo = h.local("x");
    let px = h.use_ident("x", xo, int);
    let x = h.use_expr("x", xo, int);
    h.emit(
        &[px],
        &[],
        vec![Stmt::Switch(SwitchStmt { init: None, tag: Some(x), cases })],
        false,
        false,
    )
}

#[test]
fn test_switch_without_fallthrough_chains_conditions() {
    let mut h = Host::new();
    let one = h.int_lit(1);
    let two = h.int_lit(2);
    let js = int_switch(
        &mut h,
        vec![
            CaseClause { exprs: vec![one], body: vec![] },
            CaseClause { exprs: vec![two], body: vec![] },
            CaseClause { exprs: vec![], body: vec![] },
        ],
    );
    // The tag evaluates exactly once.
    assert!(js.contains("var _tag = x;"), "got: {}", js);
    assert!(js.contains("if (_tag === 1) {"), "got: {}", js);
    assert!(js.contains("} else if (_tag === 2) {"), "got: {}", js);
    assert!(js.contains("} else {"), "got: {}", js);
}

#[test]
fn test_fallthrough_turns_selection_into_a_match_flag() {
    let mut h = Host::new();
    let one = h.int_lit(1);
    let two = h.int_lit(2);
    let js = int_switch(
        &mut h,
        vec![
            CaseClause {
                exprs: vec![one],
                body: vec![Stmt::Branch(BranchStmt {
                    kind: BranchKind::Fallthrough,
                    label: None,
                })],
            },
            CaseClause { exprs: vec![two], body: vec![] },
        ],
    );
    assert!(js.contains("var _match = false;"), "got: {}", js);
    assert!(js.contains("if (_match || (_tag === 1)) {"), "got: {}", js);
    assert!(js.contains("_match = true;"), "got: {}", js);
    assert!(js.contains("break l$1;"), "got: {}", js);
}

#[test]
fn test_range_over_string_walks_utf8_runes() {
    let mut h = Host::new();
    let string = h.string_ty();
    let int = h.int();
    let so = h.local("s");
    let ps = h.use_ident("s", so, string);
    let s = h.use_expr("s", so, string);
    let io = h.local("i");
    let i = h.use_ident("i", io, int);
    let ro = h.local("r");
    let int32 = h.oracle.types.basic(gale_types::BasicKind::Int32);
    let r = h.use_ident("r", ro, int32);

    let js = h.emit(
        &[ps],
        &[],
        vec![Stmt::Range(RangeStmt {
            key: Some(i),
            value: Some(r),
            define: true,
            subject: s,
            body: gale_ast::Block::new(vec![]),
        })],
        false,
        false,
    );
    assert!(js.contains("var _ref = s;"), "got: {}", js);
    assert!(js.contains("_rune = $decodeRune(_ref, _i);"), "got: {}", js);
    assert!(js.contains("var i = _i;"), "got: {}", js);
    assert!(js.contains("var r = _rune[0];"), "got: {}", js);
    // The index advances by the encoded width, not by one.
    assert!(js.contains("_i = _i + _rune[1] >> 0;"), "got: {}", js);
}

#[test]
fn test_range_over_map_iterates_a_snapshot() {
    let mut h = Host::new();
    let int = h.int();
    let string = h.string_ty();
    let map = h.map_of(string, int);
    let mo = h.local("m");
    let pm = h.use_ident("m", mo, map);
    let m = h.use_expr("m", mo, map);
    let ko = h.local("k");
    let k = h.use_ident("k", ko, string);
    let vo = h.local("v");
    let v = h.use_ident("v", vo, int);

    let js = h.emit(
        &[pm],
        &[],
        vec![Stmt::Range(RangeStmt {
            key: Some(k),
            value: Some(v),
            define: true,
            subject: m,
            body: gale_ast::Block::new(vec![]),
        })],
        false,
        false,
    );
    assert!(js.contains("var _entries = $mapRange(_ref);"), "got: {}", js);
    assert!(js.contains("var k = _entries[_i][0];"), "got: {}", js);
    assert!(js.contains("var v = _entries[_i][1];"), "got: {}", js);
}

#[test]
fn test_parallel_assignment_reads_every_source_first() {
    let mut h = Host::new();
    let int = h.int();
    let ao = h.local("a");
    let bo = h.local("b");
    let pa = h.use_ident("a", ao, int);
    let pb = h.use_ident("b", bo, int);

    let la = h.use_expr("a", ao, int);
    let lb = h.use_expr("b", bo, int);
    let rb = h.use_expr("b", bo, int);
    let ra = h.use_expr("a", ao, int);
    let js = h.emit(
        &[pa, pb],
        &[],
        vec![Stmt::Assign(AssignStmt {
            lhs: vec![la, lb],
            rhs: vec![rb, ra],
            op: None,
            define: false,
        })],
        false,
        false,
    );
    assert!(js.contains("var _tmp = b;"), "got: {}", js);
    assert!(js.contains("var _tmp$1 = a;"), "got: {}", js);
    assert!(js.contains("a = _tmp;"), "got: {}", js);
    assert!(js.contains("b = _tmp$1;"), "got: {}", js);
}

#[test]
fn test_two_result_map_read_destructures_value_and_presence() {
    let mut h = Host::new();
    let int = h.int();
    let string = h.string_ty();
    let bool_ty = h.bool_ty();
    let map = h.map_of(string, int);
    let mo = h.local("m");
    let pm = h.use_ident("m", mo, map);
    let ko = h.local("k");
    let pk = h.use_ident("k", ko, string);

    let m = h.use_expr("m", mo, map);
    let k = h.use_expr("k", ko, string);
    let ix_id = h.node();
    let ix = Expr::Index(IndexExpr { id: ix_id, x: Box::new(m), index: Box::new(k) });
    let v = h.decl_ident("v", int);
    let ok = h.decl_ident("ok", bool_ty);
    let js = h.emit(
        &[pm, pk],
        &[],
        vec![Stmt::Assign(AssignStmt {
            lhs: vec![Expr::Ident(v), Expr::Ident(ok)],
            rhs: vec![ix],
            op: None,
            define: true,
        })],
        false,
        false,
    );
    assert!(js.contains("var _tuple = $mapLookup(m, k, 0);"), "got: {}", js);
    assert!(js.contains("var v = _tuple[0];"), "got: {}", js);
    assert!(js.contains("var ok = _tuple[1];"), "got: {}", js);
}

#[test]
fn test_goto_reenters_the_dispatch_loop() {
    let mut h = Host::new();
    let js = h.emit(
        &[],
        &[],
        vec![
            Stmt::Labeled(LabeledStmt {
                label: "again".to_string(),
                stmt: Box::new(Stmt::Empty),
            }),
            Stmt::Branch(BranchStmt {
                kind: BranchKind::Goto,
                label: Some("again".to_string()),
            }),
        ],
        true,
        false,
    );
    assert!(js.contains("case 1:"), "got: {}", js);
    assert!(js.contains("$s = 1; continue s;"), "got: {}", js);
}

#[test]
fn test_named_results_return_their_current_value() {
    let mut h = Host::new();
    let int = h.int();
    let n = h.decl_ident("n", int);
    let n_store = {
        let obj = h.oracle.object_of(n.id);
        h.use_expr("n", obj, int)
    };
    let one = h.int_lit(1);
    let js = h.emit_named(
        &[],
        &[n.clone()],
        &[int],
        vec![
            Stmt::Assign(AssignStmt {
                lhs: vec![n_store],
                rhs: vec![one],
                op: None,
                define: false,
            }),
            Stmt::Return(ReturnStmt { results: vec![] }),
        ],
        false,
    );
    assert!(js.contains("var n = 0;"), "got: {}", js);
    assert!(js.contains("n = 1;"), "got: {}", js);
    assert!(js.contains("return n;"), "got: {}", js);
}
