//! Pre-lowering analyses over statement trees
//!
//! Blocking-call and escape analyses are external inputs carried by the
//! Oracle; this module only folds those per-node predicates over bodies to
//! answer the questions lowering needs: "can this body suspend?" and
//! "does this body defer?". Scans stop at function literal boundaries —
//! a nested literal suspending does not flatten its enclosing function.

use gale_ast::{Block, Expr, Stmt, UnOp};
use gale_types::Oracle;

/// Whether a function body must be compiled into a flattened dispatch loop.
///
/// True when the body contains a channel operation, a `select`, a call into
/// the blocking set, or a `goto` (which has no native target-language
/// control transfer).
pub fn must_flatten(body: &Block, oracle: &Oracle) -> bool {
    body.stmts.iter().any(|s| stmt_suspends(s, oracle))
}

pub fn stmt_suspends(stmt: &Stmt, oracle: &Oracle) -> bool {
    match stmt {
        Stmt::Send(_) | Stmt::Select(_) => true,
        Stmt::Branch(b) => b.kind == gale_ast::BranchKind::Goto,
        Stmt::Var(v) => v.values.iter().any(|e| expr_suspends(e, oracle)),
        Stmt::Assign(a) => {
            a.lhs.iter().chain(a.rhs.iter()).any(|e| expr_suspends(e, oracle))
        }
        Stmt::Expr(e) => expr_suspends(e, oracle),
        Stmt::IncDec(s) => expr_suspends(&s.x, oracle),
        Stmt::Return(r) => r.results.iter().any(|e| expr_suspends(e, oracle)),
        Stmt::If(s) => {
            s.init.as_deref().is_some_and(|i| stmt_suspends(i, oracle))
                || expr_suspends(&s.cond, oracle)
                || must_flatten(&s.then, oracle)
                || s.els.as_deref().is_some_and(|e| stmt_suspends(e, oracle))
        }
        Stmt::For(s) => {
            s.init.as_deref().is_some_and(|i| stmt_suspends(i, oracle))
                || s.cond.as_ref().is_some_and(|c| expr_suspends(c, oracle))
                || s.post.as_deref().is_some_and(|p| stmt_suspends(p, oracle))
                || must_flatten(&s.body, oracle)
        }
        Stmt::Range(s) => {
            // Ranging over a channel is a suspension point per iteration.
            matches!(
                oracle.types.underlying(oracle.type_of(s.subject.id())),
                gale_types::Type::Chan { .. }
            ) || expr_suspends(&s.subject, oracle)
                || must_flatten(&s.body, oracle)
        }
        Stmt::Switch(s) => {
            s.init.as_deref().is_some_and(|i| stmt_suspends(i, oracle))
                || s.tag.as_ref().is_some_and(|t| expr_suspends(t, oracle))
                || s.cases.iter().any(|c| {
                    c.exprs.iter().any(|e| expr_suspends(e, oracle))
                        || c.body.iter().any(|st| stmt_suspends(st, oracle))
                })
        }
        Stmt::TypeSwitch(s) => {
            s.init.as_deref().is_some_and(|i| stmt_suspends(i, oracle))
                || expr_suspends(&s.subject, oracle)
                || s.cases.iter().any(|c| c.body.iter().any(|st| stmt_suspends(st, oracle)))
        }
        Stmt::Go(call) => call.args.iter().any(|e| expr_suspends(e, oracle)),
        Stmt::Defer(call) => call.args.iter().any(|e| expr_suspends(e, oracle)),
        Stmt::Labeled(s) => stmt_suspends(&s.stmt, oracle),
        Stmt::Block(b) => must_flatten(b, oracle),
        Stmt::Empty => false,
    }
}

pub fn expr_suspends(expr: &Expr, oracle: &Oracle) -> bool {
    match expr {
        Expr::Unary(u) => u.op == UnOp::Recv || expr_suspends(&u.x, oracle),
        Expr::Binary(b) => expr_suspends(&b.x, oracle) || expr_suspends(&b.y, oracle),
        Expr::Call(c) => {
            oracle.is_blocking_call(c.id)
                || expr_suspends(&c.fun, oracle)
                || c.args.iter().any(|a| expr_suspends(a, oracle))
        }
        Expr::Index(e) => expr_suspends(&e.x, oracle) || expr_suspends(&e.index, oracle),
        Expr::Slice(e) => {
            expr_suspends(&e.x, oracle)
                || e.low.as_deref().is_some_and(|x| expr_suspends(x, oracle))
                || e.high.as_deref().is_some_and(|x| expr_suspends(x, oracle))
                || e.max.as_deref().is_some_and(|x| expr_suspends(x, oracle))
        }
        Expr::Selector(e) => expr_suspends(&e.x, oracle),
        Expr::Star(e) => expr_suspends(&e.x, oracle),
        Expr::TypeAssert(e) => expr_suspends(&e.x, oracle),
        Expr::Composite(c) => c.elems.iter().any(|el| {
            el.key.as_ref().is_some_and(|k| expr_suspends(k, oracle))
                || expr_suspends(&el.value, oracle)
        }),
        // A nested literal's suspensions are its own.
        Expr::FuncLit(_) => false,
        Expr::Ident(_) | Expr::Lit(_) | Expr::TypeRef(_) => false,
    }
}

/// Whether a body contains `defer` at any depth (stopping at literals).
pub fn has_defer(body: &Block) -> bool {
    body.stmts.iter().any(stmt_defers)
}

fn stmt_defers(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Defer(_) => true,
        Stmt::If(s) => {
            has_defer(&s.then) || s.els.as_deref().is_some_and(stmt_defers)
        }
        Stmt::For(s) => has_defer(&s.body),
        Stmt::Range(s) => has_defer(&s.body),
        Stmt::Switch(s) => s.cases.iter().any(|c| c.body.iter().any(stmt_defers)),
        Stmt::TypeSwitch(s) => s.cases.iter().any(|c| c.body.iter().any(stmt_defers)),
        Stmt::Select(s) => s.cases.iter().any(|c| c.body.iter().any(stmt_defers)),
        Stmt::Labeled(s) => stmt_defers(&s.stmt),
        Stmt::Block(b) => has_defer(b),
        _ => false,
    }
}
