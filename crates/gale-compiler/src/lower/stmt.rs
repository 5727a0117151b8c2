//! Statement and control-flow lowering
//!
//! A function body compiles in one of two shapes. The direct shape is
//! plain structured JavaScript: loops become labeled `while (true)` loops,
//! switches become labeled blocks. The flattened shape rewrites the body
//! into a dispatch loop (`s: while (true) { switch ($s) { ... } }`) whose
//! numbered cases double as resumption points: a channel operation or a
//! call into the blocking set parks the goroutine by returning out of the
//! dispatch closure and resumes at the recorded case with the operation's
//! result in `$r`. Inside a flattened function an individual construct
//! still lowers directly when nothing underneath it can suspend.

use super::{Expression, FlowFrame, FuncContext};
use crate::analysis;
use crate::prelude;
use gale_ast::{
    AssignStmt, BinOp, Block, BranchKind, BranchStmt, CallExpr, CaseClause, CommOp, Expr, ForStmt,
    Ident, IfStmt, IncDecStmt, LabeledStmt, RangeStmt, Receiver, ReturnStmt, SelectStmt, SendStmt,
    Stmt, SwitchStmt, TypeSwitchStmt, UnOp, VarDecl,
};
use gale_types::{BasicKind, Builtin, ObjectKind, Type, TypeId};

fn clause_stmts(c: &CaseClause) -> &[Stmt] {
    if c.falls_through() {
        &c.body[..c.body.len() - 1]
    } else {
        &c.body
    }
}

fn lhs_ident(e: &Expr) -> &Ident {
    match e {
        Expr::Ident(ident) => ident,
        other => panic!("gale: declaration target {:?} is not an identifier", other.id()),
    }
}

impl<'a> FuncContext<'a> {
    // ------------------------------------------------------------------
    // Function assembly
    // ------------------------------------------------------------------

    /// Emit a complete function literal text for `body`. `flattened` and
    /// `deferring` must be set before the call; `results` carries the
    /// declared result types whether or not they are named.
    pub fn emit_function(
        &mut self,
        recv: Option<&Receiver>,
        params: &[Ident],
        named_results: &[Ident],
        results: &[TypeId],
        body: &Block,
    ) -> String {
        let saved_out = std::mem::take(&mut self.out);
        let base = self.indent;

        self.result_names.clear();
        self.result_types = results.to_vec();
        self.hoisted.clear();

        let mut param_names = Vec::with_capacity(params.len());
        for p in params {
            if p.is_blank() {
                param_names.push(self.fresh_name("_"));
            } else {
                let obj = self.oracle.object_of(p.id);
                param_names.push(self.object_name(obj));
            }
        }

        // Prologue: receiver binding, box rebinding, result storage. These
        // live in the outer function so the dispatch closure sees them.
        self.indent = base + 1;
        if let Some(recv) = recv {
            if let Some(name) = &recv.name {
                if !name.is_blank() {
                    let obj = self.oracle.object_of(name.id);
                    let n = self.object_name(obj);
                    if self.is_boxed(obj) {
                        self.writeln(&format!("var {} = [this];", n));
                    } else {
                        self.writeln(&format!("var {} = this;", n));
                    }
                }
            }
        }
        for (p, n) in params.iter().zip(&param_names) {
            if p.is_blank() {
                continue;
            }
            let obj = self.oracle.object_of(p.id);
            if self.is_boxed(obj) {
                self.writeln(&format!("{} = [{}];", n, n));
            }
        }
        if !named_results.is_empty() {
            for (ident, ty) in named_results.iter().zip(results) {
                let zero = self.zero_value(*ty);
                if ident.is_blank() {
                    let name = self.fresh_name("_");
                    self.writeln(&format!("var {} = {};", name, zero));
                    self.result_names.push(name);
                    continue;
                }
                let obj = self.oracle.object_of(ident.id);
                let name = self.object_name(obj);
                if self.is_boxed(obj) {
                    self.writeln(&format!("var {} = [{}];", name, zero));
                    self.result_names.push(format!("{}[0]", name));
                } else {
                    self.writeln(&format!("var {} = {};", name, zero));
                    self.result_names.push(name);
                }
            }
        } else if self.deferring && !results.is_empty() {
            self.writeln("var $result;");
        }
        let prologue = std::mem::take(&mut self.out);

        // Body.
        self.indent = if self.flattened || self.deferring { base + 2 } else { base + 1 };
        for stmt in &body.stmts {
            self.translate_stmt(stmt);
        }
        let body_text = std::mem::take(&mut self.out);

        let finally_ret = if !self.result_names.is_empty() {
            Some(self.named_result_value())
        } else if self.deferring && !self.result_types.is_empty() {
            Some("$result".to_string())
        } else {
            None
        };

        // Assemble.
        self.indent = base;
        self.out.push_str(&format!("function({}) {{\n", param_names.join(", ")));
        self.out.push_str(&prologue);
        self.indent = base + 1;
        if self.flattened {
            let mut vars = if self.deferring {
                String::from("var $deferred = [], $err = null, $s = 0, $r")
            } else {
                String::from("var $s = 0, $r")
            };
            for h in &self.hoisted {
                vars.push_str(", ");
                vars.push_str(h);
            }
            vars.push(';');
            self.writeln(&vars);
            if self.deferring {
                self.writeln(
                    "var $body = function() { try { s: while (true) { switch ($s) { case 0:",
                );
            } else {
                self.writeln("var $body = function() { s: while (true) { switch ($s) { case 0:");
            }
            self.out.push_str(&body_text);
            if self.deferring {
                let mut tail = format!(
                    "}} return; }} }} catch (err) {{ $err = err; $s = -1; }} finally {{ \
                     if (!{}.asleep) {{ $err = {}($deferred, $err); \
                     if ($err !== null) {{ {}($err); }}",
                    prelude::CUR_GOROUTINE,
                    prelude::CALL_DEFERRED,
                    prelude::THROW
                );
                if let Some(v) = &finally_ret {
                    tail.push_str(&format!(" return {};", v));
                }
                tail.push_str(" } } };");
                self.writeln(&tail);
            } else {
                self.writeln("} return; } };");
            }
            self.writeln("return $body();");
        } else if self.deferring {
            self.writeln("var $deferred = [], $err = null;");
            self.writeln("try {");
            self.out.push_str(&body_text);
            self.writeln("} catch (err) {");
            self.indented(|cx| cx.writeln("$err = err;"));
            self.writeln("} finally {");
            self.indented(|cx| {
                cx.writeln(&format!("$err = {}($deferred, $err);", prelude::CALL_DEFERRED));
                cx.writeln(&format!("if ($err !== null) {{ {}($err); }}", prelude::THROW));
                if let Some(v) = &finally_ret {
                    cx.writeln(&format!("return {};", v));
                }
            });
            self.writeln("}");
        } else {
            self.out.push_str(&body_text);
        }

        self.indent = base;
        if !self.scope.minify {
            for _ in 0..base {
                self.out.push('\t');
            }
        }
        self.out.push('}');

        let text = std::mem::take(&mut self.out);
        self.out = saved_out;
        text
    }

    fn named_result_value(&self) -> String {
        if self.result_names.len() == 1 {
            self.result_names[0].clone()
        } else {
            format!("[{}]", self.result_names.join(", "))
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn translate_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => {}
            Stmt::Var(v) => self.translate_var(v),
            Stmt::Assign(a) => self.translate_assign(a),
            Stmt::Expr(e) => self.translate_expr_stmt(e),
            Stmt::Send(s) => self.translate_send(s),
            Stmt::IncDec(s) => self.translate_incdec(s),
            Stmt::Return(r) => self.translate_return(r),
            Stmt::If(s) => self.translate_if(s),
            Stmt::For(s) => self.translate_for(s, None),
            Stmt::Range(s) => self.translate_range(s, None),
            Stmt::Switch(s) => self.translate_switch(s, None),
            Stmt::TypeSwitch(s) => self.translate_type_switch(s, None),
            Stmt::Select(s) => self.translate_select(s, None),
            Stmt::Go(c) => self.translate_go(c),
            Stmt::Defer(c) => self.translate_defer(c),
            Stmt::Branch(b) => self.translate_branch(b),
            Stmt::Labeled(l) => self.translate_labeled(l),
            Stmt::Block(b) => {
                self.writeln("{");
                self.indented(|cx| cx.translate_block_stmts(b));
                self.writeln("}");
            }
        }
    }

    fn translate_block_stmts(&mut self, b: &Block) {
        for stmt in &b.stmts {
            self.translate_stmt(stmt);
        }
    }

    // ------------------------------------------------------------------
    // Declarations and assignment
    // ------------------------------------------------------------------

    /// `var x = init` or, when the local was already introduced (mixed
    /// short declarations) or lives at package level, a plain store.
    fn declare_local(&mut self, ident: &Ident, init: &str) {
        if ident.is_blank() {
            self.writeln(&format!("{};", init));
            return;
        }
        let obj = self.oracle.object_of(ident.id);
        let known = self.obj_names_contains(obj);
        let name = self.object_name(obj);
        let boxed = self.is_boxed(obj);
        if known || name.contains('.') || name.contains('[') {
            if boxed {
                self.writeln(&format!("{}[0] = {};", name, init));
            } else {
                self.writeln(&format!("{} = {};", name, init));
            }
        } else if boxed {
            self.declare_var(&name, &format!("[{}]", init));
        } else {
            self.declare_var(&name, init);
        }
    }

    fn obj_names_contains(&self, obj: gale_types::ObjectId) -> bool {
        self.obj_names.contains_key(&obj)
    }

    /// Declare a function-local slot. In a flattened body the `var` is
    /// hoisted to the enclosing function and only the store stays here.
    fn declare_var(&mut self, name: &str, init: &str) {
        if self.flattened {
            self.hoisted.push(name.to_string());
            self.writeln(&format!("{} = {};", name, init));
        } else {
            self.writeln(&format!("var {} = {};", name, init));
        }
    }

    fn translate_var(&mut self, v: &VarDecl) {
        if v.values.is_empty() {
            for name in &v.names {
                if name.is_blank() {
                    continue;
                }
                let ty = self.oracle.type_of(name.id);
                let zero = self.zero_value(ty);
                self.declare_local(name, &zero);
            }
        } else if v.values.len() == v.names.len() {
            for (name, value) in v.names.iter().zip(&v.values) {
                let ty = self
                    .oracle
                    .try_type_of(name.id)
                    .unwrap_or_else(|| self.oracle.type_of(value.id()));
                let init = self.value_text(value, ty);
                self.declare_local(name, &init);
            }
        } else {
            let lhs: Vec<Expr> = v.names.iter().cloned().map(Expr::Ident).collect();
            self.destructure_assign(&lhs, &v.values[0], true);
        }
    }

    fn translate_assign(&mut self, a: &AssignStmt) {
        if let Some(op) = a.op {
            self.translate_compound(a, op);
            return;
        }
        if a.lhs.len() > 1 && a.rhs.len() == 1 {
            self.destructure_assign(&a.lhs, &a.rhs[0], a.define);
            return;
        }
        if a.lhs.len() == 1 {
            let lhs = &a.lhs[0];
            let ty = self
                .oracle
                .try_type_of(lhs.id())
                .unwrap_or_else(|| self.oracle.type_of(a.rhs[0].id()));
            let text = self.value_text(&a.rhs[0], ty);
            if a.define {
                self.declare_local(lhs_ident(lhs), &text);
            } else {
                self.assign_place(lhs, &text, ty);
            }
            return;
        }
        // Parallel assignment: all sources evaluate before any store.
        let mut staged = Vec::with_capacity(a.lhs.len());
        for (l, r) in a.lhs.iter().zip(&a.rhs) {
            let ty = self
                .oracle
                .try_type_of(l.id())
                .unwrap_or_else(|| self.oracle.type_of(r.id()));
            let text = self.value_text(r, ty);
            let tmp = self.fresh_name("_tmp");
            self.declare_var(&tmp, &text);
            staged.push((tmp, ty));
        }
        for (l, (tmp, ty)) in a.lhs.iter().zip(staged) {
            if a.define {
                self.declare_local(lhs_ident(l), &tmp);
            } else {
                self.assign_place(l, &tmp, ty);
            }
        }
    }

    /// `a, b = src` where the source yields a tuple: a multi-valued call,
    /// a receive, a two-result map read, or a two-result type assertion.
    fn destructure_assign(&mut self, lhs: &[Expr], value: &Expr, define: bool) {
        let text = match value {
            Expr::Unary(u) if u.op == UnOp::Recv => self.recv_suspend(&u.x).to_string(),
            Expr::Call(c) if self.oracle.is_blocking_call(c.id) => {
                self.call_suspend(c).to_string()
            }
            Expr::Index(ix)
                if matches!(
                    self.oracle.types.underlying(self.oracle.type_of(ix.x.id())),
                    Type::Map { .. }
                ) =>
            {
                self.translate_map_lookup(ix).into_text()
            }
            Expr::TypeAssert(ta) => self.translate_type_assert_ok(ta).into_text(),
            other => self.translate_expr(other, None).wrapped(),
        };
        let tmp = self.fresh_name("_tuple");
        self.declare_var(&tmp, &text);
        for (i, l) in lhs.iter().enumerate() {
            if let Expr::Ident(ident) = l {
                if ident.is_blank() {
                    continue;
                }
            }
            let component = format!("{}[{}]", tmp, i);
            if define {
                self.declare_local(lhs_ident(l), &component);
            } else {
                let ty = self.oracle.type_of(l.id());
                self.assign_place(l, &component, ty);
            }
        }
    }

    /// Store `value` into an assignable place. `ty` is the place's type
    /// (structs behind pointers copy instead of rebinding).
    fn assign_place(&mut self, lhs: &Expr, value: &str, ty: TypeId) {
        match lhs {
            Expr::Ident(ident) if ident.is_blank() => {
                self.writeln(&format!("{};", value));
            }
            Expr::Ident(ident) => {
                let obj = self.oracle.object_of(ident.id);
                let name = self.object_name(obj);
                if self.is_boxed(obj) {
                    self.writeln(&format!("{}[0] = {};", name, value));
                } else {
                    self.writeln(&format!("{} = {};", name, value));
                }
            }
            Expr::Index(ix) => {
                let subject_ty = self.oracle.type_of(ix.x.id());
                match self.oracle.types.underlying(subject_ty).clone() {
                    Type::Map { key, .. } => {
                        let m = self.translate_expr(&ix.x, None).wrapped();
                        let k = self.translate_rhs(&ix.index, key);
                        self.writeln(&format!(
                            "{}({}, {}, {});",
                            prelude::MAP_SET,
                            m,
                            k,
                            value
                        ));
                    }
                    Type::Slice { .. } => {
                        let a = self.translate_expr(&ix.x, None).wrapped();
                        let int = self.oracle.types.basic(BasicKind::Int);
                        let i = self.translate_expr(&ix.index, Some(int)).wrapped();
                        self.writeln(&format!(
                            "{}({}, {}, {});",
                            prelude::SET_INDEX_SLICE,
                            a,
                            i,
                            value
                        ));
                    }
                    Type::Array { .. } => {
                        let a = self.translate_expr(&ix.x, None).wrapped();
                        let int = self.oracle.types.basic(BasicKind::Int);
                        let i = self.translate_expr(&ix.index, Some(int)).wrapped();
                        self.writeln(&format!(
                            "{}({}, {}, {});",
                            prelude::SET_INDEX_ARRAY,
                            a,
                            i,
                            value
                        ));
                    }
                    other => panic!("gale: indexed store into {:?}", other),
                }
            }
            Expr::Selector(s) => {
                let x = self.translate_expr(&s.x, None);
                self.writeln(&format!("{}.{} = {};", x.wrapped(), s.sel.name, value));
            }
            Expr::Star(st) => {
                let p = self.translate_expr(&st.x, None);
                if matches!(self.oracle.types.underlying(ty), Type::Struct { .. }) {
                    let desc = self.type_ref(ty);
                    self.writeln(&format!(
                        "{}({}, {}, {});",
                        prelude::COPY,
                        p.wrapped(),
                        value,
                        desc
                    ));
                } else {
                    self.writeln(&format!("{}.$set({});", p.wrapped(), value));
                }
            }
            other => panic!("gale: cannot assign to {:?}", other.id()),
        }
    }

    fn translate_compound(&mut self, a: &AssignStmt, op: BinOp) {
        let lhs = &a.lhs[0];
        let ty = self.oracle.type_of(lhs.id());
        let kind = self
            .basic_kind_of(ty)
            .unwrap_or_else(|| panic!("gale: compound assignment on a non-basic type"));
        let y_ty = if matches!(op, BinOp::Shl | BinOp::Shr) {
            self.oracle.types.basic(BasicKind::Uint)
        } else {
            ty
        };
        let y = self.translate_expr(&a.rhs[0], Some(y_ty));
        self.compound_core(lhs, op, y, ty, kind);
    }

    fn translate_incdec(&mut self, s: &IncDecStmt) {
        let ty = self.oracle.type_of(s.x.id());
        let kind = self
            .basic_kind_of(ty)
            .unwrap_or_else(|| panic!("gale: ++/-- on a non-basic type"));
        let op = if s.inc { BinOp::Add } else { BinOp::Sub };
        let one = if kind.is_64bit() {
            Expression::new(format!("new {}(0, 1)", prelude::INT64))
        } else {
            Expression::new("1")
        };
        self.compound_core(&s.x, op, one, ty, kind);
    }

    /// Read-modify-write for `x op= y` and `++`/`--`. Places with
    /// subexpressions evaluate those once through temps.
    fn compound_core(
        &mut self,
        lhs: &Expr,
        op: BinOp,
        y: Expression,
        ty: TypeId,
        kind: BasicKind,
    ) {
        match lhs {
            Expr::Ident(ident) => {
                let x = self.translate_expr(lhs, Some(ty));
                let v = self.lower_arith(op, kind, x, y);
                let obj = self.oracle.object_of(ident.id);
                let name = self.object_name(obj);
                if self.is_boxed(obj) {
                    self.writeln(&format!("{}[0] = {};", name, v.text()));
                } else {
                    self.writeln(&format!("{} = {};", name, v.text()));
                }
            }
            Expr::Selector(s) => {
                let recv = self.translate_expr(&s.x, None).wrapped();
                let tmp = self.fresh_name("_r");
                self.declare_var(&tmp, &recv);
                let x = Expression::new(format!("{}.{}", tmp, s.sel.name));
                let v = self.lower_arith(op, kind, x, y);
                self.writeln(&format!("{}.{} = {};", tmp, s.sel.name, v.text()));
            }
            Expr::Index(ix) => {
                let subject_ty = self.oracle.type_of(ix.x.id());
                let subject = self.translate_expr(&ix.x, None).wrapped();
                let a = self.fresh_name("_a");
                self.declare_var(&a, &subject);
                match self.oracle.types.underlying(subject_ty).clone() {
                    Type::Map { key, value } => {
                        let kt = self.translate_rhs(&ix.index, key);
                        let k = self.fresh_name("_k");
                        self.declare_var(&k, &kt);
                        let zero = self.zero_value(value);
                        let x = Expression::new(format!(
                            "{}({}, {}, {})",
                            prelude::MAP_GET,
                            a,
                            k,
                            zero
                        ));
                        let v = self.lower_arith(op, kind, x, y);
                        self.writeln(&format!(
                            "{}({}, {}, {});",
                            prelude::MAP_SET,
                            a,
                            k,
                            v.text()
                        ));
                    }
                    Type::Slice { .. } | Type::Array { .. } => {
                        let (get, set) = if matches!(
                            self.oracle.types.underlying(subject_ty),
                            Type::Array { .. }
                        ) {
                            (prelude::INDEX_ARRAY, prelude::SET_INDEX_ARRAY)
                        } else {
                            (prelude::INDEX_SLICE, prelude::SET_INDEX_SLICE)
                        };
                        let int = self.oracle.types.basic(BasicKind::Int);
                        let it = self.translate_expr(&ix.index, Some(int)).wrapped();
                        let i = self.fresh_name("_i");
                        self.declare_var(&i, &it);
                        let x = Expression::new(format!("{}({}, {})", get, a, i));
                        let v = self.lower_arith(op, kind, x, y);
                        self.writeln(&format!("{}({}, {}, {});", set, a, i, v.text()));
                    }
                    other => panic!("gale: compound store into {:?}", other),
                }
            }
            Expr::Star(st) => {
                let pt = self.translate_expr(&st.x, None).wrapped();
                let p = self.fresh_name("_p");
                self.declare_var(&p, &pt);
                let x = Expression::new(format!("{}.$get()", p));
                let v = self.lower_arith(op, kind, x, y);
                self.writeln(&format!("{}.$set({});", p, v.text()));
            }
            other => panic!("gale: compound assignment to {:?}", other.id()),
        }
    }

    // ------------------------------------------------------------------
    // Suspension points
    // ------------------------------------------------------------------

    /// A receive parks the goroutine and resumes with `$r = [value, ok]`.
    fn recv_suspend(&mut self, chan: &Expr) -> &'static str {
        let ch = self.translate_expr(chan, None).wrapped();
        self.suspend(&format!("{}({}, $body)", prelude::RECV, ch));
        "$r"
    }

    /// A call into the blocking set parks through a thunk and resumes with
    /// the callee's return value in `$r`.
    fn call_suspend(&mut self, c: &CallExpr) -> &'static str {
        let call = self.translate_call_any(c).into_text();
        self.suspend(&format!(
            "{}(function() {{ return {}; }}, $body)",
            prelude::INVOKE,
            call
        ));
        "$r"
    }

    /// A single-valued source expression, routing the suspending forms
    /// through their statement-level protocol.
    fn value_text(&mut self, e: &Expr, ty: TypeId) -> String {
        match e {
            Expr::Unary(u) if u.op == UnOp::Recv => {
                let r = self.recv_suspend(&u.x);
                format!("{}[0]", r)
            }
            Expr::Call(c) if self.oracle.is_blocking_call(c.id) => {
                self.call_suspend(c).to_string()
            }
            _ => self.translate_rhs(e, ty),
        }
    }

    fn translate_expr_stmt(&mut self, e: &Expr) {
        match e {
            Expr::Unary(u) if u.op == UnOp::Recv => {
                self.recv_suspend(&u.x);
            }
            Expr::Call(c) if self.oracle.is_blocking_call(c.id) => {
                self.call_suspend(c);
            }
            _ => {
                let t = self.translate_expr(e, None);
                self.writeln(&format!("{};", t.text()));
            }
        }
    }

    fn translate_send(&mut self, s: &SendStmt) {
        let elem = match self.oracle.types.underlying(self.oracle.type_of(s.chan.id())) {
            Type::Chan { elem, .. } => *elem,
            other => panic!("gale: send on {:?}", other),
        };
        let ch = self.translate_expr(&s.chan, None).wrapped();
        let v = self.translate_rhs(&s.value, elem);
        self.suspend(&format!("{}({}, {}, $body)", prelude::SEND, ch, v));
    }

    // ------------------------------------------------------------------
    // Return
    // ------------------------------------------------------------------

    fn translate_return(&mut self, r: &ReturnStmt) {
        let results = self.result_types.clone();
        let passthrough = r.results.len() == 1 && results.len() > 1;

        let texts: Vec<String> = if passthrough {
            let e = &r.results[0];
            let t = match e {
                Expr::Call(c) if self.oracle.is_blocking_call(c.id) => {
                    self.call_suspend(c).to_string()
                }
                _ => self.translate_expr(e, None).wrapped(),
            };
            vec![t]
        } else {
            r.results
                .iter()
                .zip(&results)
                .map(|(e, ty)| self.value_text(e, *ty))
                .collect()
        };

        if self.deferring {
            // Results park in their storage; the protected-invocation
            // wrapper's finally clause carries them out.
            if !r.results.is_empty() {
                let names = self.result_names.clone();
                if passthrough {
                    if names.is_empty() {
                        self.writeln(&format!("$result = {};", texts[0]));
                    } else {
                        let tmp = self.fresh_name("_tuple");
                        self.declare_var(&tmp, &texts[0]);
                        for (i, name) in names.iter().enumerate() {
                            self.writeln(&format!("{} = {}[{}];", name, tmp, i));
                        }
                    }
                } else if !names.is_empty() {
                    for (name, t) in names.iter().zip(&texts) {
                        self.writeln(&format!("{} = {};", name, t));
                    }
                } else if results.len() == 1 {
                    self.writeln(&format!("$result = {};", texts[0]));
                } else {
                    self.writeln(&format!("$result = [{}];", texts.join(", ")));
                }
            }
            self.writeln("return;");
            return;
        }

        if r.results.is_empty() {
            if !self.result_names.is_empty() {
                let v = self.named_result_value();
                self.writeln(&format!("return {};", v));
            } else {
                self.writeln("return;");
            }
        } else if passthrough || results.len() == 1 {
            self.writeln(&format!("return {};", texts[0]));
        } else {
            self.writeln(&format!("return [{}];", texts.join(", ")));
        }
    }

    // ------------------------------------------------------------------
    // Branches and labels
    // ------------------------------------------------------------------

    fn translate_branch(&mut self, b: &BranchStmt) {
        match b.kind {
            BranchKind::Break => self.emit_break(b.label.as_deref()),
            BranchKind::Continue => self.emit_continue(b.label.as_deref()),
            BranchKind::Goto => {
                let label = b
                    .label
                    .as_deref()
                    .unwrap_or_else(|| panic!("gale: goto without a label"));
                let n = self.label_case(label);
                self.goto_case(n);
            }
            BranchKind::Fallthrough => {
                panic!("gale: fallthrough outside a switch clause tail")
            }
        }
    }

    fn emit_break(&mut self, label: Option<&str>) {
        match self.break_frame(label).clone() {
            FlowFrame::Direct { js_label, .. } => self.writeln(&format!("break {};", js_label)),
            FlowFrame::Flat { break_case, .. } => self.goto_case(break_case),
        }
    }

    fn emit_continue(&mut self, label: Option<&str>) {
        match self.continue_frame(label).clone() {
            FlowFrame::Direct { js_label, cont_label, .. } => match cont_label {
                // The inner block label lets the post statement run.
                Some(cl) => self.writeln(&format!("break {};", cl)),
                None => self.writeln(&format!("continue {};", js_label)),
            },
            FlowFrame::Flat { continue_case, .. } => {
                let n = continue_case
                    .unwrap_or_else(|| panic!("gale: continue target without a loop case"));
                self.goto_case(n);
            }
        }
    }

    fn translate_labeled(&mut self, l: &LabeledStmt) {
        let in_direct_region = self
            .flow
            .iter()
            .any(|f| matches!(f, FlowFrame::Direct { .. }));
        if self.flattened && !in_direct_region {
            // goto may target this label from either direction.
            let n = self.label_case(&l.label);
            self.write_case(n);
        }
        match &*l.stmt {
            Stmt::For(s) => self.translate_for(s, Some(&l.label)),
            Stmt::Range(s) => self.translate_range(s, Some(&l.label)),
            Stmt::Switch(s) => self.translate_switch(s, Some(&l.label)),
            Stmt::TypeSwitch(s) => self.translate_type_switch(s, Some(&l.label)),
            Stmt::Select(s) => self.translate_select(s, Some(&l.label)),
            other => self.translate_stmt(other),
        }
    }

    // ------------------------------------------------------------------
    // If
    // ------------------------------------------------------------------

    fn translate_if(&mut self, s: &IfStmt) {
        if let Some(init) = &s.init {
            self.translate_stmt(init);
        }
        let bool_ty = self.oracle.types.basic(BasicKind::Bool);
        let flat = self.flattened
            && (analysis::expr_suspends(&s.cond, self.oracle)
                || analysis::must_flatten(&s.then, self.oracle)
                || s.els
                    .as_deref()
                    .is_some_and(|e| analysis::stmt_suspends(e, self.oracle)));

        if !flat {
            let c = self.translate_expr(&s.cond, Some(bool_ty)).text().to_string();
            self.writeln(&format!("if ({}) {{", c));
            self.indented(|cx| cx.translate_block_stmts(&s.then));
            match &s.els {
                None => self.writeln("}"),
                Some(e) => {
                    self.writeln("} else {");
                    self.indent += 1;
                    match &**e {
                        Stmt::Block(b) => self.translate_block_stmts(b),
                        other => self.translate_stmt(other),
                    }
                    self.indent -= 1;
                    self.writeln("}");
                }
            }
            return;
        }

        let c = self.value_text(&s.cond, bool_ty);
        let end = self.new_case();
        match &s.els {
            None => {
                self.writeln(&format!("if (!({})) {{ $s = {}; continue s; }}", c, end));
                self.translate_block_stmts(&s.then);
            }
            Some(e) => {
                let else_case = self.new_case();
                self.writeln(&format!(
                    "if (!({})) {{ $s = {}; continue s; }}",
                    c, else_case
                ));
                self.translate_block_stmts(&s.then);
                self.goto_case(end);
                self.write_case(else_case);
                match &**e {
                    Stmt::Block(b) => self.translate_block_stmts(b),
                    other => self.translate_stmt(other),
                }
            }
        }
        self.write_case(end);
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    /// Shared loop scaffold. Direct mode emits a labeled `while (true)`
    /// with the condition check at the top and, when a post part exists,
    /// an inner labeled block so `continue` still runs it. Flat mode
    /// allocates condition/post/end cases in the dispatch loop. The
    /// condition callback returns an empty string for an unconditional
    /// loop; in flat mode it may itself emit a suspension first.
    fn emit_loop(
        &mut self,
        label: Option<&str>,
        flat: bool,
        cond: &mut dyn FnMut(&mut Self) -> String,
        body: &mut dyn FnMut(&mut Self),
        post: Option<&mut dyn FnMut(&mut Self)>,
    ) {
        if flat {
            let cond_case = self.new_case();
            let end = self.new_case();
            let post_case = post.as_ref().map(|_| self.new_case());
            self.push_flow(FlowFrame::Flat {
                label: label.map(String::from),
                break_case: end,
                continue_case: Some(post_case.unwrap_or(cond_case)),
                is_loop: true,
            });
            self.write_case(cond_case);
            let c = cond(self);
            if !c.is_empty() {
                self.writeln(&format!("if (!({})) {{ $s = {}; continue s; }}", c, end));
            }
            body(self);
            if let Some(p) = post {
                self.write_case(post_case.unwrap());
                p(self);
            }
            self.goto_case(cond_case);
            self.write_case(end);
            self.pop_flow();
        } else {
            let js_label = self.fresh_js_label();
            let cont_label = post.as_ref().map(|_| self.fresh_js_label());
            self.push_flow(FlowFrame::Direct {
                label: label.map(String::from),
                js_label: js_label.clone(),
                cont_label: cont_label.clone(),
                is_loop: true,
            });
            self.writeln(&format!("{}: while (true) {{", js_label));
            self.indent += 1;
            let c = cond(self);
            if !c.is_empty() {
                self.writeln(&format!("if (!({})) {{ break {}; }}", c, js_label));
            }
            match (cont_label, post) {
                (Some(cl), Some(p)) => {
                    self.writeln(&format!("{}: {{", cl));
                    self.indent += 1;
                    body(self);
                    self.indent -= 1;
                    self.writeln("}");
                    p(self);
                }
                _ => body(self),
            }
            self.indent -= 1;
            self.writeln("}");
            self.pop_flow();
        }
    }

    fn translate_for(&mut self, s: &ForStmt, label: Option<&str>) {
        if let Some(init) = &s.init {
            self.translate_stmt(init);
        }
        let flat = self.flattened
            && (s.cond.as_ref().is_some_and(|c| analysis::expr_suspends(c, self.oracle))
                || s.post
                    .as_deref()
                    .is_some_and(|p| analysis::stmt_suspends(p, self.oracle))
                || analysis::must_flatten(&s.body, self.oracle));
        let bool_ty = self.oracle.types.basic(BasicKind::Bool);

        let mut cond = |cx: &mut Self| match &s.cond {
            Some(c) => cx.value_text(c, bool_ty),
            None => String::new(),
        };
        let mut body = |cx: &mut Self| cx.translate_block_stmts(&s.body);
        match &s.post {
            Some(p) => {
                let p: &Stmt = p;
                let mut post = |cx: &mut Self| cx.translate_stmt(p);
                self.emit_loop(label, flat, &mut cond, &mut body, Some(&mut post));
            }
            None => self.emit_loop(label, flat, &mut cond, &mut body, None),
        }
    }

    fn bind_range_var(&mut self, ident: &Ident, define: bool, value: &str) {
        if ident.is_blank() {
            return;
        }
        if define {
            self.declare_local(ident, value);
            return;
        }
        let obj = self.oracle.object_of(ident.id);
        let name = self.object_name(obj);
        if self.is_boxed(obj) {
            self.writeln(&format!("{}[0] = {};", name, value));
        } else {
            self.writeln(&format!("{} = {};", name, value));
        }
    }

    fn translate_range(&mut self, s: &RangeStmt, label: Option<&str>) {
        let subject_ty = self.oracle.type_of(s.subject.id());
        let u = self.oracle.types.underlying(subject_ty).clone();
        let flat = self.flattened
            && (analysis::expr_suspends(&s.subject, self.oracle)
                || analysis::must_flatten(&s.body, self.oracle));

        match u {
            Type::Array { elem, len } => {
                self.range_indexed(s, label, flat, elem, Some(len))
            }
            Type::Slice { elem } => self.range_indexed(s, label, flat, elem, None),
            Type::Basic(k) if k.is_string() => self.range_string(s, label, flat),
            Type::Basic(k) if k.is_integer() => {
                if k.is_64bit() {
                    panic!("gale: range over a 64-bit integer");
                }
                self.range_int(s, label, flat)
            }
            Type::Map { .. } => self.range_map(s, label, flat),
            Type::Chan { .. } => self.range_chan(s, label),
            other => panic!("gale: range over {:?}", other),
        }
    }

    fn range_indexed(
        &mut self,
        s: &RangeStmt,
        label: Option<&str>,
        flat: bool,
        elem: TypeId,
        array_len: Option<u64>,
    ) {
        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);
        let i = self.fresh_name("_i");
        self.declare_var(&i, "0");
        let len = match array_len {
            Some(n) => n.to_string(),
            None => format!("{}.$length", subj),
        };
        let getter = if array_len.is_some() {
            prelude::INDEX_ARRAY
        } else {
            prelude::INDEX_SLICE
        };
        let elem_desc = if self.oracle.types.is_value_composite(elem) {
            Some(self.type_ref(elem))
        } else {
            None
        };

        let mut cond = |_: &mut Self| format!("{} < {}", i, len);
        let mut body = |cx: &mut Self| {
            if let Some(key) = &s.key {
                cx.bind_range_var(key, s.define, &i);
            }
            if let Some(value) = &s.value {
                if !value.is_blank() {
                    let read = format!("{}({}, {})", getter, subj, i);
                    let read = match &elem_desc {
                        Some(desc) => format!("{}({}, {})", prelude::CLONE, read, desc),
                        None => read,
                    };
                    cx.bind_range_var(value, s.define, &read);
                }
            }
            cx.translate_block_stmts(&s.body);
        };
        let step = format!("{} = {} + 1 >> 0;", i, i);
        let mut post = |cx: &mut Self| cx.writeln(&step);
        self.emit_loop(label, flat, &mut cond, &mut body, Some(&mut post));
    }

    fn range_string(&mut self, s: &RangeStmt, label: Option<&str>, flat: bool) {
        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);
        let i = self.fresh_name("_i");
        self.declare_var(&i, "0");
        let rune = self.fresh_name("_rune");
        // The decode result is read by the post part, so its slot must
        // exist in both modes.
        if self.flattened {
            self.hoisted.push(rune.clone());
        } else {
            self.writeln(&format!("var {};", rune));
        }

        let mut cond = |_: &mut Self| format!("{} < {}.length", i, subj);
        let mut body = |cx: &mut Self| {
            cx.writeln(&format!(
                "{} = {}({}, {});",
                rune,
                prelude::DECODE_RUNE,
                subj,
                i
            ));
            if let Some(key) = &s.key {
                cx.bind_range_var(key, s.define, &i);
            }
            if let Some(value) = &s.value {
                cx.bind_range_var(value, s.define, &format!("{}[0]", rune));
            }
            cx.translate_block_stmts(&s.body);
        };
        let step = format!("{} = {} + {}[1] >> 0;", i, i, rune);
        let mut post = |cx: &mut Self| cx.writeln(&step);
        self.emit_loop(label, flat, &mut cond, &mut body, Some(&mut post));
    }

    fn range_map(&mut self, s: &RangeStmt, label: Option<&str>, flat: bool) {
        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);
        // Snapshot of the entries; mutation during the walk follows the
        // snapshot, not the live map.
        let entries = self.fresh_name("_entries");
        self.declare_var(&entries, &format!("{}({})", prelude::MAP_RANGE, subj));
        let i = self.fresh_name("_i");
        self.declare_var(&i, "0");

        let mut cond = |_: &mut Self| format!("{} < {}.length", i, entries);
        let mut body = |cx: &mut Self| {
            let entry = format!("{}[{}]", entries, i);
            if let Some(key) = &s.key {
                cx.bind_range_var(key, s.define, &format!("{}[0]", entry));
            }
            if let Some(value) = &s.value {
                cx.bind_range_var(value, s.define, &format!("{}[1]", entry));
            }
            cx.translate_block_stmts(&s.body);
        };
        let step = format!("{} = {} + 1 >> 0;", i, i);
        let mut post = |cx: &mut Self| cx.writeln(&step);
        self.emit_loop(label, flat, &mut cond, &mut body, Some(&mut post));
    }

    fn range_int(&mut self, s: &RangeStmt, label: Option<&str>, flat: bool) {
        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);
        let i = self.fresh_name("_i");
        self.declare_var(&i, "0");

        let mut cond = |_: &mut Self| format!("{} < {}", i, subj);
        let mut body = |cx: &mut Self| {
            if let Some(key) = &s.key {
                cx.bind_range_var(key, s.define, &i);
            }
            cx.translate_block_stmts(&s.body);
        };
        let step = format!("{} = {} + 1 >> 0;", i, i);
        let mut post = |cx: &mut Self| cx.writeln(&step);
        self.emit_loop(label, flat, &mut cond, &mut body, Some(&mut post));
    }

    /// Ranging over a channel receives once per iteration and exits when
    /// the channel is drained and closed; always a flat loop.
    fn range_chan(&mut self, s: &RangeStmt, label: Option<&str>) {
        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);

        let recv = format!("{}({}, $body)", prelude::RECV, subj);
        let mut cond = |cx: &mut Self| {
            cx.suspend(&recv);
            "$r[1]".to_string()
        };
        let mut body = |cx: &mut Self| {
            if let Some(key) = &s.key {
                cx.bind_range_var(key, s.define, "$r[0]");
            }
            cx.translate_block_stmts(&s.body);
        };
        self.emit_loop(label, true, &mut cond, &mut body, None);
    }

    // ------------------------------------------------------------------
    // Switches
    // ------------------------------------------------------------------

    fn equality_text(&mut self, ty: TypeId, lhs: &str, rhs_expr: &Expr) -> String {
        if self.oracle.types.is_interface(ty) {
            let rhs = self.translate_rhs(rhs_expr, ty);
            return format!("{}({}, {})", prelude::IFACE_IS_EQUAL, lhs, rhs);
        }
        let rhs = self.translate_expr(rhs_expr, Some(ty)).wrapped();
        if self.oracle.types.is_value_composite(ty) {
            let desc = self.type_ref(ty);
            return format!("{}({}, {}, {})", prelude::EQUAL, lhs, rhs, desc);
        }
        match self.basic_kind_of(ty) {
            Some(k) if k.is_64bit() => format!("{}({}, {})", prelude::EQUAL64, lhs, rhs),
            _ => format!("{} === {}", lhs, rhs),
        }
    }

    /// Shared clause scaffold for expression and type switches. The
    /// condition callback is never invoked for the default clause.
    fn emit_switch_clauses(
        &mut self,
        label: Option<&str>,
        flat: bool,
        falls: &[bool],
        default_idx: Option<usize>,
        cond: &mut dyn FnMut(&mut Self, usize) -> String,
        body: &mut dyn FnMut(&mut Self, usize),
    ) {
        let n = falls.len();
        if flat {
            let end = self.new_case();
            let body_cases: Vec<u32> = (0..n).map(|_| self.new_case()).collect();
            self.push_flow(FlowFrame::Flat {
                label: label.map(String::from),
                break_case: end,
                continue_case: None,
                is_loop: false,
            });
            for i in 0..n {
                if Some(i) == default_idx {
                    continue;
                }
                let c = cond(self, i);
                self.writeln(&format!(
                    "if ({}) {{ $s = {}; continue s; }}",
                    c, body_cases[i]
                ));
            }
            self.goto_case(default_idx.map(|i| body_cases[i]).unwrap_or(end));
            for i in 0..n {
                self.write_case(body_cases[i]);
                body(self, i);
                if falls[i] {
                    self.goto_case(body_cases[i + 1]);
                } else {
                    self.goto_case(end);
                }
            }
            self.write_case(end);
            self.pop_flow();
            return;
        }

        let js_label = self.fresh_js_label();
        self.push_flow(FlowFrame::Direct {
            label: label.map(String::from),
            js_label: js_label.clone(),
            cont_label: None,
            is_loop: false,
        });
        self.writeln(&format!("{}: {{", js_label));
        self.indent += 1;

        if falls.iter().any(|f| *f) {
            // Fallthrough turns clause selection into a sticky match flag.
            let matched = self.fresh_name("_match");
            self.declare_var(&matched, "false");
            for i in 0..n {
                if Some(i) == default_idx {
                    continue;
                }
                let c = cond(self, i);
                self.writeln(&format!("if ({} || ({})) {{", matched, c));
                self.indent += 1;
                body(self, i);
                if falls[i] {
                    self.writeln(&format!("{} = true;", matched));
                } else {
                    self.writeln(&format!("break {};", js_label));
                }
                self.indent -= 1;
                self.writeln("}");
            }
            if let Some(d) = default_idx {
                body(self, d);
            }
        } else {
            let mut first = true;
            for i in 0..n {
                if Some(i) == default_idx {
                    continue;
                }
                let c = cond(self, i);
                if first {
                    self.writeln(&format!("if ({}) {{", c));
                } else {
                    self.writeln(&format!("}} else if ({}) {{", c));
                }
                first = false;
                self.indent += 1;
                body(self, i);
                self.indent -= 1;
            }
            match default_idx {
                Some(d) if first => body(self, d),
                Some(d) => {
                    self.writeln("} else {");
                    self.indent += 1;
                    body(self, d);
                    self.indent -= 1;
                    self.writeln("}");
                }
                None if !first => self.writeln("}"),
                None => {}
            }
        }

        self.indent -= 1;
        self.writeln("}");
        self.pop_flow();
    }

    fn translate_switch(&mut self, s: &SwitchStmt, label: Option<&str>) {
        if let Some(init) = &s.init {
            self.translate_stmt(init);
        }
        let flat = self.flattened
            && (s.tag.as_ref().is_some_and(|t| analysis::expr_suspends(t, self.oracle))
                || s.cases.iter().any(|c| {
                    c.exprs.iter().any(|e| analysis::expr_suspends(e, self.oracle))
                        || c.body.iter().any(|st| analysis::stmt_suspends(st, self.oracle))
                }));

        // The tag evaluates exactly once.
        let tag: Option<(String, TypeId)> = s.tag.as_ref().map(|t| {
            let ty = self.oracle.type_of(t.id());
            let text = self.value_text(t, ty);
            let tmp = self.fresh_name("_tag");
            self.declare_var(&tmp, &text);
            (tmp, ty)
        });
        let bool_ty = self.oracle.types.basic(BasicKind::Bool);
        let falls: Vec<bool> = s.cases.iter().map(|c| c.falls_through()).collect();
        let default_idx = s.cases.iter().position(|c| c.is_default());

        let mut cond = |cx: &mut Self, i: usize| {
            s.cases[i]
                .exprs
                .iter()
                .map(|e| match &tag {
                    Some((tmp, ty)) => cx.equality_text(*ty, tmp, e),
                    None => cx.translate_expr(e, Some(bool_ty)).wrapped(),
                })
                .collect::<Vec<_>>()
                .join(" || ")
        };
        let mut body = |cx: &mut Self, i: usize| {
            for st in clause_stmts(&s.cases[i]) {
                cx.translate_stmt(st);
            }
        };
        self.emit_switch_clauses(label, flat, &falls, default_idx, &mut cond, &mut body);
    }

    fn translate_type_switch(&mut self, s: &TypeSwitchStmt, label: Option<&str>) {
        if let Some(init) = &s.init {
            self.translate_stmt(init);
        }
        let flat = self.flattened
            && (analysis::expr_suspends(&s.subject, self.oracle)
                || s.cases
                    .iter()
                    .any(|c| c.body.iter().any(|st| analysis::stmt_suspends(st, self.oracle))));

        let x = self.translate_expr(&s.subject, None).wrapped();
        let subj = self.fresh_name("_ref");
        self.declare_var(&subj, &x);
        let bind_name: Option<String> = s
            .binding
            .as_ref()
            .filter(|b| !b.is_blank())
            .map(|b| match self.oracle.try_object_of(b.id) {
                Some(obj) => self.object_name(obj),
                None => self.fresh_name(&b.name),
            });
        if let Some(name) = &bind_name {
            self.declare_var(name, &subj);
        }

        let falls = vec![false; s.cases.len()];
        let default_idx = s.cases.iter().position(|c| c.is_default());

        let mut cond = |cx: &mut Self, i: usize| {
            s.cases[i]
                .types
                .iter()
                .map(|t| match t {
                    Some(texpr) => {
                        let ty = cx.oracle.type_of(texpr.id());
                        let desc = cx.type_ref(ty);
                        format!("{}({}, {})", prelude::TYPE_IS, subj, desc)
                    }
                    None => format!(
                        "{}({}, {})",
                        prelude::IFACE_IS_EQUAL,
                        subj,
                        prelude::IFACE_NIL
                    ),
                })
                .collect::<Vec<_>>()
                .join(" || ")
        };
        let mut body = |cx: &mut Self, i: usize| {
            let case = &s.cases[i];
            if let Some(name) = &bind_name {
                // A single concrete case type narrows the binding; every
                // other shape keeps the interface value.
                if case.types.len() == 1 {
                    if let Some(texpr) = &case.types[0] {
                        let ty = cx.oracle.type_of(texpr.id());
                        if !cx.oracle.types.is_interface(ty) {
                            let desc = cx.type_ref(ty);
                            cx.writeln(&format!(
                                "{} = {}({}, {});",
                                name,
                                prelude::ASSERT_TYPE,
                                subj,
                                desc
                            ));
                        } else {
                            cx.writeln(&format!("{} = {};", name, subj));
                        }
                    } else {
                        cx.writeln(&format!("{} = {};", name, subj));
                    }
                } else if !case.types.is_empty() {
                    cx.writeln(&format!("{} = {};", name, subj));
                }
            }
            for st in &case.body {
                cx.translate_stmt(st);
            }
        };
        self.emit_switch_clauses(label, flat, &falls, default_idx, &mut cond, &mut body);
    }

    // ------------------------------------------------------------------
    // Select
    // ------------------------------------------------------------------

    /// `select` parks on the whole clause set at once and resumes with
    /// `$r = [index, value, ok]`; the dispatch region binds any receive
    /// targets before jumping to the chosen clause body.
    fn translate_select(&mut self, s: &SelectStmt, label: Option<&str>) {
        let mut entries = Vec::with_capacity(s.cases.len());
        for case in &s.cases {
            match &case.comm {
                None => entries.push("[]".to_string()),
                Some(CommOp::Send { chan, value }) => {
                    let elem = match self
                        .oracle
                        .types
                        .underlying(self.oracle.type_of(chan.id()))
                    {
                        Type::Chan { elem, .. } => *elem,
                        other => panic!("gale: select send on {:?}", other),
                    };
                    let ch = self.translate_expr(chan, None).wrapped();
                    let v = self.translate_rhs(value, elem);
                    entries.push(format!("[{}, {}, {}]", ch, prelude::OP_SEND, v));
                }
                Some(CommOp::Recv { chan, .. }) => {
                    let ch = self.translate_expr(chan, None).wrapped();
                    entries.push(format!("[{}, {}]", ch, prelude::OP_RECV));
                }
            }
        }
        let r = "$r";
        self.suspend(&format!(
            "{}([{}], $body)",
            prelude::SELECT,
            entries.join(", ")
        ));

        let end = self.new_case();
        let body_cases: Vec<u32> = s.cases.iter().map(|_| self.new_case()).collect();
        self.push_flow(FlowFrame::Flat {
            label: label.map(String::from),
            break_case: end,
            continue_case: None,
            is_loop: false,
        });

        for (i, case) in s.cases.iter().enumerate() {
            self.writeln(&format!("if ({}[0] === {}) {{", r, i));
            self.indent += 1;
            if let Some(CommOp::Recv { lhs, define, .. }) = &case.comm {
                for (slot, l) in lhs.iter().enumerate() {
                    if let Expr::Ident(ident) = l {
                        if ident.is_blank() {
                            continue;
                        }
                    }
                    let component = format!("{}[{}]", r, slot + 1);
                    if *define {
                        self.declare_local(lhs_ident(l), &component);
                    } else {
                        let ty = self.oracle.type_of(l.id());
                        self.assign_place(l, &component, ty);
                    }
                }
            }
            self.goto_case(body_cases[i]);
            self.indent -= 1;
            self.writeln("}");
        }

        for (i, case) in s.cases.iter().enumerate() {
            self.write_case(body_cases[i]);
            for st in &case.body {
                self.translate_stmt(st);
            }
            self.goto_case(end);
        }
        self.write_case(end);
        self.pop_flow();
    }

    // ------------------------------------------------------------------
    // go / defer
    // ------------------------------------------------------------------

    fn spawn_parts(&mut self, c: &CallExpr) -> (String, Vec<String>) {
        if let Expr::Ident(ident) = c.fun.as_ref() {
            if let Some(obj) = self.oracle.try_object_of(ident.id) {
                if matches!(self.oracle.object(obj).kind, ObjectKind::Builtin(_)) {
                    panic!("gale: cannot spawn builtin {}", ident.name);
                }
            }
        }
        let (params, variadic) = match self
            .oracle
            .types
            .underlying(self.oracle.type_of(c.fun.id()))
            .clone()
        {
            Type::Signature { params, variadic, .. } => (params, variadic),
            other => panic!("gale: spawn of non-function type {:?}", other),
        };
        let fun = self.translate_expr(&c.fun, None).wrapped();
        let args = self.call_args(&c.args, &params, variadic, c.spread);
        (fun, args)
    }

    fn translate_go(&mut self, c: &CallExpr) {
        let (fun, args) = self.spawn_parts(c);
        self.writeln(&format!(
            "{}({}, [{}]); {}();",
            prelude::GO,
            fun,
            args.join(", "),
            prelude::SCHEDULE
        ));
    }

    /// `defer` captures the callee and its arguments now and runs the
    /// call from the function's protected-invocation wrapper.
    fn translate_defer(&mut self, c: &CallExpr) {
        if let Expr::Ident(ident) = c.fun.as_ref() {
            if let Some(obj) = self.oracle.try_object_of(ident.id) {
                if let ObjectKind::Builtin(builtin) = self.oracle.object(obj).kind {
                    self.defer_builtin(builtin, c);
                    return;
                }
            }
        }
        let (fun, args) = self.spawn_parts(c);
        let formals: Vec<String> = (0..args.len()).map(|i| format!("$a{}", i)).collect();
        let mut outer = vec!["$f".to_string()];
        outer.extend(formals.iter().cloned());
        let mut actuals = vec![fun];
        actuals.extend(args);
        self.writeln(&format!(
            "$deferred.push((function({}) {{ return function() {{ $f({}); }}; }})({}));",
            outer.join(", "),
            formals.join(", "),
            actuals.join(", ")
        ));
    }

    fn defer_builtin(&mut self, builtin: Builtin, c: &CallExpr) {
        match builtin {
            Builtin::Close => {
                let ch = self.translate_expr(&c.args[0], None).wrapped();
                self.writeln(&format!(
                    "$deferred.push((function($c) {{ return function() {{ {}($c); }}; }})({}));",
                    prelude::CLOSE,
                    ch
                ));
            }
            Builtin::Panic => {
                let arg = &c.args[0];
                let v = match self.oracle.try_type_of(arg.id()) {
                    Some(src)
                        if !self.oracle.types.is_interface(src)
                            && !matches!(
                                self.oracle.types.get(src),
                                Type::Basic(BasicKind::UntypedNil)
                            ) =>
                    {
                        let desc = self.type_ref(src);
                        let x = self.translate_expr(arg, Some(src)).wrapped();
                        format!("{}({}, {})", prelude::IFACE, desc, x)
                    }
                    _ => self.translate_expr(arg, None).wrapped(),
                };
                self.writeln(&format!(
                    "$deferred.push((function($v) {{ return function() {{ {}($v); }}; }})({}));",
                    prelude::PANIC,
                    v
                ));
            }
            other => panic!("gale: cannot defer builtin {:?}", other),
        }
    }
}
