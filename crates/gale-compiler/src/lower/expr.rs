//! Expression lowering
//!
//! Every arithmetic result is immediately coerced back into its type's
//! width and signedness (`<< 24 >> 24`, `>>> 0`, `$fround`, ...); 64-bit
//! integers are `$Int64` pairs manipulated through prelude calls; integer
//! division always goes through the `$idiv`/`$imod` zero guards. Struct and
//! array values copy on every assignment-like edge (`$clone`), compare with
//! `$equal`, and a constant-foldable expression emits its evaluated literal
//! rather than the operator tree.

use super::{Expression, FuncContext};
use crate::analysis;
use crate::decls::DepKey;
use crate::prelude;
use gale_ast::{
    BinOp, BinaryExpr, CallExpr, CompositeLit, Expr, IndexExpr, SelectorExpr, SliceExpr,
    TypeAssertExpr, UnOp, UnaryExpr,
};
use gale_types::{BasicKind, Builtin, ConstValue, ObjectKind, SelectionKind, Type, TypeId};

/// A composite-literal or call result is a fresh value; cloning it again
/// would only copy a value nobody else holds.
fn is_fresh_value(expr: &Expr) -> bool {
    matches!(expr, Expr::Composite(_) | Expr::Call(_))
}

/// JavaScript string literal with control and non-ASCII escapes.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                for unit in c.encode_utf16(&mut [0u16; 2]) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl<'a> FuncContext<'a> {
    pub(super) fn basic_kind_of(&self, ty: TypeId) -> Option<BasicKind> {
        self.oracle.types.underlying(ty).basic()
    }

    /// Coerce a raw arithmetic result back into the width and signedness
    /// of its kind. This is what keeps `uint8(200) + uint8(100)` at 44.
    fn fix_number(&self, text: String, kind: BasicKind) -> Expression {
        match kind {
            BasicKind::Int8 => Expression::parenthesized(format!("({}) << 24 >> 24", text)),
            BasicKind::Int16 => Expression::parenthesized(format!("({}) << 16 >> 16", text)),
            BasicKind::Int | BasicKind::Int32 | BasicKind::UntypedInt | BasicKind::UntypedRune => {
                Expression::parenthesized(format!("({}) >> 0", text))
            }
            BasicKind::Uint8 => Expression::parenthesized(format!("({}) << 24 >>> 24", text)),
            BasicKind::Uint16 => Expression::parenthesized(format!("({}) << 16 >>> 16", text)),
            BasicKind::Uint | BasicKind::Uint32 | BasicKind::Uintptr => {
                Expression::parenthesized(format!("({}) >>> 0", text))
            }
            BasicKind::Float32 => {
                Expression::new(format!("{}({})", prelude::FROUND, text))
            }
            _ => Expression::parenthesized(text),
        }
    }

    /// Zero value of a type, per the target representation table.
    pub fn zero_value(&mut self, ty: TypeId) -> String {
        let u = self.oracle.types.underlying(ty).clone();
        match u {
            Type::Basic(kind) => match kind {
                k if k.is_64bit() => format!("new {}(0, 0)", prelude::INT64),
                k if k.is_numeric() => "0".to_string(),
                k if k.is_boolean() => "false".to_string(),
                k if k.is_string() => "\"\"".to_string(),
                _ => "null".to_string(),
            },
            Type::Slice { .. } => prelude::NIL_SLICE.to_string(),
            Type::Interface { .. } => prelude::IFACE_NIL.to_string(),
            Type::Map { .. } | Type::Chan { .. } | Type::Pointer { .. }
            | Type::Signature { .. } => "null".to_string(),
            Type::Array { .. } | Type::Struct { .. } => {
                let desc = self.type_ref(ty);
                format!("{}({})", prelude::ZERO, desc)
            }
            Type::Named { .. } | Type::Tuple(_) => {
                panic!("gale: no zero value form for {:?}", u)
            }
        }
    }

    /// The typed `nil` for a use site.
    fn nil_value(&mut self, desired: Option<TypeId>) -> Expression {
        let Some(ty) = desired else {
            return Expression::new("null");
        };
        match self.oracle.types.underlying(ty) {
            Type::Slice { .. } => Expression::new(prelude::NIL_SLICE),
            Type::Interface { .. } => Expression::new(prelude::IFACE_NIL),
            _ => Expression::new("null"),
        }
    }

    /// Format an evaluated constant at the desired type.
    fn format_const(&mut self, value: &ConstValue, ty: Option<TypeId>) -> Expression {
        let kind = ty.and_then(|t| self.basic_kind_of(t)).unwrap_or(match value {
            ConstValue::Int(_) => BasicKind::Int,
            ConstValue::Float(_) => BasicKind::Float64,
            ConstValue::Str(_) => BasicKind::String,
            ConstValue::Bool(_) => BasicKind::Bool,
        });
        match value {
            ConstValue::Bool(b) => Expression::new(if *b { "true" } else { "false" }),
            ConstValue::Str(s) => Expression::new(quote_string(s)),
            ConstValue::Int(v) if kind.is_64bit() => {
                let bits = ConstValue::truncate_int(*v, kind) as u64;
                let high = (bits >> 32) as u32;
                let high = if kind == BasicKind::Int64 { high as i32 as i64 } else { high as i64 };
                let low = bits as u32;
                Expression::new(format!("new {}({}, {})", prelude::INT64, high, low))
            }
            ConstValue::Int(v) if kind.is_float() => {
                let text = (*v as f64).to_string();
                self.format_float(*v as f64, kind == BasicKind::Float32, text)
            }
            ConstValue::Int(v) => {
                let t = ConstValue::truncate_int(*v, kind);
                if t < 0 {
                    Expression::parenthesized(t.to_string())
                } else {
                    Expression::new(t.to_string())
                }
            }
            ConstValue::Float(f) if kind.is_integer() => {
                let t = ConstValue::truncate_int(*f as i128, kind);
                if kind.is_64bit() {
                    let bits = t as u64;
                    Expression::new(format!(
                        "new {}({}, {})",
                        prelude::INT64,
                        (bits >> 32) as i32,
                        bits as u32
                    ))
                } else if t < 0 {
                    Expression::parenthesized(t.to_string())
                } else {
                    Expression::new(t.to_string())
                }
            }
            ConstValue::Float(f) => {
                let text = f.to_string();
                self.format_float(*f, kind == BasicKind::Float32, text)
            }
        }
    }

    fn format_float(&self, f: f64, fround: bool, text: String) -> Expression {
        if fround {
            Expression::new(format!("{}({})", prelude::FROUND, text))
        } else if f < 0.0 {
            Expression::parenthesized(text)
        } else {
            Expression::new(text)
        }
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Lower an expression. `desired` is the type the surrounding context
    /// expects; it decides the formatting of untyped constants and `nil`.
    pub fn translate_expr(&mut self, expr: &Expr, desired: Option<TypeId>) -> Expression {
        if !matches!(expr, Expr::FuncLit(_)) {
            if let Some(value) = self.oracle.const_of(expr.id()).cloned() {
                let ty = desired.or_else(|| self.oracle.try_type_of(expr.id()));
                return self.format_const(&value, ty);
            }
        }
        if let Some(ty) = self.oracle.try_type_of(expr.id()) {
            if matches!(self.oracle.types.get(ty), Type::Basic(BasicKind::UntypedNil)) {
                return self.nil_value(desired);
            }
        }

        match expr {
            Expr::Ident(ident) => {
                let obj = self.oracle.object_of(ident.id);
                match &self.oracle.object(obj).kind {
                    ObjectKind::Builtin(_) => {
                        panic!("gale: builtin {} used as a value", ident.name)
                    }
                    ObjectKind::PkgName { .. } => {
                        panic!("gale: package name {} used as a value", ident.name)
                    }
                    _ => {
                        let name = self.object_name(obj);
                        if self.is_boxed(obj) {
                            Expression::new(format!("{}[0]", name))
                        } else {
                            Expression::new(name)
                        }
                    }
                }
            }
            Expr::Lit(lit) => {
                // The checker folds every literal; reaching here means the
                // Oracle tables are incomplete.
                panic!("gale: literal {:?} without a constant value", lit.raw)
            }
            Expr::Composite(lit) => self.translate_composite(lit, desired),
            Expr::FuncLit(lit) => {
                let results = match self.oracle.types.underlying(self.oracle.type_of(lit.id)) {
                    Type::Signature { results, .. } => results.clone(),
                    other => panic!("gale: function literal typed {:?}", other),
                };
                let mut child = self.nested();
                child.flattened = analysis::must_flatten(&lit.body, child.oracle);
                child.deferring = analysis::has_defer(&lit.body);
                let text =
                    child.emit_function(None, &lit.params, &lit.named_results, &results, &lit.body);
                let deps = std::mem::take(&mut child.deps);
                drop(child);
                self.deps.extend(deps);
                Expression::parenthesized(text)
            }
            Expr::Unary(u) => self.translate_unary(u),
            Expr::Binary(b) => self.translate_binary(b, desired),
            Expr::Call(c) => self.translate_call(c),
            Expr::Index(ix) => self.translate_index(ix),
            Expr::Slice(sl) => self.translate_slice(sl),
            Expr::Selector(s) => self.translate_selector(s),
            Expr::Star(st) => {
                let ty = self.oracle.type_of(expr.id());
                let x = self.translate_expr(&st.x, None);
                if self.oracle.types.is_value_composite(ty)
                    && matches!(self.oracle.types.underlying(ty), Type::Struct { .. })
                {
                    // Pointer-to-struct is the struct object itself.
                    x
                } else {
                    Expression::new(format!("{}.$get()", x.wrapped()))
                }
            }
            Expr::TypeAssert(ta) => self.translate_type_assert(ta),
            Expr::TypeRef(t) => {
                let ty = self.oracle.type_of(t.id);
                let name = self.type_ref(ty);
                Expression::new(name)
            }
        }
    }

    /// Lower the source of an assignment-like edge (assignment, argument,
    /// element, return value): interface targets box the concrete value,
    /// struct and array sources are cloned unless already fresh.
    pub fn translate_rhs(&mut self, value: &Expr, ty: TypeId) -> String {
        if self.oracle.types.is_interface(ty) {
            if let Some(src) = self.oracle.try_type_of(value.id()) {
                let already_abstract = self.oracle.types.is_interface(src)
                    || matches!(self.oracle.types.get(src), Type::Basic(BasicKind::UntypedNil));
                if !already_abstract {
                    let v = self.translate_expr(value, Some(src)).wrapped();
                    let desc = self.type_ref(src);
                    return format!("{}({}, {})", prelude::IFACE, desc, v);
                }
            }
            return self.translate_expr(value, Some(ty)).wrapped();
        }
        let e = self.translate_expr(value, Some(ty));
        if self.oracle.types.is_value_composite(ty) && !is_fresh_value(value) {
            let desc = self.type_ref(ty);
            return format!("{}({}, {})", prelude::CLONE, e.wrapped(), desc);
        }
        e.wrapped()
    }

    // ------------------------------------------------------------------
    // Composite literals
    // ------------------------------------------------------------------

    fn translate_composite(&mut self, lit: &CompositeLit, desired: Option<TypeId>) -> Expression {
        let ty = desired.unwrap_or_else(|| self.oracle.type_of(lit.id));
        let u = self.oracle.types.underlying(ty).clone();
        match u {
            Type::Array { elem, len } => {
                let elems = self.positional_elements(lit, elem, Some(len as usize));
                Expression::new(format!("[{}]", elems.join(", ")))
            }
            Type::Slice { elem } => {
                let elems = self.positional_elements(lit, elem, None);
                Expression::new(format!("new {}([{}])", prelude::SLICE, elems.join(", ")))
            }
            Type::Map { key, value } => {
                let mut entries = Vec::with_capacity(lit.elems.len());
                for elem in &lit.elems {
                    let k = elem
                        .key
                        .as_ref()
                        .unwrap_or_else(|| panic!("gale: map literal entry without key"));
                    let k = self.translate_rhs(k, key);
                    let v = self.translate_rhs(&elem.value, value);
                    entries.push(format!("[{}, {}]", k, v));
                }
                let key_desc = self.type_ref(key);
                Expression::new(format!(
                    "{}({}, [{}])",
                    prelude::MAKE_MAP,
                    key_desc,
                    entries.join(", ")
                ))
            }
            Type::Struct { fields } => {
                let mut values: Vec<Option<String>> = vec![None; fields.len()];
                for (pos, elem) in lit.elems.iter().enumerate() {
                    let idx = match &elem.key {
                        Some(Expr::Ident(key)) => fields
                            .iter()
                            .position(|f| f.name == key.name)
                            .unwrap_or_else(|| {
                                panic!("gale: unknown field {} in literal", key.name)
                            }),
                        Some(_) => panic!("gale: struct literal key is not a field name"),
                        None => pos,
                    };
                    values[idx] = Some(self.translate_rhs(&elem.value, fields[idx].ty));
                }
                let args: Vec<String> = fields
                    .iter()
                    .zip(values)
                    .map(|(f, v)| match v {
                        Some(v) => v,
                        None => self.zero_value(f.ty),
                    })
                    .collect();
                let ctor = self.type_ref(ty);
                Expression::new(format!("new {}.ctor({})", ctor, args.join(", ")))
            }
            other => panic!("gale: composite literal of non-composite type {:?}", other),
        }
    }

    /// Array/slice elements in index order, zero-filled between keyed
    /// entries. `len` is fixed for arrays, inferred for slices.
    fn positional_elements(
        &mut self,
        lit: &CompositeLit,
        elem_ty: TypeId,
        len: Option<usize>,
    ) -> Vec<String> {
        let mut by_index: Vec<(usize, &Expr)> = Vec::with_capacity(lit.elems.len());
        let mut next = 0usize;
        for elem in &lit.elems {
            let idx = match &elem.key {
                Some(key) => self
                    .oracle
                    .const_of(key.id())
                    .and_then(|c| c.as_int())
                    .unwrap_or_else(|| panic!("gale: array literal key is not a constant"))
                    as usize,
                None => next,
            };
            next = idx + 1;
            by_index.push((idx, &elem.value));
        }
        let total = len.unwrap_or_else(|| {
            by_index.iter().map(|(i, _)| i + 1).max().unwrap_or(0)
        });
        let mut out: Vec<Option<String>> = vec![None; total];
        for (idx, value) in by_index {
            out[idx] = Some(self.translate_rhs(value, elem_ty));
        }
        out.into_iter()
            .map(|v| match v {
                Some(v) => v,
                None => self.zero_value(elem_ty),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn translate_unary(&mut self, u: &UnaryExpr) -> Expression {
        match u.op {
            UnOp::Recv => {
                // Receives are suspension points; the statement layer owns
                // them (the desugarer hoists nested receives).
                panic!("gale: channel receive in expression position")
            }
            UnOp::Not => {
                let x = self.translate_expr(&u.x, None);
                Expression::parenthesized(format!("!{}", x.wrapped()))
            }
            UnOp::Neg => {
                let ty = self.oracle.type_of(u.id);
                let kind = self.basic_kind_of(ty);
                let x = self.translate_expr(&u.x, Some(ty));
                match kind {
                    Some(k) if k.is_64bit() => {
                        Expression::new(format!("{}({})", prelude::NEG64, x.text()))
                    }
                    Some(k) if k.is_integer() => self.fix_number(format!("-{}", x.wrapped()), k),
                    Some(BasicKind::Float32) => {
                        Expression::new(format!("{}(-{})", prelude::FROUND, x.wrapped()))
                    }
                    _ => Expression::parenthesized(format!("-{}", x.wrapped())),
                }
            }
            UnOp::BitNot => {
                let ty = self.oracle.type_of(u.id);
                let kind = self.basic_kind_of(ty);
                let x = self.translate_expr(&u.x, Some(ty));
                match kind {
                    Some(k) if k.is_64bit() => {
                        Expression::new(format!("{}({})", prelude::NOT64, x.text()))
                    }
                    Some(k) => self.fix_number(format!("~{}", x.wrapped()), k),
                    None => panic!("gale: complement of non-integer"),
                }
            }
            UnOp::Addr => self.translate_addr(&u.x),
        }
    }

    /// `&x`. Structs are reference-like in the target, so their address is
    /// the object itself; everything else gets a getter/setter pointer.
    /// Operands with subexpressions evaluate once via an immediate call.
    fn translate_addr(&mut self, x: &Expr) -> Expression {
        let ty = self.oracle.type_of(x.id());
        if matches!(self.oracle.types.underlying(ty), Type::Struct { .. }) {
            return self.translate_expr(x, None);
        }
        match x {
            Expr::Ident(ident) => {
                let obj = self.oracle.object_of(ident.id);
                if !self.is_boxed(obj) {
                    panic!(
                        "gale: address of {} taken but the variable is not boxed",
                        ident.name
                    );
                }
                let name = self.object_name(obj);
                Expression::new(format!(
                    "new {}(function() {{ return {}[0]; }}, function($v) {{ {}[0] = $v; }})",
                    prelude::PTR,
                    name,
                    name
                ))
            }
            Expr::Selector(s) => {
                let recv = self.translate_expr(&s.x, None);
                Expression::new(format!(
                    "(function($o) {{ return new {}(function() {{ return $o.{}; }}, \
                     function($v) {{ $o.{} = $v; }}); }})({})",
                    prelude::PTR,
                    s.sel.name,
                    s.sel.name,
                    recv.wrapped()
                ))
            }
            Expr::Index(ix) => {
                let subject = self.translate_expr(&ix.x, None);
                let index = self.translate_expr(&ix.index, None);
                let (get, set) = match self.oracle.types.underlying(self.oracle.type_of(ix.x.id()))
                {
                    Type::Array { .. } => (prelude::INDEX_ARRAY, prelude::SET_INDEX_ARRAY),
                    Type::Slice { .. } => (prelude::INDEX_SLICE, prelude::SET_INDEX_SLICE),
                    other => panic!("gale: cannot take element address of {:?}", other),
                };
                Expression::new(format!(
                    "(function($a, $i) {{ return new {}(function() {{ return {}($a, $i); }}, \
                     function($v) {{ {}($a, $i, $v); }}); }})({}, {})",
                    prelude::PTR,
                    get,
                    set,
                    subject.wrapped(),
                    index.wrapped()
                ))
            }
            other => panic!("gale: cannot take the address of {:?}", other.id()),
        }
    }

    fn translate_binary(&mut self, b: &BinaryExpr, desired: Option<TypeId>) -> Expression {
        let result_ty = self.oracle.try_type_of(b.id).or(desired);

        if matches!(b.op, BinOp::LAnd | BinOp::LOr) {
            let x = self.translate_expr(&b.x, result_ty);
            let y = self.translate_expr(&b.y, result_ty);
            let op = if b.op == BinOp::LAnd { "&&" } else { "||" };
            return Expression::parenthesized(format!("{} {} {}", x.wrapped(), op, y.wrapped()));
        }

        // Operand type: the concrete side wins; untyped constants follow it.
        let concrete = |cx: &Self, e: &Expr| {
            cx.oracle
                .try_type_of(e.id())
                .filter(|t| !matches!(cx.oracle.types.get(*t), Type::Basic(k) if k.is_untyped()))
        };
        let operand_ty = concrete(self, &b.x).or_else(|| concrete(self, &b.y)).or(result_ty);

        if b.op.is_comparison() {
            return self.translate_comparison(b, operand_ty);
        }

        let kind = operand_ty.and_then(|t| self.basic_kind_of(t));
        if matches!(kind, Some(k) if k.is_string()) {
            let x = self.translate_expr(&b.x, operand_ty);
            let y = self.translate_expr(&b.y, operand_ty);
            // String concatenation: never a numeric fixup.
            return Expression::parenthesized(format!("{} + {}", x.wrapped(), y.wrapped()));
        }

        let kind = kind.unwrap_or_else(|| panic!("gale: arithmetic on non-basic operands"));
        let shift = matches!(b.op, BinOp::Shl | BinOp::Shr);
        let x = self.translate_expr(&b.x, operand_ty);
        let y_ty = if shift {
            Some(self.oracle.types.basic(BasicKind::Uint))
        } else {
            operand_ty
        };
        let y = self.translate_expr(&b.y, y_ty);
        self.lower_arith(b.op, kind, x, y)
    }

    /// Arithmetic and bitwise lowering over already-translated operands;
    /// shared with compound assignment and `++`/`--`.
    pub(super) fn lower_arith(
        &mut self,
        op: BinOp,
        kind: BasicKind,
        x: Expression,
        y: Expression,
    ) -> Expression {
        if kind.is_string() {
            return Expression::parenthesized(format!("{} + {}", x.wrapped(), y.wrapped()));
        }
        if kind.is_64bit() {
            let call = match op {
                BinOp::Add => prelude::ADD64,
                BinOp::Sub => prelude::SUB64,
                BinOp::Mul => prelude::MUL64,
                BinOp::Div => prelude::DIV64,
                BinOp::Rem => prelude::REM64,
                BinOp::And => prelude::AND64,
                BinOp::Or => prelude::OR64,
                BinOp::Xor => prelude::XOR64,
                BinOp::AndNot => prelude::ANDNOT64,
                BinOp::Shl => prelude::SHL64,
                BinOp::Shr => prelude::SHR64,
                _ => unreachable!(),
            };
            return Expression::new(format!("{}({}, {})", call, x.text(), y.text()));
        }

        match op {
            BinOp::Div if kind.is_integer() => {
                let call = format!("{}({}, {})", prelude::IDIV, x.wrapped(), y.wrapped());
                self.fix_number(call, kind)
            }
            BinOp::Rem if kind.is_integer() => {
                let call = format!("{}({}, {})", prelude::IMOD, x.wrapped(), y.wrapped());
                self.fix_number(call, kind)
            }
            BinOp::Shl => {
                let call = format!("{}({}, {})", prelude::SHL, x.wrapped(), y.wrapped());
                self.fix_number(call, kind)
            }
            BinOp::Shr => {
                let call = if kind.is_unsigned() {
                    format!("{}({}, {})", prelude::SHRU, x.wrapped(), y.wrapped())
                } else {
                    format!("{}({}, {})", prelude::SHR, x.wrapped(), y.wrapped())
                };
                self.fix_number(call, kind)
            }
            BinOp::AndNot => {
                self.fix_number(format!("{} & ~{}", x.wrapped(), y.wrapped()), kind)
            }
            op => {
                let sym = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::And => "&",
                    BinOp::Or => "|",
                    BinOp::Xor => "^",
                    _ => unreachable!(),
                };
                self.fix_number(format!("{} {} {}", x.wrapped(), sym, y.wrapped()), kind)
            }
        }
    }

    fn translate_comparison(&mut self, b: &BinaryExpr, operand_ty: Option<TypeId>) -> Expression {
        let x = self.translate_expr(&b.x, operand_ty);
        let y = self.translate_expr(&b.y, operand_ty);
        let neg = |text: String| Expression::parenthesized(format!("!{}", text));

        if let Some(ty) = operand_ty {
            if self.oracle.types.is_value_composite(ty) {
                let desc = self.type_ref(ty);
                let call = format!("{}({}, {}, {})", prelude::EQUAL, x.wrapped(), y.wrapped(), desc);
                return match b.op {
                    BinOp::Eq => Expression::new(call),
                    BinOp::Ne => neg(call),
                    _ => panic!("gale: ordered comparison of composite values"),
                };
            }
            if self.oracle.types.is_interface(ty) {
                let call =
                    format!("{}({}, {})", prelude::IFACE_IS_EQUAL, x.wrapped(), y.wrapped());
                return match b.op {
                    BinOp::Eq => Expression::new(call),
                    BinOp::Ne => neg(call),
                    _ => panic!("gale: ordered comparison of interface values"),
                };
            }
            if matches!(self.basic_kind_of(ty), Some(k) if k.is_64bit()) {
                let eq = || format!("{}({}, {})", prelude::EQUAL64, x.text(), y.text());
                let less = |a: &Expression, b: &Expression| {
                    format!("{}({}, {})", prelude::LESS64, a.text(), b.text())
                };
                return match b.op {
                    BinOp::Eq => Expression::new(eq()),
                    BinOp::Ne => neg(eq()),
                    BinOp::Lt => Expression::new(less(&x, &y)),
                    BinOp::Gt => Expression::new(less(&y, &x)),
                    BinOp::Le => neg(less(&y, &x)),
                    BinOp::Ge => neg(less(&x, &y)),
                    _ => unreachable!(),
                };
            }
        }
        let sym = match b.op {
            BinOp::Eq => "===",
            BinOp::Ne => "!==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            _ => unreachable!(),
        };
        Expression::parenthesized(format!("{} {} {}", x.wrapped(), sym, y.wrapped()))
    }

    // ------------------------------------------------------------------
    // Calls, conversions, builtins
    // ------------------------------------------------------------------

    fn translate_call(&mut self, c: &CallExpr) -> Expression {
        // Conversion: the callee denotes a type.
        let target = match c.fun.as_ref() {
            Expr::TypeRef(t) => Some(self.oracle.type_of(t.id)),
            Expr::Ident(ident) => self
                .oracle
                .try_object_of(ident.id)
                .filter(|o| matches!(self.oracle.object(*o).kind, ObjectKind::TypeName))
                .map(|_| self.oracle.type_of(ident.id)),
            _ => None,
        };
        if let Some(target) = target {
            return self.translate_conversion(target, &c.args[0]);
        }

        if let Expr::Ident(ident) = c.fun.as_ref() {
            if let Some(obj) = self.oracle.try_object_of(ident.id) {
                if let ObjectKind::Builtin(builtin) = self.oracle.object(obj).kind {
                    return self.translate_builtin(builtin, c);
                }
            }
        }

        if self.oracle.is_blocking_call(c.id) {
            // A suspension needs a statement boundary; the statement layer
            // intercepts blocking calls before this point.
            panic!("gale: blocking call in expression position");
        }
        self.translate_call_any(c)
    }

    /// Call lowering without the blocking-position check; the statement
    /// layer wraps the result in a suspension.
    pub(super) fn translate_call_any(&mut self, c: &CallExpr) -> Expression {
        let sig = self.oracle.types.underlying(self.oracle.type_of(c.fun.id())).clone();
        let (params, variadic) = match sig {
            Type::Signature { params, variadic, .. } => (params, variadic),
            other => panic!("gale: call of non-function type {:?}", other),
        };
        let args = self.call_args(&c.args, &params, variadic, c.spread).join(", ");

        // Method call through a selector: record the method name so the
        // selector keeps any live implementation, and the owner type so
        // the prototype the call dispatches through stays declared.
        if let Expr::Selector(s) = c.fun.as_ref() {
            if let Some(sel) = self.oracle.try_selection_of(s.id) {
                if sel.kind == SelectionKind::Method {
                    self.deps.insert(DepKey::method_name(&s.sel.name));
                    self.note_method_owner(&s.x);
                    let recv = self.translate_expr(&s.x, None);
                    if let Some(owner) = self.primitive_method_owner(&s.x) {
                        let sep = if args.is_empty() { "" } else { ", " };
                        return Expression::new(format!(
                            "{}.prototype.{}.call({}{}{})",
                            owner,
                            s.sel.name,
                            recv.wrapped(),
                            sep,
                            args
                        ));
                    }
                    return Expression::new(format!(
                        "{}.{}({})",
                        recv.wrapped(),
                        s.sel.name,
                        args
                    ));
                }
            }
        }

        let fun = self.translate_expr(&c.fun, None);
        Expression::new(format!("{}({})", fun.wrapped(), args))
    }

    /// A method dispatches through its owner type's prototype, so the
    /// call site depends on the owner's declaration as well as the
    /// method name.
    fn note_method_owner(&mut self, recv: &Expr) {
        let mut ty = self.oracle.type_of(recv.id());
        if let Type::Pointer { elem } = self.oracle.types.get(ty) {
            ty = *elem;
        }
        if let Type::Named { obj, .. } = self.oracle.types.get(ty) {
            let o = self.oracle.object(*obj);
            if o.package_level {
                self.deps.insert(DepKey::object(&o.pkg, &o.name));
            }
        }
    }

    /// Owner descriptor name when the receiver is a named type over a
    /// basic. Such values are raw target primitives, so a method call
    /// cannot reach the prototype through the value and dispatches as
    /// `T.prototype.M.call(v, ...)` instead.
    fn primitive_method_owner(&mut self, recv: &Expr) -> Option<String> {
        let mut ty = self.oracle.type_of(recv.id());
        if let Type::Pointer { elem } = self.oracle.types.get(ty) {
            ty = *elem;
        }
        let (obj, underlying) = match self.oracle.types.get(ty) {
            Type::Named { obj, underlying } => (*obj, *underlying),
            _ => return None,
        };
        if !matches!(self.oracle.types.get(underlying), Type::Basic(_)) {
            return None;
        }
        Some(self.object_name(obj))
    }

    /// One translated text per call slot; a variadic tail packs into a
    /// single trailing slice slot.
    pub(super) fn call_args(
        &mut self,
        args: &[Expr],
        params: &[TypeId],
        variadic: bool,
        spread: bool,
    ) -> Vec<String> {
        if variadic && !spread {
            let fixed = params.len() - 1;
            let elem = match self.oracle.types.underlying(params[fixed]) {
                Type::Slice { elem } => *elem,
                other => panic!("gale: variadic parameter is {:?}", other),
            };
            let mut out: Vec<String> = args[..fixed.min(args.len())]
                .iter()
                .zip(params)
                .map(|(a, p)| self.translate_rhs(a, *p))
                .collect();
            let rest: Vec<String> = args
                .iter()
                .skip(fixed)
                .map(|a| self.translate_rhs(a, elem))
                .collect();
            out.push(format!("new {}([{}])", prelude::SLICE, rest.join(", ")));
            out
        } else {
            args.iter()
                .zip(params)
                .map(|(a, p)| self.translate_rhs(a, *p))
                .collect()
        }
    }

    fn translate_builtin(&mut self, builtin: Builtin, c: &CallExpr) -> Expression {
        match builtin {
            Builtin::Len => {
                let ty = self.oracle.type_of(c.args[0].id());
                let x = self.translate_expr(&c.args[0], None);
                match self.oracle.types.underlying(ty) {
                    Type::Basic(k) if k.is_string() => {
                        Expression::new(format!("{}.length", x.wrapped()))
                    }
                    Type::Array { len, .. } => Expression::new(len.to_string()),
                    Type::Slice { .. } => Expression::new(format!("{}.$length", x.wrapped())),
                    Type::Map { .. } => {
                        Expression::new(format!("{}({})", prelude::MAP_LEN, x.wrapped()))
                    }
                    Type::Chan { .. } => {
                        Expression::new(format!("{}({})", prelude::CHAN_LEN, x.wrapped()))
                    }
                    other => panic!("gale: len of {:?}", other),
                }
            }
            Builtin::Cap => {
                let ty = self.oracle.type_of(c.args[0].id());
                let x = self.translate_expr(&c.args[0], None);
                match self.oracle.types.underlying(ty) {
                    Type::Array { len, .. } => Expression::new(len.to_string()),
                    Type::Slice { .. } => Expression::new(format!("{}.$capacity", x.wrapped())),
                    Type::Chan { .. } => {
                        Expression::new(format!("{}({})", prelude::CHAN_CAP, x.wrapped()))
                    }
                    other => panic!("gale: cap of {:?}", other),
                }
            }
            Builtin::Append => {
                let slice_ty = self.oracle.type_of(c.args[0].id());
                let elem = match self.oracle.types.underlying(slice_ty) {
                    Type::Slice { elem } => *elem,
                    other => panic!("gale: append to {:?}", other),
                };
                let s = self.translate_expr(&c.args[0], None).wrapped();
                if c.spread {
                    let t = self.translate_expr(&c.args[1], None).wrapped();
                    return Expression::new(format!("{}({}, {})", prelude::APPEND_SLICE, s, t));
                }
                let elems: Vec<String> = c.args[1..]
                    .iter()
                    .map(|a| self.translate_rhs(a, elem))
                    .collect();
                Expression::new(format!("{}({}, {})", prelude::APPEND, s, elems.join(", ")))
            }
            Builtin::Copy => {
                let dst = self.translate_expr(&c.args[0], None).wrapped();
                let src_ty = self.oracle.type_of(c.args[1].id());
                let src = self.translate_expr(&c.args[1], None).wrapped();
                let call = match self.oracle.types.underlying(src_ty) {
                    Type::Basic(k) if k.is_string() => prelude::COPY_STRING,
                    _ => prelude::COPY_SLICE,
                };
                Expression::new(format!("{}({}, {})", call, dst, src))
            }
            Builtin::Delete => {
                let m = self.translate_expr(&c.args[0], None).wrapped();
                let key_ty = match self.oracle.types.underlying(self.oracle.type_of(c.args[0].id()))
                {
                    Type::Map { key, .. } => *key,
                    other => panic!("gale: delete from {:?}", other),
                };
                let k = self.translate_rhs(&c.args[1], key_ty);
                Expression::new(format!("{}({}, {})", prelude::MAP_DELETE, m, k))
            }
            Builtin::Make => {
                let ty = self.oracle.type_of(c.args[0].id());
                match self.oracle.types.underlying(ty).clone() {
                    Type::Slice { .. } => {
                        let desc = self.type_ref(ty);
                        let len = c
                            .args
                            .get(1)
                            .map(|a| self.translate_expr(a, None).wrapped())
                            .unwrap_or_else(|| "0".to_string());
                        let cap = c.args.get(2).map(|a| self.translate_expr(a, None).wrapped());
                        match cap {
                            Some(cap) => Expression::new(format!(
                                "{}({}, {}, {})",
                                prelude::MAKE_SLICE,
                                desc,
                                len,
                                cap
                            )),
                            None => Expression::new(format!(
                                "{}({}, {})",
                                prelude::MAKE_SLICE,
                                desc,
                                len
                            )),
                        }
                    }
                    Type::Map { key, .. } => {
                        let key_desc = self.type_ref(key);
                        Expression::new(format!("{}({}, [])", prelude::MAKE_MAP, key_desc))
                    }
                    Type::Chan { elem, .. } => {
                        let elem_desc = self.type_ref(elem);
                        let cap = c
                            .args
                            .get(1)
                            .map(|a| self.translate_expr(a, None).wrapped())
                            .unwrap_or_else(|| "0".to_string());
                        Expression::new(format!(
                            "new {}({}, {})",
                            prelude::CHAN,
                            elem_desc,
                            cap
                        ))
                    }
                    other => panic!("gale: make of {:?}", other),
                }
            }
            Builtin::New => {
                let ty = self.oracle.type_of(c.args[0].id());
                let desc = self.type_ref(ty);
                Expression::new(format!("{}({})", prelude::NEW, desc))
            }
            Builtin::Close => {
                let ch = self.translate_expr(&c.args[0], None).wrapped();
                Expression::new(format!("{}({})", prelude::CLOSE, ch))
            }
            Builtin::Panic => {
                let arg_ty = self.oracle.try_type_of(c.args[0].id());
                let v = self.translate_expr(&c.args[0], arg_ty).wrapped();
                let boxed = match arg_ty {
                    Some(t)
                        if !self.oracle.types.is_interface(t)
                            && !matches!(
                                self.oracle.types.get(t),
                                Type::Basic(BasicKind::UntypedNil)
                            ) =>
                    {
                        let desc = self.type_ref(t);
                        format!("{}({}, {})", prelude::IFACE, desc, v)
                    }
                    _ => v,
                };
                Expression::new(format!("{}({})", prelude::PANIC, boxed))
            }
            Builtin::Recover => Expression::new(format!("{}()", prelude::RECOVER)),
            Builtin::Print | Builtin::Println => {
                let call = if builtin == Builtin::Print {
                    prelude::PRINT
                } else {
                    prelude::PRINTLN
                };
                let args: Vec<String> = c
                    .args
                    .iter()
                    .map(|a| {
                        let ty = self.oracle.try_type_of(a.id());
                        self.translate_expr(a, ty).wrapped()
                    })
                    .collect();
                Expression::new(format!("{}({})", call, args.join(", ")))
            }
        }
    }

    fn translate_conversion(&mut self, target: TypeId, arg: &Expr) -> Expression {
        let src = self.oracle.type_of(arg.id());
        let tu = self.oracle.types.underlying(target).clone();
        let su = self.oracle.types.underlying(src).clone();

        if let (Type::Basic(tk), Type::Basic(sk)) = (&tu, &su) {
            // Constants format directly at the target kind.
            if let Some(value) = self.oracle.const_of(arg.id()).cloned() {
                return self.format_const(&value, Some(target));
            }
            let x = self.translate_expr(arg, Some(src));
            return self.numeric_conversion(*tk, *sk, x);
        }

        match (&tu, &su) {
            (Type::Slice { elem }, Type::Basic(sk)) if sk.is_string() => {
                let x = self.translate_expr(arg, Some(src)).wrapped();
                let call = match self.oracle.types.underlying(*elem).basic() {
                    Some(BasicKind::Uint8) => prelude::STRING_TO_BYTES,
                    Some(BasicKind::Int32) => prelude::STRING_TO_RUNES,
                    other => panic!("gale: conversion of string to slice of {:?}", other),
                };
                Expression::new(format!("{}({})", call, x))
            }
            (Type::Basic(tk), Type::Slice { elem }) if tk.is_string() => {
                let x = self.translate_expr(arg, Some(src)).wrapped();
                let call = match self.oracle.types.underlying(*elem).basic() {
                    Some(BasicKind::Uint8) => prelude::BYTES_TO_STRING,
                    Some(BasicKind::Int32) => prelude::RUNES_TO_STRING,
                    other => panic!("gale: conversion of slice of {:?} to string", other),
                };
                Expression::new(format!("{}({})", call, x))
            }
            (Type::Interface { .. }, _) => {
                let boxed = self.translate_rhs(arg, target);
                Expression::new(boxed)
            }
            _ => self.translate_expr(arg, Some(target)),
        }
    }

    fn numeric_conversion(
        &mut self,
        target: BasicKind,
        src: BasicKind,
        x: Expression,
    ) -> Expression {
        if target.is_string() && src.is_integer() {
            let inner = if src.is_64bit() {
                format!("{}({})", prelude::INT64_LOW, x.text())
            } else {
                x.wrapped()
            };
            return Expression::new(format!("{}({})", prelude::RUNE_TO_STRING, inner));
        }
        if target.is_string() {
            return x;
        }
        match (target.is_64bit(), src.is_64bit()) {
            (true, true) => x,
            (true, false) => {
                let inner = if src.is_float() {
                    format!("{}({})", prelude::TRUNC, x.wrapped())
                } else {
                    x.wrapped()
                };
                Expression::new(format!("{}({})", prelude::INT64_FROM, inner))
            }
            (false, true) => {
                if target.is_float() {
                    // Recombine the word pair; precision follows float64.
                    let text = format!(
                        "(function($x) {{ return $x.$high * 4294967296 + $x.$low; }})({})",
                        x.wrapped()
                    );
                    if target == BasicKind::Float32 {
                        Expression::new(format!("{}({})", prelude::FROUND, text))
                    } else {
                        Expression::new(text)
                    }
                } else {
                    self.fix_number(format!("{}({})", prelude::INT64_LOW, x.text()), target)
                }
            }
            (false, false) => {
                if target.is_float() {
                    if target == BasicKind::Float32 {
                        Expression::new(format!("{}({})", prelude::FROUND, x.wrapped()))
                    } else {
                        x
                    }
                } else if src.is_float() {
                    self.fix_number(format!("{}({})", prelude::TRUNC, x.wrapped()), target)
                } else {
                    self.fix_number(x.into_text(), target)
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Indexing, slicing, selection, assertion
    // ------------------------------------------------------------------

    fn translate_index(&mut self, ix: &IndexExpr) -> Expression {
        let subject_ty = self.oracle.type_of(ix.x.id());
        let int = self.oracle.types.basic(BasicKind::Int);
        match self.oracle.types.underlying(subject_ty).clone() {
            Type::Array { len, .. } => {
                let x = self.translate_expr(&ix.x, None);
                // A constant index the checker proved in range skips the guard.
                if let Some(i) = self.oracle.const_of(ix.index.id()).and_then(|c| c.as_int()) {
                    if i >= 0 && (i as u64) < len {
                        return Expression::new(format!("{}[{}]", x.wrapped(), i));
                    }
                }
                let i = self.translate_expr(&ix.index, Some(int));
                Expression::new(format!(
                    "{}({}, {})",
                    prelude::INDEX_ARRAY,
                    x.wrapped(),
                    i.wrapped()
                ))
            }
            Type::Slice { .. } => {
                let x = self.translate_expr(&ix.x, None);
                let i = self.translate_expr(&ix.index, Some(int));
                Expression::new(format!(
                    "{}({}, {})",
                    prelude::INDEX_SLICE,
                    x.wrapped(),
                    i.wrapped()
                ))
            }
            Type::Map { key, value } => {
                let m = self.translate_expr(&ix.x, None);
                let k = self.translate_rhs(&ix.index, key);
                let zero = self.zero_value(value);
                Expression::new(format!(
                    "{}({}, {}, {})",
                    prelude::MAP_GET,
                    m.wrapped(),
                    k,
                    zero
                ))
            }
            Type::Basic(k) if k.is_string() => {
                // Bounds-guarded like the slice forms; a bare charCodeAt
                // would yield NaN out of range instead of panicking.
                let s = self.translate_expr(&ix.x, None);
                let i = self.translate_expr(&ix.index, Some(int));
                Expression::new(format!(
                    "{}({}, {})",
                    prelude::INDEX_STRING,
                    s.wrapped(),
                    i.wrapped()
                ))
            }
            other => panic!("gale: index of {:?}", other),
        }
    }

    /// Two-result map read `v, ok := m[k]`, yielding `[v, ok]`.
    pub fn translate_map_lookup(&mut self, ix: &IndexExpr) -> Expression {
        let (key, value) = match self.oracle.types.underlying(self.oracle.type_of(ix.x.id())) {
            Type::Map { key, value } => (*key, *value),
            other => panic!("gale: two-result read of {:?}", other),
        };
        let m = self.translate_expr(&ix.x, None);
        let k = self.translate_rhs(&ix.index, key);
        let zero = self.zero_value(value);
        Expression::new(format!(
            "{}({}, {}, {})",
            prelude::MAP_LOOKUP,
            m.wrapped(),
            k,
            zero
        ))
    }

    fn translate_slice(&mut self, sl: &SliceExpr) -> Expression {
        let subject_ty = self.oracle.type_of(sl.x.id());
        let int = self.oracle.types.basic(BasicKind::Int);
        let bound = |cx: &mut Self, e: &Option<Box<Expr>>| {
            e.as_ref().map(|e| cx.translate_expr(e, Some(int)).wrapped())
        };
        let low = bound(self, &sl.low).unwrap_or_else(|| "0".to_string());
        let high = bound(self, &sl.high);
        let max = bound(self, &sl.max);

        match self.oracle.types.underlying(subject_ty).clone() {
            Type::Basic(k) if k.is_string() => {
                let s = self.translate_expr(&sl.x, None).wrapped();
                match high {
                    Some(high) => Expression::new(format!(
                        "{}({}, {}, {})",
                        prelude::SUBSTRING,
                        s,
                        low,
                        high
                    )),
                    None => Expression::new(format!(
                        "{}({}, {}, {}.length)",
                        prelude::SUBSTRING,
                        s,
                        low,
                        s
                    )),
                }
            }
            Type::Slice { .. } | Type::Array { .. } => {
                let is_array = matches!(
                    self.oracle.types.underlying(subject_ty),
                    Type::Array { .. }
                );
                let s = self.translate_expr(&sl.x, None).wrapped();
                let s = if is_array {
                    format!("new {}({})", prelude::SLICE, s)
                } else {
                    s
                };
                let mut args = vec![s, low];
                if let Some(high) = high {
                    args.push(high);
                    if let Some(max) = max {
                        args.push(max);
                    }
                }
                Expression::new(format!("{}({})", prelude::SUBSLICE, args.join(", ")))
            }
            other => panic!("gale: slice of {:?}", other),
        }
    }

    fn translate_selector(&mut self, s: &SelectorExpr) -> Expression {
        if let Some(sel) = self.oracle.try_selection_of(s.id) {
            let x = self.translate_expr(&s.x, None);
            return match sel.kind {
                SelectionKind::Field => {
                    Expression::new(format!("{}.{}", x.wrapped(), s.sel.name))
                }
                SelectionKind::Method => {
                    // Method value: bind the receiver once.
                    self.deps.insert(DepKey::method_name(&s.sel.name));
                    self.note_method_owner(&s.x);
                    if let Some(owner) = self.primitive_method_owner(&s.x) {
                        return Expression::new(format!(
                            "(function($o) {{ return function() {{ return {}.prototype.{}.apply($o, arguments); }}; }})({})",
                            owner,
                            s.sel.name,
                            x.wrapped()
                        ));
                    }
                    Expression::new(format!(
                        "(function($o) {{ return function() {{ return $o.{}.apply($o, arguments); }}; }})({})",
                        s.sel.name,
                        x.wrapped()
                    ))
                }
            };
        }
        // Qualified reference into another package.
        if let Some(obj) = self.oracle.try_object_of(s.id) {
            return Expression::new(self.object_name(obj));
        }
        panic!("gale: unresolved selector .{}", s.sel.name)
    }

    fn translate_type_assert(&mut self, ta: &TypeAssertExpr) -> Expression {
        let ty = self.oracle.type_of(ta.ty.id());
        let x = self.translate_expr(&ta.x, None);
        let desc = self.type_ref(ty);
        Expression::new(format!(
            "{}({}, {})",
            prelude::ASSERT_TYPE,
            x.wrapped(),
            desc
        ))
    }

    /// Two-result assertion `v, ok := x.(T)`, yielding `[v, ok]`.
    pub fn translate_type_assert_ok(&mut self, ta: &TypeAssertExpr) -> Expression {
        let ty = self.oracle.type_of(ta.ty.id());
        let x = self.translate_expr(&ta.x, None);
        let desc = self.type_ref(ty);
        Expression::new(format!(
            "{}({}, {})",
            prelude::ASSERT_TYPE_OK,
            x.wrapped(),
            desc
        ))
    }
}
