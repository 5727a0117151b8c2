//! Lowering contexts
//!
//! `PackageScope` carries the per-package emission state (deterministic
//! package-level names, the anonymous-type registry); `FuncContext` is the
//! per-function state: output buffer, name allocator, flattening case
//! counter, flow-frame stack, and the dependency edges collected while a
//! declaration's body is lowered. Contexts are owned and passed by
//! borrow — there is no shared parent-linked scope tree.

mod expr;
mod stmt;

use crate::decls::DepKey;
use crate::prelude;
use crate::typedesc::AnonTypes;
use gale_types::{ObjectId, ObjectKind, Oracle, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// A lowered expression: target text plus whether it must be parenthesized
/// when embedded into a larger expression.
#[derive(Debug, Clone)]
pub struct Expression {
    text: String,
    needs_parens: bool,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), needs_parens: false }
    }

    pub fn parenthesized(text: impl Into<String>) -> Self {
        Self { text: text.into(), needs_parens: true }
    }

    /// The bare text (for statement position or already-delimited slots).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text, wrapped if this expression binds loosely.
    pub fn wrapped(&self) -> String {
        if self.needs_parens {
            format!("({})", self.text)
        } else {
            self.text.clone()
        }
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Per-package emission state, persistent across fragments of a session.
#[derive(Debug)]
pub struct PackageScope {
    pub import_path: String,
    pub minify: bool,
    pub anon: AnonTypes,
    used_names: FxHashSet<String>,
    obj_names: FxHashMap<ObjectId, String>,
}

impl PackageScope {
    pub fn new(import_path: impl Into<String>, minify: bool) -> Self {
        Self {
            import_path: import_path.into(),
            minify,
            anon: AnonTypes::new(),
            used_names: FxHashSet::default(),
            obj_names: FxHashMap::default(),
        }
    }

    /// Allocate a fresh package-level name based on `base`.
    pub fn fresh_name(&mut self, base: &str) -> String {
        let name = pick_name(base, &self.used_names);
        self.used_names.insert(name.clone());
        name
    }

    /// Deterministic package-level name for an object. Exported objects of
    /// the current package live on `$pkg` under their declared name, so
    /// the reference is stable across recompiles; objects of other
    /// packages are reached through `$packages`; unexported objects get a
    /// synthetic closure-local name.
    pub fn object_name(&mut self, oracle: &Oracle, obj: ObjectId) -> String {
        if let Some(name) = self.obj_names.get(&obj) {
            return name.clone();
        }
        let o = oracle.object(obj);
        // `main` rides on `$pkg` despite being unexported: the program
        // writer invokes it from outside the package closure.
        let name = if o.pkg != self.import_path {
            format!("{}[\"{}\"].{}", prelude::PACKAGES, o.pkg, o.name)
        } else if o.exported() || o.name == "main" {
            format!("$pkg.{}", o.name)
        } else {
            self.fresh_name(&o.name)
        };
        self.obj_names.insert(obj, name.clone());
        name
    }

    /// Pre-bind an object to a name (import locals, retracted redefinitions).
    pub fn bind_object_name(&mut self, obj: ObjectId, name: String) {
        self.used_names.insert(name.clone());
        self.obj_names.insert(obj, name);
    }
}

/// Sanitize a base name and suffix it `$N` until unused. JavaScript
/// keywords get a `$` appended first.
fn pick_name(base: &str, used: &FxHashSet<String>) -> String {
    let mut base: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if base.is_empty() {
        base.push('_');
    }
    if prelude::RESERVED_JS.contains(base.as_str()) || base.starts_with('$') {
        base.push('$');
    }
    if !used.contains(&base) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{}${}", base, n);
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Break/continue target bookkeeping.
#[derive(Debug, Clone)]
pub(crate) enum FlowFrame {
    /// Direct mode: a labeled JS loop or block. Loops with a post
    /// statement carry an inner block label; `continue` breaks it so the
    /// post statement still runs.
    Direct {
        label: Option<String>,
        js_label: String,
        cont_label: Option<String>,
        is_loop: bool,
    },
    /// Flattened mode: dispatch-loop case numbers.
    Flat {
        label: Option<String>,
        break_case: u32,
        continue_case: Option<u32>,
        is_loop: bool,
    },
}

impl FlowFrame {
    fn label(&self) -> Option<&str> {
        match self {
            FlowFrame::Direct { label, .. } | FlowFrame::Flat { label, .. } => label.as_deref(),
        }
    }

    fn is_loop(&self) -> bool {
        match self {
            FlowFrame::Direct { is_loop, .. } | FlowFrame::Flat { is_loop, .. } => *is_loop,
        }
    }
}

/// Per-function lowering state. Created per function (or function
/// literal), discarded after its body is lowered.
pub struct FuncContext<'a> {
    pub oracle: &'a Oracle,
    pub scope: &'a mut PackageScope,
    /// Dependency edges collected while lowering this declaration.
    pub deps: FxHashSet<DepKey>,
    /// Compile into a dispatch loop with numbered resumption cases.
    pub flattened: bool,
    /// Body contains `defer`; emit the protected-invocation wrapper.
    pub deferring: bool,
    /// Result variable access expressions (named results, boxed where
    /// escaping).
    pub result_names: Vec<String>,
    /// Declared result types, in order.
    pub result_types: Vec<TypeId>,

    out: String,
    indent: usize,
    used_names: FxHashSet<String>,
    obj_names: FxHashMap<ObjectId, String>,
    case_counter: u32,
    label_counter: u32,
    pub(crate) flow: Vec<FlowFrame>,
    label_cases: FxHashMap<String, u32>,
    /// Locals declared inside a flattened body. The dispatch closure is
    /// re-entered on every resumption, so their `var` slots must live in
    /// the enclosing function instead.
    hoisted: Vec<String>,
}

impl<'a> FuncContext<'a> {
    pub fn new(oracle: &'a Oracle, scope: &'a mut PackageScope) -> Self {
        Self {
            oracle,
            scope,
            deps: FxHashSet::default(),
            flattened: false,
            deferring: false,
            result_names: Vec::new(),
            result_types: Vec::new(),
            out: String::new(),
            indent: 0,
            used_names: FxHashSet::default(),
            obj_names: FxHashMap::default(),
            case_counter: 0,
            label_counter: 0,
            flow: Vec::new(),
            label_cases: FxHashMap::default(),
            hoisted: Vec::new(),
        }
    }

    /// Context for a nested function literal. The child sees the parent's
    /// name bindings (captured variables keep their names) but allocates
    /// its own cases, flow frames, and output.
    pub fn nested(&mut self) -> FuncContext<'_> {
        FuncContext {
            oracle: self.oracle,
            scope: &mut *self.scope,
            deps: FxHashSet::default(),
            flattened: false,
            deferring: false,
            result_names: Vec::new(),
            result_types: Vec::new(),
            out: String::new(),
            indent: self.indent,
            used_names: self.used_names.clone(),
            obj_names: self.obj_names.clone(),
            case_counter: 0,
            label_counter: 0,
            flow: Vec::new(),
            label_cases: FxHashMap::default(),
            hoisted: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    pub fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    /// Write one indented line.
    pub fn writeln(&mut self, line: &str) {
        if !self.scope.minify {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    pub fn indented<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.indent += 1;
        f(self);
        self.indent -= 1;
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.out)
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    /// Allocate a fresh local name. Never reuses a name within this
    /// function's scope.
    pub fn fresh_name(&mut self, base: &str) -> String {
        // Package-level names are also off limits: a local must not shadow
        // a package name it might reference.
        let mut taken = self.used_names.clone();
        taken.extend(self.scope.used_names.iter().cloned());
        let name = pick_name(base, &taken);
        self.used_names.insert(name.clone());
        name
    }

    /// Resolve an object to its emitted name, allocating for locals and
    /// recording a dependency edge for package-level objects.
    pub fn object_name(&mut self, obj: ObjectId) -> String {
        let o = self.oracle.object(obj);
        if o.package_level {
            if !matches!(o.kind, ObjectKind::Builtin(_) | ObjectKind::PkgName { .. }) {
                self.deps.insert(DepKey::object(&o.pkg, &o.name));
            }
            return self.scope.object_name(self.oracle, obj);
        }
        if let Some(name) = self.obj_names.get(&obj) {
            return name.clone();
        }
        let name = o.name.clone();
        let name = self.fresh_name(&name);
        self.obj_names.insert(obj, name.clone());
        name
    }

    /// Whether a local object is boxed (its address escapes).
    pub fn is_boxed(&self, obj: ObjectId) -> bool {
        !self.oracle.object(obj).package_level && self.oracle.escapes(obj)
    }

    // ------------------------------------------------------------------
    // Flattening
    // ------------------------------------------------------------------

    /// Allocate the next resumption case number.
    pub fn new_case(&mut self) -> u32 {
        self.case_counter += 1;
        self.case_counter
    }

    /// Emit a `case N:` label (one indent level out from the case bodies).
    pub fn write_case(&mut self, n: u32) {
        self.indent -= 1;
        self.writeln(&format!("case {}:", n));
        self.indent += 1;
    }

    /// Emit a suspension: park at a new case, return the blocking call,
    /// resume with the operation's result in `$r`.
    pub fn suspend(&mut self, call_text: &str) -> &'static str {
        let n = self.new_case();
        self.writeln(&format!("$s = {}; return {};", n, call_text));
        self.write_case(n);
        self.writeln(&format!("$r = {}.result;", prelude::CUR_GOROUTINE));
        "$r"
    }

    /// Jump to a case within the dispatch loop.
    pub fn goto_case(&mut self, n: u32) {
        self.writeln(&format!("$s = {}; continue s;", n));
    }

    /// Case number for a label (assigned on first use; goto may precede
    /// the labeled statement).
    pub fn label_case(&mut self, label: &str) -> u32 {
        if let Some(&n) = self.label_cases.get(label) {
            return n;
        }
        let n = self.new_case();
        self.label_cases.insert(label.to_string(), n);
        n
    }

    /// Fresh JS label for direct-mode loops and switch blocks.
    pub fn fresh_js_label(&mut self) -> String {
        self.label_counter += 1;
        format!("l${}", self.label_counter)
    }

    // ------------------------------------------------------------------
    // Flow frames
    // ------------------------------------------------------------------

    pub(crate) fn push_flow(&mut self, frame: FlowFrame) {
        self.flow.push(frame);
    }

    pub(crate) fn pop_flow(&mut self) {
        self.flow.pop();
    }

    /// Innermost frame a `break` targets: labeled when a label is given,
    /// otherwise the nearest frame of any kind.
    pub(crate) fn break_frame(&self, label: Option<&str>) -> &FlowFrame {
        self.flow
            .iter()
            .rev()
            .find(|f| match label {
                Some(l) => f.label() == Some(l),
                None => true,
            })
            .unwrap_or_else(|| panic!("gale: break outside breakable statement"))
    }

    /// Innermost loop frame a `continue` targets.
    pub(crate) fn continue_frame(&self, label: Option<&str>) -> &FlowFrame {
        self.flow
            .iter()
            .rev()
            .find(|f| {
                f.is_loop()
                    && match label {
                        Some(l) => f.label() == Some(l),
                        None => true,
                    }
            })
            .unwrap_or_else(|| panic!("gale: continue outside loop"))
    }

    // ------------------------------------------------------------------
    // Type descriptor references
    // ------------------------------------------------------------------

    /// Target reference for a type's descriptor: prelude name for basics,
    /// emitted name for named types (recording a dependency edge),
    /// registry name for anonymous composites.
    pub fn type_ref(&mut self, ty: TypeId) -> String {
        match self.oracle.types.get(ty) {
            gale_types::Type::Basic(kind) => prelude::basic_type_name(*kind).to_string(),
            gale_types::Type::Named { obj, .. } => self.object_name(*obj),
            gale_types::Type::Tuple(_) => {
                panic!("gale: tuple types have no descriptor")
            }
            _ => {
                // The descriptor itself is keyless, but the declaration
                // using it still depends on every named type inside.
                let mut named = Vec::new();
                crate::typedesc::named_objects_in(self.oracle, ty, &mut named);
                for obj in named {
                    let o = self.oracle.object(obj);
                    if o.package_level {
                        self.deps.insert(DepKey::object(&o.pkg, &o.name));
                    }
                }
                self.scope.anon.name_for(ty)
            }
        }
    }
}
