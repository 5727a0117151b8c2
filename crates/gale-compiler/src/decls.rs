//! Declaration assembly and dead-code elimination
//!
//! Each top-level declaration lowers to a `Decl`: up to four phased code
//! blobs (hoisted declaration, method attachment, type initialization,
//! runtime initialization), the dependency keys it provides, and the keys
//! it consumes. The program writer concatenates the blobs phase by phase;
//! the selector walks the dependency graph from the root set and drops
//! everything unreachable.

use crate::analysis;
use crate::lower::{FuncContext, PackageScope};
use crate::typedesc;
use gale_ast::{Block, Decl as AstDecl, File, FuncDecl, Stmt, TypeSpec, VarSpec};
use gale_types::{is_exported, Oracle, Type};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------
// Dependency keys
// ----------------------------------------------------------------------

/// A node in the dead-code-elimination graph.
///
/// Method liveness is two-dimensional: a method body is needed only when
/// its owner type is selected *and* its name is invoked somewhere (possibly
/// through an interface, where the concrete owner is unknown). Interface
/// call sites therefore record the name alone (`MethodName`); declarations
/// of methods carry the full `Method` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DepKey {
    Object { pkg: String, name: String },
    Method { pkg: String, type_name: String, method: String },
    MethodName { method: String },
}

impl DepKey {
    pub fn object(pkg: &str, name: &str) -> Self {
        DepKey::Object { pkg: pkg.to_string(), name: name.to_string() }
    }

    pub fn method(pkg: &str, type_name: &str, method: &str) -> Self {
        DepKey::Method {
            pkg: pkg.to_string(),
            type_name: type_name.to_string(),
            method: method.to_string(),
        }
    }

    pub fn method_name(method: &str) -> Self {
        DepKey::MethodName { method: method.to_string() }
    }
}

// ----------------------------------------------------------------------
// Lowered declarations
// ----------------------------------------------------------------------

/// One lowered top-level declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decl {
    /// Keys this declaration provides. Empty means always selected
    /// (imports, `init` functions, bare statements, anonymous descriptors).
    pub keys: Vec<DepKey>,
    /// Selected unconditionally as a DCE root (export surface).
    pub exported: bool,
    /// Keys this declaration consumes.
    pub deps: Vec<DepKey>,
    /// The declared function may suspend; callers must flatten.
    pub blocking: bool,

    /// Hoisted declarations: `var` statements, `$newType` calls, function
    /// assignments.
    pub decl_code: String,
    /// Method attachment onto type prototypes.
    pub method_code: String,
    /// Type descriptor initialization (`.init(...)`, anonymous descriptor
    /// construction, cycle patches).
    pub type_init_code: String,
    /// Runtime initialization: var initializers, `init()` calls, bare
    /// statements.
    pub init_code: String,
}

impl Decl {
    fn sorted_deps(deps: FxHashSet<DepKey>) -> Vec<DepKey> {
        let mut deps: Vec<DepKey> = deps.into_iter().collect();
        deps.sort();
        deps
    }
}

/// `lhs = ...` needs a `var` only for closure-local names; `$pkg.X` and
/// `$packages[...]` targets are plain property assignments.
fn decl_lhs(name: &str) -> String {
    if name.starts_with("$pkg.") || name.starts_with('$') && name.contains('[') {
        name.to_string()
    } else {
        format!("var {}", name)
    }
}

// ----------------------------------------------------------------------
// Package assembly
// ----------------------------------------------------------------------

/// A fully lowered package: its declarations in phase-ready order and the
/// import paths it depends on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Package {
    pub import_path: String,
    pub pkg_name: String,
    pub imports: Vec<String>,
    pub decls: Vec<Decl>,
    pub minified: bool,
}

/// Assembles `Decl`s from a checked file, in phase order: types, then vars
/// in the checker-supplied initialization order, then functions, then bare
/// statements in source order.
pub struct PackageBuilder<'a> {
    oracle: &'a Oracle,
    scope: &'a mut PackageScope,
    decls: Vec<Decl>,
    imports: Vec<String>,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(oracle: &'a Oracle, scope: &'a mut PackageScope) -> Self {
        Self { oracle, scope, decls: Vec::new(), imports: Vec::new() }
    }

    pub fn build_file(&mut self, file: &File) {
        for decl in &file.decls {
            if let AstDecl::Import(spec) = decl {
                if !self.imports.contains(&spec.path) {
                    self.imports.push(spec.path.clone());
                }
            }
        }
        for decl in &file.decls {
            if let AstDecl::Type(spec) = decl {
                self.push_type(spec);
            }
        }
        // Var initializers run in dependency order, not source order.
        let mut vars: Vec<&VarSpec> = file
            .decls
            .iter()
            .filter_map(|d| match d {
                AstDecl::Var(spec) => Some(spec),
                _ => None,
            })
            .collect();
        let order = self.oracle.init_order();
        vars.sort_by_key(|spec| {
            spec.names
                .iter()
                .filter_map(|n| self.oracle.try_object_of(n.id))
                .filter_map(|obj| order.iter().position(|o| *o == obj))
                .min()
                .unwrap_or(usize::MAX)
        });
        for spec in vars {
            self.push_var(spec);
        }
        for decl in &file.decls {
            if let AstDecl::Func(f) = decl {
                self.push_func(f);
            }
        }
        for decl in &file.decls {
            if let AstDecl::Stmt(s) = decl {
                self.push_stmt(s);
            }
        }
    }

    fn push_type(&mut self, spec: &TypeSpec) {
        let obj = self.oracle.object_of(spec.name.id);
        let o = self.oracle.object(obj).clone();
        let name = self.scope.object_name(self.oracle, obj);
        let named = self.oracle.type_of(spec.name.id);
        let underlying = match self.oracle.types.get(named) {
            Type::Named { underlying, .. } => *underlying,
            _ => panic!("gale: type declaration {} is not a named type", o.name),
        };

        let kind = typedesc::kind_str(self.oracle, underlying);
        let decl_code = format!(
            "{} = {}(\"{}\", \"{}\");\n",
            decl_lhs(&name),
            crate::prelude::NEW_TYPE,
            o.name,
            kind
        );
        let ctor = typedesc::descriptor_expr(self.oracle, self.scope, underlying, None);
        let type_init_code = format!("{}.init({});\n", name, ctor);

        let mut deps = FxHashSet::default();
        let mut named_refs = Vec::new();
        typedesc::named_objects_in(self.oracle, underlying, &mut named_refs);
        for dep_obj in named_refs {
            if dep_obj == obj {
                continue;
            }
            let d = self.oracle.object(dep_obj);
            if d.package_level {
                deps.insert(DepKey::object(&d.pkg, &d.name));
            }
        }

        self.decls.push(Decl {
            keys: vec![DepKey::object(&o.pkg, &o.name)],
            exported: o.exported(),
            deps: Decl::sorted_deps(deps),
            blocking: false,
            decl_code,
            type_init_code,
            ..Decl::default()
        });
    }

    fn push_var(&mut self, spec: &VarSpec) {
        let mut cx = FuncContext::new(self.oracle, self.scope);
        let mut keys = Vec::new();
        let mut exported = false;
        let mut names = Vec::new();
        for ident in &spec.names {
            if ident.is_blank() {
                names.push(None);
                continue;
            }
            let obj = cx.oracle.object_of(ident.id);
            let o = cx.oracle.object(obj).clone();
            keys.push(DepKey::object(&o.pkg, &o.name));
            exported |= o.exported();
            names.push(Some((obj, cx.object_name(obj))));
        }
        // Naming a var is not a self dependency.
        for key in &keys {
            cx.deps.remove(key);
        }

        let locals: Vec<&str> = names
            .iter()
            .flatten()
            .map(|(_, n)| n.as_str())
            .filter(|n| !n.starts_with('$'))
            .collect();
        let decl_code = if locals.is_empty() {
            String::new()
        } else {
            format!("var {};\n", locals.join(", "))
        };

        match spec.values.len() {
            0 => {
                for (ident, name) in spec.names.iter().zip(&names) {
                    if let Some((_, name)) = name {
                        let ty = cx.oracle.type_of(ident.id);
                        let zero = cx.zero_value(ty);
                        cx.writeln(&format!("{} = {};", name, zero));
                    }
                }
            }
            n if n == spec.names.len() => {
                for (i, value) in spec.values.iter().enumerate() {
                    match &names[i] {
                        Some((_, name)) => {
                            let ty = cx.oracle.type_of(spec.names[i].id);
                            let rhs = cx.translate_rhs(value, ty);
                            let line = format!("{} = {};", name, rhs);
                            cx.writeln(&line);
                        }
                        None => {
                            let text = cx.translate_expr(value, None).into_text();
                            cx.writeln(&format!("{};", text));
                        }
                    }
                }
            }
            _ => {
                // Single multi-value initializer.
                let tuple = cx.fresh_name("_tuple");
                let call = cx.translate_expr(&spec.values[0], None).into_text();
                cx.writeln(&format!("var {} = {};", tuple, call));
                for (i, name) in names.iter().enumerate() {
                    if let Some((_, name)) = name {
                        cx.writeln(&format!("{} = {}[{}];", name, tuple, i));
                    }
                }
            }
        }

        let init_code = cx.take_output();
        let deps = std::mem::take(&mut cx.deps);
        drop(cx);
        self.decls.push(Decl {
            keys,
            exported,
            deps: Decl::sorted_deps(deps),
            blocking: false,
            decl_code,
            init_code,
            ..Decl::default()
        });
    }

    fn push_func(&mut self, decl: &FuncDecl) {
        let body = match &decl.body {
            Some(body) => body,
            None => return,
        };
        let obj = self.oracle.object_of(decl.name.id);
        let o = self.oracle.object(obj).clone();
        let blocking = self.oracle.is_blocking_object(obj);

        let results = match self.oracle.types.underlying(self.oracle.type_of(decl.name.id)) {
            Type::Signature { results, .. } => results.clone(),
            other => panic!("gale: function {} typed {:?}", o.name, other),
        };

        match &decl.recv {
            None => {
                let name = self.scope.object_name(self.oracle, obj);
                let mut cx = FuncContext::new(self.oracle, self.scope);
                cx.flattened = blocking || analysis::must_flatten(body, cx.oracle);
                cx.deferring = analysis::has_defer(body);
                let text =
                    cx.emit_function(None, &decl.params, &decl.named_results, &results, body);
                let mut deps = std::mem::take(&mut cx.deps);
                drop(cx);
                deps.remove(&DepKey::object(&o.pkg, &o.name));

                let is_init = o.name == "init";
                let init_code = if is_init {
                    format!("{}();\n", name)
                } else {
                    String::new()
                };
                self.decls.push(Decl {
                    // init functions always run, so they carry no key.
                    keys: if is_init {
                        Vec::new()
                    } else {
                        vec![DepKey::object(&o.pkg, &o.name)]
                    },
                    exported: o.exported(),
                    deps: Decl::sorted_deps(deps),
                    blocking,
                    decl_code: format!("{} = {};\n", decl_lhs(&name), text),
                    init_code,
                    ..Decl::default()
                });
            }
            Some(recv) => {
                let owner = self
                    .oracle
                    .lookup(&o.pkg, &recv.type_name)
                    .unwrap_or_else(|| {
                        panic!("gale: method receiver type {} not declared", recv.type_name)
                    });
                let owner_name = self.scope.object_name(self.oracle, owner);
                let mut cx = FuncContext::new(self.oracle, self.scope);
                cx.flattened = blocking || analysis::must_flatten(body, cx.oracle);
                cx.deferring = analysis::has_defer(body);
                let text =
                    cx.emit_function(Some(recv), &decl.params, &decl.named_results, &results, body);
                let deps = std::mem::take(&mut cx.deps);
                drop(cx);

                self.decls.push(Decl {
                    keys: vec![DepKey::method(&o.pkg, &recv.type_name, &o.name)],
                    exported: is_exported(&o.name),
                    deps: Decl::sorted_deps(deps),
                    blocking,
                    method_code: format!(
                        "{}.prototype.{} = {};\n",
                        owner_name, o.name, text
                    ),
                    ..Decl::default()
                });
            }
        }
    }

    /// A bare top-level statement (REPL fragment). Suspending statements
    /// are wrapped in a flattened no-argument function handed to the
    /// scheduler; plain statements run inline during initialization.
    fn push_stmt(&mut self, stmt: &Stmt) {
        let suspends = analysis::stmt_suspends(stmt, self.oracle);
        let mut cx = FuncContext::new(self.oracle, self.scope);
        let init_code = if suspends {
            cx.flattened = true;
            let body = Block { stmts: vec![stmt.clone()] };
            let text = cx.emit_function(None, &[], &[], &[], &body);
            format!("{}({});\n", crate::prelude::RUN, text)
        } else {
            cx.translate_stmt(stmt);
            cx.take_output()
        };
        let deps = std::mem::take(&mut cx.deps);
        drop(cx);
        self.decls.push(Decl {
            keys: Vec::new(),
            exported: false,
            deps: Decl::sorted_deps(deps),
            blocking: suspends,
            init_code,
            ..Decl::default()
        });
    }

    /// Emit the anonymous descriptors discovered while lowering and close
    /// the package. The descriptor declaration leads the list so its
    /// initialization precedes every named `.init` that references it.
    pub fn finish(self, pkg_name: &str, minified: bool) -> Package {
        let import_path = self.scope.import_path.clone();
        let mut decls = self.decls;
        let emission = typedesc::emit_anon_types(self.oracle, self.scope);
        if !emission.names.is_empty() {
            let mut type_init_code = emission.code;
            type_init_code.push_str(&emission.patch_code);
            decls.insert(
                0,
                Decl {
                    decl_code: format!("var {};\n", emission.names.join(", ")),
                    type_init_code,
                    ..Decl::default()
                },
            );
        }
        Package {
            import_path,
            pkg_name: pkg_name.to_string(),
            imports: self.imports,
            decls,
            minified,
        }
    }
}

// ----------------------------------------------------------------------
// Dead-code elimination
// ----------------------------------------------------------------------

/// Select the live subset of `decls` (indices in original order).
///
/// Roots: keyless declarations, exported declarations, and any object
/// named `main`. From there the work list follows `deps` edges. A method
/// declaration activates only when its owner type is selected and its
/// name is live (recorded by some call site, or exported).
pub fn select_alive(decls: &[Decl]) -> Vec<usize> {
    let mut object_index: FxHashMap<(&str, &str), Vec<usize>> = FxHashMap::default();
    let mut method_index: FxHashMap<(&str, &str, &str), usize> = FxHashMap::default();
    struct PendingMethod<'a> {
        idx: usize,
        pkg: &'a str,
        type_name: &'a str,
        method: &'a str,
        exported: bool,
    }
    let mut methods: Vec<PendingMethod> = Vec::new();

    for (i, d) in decls.iter().enumerate() {
        for key in &d.keys {
            match key {
                DepKey::Object { pkg, name } => {
                    object_index.entry((pkg, name)).or_default().push(i);
                }
                DepKey::Method { pkg, type_name, method } => {
                    method_index.insert((pkg, type_name, method), i);
                    methods.push(PendingMethod {
                        idx: i,
                        pkg,
                        type_name,
                        method,
                        exported: d.exported,
                    });
                }
                DepKey::MethodName { .. } => {}
            }
        }
    }

    let mut selected = vec![false; decls.len()];
    let mut live_objects: FxHashSet<(String, String)> = FxHashSet::default();
    let mut live_names: FxHashSet<String> = FxHashSet::default();
    let mut work: Vec<usize> = Vec::new();

    let mut select = |i: usize, selected: &mut Vec<bool>, work: &mut Vec<usize>| {
        if !selected[i] {
            selected[i] = true;
            work.push(i);
        }
    };

    for (i, d) in decls.iter().enumerate() {
        let method_only = d.keys.iter().all(|k| matches!(k, DepKey::Method { .. }))
            && !d.keys.is_empty();
        if d.keys.is_empty() {
            select(i, &mut selected, &mut work);
        } else if !method_only
            && (d.exported
                || d.keys
                    .iter()
                    .any(|k| matches!(k, DepKey::Object { name, .. } if name == "main")))
        {
            select(i, &mut selected, &mut work);
        }
    }

    loop {
        while let Some(i) = work.pop() {
            for key in &decls[i].keys {
                if let DepKey::Object { pkg, name } = key {
                    live_objects.insert((pkg.clone(), name.clone()));
                }
            }
            for dep in &decls[i].deps {
                match dep {
                    DepKey::Object { pkg, name } => {
                        live_objects.insert((pkg.clone(), name.clone()));
                        if let Some(idxs) = object_index.get(&(pkg.as_str(), name.as_str())) {
                            for &j in idxs {
                                select(j, &mut selected, &mut work);
                            }
                        }
                    }
                    DepKey::Method { pkg, type_name, method } => {
                        if let Some(&j) =
                            method_index.get(&(pkg.as_str(), type_name.as_str(), method.as_str()))
                        {
                            select(j, &mut selected, &mut work);
                        }
                    }
                    DepKey::MethodName { method } => {
                        live_names.insert(method.clone());
                    }
                }
            }
        }
        // Method activation may unlock further work; iterate to fixpoint.
        let mut progressed = false;
        for m in &methods {
            if selected[m.idx] {
                continue;
            }
            let owner_live = live_objects.contains(&(m.pkg.to_string(), m.type_name.to_string()));
            let name_live = m.exported || live_names.contains(m.method);
            if owner_live && name_live {
                select(m.idx, &mut selected, &mut work);
                progressed = true;
            }
        }
        if !progressed && work.is_empty() {
            break;
        }
    }

    (0..decls.len()).filter(|&i| selected[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj_decl(pkg: &str, name: &str, exported: bool, deps: Vec<DepKey>) -> Decl {
        Decl {
            keys: vec![DepKey::object(pkg, name)],
            exported,
            deps,
            ..Decl::default()
        }
    }

    #[test]
    fn unreferenced_private_decl_is_dropped() {
        let decls = vec![
            obj_decl("main", "Exported", true, vec![]),
            obj_decl("main", "helper", false, vec![]),
        ];
        assert_eq!(select_alive(&decls), vec![0]);
    }

    #[test]
    fn dependency_chain_is_followed() {
        let decls = vec![
            obj_decl("main", "main", false, vec![DepKey::object("main", "a")]),
            obj_decl("main", "a", false, vec![DepKey::object("main", "b")]),
            obj_decl("main", "b", false, vec![]),
            obj_decl("main", "c", false, vec![]),
        ];
        assert_eq!(select_alive(&decls), vec![0, 1, 2]);
    }

    #[test]
    fn keyless_decls_always_selected() {
        let decls = vec![
            Decl { init_code: "sideEffect();\n".into(), ..Decl::default() },
            obj_decl("main", "unused", false, vec![]),
        ];
        assert_eq!(select_alive(&decls), vec![0]);
    }

    #[test]
    fn method_needs_owner_and_live_name() {
        let method = Decl {
            keys: vec![DepKey::method("main", "T", "visit")],
            ..Decl::default()
        };
        // Name live, owner dead: not selected.
        let decls = vec![
            obj_decl("main", "main", false, vec![DepKey::method_name("visit")]),
            method.clone(),
        ];
        assert_eq!(select_alive(&decls), vec![0]);

        // Name live and owner selected: method comes alive.
        let decls = vec![
            obj_decl(
                "main",
                "main",
                false,
                vec![DepKey::method_name("visit"), DepKey::object("main", "T")],
            ),
            obj_decl("main", "T", false, vec![]),
            method,
        ];
        assert_eq!(select_alive(&decls), vec![0, 1, 2]);
    }

    #[test]
    fn exported_method_rides_with_its_type() {
        let decls = vec![
            obj_decl("main", "T", true, vec![]),
            Decl {
                keys: vec![DepKey::method("main", "T", "String")],
                exported: true,
                ..Decl::default()
            },
        ];
        assert_eq!(select_alive(&decls), vec![0, 1]);
    }
}
