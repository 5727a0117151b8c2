//! Incremental compilation session.
//!
//! A `Session` accepts one desugared source fragment at a time and returns
//! the full generated script after each fragment, REPL style. It owns the
//! Oracle tables, the package emission scope, the declarations accumulated
//! so far, and the archive cache for imported packages. A `parking_lot`
//! mutex serializes fragments so at most one translation of the package is
//! in flight.
//!
//! Fragment names are vetted against the predeclared-identifier table
//! before the checker runs; a rejected fragment leaves the Oracle's scope
//! untouched. Redefining an accepted name retracts the previous object
//! first, so repeating a definition is idempotent.

use crate::archive::Archive;
use crate::decls::{DepKey, Package, PackageBuilder};
use crate::error::{CompileError, CompileResult};
use crate::lower::PackageScope;
use crate::prelude;
use crate::program;
use gale_ast::{Decl as AstDecl, Expr, File, Stmt};
use gale_types::{Checker, ObjectKind, Oracle};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

pub struct Session<C> {
    state: Mutex<State<C>>,
}

struct State<C> {
    checker: C,
    oracle: Oracle,
    scope: PackageScope,
    import_path: String,
    pkg_name: String,
    minify: bool,
    /// Declarations accumulated across fragments, in arrival order.
    package: Package,
    /// Decoded archives of imported packages, keyed by import path, in
    /// load order.
    archives: Vec<Archive>,
    archive_paths: FxHashMap<String, usize>,
}

impl<C: Checker> Session<C> {
    pub fn new(import_path: &str, pkg_name: &str, minify: bool, checker: C) -> Self {
        Self {
            state: Mutex::new(State {
                checker,
                oracle: Oracle::new(),
                scope: PackageScope::new(import_path, minify),
                import_path: import_path.to_string(),
                pkg_name: pkg_name.to_string(),
                minify,
                package: Package {
                    import_path: import_path.to_string(),
                    pkg_name: pkg_name.to_string(),
                    minified: minify,
                    ..Package::default()
                },
                archives: Vec::new(),
                archive_paths: FxHashMap::default(),
            }),
        }
    }

    /// Register a compiled dependency. Its blocking functions are marked in
    /// the Oracle so call sites in later fragments flatten correctly.
    pub fn load_archive(&self, data: &[u8]) -> CompileResult<()> {
        let archive = Archive::decode(data)?;
        let mut state = self.state.lock();
        state.absorb_blocking(&archive);
        match state.archive_paths.get(&archive.import_path) {
            Some(&i) => state.archives[i] = archive,
            None => {
                let slot = state.archives.len();
                state.archive_paths.insert(archive.import_path.clone(), slot);
                state.archives.push(archive);
            }
        }
        Ok(())
    }

    /// Translate one fragment and return the complete program text,
    /// covering every fragment accepted so far plus all loaded archives.
    pub fn compile(&self, file: &File) -> CompileResult<String> {
        let mut state = self.state.lock();
        state.compile(file)
    }

    /// Snapshot the session's package as a framed archive. `export_data`
    /// is the Oracle's serialized export information, opaque here.
    pub fn archive(&self, export_data: Vec<u8>) -> CompileResult<Vec<u8>> {
        let state = self.state.lock();
        let archive = Archive::from_package(state.package.clone(), export_data);
        Ok(archive.encode()?)
    }

    /// Host access to the Oracle between fragments (population, escape and
    /// blocking marks). Runs under the session guard.
    pub fn with_oracle<R>(&self, f: impl FnOnce(&mut Oracle) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state.oracle)
    }
}

impl<C: Checker> State<C> {
    fn compile(&mut self, file: &File) -> CompileResult<String> {
        // Name restrictions come first: nothing below may run for a
        // fragment that would shadow a predeclared identifier, or the
        // checker's scope would be corrupted for every later fragment.
        for name in declared_names(file) {
            if prelude::is_reserved_identifier(name) {
                return Err(CompileError::IdentifierRestriction { name: name.to_string() });
            }
        }

        for decl in &file.decls {
            if let AstDecl::Import(spec) = decl {
                if !self.archive_paths.contains_key(&spec.path) {
                    return Err(CompileError::ImportResolution { path: spec.path.clone() });
                }
            }
        }

        // Redefinition: drop the old scope entry so the checker binds a
        // fresh object. Old declarations stay emitted; the new assignment
        // runs later and wins.
        let mut retracted: Vec<(String, gale_types::ObjectId)> = Vec::new();
        for name in declared_names(file) {
            if let Some(obj) = self.oracle.retract(&self.import_path, name) {
                retracted.push((name.to_string(), obj));
            }
        }

        let errors = self.checker.check(file, &mut self.oracle);
        if !errors.is_empty() {
            // The rejected fragment must not cost an accepted binding:
            // undo whatever the failed check bound, then put the old
            // objects back.
            for name in declared_names(file) {
                self.oracle.retract(&self.import_path, name);
            }
            for (name, obj) in retracted {
                self.oracle.restore(&self.import_path, &name, obj);
            }
            return Err(CompileError::from_type_errors(errors));
        }

        let mut builder = PackageBuilder::new(&self.oracle, &mut self.scope);
        builder.build_file(file);
        let fragment = builder.finish(&self.pkg_name, self.minify);
        for path in fragment.imports {
            if !self.package.imports.contains(&path) {
                self.package.imports.push(path);
            }
        }
        self.package.decls.extend(fragment.decls);

        Ok(self.write())
    }

    fn write(&self) -> String {
        let mut packages: Vec<Package> =
            self.archives.iter().map(|a| a.clone().into_package()).collect();
        packages.push(self.package.clone());
        let entry = self
            .oracle
            .lookup(&self.import_path, "main")
            .map(|_| self.import_path.as_str());
        program::write_program(&packages, entry)
    }

    /// Mark an archive's blocking declarations in the Oracle, declaring
    /// their objects if the checker has not seen them yet.
    fn absorb_blocking(&mut self, archive: &Archive) {
        for decl in archive.blocking_decls() {
            for key in &decl.keys {
                let DepKey::Object { pkg, name } = key else { continue };
                let obj = match self.oracle.lookup(pkg, name) {
                    Some(obj) => obj,
                    None => self.oracle.declare(pkg, name, ObjectKind::Func),
                };
                self.oracle.mark_blocking(obj);
            }
        }
    }
}

/// Package-level names a fragment introduces: type, var, and plain
/// function declarations, plus `:=` targets of bare statements. Methods
/// attach to an existing type and do not bind a package-level name.
fn declared_names(file: &File) -> impl Iterator<Item = &str> {
    file.decls.iter().flat_map(|decl| {
        let names: Vec<&str> = match decl {
            AstDecl::Func(f) if f.recv.is_none() => vec![f.name.name.as_str()],
            AstDecl::Var(spec) => spec.names.iter().map(|n| n.name.as_str()).collect(),
            AstDecl::Type(spec) => vec![spec.name.name.as_str()],
            AstDecl::Stmt(Stmt::Assign(assign)) if assign.define => assign
                .lhs
                .iter()
                .filter_map(|e| match e {
                    Expr::Ident(id) if !id.is_blank() => Some(id.name.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        names
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gale_ast::{Ident, NodeId, VarSpec};

    fn ident(id: u32, name: &str) -> Ident {
        Ident { id: NodeId(id), name: name.to_string() }
    }

    fn accepting_checker() -> impl Checker {
        |_: &File, _: &mut Oracle| Vec::<String>::new()
    }

    #[test]
    fn reserved_name_rejected_before_checking() {
        let mut checked = false;
        let session = Session::new("main", "main", false, |_: &File, _: &mut Oracle| {
            checked = true;
            Vec::<String>::new()
        });
        let file = File {
            package_name: "main".into(),
            decls: vec![AstDecl::Var(VarSpec {
                names: vec![ident(1, "len")],
                values: Vec::new(),
            })],
        };
        let err = session.compile(&file).unwrap_err();
        assert!(matches!(
            err,
            CompileError::IdentifierRestriction { ref name } if name == "len"
        ));
        drop(session);
        assert!(!checked);
    }

    #[test]
    fn unknown_import_surfaces_first_path() {
        let session = Session::new("main", "main", false, accepting_checker());
        let file = File {
            package_name: "main".into(),
            decls: vec![
                AstDecl::Import(gale_ast::ImportSpec { path: "missing/a".into(), alias: None }),
                AstDecl::Import(gale_ast::ImportSpec { path: "missing/b".into(), alias: None }),
            ],
        };
        let err = session.compile(&file).unwrap_err();
        assert!(matches!(
            err,
            CompileError::ImportResolution { ref path } if path == "missing/a"
        ));
    }

    #[test]
    fn type_errors_capped() {
        let session = Session::new("main", "main", false, |_: &File, _: &mut Oracle| {
            (0..25).map(|i| format!("error {i}")).collect()
        });
        let file = File { package_name: "main".into(), decls: Vec::new() };
        match session.compile(&file).unwrap_err() {
            CompileError::TypeCheck { errors, truncated } => {
                assert_eq!(errors.len(), crate::error::MAX_TYPE_ERRORS);
                assert!(truncated);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_fragment_emits_package_shell() {
        let session = Session::new("main", "main", false, accepting_checker());
        let file = File { package_name: "main".into(), decls: Vec::new() };
        let out = session.compile(&file).unwrap();
        assert!(out.starts_with("\"use strict\";\n"));
        assert!(out.contains("$packages[\"main\"] = (function() {"));
        // No main function declared, so nothing to invoke.
        assert!(!out.contains("$run("));
    }

    #[test]
    fn redefinition_retracts_old_object() {
        let session = Session::new("main", "main", false, |file: &File, oracle: &mut Oracle| {
            for decl in &file.decls {
                if let AstDecl::Var(spec) = decl {
                    for n in &spec.names {
                        let obj = oracle.declare("main", &n.name, ObjectKind::Var);
                        let int = oracle.types.basic(gale_types::BasicKind::Int);
                        oracle.bind_use(n.id, obj);
                        oracle.bind_type(n.id, int);
                    }
                }
            }
            Vec::<String>::new()
        });
        let fragment = |id: u32| File {
            package_name: "main".into(),
            decls: vec![AstDecl::Var(VarSpec {
                names: vec![ident(id, "x")],
                values: Vec::new(),
            })],
        };
        session.compile(&fragment(1)).unwrap();
        session.compile(&fragment(2)).unwrap();
        // Two distinct objects, the scope maps the name to the newer one.
        session.with_oracle(|oracle| {
            let current = oracle.lookup("main", "x").unwrap();
            assert_eq!(oracle.object(current).name, "x");
        });
    }

    #[test]
    fn rejected_redefinition_keeps_previous_binding() {
        let mut calls = 0;
        let session =
            Session::new("main", "main", false, move |file: &File, oracle: &mut Oracle| {
                calls += 1;
                if calls > 1 {
                    return vec!["cannot use \"y\" (untyped string) as int".to_string()];
                }
                for decl in &file.decls {
                    if let AstDecl::Var(spec) = decl {
                        for n in &spec.names {
                            let obj = oracle.declare("main", &n.name, ObjectKind::Var);
                            let int = oracle.types.basic(gale_types::BasicKind::Int);
                            oracle.bind_use(n.id, obj);
                            oracle.bind_type(n.id, int);
                        }
                    }
                }
                Vec::<String>::new()
            });
        let fragment = |id: u32| File {
            package_name: "main".into(),
            decls: vec![AstDecl::Var(VarSpec {
                names: vec![ident(id, "x")],
                values: Vec::new(),
            })],
        };
        session.compile(&fragment(1)).unwrap();
        let accepted = session.with_oracle(|oracle| oracle.lookup("main", "x").unwrap());
        let err = session.compile(&fragment(2)).unwrap_err();
        assert!(matches!(err, CompileError::TypeCheck { .. }));
        // The accepted object, not None and not a half-checked fresh one.
        session.with_oracle(|oracle| {
            assert_eq!(oracle.lookup("main", "x"), Some(accepted));
        });
    }

    #[test]
    fn loaded_archive_feeds_blocking_marks() {
        use crate::decls::Decl;

        let dep = Package {
            import_path: "sync/ops".into(),
            pkg_name: "ops".into(),
            decls: vec![Decl {
                keys: vec![DepKey::object("sync/ops", "Wait")],
                exported: true,
                blocking: true,
                decl_code: "$pkg.Wait = function() {\n};\n".into(),
                ..Decl::default()
            }],
            ..Package::default()
        };
        let data = Archive::from_package(dep, Vec::new()).encode().unwrap();

        let session = Session::new("main", "main", false, accepting_checker());
        session.load_archive(&data).unwrap();
        session.with_oracle(|oracle| {
            let obj = oracle.lookup("sync/ops", "Wait").unwrap();
            assert!(oracle.is_blocking_object(obj));
        });

        let file = File { package_name: "main".into(), decls: Vec::new() };
        let out = session.compile(&file).unwrap();
        assert!(out.contains("$packages[\"sync/ops\"] = (function() {"));
    }
}
