//! Whole-program JavaScript assembly.
//!
//! Takes the translated packages in dependency order and concatenates
//! their live declarations into a single script. Each package becomes an
//! IIFE that populates `$packages["<import path>"]`; the runtime prelude
//! is assumed to be loaded ahead of the emitted text. Dead-code
//! elimination runs over the combined declaration set so that a call
//! from one package keeps its target alive in another.

use crate::decls::{select_alive, Decl, Package};
use crate::prelude;

/// Assemble the final script from `packages`, which must be ordered so
/// that every package appears after its imports. When `entry` names a
/// package, its `main` function is invoked on a fresh goroutine at the
/// end of the script.
pub fn write_program(packages: &[Package], entry: Option<&str>) -> String {
    let per_package = select_per_package(packages);

    let mut out = String::new();
    out.push_str("\"use strict\";\n");
    for (pkg, selected) in packages.iter().zip(&per_package) {
        write_package(&mut out, pkg, selected);
    }
    if let Some(path) = entry {
        out.push_str(&format!(
            "{}({}[\"{}\"].main);\n",
            prelude::RUN,
            prelude::PACKAGES,
            path
        ));
    }
    out
}

/// Run liveness over all packages at once and split the result back per
/// package. Selection within a package keeps declaration order.
fn select_per_package(packages: &[Package]) -> Vec<Vec<usize>> {
    let mut combined: Vec<Decl> = Vec::new();
    let mut offsets = Vec::with_capacity(packages.len());
    for pkg in packages {
        offsets.push(combined.len());
        combined.extend(pkg.decls.iter().cloned());
    }

    let mut per_package: Vec<Vec<usize>> = vec![Vec::new(); packages.len()];
    let mut selected = select_alive(&combined);
    selected.sort_unstable();
    for global in selected {
        let pkg_idx = match offsets.binary_search(&global) {
            Ok(i) => {
                // An offset can repeat when a package is empty; take the
                // last package starting here.
                let mut i = i;
                while i + 1 < offsets.len() && offsets[i + 1] == global {
                    i += 1;
                }
                i
            }
            Err(i) => i - 1,
        };
        per_package[pkg_idx].push(global - offsets[pkg_idx]);
    }
    per_package
}

fn write_package(out: &mut String, pkg: &Package, selected: &[usize]) {
    let tab = if pkg.minified { "" } else { "\t" };
    out.push_str(&format!(
        "{}[\"{}\"] = (function() {{\n",
        prelude::PACKAGES,
        pkg.import_path
    ));
    out.push_str(&format!("{tab}var $pkg = {{}};\n"));
    let phases: [fn(&Decl) -> &str; 4] = [
        |d| &d.decl_code,
        |d| &d.type_init_code,
        |d| &d.method_code,
        |d| &d.init_code,
    ];
    for phase in phases {
        for &i in selected {
            out.push_str(phase(&pkg.decls[i]));
        }
    }
    out.push_str(&format!("{tab}return $pkg;\n}})();\n"));
}
