//! Type descriptor emission
//!
//! Every composite type the generated program inspects at run time needs a
//! descriptor. Named types get one through their declaration (two-phase:
//! `$newType` up front, `.init(...)` once every referenced descriptor
//! exists — the deferred constructor that makes self-referential types
//! work). Unnamed composites are deduplicated by structural identity (one
//! registry node per distinct `TypeId`) and emitted in post-order DFS so a
//! descriptor never precedes a non-cyclic child it contains.

use crate::lower::PackageScope;
use crate::prelude;
use gale_types::{ChanDir, ObjectId, Oracle, Type, TypeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// Registry of anonymous composite types referenced by the current package.
#[derive(Debug, Default)]
pub struct AnonTypes {
    names: FxHashMap<TypeId, String>,
    order: Vec<TypeId>,
    emitted: FxHashSet<TypeId>,
    counter: u32,
}

impl AnonTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the descriptor variable for an anonymous composite,
    /// registering it on first reference. Structural interning guarantees
    /// one node per distinct structure.
    pub fn name_for(&mut self, ty: TypeId) -> String {
        if let Some(name) = self.names.get(&ty) {
            return name.clone();
        }
        let name = format!("anonType${}", self.counter);
        self.counter += 1;
        self.names.insert(ty, name.clone());
        self.order.push(ty);
        name
    }

    /// Registered-but-unemitted nodes, in discovery order.
    fn pending(&self) -> Vec<TypeId> {
        self.order
            .iter()
            .copied()
            .filter(|t| !self.emitted.contains(t))
            .collect()
    }
}

/// Result of one emission pass.
#[derive(Debug, Default)]
pub struct AnonEmission {
    /// Descriptor initialization statements, children first.
    pub code: String,
    /// Patch statements for cyclic constructor slots, to run after `code`.
    pub patch_code: String,
    /// Variable names declared by this pass.
    pub names: Vec<String>,
}

/// Emit every registered-but-unemitted anonymous descriptor, post-order.
/// Nodes already emitted in a previous pass are never revisited; the
/// visited bookkeeping persists in the registry across passes.
pub fn emit_anon_types(oracle: &Oracle, scope: &mut PackageScope) -> AnonEmission {
    let mut emission = AnonEmission::default();
    let mut in_progress = FxHashSet::default();
    // The pending list can grow while emitting (a descriptor expression may
    // register children), so loop until a pass discovers nothing new.
    loop {
        let pending = scope.anon.pending();
        if pending.is_empty() {
            break;
        }
        for ty in pending {
            visit(ty, oracle, scope, &mut in_progress, &mut emission);
        }
    }
    emission
}

fn visit(
    ty: TypeId,
    oracle: &Oracle,
    scope: &mut PackageScope,
    in_progress: &mut FxHashSet<TypeId>,
    emission: &mut AnonEmission,
) {
    if scope.anon.emitted.contains(&ty) {
        return;
    }
    if !in_progress.insert(ty) {
        // Cycle: the caller emits a deferred slot and patches it below.
        return;
    }
    for child in anon_children(oracle, ty) {
        scope.anon.name_for(child);
        visit(child, oracle, scope, in_progress, emission);
    }
    let name = scope.anon.name_for(ty);
    let expr = descriptor_expr(oracle, scope, ty, Some((in_progress, &name, emission)));
    emission.code.push_str(&format!("{} = {};\n", name, expr));
    emission.names.push(name);
    in_progress.remove(&ty);
    scope.anon.emitted.insert(ty);
}

/// Child edges: every nested type that is itself an unnamed composite.
/// Basic and named nested types are leaves (named descriptors exist from
/// their own declarations before any anonymous init runs).
fn anon_children(oracle: &Oracle, ty: TypeId) -> Vec<TypeId> {
    let mut children = Vec::new();
    let mut push = |t: TypeId| {
        if matches!(
            oracle.types.get(t),
            Type::Basic(_) | Type::Named { .. } | Type::Tuple(_)
        ) {
            return;
        }
        children.push(t);
    };
    match oracle.types.get(ty) {
        Type::Array { elem, .. } | Type::Slice { elem } | Type::Chan { elem, .. }
        | Type::Pointer { elem } => push(*elem),
        Type::Map { key, value } => {
            push(*key);
            push(*value);
        }
        Type::Signature { params, results, .. } => {
            for t in params.iter().chain(results.iter()) {
                push(*t);
            }
        }
        Type::Interface { methods } => {
            for (_, sig) in methods {
                push(*sig);
            }
        }
        Type::Struct { fields } => {
            for f in fields {
                push(f.ty);
            }
        }
        Type::Basic(_) | Type::Named { .. } | Type::Tuple(_) => {}
    }
    children
}

/// Reference text for a child slot inside a descriptor expression.
fn child_ref(
    oracle: &Oracle,
    scope: &mut PackageScope,
    ty: TypeId,
    cycle: Option<(&FxHashSet<TypeId>, &str, &mut AnonEmission)>,
) -> String {
    match oracle.types.get(ty) {
        Type::Basic(kind) => prelude::basic_type_name(*kind).to_string(),
        Type::Named { obj, .. } => scope.object_name(oracle, *obj),
        _ => {
            let name = scope.anon.name_for(ty);
            if let Some((in_progress, parent, emission)) = cycle {
                if in_progress.contains(&ty) {
                    // Deferred constructor slot: reference patched in once
                    // the child exists.
                    emission.patch_code.push_str(&format!(
                        "{}({}, {});\n",
                        prelude::PATCH_TYPE,
                        parent,
                        name
                    ));
                    return "null".to_string();
                }
            }
            name
        }
    }
}

/// The constructor expression for a composite type's descriptor.
///
/// Also used for a named type's `.init` argument, in which case `cycle`
/// is `None` (two-phase named init needs no patching).
pub fn descriptor_expr(
    oracle: &Oracle,
    scope: &mut PackageScope,
    ty: TypeId,
    mut cycle: Option<(&FxHashSet<TypeId>, &str, &mut AnonEmission)>,
) -> String {
    let mut slot = |scope: &mut PackageScope, t: TypeId| {
        let c = match &mut cycle {
            Some((ip, parent, emission)) => Some((&**ip, &**parent, &mut **emission)),
            None => None,
        };
        child_ref(oracle, scope, t, c)
    };
    match oracle.types.get(ty).clone() {
        Type::Basic(kind) => prelude::basic_type_name(kind).to_string(),
        Type::Named { obj, .. } => scope.object_name(oracle, obj),
        Type::Array { elem, len } => {
            format!("{}({}, {})", prelude::ARRAY_TYPE, slot(scope, elem), len)
        }
        Type::Slice { elem } => format!("{}({})", prelude::SLICE_TYPE, slot(scope, elem)),
        Type::Map { key, value } => {
            let k = slot(scope, key);
            let v = slot(scope, value);
            format!("{}({}, {})", prelude::MAP_TYPE, k, v)
        }
        Type::Chan { elem, dir } => {
            let (send, recv) = match dir {
                ChanDir::Both => (true, true),
                ChanDir::SendOnly => (true, false),
                ChanDir::RecvOnly => (false, true),
            };
            format!("{}({}, {}, {})", prelude::CHAN_TYPE, slot(scope, elem), send, recv)
        }
        Type::Pointer { elem } => format!("{}({})", prelude::PTR_TYPE, slot(scope, elem)),
        Type::Signature { params, results, variadic } => {
            let params: Vec<String> = params.iter().map(|t| slot(scope, *t)).collect();
            let results: Vec<String> = results.iter().map(|t| slot(scope, *t)).collect();
            format!(
                "{}([{}], [{}], {})",
                prelude::FUNC_TYPE,
                params.join(", "),
                results.join(", "),
                variadic
            )
        }
        Type::Interface { methods } => {
            let entries: Vec<String> = methods
                .iter()
                .map(|(name, sig)| format!("[\"{}\", {}]", name, slot(scope, *sig)))
                .collect();
            format!("{}([{}])", prelude::IFACE_TYPE, entries.join(", "))
        }
        Type::Struct { fields } => {
            let entries: Vec<String> = fields
                .iter()
                .map(|f| {
                    format!("[\"{}\", {}, {}]", f.name, slot(scope, f.ty), f.embedded)
                })
                .collect();
            format!("{}([{}])", prelude::STRUCT_TYPE, entries.join(", "))
        }
        Type::Tuple(_) => panic!("gale: tuple types have no descriptor"),
    }
}

/// Source-language kind string for a named type's `$newType` call.
pub fn kind_str(oracle: &Oracle, underlying: TypeId) -> &'static str {
    match oracle.types.get(underlying) {
        Type::Basic(_) => "basic",
        Type::Array { .. } => "array",
        Type::Slice { .. } => "slice",
        Type::Map { .. } => "map",
        Type::Chan { .. } => "chan",
        Type::Pointer { .. } => "ptr",
        Type::Signature { .. } => "func",
        Type::Interface { .. } => "interface",
        Type::Struct { .. } => "struct",
        Type::Named { .. } | Type::Tuple(_) => panic!("gale: not an underlying type"),
    }
}

/// Named objects structurally reachable from a type, for dependency
/// recording: a declaration referencing `[]T` depends on `T` even though
/// the slice descriptor itself is keyless.
pub fn named_objects_in(oracle: &Oracle, ty: TypeId, out: &mut Vec<ObjectId>) {
    let mut seen = FxHashSet::default();
    collect_named(oracle, ty, out, &mut seen);
}

fn collect_named(
    oracle: &Oracle,
    ty: TypeId,
    out: &mut Vec<ObjectId>,
    seen: &mut FxHashSet<TypeId>,
) {
    if !seen.insert(ty) {
        return;
    }
    match oracle.types.get(ty) {
        Type::Basic(_) => {}
        Type::Named { obj, .. } => out.push(*obj),
        Type::Array { elem, .. } | Type::Slice { elem } | Type::Chan { elem, .. }
        | Type::Pointer { elem } => collect_named(oracle, *elem, out, seen),
        Type::Map { key, value } => {
            collect_named(oracle, *key, out, seen);
            collect_named(oracle, *value, out, seen);
        }
        Type::Signature { params, results, .. } => {
            for t in params.iter().chain(results.iter()) {
                collect_named(oracle, *t, out, seen);
            }
        }
        Type::Interface { methods } => {
            for (_, sig) in methods {
                collect_named(oracle, *sig, out, seen);
            }
        }
        Type::Struct { fields } => {
            for f in fields {
                collect_named(oracle, f.ty, out, seen);
            }
        }
        Type::Tuple(elems) => {
            for t in elems {
                collect_named(oracle, *t, out, seen);
            }
        }
    }
}
