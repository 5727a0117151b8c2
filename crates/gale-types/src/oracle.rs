//! Type Oracle tables
//!
//! The external type checker populates these tables per checked fragment;
//! the lowering passes only read them. Missing information for a queried
//! node is an internal compiler bug and panics loudly rather than being
//! papered over.

use crate::constant::ConstValue;
use crate::object::{Object, ObjectId, ObjectKind};
use crate::ty::{TypeId, TypeStore};
use gale_ast::{File, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};

/// How a selector expression resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Field,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub kind: SelectionKind,
    pub obj: ObjectId,
}

/// The incremental checking entry point (external collaborator).
///
/// `check` type-checks one fragment, advances the incremental scope state
/// inside `oracle`, and returns the type errors found (verbatim, in source
/// order). An empty result means the fragment is well typed.
pub trait Checker {
    fn check(&mut self, file: &File, oracle: &mut Oracle) -> Vec<String>;
}

impl<F> Checker for F
where
    F: FnMut(&File, &mut Oracle) -> Vec<String>,
{
    fn check(&mut self, file: &File, oracle: &mut Oracle) -> Vec<String> {
        self(file, oracle)
    }
}

/// Per-node type, object, constant, and selection answers, plus the
/// externally computed blocking and escape analyses.
#[derive(Debug, Clone, Default)]
pub struct Oracle {
    pub types: TypeStore,
    objects: Vec<Object>,
    /// Package-level name -> object, for incremental redefinition.
    scope: FxHashMap<(String, String), ObjectId>,

    expr_types: FxHashMap<NodeId, TypeId>,
    consts: FxHashMap<NodeId, ConstValue>,
    uses: FxHashMap<NodeId, ObjectId>,
    selections: FxHashMap<NodeId, Selection>,

    /// Package var initialization order (dependency order, checker-supplied).
    init_order: Vec<ObjectId>,

    /// Functions that may suspend (transitively reach a channel operation).
    blocking_objects: FxHashSet<ObjectId>,
    /// Call sites the blocking analysis marked as suspending.
    blocking_calls: FxHashSet<NodeId>,
    /// Variables whose address escapes (boxed in the target).
    escaping: FxHashSet<ObjectId>,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Population (checker side)
    // ------------------------------------------------------------------

    pub fn add_object(&mut self, obj: Object) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        if obj.package_level {
            self.scope.insert((obj.pkg.clone(), obj.name.clone()), id);
        }
        self.objects.push(obj);
        id
    }

    pub fn bind_type(&mut self, node: NodeId, ty: TypeId) {
        self.expr_types.insert(node, ty);
    }

    pub fn bind_const(&mut self, node: NodeId, value: ConstValue) {
        self.consts.insert(node, value);
    }

    pub fn bind_use(&mut self, node: NodeId, obj: ObjectId) {
        self.uses.insert(node, obj);
    }

    pub fn bind_selection(&mut self, node: NodeId, sel: Selection) {
        self.selections.insert(node, sel);
    }

    pub fn set_init_order(&mut self, order: Vec<ObjectId>) {
        self.init_order = order;
    }

    pub fn mark_blocking(&mut self, obj: ObjectId) {
        self.blocking_objects.insert(obj);
    }

    pub fn mark_blocking_call(&mut self, node: NodeId) {
        self.blocking_calls.insert(node);
    }

    pub fn mark_escaping(&mut self, obj: ObjectId) {
        self.escaping.insert(obj);
    }

    // ------------------------------------------------------------------
    // Queries (compiler side)
    // ------------------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> &Object {
        self.objects
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("gale: invalid ObjectId {:?}", id))
    }

    /// Type of an expression node.
    ///
    /// # Panics
    ///
    /// Missing type information is an internal compiler bug.
    pub fn type_of(&self, node: NodeId) -> TypeId {
        *self
            .expr_types
            .get(&node)
            .unwrap_or_else(|| panic!("gale: no type recorded for node {:?}", node))
    }

    pub fn try_type_of(&self, node: NodeId) -> Option<TypeId> {
        self.expr_types.get(&node).copied()
    }

    /// Evaluated constant value, if the node is a compile-time constant.
    pub fn const_of(&self, node: NodeId) -> Option<&ConstValue> {
        self.consts.get(&node)
    }

    /// Object an identifier resolved to.
    ///
    /// # Panics
    ///
    /// Missing resolution is an internal compiler bug.
    pub fn object_of(&self, node: NodeId) -> ObjectId {
        *self
            .uses
            .get(&node)
            .unwrap_or_else(|| panic!("gale: no object recorded for node {:?}", node))
    }

    pub fn try_object_of(&self, node: NodeId) -> Option<ObjectId> {
        self.uses.get(&node).copied()
    }

    pub fn selection_of(&self, node: NodeId) -> Selection {
        *self
            .selections
            .get(&node)
            .unwrap_or_else(|| panic!("gale: no selection recorded for node {:?}", node))
    }

    pub fn try_selection_of(&self, node: NodeId) -> Option<Selection> {
        self.selections.get(&node).copied()
    }

    pub fn init_order(&self) -> &[ObjectId] {
        &self.init_order
    }

    pub fn is_blocking_object(&self, obj: ObjectId) -> bool {
        self.blocking_objects.contains(&obj)
    }

    pub fn is_blocking_call(&self, node: NodeId) -> bool {
        self.blocking_calls.contains(&node)
    }

    pub fn escapes(&self, obj: ObjectId) -> bool {
        self.escaping.contains(&obj)
    }

    // ------------------------------------------------------------------
    // Incremental scope management
    // ------------------------------------------------------------------

    /// Package-level lookup.
    pub fn lookup(&self, pkg: &str, name: &str) -> Option<ObjectId> {
        self.scope.get(&(pkg.to_string(), name.to_string())).copied()
    }

    /// Retract a package-level declaration so the name can be redeclared.
    /// Returns the retracted object, if any. Existing bindings to the old
    /// object stay valid (ids are never reused), only the scope entry goes.
    pub fn retract(&mut self, pkg: &str, name: &str) -> Option<ObjectId> {
        self.scope.remove(&(pkg.to_string(), name.to_string()))
    }

    /// Reinstate a retracted binding, overwriting whatever the name maps
    /// to now. Used when the fragment that would have replaced it is
    /// rejected.
    pub fn restore(&mut self, pkg: &str, name: &str, obj: ObjectId) {
        self.scope.insert((pkg.to_string(), name.to_string()), obj);
    }

    /// Convenience for tests and hosts: declare a fresh package-level var.
    pub fn declare(&mut self, pkg: &str, name: &str, kind: ObjectKind) -> ObjectId {
        self.add_object(Object {
            pkg: pkg.to_string(),
            name: name.to_string(),
            kind,
            package_level: true,
        })
    }
}
