//! Gale Type System
//!
//! Type representation and interning, declared objects, constant values,
//! and the Type Oracle tables the lowering passes query. The actual type
//! checker is an external collaborator; it populates these tables and the
//! compiler only reads them (plus the incremental declare/retract surface).

pub mod constant;
pub mod object;
pub mod oracle;
pub mod ty;

pub use constant::ConstValue;
pub use object::{Builtin, Object, ObjectId, ObjectKind};
pub use oracle::{Checker, Oracle, Selection, SelectionKind};
pub use ty::{BasicKind, ChanDir, StructField, Type, TypeId, TypeStore};

/// Whether a declared name is exported (upper-case first letter).
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}
