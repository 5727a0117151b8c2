//! Type representation and interning
//!
//! Types are interned in a `TypeStore` so that structurally identical types
//! share one `TypeId`. Interning doubles as the deduplication the
//! anonymous-type emitter relies on: two unnamed composite types are the
//! same descriptor exactly when they intern to the same id.

use crate::object::ObjectId;
use rustc_hash::FxHashMap;

/// Interned type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn new(id: u32) -> Self {
        TypeId(id)
    }
}

/// Basic (non-composite) kinds, including the untyped constant kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    /// Kinds represented as a (high, low) pair in the target.
    pub fn is_64bit(&self) -> bool {
        matches!(self, BasicKind::Int64 | BasicKind::Uint64)
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    /// Bit width for sized integer kinds; `None` for everything else.
    /// `int`, `uint`, and `uintptr` are 32-bit in the target representation.
    pub fn bits(&self) -> Option<u32> {
        match self {
            BasicKind::Int8 | BasicKind::Uint8 => Some(8),
            BasicKind::Int16 | BasicKind::Uint16 => Some(16),
            BasicKind::Int | BasicKind::Int32 | BasicKind::Uint | BasicKind::Uint32
            | BasicKind::Uintptr => Some(32),
            BasicKind::Int64 | BasicKind::Uint64 => Some(64),
            _ => None,
        }
    }
}

/// Channel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    SendOnly,
    RecvOnly,
}

/// One struct field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    pub embedded: bool,
}

/// Type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(BasicKind),

    /// A declared named type. Distinct named types with identical
    /// underlying structure stay distinct (the object is part of identity).
    Named { obj: ObjectId, underlying: TypeId },

    Array { elem: TypeId, len: u64 },
    Slice { elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Chan { elem: TypeId, dir: ChanDir },
    Pointer { elem: TypeId },

    Signature {
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        variadic: bool,
    },

    /// Method set (name, signature), sorted by name by the checker.
    Interface { methods: Vec<(String, TypeId)> },

    Struct { fields: Vec<StructField> },

    /// Multi-value (call results, map lookup with ok, ...)
    Tuple(Vec<TypeId>),
}

impl Type {
    pub fn basic(&self) -> Option<BasicKind> {
        match self {
            Type::Basic(k) => Some(*k),
            _ => None,
        }
    }
}

/// Interning store for all types in a session
///
/// Identical types get the same `TypeId`, enabling cheap equality and the
/// structural deduplication of anonymous composite types.
#[derive(Debug, Clone)]
pub struct TypeStore {
    types: Vec<Type>,
    type_to_id: FxHashMap<Type, TypeId>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = TypeStore {
            types: Vec::new(),
            type_to_id: FxHashMap::default(),
        };

        // Pre-intern every basic kind so `basic()` is a pure lookup.
        for kind in [
            BasicKind::Bool,
            BasicKind::Int,
            BasicKind::Int8,
            BasicKind::Int16,
            BasicKind::Int32,
            BasicKind::Int64,
            BasicKind::Uint,
            BasicKind::Uint8,
            BasicKind::Uint16,
            BasicKind::Uint32,
            BasicKind::Uint64,
            BasicKind::Uintptr,
            BasicKind::Float32,
            BasicKind::Float64,
            BasicKind::String,
            BasicKind::UntypedBool,
            BasicKind::UntypedInt,
            BasicKind::UntypedRune,
            BasicKind::UntypedFloat,
            BasicKind::UntypedString,
            BasicKind::UntypedNil,
        ] {
            store.intern(Type::Basic(kind));
        }

        store
    }

    /// Intern a type, returning its id. Identical types return the same id.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.type_to_id.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.type_to_id.insert(ty, id);
        id
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        self.type_to_id[&Type::Basic(kind)]
    }

    /// Look up a type by id.
    ///
    /// # Panics
    ///
    /// An invalid id is an internal compiler bug.
    pub fn get(&self, id: TypeId) -> &Type {
        self.types
            .get(id.0 as usize)
            .unwrap_or_else(|| panic!("gale: invalid TypeId {:?}", id))
    }

    /// Resolve a named type to its underlying structure; other types are
    /// their own underlying.
    pub fn underlying(&self, id: TypeId) -> &Type {
        match self.get(id) {
            Type::Named { underlying, .. } => self.get(*underlying),
            ty => ty,
        }
    }

    /// Id of the underlying type.
    pub fn underlying_id(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Named { underlying, .. } => *underlying,
            _ => id,
        }
    }

    /// Whether values of the type copy on assignment (arrays and structs).
    pub fn is_value_composite(&self, id: TypeId) -> bool {
        matches!(
            self.underlying(id),
            Type::Array { .. } | Type::Struct { .. }
        )
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(self.underlying(id), Type::Interface { .. })
    }

    /// Convenience constructors used heavily by the tests and the session.
    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Slice { elem })
    }

    pub fn array_of(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.intern(Type::Array { elem, len })
    }

    pub fn map_of(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(Type::Map { key, value })
    }

    pub fn chan_of(&mut self, elem: TypeId, dir: ChanDir) -> TypeId {
        self.intern(Type::Chan { elem, dir })
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Pointer { elem })
    }

    pub fn tuple_of(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.intern(Type::Tuple(elems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_structural_types() {
        let mut store = TypeStore::new();
        let int = store.basic(BasicKind::Int);
        let a = store.slice_of(int);
        let b = store.slice_of(int);
        assert_eq!(a, b);

        let s1 = store.intern(Type::Struct {
            fields: vec![StructField { name: "x".into(), ty: int, embedded: false }],
        });
        let s2 = store.intern(Type::Struct {
            fields: vec![StructField { name: "x".into(), ty: int, embedded: false }],
        });
        assert_eq!(s1, s2);
    }

    #[test]
    fn underlying_resolves_named() {
        let mut store = TypeStore::new();
        let int = store.basic(BasicKind::Int);
        let named = store.intern(Type::Named {
            obj: crate::object::ObjectId(0),
            underlying: int,
        });
        assert!(matches!(store.underlying(named), Type::Basic(BasicKind::Int)));
    }
}
