//! Declared objects (the checker's symbol table entries)

/// Identity of a declared object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl ObjectId {
    pub fn new(id: u32) -> Self {
        ObjectId(id)
    }
}

/// Built-in functions resolved by the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Len,
    Cap,
    Append,
    Copy,
    Delete,
    Make,
    New,
    Close,
    Panic,
    Recover,
    Print,
    Println,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Var,
    Func,
    TypeName,
    Const,
    Builtin(Builtin),
    /// An imported package name; `path` is the import path.
    PkgName { path: String },
}

/// One declared object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Object {
    /// Import path of the declaring package; empty for universe scope.
    pub pkg: String,
    pub name: String,
    pub kind: ObjectKind,
    /// Whether the object is package-level (as opposed to function-local).
    pub package_level: bool,
}

impl Object {
    pub fn exported(&self) -> bool {
        self.package_level && crate::is_exported(&self.name)
    }
}
