//! Gale Compiler - Typed AST to JavaScript Source Generation
//!
//! This crate lowers the desugared, type-checked AST into JavaScript text
//! against a fixed `$`-prefixed runtime prelude. Functions containing a
//! suspension point (channel operation, select, blocking call, goto) are
//! flattened into a resumable dispatch loop; everything else emits direct
//! structured JavaScript. Declarations carry dependency keys so unused
//! code is dropped at program-assembly time, and compiled packages
//! serialize into framed archives for separate compilation.

pub mod analysis;
pub mod archive;
pub mod decls;
pub mod error;
pub mod lower;
pub mod prelude;
pub mod program;
pub mod session;
pub mod typedesc;

pub use archive::{Archive, ArchiveError};
pub use decls::{Decl, DepKey, Package, PackageBuilder, select_alive};
pub use error::{CompileError, CompileResult, MAX_TYPE_ERRORS};
pub use lower::{Expression, FuncContext, PackageScope};
pub use program::write_program;
pub use session::Session;

pub use gale_types::Checker;
