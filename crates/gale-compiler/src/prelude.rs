//! Runtime prelude contract
//!
//! The generated program runs against a fixed library of `$`-prefixed
//! helper routines (bundled by the host, not produced here). The names
//! below are the complete contract between emitted code and that library.
//!
//! Concurrency contract: blocking primitives (`$send`, `$recv`, `$select`,
//! `$invoke`) take the flattened body closure as their last argument; when
//! they must block they park the current goroutine with that closure as its
//! continuation and the scheduler re-enters it after the matching
//! operation. The operation's result is read back from
//! `$curGoroutine.result` at the resumption point. `$curGoroutine.asleep`
//! is true while suspended, which is how a deferring function's `finally`
//! block distinguishes suspension from a real exit.

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

// Values and memory
pub const CLONE: &str = "$clone";
pub const COPY: &str = "$copy";
pub const COPY_SLICE: &str = "$copySlice";
pub const COPY_STRING: &str = "$copyString";
pub const ZERO: &str = "$zero";
pub const EQUAL: &str = "$equal";
pub const IFACE_IS_EQUAL: &str = "$interfaceIsEqual";
pub const PTR: &str = "$Ptr";
pub const IFACE: &str = "$iface";
pub const IFACE_NIL: &str = "$ifaceNil";
pub const NIL_SLICE: &str = "$nilSlice";

// Collections
pub const SLICE: &str = "$Slice";
pub const MAKE_SLICE: &str = "$makeSlice";
pub const SUBSLICE: &str = "$subslice";
pub const SUBSTRING: &str = "$substring";
pub const APPEND: &str = "$append";
pub const APPEND_SLICE: &str = "$appendSlice";
pub const INDEX_ARRAY: &str = "$indexArray";
pub const INDEX_SLICE: &str = "$indexSlice";
pub const INDEX_STRING: &str = "$indexString";
pub const SET_INDEX_ARRAY: &str = "$setIndexArray";
pub const SET_INDEX_SLICE: &str = "$setIndexSlice";
pub const MAKE_MAP: &str = "$makeMap";
pub const MAP_GET: &str = "$mapGet";
pub const MAP_LOOKUP: &str = "$mapLookup";
pub const MAP_SET: &str = "$mapSet";
pub const MAP_DELETE: &str = "$mapDelete";
pub const MAP_LEN: &str = "$mapLen";
pub const MAP_RANGE: &str = "$mapRange";

// Numerics
pub const IDIV: &str = "$idiv";
pub const IMOD: &str = "$imod";
pub const FROUND: &str = "$fround";
pub const TRUNC: &str = "$trunc";
pub const SHL: &str = "$shl";
pub const SHR: &str = "$shr";
pub const SHRU: &str = "$shru";
pub const INT64: &str = "$Int64";
pub const INT64_FROM: &str = "$int64";
pub const INT64_LOW: &str = "$int64Low";
pub const ADD64: &str = "$add64";
pub const SUB64: &str = "$sub64";
pub const MUL64: &str = "$mul64";
pub const DIV64: &str = "$div64";
pub const REM64: &str = "$rem64";
pub const AND64: &str = "$and64";
pub const OR64: &str = "$or64";
pub const XOR64: &str = "$xor64";
pub const ANDNOT64: &str = "$andnot64";
pub const SHL64: &str = "$shl64";
pub const SHR64: &str = "$shr64";
pub const NEG64: &str = "$neg64";
pub const NOT64: &str = "$not64";
pub const EQUAL64: &str = "$equal64";
pub const LESS64: &str = "$less64";

// Strings
pub const DECODE_RUNE: &str = "$decodeRune";
pub const RUNE_TO_STRING: &str = "$runeToString";
pub const STRING_TO_BYTES: &str = "$stringToBytes";
pub const BYTES_TO_STRING: &str = "$bytesToString";
pub const STRING_TO_RUNES: &str = "$stringToRunes";
pub const RUNES_TO_STRING: &str = "$runesToString";

// Scheduler
pub const GO: &str = "$go";
pub const SCHEDULE: &str = "$schedule";
pub const SEND: &str = "$send";
pub const RECV: &str = "$recv";
pub const SELECT: &str = "$select";
pub const INVOKE: &str = "$invoke";
pub const CHAN: &str = "$Chan";
pub const CLOSE: &str = "$close";
pub const CHAN_LEN: &str = "$chanLen";
pub const CHAN_CAP: &str = "$chanCap";
pub const CUR_GOROUTINE: &str = "$curGoroutine";
/// Select clause op kinds.
pub const OP_RECV: &str = "$RECV";
pub const OP_SEND: &str = "$SEND";

// Errors and defers
pub const PANIC: &str = "$panic";
pub const RECOVER: &str = "$recover";
pub const THROW: &str = "$throw";
pub const CALL_DEFERRED: &str = "$callDeferred";

// Type descriptors
pub const NEW_TYPE: &str = "$newType";
pub const ARRAY_TYPE: &str = "$arrayType";
pub const SLICE_TYPE: &str = "$sliceType";
pub const MAP_TYPE: &str = "$mapType";
pub const CHAN_TYPE: &str = "$chanType";
pub const PTR_TYPE: &str = "$ptrType";
pub const FUNC_TYPE: &str = "$funcType";
pub const IFACE_TYPE: &str = "$interfaceType";
pub const STRUCT_TYPE: &str = "$structType";
pub const PATCH_TYPE: &str = "$patchType";
pub const ASSERT_TYPE: &str = "$assertType";
pub const ASSERT_TYPE_OK: &str = "$assertTypeOk";
pub const TYPE_IS: &str = "$typeIs";

// Misc builtins
pub const NEW: &str = "$new";
pub const PRINT: &str = "$print";
pub const PRINTLN: &str = "$println";
pub const PACKAGES: &str = "$packages";
pub const RUN: &str = "$run";

/// Descriptor reference for a basic kind.
pub fn basic_type_name(kind: gale_types::BasicKind) -> &'static str {
    use gale_types::BasicKind::*;
    match kind {
        Bool | UntypedBool => "$Bool",
        Int | UntypedInt => "$Int",
        Int8 => "$Int8",
        Int16 => "$Int16",
        Int32 | UntypedRune => "$Int32",
        Int64 => "$Int64Kind",
        Uint => "$Uint",
        Uint8 => "$Uint8",
        Uint16 => "$Uint16",
        Uint32 => "$Uint32",
        Uint64 => "$Uint64Kind",
        Uintptr => "$Uintptr",
        Float32 => "$Float32",
        Float64 | UntypedFloat => "$Float64",
        String | UntypedString => "$String",
        UntypedNil => "$UnsafeNil",
    }
}

/// JavaScript keywords and prelude-owned names a generated identifier must
/// never collide with. Built once at startup, immutable.
pub static RESERVED_JS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "arguments", "await", "break", "case", "catch", "class", "const", "continue",
        "debugger", "default", "delete", "do", "else", "enum", "eval", "export",
        "extends", "false", "finally", "for", "function", "if", "implements", "import",
        "in", "instanceof", "interface", "let", "new", "null", "package", "private",
        "protected", "public", "return", "static", "super", "switch", "this", "throw",
        "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield",
    ]
    .into_iter()
    .collect()
});

/// Predeclared universe names of the source language. Fragments may not
/// redeclare these at the top level; rejecting them up front protects the
/// Oracle's incremental scope state.
pub static PREDECLARED: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "bool", "byte", "complex64", "complex128", "error", "float32", "float64",
        "int", "int8", "int16", "int32", "int64", "rune", "string",
        "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
        "true", "false", "iota", "nil",
        "append", "cap", "close", "copy", "delete", "len", "make", "new",
        "panic", "print", "println", "recover",
    ]
    .into_iter()
    .collect()
});

pub fn is_reserved_identifier(name: &str) -> bool {
    PREDECLARED.contains(name)
}
