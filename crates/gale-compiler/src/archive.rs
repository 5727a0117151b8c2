//! Compiled package archives
//!
//! A compiled package caches as a framed binary blob: a fixed header
//! (magic, format version, CRC32 of the body) followed by the
//! JSON-serialized body. The body carries the lowered declarations with
//! their dependency keys, the import list, and the checker's opaque
//! export data, so a cached package links into later programs without
//! recompiling its source.

use crate::decls::{Decl, Package};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic number for archive files: "GALE"
pub const MAGIC: [u8; 4] = *b"GALE";

/// Current archive format version
pub const VERSION: u32 = 1;

/// Header size: magic (4) + version (u32) + checksum (u32)
const HEADER_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid archive magic: expected GALE, got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported archive version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    #[error("archive checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("archive truncated: {have} bytes, header needs {HEADER_LEN}")]
    Truncated { have: usize },

    #[error("archive body: {0}")]
    Body(#[from] serde_json::Error),
}

/// A compiled, cacheable package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub import_path: String,
    pub pkg_name: String,
    /// Import paths this package depends on, in resolution order.
    pub imports: Vec<String>,
    /// Opaque checker export data; the frontend consumes it when resolving
    /// imports of this package. The writer never looks inside.
    pub export_data: Vec<u8>,
    pub decls: Vec<Decl>,
    /// Whether the code blobs were emitted without indentation.
    pub minified: bool,
}

impl Archive {
    pub fn from_package(pkg: Package, export_data: Vec<u8>) -> Self {
        Self {
            import_path: pkg.import_path,
            pkg_name: pkg.pkg_name,
            imports: pkg.imports,
            export_data,
            decls: pkg.decls,
            minified: pkg.minified,
        }
    }

    /// Exported function keys whose bodies may suspend. Dependents consult
    /// this when deciding whether a call site forces flattening.
    pub fn blocking_decls(&self) -> impl Iterator<Item = &Decl> {
        self.decls.iter().filter(|d| d.blocking)
    }

    /// Encode to the framed binary format.
    pub fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        let body = serde_json::to_vec(self)?;
        let checksum = crc32fast::hash(&body);

        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode a framed archive, verifying magic, version, and checksum.
    pub fn decode(data: &[u8]) -> Result<Self, ArchiveError> {
        if data.len() < HEADER_LEN {
            return Err(ArchiveError::Truncated { have: data.len() });
        }
        let magic: [u8; 4] = data[0..4].try_into().unwrap();
        if magic != MAGIC {
            return Err(ArchiveError::InvalidMagic(magic));
        }
        let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }
        let stored = u32::from_le_bytes(data[8..12].try_into().unwrap());

        let body = &data[HEADER_LEN..];
        let actual = crc32fast::hash(body);
        if stored != actual {
            return Err(ArchiveError::ChecksumMismatch { expected: stored, actual });
        }
        Ok(serde_json::from_slice(body)?)
    }

    /// Back to a `Package` for program assembly.
    pub fn into_package(self) -> Package {
        Package {
            import_path: self.import_path,
            pkg_name: self.pkg_name,
            imports: self.imports,
            decls: self.decls,
            minified: self.minified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decls::DepKey;

    fn sample() -> Archive {
        Archive {
            import_path: "lib/strings".to_string(),
            pkg_name: "strings".to_string(),
            imports: vec!["lib/bytes".to_string()],
            export_data: vec![1, 2, 3],
            decls: vec![Decl {
                keys: vec![DepKey::object("lib/strings", "Repeat")],
                exported: true,
                deps: vec![DepKey::object("lib/bytes", "Join")],
                blocking: false,
                decl_code: "$pkg.Repeat = function(s, n) {};\n".to_string(),
                ..Decl::default()
            }],
            minified: false,
        }
    }

    #[test]
    fn roundtrip_preserves_decls() {
        let archive = sample();
        let bytes = archive.encode().unwrap();
        let decoded = Archive::decode(&bytes).unwrap();
        assert_eq!(decoded.import_path, "lib/strings");
        assert_eq!(decoded.pkg_name, "strings");
        assert_eq!(decoded.imports, vec!["lib/bytes".to_string()]);
        assert_eq!(decoded.export_data, vec![1, 2, 3]);
        assert_eq!(decoded.decls.len(), 1);
        assert_eq!(decoded.decls[0].decl_code, archive.decls[0].decl_code);
        assert!(decoded.decls[0].exported);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            Archive::decode(&bytes),
            Err(ArchiveError::InvalidMagic(_))
        ));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            Archive::decode(&bytes),
            Err(ArchiveError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn detects_corrupted_body() {
        let mut bytes = sample().encode().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            Archive::decode(&bytes),
            Err(ArchiveError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn rejects_short_input() {
        assert!(matches!(
            Archive::decode(b"GALE"),
            Err(ArchiveError::Truncated { have: 4 })
        ));
    }
}
