//! Minimal structural access to JVM class files.
//!
//! This module parses just enough of the class-file format to find, validate,
//! and replace the top-level `SourceFile` attribute: the constant pool is
//! walked once to record offsets and UTF-8 values, fields and methods are
//! skipped by their declared attribute lengths, and all mutation happens by
//! splicing an explicit byte buffer with append-only pool growth. Nothing
//! else in the file is interpreted, and a class that needs no repair is
//! returned untouched rather than re-serialized.

mod patch;
mod scan;

pub use patch::patch_class;

use thiserror::Error;

/// Class-file magic number.
pub(crate) const MAGIC: u32 = 0xCAFE_BABE;

/// Name of the attribute this crate repairs.
pub(crate) const SOURCE_FILE_ATTR: &str = "SourceFile";

/// Declared payload length of a `SourceFile` attribute: one pool index.
pub(crate) const SOURCE_FILE_ATTR_LEN: u32 = 2;

/// Sentinel written by debug-stripping tools in place of a real source name.
pub const STRIPPED_SENTINEL: &str = "stripped";

/// Constant pool tag numbers (JVMS table 4.4-A).
pub(crate) mod tags {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// Error type for structural class-file defects.
///
/// Any of these is fatal for the containing archive's repair run; a malformed
/// class is never partially repaired and never silently skipped.
#[derive(Debug, Error)]
pub enum ClassFileError {
    /// The file ended before a declared structure was complete.
    #[error("class file truncated at offset {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },

    /// The first four bytes are not the class-file magic.
    #[error("bad magic number {found:#010x}")]
    BadMagic { found: u32 },

    /// A constant pool entry carries a tag this tool does not know, which
    /// makes the rest of the pool unwalkable.
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownPoolTag { tag: u8, index: u16 },

    /// An index reference points at a missing or differently-typed entry.
    #[error("constant pool index {index} does not refer to a {expected}")]
    BadPoolRef { index: u16, expected: &'static str },

    /// A referenced UTF-8 constant does not decode.
    #[error("constant pool entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: u16 },

    /// A `SourceFile` attribute declared a payload length other than 2.
    #[error("SourceFile attribute declares length {found}, expected 2")]
    BadAttributeLength { found: u32 },

    /// Data remained after the class attribute table, where the file must end.
    #[error("{extra} byte(s) of trailing data after the attribute table")]
    TrailingBytes { extra: usize },

    /// The constant pool already uses every 16-bit index.
    #[error("constant pool has no free index left")]
    PoolExhausted,

    /// The class attribute table already holds 65535 attributes.
    #[error("class attribute table has no free slot left")]
    AttributeTableFull,
}

/// Detection policy for the repair pass.
///
/// A `SourceFile` value counts as stripped only on an exact, case-sensitive
/// match against one of the sentinels; there is no prefix or substring
/// matching. The default policy carries the single conventional marker.
#[derive(Debug, Clone)]
pub struct PatchPolicy {
    /// Attribute values treated as "debug info deliberately removed".
    pub sentinels: Vec<String>,
}

impl Default for PatchPolicy {
    fn default() -> Self {
        Self { sentinels: vec![STRIPPED_SENTINEL.to_string()] }
    }
}

impl PatchPolicy {
    /// Builder-style helper to register an alternate stripped-marker used by
    /// some other toolchain, on top of the default.
    pub fn with_sentinel(mut self, value: impl Into<String>) -> Self {
        self.sentinels.push(value.into());
        self
    }

    pub(crate) fn is_sentinel(&self, value: &str) -> bool {
        self.sentinels.iter().any(|sentinel| sentinel == value)
    }
}

/// Result of patching a single class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassPatch {
    /// The class already carries a valid, non-sentinel source name. The input
    /// bytes are authoritative; the caller reuses them as-is.
    Unchanged,
    /// The class was rewritten with a synthesized source name.
    Replaced { bytes: Vec<u8>, source_file: String },
}
