//! Mutation pass: splice a replacement `SourceFile` into a class file.

use crate::naming;

use super::scan::{ClassScan, SourceFileAttr};
use super::{tags, ClassFileError, ClassPatch, PatchPolicy, SOURCE_FILE_ATTR, SOURCE_FILE_ATTR_LEN};

/// Patch one class file.
///
/// Returns [`ClassPatch::Unchanged`] when the class already carries a valid,
/// non-sentinel `SourceFile` value; the caller keeps the original bytes and
/// no re-serialization happens, so healthy classes stay byte-identical.
/// Otherwise returns the rewritten bytes together with the name that was
/// written, derived from the declaring class's binary name.
pub fn patch_class(bytes: &[u8], policy: &PatchPolicy) -> Result<ClassPatch, ClassFileError> {
    let scan = ClassScan::read(bytes)?;

    let needs_repair = match &scan.source_file {
        None => true,
        Some(attr) => {
            let value = scan.utf8_at(attr.value_index, "UTF-8 SourceFile value")?;
            policy.is_sentinel(value)
        }
    };
    if !needs_repair {
        return Ok(ClassPatch::Unchanged);
    }

    let replacement = naming::source_file_name(scan.class_name()?);
    let bytes = match &scan.source_file {
        Some(attr) => retarget_attribute(bytes, &scan, attr, &replacement)?,
        None => append_attribute(bytes, &scan, &replacement)?,
    };
    Ok(ClassPatch::Replaced { bytes, source_file: replacement })
}

/// Append-only constant pool growth.
///
/// New UTF-8 entries are staged in a side buffer and spliced in at the end of
/// the pool in one pass. No existing entry moves and no existing index is
/// renumbered, so every recorded offset before the pool end stays valid and
/// dangling-index bugs cannot arise.
struct PoolExtension {
    staged: Vec<u8>,
    added: Vec<(String, u16)>,
    next_index: u16,
}

impl PoolExtension {
    fn new(scan: &ClassScan) -> Self {
        Self { staged: Vec::new(), added: Vec::new(), next_index: scan.pool_count }
    }

    /// Index of a UTF-8 constant holding `value`: an existing entry when one
    /// matches exactly (lowest index wins, for determinism), otherwise a new
    /// entry staged at the end of the pool.
    fn utf8_index(&mut self, scan: &ClassScan, value: &str) -> Result<u16, ClassFileError> {
        if let Some(index) = scan.find_utf8(value) {
            return Ok(index);
        }
        if let Some((_, index)) = self.added.iter().find(|(held, _)| held == value) {
            return Ok(*index);
        }
        if self.next_index == u16::MAX {
            return Err(ClassFileError::PoolExhausted);
        }
        self.staged.push(tags::UTF8);
        self.staged.extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.staged.extend_from_slice(value.as_bytes());
        let index = self.next_index;
        self.next_index += 1;
        self.added.push((value.to_string(), index));
        Ok(index)
    }

    /// Byte shift introduced ahead of everything past the pool end.
    fn shift(&self) -> usize {
        self.staged.len()
    }

    /// Pool count to declare once the staged entries are spliced in.
    fn new_pool_count(&self) -> u16 {
        self.next_index
    }
}

/// Original bytes with the staged pool entries spliced in at the pool end and
/// the declared pool count updated.
fn splice_pool(bytes: &[u8], scan: &ClassScan, pool: &PoolExtension) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + pool.shift() + 8);
    out.extend_from_slice(&bytes[..scan.pool_end]);
    out.extend_from_slice(&pool.staged);
    out.extend_from_slice(&bytes[scan.pool_end..]);
    put_u16(&mut out, scan.pool_count_offset, pool.new_pool_count());
    out
}

/// Re-point an existing attribute's payload at the replacement constant. Any
/// sibling attribute payloads are carried over untouched.
fn retarget_attribute(
    bytes: &[u8],
    scan: &ClassScan,
    attr: &SourceFileAttr,
    replacement: &str,
) -> Result<Vec<u8>, ClassFileError> {
    let mut pool = PoolExtension::new(scan);
    let value_index = pool.utf8_index(scan, replacement)?;
    let shift = pool.shift();
    let mut out = splice_pool(bytes, scan, &pool);
    put_u16(&mut out, attr.payload_offset + shift, value_index);
    Ok(out)
}

/// Add a `SourceFile` attribute to a class that has none: grow the pool as
/// needed, bump the attribute count, and append the fixed-size record at the
/// end of the file, where the class attribute table terminates.
fn append_attribute(
    bytes: &[u8],
    scan: &ClassScan,
    replacement: &str,
) -> Result<Vec<u8>, ClassFileError> {
    if scan.attr_count == u16::MAX {
        return Err(ClassFileError::AttributeTableFull);
    }
    let mut pool = PoolExtension::new(scan);
    let name_index = pool.utf8_index(scan, SOURCE_FILE_ATTR)?;
    let value_index = pool.utf8_index(scan, replacement)?;
    let shift = pool.shift();
    let mut out = splice_pool(bytes, scan, &pool);
    put_u16(&mut out, scan.attr_count_offset + shift, scan.attr_count + 1);
    out.extend_from_slice(&name_index.to_be_bytes());
    out.extend_from_slice(&SOURCE_FILE_ATTR_LEN.to_be_bytes());
    out.extend_from_slice(&value_index.to_be_bytes());
    Ok(out)
}

fn put_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}
