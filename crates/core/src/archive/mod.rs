//! Archive rewriting: scan a JAR, patch defective classes, swap atomically.
//!
//! The rewrite follows a snapshot-and-merge protocol: one read-only pass
//! collects patched bytes for every class entry that needs repair, and only
//! when that set is non-empty is a replacement archive staged in a temporary
//! directory and renamed over the original. Untouched entries are carried
//! over with their compressed bytes and metadata verbatim, so a run that
//! repairs nothing leaves the archive completely untouched and a repaired
//! archive differs only in the rewritten class entries.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::classfile::{self, ClassPatch, PatchPolicy};

/// Archive entry name of the JAR manifest.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Entry-name suffix identifying compiled classes.
const CLASS_SUFFIX: &str = ".class";

/// Error type for one repair run.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The input path does not exist.
    #[error("archive not found: {0}")]
    NotFound(PathBuf),

    /// The input path does not carry the `.jar` extension.
    #[error("not a .jar archive: {0}")]
    WrongExtension(PathBuf),

    /// A class entry failed the structural scan. The run aborts before any
    /// write, so the original archive stays exactly as it was.
    #[error("malformed class file {entry}: {source}")]
    ClassFormat {
        entry: String,
        #[source]
        source: classfile::ClassFileError,
    },

    /// Underlying archive container error.
    #[error("archive error: {0}")]
    Zip(#[from] ZipError),

    /// Filesystem read/write/rename failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result type for repair operations.
pub type RepairResult<T> = Result<T, RepairError>;

/// One repaired class entry: archive entry name and the source name written.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepairedEntry {
    pub entry: String,
    pub source_file: String,
}

/// Outcome of one run over an archive.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RepairSummary {
    /// Class entries inspected. Resources are never inspected.
    pub classes_seen: usize,
    /// Entries rewritten, in archive order.
    pub repaired: Vec<RepairedEntry>,
}

impl RepairSummary {
    /// Number of entries that were rewritten.
    pub fn modified_count(&self) -> usize {
        self.repaired.len()
    }
}

/// Repair `path` in place.
///
/// The archive is only rewritten when at least one class entry needed repair;
/// otherwise it is never reopened for writing, so its bytes and timestamps
/// are untouched. The rewrite is staged in a temporary directory next to the
/// archive and swapped in with a single rename: concurrent readers observe
/// either the old or the new complete archive, never a partial one. The
/// staging directory is removed on every exit path.
pub fn repair_archive(path: &Path, policy: &PatchPolicy) -> RepairResult<RepairSummary> {
    if !path.exists() {
        return Err(RepairError::NotFound(path.to_path_buf()));
    }
    let is_jar = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
    if !is_jar {
        return Err(RepairError::WrongExtension(path.to_path_buf()));
    }

    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;

    let mut patches: HashMap<String, Vec<u8>> = HashMap::new();
    let mut repaired = Vec::new();
    let mut classes_seen = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
            continue;
        }
        classes_seen += 1;
        let name = entry.name().to_string();
        let mut original = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut original)?;
        match classfile::patch_class(&original, policy)
            .map_err(|source| RepairError::ClassFormat { entry: name.clone(), source })?
        {
            ClassPatch::Unchanged => {}
            ClassPatch::Replaced { bytes, source_file } => {
                debug!("repairing {name}: SourceFile = {source_file}");
                repaired.push(RepairedEntry { entry: name.clone(), source_file });
                patches.insert(name, bytes);
            }
        }
    }
    debug!("scanned {classes_seen} class entries, {} need repair", patches.len());

    if patches.is_empty() {
        return Ok(RepairSummary { classes_seen, repaired });
    }

    rewrite(path, &mut archive, &patches)?;
    Ok(RepairSummary { classes_seen, repaired })
}

/// Build the replacement archive in a sibling staging directory and rename it
/// over the original.
fn rewrite<R: Read + Seek>(
    path: &Path,
    archive: &mut ZipArchive<R>,
    patches: &HashMap<String, Vec<u8>>,
) -> RepairResult<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    // Staged next to the archive so the final rename never crosses a
    // filesystem boundary.
    let staging = tempfile::Builder::new().prefix(".classmend-").tempdir_in(parent)?;
    let staged_path = staging.path().join("patched.jar");

    {
        let mut writer = ZipWriter::new(BufWriter::new(File::create(&staged_path)?));
        for index in write_order(archive) {
            let entry = archive.by_index_raw(index)?;
            let name = entry.name().to_string();
            match patches.get(&name) {
                Some(bytes) => {
                    let mut options =
                        SimpleFileOptions::default().compression_method(entry.compression());
                    if let Some(modified) = entry.last_modified() {
                        options = options.last_modified_time(modified);
                    }
                    if let Some(mode) = entry.unix_mode() {
                        options = options.unix_permissions(mode);
                    }
                    writer.start_file(name, options)?;
                    writer.write_all(bytes)?;
                }
                // Untouched entries keep their compressed bytes, timestamps,
                // and extra fields verbatim.
                None => writer.raw_copy_file(entry)?,
            }
        }
        let mut inner = writer.finish()?;
        inner.flush()?;
    }

    fs::rename(&staged_path, path)?;
    staging.close()?;
    Ok(())
}

/// Entry indices in write order: the manifest first when present, everything
/// else in its original relative order.
fn write_order<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..archive.len()).collect();
    if let Some(manifest) = archive.index_for_name(MANIFEST_PATH) {
        order.retain(|&index| index != manifest);
        order.insert(0, manifest);
    }
    order
}
