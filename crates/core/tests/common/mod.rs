//! Shared fixtures: synthetic class files and JARs.

use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a minimal, structurally valid class file for `binary_name`.
///
/// See [`class_bytes_ext`] for the pool layout.
pub fn class_bytes(binary_name: &str, source_file: Option<&str>) -> Vec<u8> {
    class_bytes_ext(binary_name, source_file, &[])
}

/// Build a class file with optional extra UTF-8 pool entries.
///
/// Pool layout: [1] Utf8 name, [2] Class -> 1, [3] Utf8 "java/lang/Object",
/// [4] Class -> 3; when a source name is given, [5] Utf8 "SourceFile" and
/// [6] Utf8 value plus one SourceFile attribute referring to [6]; any
/// `extra_utf8` values follow at the next free indices.
pub fn class_bytes_ext(
    binary_name: &str,
    source_file: Option<&str>,
    extra_utf8: &[&str],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor version
    out.extend_from_slice(&52u16.to_be_bytes()); // major version (Java 8)

    let entries = 4 + if source_file.is_some() { 2 } else { 0 } + extra_utf8.len();
    out.extend_from_slice(&((entries + 1) as u16).to_be_bytes());
    push_utf8(&mut out, binary_name); // [1]
    push_class(&mut out, 1); // [2]
    push_utf8(&mut out, "java/lang/Object"); // [3]
    push_class(&mut out, 3); // [4]
    if let Some(value) = source_file {
        push_utf8(&mut out, "SourceFile"); // [5]
        push_utf8(&mut out, value); // [6]
    }
    for value in extra_utf8 {
        push_utf8(&mut out, value);
    }

    out.extend_from_slice(&0x0021u16.to_be_bytes()); // access: public super
    out.extend_from_slice(&2u16.to_be_bytes()); // this_class
    out.extend_from_slice(&4u16.to_be_bytes()); // super_class
    out.extend_from_slice(&0u16.to_be_bytes()); // interface count
    out.extend_from_slice(&0u16.to_be_bytes()); // field count
    out.extend_from_slice(&0u16.to_be_bytes()); // method count
    if source_file.is_some() {
        out.extend_from_slice(&1u16.to_be_bytes()); // attribute count
        out.extend_from_slice(&5u16.to_be_bytes()); // attribute name index
        out.extend_from_slice(&2u32.to_be_bytes()); // attribute length
        out.extend_from_slice(&6u16.to_be_bytes()); // value index
    } else {
        out.extend_from_slice(&0u16.to_be_bytes()); // attribute count
    }
    out
}

fn push_utf8(out: &mut Vec<u8>, value: &str) {
    out.push(1);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn push_class(out: &mut Vec<u8>, name_index: u16) {
    out.push(7);
    out.extend_from_slice(&name_index.to_be_bytes());
}

/// Write a JAR at `path` with the given (name, bytes) entries, in order,
/// all stamped with [`fixed_timestamp`].
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create jar");
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(fixed_timestamp());
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(bytes).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

/// A fixed timestamp (even seconds, so it survives the DOS-time encoding)
/// that tests can assert round-trips through a rewrite.
pub fn fixed_timestamp() -> zip::DateTime {
    zip::DateTime::from_date_and_time(2021, 6, 5, 4, 3, 2).expect("valid datetime")
}
