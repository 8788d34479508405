//! ZIP helpers for backup archives and dataset bundles.

use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Unpack `zip_path` into `dest`, returning the number of entries.
///
/// # Errors
///
/// Returns `XportError::Archive` for a truncated or corrupt archive.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(dest)?;
    archive.extract(dest)?;
    Ok(archive.len())
}

/// Whether the archive already holds an entry with this name.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened.
pub fn contains_entry(zip_path: &Path, name: &str) -> Result<bool> {
    let file = File::open(zip_path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;
    let found = archive.file_names().any(|entry| entry == name);
    Ok(found)
}

/// Append a file to an existing archive as a deflated entry.
///
/// # Errors
///
/// Returns an error if either file cannot be read or the archive rejects the
/// entry (for example a duplicate name).
pub fn append_file(zip_path: &Path, source: &Path, entry_name: &str) -> Result<()> {
    let mut content = Vec::new();
    File::open(source)?.read_to_end(&mut content)?;

    let file = OpenOptions::new().read(true).write(true).open(zip_path)?;
    let mut zip = ZipWriter::new_append(file)?;
    zip.start_file(entry_name, deflated())?;
    zip.write_all(&content)?;
    zip.finish()?;
    Ok(())
}

/// Write a fresh archive from in-memory entries.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(File::create(path)?);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), deflated())?;
        zip.write_all(bytes)?;
    }
    zip.finish()?;
    Ok(())
}
