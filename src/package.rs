//! # Package
//!
//! Builds the layer zip archive.
//!
//! The archive holds:
//! - the env file, under the configured `file_name`
//! - each auxiliary file (e.g. licenses), under its base name
//!
//! The archive is assembled in memory and only returned once every entry has
//! been written.

use crate::error::{LayerError, Result};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Create a zip archive containing `content` plus the auxiliary files
///
/// # Errors
///
/// Returns `LayerError::Packaging` if an auxiliary file cannot be read (or has
/// no file name), and `LayerError::Archive` if the archive cannot be written,
/// including duplicate entry names.
pub fn package(file_name: &str, content: &[u8], aux_files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::<u8>::new()));

    zip.start_file(file_name, SimpleFileOptions::default())?;
    zip.write_all(content).map_err(|source| LayerError::Packaging {
        entry: file_name.to_string(),
        source,
    })?;

    for path in aux_files {
        let entry = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| LayerError::Packaging {
                entry: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                ),
            })?;

        let data = std::fs::read(path).map_err(|source| LayerError::Packaging {
            entry: path.display().to_string(),
            source,
        })?;

        zip.start_file(entry.as_str(), SimpleFileOptions::default())?;
        zip.write_all(&data).map_err(|source| LayerError::Packaging {
            entry: entry.clone(),
            source,
        })?;
        debug!("Added {} ({} bytes) to layer archive", entry, data.len());
    }

    let archive = zip.finish()?.into_inner();
    debug!("Layer archive is {} bytes", archive.len());
    Ok(archive)
}
