use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extract a single ZIP entry to disk, creating directories as needed
///
/// Existing files are truncated and overwritten.
fn extract_zip_entry(mut file: zip::read::ZipFile, dest_path: &Path) -> Result<Option<PathBuf>> {
    let file_path = match file.enclosed_name() {
        Some(path) => dest_path.join(path),
        None => {
            warn!(entry = %file.name(), "skipping entry with unsafe path");
            return Ok(None);
        }
    };

    if file.is_dir() {
        std::fs::create_dir_all(&file_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create directory: {}",
                e
            )))
        })?;
        return Ok(None);
    }

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create parent directories: {}",
                e
            )))
        })?;
    }

    let mut outfile = std::fs::File::create(&file_path).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to create output file {}: {}",
            file_path.display(),
            e
        )))
    })?;

    std::io::copy(&mut file, &mut outfile).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to extract file {}: {}",
            file_path.display(),
            e
        )))
    })?;

    Ok(Some(file_path))
}

/// Extract every entry of a ZIP archive into `dest_path`, overwriting existing files
pub fn extract_zip(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
    debug!(?archive_path, ?dest_path, "extracting ZIP archive");

    std::fs::create_dir_all(dest_path).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to create destination: {}",
            e
        )))
    })?;

    let file = std::fs::File::open(archive_path).map_err(|e| {
        Error::Io(std::io::Error::other(format!(
            "failed to open ZIP archive: {}",
            e
        )))
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Extraction {
        archive: archive_path.to_path_buf(),
        reason: format!("failed to read ZIP archive: {}", e),
    })?;

    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to read ZIP entry: {}", e),
        })?;

        if let Some(file_path) = extract_zip_entry(entry, dest_path)? {
            extracted_files.push(file_path);
        }
    }

    info!(
        ?archive_path,
        extracted_count = extracted_files.len(),
        "ZIP extraction successful"
    );

    Ok(extracted_files)
}
