use crate::{config::ImageSource, error::DiscoveryError, util::extension_lower};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One image to evaluate. `ordinal` is the discovery position and fixes the
/// report row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageTask {
    pub id: String,
    pub path: PathBuf,
    pub ordinal: usize,
}

/// Resolves `source` into tasks. Directories are scanned flat and sorted
/// lexicographically by path.
pub fn discover(source: &ImageSource, extensions: &[String]) -> Result<Vec<ImageTask>, DiscoveryError> {
    match source {
        ImageSource::File(path) => discover_file(path, extensions),
        ImageSource::Directory(dir) => discover_dir(dir, extensions),
    }
}

fn discover_file(path: &Path, extensions: &[String]) -> Result<Vec<ImageTask>, DiscoveryError> {
    if !path.exists() {
        return Err(DiscoveryError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(DiscoveryError::NotAFile(path.to_path_buf()));
    }
    if !is_recognized(path, extensions) {
        return Err(DiscoveryError::UnsupportedExtension(path.to_path_buf()));
    }
    Ok(vec![task(path.to_path_buf(), 0)])
}

fn discover_dir(dir: &Path, extensions: &[String]) -> Result<Vec<ImageTask>, DiscoveryError> {
    if !dir.exists() {
        return Err(DiscoveryError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_recognized(p, extensions))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(DiscoveryError::EmptyDirectory(dir.to_path_buf()));
    }
    debug!("discovered {} images in {}", files.len(), dir.display());

    Ok(files
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| task(path, ordinal))
        .collect())
}

fn task(path: PathBuf, ordinal: usize) -> ImageTask {
    ImageTask {
        id: format!("img-{ordinal:04}"),
        path,
        ordinal,
    }
}

fn is_recognized(path: &Path, extensions: &[String]) -> bool {
    extension_lower(path).is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}
