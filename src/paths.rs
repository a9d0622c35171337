//! Mapping dataset locations to manifest files and manifest entries to
//! table files.

use std::path::{Path, PathBuf};

use crate::manifest::ManifestFormat;

/// Manifest file name used when a dataset is addressed by its directory.
pub const MANIFEST_FILE_NAME: &str = "dataset.yaml";

/// Split a dataset location into `(directory, manifest_file)`.
///
/// A path with a manifest extension (`.yaml`, `.yml`, `.json`) is the
/// manifest itself; anything else is taken as the dataset directory.
pub fn resolve_dataset_path(path: &Path) -> (PathBuf, PathBuf) {
    if ManifestFormat::from_path(path).is_some() {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        (dir, path.to_path_buf())
    } else {
        (path.to_path_buf(), path.join(MANIFEST_FILE_NAME))
    }
}

/// Resolve a table path recorded in a manifest.  Paths that already point
/// at an existing file are kept, everything else is relative to `dir`.
pub fn resolve_file_path(dir: &Path, file: &Path) -> PathBuf {
    if file.is_file() {
        file.to_path_buf()
    } else {
        dir.join(file)
    }
}
