//! The manifest: one document naming the segment table and every table
//! group of a dataset.
//!
//! ```yaml
//! segments: segments.csv
//! features:
//!   fbank: fbank.csv
//!   mfcc: mfcc.csv
//! trials:
//!   dev: dev.csv
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// Encoding of the manifest document, chosen by its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
}

impl ManifestFormat {
    /// `.yaml`/`.yml` → YAML, `.json` → JSON, anything else is not a manifest.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(ManifestFormat::Yaml),
            "json" => Some(ManifestFormat::Json),
            _ => None,
        }
    }
}

/// Map from group key to the file holding that table.
pub type FileMap = BTreeMap<String, PathBuf>;

/// Decoded manifest.  Groups that are `None` were never configured and are
/// left out of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Mandatory; kept optional here so a missing entry is reported as such.
    pub segments: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recordings: Option<FileMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FileMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<FileMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollments: Option<FileMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trials: Option<FileMap>,
}

impl Manifest {
    /// Read and decode the manifest at `path` (read-only).
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::from_io("manifest", path, e))?;
        Self::parse(&text, ManifestFormat::from_path(path).unwrap_or(ManifestFormat::Yaml))
            .map_err(|reason| DatasetError::Manifest {
                path: path.to_path_buf(),
                reason,
            })
    }

    pub fn parse(text: &str, format: ManifestFormat) -> Result<Self, String> {
        match format {
            ManifestFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        }
    }

    pub fn to_text(&self, format: ManifestFormat) -> Result<String, String> {
        match format {
            ManifestFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            ManifestFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let format = ManifestFormat::from_path(path).unwrap_or(ManifestFormat::Yaml);
        let text = self.to_text(format).map_err(|reason| DatasetError::Manifest {
            path: path.to_path_buf(),
            reason,
        })?;
        std::fs::write(path, text).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The segment table entry, or `MissingMandatoryField`.
    pub fn require_segments(&self, path: &Path) -> Result<&Path> {
        self.segments
            .as_deref()
            .ok_or_else(|| DatasetError::MissingMandatoryField {
                path: path.to_path_buf(),
                field: "segments",
            })
    }
}
