use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{AcquireError, Result};

/// `<dir>/<name>_<label>.<ext>`, lower-cased. Repeat runs overwrite.
pub fn snapshot_path(dir: &Path, source_name: &str, label: &str, ext: &str) -> PathBuf {
    let ext = if ext.is_empty() { "txt" } else { ext };
    dir.join(format!("{source_name}_{label}.{ext}").to_lowercase())
}

/// Where a diagnostic run keeps the downloaded PDF.
pub fn pdf_debug_path(dir: &Path, source_name: &str) -> PathBuf {
    snapshot_path(dir, source_name, "menu", "pdf")
}

pub fn write_snapshot(
    dir: &Path,
    source_name: &str,
    label: &str,
    ext: &str,
    content: &[u8],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|err| AcquireError::io(dir, err))?;
    let path = snapshot_path(dir, source_name, label, ext);
    std::fs::write(&path, content).map_err(|err| AcquireError::io(&path, err))?;
    Ok(path)
}

/// Diagnostic snapshots never fail a run; problems are only logged.
#[derive(Debug, Clone)]
pub struct Snapshots {
    dir: Option<PathBuf>,
}

impl Snapshots {
    pub fn enabled(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn save(&self, source_name: &str, label: &str, ext: &str, content: &[u8]) {
        let Some(dir) = &self.dir else {
            return;
        };
        match write_snapshot(dir, source_name, label, ext, content) {
            Ok(path) => info!(path = %path.display(), "saved {label}"),
            Err(err) => warn!(error = %err, "could not write {label} snapshot"),
        }
    }
}
