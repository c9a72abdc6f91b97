use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Normal runs fail fast; diagnostic runs keep artifacts and the browser around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Normal,
    Diagnostic,
}

impl RunMode {
    pub fn is_diagnostic(self) -> bool {
        self == RunMode::Diagnostic
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Stop before the text-understanding service is called.
    pub dry_run: bool,
    pub source_id: String,
    pub debug_dir: PathBuf,
    /// One page covers every cataloged PDF menu.
    pub pdf_page_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Normal,
            dry_run: false,
            source_id: "gira".to_string(),
            debug_dir: PathBuf::from("debug"),
            pdf_page_limit: 1,
        }
    }
}

/// Loads the first `.env` found in `start` or up to two parents.
pub fn load_env_from(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors().take(3) {
        let env_file = dir.join(".env");
        if !env_file.is_file() {
            continue;
        }
        match dotenvy::from_path(&env_file) {
            Ok(()) => {
                info!(path = %env_file.display(), "loaded environment");
                return Some(env_file);
            }
            Err(err) => {
                warn!(path = %env_file.display(), error = %err, "error loading .env file");
                return None;
            }
        }
    }
    info!("no .env file found, using environment variables if set");
    None
}

pub fn load_env() -> Option<PathBuf> {
    match std::env::current_dir() {
        Ok(dir) => load_env_from(&dir),
        Err(err) => {
            warn!(error = %err, "could not determine current directory");
            None
        }
    }
}
