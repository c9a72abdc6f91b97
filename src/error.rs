use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcquireError>;

/// Every way a menu acquisition run can end without usable text.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("restaurant with id '{0}' not found")]
    UnknownSource(String),

    #[error("menu selector is required for PDF menus but not configured for {0}")]
    MissingSelector(String),

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("no element matching '{selector}' found on {url}")]
    NoLinkFound { url: String, selector: String },

    #[error("no menu content found on the page of {source_name}")]
    EmptyContent { source_name: String },

    #[error("browser step '{step}' failed: {reason}")]
    Browser { step: String, reason: String },

    #[error("browser step '{step}' timed out after {after:?}")]
    Timeout { step: String, after: Duration },

    #[error("error reading PDF {}: {reason}", path.display())]
    Pdf { path: PathBuf, reason: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("menu interpretation failed: {0}")]
    Interpret(String),
}

impl AcquireError {
    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn browser(step: impl Into<String>, reason: impl ToString) -> Self {
        Self::Browser {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Network-side failures: connection problems and non-2xx answers.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }

    /// The source was reachable but yielded nothing usable.
    pub fn is_empty_content(&self) -> bool {
        matches!(self, Self::EmptyContent { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownSource(_) | Self::MissingSelector(_) | Self::InvalidSelector { .. }
        )
    }
}
