//! Weekly lunch menu acquisition: fetch a restaurant's menu from static
//! HTML, a tabbed single-page app or a PDF, and reduce it to text for a
//! text-understanding service.

pub mod acquire;
pub mod browser;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod interpret;
pub mod pdf;
pub mod reduce;
pub mod snapshot;

pub use acquire::{Acquirer, MenuText};
pub use catalog::{Catalog, MenuKind, SourceConfig};
pub use config::{RunConfig, RunMode};
pub use error::{AcquireError, Result};
