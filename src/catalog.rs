use std::collections::HashMap;
use std::fmt;

use crate::error::{AcquireError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Html,
    Pdf,
}

impl fmt::Display for MenuKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuKind::Html => f.write_str("html"),
            MenuKind::Pdf => f.write_str("pdf"),
        }
    }
}

/// One restaurant's menu source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    /// Prefix for root-relative links found in the interpreted menu.
    pub base_url: String,
    pub kind: MenuKind,
    /// Selector for the PDF link, only meaningful for `MenuKind::Pdf`.
    pub selector: Option<String>,
    /// Use the source-specific browser interaction instead of the static cascade.
    pub interactive: bool,
}

impl SourceConfig {
    pub fn html(name: &str, url: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            base_url: base_url.to_string(),
            kind: MenuKind::Html,
            selector: None,
            interactive: false,
        }
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn pdf(name: &str, url: &str, base_url: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            base_url: base_url.to_string(),
            kind: MenuKind::Pdf,
            selector: Some(selector.to_string()),
            interactive: false,
        }
    }

    /// Non-empty PDF link selector, or a configuration error.
    pub fn pdf_selector(&self) -> Result<&str> {
        match self.selector.as_deref() {
            Some(selector) if !selector.trim().is_empty() => Ok(selector),
            _ => Err(AcquireError::MissingSelector(self.name.clone())),
        }
    }
}

/// Immutable lookup table from source id to configuration.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sources: HashMap<String, SourceConfig>,
}

impl Catalog {
    pub fn new(entries: impl IntoIterator<Item = (String, SourceConfig)>) -> Self {
        Self {
            sources: entries.into_iter().collect(),
        }
    }

    pub fn builtin() -> Self {
        let food2050 = "https://app.food2050.ch";
        let espace = "https://web.sv-restaurant.ch/menu/Post,%20Restaurant%20Espace,%20Bern/Mittagsmen%C3%BC";
        Self::new([
            (
                "gira".to_string(),
                SourceConfig::html(
                    "Gira",
                    "https://app.food2050.ch/de/v2/zfv/sbb/gira/mittagsverpflegung/menu/weekly",
                    food2050,
                ),
            ),
            (
                "luna".to_string(),
                SourceConfig::html(
                    "Luna",
                    "https://app.food2050.ch/de/v2/zfv/sbb/restaurant-luna/mittagsverpflegung/menu/weekly",
                    food2050,
                ),
            ),
            (
                "sole".to_string(),
                SourceConfig::html(
                    "Sole",
                    "https://app.food2050.ch/de/v2/zfv/sbb/sole/mittagsverpflegung/menu/weekly",
                    food2050,
                ),
            ),
            (
                "espace".to_string(),
                SourceConfig::html("Espace", espace, espace).interactive(),
            ),
            (
                "turbolama".to_string(),
                SourceConfig::pdf(
                    "Turbolama",
                    "https://www.turbolama.ch/",
                    "https://www.turbolama.ch/",
                    "a[aria-label=\"FOOD MENU\"]",
                ),
            ),
            (
                "freibank".to_string(),
                SourceConfig::pdf(
                    "Freibank",
                    "https://www.freibank.ch/speisekarte",
                    "https://www.freibank.ch/",
                    ".wp-block-file a:first-of-type",
                ),
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Result<&SourceConfig> {
        self.sources
            .get(id)
            .ok_or_else(|| AcquireError::UnknownSource(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.sources.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
