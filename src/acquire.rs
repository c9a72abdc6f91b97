use std::path::PathBuf;

use reqwest::Client;
use tracing::info;

use crate::browser::{BrowserDriver, ChromiumDriver, HoldPolicy, TabProfile, TabbedMenuExtractor};
use crate::catalog::{MenuKind, SourceConfig};
use crate::config::{RunConfig, RunMode};
use crate::error::{AcquireError, Result};
use crate::fetch::StaticCascade;
use crate::pdf;
use crate::reduce::reduce;
use crate::snapshot::{Snapshots, pdf_debug_path};

/// Text ready for the text-understanding service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuText {
    pub kind: MenuKind,
    pub text: String,
    /// Where the PDF came from, for PDF sources.
    pub pdf_url: Option<String>,
}

/// Turns one [`SourceConfig`] into [`MenuText`], picking the HTML or PDF path.
pub struct Acquirer<D = ChromiumDriver> {
    client: Client,
    mode: RunMode,
    snapshots: Snapshots,
    pdf_page_limit: usize,
    profile: TabProfile,
    hold: HoldPolicy,
    new_driver: Box<dyn Fn() -> D + Send + Sync>,
}

impl Acquirer<ChromiumDriver> {
    pub fn new(client: Client, config: &RunConfig) -> Self {
        let snapshots = if config.mode.is_diagnostic() {
            Snapshots::enabled(&config.debug_dir)
        } else {
            Snapshots::disabled()
        };
        Self {
            client,
            mode: config.mode,
            snapshots,
            pdf_page_limit: config.pdf_page_limit,
            profile: TabProfile::sv_restaurant(),
            hold: HoldPolicy::Forever,
            new_driver: Box::new(ChromiumDriver::new),
        }
    }
}

impl<D: BrowserDriver> Acquirer<D> {
    /// Swaps the rendering engine used for interactive sources.
    pub fn with_driver<E: BrowserDriver>(
        self,
        new_driver: impl Fn() -> E + Send + Sync + 'static,
    ) -> Acquirer<E> {
        Acquirer {
            client: self.client,
            mode: self.mode,
            snapshots: self.snapshots,
            pdf_page_limit: self.pdf_page_limit,
            profile: self.profile,
            hold: self.hold,
            new_driver: Box::new(new_driver),
        }
    }

    pub fn with_profile(mut self, profile: TabProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_hold(mut self, hold: HoldPolicy) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_snapshots(mut self, snapshots: Snapshots) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub async fn acquire(&self, source: &SourceConfig) -> Result<MenuText> {
        info!(source = %source.name, url = %source.url, kind = %source.kind, "processing menu");
        match source.kind {
            MenuKind::Html => self.acquire_html(source).await,
            MenuKind::Pdf => self.acquire_pdf(source).await,
        }
    }

    async fn acquire_html(&self, source: &SourceConfig) -> Result<MenuText> {
        let raw = if source.interactive {
            let driver = (self.new_driver)();
            TabbedMenuExtractor::new(driver, self.profile.clone(), self.mode, &source.url)
                .with_hold(self.hold)
                .run()
                .await?
        } else {
            StaticCascade::new(self.client.clone())
                .fetch(&source.url)
                .await?
                .content
        };
        self.snapshots
            .save(&source.name, "raw_html", "html", raw.as_bytes());

        let reduced = reduce(&raw);
        self.snapshots
            .save(&source.name, "menu_content", "html", reduced.as_bytes());

        if reduced.is_empty() {
            return Err(AcquireError::EmptyContent {
                source_name: source.name.clone(),
            });
        }
        info!(bytes = reduced.len(), "successfully extracted menu content");

        Ok(MenuText {
            kind: MenuKind::Html,
            text: reduced,
            pdf_url: None,
        })
    }

    async fn acquire_pdf(&self, source: &SourceConfig) -> Result<MenuText> {
        let selector = source.pdf_selector()?;
        info!(selector, "looking for menu link");
        let pdf_url = pdf::resolve_link(&self.client, &source.url, selector).await?;

        // Lives until the end of this call; dropping it removes the download.
        let mut scratch = None;
        let pdf_path: PathBuf = match self.snapshots.dir() {
            Some(dir) => pdf_debug_path(dir, &source.name),
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("menu-pdf")
                    .tempdir()
                    .map_err(|err| AcquireError::io(std::env::temp_dir(), err))?;
                let path = dir.path().join(format!("{}_menu.pdf", source.name.to_lowercase()));
                scratch = Some(dir);
                path
            }
        };

        pdf::download(&self.client, &pdf_url, &pdf_path).await?;
        info!(path = %pdf_path.display(), "downloaded PDF menu");

        let limit = self.pdf_page_limit;
        let read_path = pdf_path.clone();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_pages(&read_path))
            .await
            .map_err(|err| AcquireError::Pdf {
                path: pdf_path.clone(),
                reason: err.to_string(),
            })??;
        drop(scratch);

        if pdf::is_blank(&pages, limit) {
            return Err(AcquireError::EmptyContent {
                source_name: source.name.clone(),
            });
        }
        let text = pdf::render_pages(&pages, limit);
        self.snapshots
            .save(&source.name, "extracted_text", "txt", text.as_bytes());

        Ok(MenuText {
            kind: MenuKind::Pdf,
            text,
            pdf_url: Some(pdf_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::browser::testing::{FakeDriver, quick_profile};
    use crate::fetch::build_client;

    fn diagnostic_acquirer(driver: FakeDriver) -> Acquirer<FakeDriver> {
        let config = RunConfig {
            mode: RunMode::Diagnostic,
            ..RunConfig::default()
        };
        Acquirer::new(build_client().unwrap(), &config)
            .with_snapshots(Snapshots::disabled())
            .with_driver(move || driver.clone())
            .with_profile(quick_profile())
            .with_hold(HoldPolicy::For(Duration::ZERO))
    }

    #[tokio::test]
    async fn interactive_source_skips_failed_day_in_diagnostic_mode() {
        let driver = FakeDriver {
            failing_tabs: [2].into_iter().collect(),
            ..FakeDriver::default()
        };
        let source = SourceConfig::html("Espace", "https://menu.test", "https://menu.test").interactive();

        let menu = diagnostic_acquirer(driver).acquire(&source).await.unwrap();

        assert_eq!(menu.kind, MenuKind::Html);
        for day in ["Monday", "Tuesday", "Thursday", "Friday"] {
            assert!(menu.text.contains(&format!("<h2>{day}</h2>")), "{day} missing");
        }
        assert!(!menu.text.contains("Wednesday"));
        // Day comments are stripped by the reducer.
        assert!(!menu.text.contains("<!--"));
    }

    #[tokio::test]
    async fn pdf_source_without_selector_is_rejected_before_any_request() {
        let mut source = SourceConfig::pdf("Freibank", "http://127.0.0.1:9/", "http://127.0.0.1:9/", "a");
        source.selector = None;

        let err = diagnostic_acquirer(FakeDriver::default())
            .acquire(&source)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::MissingSelector(name) if name == "Freibank"));
    }
}
