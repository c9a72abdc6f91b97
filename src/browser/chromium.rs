use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    PermissionDescriptor, PermissionSetting, SetPermissionParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::debug;

use super::BrowserDriver;
use crate::error::{AcquireError, Result};
use crate::fetch::USER_AGENT;

const HIDE_AUTOMATION_JS: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    window.chrome = { runtime: {} };
"#;

/// [`BrowserDriver`] backed by a local Chromium over the DevTools protocol.
#[derive(Default)]
pub struct ChromiumDriver {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(&self, step: &str) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AcquireError::browser(step, "browser not launched"))
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&mut self, visible: bool) -> Result<()> {
        let mut args = vec![
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
            format!("--user-agent={USER_AGENT}"),
        ];
        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if visible {
            args.push("--disable-blink-features=AutomationControlled".to_string());
            args.push("--disable-infobars".to_string());
            builder = builder.with_head();
        }
        let config = builder
            .args(args)
            .build()
            .map_err(|err| AcquireError::browser("launch", err))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| AcquireError::browser("launch", err))?;
        let handle = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| AcquireError::browser("open page", err))?;
        if visible {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_AUTOMATION_JS))
                .await
                .map_err(|err| AcquireError::browser("hide automation", err))?;
        }

        debug!(visible, "browser launched");
        self.browser = Some(browser);
        self.page = Some(page);
        self.handler = Some(handle);
        Ok(())
    }

    async fn deny_geolocation(&mut self, url: &str) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AcquireError::browser("deny geolocation", "browser not launched"))?;
        let mut params = SetPermissionParams::new(
            PermissionDescriptor::new("geolocation"),
            PermissionSetting::Denied,
        );
        params.origin = Url::parse(url)
            .ok()
            .map(|url| url.origin().ascii_serialization());
        browser
            .execute(params)
            .await
            .map_err(|err| AcquireError::browser("deny geolocation", err))?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page("navigate")?
            .goto(url)
            .await
            .map_err(|err| AcquireError::browser("navigate", err))?;
        Ok(())
    }

    async fn exists(&mut self, selector: &str) -> Result<bool> {
        Ok(self.page("find element")?.find_element(selector).await.is_ok())
    }

    async fn click_first(&mut self, selector: &str) -> Result<bool> {
        let Ok(element) = self.page("click")?.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|err| AcquireError::browser("click", err))?;
        Ok(true)
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<()> {
        let elements = self
            .page("click tab")?
            .find_elements(selector)
            .await
            .map_err(|err| AcquireError::browser("click tab", err))?;
        let element = elements.get(index).ok_or_else(|| {
            AcquireError::browser(
                "click tab",
                format!("only {} elements match '{selector}'", elements.len()),
            )
        })?;
        element
            .click()
            .await
            .map_err(|err| AcquireError::browser("click tab", err))?;
        Ok(())
    }

    async fn outer_html(&mut self, selector: &str) -> Result<String> {
        let element = self
            .page("read menu")?
            .find_element(selector)
            .await
            .map_err(|err| AcquireError::browser("read menu", err))?;
        element
            .outer_html()
            .await
            .map_err(|err| AcquireError::browser("read menu", err))?
            .ok_or_else(|| AcquireError::browser("read menu", format!("'{selector}' has no markup")))
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        let closed = match self.browser.take() {
            Some(mut browser) => browser
                .close()
                .await
                .map(|_| ())
                .map_err(|err| AcquireError::browser("close", err)),
            None => Ok(()),
        };
        if let Some(handle) = self.handler.take() {
            handle.abort();
        }
        closed
    }
}
