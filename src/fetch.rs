use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::error::{AcquireError, Result};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub fn build_client() -> Result<Client> {
    Client::builder()
        // Menu hosts and local fixtures are reached directly, whatever *_PROXY says.
        .no_proxy()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|err| AcquireError::transport("<client>", err))
}

/// GETs `url` and returns the body, treating non-2xx answers as failures.
pub async fn get_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| AcquireError::transport(url, err))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AcquireError::Status {
            url: url.to_string(),
            status,
        });
    }

    response
        .text()
        .await
        .map_err(|err| AcquireError::transport(url, err))
}

/// One content-selection rule of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeRule {
    AllDivs,
    MenuAttributes,
    MainContent,
    Body,
}

impl CascadeRule {
    pub const ORDER: [CascadeRule; 4] = [
        CascadeRule::AllDivs,
        CascadeRule::MenuAttributes,
        CascadeRule::MainContent,
        CascadeRule::Body,
    ];

    pub fn selector(self) -> &'static str {
        match self {
            CascadeRule::AllDivs => "div",
            CascadeRule::MenuAttributes => {
                "[class*='menu'], [id*='menu'], [class*='lunch'], [id*='lunch']"
            }
            CascadeRule::MainContent => "div.container > div, main, article, #content",
            CascadeRule::Body => "body",
        }
    }

    /// Inner markup of every match, concatenated in document order.
    pub fn select(self, html: &str) -> String {
        let document = Html::parse_document(html);
        let selector = Selector::parse(self.selector()).expect("cascade selectors are valid");
        document
            .select(&selector)
            .map(|element| element.inner_html())
            .collect()
    }
}

/// Outcome of a cascade run; `rule` is `None` when every rule came back empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub content: String,
    pub rule: Option<CascadeRule>,
}

/// Tries each rule against a fresh load of `url`, first non-empty result wins.
pub struct StaticCascade {
    client: Client,
}

impl StaticCascade {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<CascadeOutcome> {
        for rule in CascadeRule::ORDER {
            // Every rule gets its own page load so one rule's parse never leaks into the next.
            let page = get_text(&self.client, url).await?;
            let content = rule.select(&page);
            debug!(url = %url, rule = ?rule, bytes = content.len(), "cascade rule applied");
            if !content.is_empty() {
                info!(url = %url, rule = ?rule, "menu content found");
                return Ok(CascadeOutcome {
                    content,
                    rule: Some(rule),
                });
            }
        }

        info!(url = %url, "no cascade rule yielded content");
        Ok(CascadeOutcome {
            content: String::new(),
            rule: None,
        })
    }
}

/// The cascade's rule priority applied to a single parsed page.
pub fn select_first_non_empty(html: &str) -> CascadeOutcome {
    CascadeRule::ORDER
        .into_iter()
        .map(|rule| (rule, rule.select(html)))
        .find(|(_, content)| !content.is_empty())
        .map_or(
            CascadeOutcome {
                content: String::new(),
                rule: None,
            },
            |(rule, content)| CascadeOutcome {
                content,
                rule: Some(rule),
            },
        )
}
