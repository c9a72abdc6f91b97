//! Menu extraction for single-page apps that render one tab per weekday.
//!
//! The sequence is a small state machine:
//! `Launching -> AwaitingTabs -> DecliningCookies -> PerDay(0..5) -> Done`,
//! with `Failed` reachable from every step. [`TabbedMenuExtractor::advance`]
//! performs exactly one transition.

pub mod chromium;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Weekday;
use tracing::{debug, info, warn};

use crate::config::RunMode;
use crate::error::{AcquireError, Result};

pub use chromium::ChromiumDriver;

/// Budget for the whole sequence, from launch to the last day's read.
pub const OVERALL_TIMEOUT: Duration = Duration::from_secs(60);

pub const WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Remote control over one rendering-engine instance with a single page.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn launch(&mut self, visible: bool) -> Result<()>;
    async fn deny_geolocation(&mut self, url: &str) -> Result<()>;
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn exists(&mut self, selector: &str) -> Result<bool>;
    /// Clicks the first match. `Ok(false)` when nothing matches.
    async fn click_first(&mut self, selector: &str) -> Result<bool>;
    /// Clicks the zero-based `index`-th match.
    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<()>;
    async fn outer_html(&mut self, selector: &str) -> Result<String>;
    async fn close(&mut self) -> Result<()>;
}

/// Selectors and delays for one tabbed menu app.
#[derive(Debug, Clone)]
pub struct TabProfile {
    pub tab_list: String,
    pub tab: String,
    pub cookie_reject: String,
    pub menu_container: String,
    pub settle: Duration,
    pub cookie_settle: Duration,
    pub poll_interval: Duration,
    /// Limit for each click, settle and read triplet.
    pub step_timeout: Duration,
}

impl TabProfile {
    /// SV-restaurant weekly menu app.
    pub fn sv_restaurant() -> Self {
        Self {
            tab_list: "nav.menu-plan-tabs".to_string(),
            tab: "nav.menu-plan-tabs a".to_string(),
            cookie_reject: "#onetrust-reject-all-handler".to_string(),
            menu_container: ".menu-plan-grid".to_string(),
            settle: Duration::from_secs(1),
            cookie_settle: Duration::from_secs(2),
            poll_interval: Duration::from_millis(250),
            step_timeout: Duration::from_secs(10),
        }
    }
}

/// What a diagnostic run does once the sequence has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldPolicy {
    Forever,
    For(Duration),
}

#[derive(Debug)]
pub enum Stage {
    Launching,
    AwaitingTabs,
    DecliningCookies,
    /// Zero-based index into [`WEEKDAYS`].
    PerDay(usize),
    Done,
    Failed(AcquireError),
}

pub struct TabbedMenuExtractor<D> {
    driver: D,
    profile: TabProfile,
    mode: RunMode,
    hold: HoldPolicy,
    overall_timeout: Duration,
    url: String,
    document: String,
    skipped: Vec<Weekday>,
}

impl<D: BrowserDriver> TabbedMenuExtractor<D> {
    pub fn new(driver: D, profile: TabProfile, mode: RunMode, url: &str) -> Self {
        Self {
            driver,
            profile,
            mode,
            hold: HoldPolicy::Forever,
            overall_timeout: OVERALL_TIMEOUT,
            url: url.to_string(),
            document: String::new(),
            skipped: Vec::new(),
        }
    }

    pub fn with_hold(mut self, hold: HoldPolicy) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    /// Days that failed and were skipped in diagnostic mode.
    pub fn skipped(&self) -> &[Weekday] {
        &self.skipped
    }

    /// Runs the whole sequence and returns the day-labelled document.
    ///
    /// In diagnostic mode the browser stays open afterwards according to the
    /// hold policy, whether the sequence succeeded or not.
    pub async fn run(&mut self) -> Result<String> {
        let limit = self.overall_timeout;
        let result = match tokio::time::timeout(limit, self.drive()).await {
            Ok(result) => result,
            Err(_) => Err(AcquireError::Timeout {
                step: "menu extraction".to_string(),
                after: limit,
            }),
        };

        if self.mode.is_diagnostic() {
            if let Err(err) = &result {
                warn!(error = %err, "browser sequence failed, keeping browser open for inspection");
            }
            self.hold().await;
        }

        if let Err(err) = self.driver.close().await {
            debug!(error = %err, "error closing browser");
        }
        result
    }

    async fn drive(&mut self) -> Result<String> {
        let mut stage = Stage::Launching;
        loop {
            stage = match stage {
                Stage::Done => return Ok(std::mem::take(&mut self.document)),
                Stage::Failed(err) => return Err(err),
                current => self.advance(current).await,
            };
        }
    }

    /// Performs one transition of the sequence.
    pub async fn advance(&mut self, stage: Stage) -> Stage {
        match stage {
            Stage::Launching => {
                let visible = self.mode.is_diagnostic();
                match self.driver.launch(visible).await {
                    Ok(()) => Stage::AwaitingTabs,
                    Err(err) => Stage::Failed(err),
                }
            }
            Stage::AwaitingTabs => match self.await_tabs().await {
                Ok(()) => Stage::DecliningCookies,
                Err(err) => Stage::Failed(err),
            },
            Stage::DecliningCookies => {
                match self.driver.click_first(&self.profile.cookie_reject).await {
                    Ok(true) => debug!("declined cookies"),
                    Ok(false) => debug!("no cookie banner"),
                    Err(err) => debug!(error = %err, "could not decline cookies"),
                }
                tokio::time::sleep(self.profile.cookie_settle).await;
                Stage::PerDay(0)
            }
            Stage::PerDay(index) if index >= WEEKDAYS.len() => Stage::Done,
            Stage::PerDay(index) => {
                let day = WEEKDAYS[index];
                match self.extract_day(index).await {
                    Ok(fragment) => {
                        let name = day_name(day);
                        self.document.push_str(&format!(
                            "<!-- {name} Menu -->\n<h2>{name}</h2>\n{fragment}\n"
                        ));
                        info!(day = name, bytes = fragment.len(), "extracted day menu");
                        Stage::PerDay(index + 1)
                    }
                    Err(err) if self.mode.is_diagnostic() => {
                        warn!(day = day_name(day), error = %err, "skipping day");
                        self.skipped.push(day);
                        Stage::PerDay(index + 1)
                    }
                    Err(err) => Stage::Failed(err),
                }
            }
            terminal => terminal,
        }
    }

    async fn await_tabs(&mut self) -> Result<()> {
        if let Err(err) = self.driver.deny_geolocation(&self.url).await {
            warn!(error = %err, "could not deny geolocation");
        }
        self.driver.navigate(&self.url).await?;

        // Bounded by the overall timeout only.
        while !self.driver.exists(&self.profile.tab_list).await? {
            tokio::time::sleep(self.profile.poll_interval).await;
        }
        debug!(url = %self.url, "weekday tabs rendered");
        Ok(())
    }

    async fn extract_day(&mut self, index: usize) -> Result<String> {
        let driver = &mut self.driver;
        let profile = &self.profile;
        let step = format!("{} tab", day_name(WEEKDAYS[index]));
        bounded(&step, profile.step_timeout, async move {
            driver.click_nth(&profile.tab, index).await?;
            tokio::time::sleep(profile.settle).await;
            driver.outer_html(&profile.menu_container).await
        })
        .await
    }

    async fn hold(&self) {
        match self.hold {
            HoldPolicy::Forever => {
                info!("browser kept open for inspection, stop the process to exit");
                std::future::pending::<()>().await;
            }
            HoldPolicy::For(duration) => {
                info!(?duration, "browser kept open for inspection");
                tokio::time::sleep(duration).await;
            }
        }
    }
}

async fn bounded<T>(
    step: &str,
    limit: Duration,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or_else(|_| {
            Err(AcquireError::Timeout {
                step: step.to_string(),
                after: limit,
            })
        })
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeDriver, quick_profile};
    use super::*;

    fn extractor(driver: FakeDriver, mode: RunMode) -> TabbedMenuExtractor<FakeDriver> {
        TabbedMenuExtractor::new(driver, quick_profile(), mode, "https://menu.test/weekly")
            .with_hold(HoldPolicy::For(Duration::ZERO))
    }

    #[tokio::test]
    async fn collects_all_five_days_in_order() {
        let driver = FakeDriver::default();
        let calls = driver.clone();
        let html = extractor(driver, RunMode::Normal).run().await.unwrap();

        let monday = html.find("<!-- Monday Menu -->\n<h2>Monday</h2>\n<div>Menu 1</div>").unwrap();
        let friday = html.find("<!-- Friday Menu -->\n<h2>Friday</h2>\n<div>Menu 5</div>").unwrap();
        assert!(monday < friday);
        assert_eq!(html.matches("<h2>").count(), 5);

        let log = calls.calls();
        assert_eq!(log.first().map(String::as_str), Some("launch visible=false"));
        assert_eq!(log.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn diagnostic_mode_skips_failed_day() {
        let driver = FakeDriver {
            failing_tabs: [2].into_iter().collect(),
            ..FakeDriver::default()
        };
        let mut extractor = extractor(driver, RunMode::Diagnostic);
        let html = extractor.run().await.unwrap();

        for day in ["Monday", "Tuesday", "Thursday", "Friday"] {
            assert!(html.contains(&format!("<h2>{day}</h2>")), "{day} missing");
        }
        assert!(!html.contains("Wednesday"));
        assert_eq!(extractor.skipped(), &[Weekday::Wed]);
    }

    #[tokio::test]
    async fn normal_mode_aborts_on_failed_day() {
        let driver = FakeDriver {
            failing_tabs: [2].into_iter().collect(),
            ..FakeDriver::default()
        };
        let calls = driver.clone();
        let err = extractor(driver, RunMode::Normal).run().await.unwrap_err();

        assert!(matches!(err, AcquireError::Browser { .. }));
        assert!(!calls.calls().contains(&"tab 4".to_string()));
        assert_eq!(calls.calls().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn hanging_day_hits_step_timeout() {
        let driver = FakeDriver {
            hanging_tab: Some(0),
            ..FakeDriver::default()
        };
        let err = extractor(driver, RunMode::Normal).run().await.unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { step, .. } if step == "Monday tab"));
    }

    #[tokio::test]
    async fn overall_timeout_aborts_sequence() {
        let driver = FakeDriver {
            hanging_tab: Some(1),
            ..FakeDriver::default()
        };
        let mut profile = quick_profile();
        profile.step_timeout = Duration::from_secs(30);
        let err = TabbedMenuExtractor::new(driver, profile, RunMode::Normal, "https://menu.test")
            .with_timeout(Duration::from_millis(50))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Timeout { step, .. } if step == "menu extraction"));
    }

    #[tokio::test]
    async fn launch_failure_is_fatal() {
        let driver = FakeDriver {
            fail_launch: true,
            ..FakeDriver::default()
        };
        let calls = driver.clone();
        let err = extractor(driver, RunMode::Normal).run().await.unwrap_err();
        assert!(matches!(err, AcquireError::Browser { step, .. } if step == "launch"));
        assert!(!calls.calls().iter().any(|call| call.starts_with("navigate")));
    }

    #[tokio::test]
    async fn diagnostic_mode_holds_after_navigation_failure() {
        let driver = FakeDriver {
            fail_navigation: true,
            ..FakeDriver::default()
        };
        let calls = driver.clone();
        let started = tokio::time::Instant::now();
        let err = TabbedMenuExtractor::new(driver, quick_profile(), RunMode::Diagnostic, "https://menu.test")
            .with_hold(HoldPolicy::For(Duration::from_millis(30)))
            .run()
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(matches!(err, AcquireError::Browser { step, .. } if step == "navigate"));
        assert_eq!(calls.calls()[0], "launch visible=true");
    }

    #[tokio::test]
    async fn cookie_banner_is_optional() {
        for banner in [true, false] {
            let driver = FakeDriver {
                cookie_banner: banner,
                ..FakeDriver::default()
            };
            let html = extractor(driver, RunMode::Normal).run().await.unwrap();
            assert_eq!(html.matches("<h2>").count(), 5);
        }
    }

    #[tokio::test]
    async fn advance_walks_the_states() {
        let mut extractor = extractor(FakeDriver::default(), RunMode::Normal);
        let stage = extractor.advance(Stage::Launching).await;
        assert!(matches!(stage, Stage::AwaitingTabs));
        let stage = extractor.advance(stage).await;
        assert!(matches!(stage, Stage::DecliningCookies));
        let calls = extractor.driver.calls();
        let denied = calls.iter().position(|call| call == "deny geolocation").unwrap();
        let navigated = calls.iter().position(|call| call.starts_with("navigate ")).unwrap();
        assert!(denied < navigated, "{calls:?}");
        let stage = extractor.advance(stage).await;
        assert!(matches!(stage, Stage::PerDay(0)));
        let stage = extractor.advance(Stage::PerDay(5)).await;
        assert!(matches!(stage, Stage::Done));
    }
}
