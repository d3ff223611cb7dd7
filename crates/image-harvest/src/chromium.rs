//! Chromium-backed browser driver using chromiumoxide.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::driver::{
    BrowserDriver, BrowserLauncher, BrowserSettings, DriverError, DriverResult, ElementRef,
    Selector,
};

/// Env var that overrides browser discovery.
pub const CHROME_ENV: &str = "IMAGE_HARVEST_CHROME";

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Switches that keep the page from advertising automation.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-gpu",
    "--no-first-run",
    "--no-default-browser-check",
    "--no-sandbox",
    "--mute-audio",
    "--window-size=1366,900",
];

/// Hides `navigator.webdriver` before any page script runs.
const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });";

/// Find a Chrome or Chromium binary.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{CHROME_ENV} points to missing file: {p}");
    }

    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "chrome",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

fn protocol(e: impl fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

/// Launches headless Chromium instances.
#[derive(Debug, Default, Clone)]
pub struct ChromiumLauncher;

impl ChromiumLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, settings: &BrowserSettings) -> DriverResult<Box<dyn BrowserDriver>> {
        let chrome_path = settings
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                DriverError::Launch(format!(
                    "Chrome/Chromium not found; install it or set {CHROME_ENV}"
                ))
            })?;

        tracing::info!(
            "Launching browser {} (headless={})",
            chrome_path.display(),
            settings.headless
        );

        // Default args include --enable-automation, which is what we want gone.
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .disable_default_args();
        if settings.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error: {e}");
                }
            }
        });

        let mut driver = ChromiumDriver {
            browser,
            page: None,
            handler_task,
        };

        // From here on a failure must not leak the browser process.
        match driver.prepare_page(settings).await {
            Ok(page) => {
                driver.page = Some(page);
                Ok(Box::new(driver))
            }
            Err(e) => {
                if let Err(close_err) = Box::new(driver).close().await {
                    tracing::warn!("Failed to close half-open browser: {close_err}");
                }
                Err(e)
            }
        }
    }
}

/// One Chromium process with a single page.
pub struct ChromiumDriver {
    browser: Browser,
    page: Option<Page>,
    handler_task: JoinHandle<()>,
}

impl ChromiumDriver {
    async fn prepare_page(&self, settings: &BrowserSettings) -> DriverResult<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(format!("failed to open page: {e}")))?;

        if let Some(ua) = &settings.user_agent {
            page.set_user_agent(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(protocol)?;
        }
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
            .await
            .map_err(protocol)?;

        Ok(page)
    }

    fn page(&self) -> DriverResult<&Page> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    async fn find_all(&self, selector: &Selector) -> DriverResult<Vec<Element>> {
        let page = self.page()?;
        let found = match selector {
            Selector::Css(css) => page.find_elements(css.as_str()).await,
            Selector::XPath(xpath) => page.find_xpaths(xpath.as_str()).await,
        };
        found.map_err(protocol)
    }

    async fn resolve(&self, element: &ElementRef) -> DriverResult<Element> {
        self.find_all(&element.selector)
            .await?
            .into_iter()
            .nth(element.index)
            .ok_or_else(|| DriverError::NotFound(element.to_string()))
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let page = self.page()?;
        match tokio::time::timeout(NAVIGATION_TIMEOUT, page.goto(url)).await {
            Ok(Ok(_)) => {
                if let Err(e) = page.wait_for_navigation().await {
                    tracing::debug!("wait_for_navigation after {url}: {e}");
                }
                Ok(())
            }
            Ok(Err(e)) => Err(DriverError::Protocol(format!("navigation to {url} failed: {e}"))),
            Err(_) => Err(DriverError::Timeout {
                target: url.to_string(),
                waited: NAVIGATION_TIMEOUT,
            }),
        }
    }

    async fn count(&mut self, selector: &Selector) -> DriverResult<usize> {
        Ok(self.find_all(selector).await?.len())
    }

    async fn find(&mut self, selector: &Selector) -> DriverResult<ElementRef> {
        let element = ElementRef::first(selector.clone());
        self.resolve(&element).await?;
        Ok(element)
    }

    async fn wait_until_present(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> DriverResult<ElementRef> {
        let started = Instant::now();
        loop {
            match self.find_all(selector).await {
                Ok(found) if !found.is_empty() => return Ok(ElementRef::first(selector.clone())),
                Ok(_) => {}
                // An empty XPath search surfaces as an error on some builds.
                Err(e) => tracing::trace!("waiting for {selector}: {e}"),
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::Timeout {
                    target: selector.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, element: &ElementRef) -> DriverResult<()> {
        let el = self.resolve(element).await?;
        el.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: &ElementRef) -> DriverResult<()> {
        let el = self.resolve(element).await?;
        el.scroll_into_view().await.map_err(protocol)?;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> DriverResult<()> {
        self.page()?
            .evaluate("window.scrollTo(0, document.body.scrollHeight);")
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn attribute(&mut self, element: &ElementRef, name: &str) -> DriverResult<Option<String>> {
        let el = self.resolve(element).await?;
        el.attribute(name).await.map_err(protocol)
    }

    async fn submit_text(&mut self, element: &ElementRef, text: &str) -> DriverResult<()> {
        let el = self.resolve(element).await?;
        el.click().await.map_err(protocol)?;
        el.call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(protocol)?;
        el.type_str(text).await.map_err(protocol)?;
        el.press_key("Enter").await.map_err(protocol)?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> DriverResult<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Page close failed: {e}");
            }
        }
        let closed = self.browser.close().await.map_err(protocol);
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Waiting for browser exit failed: {e}");
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_find_and_read_attribute() {
        let launcher = ChromiumLauncher::new();
        let mut driver = launcher
            .launch(&BrowserSettings::default())
            .await
            .expect("failed to launch browser");

        driver
            .navigate("data:text/html,<div class=c>a</div><div class=c>b</div><img id=i src='https://example.com/x.jpg'>")
            .await
            .expect("navigation failed");

        assert_eq!(driver.count(&Selector::css("div.c")).await.unwrap(), 2);

        let img = driver
            .wait_until_present(&Selector::css("img#i"), Duration::from_secs(2))
            .await
            .expect("image not found");
        let src = driver.attribute(&img, "src").await.unwrap();
        assert_eq!(src.as_deref(), Some("https://example.com/x.jpg"));

        let missing = driver
            .wait_until_present(&Selector::css("video"), Duration::from_millis(300))
            .await;
        assert!(missing.unwrap_err().is_timeout());

        driver.close().await.expect("close failed");
    }
}
