//! Browser capability interface.
//!
//! Defines the `BrowserLauncher` and `BrowserDriver` traits the harvest loop
//! drives. The production implementation lives in [`crate::chromium`]; tests
//! plug in scripted drivers.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// How an element is located on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(s: impl Into<String>) -> Self {
        Selector::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Selector::XPath(s.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Positional reference to an element: the `index`-th match of `selector`.
///
/// Drivers resolve the reference against the live page every time it is
/// used, so a reference taken before a scroll may point elsewhere after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: Selector,
    pub index: usize,
}

impl ElementRef {
    pub fn new(selector: Selector, index: usize) -> Self {
        Self { selector, index }
    }

    pub fn first(selector: Selector) -> Self {
        Self::new(selector, 0)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.selector, self.index)
    }
}

/// Launch options for the automated browser.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Browser binary. Looked up on `PATH` when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    /// Extra command-line switches appended after the built-in ones.
    pub extra_args: Vec<String>,
    /// User agent the page session reports.
    pub user_agent: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
            user_agent: None,
        }
    }
}

/// Errors raised by a browser driver.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("timed out after {waited:?} waiting for {target}")]
    Timeout { target: String, waited: Duration },

    #[error("element not found: {0}")]
    NotFound(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("browser session already closed")]
    Closed,
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser and open one page.
    async fn launch(&self, settings: &BrowserSettings) -> DriverResult<Box<dyn BrowserDriver>>;
}

/// One open browser page.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Navigate the page to a URL.
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;
    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &Selector) -> DriverResult<usize>;
    /// Resolve the first match of `selector`, failing with `NotFound`.
    async fn find(&mut self, selector: &Selector) -> DriverResult<ElementRef>;
    /// Poll until `selector` matches or `timeout` elapses.
    async fn wait_until_present(
        &mut self,
        selector: &Selector,
        timeout: Duration,
    ) -> DriverResult<ElementRef>;
    async fn click(&mut self, element: &ElementRef) -> DriverResult<()>;
    async fn scroll_into_view(&mut self, element: &ElementRef) -> DriverResult<()>;
    async fn scroll_to_bottom(&mut self) -> DriverResult<()>;
    /// Read an attribute; `None` when the element lacks it.
    async fn attribute(&mut self, element: &ElementRef, name: &str) -> DriverResult<Option<String>>;
    /// Replace the element's text with `text` and press Enter.
    async fn submit_text(&mut self, element: &ElementRef, text: &str) -> DriverResult<()>;
    /// Shut the browser down.
    async fn close(self: Box<Self>) -> DriverResult<()>;
}

/// A launcher that always fails, for hosts without a browser.
pub struct UnavailableLauncher {
    reason: String,
}

impl UnavailableLauncher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self, _settings: &BrowserSettings) -> DriverResult<Box<dyn BrowserDriver>> {
        Err(DriverError::Launch(self.reason.clone()))
    }
}
