//! Harvest configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::driver::BrowserSettings;
use crate::portal::PortalLayout;

/// Client identity sent with image downloads and reported by the browser.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

pub const DEFAULT_SCROLL_BUDGET: u32 = 10;

/// Fixed waits that let the portal's UI settle between interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// After submitting the query.
    pub search_settle: Duration,
    /// After opening the tools bar or the type menu.
    pub filter_step_settle: Duration,
    /// After picking a type option.
    pub filter_apply_settle: Duration,
    /// After scrolling a candidate into view.
    pub scroll_into_view_settle: Duration,
    /// After clicking a candidate.
    pub click_settle: Duration,
    /// After scrolling to the bottom of the results.
    pub scroll_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            search_settle: Duration::from_secs(2),
            filter_step_settle: Duration::from_secs(1),
            filter_apply_settle: Duration::from_secs(2),
            scroll_into_view_settle: Duration::from_millis(500),
            click_settle: Duration::from_secs(1),
            scroll_settle: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// No settle delays at all, for scripted drivers.
    pub fn instant() -> Self {
        Self {
            search_settle: Duration::ZERO,
            filter_step_settle: Duration::ZERO,
            filter_apply_settle: Duration::ZERO,
            scroll_into_view_settle: Duration::ZERO,
            click_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        }
    }
}

/// Everything a harvest needs besides the request itself.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Per-query directories are created below this root.
    pub output_root: PathBuf,
    /// Where staging directories go; the system temp dir when unset.
    pub staging_root: Option<PathBuf>,
    pub scroll_budget: u32,
    /// Bound on every wait for a page element.
    pub element_timeout: Duration,
    /// Bound on one image download.
    pub request_timeout: Duration,
    pub user_agent: String,
    pub timings: Timings,
    pub browser: BrowserSettings,
    pub layout: PortalLayout,
}

impl HarvestConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            staging_root: None,
            scroll_budget: DEFAULT_SCROLL_BUDGET,
            element_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timings: Timings::default(),
            browser: BrowserSettings::default(),
            layout: PortalLayout::default(),
        }
    }

    /// Browser settings with the configured user agent filled in.
    pub fn browser_settings(&self) -> BrowserSettings {
        let mut settings = self.browser.clone();
        if settings.user_agent.is_none() {
            settings.user_agent = Some(self.user_agent.clone());
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::new("/tmp/out");
        assert_eq!(config.scroll_budget, 10);
        assert_eq!(config.element_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.browser.headless);
    }

    #[test]
    fn test_browser_settings_inherit_user_agent() {
        let mut config = HarvestConfig::new("/tmp/out");
        assert_eq!(
            config.browser_settings().user_agent.as_deref(),
            Some(DEFAULT_USER_AGENT)
        );

        config.browser.user_agent = Some("custom".to_string());
        assert_eq!(config.browser_settings().user_agent.as_deref(), Some("custom"));
    }
}
