//! Download session: the browser handle and the portal interactions on it.

use std::time::Duration;

use crate::config::{HarvestConfig, Timings};
use crate::driver::{BrowserDriver, BrowserLauncher, DriverError, ElementRef, Selector};
use crate::portal::PortalLayout;
use crate::types::{Candidate, HarvestError, ImageKind};

/// Sleep for a settle delay; zero delays return immediately.
pub(crate) async fn settle(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Owns the browser for one harvest. Closed exactly once via [`close`].
///
/// [`close`]: DownloadSession::close
pub struct DownloadSession {
    driver: Option<Box<dyn BrowserDriver>>,
    layout: PortalLayout,
    timings: Timings,
    element_timeout: Duration,
}

impl DownloadSession {
    /// Launch the browser. Nothing is navigated yet.
    pub async fn open(
        launcher: &dyn BrowserLauncher,
        config: &HarvestConfig,
    ) -> Result<Self, HarvestError> {
        let driver = launcher
            .launch(&config.browser_settings())
            .await
            .map_err(|e| HarvestError::Session(format!("could not open browser: {e}")))?;

        Ok(Self {
            driver: Some(driver),
            layout: config.layout.clone(),
            timings: config.timings,
            element_timeout: config.element_timeout,
        })
    }

    fn driver(&mut self) -> Result<&mut Box<dyn BrowserDriver>, DriverError> {
        self.driver.as_mut().ok_or(DriverError::Closed)
    }

    /// Navigate to the portal and submit `query`.
    pub async fn search(&mut self, query: &str) -> Result<(), HarvestError> {
        let entry_url = self.layout.entry_url.clone();
        let search_box = self.layout.search_box.clone();
        let timeout = self.element_timeout;

        tracing::info!("Navigating to {entry_url}");
        let driver = self.driver()?;
        driver
            .navigate(&entry_url)
            .await
            .map_err(|e| HarvestError::Session(format!("could not reach search page: {e}")))?;

        let input = driver
            .wait_until_present(&search_box, timeout)
            .await
            .map_err(|e| HarvestError::Session(format!("search box missing: {e}")))?;
        driver
            .submit_text(&input, query)
            .await
            .map_err(|e| HarvestError::Session(format!("could not submit query: {e}")))?;

        settle(self.timings.search_settle).await;
        Ok(())
    }

    /// Try to restrict results to `kind`. Returns whether the filter stuck.
    ///
    /// Failures are logged and the search simply stays unfiltered.
    pub async fn apply_filter(&mut self, kind: ImageKind) -> bool {
        if !kind.is_filtered() {
            return false;
        }
        tracing::info!("Setting image type filter to {kind}");
        match self.try_apply_filter(kind).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not set image type filter: {e}");
                false
            }
        }
    }

    async fn try_apply_filter(&mut self, kind: ImageKind) -> Result<(), HarvestError> {
        let label = self.layout.type_option_label(kind).ok_or_else(|| {
            HarvestError::FilterUnavailable(format!("no menu entry for {kind}"))
        })?;
        let steps = [
            (self.layout.tools_button(), self.timings.filter_step_settle),
            (self.layout.type_button(), self.timings.filter_step_settle),
            (self.layout.menu_item(label), self.timings.filter_apply_settle),
        ];

        for (selector, delay) in steps {
            self.click_when_present(&selector)
                .await
                .map_err(|e| HarvestError::FilterUnavailable(e.to_string()))?;
            settle(delay).await;
        }
        Ok(())
    }

    async fn click_when_present(&mut self, selector: &Selector) -> Result<(), DriverError> {
        let timeout = self.element_timeout;
        let driver = self.driver()?;
        let element = driver.wait_until_present(selector, timeout).await?;
        driver.click(&element).await
    }

    /// Number of result containers currently loaded.
    pub async fn result_count(&mut self) -> Result<usize, DriverError> {
        let selector = self.layout.result_container.clone();
        self.driver()?.count(&selector).await
    }

    /// Ask the portal for more results.
    pub async fn scroll_to_bottom(&mut self) -> Result<(), DriverError> {
        self.driver()?.scroll_to_bottom().await?;
        settle(self.timings.scroll_settle).await;
        Ok(())
    }

    /// Bring a candidate into view and click it to open its detail pane.
    pub async fn open_candidate(&mut self, candidate: &Candidate) -> Result<(), DriverError> {
        let element = ElementRef::new(self.layout.result_container.clone(), candidate.index);
        let timings = self.timings;

        let driver = self.driver()?;
        driver.scroll_into_view(&element).await?;
        settle(timings.scroll_into_view_settle).await;

        let driver = self.driver()?;
        driver.click(&element).await?;
        settle(timings.click_settle).await;
        Ok(())
    }

    /// Wait for the detail pane's full-resolution image and read its source.
    pub async fn high_res_source(&mut self) -> Result<Option<String>, DriverError> {
        let selector = self.layout.high_res_image.clone();
        let timeout = self.element_timeout;
        let driver = self.driver()?;
        let image = driver.wait_until_present(&selector, timeout).await?;
        driver.attribute(&image, "src").await
    }

    /// Release the browser. Never fails; problems are logged.
    pub async fn close(mut self) {
        if let Some(driver) = self.driver.take() {
            tracing::info!("Closing browser");
            if let Err(e) = driver.close().await {
                tracing::error!("Error closing browser: {e}");
            }
        }
    }
}
