//! Configuration loading and resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image_harvest::chromium::CHROME_ENV;
use image_harvest::{
    find_chromium, BrowserLauncher, ChromiumLauncher, HarvestConfig, UnavailableLauncher,
};

/// Env var naming the directory images are saved under.
pub const OUTPUT_DIR_ENV: &str = "IMAGE_HARVEST_DIR";

/// Resolve the output root: explicit flag, then env var, then
/// `~/Pictures/image-harvest`, then `./image-harvest`.
pub fn resolve_output_root(explicit: Option<&Path>) -> PathBuf {
    output_root_from(
        explicit,
        std::env::var_os(OUTPUT_DIR_ENV),
        dirs::home_dir(),
    )
}

fn output_root_from(
    explicit: Option<&Path>,
    env: Option<OsString>,
    home: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Some(env_path) = env.filter(|v| !v.is_empty()) {
        return PathBuf::from(env_path);
    }

    match home {
        Some(home) => home.join("Pictures").join("image-harvest"),
        None => PathBuf::from("image-harvest"),
    }
}

/// Resolve the browser binary: explicit flag, then discovery.
pub fn resolve_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_chromium(),
    }
}

/// Server settings gathered from the command line.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub output_dir: Option<PathBuf>,
    pub chrome: Option<PathBuf>,
    pub headful: bool,
    pub scroll_budget: Option<u32>,
}

impl ServerOptions {
    pub fn harvest_config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::new(resolve_output_root(self.output_dir.as_deref()));
        config.browser.executable = resolve_chrome(self.chrome.as_deref());
        config.browser.headless = !self.headful;
        if let Some(budget) = self.scroll_budget {
            config.scroll_budget = budget;
        }
        config
    }

    /// Launcher for `config`. Without a browser binary the server still
    /// starts; every harvest then reports the missing browser as its error.
    pub fn launcher(&self, config: &HarvestConfig) -> Arc<dyn BrowserLauncher> {
        match &config.browser.executable {
            Some(path) => {
                tracing::info!("Browser: {}", path.display());
                Arc::new(ChromiumLauncher::new())
            }
            None => {
                tracing::warn!("No Chrome/Chromium found; pass --chrome or set {CHROME_ENV}");
                Arc::new(UnavailableLauncher::new(format!(
                    "Chrome/Chromium not found; pass --chrome or set {CHROME_ENV}"
                )))
            }
        }
    }
}
