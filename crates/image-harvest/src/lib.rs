//! Image Harvest: drive a headless browser through image search results,
//! download the full-resolution images and keep the ones large enough.

pub mod chromium;
pub mod config;
pub mod controller;
pub mod driver;
pub mod enumerator;
pub mod fetcher;
pub mod naming;
pub mod portal;
pub mod progress;
pub mod session;
pub mod staging;
pub mod types;

pub use chromium::{find_chromium, ChromiumLauncher};
pub use config::{HarvestConfig, Timings, DEFAULT_USER_AGENT};
pub use controller::{HarvestState, Harvester};
pub use driver::{
    BrowserDriver, BrowserLauncher, BrowserSettings, DriverError, DriverResult, ElementRef,
    Selector, UnavailableLauncher,
};
pub use portal::PortalLayout;
pub use progress::{NoProgress, ProgressSink};
pub use types::*;
