//! Markup contract of the image search portal.
//!
//! Everything that depends on the portal's page structure lives here so a
//! markup change touches one value instead of the harvest loop. The
//! defaults track Google Images and are expected to drift.

use crate::driver::Selector;
use crate::types::ImageKind;

#[derive(Debug, Clone)]
pub struct PortalLayout {
    /// Page that hosts the search box.
    pub entry_url: String,
    pub search_box: Selector,
    /// One element per search result.
    pub result_container: Selector,
    /// Full-resolution image inside the opened detail pane.
    pub high_res_image: Selector,
    /// Label of the button that reveals the search tools bar.
    pub tools_label: String,
    /// Label of the type dropdown inside the tools bar.
    pub type_label: String,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            entry_url: "https://www.google.com/imghp".to_string(),
            search_box: Selector::css("textarea[name='q'], input[name='q']"),
            result_container: Selector::css("div[jsname='dTDiAc']"),
            high_res_image: Selector::css("img.sFlh5c.FyHeAf.iPVvYb"),
            tools_label: "Tools".to_string(),
            type_label: "Type".to_string(),
        }
    }
}

impl PortalLayout {
    /// Selector for a menu entry whose visible text is exactly `label`.
    pub fn menu_item(&self, label: &str) -> Selector {
        Selector::xpath(format!("//div[text()={}]", xpath_literal(label)))
    }

    pub fn tools_button(&self) -> Selector {
        self.menu_item(&self.tools_label)
    }

    pub fn type_button(&self) -> Selector {
        self.menu_item(&self.type_label)
    }

    /// Menu label for an image kind, `None` for [`ImageKind::All`].
    pub fn type_option_label(&self, kind: ImageKind) -> Option<&'static str> {
        match kind {
            ImageKind::Photo => Some("Photo"),
            ImageKind::Clipart => Some("Clip art"),
            ImageKind::Lineart => Some("Line drawing"),
            ImageKind::Gif => Some("GIF"),
            ImageKind::Transparent => Some("Transparent"),
            ImageKind::All => None,
        }
    }
}

/// Quote a string for use inside an XPath expression.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
