//! Start page resolution

use serde::Serialize;

/// What the window shows at startup and after a URL change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "camelCase")]
pub enum StartPage {
    /// Bundled page shown when no URL is configured
    LocalDefault,
    Remote(String),
}

impl StartPage {
    /// Map a stored URL to a page, assuming `https://` for bare hosts
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();
        if url.is_empty() {
            return Self::LocalDefault;
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            Self::Remote(url.to_string())
        } else {
            Self::Remote(format!("https://{url}"))
        }
    }
}
