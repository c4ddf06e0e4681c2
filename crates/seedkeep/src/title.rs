//! Observed context for account discovery
//!
//! Browsers usually put the page title, the URL and their own name in the
//! window title, separated by " - ". That is parsed into fields the
//! recognition rules can inspect, together with the user, working
//! directory and environment of the calling process.

use regex::Regex;
use std::collections::HashMap;
use std::process::Command;
use std::sync::OnceLock;
use tracing::debug;

/// Context a discovery sweep recognizes against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedData {
    /// Window title exactly as observed
    pub rawtitle: Option<String>,
    /// Page title with URL and browser removed
    pub title: Option<String>,
    pub url: Option<String>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub path: Option<String>,
    pub browser: Option<String>,
    pub user: Option<String>,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
}

/// Pieces of a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub protocol: Option<String>,
    pub host: String,
    pub path: String,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<title>.*?) - )?(?P<url>[a-zA-Z][\w+.-]*://\S+)(?: - (?P<browser>.+))?$")
            .expect("title pattern compiles")
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<protocol>[a-zA-Z][\w+.-]*)://)?(?P<host>[^/:?#\s]+)(?::\d+)?(?P<path>/[^?#\s]*)?")
            .expect("url pattern compiles")
    })
}

/// Split a URL (with or without protocol) into protocol, host and path
pub fn split_url(url: &str) -> Option<UrlParts> {
    let caps = url_regex().captures(url.trim())?;
    Some(UrlParts {
        protocol: caps.name("protocol").map(|m| m.as_str().to_lowercase()),
        host: caps.name("host")?.as_str().to_lowercase(),
        path: caps
            .name("path")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
    })
}

impl ObservedData {
    /// Parse a window title
    pub fn from_title(rawtitle: &str) -> Self {
        let mut data = Self {
            rawtitle: Some(rawtitle.to_string()),
            ..Self::default()
        };

        match title_regex().captures(rawtitle.trim()) {
            Some(caps) => {
                data.title = caps
                    .name("title")
                    .map(|m| m.as_str().to_string())
                    .filter(|t| !t.is_empty());
                data.browser = caps.name("browser").map(|m| m.as_str().to_string());
                if let Some(url) = caps.name("url") {
                    data.url = Some(url.as_str().to_string());
                    if let Some(parts) = split_url(url.as_str()) {
                        data.protocol = parts.protocol;
                        data.host = Some(parts.host);
                        data.path = Some(parts.path);
                    }
                }
            }
            None => data.title = Some(rawtitle.to_string()),
        }

        data
    }

    /// Capture the context of the calling process
    ///
    /// Uses `title` when given, otherwise asks the window system for the
    /// title of the active window.
    pub fn capture(title: Option<&str>) -> Self {
        let rawtitle = match title {
            Some(t) => Some(t.to_string()),
            None => active_window_title(),
        };

        let mut data = match rawtitle {
            Some(t) => Self::from_title(&t),
            None => Self::default(),
        };

        data.user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok();
        data.cwd = std::env::current_dir()
            .ok()
            .map(|p| p.to_string_lossy().to_string());
        data.env = std::env::vars().collect();
        data
    }
}

/// Title of the focused window, if xdotool can tell us
pub fn active_window_title() -> Option<String> {
    let output = Command::new("xdotool")
        .args(["getactivewindow", "getwindowname"])
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("xdotool failed: {}", String::from_utf8_lossy(&output.stderr).trim());
        return None;
    }
    let title = String::from_utf8(output.stdout).ok()?.trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_title() {
        let data = ObservedData::from_title(
            "Sign in to GitHub - https://github.com/login?return_to=x - Mozilla Firefox",
        );
        assert_eq!(data.title.as_deref(), Some("Sign in to GitHub"));
        assert_eq!(data.protocol.as_deref(), Some("https"));
        assert_eq!(data.host.as_deref(), Some("github.com"));
        assert_eq!(data.path.as_deref(), Some("/login"));
        assert_eq!(data.browser.as_deref(), Some("Mozilla Firefox"));
    }

    #[test]
    fn test_url_only_title() {
        let data = ObservedData::from_title("https://example.com");
        assert_eq!(data.title, None);
        assert_eq!(data.host.as_deref(), Some("example.com"));
        assert_eq!(data.path.as_deref(), Some("/"));
        assert_eq!(data.browser, None);
    }

    #[test]
    fn test_plain_title() {
        let data = ObservedData::from_title("Terminal - vim notes.txt");
        assert_eq!(data.title.as_deref(), Some("Terminal - vim notes.txt"));
        assert_eq!(data.host, None);
        assert_eq!(data.rawtitle.as_deref(), Some("Terminal - vim notes.txt"));
    }

    #[test]
    fn test_split_url() {
        let parts = split_url("HTTPS://Bank.Example.com:8443/accounts/login").unwrap();
        assert_eq!(parts.protocol.as_deref(), Some("https"));
        assert_eq!(parts.host, "bank.example.com");
        assert_eq!(parts.path, "/accounts/login");

        let parts = split_url("example.com").unwrap();
        assert_eq!(parts.protocol, None);
        assert_eq!(parts.path, "/");
    }

    #[test]
    fn test_capture_with_title() {
        let data = ObservedData::capture(Some("Inbox - https://mail.example.com/ - Chromium"));
        assert_eq!(data.host.as_deref(), Some("mail.example.com"));
        assert!(data.cwd.is_some());
    }
}
