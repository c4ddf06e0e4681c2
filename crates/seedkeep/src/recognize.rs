//! Recognition rules
//!
//! Each account may carry rules that look at observed context and, when
//! they match, produce the script that should be typed for that context.
//!
//! ```yaml
//! discovery:
//!   - url: ["https://github.com/login"]
//!     script: "{username}{tab}{passcode}{return}"
//!   - all:
//!       - host: ["*.example.com"]
//!       - user: [alice]
//!     name: work
//! ```

use crate::error::SeedkeepError;
use crate::title::{split_url, ObservedData};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One rule: what to match, plus the label and script it yields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionRule {
    #[serde(flatten)]
    pub matcher: Matcher,

    /// Label shown when several matches have to be chosen between
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Script produced on a match; defaults to the default field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

/// Result of a rule that matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognized {
    pub key: Option<String>,
    pub script: String,
}

/// Conditions a rule can test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Glob patterns over the raw window title
    Title(Vec<String>),
    /// URLs whose host matches and whose path is a prefix of the observed path
    Url(Vec<String>),
    /// URLs whose host and path match exactly
    ExactUrl(Vec<String>),
    /// Host names, `*.example.com` also matching `example.com`
    Host(Vec<String>),
    /// User names
    User(Vec<String>),
    /// Directories the working directory must be inside of
    Cwd(Vec<String>),
    /// An environment variable, optionally with a required value
    EnvVar {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Every nested matcher must match
    All(Vec<Matcher>),
    /// At least one nested matcher must match
    Any(Vec<Matcher>),
}

impl RecognitionRule {
    pub fn new(matcher: Matcher) -> Self {
        Self {
            matcher,
            name: None,
            script: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    /// Evaluate against observed data
    pub fn recognize(&self, data: &ObservedData, default_field: &str) -> Option<Recognized> {
        if !self.matcher.matches(data) {
            return None;
        }
        let script = self
            .script
            .clone()
            .unwrap_or_else(|| format!("{{{}}}", default_field));
        Some(Recognized {
            key: self.name.clone(),
            script,
        })
    }

    /// Check the rule can be evaluated
    pub fn validate(&self) -> Result<()> {
        self.matcher.validate()
    }
}

impl Matcher {
    /// Check whether observed data satisfies this matcher
    pub fn matches(&self, data: &ObservedData) -> bool {
        match self {
            Matcher::Title(patterns) => match &data.rawtitle {
                Some(title) => patterns.iter().any(|p| matches_glob(title, p)),
                None => false,
            },
            Matcher::Url(urls) => urls.iter().any(|u| matches_url(data, u, false)),
            Matcher::ExactUrl(urls) => urls.iter().any(|u| matches_url(data, u, true)),
            Matcher::Host(hosts) => match &data.host {
                Some(host) => {
                    let host = host.to_lowercase();
                    hosts.iter().any(|p| matches_host(&host, &p.to_lowercase()))
                }
                None => false,
            },
            Matcher::User(users) => match &data.user {
                Some(user) => users.iter().any(|u| u == user),
                None => false,
            },
            Matcher::Cwd(dirs) => match &data.cwd {
                Some(cwd) => dirs.iter().any(|d| matches_dir(cwd, &expand_path(d))),
                None => false,
            },
            Matcher::EnvVar { name, value } => match (data.env.get(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            Matcher::All(matchers) => matchers.iter().all(|m| m.matches(data)),
            Matcher::Any(matchers) => matchers.iter().any(|m| m.matches(data)),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Matcher::Title(patterns) => {
                for pattern in patterns {
                    if let Err(e) = glob::Pattern::new(pattern) {
                        bail!(SeedkeepError::Config(format!(
                            "invalid title pattern '{}': {}",
                            pattern, e
                        )));
                    }
                }
            }
            Matcher::Url(urls) | Matcher::ExactUrl(urls) => {
                for url in urls {
                    if split_url(url).is_none() {
                        bail!(SeedkeepError::Config(format!("invalid url '{}'", url)));
                    }
                }
            }
            Matcher::All(matchers) | Matcher::Any(matchers) => {
                if matchers.is_empty() {
                    bail!(SeedkeepError::Config(
                        "'all' and 'any' need at least one rule".to_string()
                    ));
                }
                for matcher in matchers {
                    matcher.validate()?;
                }
            }
            Matcher::Host(_) | Matcher::User(_) | Matcher::Cwd(_) | Matcher::EnvVar { .. } => {}
        }
        Ok(())
    }
}

fn matches_glob(text: &str, pattern: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(text))
        .unwrap_or(false)
}

/// Check if a host matches a pattern
fn matches_host(host: &str, pattern: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix("*.") {
        host == suffix || host.ends_with(&format!(".{}", suffix))
    } else {
        host == pattern
    }
}

fn matches_url(data: &ObservedData, url: &str, exact: bool) -> bool {
    let (Some(host), Some(wanted)) = (&data.host, split_url(url)) else {
        return false;
    };
    if *host != wanted.host {
        return false;
    }
    if let Some(protocol) = &wanted.protocol {
        if data.protocol.as_ref() != Some(protocol) {
            return false;
        }
    }

    let path = data.path.as_deref().unwrap_or("/");
    let path = path.trim_end_matches('/');
    let wanted_path = wanted.path.trim_end_matches('/');
    if exact {
        path == wanted_path
    } else {
        path.starts_with(wanted_path)
    }
}

fn matches_dir(cwd: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    cwd == dir || cwd.starts_with(&format!("{}/", dir))
}

/// Expand ~ and environment variables in path
fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}
