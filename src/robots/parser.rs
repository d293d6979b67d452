//! Robots.txt rule evaluation
//!
//! Matching is delegated to the robotstxt crate; this module decides which
//! rules apply when the file could not be read.

use reqwest::StatusCode;
use robotstxt::DefaultMatcher;

/// Rules for one origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsPolicy {
    /// No usable robots.txt; everything may be fetched
    AllowAll,
    /// The server is failing; nothing may be fetched until it recovers
    DisallowAll,
    /// Raw robots.txt content to match against
    Rules(String),
}

impl RobotsPolicy {
    /// Creates a policy from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            RobotsPolicy::AllowAll
        } else {
            RobotsPolicy::Rules(content.to_string())
        }
    }

    /// Creates a policy from a robots.txt HTTP response
    ///
    /// | Status | Policy |
    /// |--------|--------|
    /// | 2xx | Parse the body |
    /// | 4xx | Allow all (no robots.txt) |
    /// | 5xx | Disallow all (server unavailable) |
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        if status.is_success() {
            Self::from_content(body)
        } else if status.is_server_error() {
            RobotsPolicy::DisallowAll
        } else {
            RobotsPolicy::AllowAll
        }
    }

    /// Checks if a URL may be fetched by the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The full URL to check
    /// * `user_agent` - The product token of the crawler (e.g. `IngestionWorker`)
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self {
            RobotsPolicy::AllowAll => true,
            RobotsPolicy::DisallowAll => false,
            RobotsPolicy::Rules(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}
