//! Robots.txt caching implementation
//!
//! Policies are cached per origin and refetched after 24 hours.

use crate::robots::{fetch_robots, RobotsPolicy};
use crate::url::origin_of;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Cached robots.txt policy for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub policy: RobotsPolicy,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(policy: RobotsPolicy) -> Self {
        Self {
            policy,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached policy is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-origin robots.txt cache shared by all fetches of an engine
#[derive(Debug)]
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt files
    /// * `user_agent` - Product token matched against `User-agent` lines
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, fetching robots.txt if needed
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Ok(origin) = origin_of(url) else {
            return false;
        };

        let policy = match self.cached(&origin) {
            Some(policy) => policy,
            None => {
                let policy = fetch_robots(&self.client, &origin).await;
                self.insert(&origin, policy.clone());
                policy
            }
        };

        policy.is_allowed(url.as_str(), &self.user_agent)
    }

    /// Number of cached origins (stale entries included)
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, origin: &str) -> Option<RobotsPolicy> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(origin)
            .filter(|entry| !entry.is_stale())
            .map(|entry| entry.policy.clone())
    }

    fn insert(&self, origin: &str, policy: RobotsPolicy) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(origin.to_string(), CachedRobots::new(policy));
    }
}
