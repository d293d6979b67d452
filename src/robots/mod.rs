//! Robots.txt handling module
//!
//! This module provides functionality for fetching, evaluating, and caching
//! robots.txt files for the built-in crawling engine.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::RobotsPolicy;

use reqwest::Client;

/// Fetches robots.txt for an origin
///
/// Network failures are treated like a missing file: the origin is allowed.
///
/// # Arguments
///
/// * `client` - HTTP client to use
/// * `origin` - Site origin, e.g. `https://example.com`
///
/// # Returns
///
/// The policy to apply to URLs on the origin
pub async fn fetch_robots(client: &Client, origin: &str) -> RobotsPolicy {
    let robots_url = format!("{}/robots.txt", origin);

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("Could not fetch {}: {}", robots_url, e);
            return RobotsPolicy::AllowAll;
        }
    };

    let status = response.status();
    match response.text().await {
        Ok(body) => RobotsPolicy::from_response(status, &body),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", robots_url, e);
            RobotsPolicy::AllowAll
        }
    }
}
