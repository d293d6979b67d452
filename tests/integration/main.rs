//! Integration tests for the ingestion worker
//!
//! These tests drive the public API end-to-end with wiremock standing in for
//! crawled sites and the LLM service, and in-process doubles for the broker.

mod conversion_tests;
mod crawl_tests;
mod dispatch_tests;
mod limiter_tests;
