//! Shared HTTP client for AWS operations.
//!
//! This module provides a singleton HTTP client with connection pooling for
//! efficient reuse across multiple S3 operations.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Connection establishment timeout for S3 requests. Requests are not
/// retried here; the refresh scheduler retries on its next cycle.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns a reference to the shared HTTP client.
///
/// The client is lazily initialized on first use and reused for all
/// subsequent requests, with connection pooling for repeated requests to the
/// same bucket endpoint.
pub(crate) fn client() -> &'static Client {
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .pool_max_idle_per_host(4)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| panic!("Failed to create HTTP client: {e}"))
    });

    &CLIENT
}
