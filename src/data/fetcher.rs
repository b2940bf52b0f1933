use std::time::Duration;
use reqwest::header::COOKIE;
use reqwest::Client;
use log::{info, warn};

use crate::auth::headers::{ajax_headers, cookie_header};
use crate::auth::SessionManager;
use crate::error::FetchError;

pub const SNAPSHOT_PATH: &str = "/api/equity-stockIndices";
pub const LIVE_MARKET_PATH: &str = "/market-data/live-equity-market";

pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .build()
}

/// Pulls index snapshots from NSE using the shared session.
pub struct Fetcher {
    client: Client,
    session: SessionManager,
    snapshot_url: String,
    referer: String,
}

impl Fetcher {
    pub fn new(client: Client, session: SessionManager, base_url: &str) -> Self {
        Self {
            client,
            session,
            snapshot_url: format!("{}{}", base_url, SNAPSHOT_PATH),
            referer: format!("{}{}", base_url, LIVE_MARKET_PATH),
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Fetch the raw snapshot body for `index_name`.
    ///
    /// Returns `Ok(None)` for a blank body. A 401/403 drops the session so
    /// the next call handshakes again.
    pub async fn fetch(&self, index_name: &str) -> Result<Option<String>, FetchError> {
        if !self.session.is_authenticated() {
            self.session.handshake().await;
        }

        let url = format!("{}?index={}", self.snapshot_url, urlencoding::encode(index_name));
        let mut request = self.client
            .get(&url)
            .headers(ajax_headers(&self.referer));
        if let Some(cookie) = cookie_header(&self.session.get()) {
            request = request.header(COOKIE, cookie);
        }

        info!("Fetching data from NSE: {}", url);
        let result = Self::send(request).await;

        if let Err(e) = &result {
            if e.is_auth_expired() {
                warn!("NSE rejected session ({}), invalidating cookies", e);
                self.session.invalidate();
            }
        }

        result
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<Option<String>, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            warn!("Empty response body from NSE. Status: {}", status);
            return Ok(None);
        }

        Ok(Some(body))
    }
}
