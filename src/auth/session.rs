use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;
use log::{info, warn, error};

use crate::auth::headers::{ajax_headers, cookie_header, landing_headers};

pub const MARKET_STATUS_PATH: &str = "/api/marketStatus";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Cookie-based NSE session.
///
/// Clones share the same jar. The jar is only ever replaced wholesale under
/// the write lock, so readers see either the old or the new set of cookies.
#[derive(Clone)]
pub struct SessionManager {
    cookies: Arc<RwLock<Vec<String>>>,
    // serializes handshakes from the poller and the admin endpoint
    handshake_lock: Arc<tokio::sync::Mutex<()>>,
    handshakes: Arc<AtomicU64>,
    client: Client,
    landing_url: String,
    market_status_url: String,
    settle_delay: Duration,
}

impl SessionManager {
    pub fn new(client: Client, base_url: &str, landing_url: String, settle_delay: Duration) -> Self {
        Self {
            cookies: Arc::new(RwLock::new(Vec::new())),
            handshake_lock: Arc::new(tokio::sync::Mutex::new(())),
            handshakes: Arc::new(AtomicU64::new(0)),
            client,
            landing_url,
            market_status_url: format!("{}{}", base_url, MARKET_STATUS_PATH),
            settle_delay,
        }
    }

    /// Current cookie jar, possibly empty.
    pub fn get(&self) -> Vec<String> {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> SessionState {
        let empty = self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty();
        if empty {
            SessionState::Unauthenticated
        } else {
            SessionState::Authenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn invalidate(&self) {
        self.store(Vec::new());
        info!("NSE session invalidated, next fetch will re-handshake");
    }

    /// Number of handshakes attempted since startup.
    pub fn handshake_count(&self) -> u64 {
        self.handshakes.load(Ordering::Relaxed)
    }

    fn store(&self, cookies: Vec<String>) {
        *self.cookies.write().unwrap_or_else(PoisonError::into_inner) = cookies;
    }

    /// Visit the landing page, capture its cookies, then warm the session up.
    ///
    /// Failures are logged and leave the session unauthenticated; the next
    /// fetch will try again.
    pub async fn handshake(&self) {
        let _guard = self.handshake_lock.lock().await;
        self.handshake_locked().await;
    }

    // caller holds `handshake_lock`
    async fn handshake_locked(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        info!("Refreshing NSE cookies from {}", self.landing_url);

        let response = match self.client
            .get(&self.landing_url)
            .headers(landing_headers())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to refresh cookies: {}", e);
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!("Failed to refresh cookies: landing page returned HTTP {}", status);
            return;
        }

        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let cookie_count = cookies.len();
        self.store(cookies);

        if cookie_count == 0 {
            warn!("Landing request succeeded but no cookies returned. Status: {}", status);
            return;
        }

        info!("Captured {} cookies. Warming up session...", cookie_count);
        tokio::time::sleep(self.settle_delay).await;
        self.warm_up().await;
    }

    async fn warm_up(&self) {
        let mut request = self.client
            .get(&self.market_status_url)
            .headers(ajax_headers(&self.landing_url));
        if let Some(cookie) = cookie_header(&self.get()) {
            request = request.header(COOKIE, cookie);
        }

        match request.send().await.and_then(|response| response.error_for_status()) {
            Ok(_) => info!("Session warmed up with marketStatus"),
            Err(e) => warn!("Warm up call failed, but proceeding: {}", e),
        }
    }

    /// Drop the current session and handshake again right away.
    ///
    /// Waits for any handshake already in flight, so its warm-up still goes
    /// out with the cookies it captured.
    pub async fn refresh(&self) -> SessionState {
        let _guard = self.handshake_lock.lock().await;
        self.invalidate();
        self.handshake_locked().await;
        self.state()
    }
}
