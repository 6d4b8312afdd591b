//! Token lifecycle management for the Kraken API
//!
//! A single [`TokenManager`] instance is shared by every client that talks to
//! the same account, so concurrent consumers never trigger redundant login
//! storms. The manager owns the bearer token and its expiry, serializes login
//! attempts through an async lock, and runs an abortable background task that
//! forces a refresh at a fixed interval.

use crate::config::TokenConfig;
use crate::logging::{StructuredLogger, get_logger};
use base64::Engine;
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// Boxed future returned by a login callback
pub type LoginFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Injected login callback invoked by the auto-refresh task
pub type LoginFn = Arc<dyn Fn() -> LoginFuture + Send + Sync>;

#[derive(Debug, Clone)]
struct TokenState {
    token: String,
    /// Expiry as epoch seconds; zero means "expired, refresh now"
    expiry: f64,
}

/// Centralized token manager for the Octopus Energy Italy API
pub struct TokenManager {
    state: RwLock<Option<TokenState>>,
    refresh_lock: AsyncMutex<()>,
    refresh_task: StdMutex<Option<JoinHandle<()>>>,
    refresh_margin_secs: u64,
    auto_refresh_interval_secs: u64,
    logger: StructuredLogger,
}

impl TokenManager {
    /// Create a new token manager from token lifecycle configuration
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            state: RwLock::new(None),
            refresh_lock: AsyncMutex::new(()),
            refresh_task: StdMutex::new(None),
            refresh_margin_secs: config.refresh_margin_secs,
            auto_refresh_interval_secs: config.auto_refresh_interval_secs,
            logger: get_logger("token"),
        }
    }

    fn now_epoch() -> f64 {
        Utc::now().timestamp() as f64
    }

    /// Get the current token, if any
    pub fn token(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.token.clone())
    }

    /// Check whether the stored token is still usable
    ///
    /// A token is valid only while `now < expiry - refresh_margin`. The check
    /// is a plain read and may run concurrently with an in-progress refresh;
    /// a stale result is safe because callers re-check under the login lock.
    pub fn is_valid(&self) -> bool {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = guard.as_ref() else {
            return false;
        };

        let now = Self::now_epoch();
        let valid = now < state.expiry - self.refresh_margin_secs as f64;
        if !valid {
            let remaining = state.expiry - now;
            self.logger.debug(&format!(
                "Token validity check: INVALID (expiry in {} seconds)",
                remaining as i64
            ));
        }
        valid
    }

    /// Store a new token, deriving expiry when not supplied explicitly
    ///
    /// With an explicit `expiry` (epoch seconds) the value is stored verbatim.
    /// Otherwise the JWT `exp` claim is decoded from the token itself; if that
    /// fails the expiry falls back to one auto-refresh interval from now.
    pub fn set_token(&self, token: &str, expiry: Option<f64>) {
        let now = Self::now_epoch();
        let resolved = match expiry {
            Some(value) => {
                self.logger.debug(&format!(
                    "Token set with explicit expiry - valid for {} seconds",
                    (value - now) as i64
                ));
                value
            }
            None => match decode_jwt_exp(token) {
                Some(value) => {
                    self.logger.debug(&format!(
                        "Token set with decoded expiry - valid for {} seconds",
                        (value - now) as i64
                    ));
                    value
                }
                None => {
                    self.logger.warn(&format!(
                        "Failed to decode token expiry. Setting fallback expiry to {} minutes",
                        self.auto_refresh_interval_secs / 60
                    ));
                    now + self.auto_refresh_interval_secs as f64
                }
            },
        };

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(TokenState {
            token: token.to_string(),
            expiry: resolved,
        });
    }

    /// Drop token and expiry, forcing the next `ensure_token` to re-login
    pub fn clear(&self) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Mark the stored token as expired without discarding it
    ///
    /// Used by the auto-refresh task to force an unconditional refresh.
    pub fn invalidate_expiry(&self) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = guard.as_mut() {
            state.expiry = 0.0;
        }
    }

    /// Async lock serializing login attempts
    ///
    /// A caller that waited for this lock must re-check [`is_valid`] before
    /// attempting its own login: another caller may already have refreshed.
    pub fn login_lock(&self) -> &AsyncMutex<()> {
        &self.refresh_lock
    }

    /// Start the background auto-refresh task
    ///
    /// Sleeps for the configured interval, then forces a refresh by
    /// invalidating the stored expiry and invoking the login callback. Any
    /// previous refresh task is aborted first so at most one loop is alive.
    /// Errors inside one refresh attempt are logged and the loop continues.
    pub fn start_auto_refresh(self: &Arc<Self>, login: LoginFn) {
        // Cancel any previous loop before the replacement exists, so two
        // refresh tasks are never alive at the same time
        let mut guard = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.take() {
            previous.abort();
        }

        let manager = Arc::clone(self);
        let interval = std::time::Duration::from_secs(self.auto_refresh_interval_secs);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                manager.logger.info("Performing scheduled token refresh");
                manager.invalidate_expiry();
                if login().await {
                    manager.logger.debug("Scheduled token refresh completed");
                } else {
                    manager.logger.error("Scheduled token refresh failed");
                }
            }
        });
        *guard = Some(handle);
        self.logger.debug("Started automatic token refresh task");
    }

    /// Stop the background auto-refresh task, if running
    pub fn stop_auto_refresh(&self) {
        let mut guard = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            handle.abort();
            self.logger.debug("Token auto-refresh task cancelled");
        }
    }
}

impl Drop for TokenManager {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

/// Decode the `exp` claim from a JWT without verifying its signature
pub fn decode_jwt_exp(token: &str) -> Option<f64> {
    let payload = token.split('.').nth(1)?;
    let decoded = base64_url_decode(payload)?;
    let json: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    json.get("exp").and_then(serde_json::Value::as_f64)
}

fn base64_url_decode(input: &str) -> Option<Vec<u8>> {
    let mut s = input.to_string();
    let pad = s.len() % 4;
    if pad != 0 {
        s.extend(std::iter::repeat('=').take(4 - pad));
    }
    base64::engine::general_purpose::URL_SAFE.decode(s).ok()
}
