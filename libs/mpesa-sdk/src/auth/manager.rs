use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::clock::{Clock, SystemClock};
use super::token::{AccessToken, request_token};
use crate::config::GatewayConfig;
use crate::error::MpesaError;
use crate::transport::Transport;

/// Tokens are treated as expired this long before the gateway says so.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Observable lifecycle of the cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// No token has ever been issued.
    Unauthenticated,
    /// An issuance request is in flight.
    Refreshing,
    Valid,
    /// A token was held and has lapsed, was invalidated, or the last
    /// refresh failed.
    Expired,
}

/// Outcome of the most recent refresh, tagged with a generation number so
/// callers that queued behind a refresh can adopt its result.
#[derive(Default)]
struct TokenSlot {
    token: Option<AccessToken>,
    generation: u64,
    last_failure: Option<MpesaError>,
}

/// Owns the bearer token lifecycle.
///
/// Refresh is lazy and single-flight: when the cached token is missing or
/// stale, the first caller issues the token request while every concurrent
/// caller waits for that same request and receives its token or its error.
pub struct TokenManager {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    skew: Duration,
    /// Sync lock for the fast path; never held across an await.
    slot: RwLock<TokenSlot>,
    /// Held for the duration of a token request.
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    #[must_use]
    pub fn new(config: GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            clock,
            skew: DEFAULT_EXPIRY_SKEW,
            slot: RwLock::new(TokenSlot::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    /// A token that is valid now, refreshing it first if needed.
    ///
    /// # Errors
    /// Returns the classified gateway error, a [`MpesaError::Network`] error,
    /// or a [`MpesaError::Validation`] error for a malformed issuance
    /// response. Waiters on a shared refresh receive the same error.
    pub async fn get_token(&self) -> Result<AccessToken, MpesaError> {
        let observed = {
            let slot = self.slot.read();
            if let Some(token) = self.usable(&slot) {
                return Ok(token);
            }
            slot.generation
        };

        let _refresh_guard = self.refresh_lock.lock().await;

        {
            let slot = self.slot.read();
            if let Some(token) = self.usable(&slot) {
                return Ok(token);
            }
            // A refresh that failed while we were queued is shared; a token
            // that lapsed while we were queued is refreshed again.
            if slot.generation != observed
                && slot.token.is_none()
                && let Some(err) = slot.last_failure.clone()
            {
                return Err(err);
            }
        }

        tracing::debug!(generation = observed, "refreshing access token");
        let issued_at = self.clock.now();
        let outcome = request_token(self.transport.as_ref(), &self.config, issued_at).await;

        let mut slot = self.slot.write();
        slot.generation += 1;
        match outcome {
            Ok(token) => {
                slot.token = Some(token.clone());
                slot.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "access token refresh failed");
                slot.token = None;
                slot.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Current lifecycle state, for diagnostics.
    #[must_use]
    pub fn state(&self) -> TokenState {
        if self.refresh_lock.try_lock().is_err() {
            return TokenState::Refreshing;
        }
        let slot = self.slot.read();
        match &slot.token {
            Some(token) if token.is_valid(self.clock.now(), self.skew) => TokenState::Valid,
            None if slot.generation == 0 => TokenState::Unauthenticated,
            _ => TokenState::Expired,
        }
    }

    /// Drop the cached token; the next [`get_token`](Self::get_token)
    /// requests a new one.
    pub fn invalidate(&self) {
        let mut slot = self.slot.write();
        if slot.token.take().is_some() {
            tracing::info!("cached access token invalidated");
        }
    }

    /// Drop the cached token only if it is still `rejected`. A token that a
    /// concurrent refresh already replaced stays cached.
    pub fn invalidate_if(&self, rejected: &AccessToken) {
        let mut slot = self.slot.write();
        if slot.token.as_ref().is_some_and(|cached| cached == rejected) {
            slot.token = None;
            tracing::info!("rejected access token invalidated");
        }
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn usable(&self, slot: &TokenSlot) -> Option<AccessToken> {
        slot.token
            .as_ref()
            .filter(|token| token.is_valid(self.clock.now(), self.skew))
            .cloned()
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("base_url", &self.config.base_url().as_str())
            .field("skew", &self.skew)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;
    use crate::error::{ErrorKind, NetworkError, NetworkErrorKind};
    use crate::transport::{GatewayRequest, GatewayResponse};
    use async_trait::async_trait;
    use http::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    /// Replays canned outcomes and counts calls.
    struct ScriptedTransport {
        calls: AtomicUsize,
        delay: Duration,
        script: parking_lot::Mutex<VecDeque<Result<GatewayResponse, NetworkError>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<GatewayResponse, NetworkError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(50),
                script: parking_lot::Mutex::new(script.into()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, _request: GatewayRequest) -> Result<GatewayResponse, NetworkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.script.lock().pop_front().unwrap_or_else(|| {
                Err(NetworkError::new(NetworkErrorKind::Other, "script exhausted"))
            })
        }
    }

    fn ok_token(value: &str, expires_in: u64) -> Result<GatewayResponse, NetworkError> {
        Ok(GatewayResponse::new(
            StatusCode::OK,
            format!(r#"{{"access_token":"{value}","token_type":"Bearer","expires_in":{expires_in}}}"#),
        ))
    }

    fn manager(
        transport: Arc<ScriptedTransport>,
        clock: Arc<ManualClock>,
    ) -> Arc<TokenManager> {
        let config = GatewayConfig::new("https://sandbox.example", "k", "s", Duration::from_secs(5))
            .unwrap();
        Arc::new(TokenManager::with_clock(config, transport, clock))
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let transport = ScriptedTransport::new(vec![ok_token("abc", 3600)]);
        let clock = Arc::new(ManualClock::default());
        let manager = manager(transport.clone(), clock);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_token().await })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(transport.calls(), 1);
        assert!(tokens.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(manager.state(), TokenState::Valid);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failure() {
        let failure = Err(NetworkError::new(NetworkErrorKind::ConnectionFailure, "refused"));
        let transport = ScriptedTransport::new(vec![failure, ok_token("later", 3600)]);
        let clock = Arc::new(ManualClock::default());
        let manager = manager(transport.clone(), clock);

        let (a, b) = tokio::join!(manager.get_token(), manager.get_token());
        assert_eq!(transport.calls(), 1);
        assert_eq!(a.unwrap_err().kind(), ErrorKind::ConnectionFailure);
        assert_eq!(b.unwrap_err().kind(), ErrorKind::ConnectionFailure);
        assert_eq!(manager.state(), TokenState::Expired);

        let token = manager.get_token().await.unwrap();
        assert_eq!(token.value(), "later");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn lifecycle_follows_the_clock() {
        let transport = ScriptedTransport::new(vec![ok_token("first", 60), ok_token("second", 60)]);
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let manager = manager(transport.clone(), clock.clone());

        assert_eq!(manager.state(), TokenState::Unauthenticated);
        assert_eq!(manager.get_token().await.unwrap().value(), "first");
        assert_eq!(manager.get_token().await.unwrap().value(), "first");
        assert_eq!(transport.calls(), 1);

        clock.advance(Duration::from_secs(61));
        assert_eq!(manager.state(), TokenState::Expired);
        assert_eq!(manager.get_token().await.unwrap().value(), "second");
        assert_eq!(transport.calls(), 2);
        assert_eq!(manager.state(), TokenState::Valid);
    }

    #[tokio::test]
    async fn waiter_does_not_adopt_a_token_that_lapsed_in_the_queue() {
        let transport = ScriptedTransport::new(vec![ok_token("first", 60), ok_token("second", 60)]);
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let manager = manager(transport.clone(), clock.clone());

        let first = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        };
        let queued = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        clock.advance(Duration::from_secs(120));

        assert_eq!(first.await.unwrap().unwrap().value(), "first");
        assert_eq!(queued.await.unwrap().unwrap().value(), "second");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refresh() {
        let transport = ScriptedTransport::new(vec![ok_token("first", 3600), ok_token("second", 3600)]);
        let manager = manager(transport.clone(), Arc::new(ManualClock::default()));

        manager.get_token().await.unwrap();
        manager.invalidate();
        assert_eq!(manager.state(), TokenState::Expired);
        assert_eq!(manager.get_token().await.unwrap().value(), "second");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn stale_rejection_keeps_the_refreshed_token() {
        let transport = ScriptedTransport::new(vec![ok_token("first", 3600), ok_token("second", 3600)]);
        let manager = manager(transport.clone(), Arc::new(ManualClock::default()));

        let first = manager.get_token().await.unwrap();
        manager.invalidate_if(&first);
        let second = manager.get_token().await.unwrap();
        assert_eq!(second.value(), "second");

        manager.invalidate_if(&first);
        assert_eq!(manager.state(), TokenState::Valid);
        assert_eq!(manager.get_token().await.unwrap(), second);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn state_reports_refresh_in_flight() {
        let transport = ScriptedTransport::new(vec![ok_token("abc", 3600)]);
        let manager = manager(transport, Arc::new(ManualClock::default()));

        let pending = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(manager.state(), TokenState::Refreshing);
        pending.await.unwrap().unwrap();
        assert_eq!(manager.state(), TokenState::Valid);
    }
}
