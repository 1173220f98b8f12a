use std::sync::Arc;

use crossterm::event::Event;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::event::{AppEvent, Route};
use crate::monitor::{Activity, DeferredActions, Throttle, REDIRECT_DELAY, THROTTLE_WINDOW};
use crate::notify::{Toast, SESSION_TOAST};
use crate::session;
use crate::storage::Storage;
use crate::token::Claims;

const EXPIRED_NOTICE: &str = "Session expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Granted,
    Denied,
}

/// Gate in front of a protected screen. Owns the initial session check and the
/// activity-driven re-checks for as long as the screen is mounted.
pub struct SessionGuard {
    storage: Arc<dyn Storage>,
    tx: UnboundedSender<AppEvent>,
    state: GuardState,
    listening: bool,
    throttle: Throttle,
    deferred: DeferredActions,
}

impl SessionGuard {
    pub fn new(storage: Arc<dyn Storage>, tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            storage,
            deferred: DeferredActions::new(tx.clone()),
            tx,
            state: GuardState::Checking,
            listening: false,
            throttle: Throttle::new(THROTTLE_WINDOW),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Runs the session check once. Returns the claims when access is granted.
    pub fn mount(&mut self) -> Option<Claims> {
        match session::validate(self.storage.as_ref()) {
            Ok(claims) => {
                info!("session valid, access granted");
                self.state = GuardState::Granted;
                self.listening = true;
                Some(claims)
            }
            Err(reason) => {
                info!(%reason, "access denied");
                self.state = GuardState::Denied;
                self.expire();
                None
            }
        }
    }

    /// Feeds a terminal event to the activity listeners. Returns true when this
    /// event revealed an expired session.
    pub fn on_event(&mut self, event: &Event, now: Instant) -> bool {
        if !self.is_listening() || Activity::from_event(event).is_none() {
            return false;
        }
        if !self.throttle.ready(now) {
            return false;
        }
        debug!("re-validating session on activity");
        if session::is_valid(self.storage.as_ref()) {
            return false;
        }
        info!("session expired during activity");
        self.state = GuardState::Denied;
        self.listening = false;
        self.expire();
        true
    }

    /// Removes the listeners and cancels any pending redirect.
    pub fn teardown(&mut self) {
        debug!(pending = self.deferred.pending(), "guard torn down");
        self.listening = false;
        self.deferred.cancel_all();
    }

    fn expire(&mut self) {
        // receiver gone means the app is shutting down
        let _ = self
            .tx
            .send(AppEvent::Notify(Toast::error(EXPIRED_NOTICE).lasting(SESSION_TOAST)));
        self.deferred
            .schedule(REDIRECT_DELAY, AppEvent::Navigate(Route::SignIn));
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, TOKEN_KEY};
    use crate::token::forge;
    use chrono::Utc;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn key() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE))
    }

    fn fresh_token() -> String {
        forge(&json!({"exp": Utc::now().timestamp() + 3600, "email": "a@b.co"}))
    }

    fn guard_with(
        storage: Arc<MemoryStorage>,
    ) -> (SessionGuard, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionGuard::new(storage, tx), rx)
    }

    async fn expect_expiry_notice(rx: &mut UnboundedReceiver<AppEvent>) {
        match rx.recv().await {
            Some(AppEvent::Notify(toast)) => {
                assert_eq!(toast.message, EXPIRED_NOTICE);
                assert_eq!(toast.lifetime, SESSION_TOAST);
            }
            other => panic!("expected expiry notice, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn valid_session_is_granted_and_listens() {
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut guard, mut rx) = guard_with(storage);
        assert_eq!(guard.state(), GuardState::Checking);

        let claims = guard.mount().unwrap();
        assert_eq!(claims.display_name(), Some("a@b.co"));
        assert_eq!(guard.state(), GuardState::Granted);
        assert!(guard.is_listening());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_session_redirects_after_delay() {
        let (mut guard, mut rx) = guard_with(Arc::new(MemoryStorage::new()));
        let start = Instant::now();
        assert!(guard.mount().is_none());
        assert_eq!(guard.state(), GuardState::Denied);
        assert!(!guard.is_listening());

        expect_expiry_notice(&mut rx).await;
        let event = rx.recv().await;
        assert!(matches!(event, Some(AppEvent::Navigate(Route::SignIn))));
        assert!(start.elapsed() >= REDIRECT_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_mount_redirect() {
        let (mut guard, mut rx) = guard_with(Arc::new(MemoryStorage::new()));
        guard.mount();
        expect_expiry_notice(&mut rx).await;
        guard.teardown();

        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(waited.is_err(), "redirect fired after teardown");
    }

    #[tokio::test(start_paused = true)]
    async fn activity_expiry_is_throttled_and_cancelable() {
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut guard, mut rx) = guard_with(storage.clone());
        guard.mount();

        let start = Instant::now();
        assert!(!guard.on_event(&key(), start));

        // the session goes away, but checks inside the window are skipped
        storage.remove(TOKEN_KEY).unwrap();
        for ms in (100..5000).step_by(100) {
            assert!(!guard.on_event(&key(), start + Duration::from_millis(ms)));
        }
        assert_eq!(guard.state(), GuardState::Granted);

        assert!(guard.on_event(&key(), start + THROTTLE_WINDOW));
        assert_eq!(guard.state(), GuardState::Denied);
        assert!(!guard.is_listening());
        expect_expiry_notice(&mut rx).await;

        // listeners are gone
        assert!(!guard.on_event(&key(), start + THROTTLE_WINDOW * 3));

        drop(guard);
        let waited = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(
            !matches!(waited, Ok(Some(_))),
            "redirect should have been cancelled"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn non_activity_events_do_not_consume_the_window() {
        let storage = Arc::new(MemoryStorage::with_entry(TOKEN_KEY, &fresh_token()));
        let (mut guard, _rx) = guard_with(storage.clone());
        guard.mount();
        storage.remove(TOKEN_KEY).unwrap();

        let now = Instant::now();
        assert!(!guard.on_event(&Event::Resize(80, 24), now));
        assert!(guard.on_event(&key(), now));
    }
}
