use std::time::Duration;

use crossterm::event::{Event, KeyEventKind, MouseEventKind};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::event::AppEvent;

/// Minimum spacing between activity-triggered session checks.
pub const THROTTLE_WINDOW: Duration = Duration::from_millis(5000);
/// Delay before an expired session is sent back to sign-in.
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    PointerMove,
    KeyDown,
}

impl Activity {
    /// Mouse moves and key presses count as presence; nothing else does.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Mouse(mouse) if matches!(mouse.kind, MouseEventKind::Moved) => {
                Some(Activity::PointerMove)
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => Some(Activity::KeyDown),
            _ => None,
        }
    }
}

/// Lets an action through at most once per window. Calls inside the window are
/// dropped, not deferred.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Owned set of scheduled events. Every pending one is aborted on
/// [`cancel_all`](Self::cancel_all) or drop.
#[derive(Debug)]
pub struct DeferredActions {
    tx: UnboundedSender<AppEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl DeferredActions {
    pub fn new(tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            tx,
            handles: Vec::new(),
        }
    }

    /// Sends `event` after `delay` unless cancelled first.
    pub fn schedule(&mut self, delay: Duration, event: AppEvent) {
        self.handles.retain(|handle| !handle.is_finished());
        let tx = self.tx.clone();
        self.handles.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // receiver gone means the app is shutting down
            let _ = tx.send(event);
        }));
    }

    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn cancel_all(&mut self) {
        if !self.handles.is_empty() {
            trace!(count = self.handles.len(), "cancelling deferred actions");
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for DeferredActions {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
