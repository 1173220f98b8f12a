use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// How long session notices stay on screen.
pub const SESSION_TOAST: Duration = Duration::from_millis(1000);
/// How long notices about user actions stay on screen.
pub const ACTION_TOAST: Duration = Duration::from_millis(4000);

const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: Level,
    pub message: String,
    pub lifetime: Duration,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
            lifetime: ACTION_TOAST,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
            lifetime: ACTION_TOAST,
        }
    }

    pub fn lasting(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Transient notifications, newest last.
#[derive(Debug, Default)]
pub struct Toasts {
    items: VecDeque<(Toast, Instant)>,
}

impl Toasts {
    pub fn push(&mut self, toast: Toast, now: Instant) {
        let expires_at = now + toast.lifetime;
        self.items.push_back((toast, expires_at));
        while self.items.len() > MAX_TOASTS {
            self.items.pop_front();
        }
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|(_, expires_at)| *expires_at > now);
    }

    /// Live toasts, newest first.
    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter().rev().map(|(toast, _)| toast)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_their_lifetime() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        toasts.push(Toast::error("Session expired").lasting(SESSION_TOAST), now);
        toasts.push(Toast::success("Task created successfully"), now);

        toasts.prune(now + Duration::from_millis(999));
        assert_eq!(toasts.visible().count(), 2);

        toasts.prune(now + Duration::from_millis(1000));
        let left: Vec<_> = toasts.visible().map(|t| t.message.as_str()).collect();
        assert_eq!(left, ["Task created successfully"]);

        toasts.prune(now + ACTION_TOAST);
        assert!(toasts.is_empty());
    }

    #[test]
    fn only_the_newest_are_kept() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        for i in 0..8 {
            toasts.push(Toast::success(format!("t{i}")), now);
        }
        let first = toasts.visible().next().map(|t| t.message.clone());
        assert_eq!(toasts.visible().count(), MAX_TOASTS);
        assert_eq!(first.as_deref(), Some("t7"));
    }
}
