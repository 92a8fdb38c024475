use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::NoterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A status bar message that disappears after a while.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Instant::now() + duration,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug)]
pub struct NotificationManager {
    current: Option<Notification>,
    duration: Duration,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_duration(Duration::from_secs(4))
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            current: None,
            duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        self.current = Some(Notification::new(message, level, self.duration));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    /// Shows a failed command. Navigation misses and cancellations are warnings.
    pub fn report(&mut self, err: &NoterError) {
        match err {
            NoterError::Cancelled => self.info("Cancelled"),
            e if e.is_navigation_miss() => {
                info!("{e}");
                self.warn(e.to_string());
            }
            e => {
                warn!("Command failed: {e}");
                self.error(e.to_string());
            }
        }
    }

    /// Drops an expired message; returns whether one was dropped.
    pub fn update(&mut self) -> bool {
        if self.current.as_ref().is_some_and(Notification::is_expired) {
            self.current = None;
            return true;
        }
        false
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_latest_message_wins() {
        let mut manager = NotificationManager::new();
        manager.info("Saved");
        manager.error("Failed");

        let current = manager.current().unwrap();
        assert_eq!(current.message, "Failed");
        assert_eq!(current.level, NotificationLevel::Error);
    }

    #[test]
    fn test_expired_message_is_dropped() {
        let mut manager = NotificationManager::with_duration(Duration::from_millis(20));
        manager.info("Short-lived");
        assert!(!manager.update());

        thread::sleep(Duration::from_millis(30));
        assert!(manager.update());
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_report_levels() {
        let mut manager = NotificationManager::new();

        manager.report(&NoterError::NoNextNote);
        assert_eq!(manager.current().unwrap().level, NotificationLevel::Warning);
        assert_eq!(manager.current().unwrap().message, "no next note");

        manager.report(&NoterError::NotInHeading);
        assert_eq!(manager.current().unwrap().level, NotificationLevel::Error);

        manager.report(&NoterError::Cancelled);
        assert_eq!(manager.current().unwrap().level, NotificationLevel::Info);
    }
}
