//! Notification seam between planner components and the host surface.
//!
//! # Responsibility
//! - Define the `Notifier` contract used by task CRUD and the session clock.
//! - Provide a bounded in-memory notification center for hosts.
//!
//! # Invariants
//! - The center never holds more than `capacity` entries; oldest drop first.

use crate::model::notification::Notification;
use std::collections::VecDeque;

/// Sink for user-visible notifications.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// Bounded notification inbox with unread tracking.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    capacity: usize,
    entries: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Entries oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.read).count()
    }

    pub fn mark_all_read(&mut self) {
        for entry in &mut self.entries {
            entry.read = true;
        }
    }

    /// Removes and returns every entry, oldest first.
    pub fn drain(&mut self) -> Vec<Notification> {
        self.entries.drain(..).collect()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&mut self, notification: Notification) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationCenter, Notifier};
    use crate::model::notification::{Notification, NotificationKind};
    use chrono::NaiveDate;

    fn entry(title: &str) -> Notification {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Notification::new(NotificationKind::Info, title, "", at)
    }

    #[test]
    fn center_drops_oldest_when_full() {
        let mut center = NotificationCenter::new(2);
        center.notify(entry("a"));
        center.notify(entry("b"));
        center.notify(entry("c"));

        let titles: Vec<_> = center.entries().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[test]
    fn unread_tracking_and_drain() {
        let mut center = NotificationCenter::new(10);
        center.notify(entry("a"));
        center.notify(entry("b"));
        assert_eq!(center.unread_count(), 2);

        center.mark_all_read();
        assert_eq!(center.unread_count(), 0);

        let drained = center.drain();
        assert_eq!(drained.len(), 2);
        assert!(center.is_empty());
    }
}
