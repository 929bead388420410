use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Tracks, per node, when an unbroken idle streak began.
///
/// An entry exists iff the node had zero qualifying pods at the most recent
/// tick that examined it. The stored timestamp is never overwritten while the
/// streak persists; that is what accumulates elapsed idle time. A single
/// occupancy observation drops the entry, so "idle for X" always means idle
/// continuously for X. State is process-local and lost on restart.
#[derive(Debug, Default)]
pub struct IdleTracker {
    first_idle: HashMap<String, DateTime<Utc>>,
}

impl IdleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one observation of a node and returns how long it has been
    /// idle. Occupied nodes reset to zero; a node just turned idle reports
    /// zero as well.
    pub fn observe(&mut self, node: &str, occupied: bool, now: DateTime<Utc>) -> Duration {
        if occupied {
            self.first_idle.remove(node);
            return Duration::zero();
        }
        match self.first_idle.get(node) {
            Some(since) => now - *since,
            None => {
                self.first_idle.insert(node.to_string(), now);
                Duration::zero()
            }
        }
    }

    /// Drops a node's streak, used once the node has been deleted.
    pub fn forget(&mut self, node: &str) {
        self.first_idle.remove(node);
    }

    /// Drops streaks for nodes no longer present in the cluster.
    pub fn retain_nodes<F: Fn(&str) -> bool>(&mut self, exists: F) {
        self.first_idle.retain(|name, _| exists(name));
    }

    pub fn is_tracked(&self, node: &str) -> bool {
        self.first_idle.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.first_idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_idle.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn occupied_node_is_never_tracked() {
        let mut tracker = IdleTracker::new();
        assert_eq!(tracker.observe("n1", true, at(0)), Duration::zero());
        assert!(!tracker.is_tracked("n1"));
    }

    #[test]
    fn first_idle_observation_starts_at_zero() {
        let mut tracker = IdleTracker::new();
        assert_eq!(tracker.observe("n1", false, at(0)), Duration::zero());
        assert!(tracker.is_tracked("n1"));
    }

    #[test]
    fn streak_accumulates_from_first_observation() {
        let mut tracker = IdleTracker::new();
        tracker.observe("n1", false, at(0));
        assert_eq!(tracker.observe("n1", false, at(20)), Duration::seconds(20));
        // The stored timestamp must not move while the streak persists.
        assert_eq!(tracker.observe("n1", false, at(170)), Duration::seconds(170));
    }

    #[test]
    fn occupancy_resets_the_streak() {
        let mut tracker = IdleTracker::new();
        tracker.observe("n1", false, at(0));
        tracker.observe("n1", false, at(60));
        assert_eq!(tracker.observe("n1", true, at(80)), Duration::zero());
        assert!(!tracker.is_tracked("n1"));
        // A later streak restarts timing from its own beginning.
        assert_eq!(tracker.observe("n1", false, at(200)), Duration::zero());
        assert_eq!(tracker.observe("n1", false, at(260)), Duration::seconds(60));
    }

    #[test]
    fn nodes_are_tracked_independently() {
        let mut tracker = IdleTracker::new();
        tracker.observe("n1", false, at(0));
        tracker.observe("n2", false, at(40));
        assert_eq!(tracker.observe("n1", false, at(100)), Duration::seconds(100));
        assert_eq!(tracker.observe("n2", false, at(100)), Duration::seconds(60));
    }

    #[test]
    fn forget_and_retain() {
        let mut tracker = IdleTracker::new();
        tracker.observe("n1", false, at(0));
        tracker.observe("n2", false, at(0));
        tracker.forget("n1");
        assert!(!tracker.is_tracked("n1"));
        tracker.retain_nodes(|name| name == "n1");
        assert!(tracker.is_empty());
    }
}
