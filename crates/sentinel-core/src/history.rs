//! Bounded history of recent snapshots.
//!
//! [`TickHistory`] is a fixed-capacity ring buffer: once full, every
//! insertion evicts the oldest snapshot. The tick processor is the only
//! writer; everything else gets a shared reference.

use std::collections::VecDeque;

use sentinel_types::GameStateSnapshot;

/// Most-recent-last ring buffer of snapshots.
#[derive(Debug, Clone)]
pub struct TickHistory {
    capacity: usize,
    entries: VecDeque<GameStateSnapshot>,
}

impl TickHistory {
    /// An empty history holding at most `capacity` snapshots.
    ///
    /// A capacity of zero is raised to one: the processor always needs
    /// the snapshot it is currently deciding on.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a snapshot, evicting the oldest when full.
    pub fn push(&mut self, snapshot: GameStateSnapshot) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Maximum number of retained snapshots.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no snapshot has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&GameStateSnapshot> {
        self.entries.back()
    }

    /// The oldest retained snapshot.
    pub fn oldest(&self) -> Option<&GameStateSnapshot> {
        self.entries.front()
    }

    /// Retained snapshots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &GameStateSnapshot> {
        self.entries.iter()
    }
}
