//! In-flight window: the bounded set of requests that have been transmitted but not yet
//! acknowledged.

use crate::command::encoder::Request;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window is full ({capacity} requests in flight)")]
    Full { capacity: usize },
    #[error("request `{0}` is already in flight")]
    Duplicate(Uuid),
}

#[derive(Debug)]
pub struct InflightWindow {
    capacity: usize,
    entries: HashMap<Uuid, Request>,
}

impl Default for InflightWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl InflightWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Inserts a transmitted request. Callers must check [`available`](Self::available) first;
    /// a full window refuses the request and hands nothing back.
    pub fn admit(&mut self, request: Request) -> Result<(), WindowError> {
        if self.entries.len() >= self.capacity {
            return Err(WindowError::Full {
                capacity: self.capacity,
            });
        }
        let id = request.correlation_id();
        if self.contains(&id) {
            return Err(WindowError::Duplicate(id));
        }
        self.entries.insert(id, request);
        Ok(())
    }

    /// Removes the request for `id`. `None` means the acknowledgement was stale or foreign.
    pub fn retire(&mut self, id: &Uuid) -> Option<Request> {
        self.entries.remove(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    /// Drops every in-flight request and returns how many were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            capacity: self.capacity,
            inflight: self.entries.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub capacity: usize,
    pub inflight: usize,
}

impl WindowSnapshot {
    pub fn paused(&self) -> bool {
        self.inflight >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encoder::{CommandEncoder, CommandOrigin};

    fn requests(count: usize) -> Vec<Request> {
        let mut encoder = CommandEncoder::new();
        (0..count)
            .map(|idx| encoder.encode(format!("say {idx}"), CommandOrigin::Pyramid))
            .collect()
    }

    #[test]
    fn admit_refuses_when_full() {
        let mut window = InflightWindow::new(2);
        let mut pending = requests(3).into_iter();

        window.admit(pending.next().unwrap()).expect("first admit");
        window.admit(pending.next().unwrap()).expect("second admit");
        assert!(window.snapshot().paused());
        assert_eq!(window.available(), 0);

        let err = window.admit(pending.next().unwrap()).unwrap_err();
        assert_eq!(err, WindowError::Full { capacity: 2 });
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn retire_is_idempotent() {
        let mut window = InflightWindow::new(4);
        let request = requests(1).remove(0);
        let id = request.correlation_id();
        window.admit(request).expect("admit");

        let retired = window.retire(&id).expect("known id retires");
        assert_eq!(retired.correlation_id(), id);
        assert!(window.retire(&id).is_none(), "second retire is a no-op");
        assert!(window.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut window = InflightWindow::new(4);
        let request = requests(1).remove(0);
        let copy = request.clone();
        window.admit(request).expect("admit");
        assert_eq!(
            window.admit(copy.clone()).unwrap_err(),
            WindowError::Duplicate(copy.correlation_id())
        );
    }

    #[test]
    fn clear_reports_dropped_count() {
        let mut window = InflightWindow::new(8);
        for request in requests(5) {
            window.admit(request).expect("admit");
        }
        assert_eq!(window.clear(), 5);
        assert_eq!(window.available(), 8);
    }
}
