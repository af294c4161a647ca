use crate::command::encoder::Request;
use std::collections::VecDeque;

/// Requests generated but not yet transmitted, in arrival order.
#[derive(Debug, Default)]
pub struct Backlog {
    queue: VecDeque<Request>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: Request) {
        self.queue.push_back(request);
    }

    /// Removes up to `max` requests from the head, oldest first.
    pub fn drain(&mut self, max: usize) -> Vec<Request> {
        let take = max.min(self.queue.len());
        self.queue.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl Extend<Request> for Backlog {
    fn extend<I: IntoIterator<Item = Request>>(&mut self, iter: I) {
        self.queue.extend(iter);
    }
}
