use crate::backpressure::{InflightWindow, WindowSnapshot};
use crate::command::encoder::Request;
use crate::error::Result;
use crate::metrics::metrics;
use crate::session::backlog::Backlog;
use crate::transport::CommandSink;

/// Moves requests from the backlog into the in-flight window without ever exceeding its
/// capacity. Transmission order equals enqueue order.
#[derive(Debug)]
pub struct Dispatcher {
    backlog: Backlog,
    window: InflightWindow,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            backlog: Backlog::new(),
            window: InflightWindow::new(capacity),
        }
    }

    pub fn enqueue(&mut self, request: Request) {
        self.backlog.enqueue(request);
    }

    /// Appends every request and returns how many were added.
    pub fn enqueue_all<I>(&mut self, requests: I) -> usize
    where
        I: IntoIterator<Item = Request>,
    {
        let before = self.backlog.len();
        self.backlog.extend(requests);
        self.backlog.len() - before
    }

    /// One dispatch cycle: fill the free window slots from the head of the backlog.
    /// Each request is transmitted before it is admitted, so a failed write leaves it out
    /// of the window.
    pub async fn dispatch<S>(&mut self, sink: &mut S) -> Result<usize>
    where
        S: CommandSink + ?Sized,
    {
        let batch = self.backlog.drain(self.window.available());
        let admitted = batch.len();

        for request in batch {
            sink.transmit(request.to_frame()?).await?;
            self.window.admit(request)?;
            metrics().record_transmitted();
        }

        Ok(admitted)
    }

    pub fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    pub fn window(&self) -> &InflightWindow {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut InflightWindow {
        &mut self.window
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.window.snapshot()
    }

    /// Nothing queued and nothing awaiting acknowledgement.
    pub fn is_idle(&self) -> bool {
        self.backlog.is_empty() && self.window.is_empty()
    }

    /// Drops all pending work, returning `(backlog, inflight)` counts.
    pub fn discard(&mut self) -> (usize, usize) {
        (self.backlog.clear(), self.window.clear())
    }
}
