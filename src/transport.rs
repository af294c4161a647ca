use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

pub mod websocket;

pub use websocket::{WebSocketRuntime, WebSocketSink};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportHealth {
    Idle,
    Running,
    Degraded { reason: String },
    Shutdown,
}

/// Outbound half of a game connection. The session writes every frame through this seam,
/// which keeps it independent of the socket.
#[async_trait]
pub trait CommandSink: Send {
    async fn transmit(&mut self, frame: String) -> Result<()>;

    /// Ends the outbound half. Sinks without a close handshake have nothing to do.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CommandSink for Vec<String> {
    async fn transmit(&mut self, frame: String) -> Result<()> {
        self.push(frame);
        Ok(())
    }
}

/// Handle to a started transport that resolves once its accept loop and sessions finish.
pub struct TransportRun {
    name: &'static str,
    future: Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>,
}

impl TransportRun {
    pub fn new<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name,
            future: Box::pin(future),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn wait(self) -> Result<()> {
        self.future.await
    }
}
