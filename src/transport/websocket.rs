use crate::bridge_event;
use crate::error::{Context, Result};
use crate::session::{Session, SessionSettings};
use crate::transport::{CommandSink, TransportHealth, TransportRun};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

const RUNTIME_NAME: &str = "websocket";

type SocketWriter = SplitSink<WebSocketStream<TcpStream>, Message>;
type SocketReader = SplitStream<WebSocketStream<TcpStream>>;

/// Writes command frames as websocket text messages.
pub struct WebSocketSink {
    inner: SocketWriter,
}

impl WebSocketSink {
    pub fn new(inner: SocketWriter) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CommandSink for WebSocketSink {
    async fn transmit(&mut self, frame: String) -> Result<()> {
        self.inner.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

/// Accepts game connections and runs one [`Session`] task per connection.
pub struct WebSocketRuntime {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    settings: Arc<SessionSettings>,
    health: Arc<Mutex<TransportHealth>>,
}

impl WebSocketRuntime {
    pub async fn bind(address: &str, settings: SessionSettings) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("failed to bind websocket listener on {address}"))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Some(listener),
            local_addr,
            settings: Arc::new(settings),
            health: Arc::new(Mutex::new(TransportHealth::Idle)),
        })
    }

    pub fn name(&self) -> &'static str {
        RUNTIME_NAME
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn health(&self) -> TransportHealth {
        read_health(&self.health)
    }

    /// Spawns nothing itself; the returned run drives the accept loop until `shutdown`
    /// fires and every session task has finished.
    pub fn start(&mut self, shutdown: CancellationToken) -> Result<TransportRun> {
        let Some(listener) = self.listener.take() else {
            crate::bail_err!("transport `{}` already started", RUNTIME_NAME);
        };

        set_health(&self.health, TransportHealth::Running);
        info!(address = %self.local_addr, "websocket bridge listening");

        let settings = Arc::clone(&self.settings);
        let health = Arc::clone(&self.health);
        Ok(TransportRun::new(
            RUNTIME_NAME,
            accept_loop(listener, settings, health, shutdown),
        ))
    }
}

async fn accept_loop(
    listener: TcpListener,
    settings: Arc<SessionSettings>,
    health: Arc<Mutex<TransportHealth>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut sessions: JoinSet<(SocketAddr, Result<()>)> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let settings = Arc::clone(&settings);
                    let shutdown = shutdown.clone();
                    sessions.spawn(async move {
                        let outcome = serve_connection(stream, peer, settings, shutdown).await;
                        (peer, outcome)
                    });
                }
                Err(err) => {
                    warn!(error = %err, "failed to accept websocket connection");
                    set_health(
                        &health,
                        TransportHealth::Degraded {
                            reason: format!("accept failed: {err}"),
                        },
                    );
                }
            },
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                report_session_exit(joined);
            }
        }
    }

    info!(sessions = sessions.len(), "websocket bridge draining sessions");
    while let Some(joined) = sessions.join_next().await {
        report_session_exit(joined);
    }

    set_health(&health, TransportHealth::Shutdown);
    Ok(())
}

fn report_session_exit(joined: std::result::Result<(SocketAddr, Result<()>), JoinError>) {
    match joined {
        Ok((_, Ok(()))) => {}
        Ok((peer, Err(err))) => {
            warn!(peer = %peer, error = %err, "session terminated with error");
        }
        Err(err) => warn!(error = %err, "session task panicked or was aborted"),
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    settings: Arc<SessionSettings>,
    shutdown: CancellationToken,
) -> Result<()> {
    let socket = tokio_tungstenite::accept_async(stream)
        .await
        .with_context(|| format!("websocket handshake with {peer} failed"))?;
    let (writer, mut reader) = socket.split();
    let mut sink = WebSocketSink::new(writer);
    let mut session = Session::new(&settings, peer.to_string());

    let outcome = drive_session(&mut session, &mut sink, &mut reader, &shutdown).await;
    let session_id = session.id();
    session.close().await;
    close_sink(&mut sink, session_id, peer).await;

    match outcome {
        Err(err) if err.is_connection_closed() => {
            bridge_event!(info, "connection dropped by peer", session = session_id, peer = peer);
            Ok(())
        }
        other => other,
    }
}

/// The session is already over, so a failed close is only worth a debug line.
async fn close_sink<S>(sink: &mut S, session: Uuid, peer: SocketAddr)
where
    S: CommandSink + ?Sized,
{
    if let Err(err) = sink.close().await {
        bridge_event!(
            debug,
            "websocket close failed",
            session = session,
            peer = peer,
            error = err,
        );
    }
}

async fn drive_session(
    session: &mut Session,
    sink: &mut WebSocketSink,
    reader: &mut SocketReader,
    shutdown: &CancellationToken,
) -> Result<()> {
    session.open(sink).await?;

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            message = reader.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                session.handle_frame(&text, sink).await?;
            }
            Some(Ok(Message::Binary(bytes))) => {
                let text = String::from_utf8_lossy(&bytes);
                session.handle_frame(&text, sink).await?;
            }
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

fn set_health(health: &Mutex<TransportHealth>, value: TransportHealth) {
    if let Ok(mut guard) = health.lock() {
        *guard = value;
    }
}

fn read_health(health: &Mutex<TransportHealth>) -> TransportHealth {
    health
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or(TransportHealth::Degraded {
            reason: "failed to read transport health state".to_string(),
        })
}
