use crate::config::BridgeConfig;
use crate::error::Result;
use crate::metrics::metrics;
use crate::session::SessionSettings;
use crate::transport::WebSocketRuntime;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub struct BridgeApp {
    runtime: WebSocketRuntime,
    shutdown: CancellationToken,
    drain_timeout: Duration,
}

impl BridgeApp {
    /// Validates the configuration and binds the listener. Nothing is accepted until
    /// [`run`](Self::run).
    pub async fn initialise(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let drain_timeout = config.drain_timeout()?;
        let address = config.listen.address();
        let runtime =
            WebSocketRuntime::bind(&address, SessionSettings::from_config(&config)).await?;

        Ok(Self {
            runtime,
            shutdown: CancellationToken::new(),
            drain_timeout,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.runtime.local_addr()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `signal` resolves, the shutdown token is cancelled or the runtime exits,
    /// then drains open sessions within the configured drain timeout.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut runtime,
            shutdown,
            drain_timeout,
        } = self;

        let run = runtime.start(shutdown.clone())?;
        let name = run.name();
        let mut run_task = tokio::spawn(run.wait());

        tracing::info!(
            address = %runtime.local_addr(),
            "minecraft bridge ready; press Ctrl+C to stop"
        );

        tokio::select! {
            res = &mut run_task => {
                tracing::warn!(transport = name, "transport runtime stopped before shutdown");
                return match res {
                    Ok(result) => result,
                    Err(join_err) => Err(crate::err!(
                        "transport runtime supervisor join error: {join_err}"
                    )),
                };
            }
            _ = signal => {
                tracing::info!("shutdown signal received");
            }
            _ = shutdown.cancelled() => {
                tracing::info!("shutdown requested");
            }
        }

        shutdown.cancel();

        let outcome = match timeout(drain_timeout, &mut run_task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(crate::err!(
                "transport runtime supervisor join error: {join_err}"
            )),
            Err(_) => {
                tracing::error!(
                    timeout_secs = drain_timeout.as_secs_f64(),
                    "graceful shutdown exceeded drain_timeout; aborting open sessions"
                );
                run_task.abort();
                Err(crate::err!(
                    "graceful shutdown timed out after {:?}",
                    drain_timeout
                ))
            }
        };

        let totals = metrics().snapshot();
        tracing::info!(
            sessions = totals.sessions_opened,
            transmitted = totals.commands_transmitted,
            acknowledged = totals.commands_acknowledged,
            failed = totals.commands_failed,
            dropped = totals.requests_dropped,
            "minecraft bridge stopped"
        );
        outcome
    }
}
