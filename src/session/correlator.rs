use crate::backpressure::InflightWindow;
use crate::bridge_event;
use crate::codec::envelope::Acknowledgement;
use crate::command::encoder::Request;
use crate::metrics::metrics;
use uuid::Uuid;

/// Result of matching one acknowledgement against the in-flight window.
#[derive(Debug, PartialEq, Eq)]
pub enum Correlation {
    Retired { request: Request, failed: bool },
    /// Unknown, foreign or already retired id. Nothing changed.
    Stale,
}

/// Retires acknowledged requests and reports command failures for one session.
#[derive(Clone, Debug)]
pub struct ResponseCorrelator {
    session: Uuid,
}

impl ResponseCorrelator {
    pub fn new(session: Uuid) -> Self {
        Self { session }
    }

    pub fn correlate(&self, window: &mut InflightWindow, ack: &Acknowledgement) -> Correlation {
        let Some(request) = ack
            .correlation_id()
            .and_then(|id| window.retire(&id))
        else {
            metrics().record_stale_acknowledgement();
            bridge_event!(
                debug,
                "stale acknowledgement ignored",
                session = self.session,
                request_id = ack.request_id,
            );
            return Correlation::Stale;
        };

        let failed = ack.is_failure();
        let reported = failed && request.origin().reports_failures();
        metrics().record_acknowledged(reported);
        if reported {
            self.report_failure(&request, ack);
        }

        Correlation::Retired { request, failed }
    }

    /// Emits the warning for a command the game refused. Retired requests are never retried.
    pub fn report_failure(&self, request: &Request, ack: &Acknowledgement) {
        bridge_event!(
            warn,
            "command failed",
            session = self.session,
            command = request.command_line(),
            origin = request.origin(),
            status_code = ack.status_label(),
            status_message = ack.status_message,
        );
    }
}
