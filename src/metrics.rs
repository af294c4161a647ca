use crate::backpressure::WindowSnapshot;
use crate::telemetry::{runtime_counters, RuntimeCounters};
use ::metrics::{Key, Label, Level, Metadata};
use std::sync::OnceLock;

pub use crate::telemetry::RuntimeCountersSnapshot;

/// Collector that wraps the runtime counter APIs with a single entrypoint.
pub struct MetricsCollector {
    counters: &'static RuntimeCounters,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            counters: runtime_counters(),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<MetricsCollector> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        self.counters.snapshot()
    }

    pub fn record_session_opened(&self) {
        self.counters.record_session_opened();
    }

    pub fn record_session_closed(&self, dropped: u64) {
        self.counters.record_session_closed();
        self.counters.add_requests_dropped(dropped);
    }

    pub fn record_enqueued(&self, count: u64) {
        self.counters.add_commands_enqueued(count);
    }

    pub fn record_transmitted(&self) {
        self.counters.inc_commands_transmitted();
        record_frame("command");
    }

    pub fn record_handshake(&self) {
        record_frame("subscribe");
    }

    pub fn record_acknowledged(&self, failed: bool) {
        self.counters.inc_commands_acknowledged();
        if failed {
            self.counters.inc_commands_failed();
        }
    }

    pub fn record_stale_acknowledgement(&self) {
        self.counters.inc_stale_acknowledgements();
    }

    pub fn record_malformed_frame(&self) {
        self.counters.inc_malformed_frames();
    }

    pub fn record_window(&self, session: &str, snapshot: WindowSnapshot) {
        let labels = vec![Label::new("session", session.to_owned())];
        let key = Key::from_parts("mineproxy_window_inflight", labels);
        let metadata = Metadata::new(module_path!(), Level::DEBUG, Some(module_path!()));
        ::metrics::with_recorder(|recorder| {
            recorder
                .register_gauge(&key, &metadata)
                .set(snapshot.inflight as f64);
        });
    }
}

/// Returns the shared `MetricsCollector` instance.
pub fn metrics() -> &'static MetricsCollector {
    MetricsCollector::global()
}

fn record_frame(kind: &str) {
    let labels = vec![Label::new("kind", kind.to_owned())];
    let key = Key::from_parts("mineproxy_frames_sent_total", labels);
    let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

    ::metrics::with_recorder(|recorder| {
        recorder.register_counter(&key, &metadata).increment(1);
    });
}


#[cfg(test)]
mod tests {
    use super::testing::GaugeRecorder;
    use super::*;

    #[test]
    fn window_gauge_is_labelled_per_session() {
        let recorder = GaugeRecorder::default();
        ::metrics::with_local_recorder(&recorder, || {
            let snapshot = WindowSnapshot {
                capacity: 4,
                inflight: 3,
            };
            metrics().record_window("first", snapshot);
            metrics().record_window(
                "second",
                WindowSnapshot {
                    inflight: 0,
                    ..snapshot
                },
            );
        });
        assert_eq!(recorder.window_gauge("first"), Some(3.0));
        assert_eq!(recorder.window_gauge("second"), Some(0.0));
        assert_eq!(recorder.window_gauge("third"), None);
    }
}
