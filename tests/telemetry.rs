#[path = "common/mod.rs"]
mod common;

use common::{ack_frame, chat_frame, request_id, settings_with_capacity};
use mineproxy::session::Session;
use mineproxy::telemetry::KeyValueFormatter;
use std::sync::{Arc, Mutex};
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

struct BufferWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = BufferGuard;

    fn make_writer(&'a self) -> Self::Writer {
        BufferGuard {
            buffer: self.buffer.clone(),
        }
    }
}

struct BufferGuard {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for BufferGuard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.buffer.lock().expect("log buffer lock");
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_logs<F>(action: F) -> String
where
    F: FnOnce(),
{
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = BufferWriter {
        buffer: buffer.clone(),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .event_format(KeyValueFormatter::new())
        .finish();

    with_default(subscriber, action);

    let contents = buffer.lock().expect("log buffer lock");
    String::from_utf8(contents.clone()).expect("utf8 logs")
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

mod tests {
    use super::*;

    #[test]
    fn failed_command_is_reported_once_with_context() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_with_capacity(100, &dir.path().join("census.json"));

        let output = capture_logs(|| {
            block_on(async {
                let mut session = Session::new(&settings, "10.0.0.7:40000");
                let mut sink: Vec<String> = Vec::new();
                session.open(&mut sink).await.expect("open");
                session
                    .handle_frame(&chat_frame("Steve", "pyramid 1"), &mut sink)
                    .await
                    .expect("trigger");

                let refused = request_id(&sink[1]);
                let ack = ack_frame(&refused, -2147483648, "Block out of world");
                session.handle_frame(&ack, &mut sink).await.expect("ack");
                session.handle_frame(&ack, &mut sink).await.expect("stale ack");
                session.close().await;
            })
        });

        let failures: Vec<&str> = output
            .lines()
            .filter(|line| line.contains("msg=\"command failed\""))
            .collect();
        assert_eq!(failures.len(), 1, "logs: {output}");
        let line = failures[0];
        assert!(line.contains("level=WARN"), "line: {line}");
        assert!(line.contains("service=mineproxy"), "line: {line}");
        assert!(line.contains("session="), "line: {line}");
        assert!(line.contains("command=\"setblock ~-1 ~0 ~-1 glowstone\""), "line: {line}");
        assert!(line.contains("status_code=-2147483648"), "line: {line}");
        assert!(line.contains("status_message=\"Block out of world\""), "line: {line}");

        assert!(output.contains("msg=\"stale acknowledgement ignored\""), "logs: {output}");
        assert!(output.contains("msg=\"trigger accepted\""), "logs: {output}");
        assert!(output.contains("trigger=\"pyramid 1\""), "logs: {output}");
        assert!(output.contains("msg=\"session closed\""), "logs: {output}");
        assert!(output.contains("inflight_dropped=15"), "logs: {output}");
        assert!(output.contains("peer=10.0.0.7:40000"), "logs: {output}");
    }

    #[test]
    fn malformed_frame_is_logged_and_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = settings_with_capacity(100, &dir.path().join("census.json"));

        let output = capture_logs(|| {
            block_on(async {
                let mut session = Session::new(&settings, "peer");
                let mut sink: Vec<String> = Vec::new();
                let report = session
                    .handle_frame("{ definitely not json", &mut sink)
                    .await
                    .expect("malformed frames are not fatal");
                assert!(report.malformed);
            })
        });

        assert!(output.contains("level=WARN"), "logs: {output}");
        assert!(output.contains("msg=\"malformed frame skipped\""), "logs: {output}");
        assert!(output.contains("error=\"frame is not a valid envelope"), "logs: {output}");
    }
}
