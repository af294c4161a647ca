use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use std::fmt::{self as stdfmt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::{
    self as fmt_subscriber, format::Writer, FmtContext, FormatEvent, FormatFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "mineproxy";
const DEFAULT_FILTER: &str = "mineproxy=info,info";

/// Installs the process-wide subscriber: INFO and below on stdout, WARN and above on stderr,
/// one `key=value` line per event. `RUST_LOG` overrides the default filter.
pub fn init_tracing() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .or_else(std::io::stdout);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(false)
        .with_ansi(false)
        .event_format(KeyValueFormatter::new())
        .fmt_fields(fmt_subscriber::format::DefaultFields::new())
        .with_writer(writer)
        .try_init()
        .map_err(|err| crate::err!("failed to initialise tracing subscriber: {err}"))
}

pub struct KeyValueFormatter {
    service_name: &'static str,
}

impl KeyValueFormatter {
    pub const fn new() -> Self {
        Self {
            service_name: SERVICE_NAME,
        }
    }
}

impl Default for KeyValueFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, N> FormatEvent<S, N> for KeyValueFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let metadata = event.metadata();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut fields = visitor.fields;
        fields.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        let mut line = LogLine::default();
        line.field(
            "ts",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        line.field("level", metadata.level().as_str());
        line.field("service", self.service_name);
        line.field("component", metadata.target());
        line.field("pid", &std::process::id().to_string());
        if let Some(span_path) = current_span_path(ctx) {
            line.field("span", &span_path);
        }
        line.field("msg", &message);
        for (key, value) in &fields {
            line.field(key, value);
        }

        writer.write_str(&line.finish())?;
        writer.write_char('\n')
    }
}

fn current_span_path<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<String>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    let span = ctx.lookup_current()?;
    let names: Vec<&str> = span.scope().from_root().map(|s| s.name()).collect();
    (!names.is_empty()).then(|| names.join("."))
}

#[derive(Default)]
struct LogLine {
    buffer: String,
}

impl LogLine {
    fn field(&mut self, key: &str, value: &str) {
        if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        self.buffer.push_str(key);
        self.buffer.push('=');
        push_field_value(&mut self.buffer, value);
    }

    fn finish(self) -> String {
        self.buffer
    }
}

fn push_field_value(buffer: &mut String, value: &str) {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '=' | '{' | '}' | ','));

    if !needs_quotes {
        buffer.push_str(value);
        return;
    }

    buffer.push('"');
    for ch in value.chars() {
        match ch {
            '"' => buffer.push_str("\\\""),
            '\\' => buffer.push_str("\\\\"),
            '\n' => buffer.push_str("\\n"),
            '\r' => buffer.push_str("\\r"),
            '\t' => buffer.push_str("\\t"),
            _ => buffer.push(ch),
        }
    }
    buffer.push('"');
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldVisitor {
    fn record_field(&mut self, field: &Field, value: String) {
        match field.name() {
            "" => {}
            "message" => self.message = Some(value),
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_field(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        self.record_field(field, format!("{value:?}"));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record_field(field, value.to_string());
    }
}

/// Process-wide counters shared by every session.
#[derive(Default)]
pub struct RuntimeCounters {
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    active_sessions: AtomicU64,
    commands_enqueued: AtomicU64,
    commands_transmitted: AtomicU64,
    commands_acknowledged: AtomicU64,
    commands_failed: AtomicU64,
    stale_acknowledgements: AtomicU64,
    malformed_frames: AtomicU64,
    requests_dropped: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeCountersSnapshot {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub active_sessions: u64,
    pub commands_enqueued: u64,
    pub commands_transmitted: u64,
    pub commands_acknowledged: u64,
    pub commands_failed: u64,
    pub stale_acknowledgements: u64,
    pub malformed_frames: u64,
    pub requests_dropped: u64,
}

static RUNTIME_COUNTERS: OnceLock<RuntimeCounters> = OnceLock::new();

pub fn runtime_counters() -> &'static RuntimeCounters {
    RUNTIME_COUNTERS.get_or_init(RuntimeCounters::default)
}

impl RuntimeCounters {
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
        let _ = self.active_sessions.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| (current > 0).then_some(current - 1),
        );
    }

    pub fn add_commands_enqueued(&self, count: u64) {
        self.commands_enqueued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_commands_transmitted(&self) {
        self.commands_transmitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_acknowledged(&self) {
        self.commands_acknowledged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stale_acknowledgements(&self) {
        self.stale_acknowledgements.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed_frames(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_requests_dropped(&self, count: u64) {
        self.requests_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeCountersSnapshot {
        RuntimeCountersSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            commands_enqueued: self.commands_enqueued.load(Ordering::Relaxed),
            commands_transmitted: self.commands_transmitted.load(Ordering::Relaxed),
            commands_acknowledged: self.commands_acknowledged.load(Ordering::Relaxed),
            commands_failed: self.commands_failed.load(Ordering::Relaxed),
            stale_acknowledgements: self.stale_acknowledgements.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
        }
    }
}
