//! Per-connection state machine. A [`Session`] owns its backlog, in-flight window and
//! census, and is driven one inbound frame at a time by whichever transport accepted the
//! connection.

pub mod backlog;
pub mod census;
pub mod correlator;
pub mod dispatcher;

use crate::bridge_event;
use crate::codec::envelope::{
    self, Acknowledgement, ChatMessage, Inbound, PLAYER_MESSAGE_EVENT,
};
use crate::command::{
    BlockCensusGenerator, CommandEncoder, CommandGenerator, CommandOrigin, PyramidGenerator,
    Trigger, TriggerMatch, TriggerMatcher,
};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::metrics::metrics;
use crate::transport::CommandSink;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub use backlog::Backlog;
pub use census::{BlockCensus, CensusCounts};
pub use correlator::{Correlation, ResponseCorrelator};
pub use dispatcher::Dispatcher;

/// Knobs every session on a listener shares.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub window_capacity: usize,
    pub progress_interval: usize,
    pub pyramid_block: String,
    pub max_pyramid_size: u32,
    pub census_radius: u32,
    pub max_census_depth: u32,
    pub census_output: PathBuf,
    pub allowed_senders: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            window_capacity: config.flow.window_capacity,
            progress_interval: config.flow.progress_interval,
            pyramid_block: config.pyramid.block.clone(),
            max_pyramid_size: config.pyramid.max_size,
            census_radius: config.census.radius,
            max_census_depth: config.census.max_depth,
            census_output: config.census.output_path.clone(),
            allowed_senders: config.allowed_senders.clone(),
        }
    }
}

/// What one inbound frame caused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub enqueued: usize,
    pub retired: bool,
    pub failed: bool,
    pub malformed: bool,
    pub admitted: usize,
    pub backlog: usize,
    pub inflight: usize,
}

/// Work abandoned when a session ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub backlog_dropped: usize,
    pub inflight_dropped: usize,
    pub encoded: u64,
}

pub struct Session {
    id: Uuid,
    peer: String,
    encoder: CommandEncoder,
    dispatcher: Dispatcher,
    correlator: ResponseCorrelator,
    triggers: TriggerMatcher,
    pyramid: PyramidGenerator,
    census_probes: BlockCensusGenerator,
    census: BlockCensus,
    allowed_senders: Vec<String>,
    progress_interval: usize,
}

impl Session {
    pub fn new(settings: &SessionSettings, peer: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            peer: peer.into(),
            encoder: CommandEncoder::new(),
            dispatcher: Dispatcher::new(settings.window_capacity),
            correlator: ResponseCorrelator::new(id),
            triggers: TriggerMatcher::new(settings.max_pyramid_size, settings.max_census_depth),
            pyramid: PyramidGenerator::new(settings.pyramid_block.clone()),
            census_probes: BlockCensusGenerator::new(settings.census_radius),
            census: BlockCensus::new(session_census_path(&settings.census_output, id)),
            allowed_senders: settings.allowed_senders.clone(),
            progress_interval: settings.progress_interval.max(1),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn census(&self) -> &BlockCensus {
        &self.census
    }

    /// Subscribes to chat events. Must run before the first inbound frame is handled.
    pub async fn open<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: CommandSink + ?Sized,
    {
        metrics().record_session_opened();
        let frame = envelope::subscribe_frame(Uuid::new_v4(), PLAYER_MESSAGE_EVENT)?;
        sink.transmit(frame).await?;
        metrics().record_handshake();
        bridge_event!(
            info,
            "session opened",
            session = self.id,
            peer = self.peer,
            capacity = self.dispatcher.window().capacity(),
        );
        Ok(())
    }

    /// Runs one full cycle for an inbound frame: decode, enqueue triggered commands,
    /// correlate acknowledgements, then dispatch into the freed window slots.
    pub async fn handle_frame<S>(&mut self, raw: &str, sink: &mut S) -> Result<CycleReport>
    where
        S: CommandSink + ?Sized,
    {
        let mut report = CycleReport::default();

        match envelope::decode_inbound(raw) {
            Ok(Inbound::PlayerMessage(chat)) => report.enqueued = self.handle_chat(&chat),
            Ok(Inbound::Acknowledgement(ack)) => self.handle_acknowledgement(&ack, &mut report),
            Ok(Inbound::Event { name }) => {
                bridge_event!(trace, "event ignored", session = self.id, name = name);
            }
            Ok(Inbound::Other) => {}
            Err(err) => {
                report.malformed = true;
                metrics().record_malformed_frame();
                bridge_event!(
                    warn,
                    "malformed frame skipped",
                    session = self.id,
                    peer = self.peer,
                    error = err,
                );
            }
        }

        report.admitted = self.dispatcher.dispatch(sink).await?;
        report.backlog = self.dispatcher.backlog().len();
        report.inflight = self.dispatcher.window().len();
        let snapshot = self.dispatcher.snapshot();
        metrics().record_window(&self.id.to_string(), snapshot);

        if report.admitted > 0 && report.backlog % self.progress_interval == 0 {
            bridge_event!(
                info,
                "dispatch progress",
                session = self.id,
                backlog = report.backlog,
                inflight = report.inflight,
                paused = snapshot.paused(),
            );
        }

        if self.dispatcher.is_idle() {
            self.flush_census().await;
        }

        Ok(report)
    }

    /// Expands a trigger into commands at the tail of the backlog.
    pub fn enqueue_trigger(&mut self, trigger: Trigger) -> usize {
        let expanded = match trigger {
            Trigger::Pyramid { size } => self
                .pyramid
                .commands(size)
                .map(|commands| self.enqueue_commands(CommandOrigin::Pyramid, commands)),
            Trigger::BlockCensus { depth } => self
                .census_probes
                .commands(depth)
                .map(|commands| self.enqueue_commands(CommandOrigin::Census, commands)),
        };
        let added = match expanded {
            Ok(added) => added,
            Err(err) => {
                bridge_event!(
                    warn,
                    "trigger rejected",
                    session = self.id,
                    trigger = trigger,
                    reason = err,
                );
                return 0;
            }
        };

        metrics().record_enqueued(added as u64);
        bridge_event!(
            info,
            "trigger accepted",
            session = self.id,
            trigger = trigger,
            enqueued = added,
            backlog = self.dispatcher.backlog().len(),
        );
        added
    }

    /// Drops pending work and flushes any unsaved census data.
    pub async fn close(mut self) -> SessionSummary {
        self.flush_census().await;
        let (backlog_dropped, inflight_dropped) = self.dispatcher.discard();
        metrics().record_session_closed((backlog_dropped + inflight_dropped) as u64);
        metrics().record_window(&self.id.to_string(), self.dispatcher.snapshot());
        bridge_event!(
            info,
            "session closed",
            session = self.id,
            peer = self.peer,
            backlog_dropped = backlog_dropped,
            inflight_dropped = inflight_dropped,
            encoded = self.encoder.encoded(),
        );
        SessionSummary {
            backlog_dropped,
            inflight_dropped,
            encoded: self.encoder.encoded(),
        }
    }

    fn handle_chat(&mut self, chat: &ChatMessage) -> usize {
        if !self.sender_allowed(chat.sender.as_deref()) {
            bridge_event!(
                debug,
                "chat from unlisted sender ignored",
                session = self.id,
                sender = chat.sender.as_deref().unwrap_or("-"),
            );
            return 0;
        }

        match self.triggers.scan(&chat.message) {
            TriggerMatch::Matched(trigger) => self.enqueue_trigger(trigger),
            TriggerMatch::Rejected { keyword, reason } => {
                bridge_event!(
                    warn,
                    "trigger rejected",
                    session = self.id,
                    keyword = keyword,
                    reason = reason,
                );
                0
            }
            TriggerMatch::NoMatch => 0,
        }
    }

    fn handle_acknowledgement(&mut self, ack: &Acknowledgement, report: &mut CycleReport) {
        let Correlation::Retired { request, failed } =
            self.correlator.correlate(self.dispatcher.window_mut(), ack)
        else {
            return;
        };

        report.retired = true;
        report.failed = failed && request.origin().reports_failures();

        if request.origin() == CommandOrigin::Census {
            let counted = self.census.record(ack);
            if failed && !counted {
                self.correlator.report_failure(&request, ack);
                report.failed = true;
            }
        }
    }

    fn sender_allowed(&self, sender: Option<&str>) -> bool {
        if self.allowed_senders.is_empty() {
            return true;
        }
        sender.is_some_and(|sender| {
            self.allowed_senders
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(sender))
        })
    }

    fn enqueue_commands<I>(&mut self, origin: CommandOrigin, commands: I) -> usize
    where
        I: Iterator<Item = String>,
    {
        let encoder = &mut self.encoder;
        self.dispatcher
            .enqueue_all(commands.map(|line| encoder.encode(line, origin)))
    }

    async fn flush_census(&mut self) {
        match self.census.flush().await {
            Ok(true) => bridge_event!(
                info,
                "census written",
                session = self.id,
                path = self.census.output_path().display(),
                probes_counted = self.census.counts().total(),
            ),
            Ok(false) => {}
            Err(err) => bridge_event!(warn, "census write failed", session = self.id, error = err),
        }
    }
}

/// Gives every session its own census file: `blockcount.json` becomes
/// `blockcount-<session>.json` next to it.
fn session_census_path(base: &Path, session: Uuid) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "census".to_string());
    let name = match base.extension() {
        Some(extension) => format!("{stem}-{session}.{}", extension.to_string_lossy()),
        None => format!("{stem}-{session}"),
    };
    base.with_file_name(name)
}
