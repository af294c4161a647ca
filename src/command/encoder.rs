use crate::codec::envelope;
use crate::error::Result;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Which producer created a request. Acknowledgements of census requests feed the block
/// census; everything else is only checked for failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOrigin {
    Pyramid,
    Census,
}

impl CommandOrigin {
    /// Census probes fail whenever the block is not air, so their negative status is data.
    pub fn reports_failures(self) -> bool {
        matches!(self, CommandOrigin::Pyramid)
    }
}

impl Display for CommandOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandOrigin::Pyramid => f.write_str("pyramid"),
            CommandOrigin::Census => f.write_str("census"),
        }
    }
}

/// A command line bound to its correlation id. Immutable once encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    correlation_id: Uuid,
    command_line: String,
    created_order: u64,
    origin: CommandOrigin,
}

impl Request {
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn created_order(&self) -> u64 {
        self.created_order
    }

    pub fn origin(&self) -> CommandOrigin {
        self.origin
    }

    /// Renders the `commandRequest` wire frame for this request.
    pub fn to_frame(&self) -> Result<String> {
        envelope::command_frame(self.correlation_id, &self.command_line)
    }
}

/// Stamps command lines with fresh v4 ids and a per-session arrival index.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    next_order: u64,
}

impl CommandEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&mut self, command_line: impl Into<String>, origin: CommandOrigin) -> Request {
        let created_order = self.next_order;
        self.next_order += 1;
        Request {
            correlation_id: Uuid::new_v4(),
            command_line: command_line.into(),
            created_order,
            origin,
        }
    }

    pub fn encoded(&self) -> u64 {
        self.next_order
    }
}
