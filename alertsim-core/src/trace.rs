//! The time-ordered log of what the applications sent and received.

use crate::{SimTime, app::AppId, network::Address, node::NodeId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Send,
    Receive,
}

/// One payload handed to, or taken from, the network by an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub time: SimTime,
    pub node: NodeId,
    pub app: AppId,
    pub role: Role,
    pub bytes: u64,
    /// the destination of a send, the sender of a receive
    pub peer: Address,
}

/// Records are appended as the simulation runs, so they are ordered by
/// [`TraceRecord::time`].
#[derive(Debug, Default)]
pub struct Trace {
    records: Vec<TraceRecord>,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.role {
            Role::Send => "->",
            Role::Receive => "<-",
        };
        write!(
            f,
            "{} node {} {} {} {} bytes {} {}",
            self.time, self.node, self.app, self.role, self.bytes, arrow, self.peer
        )
    }
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: TraceRecord) {
        debug_assert!(
            self.records.last().is_none_or(|last| last.time <= record.time),
            "trace records are appended in time order"
        );
        self.records.push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    pub fn sends(&self) -> impl Iterator<Item = &TraceRecord> {
        self.iter().filter(|record| record.role == Role::Send)
    }

    pub fn receives(&self) -> impl Iterator<Item = &TraceRecord> {
        self.iter().filter(|record| record.role == Role::Receive)
    }

    /// the records of a single application
    pub fn of(&self, app: AppId) -> impl Iterator<Item = &TraceRecord> {
        self.iter().filter(move |record| record.app == app)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
