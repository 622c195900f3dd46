use std::fmt;

use serde::Serialize;

/// Registry key for one in-flight run. Unique per process, carries no
/// ordering meaning between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Fetching,
    ProcessingPage,
    Recursing,
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Events published by the fetch controller for observers such as badge
/// counters or the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FetchEvent {
    RunStarted {
        run_id: RunId,
    },
    RunStateChanged {
        run_id: RunId,
        state: RunState,
    },
    EnvelopeHandled {
        run_id: RunId,
        source: String,
        timestamp: u64,
    },
    AcknowledgeFailed {
        source: String,
        timestamp: u64,
        error: String,
    },
    RunFinished {
        run_id: RunId,
        state: RunState,
        continued_as: Option<RunId>,
    },
}
