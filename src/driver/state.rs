//! Session state machine.
//!
//! Pure transition tables: which requests are legal in which state, and where
//! each response leads given the request it answers. The session applies
//! them; nothing here performs I/O.

use std::fmt;

use crate::bolt::{BoltRequest, BoltResponse};

/// Protocol state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Handshake done, not yet initialized
    Connected,
    /// Ready to run a statement
    Ready,
    /// A statement ran and its result is waiting to be pulled or discarded
    Streaming,
    /// Server reported a failure; awaiting ACK_FAILURE or RESET
    Failed,
    /// Unusable; no further I/O
    Defunct,
}

impl SessionState {
    /// Whether `request` may be sent in this state.
    pub fn allows(self, request: &BoltRequest) -> bool {
        use BoltRequest::*;

        match self {
            SessionState::Connected => matches!(request, Init(_) | Reset),
            SessionState::Ready => matches!(request, Run(_) | Reset),
            SessionState::Streaming => matches!(request, PullAll | DiscardAll | Reset),
            // non-recovery requests are legal here; the server answers them with IGNORED
            SessionState::Failed => !matches!(request, Init(_)),
            SessionState::Defunct => false,
        }
    }

    pub fn is_defunct(self) -> bool {
        self == SessionState::Defunct
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connected => "CONNECTED",
            SessionState::Ready => "READY",
            SessionState::Streaming => "STREAMING",
            SessionState::Failed => "FAILED",
            SessionState::Defunct => "DEFUNCT",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying a response to the pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State after the response
    pub next: SessionState,
    /// Whether the request is still waiting for its summary
    pub still_pending: bool,
}

impl Transition {
    fn done(next: SessionState) -> Self {
        Self {
            next,
            still_pending: false,
        }
    }
}

/// Where `response` leads when it answers `request`.
pub fn transition(request: &BoltRequest, response: &BoltResponse) -> Transition {
    use BoltRequest::*;
    use SessionState::*;

    match (request, response) {
        (Init(_) | Run(_), BoltResponse::Success(_)) => {
            let next = if matches!(request, Init(_)) { Ready } else { Streaming };
            Transition::done(next)
        }
        (Init(_) | Run(_), BoltResponse::Failure(_) | BoltResponse::Ignored) => Transition::done(Failed),
        (Init(_) | Run(_), BoltResponse::Record(_)) => Transition::done(Defunct),

        (PullAll | DiscardAll, BoltResponse::Record(_)) => Transition {
            next: Streaming,
            still_pending: true,
        },
        (PullAll | DiscardAll, BoltResponse::Success(_)) => Transition::done(Ready),
        (PullAll | DiscardAll, BoltResponse::Failure(_) | BoltResponse::Ignored) => {
            Transition::done(Failed)
        }

        (AckFailure | Reset, BoltResponse::Success(_)) => Transition::done(Ready),
        (AckFailure | Reset, _) => Transition::done(Defunct),
    }
}
