//! Recorder - record/replay transport decorator
//!
//! In RECORD mode every flushed write and every read of the wrapped transport
//! is captured as an [`Event`]. In REPLAY mode no I/O happens at all: reads are
//! served from the log and flushed writes are checked byte-for-byte against it.
//!
//! A recording is a JSONL file where each line is one `Event`:
//!
//! ```text
//! {"dir":"sent","bytes":[96,96,176,23,...]}
//! {"dir":"received","bytes":[0,0,0,1]}
//! ```
//!
//! [`Script`] builds a replay log from Bolt messages, which turns a recorder
//! into a deterministic fake server.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, LineWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::codec::Encoder;
use tracing::{trace, warn};

use super::transport::Transport;
use crate::bolt::handshake::build_client_handshake;
use crate::bolt::packstream::encode;
use crate::bolt::{BoltRequest, BoltResponse, BoltResult, BoltVersion, ChunkCodec, MessageCodec, Value};

// ============================================================================
// Event log
// ============================================================================

/// One captured transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dir", rename_all = "snake_case")]
pub enum Event {
    /// Everything written between two flushes
    Sent { bytes: Vec<u8> },
    /// The bytes of one read
    Received { bytes: Vec<u8> },
}

impl Event {
    pub fn sent(bytes: impl Into<Vec<u8>>) -> Self {
        Event::Sent { bytes: bytes.into() }
    }

    pub fn received(bytes: impl Into<Vec<u8>>) -> Self {
        Event::Received { bytes: bytes.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Event::Sent { bytes } | Event::Received { bytes } => bytes,
        }
    }
}

/// Shared in-memory recording
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events captured so far
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    /// Write the recording as JSONL.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        save(path, &self.events())
    }
}

/// Read a JSONL recording.
pub fn load(path: impl AsRef<Path>) -> io::Result<Vec<Event>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

/// Write events as JSONL, replacing the file.
pub fn save(path: impl AsRef<Path>, events: &[Event]) -> io::Result<()> {
    let mut file = LineWriter::new(File::create(path)?);
    for event in events {
        writeln!(file, "{}", serde_json::to_string(event)?)?;
    }
    file.flush()
}

// ============================================================================
// Recorder
// ============================================================================

/// Recorder mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Record,
    Replay,
}

enum Sink {
    Memory(EventLog),
    File(LineWriter<File>),
}

impl Sink {
    fn emit(&mut self, event: Event) -> io::Result<()> {
        match self {
            Sink::Memory(log) => {
                log.push(event);
                Ok(())
            }
            Sink::File(file) => writeln!(file, "{}", serde_json::to_string(&event)?),
        }
    }
}

enum State {
    Record {
        inner: Box<dyn Transport>,
        sink: Sink,
    },
    Replay {
        events: VecDeque<Event>,
        /// Received event being served, and how much of it was read
        current: Option<(Vec<u8>, usize)>,
    },
}

/// Record/replay transport
pub struct Recorder {
    state: State,
    /// Writes since the last flush
    pending: Vec<u8>,
}

impl Recorder {
    /// Capture the traffic of `inner` into `log`.
    pub fn record(inner: impl Transport + 'static, log: EventLog) -> Self {
        Self::with_state(State::Record {
            inner: Box::new(inner),
            sink: Sink::Memory(log),
        })
    }

    /// Capture the traffic of `inner` into a JSONL file, one line per event.
    pub fn record_to_file(inner: impl Transport + 'static, path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_state(State::Record {
            inner: Box::new(inner),
            sink: Sink::File(LineWriter::new(file)),
        }))
    }

    /// Serve a previously captured exchange.
    pub fn replay(events: impl IntoIterator<Item = Event>) -> Self {
        Self::with_state(State::Replay {
            events: events.into_iter().collect(),
            current: None,
        })
    }

    /// Serve an exchange from a JSONL file.
    pub fn replay_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::replay(load(path)?))
    }

    fn with_state(state: State) -> Self {
        Self {
            state,
            pending: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.state {
            State::Record { .. } => Mode::Record,
            State::Replay { .. } => Mode::Replay,
        }
    }

    /// Events not yet consumed by a replay; zero when recording.
    pub fn remaining(&self) -> usize {
        match &self.state {
            State::Record { .. } => 0,
            State::Replay { events, current } => {
                let partial = current.as_ref().map_or(0, |(bytes, pos)| usize::from(*pos < bytes.len()));
                events.len() + partial
            }
        }
    }
}

fn out_of_order(expected: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("replay out of order: next logged event is a {}", expected),
    )
}

impl Read for Recorder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            State::Record { inner, sink } => {
                if !self.pending.is_empty() {
                    sink.emit(Event::sent(std::mem::take(&mut self.pending)))?;
                }
                let n = inner.read(buf)?;
                if n > 0 {
                    trace!(bytes = n, "Recorded read");
                    sink.emit(Event::received(&buf[..n]))?;
                }
                Ok(n)
            }
            State::Replay { events, current } => {
                if buf.is_empty() {
                    return Ok(0);
                }
                if !self.pending.is_empty() {
                    return Err(out_of_order("send awaiting flush"));
                }
                if current.as_ref().map_or(true, |(bytes, pos)| *pos >= bytes.len()) {
                    *current = match events.pop_front() {
                        None => return Ok(0),
                        Some(Event::Received { bytes }) => Some((bytes, 0)),
                        Some(sent @ Event::Sent { .. }) => {
                            events.push_front(sent);
                            return Err(out_of_order("send"));
                        }
                    };
                }

                let Some((bytes, pos)) = current.as_mut() else {
                    return Ok(0);
                };
                let n = buf.len().min(bytes.len() - *pos);
                buf[..n].copy_from_slice(&bytes[*pos..*pos + n]);
                *pos += n;
                Ok(n)
            }
        }
    }
}

impl Write for Recorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.state {
            State::Record { inner, .. } => inner.write(buf)?,
            State::Replay { .. } => buf.len(),
        };
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.state {
            State::Record { inner, sink } => {
                inner.flush()?;
                if !self.pending.is_empty() {
                    trace!(bytes = self.pending.len(), "Recorded send");
                    sink.emit(Event::sent(std::mem::take(&mut self.pending)))?;
                }
                Ok(())
            }
            State::Replay { events, current } => {
                if self.pending.is_empty() {
                    return Ok(());
                }
                if current.as_ref().is_some_and(|(bytes, pos)| *pos < bytes.len()) {
                    return Err(out_of_order("receive"));
                }
                match events.pop_front() {
                    Some(Event::Sent { bytes }) if bytes == self.pending => {
                        self.pending.clear();
                        Ok(())
                    }
                    Some(Event::Sent { bytes }) => {
                        warn!(expected = bytes.len(), actual = self.pending.len(), "Replay send mismatch");
                        Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "replay mismatch: sent bytes differ from the log",
                        ))
                    }
                    Some(received @ Event::Received { .. }) => {
                        events.push_front(received);
                        Err(out_of_order("receive"))
                    }
                    None => Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "replay log exhausted",
                    )),
                }
            }
        }
    }
}

impl Transport for Recorder {
    fn set_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        match &mut self.state {
            State::Record { inner, .. } => inner.set_timeout(timeout),
            State::Replay { .. } => Ok(()),
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match &mut self.state {
            State::Record { inner, sink } => {
                if let Sink::File(file) = sink {
                    file.flush()?;
                }
                inner.shutdown()
            }
            State::Replay { .. } => Ok(()),
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("mode", &self.mode())
            .field("pending", &self.pending.len())
            .field("remaining", &self.remaining())
            .finish()
    }
}

// ============================================================================
// Script
// ============================================================================

/// Builds a replay log from Bolt messages.
///
/// # Example
///
/// ```rust
/// use bolt_client::bolt::{AuthToken, BoltRequest, BoltResponse, BoltVersion, SuccessMessage};
/// use bolt_client::driver::{Recorder, Script, Session, SessionConfig};
///
/// let events = Script::new()
///     .handshake(BoltVersion::V1)
///     .exchange(
///         BoltRequest::init("agent/1.0", AuthToken::none()),
///         vec![BoltResponse::Success(SuccessMessage::new())],
///     )
///     .build()
///     .unwrap();
///
/// let mut session = Session::open(Recorder::replay(events), &SessionConfig::default()).unwrap();
/// session.init("agent/1.0", AuthToken::none()).unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
enum Step {
    Handshake(BoltVersion),
    Exchange(BoltRequest, Vec<BoltResponse>),
    Raw(Event),
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client handshake answered with `version`.
    pub fn handshake(mut self, version: BoltVersion) -> Self {
        self.steps.push(Step::Handshake(version));
        self
    }

    /// One request and the responses the server sends back for it.
    pub fn exchange(mut self, request: BoltRequest, responses: Vec<BoltResponse>) -> Self {
        self.steps.push(Step::Exchange(request, responses));
        self
    }

    /// A literal event, for malformed or truncated traffic.
    pub fn raw(mut self, event: Event) -> Self {
        self.steps.push(Step::Raw(event));
        self
    }

    pub fn build(self) -> BoltResult<Vec<Event>> {
        let mut requests = MessageCodec::new();
        let mut chunks = ChunkCodec::new();
        let mut events = Vec::with_capacity(self.steps.len() * 2);

        for step in self.steps {
            match step {
                Step::Handshake(version) => {
                    events.push(Event::sent(build_client_handshake(&BoltVersion::ALL)));
                    events.push(Event::received(version.to_bytes()));
                }
                Step::Exchange(request, responses) => {
                    let mut sent = BytesMut::new();
                    requests.encode(&request, &mut sent)?;
                    events.push(Event::sent(sent.to_vec()));

                    if !responses.is_empty() {
                        let mut received = BytesMut::new();
                        for response in &responses {
                            let body = encode(&Value::Structure(response.to_structure()))?;
                            chunks.encode(&body[..], &mut received)?;
                        }
                        events.push(Event::received(received.to_vec()));
                    }
                }
                Step::Raw(event) => events.push(event),
            }
        }
        Ok(events)
    }

    /// Shorthand for `Recorder::replay(self.build()?)`.
    pub fn into_recorder(self) -> BoltResult<Recorder> {
        Ok(Recorder::replay(self.build()?))
    }
}

// ============================================================================
// Tests
// ============================================================================
