//! Session - Bolt 세션
//!
//! 세션 하나가 전송 계층 하나를 소유하고 Bolt v1 메시지 순서를 강제합니다.
//! 응답을 기다리는 요청은 최대 하나이며, 현재 [`SessionState`]에서 허용되지
//! 않는 요청은 전송 없이 실패합니다.
//!
//! | 오류 | 범위 | 세션 |
//! |------|------|------|
//! | I/O, 프레이밍, 알 수 없는 마커 | 치명적 | `Defunct`, 전송 계층 종료 |
//! | 디코딩 실패 (시그니처는 읽힘) | 해당 메시지 | 메시지 종류대로 상태 전이 |
//! | 서버 FAILURE / IGNORED | 요청 | `Failed` (ACK_FAILURE 또는 RESET 필요) |
//! | 허용되지 않는 요청 | 로컬 | 변화 없음 |
//!
//! # 예시
//!
//! ```rust,no_run
//! use bolt_client::driver::{AuthToken, Session, SessionConfig};
//! use std::collections::HashMap;
//! use std::net::TcpStream;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("localhost:7687")?;
//! let mut session = Session::open(stream, &SessionConfig::default())?;
//! session.init("my-app/1.0", AuthToken::basic("neo4j", "secret"))?;
//!
//! let result = session.query("RETURN 1 AS n", HashMap::new())?;
//! assert_eq!(result.records[0].get("n").and_then(|v| v.as_int()), Some(1));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use super::config::SessionConfig;
use super::record::Record;
use super::state::{transition, SessionState};
use super::transport::Transport;
use crate::bolt::handshake;
use crate::bolt::message::tag;
use crate::bolt::{
    AuthToken, BoltError, BoltRequest, BoltResponse, BoltResult, BoltVersion, FailureMessage,
    FramingError, MessageCodec, RecordMessage, SuccessMessage, Value,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 8192;

// ============================================================================
// Results - 결과
// ============================================================================

/// RUN 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// 결과 필드 이름
    pub fields: Vec<String>,
    /// SUCCESS 메타데이터
    pub metadata: SuccessMessage,
}

/// PULL_ALL 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// 결과 필드 이름 (RUN 요약에서)
    pub fields: Vec<String>,
    /// 스트리밍된 레코드
    pub records: Vec<Record>,
    /// 마지막 SUCCESS의 메타데이터
    pub metadata: SuccessMessage,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 레코드가 정확히 하나일 때 그 레코드
    pub fn single(&self) -> Option<&Record> {
        match self.records.as_slice() {
            [record] => Some(record),
            _ => None,
        }
    }
}

// ============================================================================
// Session - 세션
// ============================================================================

/// 전송 계층 하나 위의 Bolt 세션
pub struct Session<T: Transport> {
    id: u64,
    transport: T,
    codec: MessageCodec,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    version: BoltVersion,
    state: SessionState,
    /// 요약 응답을 기다리는 요청
    pending: Option<BoltRequest>,
    /// 스트리밍 중인 결과의 필드 이름
    fields: Arc<[String]>,
    server_agent: Option<String>,
}

impl<T: Transport> Session<T> {
    /// `transport` 위에서 핸드셰이크 수행 (세션은 `Connected`로 시작)
    ///
    /// 실패하면 전송 계층을 종료하고 버립니다.
    pub fn open(mut transport: T, config: &SessionConfig) -> BoltResult<Self> {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);

        let negotiated = transport
            .set_timeout(config.request_timeout)
            .map_err(BoltError::from)
            .and_then(|_| handshake::perform(&mut transport, &BoltVersion::ALL));

        let version = match negotiated {
            Ok(version) => version,
            Err(e) => {
                warn!(session = id, error = %e, "Handshake failed");
                transport.shutdown().ok();
                return Err(e);
            }
        };

        debug!(session = id, version = %version, "Session opened");
        Ok(Self {
            id,
            transport,
            codec: MessageCodec::with_limits(config.max_chunk_size, config.max_message_size),
            read_buffer: BytesMut::with_capacity(READ_CHUNK),
            write_buffer: BytesMut::with_capacity(READ_CHUNK),
            version,
            state: SessionState::Connected,
            pending: None,
            fields: Arc::from(Vec::new()),
            server_agent: None,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors - 접근자
    // ------------------------------------------------------------------------

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn version(&self) -> BoltVersion {
        self.version
    }

    /// INIT 응답의 서버 에이전트
    pub fn server_agent(&self) -> Option<&str> {
        self.server_agent.as_deref()
    }

    pub fn is_defunct(&self) -> bool {
        self.state.is_defunct()
    }

    /// 응답 대기 중인 요청 이름
    pub fn pending_request(&self) -> Option<&'static str> {
        self.pending.as_ref().map(BoltRequest::name)
    }

    // ------------------------------------------------------------------------
    // Low-level exchange - 저수준 송수신
    // ------------------------------------------------------------------------

    /// 요청 전송 (현재 상태에서 허용되지 않으면 I/O 없이 실패)
    pub fn send(&mut self, request: BoltRequest) -> BoltResult<()> {
        if self.state.is_defunct() {
            return Err(BoltError::Defunct);
        }
        if self.pending.is_some() || !self.state.allows(&request) {
            return Err(BoltError::protocol_violation(self.state, request.name()));
        }

        self.write_buffer.clear();
        self.codec.encode(&request, &mut self.write_buffer)?;

        let written = self
            .transport
            .write_all(&self.write_buffer)
            .and_then(|_| self.transport.flush());
        if let Err(e) = written {
            return Err(self.fail(e));
        }

        debug!(session = self.id, request = request.name(), "Request sent");
        self.pending = Some(request);
        Ok(())
    }

    /// 대기 중인 요청의 다음 응답 수신 및 상태 전이
    ///
    /// 프레이밍은 정상이지만 디코딩에 실패한 메시지는 오류로 보고되면서도
    /// 수신된 것으로 처리됩니다. 상태는 그 메시지의 종류에 따라 전이합니다.
    pub fn receive(&mut self) -> BoltResult<BoltResponse> {
        if self.state.is_defunct() {
            return Err(BoltError::Defunct);
        }
        let Some(request) = self.pending.take() else {
            return Err(BoltError::protocol_violation(self.state, "RECEIVE"));
        };

        let response = match self.read_response() {
            Ok(response) => response,
            Err(e) if e.is_fatal() => return Err(self.fail(e)),
            Err(e) => return Err(self.skip_undecodable(request, e)),
        };

        self.apply(request, &response);
        Ok(response)
    }

    /// 대기 중인 요청이 없어질 때까지 응답을 읽어서 버림
    pub fn drain(&mut self) -> BoltResult<()> {
        while self.pending.is_some() {
            if let Err(e) = self.receive() {
                if self.state.is_defunct() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// 요청 전송 후 첫 응답 수신
    pub fn request(&mut self, request: BoltRequest) -> BoltResult<BoltResponse> {
        self.send(request)?;
        self.receive()
    }

    fn read_response(&mut self) -> BoltResult<BoltResponse> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(response) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(response);
            }

            let n = match self.transport.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                return match self.codec.decode_eof(&mut self.read_buffer)? {
                    Some(response) => Ok(response),
                    None => Err(FramingError::ConnectionClosed.into()),
                };
            }
            self.read_buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn apply(&mut self, request: BoltRequest, response: &BoltResponse) {
        let step = transition(&request, response);
        debug!(
            session = self.id,
            request = request.name(),
            response = response.name(),
            state = %step.next,
            "Response received"
        );

        if step.still_pending {
            self.pending = Some(request);
        }
        self.state = step.next;
        if self.state.is_defunct() {
            self.retire();
        }
    }

    /// 디코딩에 실패한 메시지의 상태 전이 적용
    ///
    /// 시그니처만 알 수 있습니다. 시그니처도 없으면 더 이상 교환을 따라갈 수
    /// 없으므로 세션을 폐기합니다.
    fn skip_undecodable(&mut self, request: BoltRequest, error: BoltError) -> BoltError {
        let stand_in = match self.codec.last_signature() {
            Some(tag::SUCCESS) => BoltResponse::Success(SuccessMessage::new()),
            Some(tag::RECORD) => BoltResponse::Record(RecordMessage::new(Vec::new())),
            Some(tag::FAILURE) => BoltResponse::Failure(FailureMessage::new("", "")),
            Some(tag::IGNORED) => BoltResponse::Ignored,
            _ => {
                warn!(session = self.id, error = %error, "Undecodable response of unknown kind; session retired");
                self.state = SessionState::Defunct;
                self.retire();
                return error;
            }
        };

        warn!(session = self.id, response = stand_in.name(), error = %error, "Undecodable response skipped");
        if matches!(request, BoltRequest::Run(_)) {
            // 필드 이름은 잃어버린 SUCCESS에 있었음
            self.fields = Arc::from(Vec::new());
        }
        self.apply(request, &stand_in);
        error
    }

    /// `error`가 치명적이면 세션 폐기
    fn fail(&mut self, error: impl Into<BoltError>) -> BoltError {
        let error = error.into();
        if error.is_fatal() && !self.state.is_defunct() {
            warn!(session = self.id, error = %error, "Session retired");
            self.state = SessionState::Defunct;
            self.retire();
        }
        error
    }

    fn retire(&mut self) {
        self.pending = None;
        self.read_buffer.clear();
        self.transport.shutdown().ok();
    }

    // ------------------------------------------------------------------------
    // High-level operations - 고수준 연산
    // ------------------------------------------------------------------------

    /// 세션 INIT (서버의 SUCCESS 메타데이터 반환)
    pub fn init(&mut self, user_agent: &str, auth: AuthToken) -> BoltResult<SuccessMessage> {
        let request = BoltRequest::init(user_agent, auth);
        match self.request(request)? {
            BoltResponse::Success(success) => {
                self.server_agent = success.server().map(str::to_string);
                Ok(success)
            }
            other => Err(unexpected("INIT", other)),
        }
    }

    /// 쿼리 실행 (필드 이름은 이후 레코드에 사용)
    pub fn run(&mut self, statement: &str, parameters: HashMap<String, Value>) -> BoltResult<RunSummary> {
        match self.request(BoltRequest::run(statement, parameters))? {
            BoltResponse::Success(success) => {
                let fields = success.fields().unwrap_or_default();
                self.fields = Arc::from(fields.clone());
                Ok(RunSummary {
                    fields,
                    metadata: success,
                })
            }
            other => Err(unexpected("RUN", other)),
        }
    }

    /// 남은 레코드 전체 수신
    ///
    /// 디코딩에 실패한 레코드가 있어도 스트림을 끝까지 읽어 세션을 사용 가능한
    /// 상태로 두고, 첫 번째 오류를 반환합니다. 요약 응답이 디코딩에 실패하면
    /// 스트림은 거기서 끝납니다.
    pub fn pull_all(&mut self) -> BoltResult<QueryResult> {
        self.send(BoltRequest::PullAll)?;

        let mut records = Vec::new();
        let mut deferred = None;
        let metadata = loop {
            match self.receive() {
                Ok(BoltResponse::Record(record)) => {
                    records.push(Record::new(self.fields.clone(), record.fields));
                }
                Ok(BoltResponse::Success(success)) => break success,
                Ok(other) => return Err(unexpected("PULL_ALL", other)),
                Err(e) if self.pending.is_some() => {
                    deferred.get_or_insert(e);
                }
                Err(e) => return Err(deferred.unwrap_or(e)),
            }
        };

        match deferred {
            Some(e) => Err(e),
            None => Ok(QueryResult {
                fields: self.fields.to_vec(),
                records,
                metadata,
            }),
        }
    }

    /// 남은 레코드 전체 폐기
    pub fn discard_all(&mut self) -> BoltResult<SuccessMessage> {
        self.send(BoltRequest::DiscardAll)?;
        loop {
            match self.receive() {
                Ok(BoltResponse::Record(_)) => continue,
                Ok(BoltResponse::Success(success)) => return Ok(success),
                Ok(other) => return Err(unexpected("DISCARD_ALL", other)),
                Err(_) if self.pending.is_some() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// 현재 결과의 다음 레코드 (스트림이 끝나면 `None`)
    ///
    /// RUN 이후 첫 호출에서 PULL_ALL을 전송합니다.
    pub fn next_record(&mut self) -> BoltResult<Option<Record>> {
        if !matches!(self.pending, Some(BoltRequest::PullAll)) {
            if self.pending.is_some() || self.state != SessionState::Streaming {
                return Err(BoltError::protocol_violation(self.state, "PULL_ALL"));
            }
            self.send(BoltRequest::PullAll)?;
        }

        match self.receive()? {
            BoltResponse::Record(record) => Ok(Some(Record::new(self.fields.clone(), record.fields))),
            BoltResponse::Success(_) => Ok(None),
            other => Err(unexpected("PULL_ALL", other)),
        }
    }

    /// RUN 후 PULL_ALL
    pub fn query(&mut self, statement: &str, parameters: HashMap<String, Value>) -> BoltResult<QueryResult> {
        self.run(statement, parameters)?;
        self.pull_all()
    }

    /// 실패 확인 (`Ready`로 복귀)
    pub fn ack_failure(&mut self) -> BoltResult<()> {
        match self.request(BoltRequest::AckFailure)? {
            BoltResponse::Success(_) => Ok(()),
            other => Err(unexpected("ACK_FAILURE", other)),
        }
    }

    /// 진행 중인 작업 취소 (`Ready`로 복귀)
    pub fn reset(&mut self) -> BoltResult<()> {
        match self.request(BoltRequest::Reset)? {
            BoltResponse::Success(_) => Ok(()),
            other => Err(unexpected("RESET", other)),
        }
    }

    /// 이후 모든 읽기/쓰기의 타임아웃 설정 (타임아웃 시 세션 폐기)
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> BoltResult<()> {
        if self.state.is_defunct() {
            return Err(BoltError::Defunct);
        }
        self.transport.set_timeout(timeout).map_err(|e| self.fail(e))
    }

    /// 전송 계층 종료 (이후 세션은 `Defunct`)
    pub fn close(&mut self) {
        if !self.state.is_defunct() {
            debug!(session = self.id, "Session closed");
            self.state = SessionState::Defunct;
            self.retire();
        }
    }

    /// 세션을 버리고 전송 계층 회수
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("pending", &self.pending_request())
            .finish()
    }
}

/// SUCCESS가 아닌 요약 응답을 오류로 변환
fn unexpected(request: &'static str, response: BoltResponse) -> BoltError {
    match response {
        BoltResponse::Failure(FailureMessage { code, message }) => BoltError::Server { code, message },
        BoltResponse::Ignored => BoltError::Ignored,
        other => BoltError::UnexpectedResponse {
            request,
            response: other.name(),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::codec::ChunkCodec;
    use crate::bolt::handshake::build_client_handshake;
    use crate::bolt::packstream::encode;
    use crate::bolt::{RecordMessage, Structure};
    use std::collections::VecDeque;

    /// Fake server: answers each flushed request with the next scripted reply.
    struct Scripted {
        replies: VecDeque<Vec<u8>>,
        inbox: VecDeque<u8>,
        written: Vec<u8>,
        flushes: usize,
        closed: bool,
    }

    impl Scripted {
        fn new(replies: Vec<Vec<u8>>) -> Self {
            let mut all = VecDeque::from(vec![vec![0, 0, 0, 1]]);
            all.extend(replies);
            Self {
                replies: all,
                inbox: VecDeque::new(),
                written: Vec::new(),
                flushes: 0,
                closed: false,
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.inbox.len());
            for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            if let Some(reply) = self.replies.pop_front() {
                self.inbox.extend(reply);
            }
            Ok(())
        }
    }

    impl Transport for Scripted {
        fn shutdown(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn frame(responses: &[BoltResponse]) -> Vec<u8> {
        let mut codec = ChunkCodec::new();
        let mut out = BytesMut::new();
        for response in responses {
            let body = encode(&Value::Structure(response.to_structure())).unwrap();
            codec.encode(&body[..], &mut out).unwrap();
        }
        out.to_vec()
    }

    fn success() -> BoltResponse {
        BoltResponse::Success(SuccessMessage::new())
    }

    fn success_with(key: &str, value: Value) -> BoltResponse {
        let mut msg = SuccessMessage::new();
        msg.add(key, value);
        BoltResponse::Success(msg)
    }

    fn failure() -> BoltResponse {
        BoltResponse::Failure(FailureMessage::new("Neo.ClientError.Statement.SyntaxError", "bad"))
    }

    fn record(values: Vec<Value>) -> BoltResponse {
        BoltResponse::Record(RecordMessage::new(values))
    }

    fn open(replies: Vec<Vec<u8>>) -> Session<Scripted> {
        Session::open(Scripted::new(replies), &SessionConfig::default()).unwrap()
    }

    #[test]
    fn test_open_performs_handshake() {
        let session = open(vec![]);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.version(), BoltVersion::V1);
        let transport = session.into_transport();
        assert_eq!(&transport.written[..], &build_client_handshake(&[BoltVersion::V1])[..]);
        assert_eq!(transport.flushes, 1);
    }

    #[test]
    fn test_open_rejected_version() {
        let mut transport = Scripted::new(vec![]);
        transport.replies[0] = vec![0, 0, 0, 0];
        let err = Session::open(transport, &SessionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            BoltError::Handshake(crate::bolt::HandshakeError::NoCompatibleVersion)
        ));
    }

    #[test]
    fn test_full_exchange() {
        let mut session = open(vec![
            frame(&[success_with("server", Value::from("Neo4j/3.5.0"))]),
            frame(&[success_with("fields", Value::List(vec![Value::from("1")]))]),
            frame(&[record(vec![Value::Integer(1)]), success()]),
        ]);

        session.init("agent/1.0", AuthToken::none()).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.server_agent(), Some("Neo4j/3.5.0"));

        let summary = session.run("RETURN 1", HashMap::new()).unwrap();
        assert_eq!(summary.fields, ["1"]);
        assert_eq!(session.state(), SessionState::Streaming);

        let result = session.pull_all().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.single().and_then(|r| r.get("1")), Some(&Value::Integer(1)));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pending_request(), None);
    }

    #[test]
    fn test_illegal_request_sends_nothing() {
        let mut session = open(vec![]);
        let err = session.send(BoltRequest::PullAll).unwrap_err();
        assert!(matches!(
            err,
            BoltError::ProtocolViolation { state: SessionState::Connected, request: "PULL_ALL" }
        ));
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.into_transport().written.len(), 20);
    }

    #[test]
    fn test_no_pipelining() {
        let mut session = open(vec![frame(&[success()])]);
        session.send(BoltRequest::init("a", AuthToken::none())).unwrap();
        let err = session.send(BoltRequest::Reset).unwrap_err();
        assert!(matches!(err, BoltError::ProtocolViolation { request: "RESET", .. }));
        assert_eq!(session.pending_request(), Some("INIT"));
        assert!(session.receive().unwrap().is_success());
    }

    #[test]
    fn test_receive_without_pending() {
        let mut session = open(vec![]);
        assert!(matches!(
            session.receive(),
            Err(BoltError::ProtocolViolation { request: "RECEIVE", .. })
        ));
    }

    #[test]
    fn test_failure_ignored_ack_cycle() {
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[failure()]),
            frame(&[BoltResponse::Ignored]),
            frame(&[success()]),
            frame(&[success_with("fields", Value::List(vec![]))]),
        ]);
        session.init("a", AuthToken::none()).unwrap();

        let err = session.run("RETRUN 1", HashMap::new()).unwrap_err();
        assert!(matches!(err, BoltError::Server { ref code, .. } if code.ends_with("SyntaxError")));
        assert_eq!(session.state(), SessionState::Failed);

        // still failed: the server ignores everything but recovery
        assert!(matches!(session.run("RETURN 1", HashMap::new()), Err(BoltError::Ignored)));
        assert_eq!(session.state(), SessionState::Failed);

        session.ack_failure().unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        session.run("RETURN 1", HashMap::new()).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_failed_reset_is_defunct() {
        let mut session = open(vec![frame(&[failure()])]);
        assert!(session.reset().is_err());
        assert!(session.is_defunct());
        assert!(matches!(session.send(BoltRequest::Reset), Err(BoltError::Defunct)));
        assert!(session.into_transport().closed);
    }

    #[test]
    fn test_unexpected_record_is_defunct() {
        let mut session = open(vec![frame(&[record(vec![])])]);
        let err = session.init("a", AuthToken::none()).unwrap_err();
        assert!(matches!(err, BoltError::UnexpectedResponse { request: "INIT", response: "RECORD" }));
        assert!(session.is_defunct());
    }

    #[test]
    fn test_eof_is_defunct() {
        let mut session = open(vec![]);
        let err = session.init("a", AuthToken::none()).unwrap_err();
        assert!(matches!(err, BoltError::Framing(FramingError::ConnectionClosed)));
        assert!(err.is_fatal());
        assert!(session.is_defunct());
    }

    #[test]
    fn test_unknown_marker_is_defunct() {
        let mut session = open(vec![vec![0x00, 0x03, 0xB1, 0x70, 0xE5, 0x00, 0x00]]);
        let err = session.init("a", AuthToken::none()).unwrap_err();
        assert!(matches!(err, BoltError::Decode(crate::bolt::PackStreamError::UnknownMarker(0xE5))));
        assert!(session.is_defunct());
    }

    #[test]
    fn test_scoped_decode_error_drains_stream() {
        // Node with a missing field in the middle of the stream
        let bad_node = Structure::new(0x4E, vec![Value::Integer(1)]);
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[success_with("fields", Value::List(vec![Value::from("n")]))]),
            frame(&[
                record(vec![Value::Integer(1)]),
                record(vec![Value::Structure(bad_node)]),
                record(vec![Value::Integer(3)]),
                success(),
            ]),
        ]);
        session.init("a", AuthToken::none()).unwrap();
        session.run("MATCH (n) RETURN n", HashMap::new()).unwrap();

        let err = session.pull_all().unwrap_err();
        assert!(matches!(
            err,
            BoltError::Decode(crate::bolt::PackStreamError::FieldCount { signature: 0x4E, .. })
        ));
        assert!(!err.is_fatal());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pending_request(), None);
    }

    /// SUCCESS framed correctly but missing its metadata field
    const BARE_SUCCESS: [u8; 6] = [0x00, 0x02, 0xB0, 0x70, 0x00, 0x00];

    #[test]
    fn test_undecodable_summary_settles_request() {
        let mut session = open(vec![
            frame(&[success()]),
            BARE_SUCCESS.to_vec(),
            frame(&[success()]),
        ]);
        session.init("a", AuthToken::none()).unwrap();

        let err = session.run("RETURN 1", HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            BoltError::Decode(crate::bolt::PackStreamError::FieldCount { signature: 0x70, .. })
        ));
        assert!(!err.is_fatal());
        assert_eq!(session.pending_request(), None);
        assert_eq!(session.state(), SessionState::Streaming);

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_undecodable_failure_fails_session() {
        // FAILURE without its metadata field
        let mut session = open(vec![
            vec![0x00, 0x02, 0xB0, 0x7F, 0x00, 0x00],
            frame(&[success()]),
        ]);
        assert!(session.init("a", AuthToken::none()).is_err());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.pending_request(), None);

        session.ack_failure().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_undecodable_final_success_ends_stream() {
        let mut last = frame(&[record(vec![Value::Integer(1)])]);
        last.extend_from_slice(&BARE_SUCCESS);
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[success_with("fields", Value::List(vec![Value::from("n")]))]),
            last,
            frame(&[success_with("fields", Value::List(vec![]))]),
        ]);
        session.init("a", AuthToken::none()).unwrap();
        session.run("RETURN 1 AS n", HashMap::new()).unwrap();

        let err = session.pull_all().unwrap_err();
        assert!(matches!(
            err,
            BoltError::Decode(crate::bolt::PackStreamError::FieldCount { signature: 0x70, .. })
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pending_request(), None);

        session.run("RETURN 2", HashMap::new()).unwrap();
        assert_eq!(session.state(), SessionState::Streaming);
    }

    #[test]
    fn test_undecodable_message_of_unknown_kind_is_defunct() {
        // a bare integer where a message structure belongs
        let mut session = open(vec![vec![0x00, 0x01, 0x2A, 0x00, 0x00]]);
        let err = session.init("a", AuthToken::none()).unwrap_err();
        assert!(matches!(err, BoltError::Decode(crate::bolt::PackStreamError::NotAStructure(_))));
        assert!(session.is_defunct());
        assert!(session.into_transport().closed);
    }

    #[test]
    fn test_drain_pending_request() {
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[success_with("fields", Value::List(vec![]))]),
            frame(&[record(vec![]), record(vec![]), success()]),
        ]);
        session.init("a", AuthToken::none()).unwrap();
        session.run("UNWIND [1, 2] AS x RETURN x", HashMap::new()).unwrap();
        session.send(BoltRequest::PullAll).unwrap();

        session.drain().unwrap();
        assert_eq!(session.pending_request(), None);
        assert_eq!(session.state(), SessionState::Ready);

        // nothing pending: a no-op
        session.drain().unwrap();
    }

    #[test]
    fn test_next_record_streaming() {
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[success_with("fields", Value::List(vec![Value::from("x")]))]),
            frame(&[record(vec![Value::Integer(1)]), record(vec![Value::Integer(2)]), success()]),
        ]);
        session.init("a", AuthToken::none()).unwrap();
        session.run("UNWIND [1, 2] AS x RETURN x", HashMap::new()).unwrap();

        let mut seen = Vec::new();
        while let Some(record) = session.next_record().unwrap() {
            seen.push(record.get("x").and_then(|v| v.as_int()).unwrap());
        }
        assert_eq!(seen, [1, 2]);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(matches!(
            session.next_record(),
            Err(BoltError::ProtocolViolation { state: SessionState::Ready, .. })
        ));
    }

    #[test]
    fn test_discard_all() {
        let mut session = open(vec![
            frame(&[success()]),
            frame(&[success()]),
            frame(&[success_with("type", Value::from("r"))]),
        ]);
        session.init("a", AuthToken::none()).unwrap();
        session.run("RETURN 1", HashMap::new()).unwrap();
        let summary = session.discard_all().unwrap();
        assert_eq!(summary.statement_type(), Some("r"));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_close() {
        let mut session = open(vec![]);
        session.close();
        assert!(session.is_defunct());
        assert!(matches!(session.set_timeout(None), Err(BoltError::Defunct)));
        assert!(session.into_transport().closed);
    }
}
