//! # Bolt Protocol Implementation
//!
//! Low-level Bolt v1 protocol pieces for talking to Bolt-compatible graph
//! databases.
//!
//! ## Overview
//!
//! - **PackStream** - Binary serialization format for all data types
//! - **Message Types** - Request/response message handling
//! - **Handshake** - Protocol version negotiation
//! - **Codec** - Chunk framing and message codec
//!
//! ## Submodules
//!
//! - [`packstream`] - Binary serialization/deserialization
//! - [`message`] - Bolt message types (INIT, RUN, PULL_ALL, etc.)
//! - [`handshake`] - Version negotiation
//! - [`codec`] - `tokio_util` codecs for chunked framing
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the Bolt protocol directly.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;

pub use codec::{ChunkCodec, MessageCodec};
pub use error::{BoltError, BoltResult, FramingError, HandshakeError};
pub use handshake::{BoltVersion, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE};
pub use message::{
    AuthToken, BoltRequest, BoltResponse, FailureMessage, InitMessage, RecordMessage,
    RunMessage, SuccessMessage,
};
pub use packstream::{PackStreamDecoder, PackStreamEncoder, PackStreamError, Structure, Value};
