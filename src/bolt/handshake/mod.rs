//! Bolt protocol handshake implementation.
//!
//! The Bolt handshake consists of:
//! 1. Client sends 4-byte magic number (0x6060B017)
//! 2. Client sends 4 x 4-byte version proposals (highest first, unused slots zero)
//! 3. Server responds with 4-byte agreed version (or 0 if none)

mod version;

use std::io::{self, Read, Write};

use tracing::debug;

pub use version::BoltVersion;

pub use super::error::HandshakeError;
use super::error::{BoltError, BoltResult};

/// Bolt protocol magic number: 0x6060B017
/// This identifies a Bolt connection.
pub const BOLT_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Size of the complete handshake message from client (magic + 4 versions)
pub const HANDSHAKE_SIZE: usize = 20;

/// Size of server response (negotiated version)
pub const HANDSHAKE_RESPONSE_SIZE: usize = 4;

/// Build a client handshake message proposing up to four versions.
pub fn build_client_handshake(versions: &[BoltVersion]) -> [u8; HANDSHAKE_SIZE] {
    let mut data = [0u8; HANDSHAKE_SIZE];

    data[0..4].copy_from_slice(&BOLT_MAGIC);

    for (i, version) in versions.iter().take(4).enumerate() {
        let offset = 4 + (i * 4);
        data[offset..offset + 4].copy_from_slice(&version.to_bytes());
    }

    data
}

/// Interpret the server's 4-byte reply.
pub fn parse_server_response(
    reply: [u8; HANDSHAKE_RESPONSE_SIZE],
    proposed: &[BoltVersion],
) -> Result<BoltVersion, HandshakeError> {
    match u32::from_be_bytes(reply) {
        0 => Err(HandshakeError::NoCompatibleVersion),
        raw => BoltVersion::from_u32(raw)
            .filter(|v| proposed.contains(v))
            .ok_or(HandshakeError::UnsupportedVersion(raw)),
    }
}

/// Run the client side of the handshake over a blocking stream.
///
/// The preamble goes out in a single write followed by a flush.
pub fn perform<S: Read + Write>(stream: &mut S, versions: &[BoltVersion]) -> BoltResult<BoltVersion> {
    let request = build_client_handshake(versions);
    stream.write_all(&request)?;
    stream.flush()?;

    let mut reply = [0u8; HANDSHAKE_RESPONSE_SIZE];
    stream.read_exact(&mut reply).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => BoltError::Handshake(HandshakeError::ConnectionClosed),
        _ => BoltError::Io(e),
    })?;

    let version = parse_server_response(reply, versions)?;
    debug!(version = %version, "Bolt handshake complete");
    Ok(version)
}
