//! Error types for the gateway
//!
//! Every error here is handled by closing the affected client connection
//! (and, for tunnels, the paired backend connection). Nothing propagates to
//! the accept loop and nothing is retried.

use thiserror::Error;

/// Ways a client can violate the wire protocol during classification.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A varint ran past the 5-byte limit without terminating.
    #[error("varint exceeds 5 bytes")]
    OversizedVarInt,
    /// A buffer decode ran off the end of the frame.
    #[error("varint overruns frame buffer")]
    BufferOverrun,
    /// The declared frame length exceeds what a handshake-phase frame can be.
    #[error("frame length {0} exceeds limit")]
    OversizedFrame(usize),
    /// The frame ended before its declared fields did.
    #[error("frame truncated")]
    TruncatedFrame,
    /// A packet arrived with an id the current exchange does not allow.
    #[error("unexpected packet id {0}")]
    UnexpectedPacketId(u32),
    /// The handshake declared a next_state outside {1, 2}.
    #[error("invalid next_state {0}")]
    InvalidNextState(u32),
}

/// Errors raised while handling a single connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The peer closed the connection mid-read at some framing step.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The client sent bytes that do not form a valid handshake-phase exchange.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The backend could not be connected to within the timeout.
    #[error("backend {address}:{port} unavailable: {reason}")]
    BackendUnavailable {
        address: String,
        port: u16,
        reason: String,
    },

    /// The external wake trigger call failed. Logged and swallowed by the
    /// login path; the client still gets its disconnect message.
    #[error("wake trigger failed: {0}")]
    WakeTrigger(String),

    /// Socket-level failure outside the cases above.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Map an I/O error from a mid-frame read: a clean EOF means the peer
    /// hung up, anything else stays an I/O error.
    pub fn from_read_error(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            GatewayError::ConnectionClosed
        } else {
            GatewayError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_connection_closed() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "early eof");
        assert!(matches!(
            GatewayError::from_read_error(eof),
            GatewayError::ConnectionClosed
        ));
    }

    #[test]
    fn test_other_io_errors_stay_io() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            GatewayError::from_read_error(refused),
            GatewayError::Io(_)
        ));
    }

    #[test]
    fn test_violation_display() {
        let err = GatewayError::from(ProtocolViolation::InvalidNextState(3));
        assert_eq!(err.to_string(), "protocol error: invalid next_state 3");
    }
}
