// SPDX-FileCopyrightText: Copyright (c) 2017-2023 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Library Error type

use crate::frame::ExceptionResponse;

/// A specialized [Result] type for Modbus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced anywhere in the protocol stack.
///
/// Framers resync on `Checksum`/`Framing`/`Decode` internally and never let
/// these reach a caller; the transaction manager is what actually surfaces
/// them, exactly once per submission.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A PDU field was out of the range the function code allows (e.g. a
    /// quantity of zero, or a `Vec` of coils longer than the wire format
    /// supports). Caller-side, never seen on the wire.
    #[error("cannot encode PDU: {0}")]
    Encode(String),

    /// Wire bytes did not match the expected framing/PDU shape.
    #[error("cannot decode PDU: {0}")]
    Decode(String),

    /// CRC (RTU/Binary) or LRC (ASCII) mismatch.
    #[error("checksum mismatch")]
    Checksum,

    /// An unrecoverable framing violation, e.g. a non-zero MBAP protocol id.
    #[error("framing error: {0}")]
    Framing(String),

    /// No response arrived before the deadline, after exhausting retries.
    #[error("request timed out")]
    Timeout,

    /// The transport reported EOF. Every pending transaction on the
    /// connection completes with this error.
    #[error("connection closed")]
    ConnectionClosed,

    /// A response matched a pending transaction's id/unit but not its
    /// function code. The connection remains usable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A well-formed Modbus exception response.
    #[error(transparent)]
    Exception(#[from] ExceptionResponse),

    /// The submission was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// Escape hatch for transport-level failures that don't fit the
    /// taxonomy above (e.g. the underlying socket returning `EPIPE`).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io) => io,
            Error::Timeout => std::io::Error::new(std::io::ErrorKind::TimedOut, err.to_string()),
            Error::ConnectionClosed => {
                std::io::Error::new(std::io::ErrorKind::NotConnected, err.to_string())
            }
            Error::Cancelled => {
                std::io::Error::new(std::io::ErrorKind::Interrupted, err.to_string())
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_round_trips_through_display() {
        let err = Error::from(ExceptionResponse {
            function: 0x03,
            exception: crate::frame::Exception::IllegalDataAddress,
        });
        assert_eq!(err.to_string(), "Modbus function 3: Illegal data address");
    }

    #[test]
    fn io_conversion_preserves_timeout_kind() {
        let io: std::io::Error = Error::Timeout.into();
        assert_eq!(io.kind(), std::io::ErrorKind::TimedOut);
    }
}
