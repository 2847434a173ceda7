use thiserror::Error;

/// Errors raised while reading an ICAP request off the wire.
///
/// Every variant except `Io` means the peer sent something we cannot frame;
/// the connection answers `400 Bad Request` and is closed.
#[derive(Debug, Error)]
pub enum IcapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed in the middle of a message")]
    UnexpectedEof,

    #[error("invalid ICAP request line: {0}")]
    InvalidRequestLine(String),

    #[error("invalid ICAP version: {0}")]
    InvalidVersion(String),

    #[error("invalid header line: {0}")]
    InvalidHeader(String),

    #[error("invalid Encapsulated header: {0}")]
    InvalidEncapsulated(String),

    #[error("invalid encapsulated HTTP request: {0}")]
    InvalidHttpRequest(String),

    #[error("REQMOD request carries no encapsulated request header")]
    MissingRequestHeader,

    #[error("invalid chunk framing: {0}")]
    InvalidChunk(String),

    #[error("line exceeds limit of {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("message head exceeds limit of {limit} bytes")]
    HeadTooLarge { limit: usize },
}

impl IcapError {
    /// Map `read_exact` style failures so a short read reports as EOF.
    pub(crate) fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            IcapError::UnexpectedEof
        } else {
            IcapError::Io(err)
        }
    }
}
