//! Error types for XMPP stream negotiation.

use thiserror::Error;

use crate::jid::JidError;
use crate::stanza::StanzaError;

/// Stream negotiation errors.
#[derive(Debug, Error)]
pub enum XmppError {
    /// Transport error (encode, decode, flush or connection I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected token kind, or an element with the wrong name or namespace.
    #[error("bad format: {0}")]
    Format(String),

    /// Response identifier does not match the outstanding request.
    #[error("correlation mismatch: expected id {expected:?}, got {actual:?}")]
    Correlation { expected: String, actual: String },

    /// The peer answered with an error-type response.
    #[error("remote error: {0}")]
    Remote(StanzaError),

    /// The peer answered with a response type that is neither result nor error.
    #[error("unexpected response type: {0}")]
    UnexpectedResponse(String),

    /// Address construction or validation failed while assigning a resource.
    #[error("address assignment failed: {0}")]
    Assignment(String),

    /// Malformed address.
    #[error("jid error: {0}")]
    Jid(#[from] JidError),

    /// Frame serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The feature's applicability predicate rejects the session state.
    #[error("feature {0} does not apply in the current state")]
    NotApplicable(String),

    /// The ambient cancellation signal fired while waiting on the stream.
    #[error("negotiation cancelled")]
    Cancelled,
}

impl XmppError {
    /// Whether the caller may continue the session after this error, for
    /// example by trying another feature. Only an explicit error response
    /// from the peer qualifies.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Result type alias for XMPP negotiation operations.
pub type XmppResult<T> = Result<T, XmppError>;
