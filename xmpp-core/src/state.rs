//! Session state flags.
//!
//! A session accumulates protocol milestones as bits. During negotiation
//! bits are only ever added; `RECEIVED` is fixed when the session is
//! constructed and never produced by a feature.

use bitflags::bitflags;

bitflags! {
    /// Milestones reached by a session so far.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SessionState: u8 {
        /// The underlying stream is encrypted.
        const SECURE               = 0b0000_0001;
        /// The peer (or we) have been authenticated.
        const AUTHN                = 0b0000_0010;
        /// All mandatory features have been negotiated.
        const READY                = 0b0000_0100;
        /// We are the receiving party (the server side of the connection).
        const RECEIVED             = 0b0000_1000;
        const OUTPUT_STREAM_CLOSED = 0b0001_0000;
        const INPUT_STREAM_CLOSED  = 0b0010_0000;
    }
}

impl SessionState {
    /// Check whether the receiving-role bit is set.
    pub fn is_receiving(&self) -> bool {
        self.contains(Self::RECEIVED)
    }

    /// Check whether the session has finished negotiation.
    pub fn is_ready(&self) -> bool {
        self.contains(Self::READY)
    }

    /// Merge a feature's delta into this state.
    ///
    /// Bits are only ever added. `RECEIVED` is dropped from the delta since
    /// the role is fixed at construction.
    pub fn merge(&mut self, delta: SessionState) {
        let role_bit = delta & Self::RECEIVED;
        if !role_bit.is_empty() && !self.contains(Self::RECEIVED) {
            tracing::warn!("ignoring attempt to set the receiving role during negotiation");
        }
        *self |= delta - Self::RECEIVED;
    }
}
