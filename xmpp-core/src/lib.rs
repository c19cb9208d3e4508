//! # xmpp-core
//!
//! Core types for XMPP stream feature negotiation.
//!
//! This crate provides the session state flags, the address type, the
//! structured token model and its reader/writer seams, the IQ envelope and
//! stanza error payload, and the random identifier sources shared by the
//! negotiation crates.

pub mod error;
pub mod jid;
pub mod memory;
pub mod random;
pub mod stanza;
pub mod state;
pub mod token;

pub use error::{XmppError, XmppResult};
pub use jid::{Jid, JidError};
pub use memory::MemoryTransport;
pub use random::{IdSource, OsRngIds, SeededIds};
pub use stanza::{Condition, ErrorType, Iq, IqType, StanzaError};
pub use state::SessionState;
pub use token::{Attr, Element, Name, Node, StartElement, Token, TokenReader, TokenWriter};

/// Namespaces used during stream negotiation.
pub mod ns {
    /// Client-to-server stanza namespace.
    pub const CLIENT: &str = "jabber:client";
    /// Resource binding feature.
    pub const BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";
    /// Stanza error conditions.
    pub const STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
}
