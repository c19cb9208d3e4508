//! Stream feature contract.
//!
//! A feature is a stateless descriptor: a wire name, an applicability
//! predicate over [`SessionState`], and the advertise / parse / negotiate
//! operations an engine drives in that order.

use std::fmt;

use async_trait::async_trait;
use xmpp_core::{Jid, Name, SessionState, StartElement, TokenReader, TokenWriter, XmppResult};

use crate::bind::BindRequest;
use crate::session::{Session, Transport};

/// Payload produced by [`StreamFeature::parse`] and handed unchanged to
/// [`StreamFeature::negotiate`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeatureData {
    /// Nothing was parsed (the initiating side, or a feature with no payload).
    #[default]
    None,
    /// A resource binding request.
    Bind(BindRequest),
}

/// Outcome of a successful negotiation.
///
/// Nothing is produced on failure, so a partial delta can never be applied.
#[derive(Default)]
pub struct Negotiated {
    /// Flags to merge into the session state.
    pub state: SessionState,
    /// Replacement transport for features that restart the stream.
    pub stream: Option<Box<dyn Transport>>,
    /// Address fixed by this exchange: our own on the initiating side, the
    /// peer's on the receiving side.
    pub bound: Option<Jid>,
}

impl Negotiated {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Attach the bound address.
    pub fn with_bound(mut self, bound: Jid) -> Self {
        self.bound = Some(bound);
        self
    }
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated")
            .field("state", &self.state)
            .field("stream", &self.stream.as_ref().map(|_| "<transport>"))
            .field("bound", &self.bound)
            .finish()
    }
}

/// A negotiable stream feature.
///
/// Operations must never run concurrently against the same session: the
/// stream's token order carries the protocol.
#[async_trait]
pub trait StreamFeature: Send + Sync {
    /// Wire name of the feature element.
    fn name(&self) -> Name;

    /// Bits that must all be set for the feature to apply.
    fn necessary(&self) -> SessionState;

    /// Bits that must all be clear for the feature to apply.
    fn prohibited(&self) -> SessionState;

    /// Check whether the feature applies to a session in `state`.
    fn applicable(&self, state: SessionState) -> bool {
        state.contains(self.necessary()) && !state.intersects(self.prohibited())
    }

    /// Write the feature's advertisement and flush. Returns whether the
    /// feature is mandatory to negotiate.
    async fn advertise(&self, writer: &mut dyn TokenWriter, start: &StartElement) -> XmppResult<bool>;

    /// Decode the peer's feature-initiation element opened by `start`.
    ///
    /// An element this feature does not handle is a `Format` error.
    async fn parse(&self, reader: &mut dyn TokenReader, start: StartElement) -> XmppResult<FeatureData>;

    /// Run the feature's handshake.
    async fn negotiate(&self, session: &mut dyn Session, data: FeatureData) -> XmppResult<Negotiated>;
}
