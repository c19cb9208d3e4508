//! Session collaborator seen by features, and a concrete session that
//! applies negotiation results.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use xmpp_core::{
    Jid, SessionState, StartElement, Token, TokenReader, TokenWriter, XmppError, XmppResult,
};

use crate::config::SessionConfig;
use crate::feature::{FeatureData, Negotiated, StreamFeature};

/// A duplex token stream.
pub trait Transport: TokenReader + TokenWriter {
    fn as_reader(&mut self) -> &mut dyn TokenReader;
    fn as_writer(&mut self) -> &mut dyn TokenWriter;
}

impl<T: TokenReader + TokenWriter> Transport for T {
    fn as_reader(&mut self) -> &mut dyn TokenReader {
        self
    }

    fn as_writer(&mut self) -> &mut dyn TokenWriter {
        self
    }
}

/// What a feature may see of the session it negotiates on.
pub trait Session: Send {
    fn state(&self) -> SessionState;

    /// The peer's currently known address, if any.
    fn remote_addr(&self) -> Option<&Jid>;

    fn config(&self) -> &SessionConfig;

    fn transport(&mut self) -> &mut dyn Transport;

    /// Signal that aborts any pending stream operation.
    fn cancellation(&self) -> &CancellationToken;
}

/// Race `fut` against `cancel`.
pub async fn with_cancel<F, T>(cancel: &CancellationToken, fut: F) -> XmppResult<T>
where
    F: Future<Output = XmppResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(XmppError::Cancelled),
        res = fut => res,
    }
}

/// A session in the feature negotiation phase.
pub struct NegotiationSession {
    state: SessionState,
    config: SessionConfig,
    local_addr: Jid,
    remote_addr: Option<Jid>,
    transport: Box<dyn Transport>,
    cancel: CancellationToken,
}

impl NegotiationSession {
    /// Session for the party that opened the connection.
    pub fn initiating(config: SessionConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            state: SessionState::empty(),
            local_addr: config.origin.clone(),
            config,
            remote_addr: None,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Session for the party that accepted the connection from `remote`.
    pub fn receiving(config: SessionConfig, remote: Jid, transport: Box<dyn Transport>) -> Self {
        Self {
            state: SessionState::RECEIVED,
            local_addr: config.origin.clone(),
            config,
            remote_addr: Some(remote),
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Start from milestones already reached (for example `SECURE | AUTHN`
    /// after TLS and SASL). The role bit is ignored.
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state.merge(state);
        self
    }

    /// Use an externally owned cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn local_addr(&self) -> &Jid {
        &self.local_addr
    }

    /// Merge a negotiation result into the session.
    ///
    /// Flags are only added, the bound address is recorded on the side it
    /// belongs to, and a replacement stream takes over the transport.
    pub fn apply(&mut self, negotiated: Negotiated) {
        self.state.merge(negotiated.state);

        if let Some(bound) = negotiated.bound {
            if self.state.is_receiving() {
                tracing::debug!("peer bound to {}", bound);
                self.remote_addr = Some(bound);
            } else {
                tracing::debug!("bound to {}", bound);
                self.local_addr = bound;
            }
        }

        if let Some(stream) = negotiated.stream {
            tracing::debug!("transport replaced");
            self.transport = stream;
        }
    }

    /// Write `feature`'s advertisement.
    pub async fn advertise(&mut self, feature: &dyn StreamFeature) -> XmppResult<bool> {
        let start = StartElement::new(feature.name());
        let cancel = self.cancel.clone();
        with_cancel(&cancel, feature.advertise(self.transport.as_writer(), &start)).await
    }

    /// Read the peer's next element and parse it as a request for `feature`.
    pub async fn read_feature_request(&mut self, feature: &dyn StreamFeature) -> XmppResult<FeatureData> {
        let cancel = self.cancel.clone();
        let start = match with_cancel(&cancel, self.transport.token()).await? {
            Token::Start(start) => start,
            other => {
                return Err(XmppError::Format(format!(
                    "expected feature request, got {}",
                    other.describe()
                )))
            }
        };
        with_cancel(&cancel, feature.parse(self.transport.as_reader(), start)).await
    }

    /// Negotiate one feature and apply the result. Returns the new state.
    pub async fn negotiate(
        &mut self,
        feature: &dyn StreamFeature,
        data: FeatureData,
    ) -> XmppResult<SessionState> {
        if !feature.applicable(self.state) {
            return Err(XmppError::NotApplicable(feature.name().to_string()));
        }
        let negotiated = feature.negotiate(self, data).await?;
        self.apply(negotiated);
        Ok(self.state)
    }
}

impl Session for NegotiationSession {
    fn state(&self) -> SessionState {
        self.state
    }

    fn remote_addr(&self) -> Option<&Jid> {
        self.remote_addr.as_ref()
    }

    fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmpp_core::MemoryTransport;

    fn config() -> SessionConfig {
        SessionConfig::new("user@example.com".parse().unwrap())
    }

    #[test]
    fn receiving_role_fixed_at_construction() {
        let session = NegotiationSession::initiating(config(), Box::new(MemoryTransport::new()))
            .with_state(SessionState::RECEIVED | SessionState::AUTHN);
        assert!(!session.state().is_receiving());
        assert!(session.state().contains(SessionState::AUTHN));

        let peer: Jid = "user@example.com/orig".parse().unwrap();
        let session =
            NegotiationSession::receiving(config(), peer.clone(), Box::new(MemoryTransport::new()));
        assert!(session.state().is_receiving());
        assert_eq!(session.remote_addr(), Some(&peer));
    }

    #[test]
    fn apply_records_bound_address_by_role() {
        let bound: Jid = "user@example.com/r1".parse().unwrap();

        let mut client = NegotiationSession::initiating(config(), Box::new(MemoryTransport::new()));
        client.apply(Negotiated::new(SessionState::READY).with_bound(bound.clone()));
        assert_eq!(client.local_addr(), &bound);
        assert!(client.state().is_ready());

        let peer: Jid = "user@example.com/orig".parse().unwrap();
        let mut server =
            NegotiationSession::receiving(config(), peer, Box::new(MemoryTransport::new()));
        server.apply(Negotiated::new(SessionState::empty()).with_bound(bound.clone()));
        assert_eq!(server.remote_addr(), Some(&bound));
        assert_eq!(server.local_addr(), &config().origin);
        assert!(!server.state().is_ready());
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_read() {
        let (a, _b) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let mut session =
            NegotiationSession::initiating(config(), Box::new(xmpp_stream::FramedTokens::new(a)))
                .with_cancellation(cancel.clone());

        let bind = crate::bind::BindResource::new();
        let (res, _) = tokio::join!(session.read_feature_request(&bind), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cancel.cancel();
        });
        assert!(matches!(res, Err(XmppError::Cancelled)));
    }

    #[tokio::test]
    async fn with_cancel_passes_through_results() {
        let cancel = CancellationToken::new();
        let value = with_cancel(&cancel, async { Ok::<_, XmppError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
