//! Resource binding (RFC 6120 §7).
//!
//! Binding is the last mandatory feature: it fixes the full address of the
//! connected client. The two roles run different protocols:
//!
//! * initiating: send an IQ `set` carrying the desired resource, wait for the
//!   matching `result` and take the bound address from it;
//! * receiving: pick the final address (custom function, the requested
//!   resource, or a random one) and answer with it.
//!
//! Server-generated resourceparts come from an [`IdSource`], which must be
//! unguessable in production.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use xmpp_core::{
    ns, Condition, Element, ErrorType, IdSource, Iq, IqType, Jid, Name, OsRngIds, SessionState,
    StanzaError, StartElement, Token, TokenReader, TokenWriter, XmppError, XmppResult,
};

use crate::feature::{FeatureData, Negotiated, StreamFeature};
use crate::session::{with_cancel, Session, Transport};

/// Server-side address assignment: `(peer address, requested resource) -> bound address`.
pub type AssignFn = dyn Fn(&Jid, &str) -> XmppResult<Jid> + Send + Sync;

/// A parsed client request to bind a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindRequest {
    /// Identifier of the enclosing IQ. `None` when the caller owns the
    /// envelope and handed over the bare `<bind/>` element.
    pub id: Option<String>,
    /// Requested resourcepart; empty lets the server choose.
    pub resource: String,
}

/// Name of the `<bind/>` feature element.
pub fn bind_name() -> Name {
    Name::new(ns::BIND, "bind")
}

fn jid_name() -> Name {
    Name::new(ns::BIND, "jid")
}

fn resource_name() -> Name {
    Name::new(ns::BIND, "resource")
}

/// The resource binding stream feature.
pub struct BindResource {
    assign: Option<Arc<AssignFn>>,
    ids: Arc<dyn IdSource>,
}

impl BindResource {
    /// Binding with server-generated random resourceparts.
    pub fn new() -> Self {
        Self {
            assign: None,
            ids: Arc::new(OsRngIds),
        }
    }

    /// Binding where the receiving side calls `assign` to pick the address.
    /// Behaves like [`BindResource::new`] on the initiating side.
    pub fn custom<F>(assign: F) -> Self
    where
        F: Fn(&Jid, &str) -> XmppResult<Jid> + Send + Sync + 'static,
    {
        Self {
            assign: Some(Arc::new(assign)),
            ids: Arc::new(OsRngIds),
        }
    }

    /// Replace the identifier source used for request ids and generated
    /// resourceparts.
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }
}

impl Default for BindResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamFeature for BindResource {
    fn name(&self) -> Name {
        bind_name()
    }

    fn necessary(&self) -> SessionState {
        SessionState::AUTHN
    }

    fn prohibited(&self) -> SessionState {
        SessionState::READY
    }

    async fn advertise(&self, writer: &mut dyn TokenWriter, start: &StartElement) -> XmppResult<bool> {
        writer.write_token(Token::Start(start.clone())).await?;
        writer.write_token(start.end()).await?;
        writer.flush().await?;
        Ok(true)
    }

    async fn parse(&self, reader: &mut dyn TokenReader, start: StartElement) -> XmppResult<FeatureData> {
        if start.name != Iq::name() && start.name != bind_name() {
            return Err(XmppError::Format(format!(
                "expected bind request, got {}",
                start.name
            )));
        }
        let element = Element::decode(reader, start).await?;
        parse_bind_request(&element).map(FeatureData::Bind)
    }

    async fn negotiate(&self, session: &mut dyn Session, data: FeatureData) -> XmppResult<Negotiated> {
        let cancel = session.cancellation().clone();

        if session.state().is_receiving() {
            let FeatureData::Bind(request) = data else {
                return Err(XmppError::Format(
                    "resource binding needs a parsed bind request".to_string(),
                ));
            };
            let remote = session.remote_addr().cloned();
            let bound = bind_as_server(
                session.transport(),
                &cancel,
                self.ids.as_ref(),
                self.assign.as_deref(),
                remote.as_ref(),
                &request,
            )
            .await?;

            // With the bare payload the caller still owes the envelope, so
            // it also owns marking the session ready.
            let state = if request.id.is_some() {
                SessionState::READY
            } else {
                SessionState::empty()
            };
            return Ok(Negotiated::new(state).with_bound(bound));
        }

        let resource = session.config().requested_resource().to_string();
        let bound = bind_as_client(session.transport(), &cancel, self.ids.as_ref(), &resource).await?;
        Ok(Negotiated::new(SessionState::READY).with_bound(bound))
    }
}

/// Decode a client's bind request: either a full IQ `set` envelope or a bare
/// `<bind/>` element.
pub fn parse_bind_request(element: &Element) -> XmppResult<BindRequest> {
    if element.name == bind_name() {
        return Ok(BindRequest {
            id: None,
            resource: requested_resource(element),
        });
    }

    if element.name != Iq::name() {
        return Err(XmppError::Format(format!(
            "expected bind request, got {}",
            element.name
        )));
    }
    match element.attr("type") {
        Some("set") => {}
        other => {
            return Err(XmppError::Format(format!(
                "bind request must be an iq of type set, got {:?}",
                other
            )))
        }
    }
    let id = element
        .attr("id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| XmppError::Format("bind request has no id".to_string()))?;
    let bind = element
        .elements()
        .find(|e| e.name == bind_name())
        .ok_or_else(|| XmppError::Format("iq carries no bind payload".to_string()))?;

    Ok(BindRequest {
        id: Some(id.to_string()),
        resource: requested_resource(bind),
    })
}

fn requested_resource(bind: &Element) -> String {
    bind.child(ns::BIND, "resource")
        .map(|r| r.text().trim().to_string())
        .unwrap_or_default()
}

/// Initiating side of resource binding.
///
/// Sends an IQ `set` requesting `resource` (empty lets the peer choose) and
/// returns the address the peer bound us to.
pub async fn bind_as_client<T>(
    transport: &mut T,
    cancel: &CancellationToken,
    ids: &dyn IdSource,
    resource: &str,
) -> XmppResult<Jid>
where
    T: Transport + ?Sized,
{
    let req_id = ids.random_id();
    let mut bind = Element::new(bind_name());
    if !resource.is_empty() {
        bind = bind.with_child(Element::new(resource_name()).with_text(resource));
    }
    let request = Iq::new(req_id.clone(), IqType::Set).element().with_child(bind);

    tracing::debug!("requesting resource {:?} with id {}", resource, req_id);
    with_cancel(cancel, request.encode(transport)).await?;
    with_cancel(cancel, transport.flush()).await?;

    // IQs are not normally handled at this layer; binding is the one place
    // negotiation needs a request/response pair.
    let start = match with_cancel(cancel, transport.token()).await? {
        Token::Start(start) => start,
        other => {
            return Err(XmppError::Format(format!(
                "expected bind response, got {}",
                other.describe()
            )))
        }
    };
    if start.name != Iq::name() {
        return Err(XmppError::Format(format!(
            "expected {}, got {}",
            Iq::name(),
            start.name
        )));
    }
    let response = with_cancel(cancel, Element::decode(transport, start)).await?;

    let resp_id = response.attr("id").unwrap_or_default();
    if resp_id != req_id {
        tracing::warn!("bind response id mismatch: expected {}, got {}", req_id, resp_id);
        return Err(XmppError::Correlation {
            expected: req_id,
            actual: resp_id.to_string(),
        });
    }

    let kind = response.attr("type").unwrap_or_default();
    match kind.parse::<IqType>() {
        Ok(IqType::Result) => {
            let jid = response
                .elements()
                .find(|e| e.name == bind_name())
                .and_then(|b| b.child(ns::BIND, "jid"))
                .ok_or_else(|| XmppError::Format("bind result carries no jid".to_string()))?;
            let bound: Jid = jid
                .text()
                .trim()
                .parse()
                .map_err(|e| XmppError::Format(format!("bound jid is invalid: {}", e)))?;
            tracing::debug!("resource bound to {}", bound);
            Ok(bound)
        }
        Ok(IqType::Error) => {
            let detail = response
                .child(ns::CLIENT, "error")
                .map(StanzaError::from_element)
                .unwrap_or_else(|| StanzaError::new(ErrorType::Cancel, Condition::UndefinedCondition));
            tracing::warn!("resource binding refused: {}", detail);
            Err(XmppError::Remote(detail))
        }
        _ => Err(XmppError::UnexpectedResponse(kind.to_string())),
    }
}

/// Receiving side of resource binding.
///
/// Picks the final address for the peer and writes the response: an IQ
/// `result` echoing the request id, or the bare `<bind/>` payload when the
/// request arrived without its envelope. Nothing is written when assignment
/// fails.
pub async fn bind_as_server<T>(
    transport: &mut T,
    cancel: &CancellationToken,
    ids: &dyn IdSource,
    assign: Option<&AssignFn>,
    remote: Option<&Jid>,
    request: &BindRequest,
) -> XmppResult<Jid>
where
    T: Transport + ?Sized,
{
    let remote = remote
        .ok_or_else(|| XmppError::Assignment("peer address is unknown".to_string()))?;

    let bound = match assign {
        Some(assign) => assign(remote, &request.resource).map_err(|e| match e {
            XmppError::Assignment(_) => e,
            other => XmppError::Assignment(other.to_string()),
        })?,
        None => {
            let resource = if request.resource.is_empty() {
                ids.random_id()
            } else {
                request.resource.clone()
            };
            remote
                .with_resource(&resource)
                .map_err(|e| XmppError::Assignment(e.to_string()))?
        }
    };
    tracing::debug!("assigned {}", bound);

    let payload = Element::new(bind_name())
        .with_child(Element::new(jid_name()).with_text(bound.to_string()));
    let response = match request.id {
        Some(ref id) => Iq::new(id.clone(), IqType::Result)
            .element()
            .with_child(payload),
        None => payload,
    };

    with_cancel(cancel, response.encode(transport)).await?;
    with_cancel(cancel, transport.flush()).await?;
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use xmpp_core::{MemoryTransport, SeededIds};

    fn peer() -> Jid {
        "user@example.com/orig".parse().unwrap()
    }

    fn start_of(element: &Element) -> StartElement {
        match element.tokens().into_iter().next() {
            Some(Token::Start(start)) => start,
            _ => unreachable!("tokens always open with a start element"),
        }
    }

    /// Decode everything a transport flushed as a single element.
    async fn written_element(transport: &mut MemoryTransport) -> Element {
        let mut tokens = transport.take_written();
        assert!(!tokens.is_empty(), "nothing was flushed");
        let Token::Start(start) = tokens.remove(0) else {
            panic!("output must open with a start element");
        };
        let mut replay = MemoryTransport::with_input(tokens);
        Element::decode(&mut replay, start).await.unwrap()
    }

    fn result_for(id: &str, jid: &str) -> Vec<Token> {
        Iq::new(id, IqType::Result)
            .element()
            .with_child(Element::new(bind_name()).with_child(Element::new(jid_name()).with_text(jid)))
            .tokens()
    }

    #[test]
    fn binding_requires_authn_and_not_ready() {
        let bind = BindResource::new();
        assert!(bind.applicable(SessionState::AUTHN));
        assert!(bind.applicable(SessionState::AUTHN | SessionState::SECURE | SessionState::RECEIVED));
        assert!(!bind.applicable(SessionState::SECURE));
        assert!(!bind.applicable(SessionState::AUTHN | SessionState::READY));
    }

    #[tokio::test]
    async fn advertise_writes_empty_bind_and_is_mandatory() {
        let bind = BindResource::new();
        let mut transport = MemoryTransport::new();
        let start = StartElement::new(bind.name());

        let mandatory = bind.advertise(&mut transport, &start).await.unwrap();
        assert!(mandatory);
        assert_eq!(
            transport.written(),
            &[Token::Start(start.clone()), Token::End(bind_name())]
        );
        assert!(transport.pending().is_empty());
    }

    #[tokio::test]
    async fn parse_iq_request() {
        let request = Iq::new("abc", IqType::Set).element().with_child(
            Element::new(bind_name()).with_child(Element::new(resource_name()).with_text(" home ")),
        );
        let mut tokens = request.tokens();
        tokens.remove(0);
        let mut transport = MemoryTransport::with_input(tokens);

        let data = BindResource::new()
            .parse(&mut transport, start_of(&request))
            .await
            .unwrap();
        assert_eq!(
            data,
            FeatureData::Bind(BindRequest {
                id: Some("abc".to_string()),
                resource: "home".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn parse_bare_bind_without_resource() {
        let request = Element::new(bind_name());
        let mut transport = MemoryTransport::with_input(vec![Token::End(bind_name())]);
        let data = BindResource::new()
            .parse(&mut transport, start_of(&request))
            .await
            .unwrap();
        assert_eq!(data, FeatureData::Bind(BindRequest::default()));
    }

    #[tokio::test]
    async fn parse_rejects_foreign_element() {
        let start = StartElement::new(Name::new(ns::BIND, "unbind"));
        let mut transport = MemoryTransport::new();
        let err = BindResource::new()
            .parse(&mut transport, start)
            .await
            .unwrap_err();
        assert!(matches!(err, XmppError::Format(_)));
    }

    #[test]
    fn parse_rejects_bad_envelopes() {
        let bind = Element::new(bind_name());

        let get = Iq::new("a", IqType::Get).element().with_child(bind.clone());
        assert!(matches!(parse_bind_request(&get), Err(XmppError::Format(_))));

        let no_id = Iq::new("", IqType::Set).element().with_child(bind);
        assert!(matches!(parse_bind_request(&no_id), Err(XmppError::Format(_))));

        let empty = Iq::new("a", IqType::Set).element();
        assert!(matches!(parse_bind_request(&empty), Err(XmppError::Format(_))));
    }

    #[tokio::test]
    async fn server_keeps_requested_resource() {
        let mut transport = MemoryTransport::new();
        let request = BindRequest {
            id: Some("req1".to_string()),
            resource: "home".to_string(),
        };
        let bound = bind_as_server(
            &mut transport,
            &CancellationToken::new(),
            &OsRngIds,
            None,
            Some(&peer()),
            &request,
        )
        .await
        .unwrap();
        assert_eq!(bound.to_string(), "user@example.com/home");

        let response = written_element(&mut transport).await;
        assert_eq!(response.name, Iq::name());
        assert_eq!(response.attr("id"), Some("req1"));
        assert_eq!(response.attr("type"), Some("result"));
        let jid = response
            .child(ns::BIND, "bind")
            .and_then(|b| b.child(ns::BIND, "jid"))
            .unwrap();
        assert_eq!(jid.text(), "user@example.com/home");
    }

    #[tokio::test]
    async fn server_generates_unique_resources() {
        let previous = "user@example.com/orig".to_string();
        let mut seen = HashSet::new();
        let cancel = CancellationToken::new();

        for _ in 0..10_000 {
            let mut transport = MemoryTransport::new();
            let bound = bind_as_server(
                &mut transport,
                &cancel,
                &OsRngIds,
                None,
                Some(&peer()),
                &BindRequest::default(),
            )
            .await
            .unwrap();
            let resource = bound.resourcepart().unwrap().to_string();
            assert!(!resource.is_empty());
            assert_ne!(bound.to_string(), previous);
            assert!(seen.insert(resource), "resourcepart repeated");
        }
    }

    #[tokio::test]
    async fn server_bare_payload_without_envelope() {
        let mut transport = MemoryTransport::new();
        let ids = SeededIds::new(1);
        let expected = SeededIds::new(1).random_id();

        let bound = bind_as_server(
            &mut transport,
            &CancellationToken::new(),
            &ids,
            None,
            Some(&peer()),
            &BindRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(bound.resourcepart(), Some(expected.as_str()));

        let response = written_element(&mut transport).await;
        assert_eq!(response.name, bind_name());
        assert_eq!(response.child(ns::BIND, "jid").unwrap().text(), bound.to_string());
    }

    #[tokio::test]
    async fn server_uses_custom_assignment() {
        let assign = |peer: &Jid, requested: &str| -> XmppResult<Jid> {
            Ok(peer.with_resource(&format!("custom-{}", requested))?)
        };
        let mut transport = MemoryTransport::new();
        let request = BindRequest {
            id: Some("x".to_string()),
            resource: "phone".to_string(),
        };
        let bound = bind_as_server(
            &mut transport,
            &CancellationToken::new(),
            &OsRngIds,
            Some(&assign),
            Some(&peer()),
            &request,
        )
        .await
        .unwrap();
        assert_eq!(bound.to_string(), "user@example.com/custom-phone");
    }

    #[tokio::test]
    async fn failed_assignment_writes_nothing() {
        let assign = |_: &Jid, _: &str| -> XmppResult<Jid> {
            Err(XmppError::Remote(StanzaError::new(ErrorType::Cancel, Condition::Conflict)))
        };
        let mut transport = MemoryTransport::new();
        let err = bind_as_server(
            &mut transport,
            &CancellationToken::new(),
            &OsRngIds,
            Some(&assign),
            Some(&peer()),
            &BindRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, XmppError::Assignment(_)));
        assert!(transport.written().is_empty());
        assert!(transport.pending().is_empty());

        let err = bind_as_server(
            &mut transport,
            &CancellationToken::new(),
            &OsRngIds,
            None,
            None,
            &BindRequest::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, XmppError::Assignment(_)));
        assert!(transport.written().is_empty());
    }

    #[tokio::test]
    async fn client_sends_set_request() {
        let ids = SeededIds::new(3);
        let id = SeededIds::new(3).random_id();
        let mut transport = MemoryTransport::with_input(result_for(&id, "user@example.com/desk"));

        let bound = bind_as_client(&mut transport, &CancellationToken::new(), &ids, "desk")
            .await
            .unwrap();
        assert_eq!(bound.to_string(), "user@example.com/desk");

        let request = written_element(&mut transport).await;
        assert_eq!(request.attr("type"), Some("set"));
        assert_eq!(request.attr("id"), Some(id.as_str()));
        let resource = request
            .child(ns::BIND, "bind")
            .and_then(|b| b.child(ns::BIND, "resource"))
            .unwrap();
        assert_eq!(resource.text(), "desk");
    }

    #[tokio::test]
    async fn client_omits_empty_resource() {
        let ids = SeededIds::new(4);
        let id = SeededIds::new(4).random_id();
        let mut transport = MemoryTransport::with_input(result_for(&id, "user@example.com/r"));

        bind_as_client(&mut transport, &CancellationToken::new(), &ids, "")
            .await
            .unwrap();
        let request = written_element(&mut transport).await;
        let bind = request.child(ns::BIND, "bind").unwrap();
        assert!(bind.child(ns::BIND, "resource").is_none());
    }

    #[tokio::test]
    async fn client_rejects_mismatched_id() {
        let mut transport =
            MemoryTransport::with_input(result_for("not-the-request", "user@example.com/r"));
        let err = bind_as_client(&mut transport, &CancellationToken::new(), &OsRngIds, "")
            .await
            .unwrap_err();
        match err {
            XmppError::Correlation { actual, .. } => assert_eq!(actual, "not-the-request"),
            other => panic!("expected correlation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_rejects_character_data_first() {
        let mut transport = MemoryTransport::with_input(vec![Token::Text("hi".to_string())]);
        let err = bind_as_client(&mut transport, &CancellationToken::new(), &OsRngIds, "")
            .await
            .unwrap_err();
        assert!(matches!(err, XmppError::Format(_)));
    }

    #[tokio::test]
    async fn client_rejects_non_iq_response() {
        let message = Element::new(Name::new(ns::CLIENT, "message"));
        let mut transport = MemoryTransport::with_input(message.tokens());
        let err = bind_as_client(&mut transport, &CancellationToken::new(), &OsRngIds, "")
            .await
            .unwrap_err();
        assert!(matches!(err, XmppError::Format(_)));
    }

    #[tokio::test]
    async fn client_surfaces_remote_error() {
        let ids = SeededIds::new(5);
        let id = SeededIds::new(5).random_id();
        let refusal = StanzaError::new(ErrorType::Cancel, Condition::NotAllowed);
        let response = Iq::new(id, IqType::Error)
            .element()
            .with_child(refusal.to_element());
        let mut transport = MemoryTransport::with_input(response.tokens());

        let err = bind_as_client(&mut transport, &CancellationToken::new(), &ids, "")
            .await
            .unwrap_err();
        match err {
            XmppError::Remote(detail) => assert_eq!(detail, refusal),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn client_keeps_nonstandard_error_detail() {
        let ids = SeededIds::new(9);
        let id = SeededIds::new(9).random_id();
        let error = Element::new(Name::new(ns::CLIENT, "error"))
            .with_attr("type", "wait")
            .with_attr("by", "example.com")
            .with_child(Element::new(Name::new(ns::STANZAS, "resource-limit-exceeded")))
            .with_child(Element::new(Name::new("urn:example:quota", "sessions")).with_text("5"));
        let response = Iq::new(id, IqType::Error).element().with_child(error.clone());
        let mut transport = MemoryTransport::with_input(response.tokens());

        let err = bind_as_client(&mut transport, &CancellationToken::new(), &ids, "")
            .await
            .unwrap_err();
        let detail = match err {
            XmppError::Remote(detail) => detail,
            other => panic!("expected remote error, got {:?}", other),
        };
        assert_eq!(detail.kind, Some(ErrorType::Wait));
        assert_eq!(detail.condition.as_str(), "resource-limit-exceeded");
        assert_eq!(detail.by.as_deref(), Some("example.com"));
        assert_eq!(detail.extra.len(), 1);
        assert_eq!(detail.to_element(), error);
    }

    #[tokio::test]
    async fn client_rejects_other_response_types() {
        let ids = SeededIds::new(6);
        let id = SeededIds::new(6).random_id();
        let response = Iq::new(id, IqType::Get).element();
        let mut transport = MemoryTransport::with_input(response.tokens());

        let err = bind_as_client(&mut transport, &CancellationToken::new(), &ids, "")
            .await
            .unwrap_err();
        assert!(matches!(err, XmppError::UnexpectedResponse(ref kind) if kind == "get"));
    }

    #[tokio::test]
    async fn client_rejects_result_without_jid() {
        let ids = SeededIds::new(8);
        let id = SeededIds::new(8).random_id();
        let response = Iq::new(id, IqType::Result).element();
        let mut transport = MemoryTransport::with_input(response.tokens());

        let err = bind_as_client(&mut transport, &CancellationToken::new(), &ids, "")
            .await
            .unwrap_err();
        assert!(matches!(err, XmppError::Format(_)));
    }
}
