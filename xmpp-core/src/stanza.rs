//! IQ envelope header and stanza error payload.
//!
//! Only what stream negotiation needs: the request/response envelope and
//! the `<error/>` child defined in RFC 6120 §8.3.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::XmppError;
use crate::ns;
use crate::token::{Element, Name};

/// IQ stanza type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Result => "result",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for IqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IqType {
    type Err = XmppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "result" => Ok(Self::Result),
            "error" => Ok(Self::Error),
            other => Err(XmppError::Format(format!("unknown iq type {:?}", other))),
        }
    }
}

/// IQ envelope header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iq {
    pub id: String,
    pub kind: IqType,
}

impl Iq {
    pub fn new(id: impl Into<String>, kind: IqType) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Element name of an IQ in the client namespace.
    pub fn name() -> Name {
        Name::new(ns::CLIENT, "iq")
    }

    /// Empty envelope element, ready for a payload child.
    pub fn element(&self) -> Element {
        Element::new(Self::name())
            .with_attr("id", self.id.clone())
            .with_attr("type", self.kind.as_str())
    }
}

/// Error type attribute (RFC 6120 §8.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// Retry after providing credentials.
    Auth,
    /// Do not retry.
    Cancel,
    /// Proceed; the condition was only a warning.
    Continue,
    /// Retry after changing the data sent.
    Modify,
    /// Retry after waiting.
    Wait,
    /// A value outside RFC 6120, kept as sent.
    Other(String),
}

impl ErrorType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auth => "auth",
            Self::Cancel => "cancel",
            Self::Continue => "continue",
            Self::Modify => "modify",
            Self::Wait => "wait",
            Self::Other(s) => s.as_str(),
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "auth" => Self::Auth,
            "cancel" => Self::Cancel,
            "continue" => Self::Continue,
            "modify" => Self::Modify,
            "wait" => Self::Wait,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Stanza error conditions (RFC 6120 §8.3.3).
///
/// Serialized as the condition's element local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Condition {
    BadRequest,
    Conflict,
    FeatureNotImplemented,
    Forbidden,
    Gone,
    InternalServerError,
    ItemNotFound,
    JidMalformed,
    NotAcceptable,
    NotAllowed,
    NotAuthorized,
    PolicyViolation,
    RecipientUnavailable,
    Redirect,
    RegistrationRequired,
    RemoteServerNotFound,
    RemoteServerTimeout,
    ResourceConstraint,
    ServiceUnavailable,
    SubscriptionRequired,
    UndefinedCondition,
    UnexpectedRequest,
    /// A condition element outside the defined set, kept by local name.
    Other(String),
}

impl Condition {
    const ALL: [Condition; 22] = [
        Self::BadRequest,
        Self::Conflict,
        Self::FeatureNotImplemented,
        Self::Forbidden,
        Self::Gone,
        Self::InternalServerError,
        Self::ItemNotFound,
        Self::JidMalformed,
        Self::NotAcceptable,
        Self::NotAllowed,
        Self::NotAuthorized,
        Self::PolicyViolation,
        Self::RecipientUnavailable,
        Self::Redirect,
        Self::RegistrationRequired,
        Self::RemoteServerNotFound,
        Self::RemoteServerTimeout,
        Self::ResourceConstraint,
        Self::ServiceUnavailable,
        Self::SubscriptionRequired,
        Self::UndefinedCondition,
        Self::UnexpectedRequest,
    ];

    /// Element local name of this condition.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadRequest => "bad-request",
            Self::Conflict => "conflict",
            Self::FeatureNotImplemented => "feature-not-implemented",
            Self::Forbidden => "forbidden",
            Self::Gone => "gone",
            Self::InternalServerError => "internal-server-error",
            Self::ItemNotFound => "item-not-found",
            Self::JidMalformed => "jid-malformed",
            Self::NotAcceptable => "not-acceptable",
            Self::NotAllowed => "not-allowed",
            Self::NotAuthorized => "not-authorized",
            Self::PolicyViolation => "policy-violation",
            Self::RecipientUnavailable => "recipient-unavailable",
            Self::Redirect => "redirect",
            Self::RegistrationRequired => "registration-required",
            Self::RemoteServerNotFound => "remote-server-not-found",
            Self::RemoteServerTimeout => "remote-server-timeout",
            Self::ResourceConstraint => "resource-constraint",
            Self::ServiceUnavailable => "service-unavailable",
            Self::SubscriptionRequired => "subscription-required",
            Self::UndefinedCondition => "undefined-condition",
            Self::UnexpectedRequest => "unexpected-request",
            Self::Other(local) => local.as_str(),
        }
    }

    /// Map an element local name to a condition.
    pub fn from_local(local: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == local)
            .unwrap_or_else(|| Self::Other(local.to_string()))
    }
}

impl From<String> for Condition {
    fn from(local: String) -> Self {
        Self::from_local(&local)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.as_str().to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error carried by an error-type stanza.
///
/// Decoding keeps what the peer sent: `kind` is `None` when the `type`
/// attribute is absent, and application-specific children are carried in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaError {
    pub kind: Option<ErrorType>,
    pub condition: Condition,
    pub text: Option<String>,
    /// Entity that generated the error.
    pub by: Option<String>,
    pub extra: Vec<Element>,
}

impl StanzaError {
    pub fn new(kind: ErrorType, condition: Condition) -> Self {
        Self {
            kind: Some(kind),
            condition,
            text: None,
            by: None,
            extra: Vec::new(),
        }
    }

    /// Attach human-readable text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_by(mut self, by: impl Into<String>) -> Self {
        self.by = Some(by.into());
        self
    }

    /// Attach an application-specific condition element.
    pub fn with_extra(mut self, element: Element) -> Self {
        self.extra.push(element);
        self
    }

    /// Decode an `<error/>` element.
    ///
    /// A missing condition element reads as `undefined-condition`.
    pub fn from_element(element: &Element) -> Self {
        let mut condition = None;
        let mut text = None;
        let mut extra = Vec::new();
        for child in element.elements() {
            if child.name.space != ns::STANZAS {
                extra.push(child.clone());
            } else if child.name.local == "text" {
                text = Some(child.text());
            } else if condition.is_none() {
                condition = Some(Condition::from_local(&child.name.local));
            }
        }

        Self {
            kind: element.attr("type").map(ErrorType::parse),
            condition: condition.unwrap_or(Condition::UndefinedCondition),
            text,
            by: element.attr("by").map(str::to_string),
            extra,
        }
    }

    /// Encode as an `<error/>` element.
    pub fn to_element(&self) -> Element {
        let mut error = Element::new(Name::new(ns::CLIENT, "error"));
        if let Some(ref kind) = self.kind {
            error = error.with_attr("type", kind.as_str());
        }
        if let Some(ref by) = self.by {
            error = error.with_attr("by", by.clone());
        }
        error = error.with_child(Element::new(Name::new(ns::STANZAS, self.condition.as_str())));
        if let Some(ref text) = self.text {
            error = error.with_child(Element::new(Name::new(ns::STANZAS, "text")).with_text(text.clone()));
        }
        for child in &self.extra {
            error = error.with_child(child.clone());
        }
        error
    }
}

impl fmt::Display for StanzaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text {
            Some(ref text) => write!(f, "{}: {}", self.condition, text),
            None => write!(f, "{}", self.condition),
        }
    }
}

impl std::error::Error for StanzaError {}
