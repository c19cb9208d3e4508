//! Structured token model.
//!
//! A stream is a sequence of start-element, end-element and character-data
//! tokens with namespaces already resolved. [`TokenReader`] and
//! [`TokenWriter`] are the seams a transport plugs into; [`Element`] is a
//! fully decoded subtree.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{XmppError, XmppResult};

/// Maximum element nesting accepted by [`Element::decode`].
pub const MAX_DEPTH: usize = 32;

/// Namespace-qualified element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Name {
    pub space: String,
    pub local: String,
}

impl Name {
    pub fn new(space: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            space: space.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.space.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.space, self.local)
        }
    }
}

/// Unqualified attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

/// Start-of-element token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartElement {
    pub name: Name,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<Attr>,
}

impl StartElement {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            attrs: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attr {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Look up an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// The matching end token.
    pub fn end(&self) -> Token {
        Token::End(self.name.clone())
    }
}

/// A single stream token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Token {
    Start(StartElement),
    End(Name),
    Text(String),
}

impl Token {
    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Start(start) => format!("start of {}", start.name),
            Self::End(name) => format!("end of {}", name),
            Self::Text(_) => "character data".to_string(),
        }
    }
}

/// Source of input tokens.
#[async_trait]
pub trait TokenReader: Send {
    /// Read the next token, waiting for the peer if necessary.
    async fn token(&mut self) -> XmppResult<Token>;
}

/// Sink for output tokens.
#[async_trait]
pub trait TokenWriter: Send {
    /// Queue a token for output.
    async fn write_token(&mut self, token: Token) -> XmppResult<()>;

    /// Push all queued tokens to the peer.
    async fn flush(&mut self) -> XmppResult<()>;
}

/// Child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A decoded element subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: Name,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push(Attr {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Append character data.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// First child element with the given local name whose namespace is
    /// `space` or empty (inherited).
    pub fn child(&self, space: &str, local: &str) -> Option<&Element> {
        self.elements()
            .find(|e| e.name.local == local && (e.name.space == space || e.name.space.is_empty()))
    }

    /// Iterate over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Concatenated character data of direct children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Read tokens up to and including the end of the element opened by
    /// `start`.
    pub async fn decode<R>(reader: &mut R, start: StartElement) -> XmppResult<Element>
    where
        R: TokenReader + ?Sized,
    {
        let mut stack = vec![Self::from_start(start)];
        loop {
            match reader.token().await? {
                Token::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmppError::Format(format!(
                            "element nesting exceeds {}",
                            MAX_DEPTH
                        )));
                    }
                    stack.push(Self::from_start(start));
                }
                Token::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.children.push(Node::Text(text));
                    }
                }
                Token::End(name) => {
                    let Some(done) = stack.pop() else {
                        return Err(XmppError::Format(format!("unexpected end of {}", name)));
                    };
                    if done.name != name {
                        return Err(XmppError::Format(format!(
                            "end of {} does not close {}",
                            name, done.name
                        )));
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(done)),
                        None => return Ok(done),
                    }
                }
            }
        }
    }

    /// Write this element as tokens. Does not flush.
    pub async fn encode<W>(&self, writer: &mut W) -> XmppResult<()>
    where
        W: TokenWriter + ?Sized,
    {
        for token in self.tokens() {
            writer.write_token(token).await?;
        }
        Ok(())
    }

    /// Flatten into the token sequence that [`Element::decode`] reads back.
    pub fn tokens(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.push_tokens(&mut out);
        out
    }

    fn push_tokens(&self, out: &mut Vec<Token>) {
        out.push(Token::Start(StartElement {
            name: self.name.clone(),
            attrs: self.attrs.clone(),
        }));
        for child in &self.children {
            match child {
                Node::Element(e) => e.push_tokens(out),
                Node::Text(t) => out.push(Token::Text(t.clone())),
            }
        }
        out.push(Token::End(self.name.clone()));
    }

    fn from_start(start: StartElement) -> Self {
        Self {
            name: start.name,
            attrs: start.attrs,
            children: Vec::new(),
        }
    }
}
