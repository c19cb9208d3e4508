//! In-memory token transport.
//!
//! Stands in for a live connection: input tokens are queued up front and
//! everything written is captured for inspection.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{XmppError, XmppResult};
use crate::token::{Token, TokenReader, TokenWriter};

#[derive(Debug, Default)]
pub struct MemoryTransport {
    input: VecDeque<Token>,
    pending: Vec<Token>,
    written: Vec<Token>,
    flushes: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport whose reads yield `input` in order.
    pub fn with_input(input: impl IntoIterator<Item = Token>) -> Self {
        Self {
            input: input.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Tokens that have been flushed so far.
    pub fn written(&self) -> &[Token] {
        &self.written
    }

    /// Take the flushed tokens, leaving the buffer empty.
    pub fn take_written(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.written)
    }

    /// Tokens written but not yet flushed.
    pub fn pending(&self) -> &[Token] {
        &self.pending
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

#[async_trait]
impl TokenReader for MemoryTransport {
    async fn token(&mut self) -> XmppResult<Token> {
        self.input
            .pop_front()
            .ok_or_else(|| XmppError::Transport("unexpected end of stream".to_string()))
    }
}

#[async_trait]
impl TokenWriter for MemoryTransport {
    async fn write_token(&mut self, token: Token) -> XmppResult<()> {
        self.pending.push(token);
        Ok(())
    }

    async fn flush(&mut self) -> XmppResult<()> {
        self.written.append(&mut self.pending);
        self.flushes += 1;
        Ok(())
    }
}
