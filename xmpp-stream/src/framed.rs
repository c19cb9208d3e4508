//! Length-prefixed token framing over a byte stream.
//!
//! Each token travels as one frame: a 4-byte big-endian length followed by
//! the token's JSON encoding. Written frames are buffered until
//! [`TokenWriter::flush`].

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use xmpp_core::{Token, TokenReader, TokenWriter, XmppError, XmppResult};

use crate::config::StreamConfig;

/// Token transport over any async byte stream.
pub struct FramedTokens<S> {
    stream: S,
    config: StreamConfig,
    write_buf: Vec<u8>,
}

impl<S> FramedTokens<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream with the default configuration.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, StreamConfig::default())
    }

    pub fn with_config(stream: S, config: StreamConfig) -> Self {
        Self {
            stream,
            config,
            write_buf: Vec::new(),
        }
    }

    /// Number of buffered bytes not yet flushed.
    pub fn buffered(&self) -> usize {
        self.write_buf.len()
    }
}

#[async_trait]
impl<S> TokenReader for FramedTokens<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn token(&mut self) -> XmppResult<Token> {
        // Read frame length
        let mut len_buf = [0u8; 4];
        self.stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| XmppError::Transport(format!("Read error: {}", e)))?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > self.config.max_frame_size {
            return Err(XmppError::Transport(format!(
                "Frame too large: {} > {}",
                len, self.config.max_frame_size
            )));
        }

        // Read frame body
        let mut frame = vec![0u8; len];
        self.stream
            .read_exact(&mut frame)
            .await
            .map_err(|e| XmppError::Transport(format!("Read error: {}", e)))?;

        let token: Token = serde_json::from_slice(&frame)?;
        tracing::trace!("read {}", token.describe());
        Ok(token)
    }
}

#[async_trait]
impl<S> TokenWriter for FramedTokens<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write_token(&mut self, token: Token) -> XmppResult<()> {
        let json = serde_json::to_vec(&token)?;
        if json.len() > self.config.max_frame_size {
            return Err(XmppError::Transport(format!(
                "Frame too large: {} > {}",
                json.len(),
                self.config.max_frame_size
            )));
        }

        self.write_buf
            .extend_from_slice(&(json.len() as u32).to_be_bytes());
        self.write_buf.extend_from_slice(&json);
        Ok(())
    }

    async fn flush(&mut self) -> XmppResult<()> {
        self.stream
            .write_all(&self.write_buf)
            .await
            .map_err(|e| XmppError::Transport(format!("Write error: {}", e)))?;
        self.write_buf.clear();

        self.stream
            .flush()
            .await
            .map_err(|e| XmppError::Transport(format!("Flush error: {}", e)))
    }
}
