//! Framed structured-token transport for XMPP stream negotiation.
//!
//! # Example
//!
//! ```no_run
//! use xmpp_core::{Name, StartElement, Token, TokenWriter};
//! use xmpp_stream::FramedTokens;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let socket = tokio::net::TcpStream::connect("127.0.0.1:5222").await?;
//!     let mut tokens = FramedTokens::new(socket);
//!
//!     let start = StartElement::new(Name::new("jabber:client", "presence"));
//!     tokens.write_token(Token::Start(start.clone())).await?;
//!     tokens.write_token(start.end()).await?;
//!     tokens.flush().await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod framed;

pub use config::{StreamConfig, DEFAULT_MAX_FRAME_SIZE};
pub use framed::FramedTokens;

use tokio::io::DuplexStream;

/// Two connected in-memory transports, one per endpoint.
///
/// `buffer` is the number of bytes each direction holds before writers wait.
pub fn duplex(buffer: usize) -> (FramedTokens<DuplexStream>, FramedTokens<DuplexStream>) {
    let (a, b) = tokio::io::duplex(buffer);
    (FramedTokens::new(a), FramedTokens::new(b))
}
