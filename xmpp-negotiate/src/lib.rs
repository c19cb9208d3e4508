//! XMPP stream feature negotiation.
//!
//! Features implement [`StreamFeature`]; an engine checks
//! [`StreamFeature::applicable`] against the current [`SessionState`],
//! advertises the feature, parses the peer's request and finally calls
//! [`StreamFeature::negotiate`]. [`BindResource`] is the mandatory last
//! feature and moves the session to `READY`.
//!
//! # Example
//!
//! ```no_run
//! use xmpp_core::SessionState;
//! use xmpp_negotiate::{BindResource, FeatureData, NegotiationSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let socket = tokio::net::TcpStream::connect("127.0.0.1:5222").await?;
//!     let transport = Box::new(xmpp_stream::FramedTokens::new(socket));
//!
//!     let config = SessionConfig::new("user@example.com/laptop".parse()?);
//!     let mut session = NegotiationSession::initiating(config, transport)
//!         .with_state(SessionState::SECURE | SessionState::AUTHN);
//!
//!     session.negotiate(&BindResource::new(), FeatureData::None).await?;
//!     println!("bound to {}", session.local_addr());
//!
//!     Ok(())
//! }
//! ```

pub mod bind;
mod config;
pub mod feature;
pub mod session;

pub use bind::{bind_as_client, bind_as_server, AssignFn, BindRequest, BindResource};
pub use config::SessionConfig;
pub use feature::{FeatureData, Negotiated, StreamFeature};
pub use session::{with_cancel, NegotiationSession, Session, Transport};

pub use xmpp_core::SessionState;
