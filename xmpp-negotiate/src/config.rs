//! Session configuration.

use xmpp_core::Jid;

/// Per-session negotiation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Our own address. On the initiating side its resourcepart, if any, is
    /// the resource requested during binding.
    pub origin: Jid,
}

impl SessionConfig {
    pub fn new(origin: Jid) -> Self {
        Self { origin }
    }

    /// Replace the origin address.
    pub fn with_origin(mut self, origin: Jid) -> Self {
        self.origin = origin;
        self
    }

    /// Resource to request when binding; empty lets the peer choose.
    pub fn requested_resource(&self) -> &str {
        self.origin.resourcepart().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_resource_from_origin() {
        let config = SessionConfig::new("user@example.com/home".parse().unwrap());
        assert_eq!(config.requested_resource(), "home");

        let config = config.with_origin("user@example.com".parse().unwrap());
        assert_eq!(config.requested_resource(), "");
    }
}
