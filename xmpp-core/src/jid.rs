//! Minimal XMPP address (JID) type.
//!
//! Only structural validation is performed: part lengths, forbidden
//! separators and a non-empty domainpart. No PRECIS normalization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length in bytes of any single JID part.
pub const MAX_PART_LEN: usize = 1023;

/// Characters never allowed in a localpart.
const LOCALPART_FORBIDDEN: &[char] = &['"', '&', '\'', '/', ':', '<', '>', '@'];

/// JID validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JidError {
    #[error("domainpart must not be empty")]
    EmptyDomainpart,

    #[error("localpart must not be empty when present")]
    EmptyLocalpart,

    #[error("resourcepart must not be empty when present")]
    EmptyResourcepart,

    #[error("{part} exceeds {max} bytes", max = MAX_PART_LEN)]
    TooLong { part: &'static str },

    #[error("{part} contains forbidden character {ch:?}")]
    ForbiddenChar { part: &'static str, ch: char },
}

/// An XMPP address: `[localpart@]domainpart[/resourcepart]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    localpart: Option<String>,
    domainpart: String,
    resourcepart: Option<String>,
}

impl Jid {
    /// Build a JID from its parts, validating each one.
    ///
    /// Empty localpart or resourcepart strings mean "absent".
    pub fn new(localpart: &str, domainpart: &str, resourcepart: &str) -> Result<Self, JidError> {
        let localpart = (!localpart.is_empty()).then(|| localpart.to_string());
        let resourcepart = (!resourcepart.is_empty()).then(|| resourcepart.to_string());
        let jid = Self {
            localpart,
            domainpart: domainpart.to_string(),
            resourcepart,
        };
        jid.validate()?;
        Ok(jid)
    }

    pub fn localpart(&self) -> Option<&str> {
        self.localpart.as_deref()
    }

    pub fn domainpart(&self) -> &str {
        &self.domainpart
    }

    pub fn resourcepart(&self) -> Option<&str> {
        self.resourcepart.as_deref()
    }

    /// Copy this JID, replacing only the resourcepart.
    pub fn with_resource(&self, resourcepart: &str) -> Result<Self, JidError> {
        if resourcepart.is_empty() {
            return Err(JidError::EmptyResourcepart);
        }
        check_resourcepart(resourcepart)?;
        Ok(Self {
            localpart: self.localpart.clone(),
            domainpart: self.domainpart.clone(),
            resourcepart: Some(resourcepart.to_string()),
        })
    }

    /// Copy this JID without its resourcepart.
    pub fn bare(&self) -> Self {
        Self {
            localpart: self.localpart.clone(),
            domainpart: self.domainpart.clone(),
            resourcepart: None,
        }
    }

    /// Check whether a resourcepart is present.
    pub fn is_full(&self) -> bool {
        self.resourcepart.is_some()
    }

    fn validate(&self) -> Result<(), JidError> {
        if let Some(ref local) = self.localpart {
            if local.len() > MAX_PART_LEN {
                return Err(JidError::TooLong { part: "localpart" });
            }
            if let Some(ch) = local
                .chars()
                .find(|c| LOCALPART_FORBIDDEN.contains(c) || c.is_whitespace())
            {
                return Err(JidError::ForbiddenChar { part: "localpart", ch });
            }
        }

        if self.domainpart.is_empty() {
            return Err(JidError::EmptyDomainpart);
        }
        if self.domainpart.len() > MAX_PART_LEN {
            return Err(JidError::TooLong { part: "domainpart" });
        }
        if let Some(ch) = self
            .domainpart
            .chars()
            .find(|c| *c == '@' || *c == '/' || c.is_whitespace())
        {
            return Err(JidError::ForbiddenChar { part: "domainpart", ch });
        }

        if let Some(ref resource) = self.resourcepart {
            check_resourcepart(resource)?;
        }
        Ok(())
    }
}

fn check_resourcepart(resource: &str) -> Result<(), JidError> {
    if resource.len() > MAX_PART_LEN {
        return Err(JidError::TooLong { part: "resourcepart" });
    }
    if let Some(ch) = resource.chars().find(|c| c.is_control()) {
        return Err(JidError::ForbiddenChar { part: "resourcepart", ch });
    }
    Ok(())
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The resourcepart may itself contain '@' and '/', so split it off first.
        let (rest, resource) = match s.split_once('/') {
            Some((rest, resource)) => {
                if resource.is_empty() {
                    return Err(JidError::EmptyResourcepart);
                }
                (rest, resource)
            }
            None => (s, ""),
        };
        let (local, domain) = match rest.split_once('@') {
            Some((local, domain)) => {
                if local.is_empty() {
                    return Err(JidError::EmptyLocalpart);
                }
                (local, domain)
            }
            None => ("", rest),
        };
        Self::new(local, domain, resource)
    }
}

impl TryFrom<String> for Jid {
    type Error = JidError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref local) = self.localpart {
            write!(f, "{}@", local)?;
        }
        f.write_str(&self.domainpart)?;
        if let Some(ref resource) = self.resourcepart {
            write!(f, "/{}", resource)?;
        }
        Ok(())
    }
}
