use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, printable identity of a credential. Safe to log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reusable signing identity.
///
/// Deliberately not `Clone`: a credential lives either in the pool's idle set
/// or inside exactly one [`CredentialLease`](super::CredentialLease).
pub struct Credential {
    id: CredentialId,
    signing_key: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            id: CredentialId::new(id),
            signing_key: signing_key.into(),
        }
    }

    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    /// Raw signing material handed to the ledger client.
    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_signing_key() {
        let cred = Credential::new("admin-1", "0xdeadbeef");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("admin-1"));
        assert!(!rendered.contains("deadbeef"));
    }

    #[test]
    fn credential_id_display() {
        let id = CredentialId::new("admin-2");
        assert_eq!(id.to_string(), "admin-2");
        assert_eq!(id.as_str(), "admin-2");
    }
}
