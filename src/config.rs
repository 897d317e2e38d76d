use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::ledger::ContractAddresses;
use crate::metadata::DEFAULT_ASSET_BASE_URL;
use crate::pool::{Credential, DEFAULT_COOLDOWN};
use crate::queue::QueueConfig;
use crate::store::IpfsConfig;

/// Environment variable prefix for signing keys: `ADMIN_ACCOUNT_PRIVATE_KEY_1`,
/// `ADMIN_ACCOUNT_PRIVATE_KEY_2`, ...
pub const CREDENTIAL_ENV_PREFIX: &str = "ADMIN_ACCOUNT_PRIVATE_KEY_";

/// A signing key as read from configuration, before it enters the pool.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    pub id: String,
    pub signing_key: String,
}

impl CredentialSpec {
    pub fn new(id: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            signing_key: signing_key.into(),
        }
    }

    pub fn into_credential(self) -> Credential {
        Credential::new(self.id, self.signing_key)
    }
}

impl fmt::Debug for CredentialSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSpec")
            .field("id", &self.id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Load `KEY=value` lines from `path` into the process environment without
/// overriding variables that are already set. Returns whether a file was
/// loaded; a missing file is not an error.
pub fn load_env_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match dotenvy::from_path(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "Loaded environment file");
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable environment file");
            false
        }
    }
}

/// Collect signing keys from `ADMIN_ACCOUNT_PRIVATE_KEY_<n>` variables,
/// ordered by `n`. Empty values are skipped.
pub fn credentials_from_vars<I>(vars: I) -> Vec<CredentialSpec>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut found: Vec<(u32, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let index: u32 = name.strip_prefix(CREDENTIAL_ENV_PREFIX)?.parse().ok()?;
            let value = value.trim().to_string();
            if value.is_empty() {
                tracing::warn!(var = %name, "Ignoring empty signing key");
                return None;
            }
            Some((index, value))
        })
        .collect();
    found.sort_by_key(|(index, _)| *index);

    found
        .into_iter()
        .map(|(index, key)| CredentialSpec::new(format!("admin-{}", index), key))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub credentials: Vec<CredentialSpec>,
    /// Settle delay before a released credential is reused
    pub cooldown: Duration,
    pub queue: QueueConfig,
    pub ipfs: IpfsConfig,
    pub asset_base_url: String,
    pub contracts: ContractAddresses,
    /// Block time of the simulated ledger
    pub confirm_latency: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3002)),
            credentials: Vec::new(),
            cooldown: DEFAULT_COOLDOWN,
            queue: QueueConfig::default(),
            ipfs: IpfsConfig::default(),
            asset_base_url: DEFAULT_ASSET_BASE_URL.to_string(),
            contracts: ContractAddresses::default(),
            confirm_latency: Duration::from_millis(500),
        }
    }
}

impl ServiceConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, id: impl Into<String>, signing_key: impl Into<String>) -> Self {
        self.credentials.push(CredentialSpec::new(id, signing_key));
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.is_empty() {
            return Err(RelayError::Config(format!(
                "no signing credentials configured (set {}1, {}2, ...)",
                CREDENTIAL_ENV_PREFIX, CREDENTIAL_ENV_PREFIX
            )));
        }
        if let Some(limit) = self.queue.max_concurrency {
            if limit > self.credentials.len() {
                tracing::warn!(
                    limit,
                    credentials = self.credentials.len(),
                    "Concurrency limit exceeds credential count, capping at credential count"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn service_config_default() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:3002");
        assert!(cfg.credentials.is_empty());
        assert_eq!(cfg.cooldown, Duration::from_millis(1000));
        assert!(cfg.queue.max_concurrency.is_none());
        assert!(cfg.queue.operation_timeout.is_none());
    }

    #[test]
    fn service_config_builders() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let cfg = ServiceConfig::new(addr)
            .with_credential("a", "ka")
            .with_credential("b", "kb")
            .with_cooldown(Duration::ZERO);
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.credentials.len(), 2);
        assert_eq!(cfg.credentials[1].id, "b");
        assert_eq!(cfg.cooldown, Duration::ZERO);
    }

    #[test]
    fn validate_requires_credentials() {
        assert!(matches!(
            ServiceConfig::default().validate(),
            Err(RelayError::Config(_))
        ));
        assert!(ServiceConfig::default()
            .with_credential("a", "k")
            .validate()
            .is_ok());
    }

    #[test]
    fn credentials_read_in_index_order() {
        let specs = credentials_from_vars(vars(&[
            ("ADMIN_ACCOUNT_PRIVATE_KEY_2", "0xbb"),
            ("PATH", "/usr/bin"),
            ("ADMIN_ACCOUNT_PRIVATE_KEY_1", "0xaa"),
            ("ADMIN_ACCOUNT_PRIVATE_KEY_10", "0xcc"),
        ]));
        let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["admin-1", "admin-2", "admin-10"]);
        assert_eq!(specs[0].signing_key, "0xaa");
    }

    #[test]
    fn credentials_skip_empty_and_malformed() {
        let specs = credentials_from_vars(vars(&[
            ("ADMIN_ACCOUNT_PRIVATE_KEY_1", "  "),
            ("ADMIN_ACCOUNT_PRIVATE_KEY_X", "0xaa"),
            ("ADMIN_ACCOUNT_PRIVATE_KEY_3", "0xdd"),
        ]));
        assert_eq!(specs, vec![CredentialSpec::new("admin-3", "0xdd")]);
    }

    #[test]
    fn env_file_supplies_credentials() {
        let path = std::env::temp_dir().join(format!("relayer-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, "ADMIN_ACCOUNT_PRIVATE_KEY_917=0xfeed\n").unwrap();

        assert!(load_env_file(&path));
        let specs = credentials_from_vars(std::env::vars());
        assert!(specs.contains(&CredentialSpec::new("admin-917", "0xfeed")));

        std::fs::remove_file(&path).unwrap();
        assert!(!load_env_file(&path));
    }

    #[test]
    fn credential_spec_debug_redacts_key() {
        let spec = CredentialSpec::new("admin-1", "supersecret");
        assert!(!format!("{:?}", spec).contains("supersecret"));
    }
}
