//! Registry configuration.

use serde::{Deserialize, Serialize};

use didhub_core::{Did, METHOD_ADDRESS, RELAY_ROOT};
use didhub_sync::SyncConfig;

use crate::error::Result;

/// Broker that accepts outbound batches when none is configured.
pub const DEFAULT_RELAY_BROKER: &str = "inter-relay-broker";

/// Configuration for a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Parent recorded at Init.
    pub default_parent: Did,
    /// Contract address placed in outbound payloads; the kind's own address
    /// when unset.
    pub contract_address: Option<String>,
    /// Broker contract receiving outbound batches.
    pub relay_broker: String,
    /// Document address of the genesis record.
    pub genesis_doc_address: String,
    /// Consult the signature hook on signed operations.
    pub verify_signatures: bool,
    /// Outbound synchronization settings.
    pub sync: SyncConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_parent: Did::new(RELAY_ROOT),
            contract_address: None,
            relay_broker: DEFAULT_RELAY_BROKER.to_string(),
            genesis_doc_address: METHOD_ADDRESS.to_string(),
            verify_signatures: false,
            sync: SyncConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Contract address, falling back to `default`.
    pub fn contract_address_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.contract_address.as_deref().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.default_parent, Did::relay_root());
        assert_eq!(config.genesis_doc_address, ".");
        assert!(!config.verify_signatures);
        assert_eq!(config.contract_address_or("method-registry"), "method-registry");
    }

    #[test]
    fn test_from_json() {
        let config = RegistryConfig::from_json(
            r#"{
                "default_parent": "did:bitxhub:root2:.",
                "contract_address": "0x0001",
                "verify_signatures": true,
                "sync": { "max_children": 4 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.default_parent, Did::new("did:bitxhub:root2:."));
        assert_eq!(config.contract_address_or("ignored"), "0x0001");
        assert!(config.verify_signatures);
        assert_eq!(config.sync.max_children, 4);
        assert_eq!(config.relay_broker, DEFAULT_RELAY_BROKER);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(RegistryConfig::from_json("{ not json").is_err());
    }
}
