//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use didhub::{
    AccountKind, ChainKind, IdentifierKind, MethodKind, Registry, RegistryConfig, RegistryError,
    Result,
};
use didhub_core::{Blake3Hash, Did, DocAnchor, IdentifierRecord, Keypair};
use didhub_governance::{operation_message, Caller};
use didhub_store::MemoryStore;
use didhub_sync::MemoryRelay;

/// Registry type every fixture hands out.
pub type TestRegistry<K> = Registry<K, MemoryStore, Arc<MemoryRelay>>;

/// An identity with a deterministic signing key.
#[derive(Debug)]
pub struct Identity {
    pub caller: Caller,
    pub keypair: Keypair,
}

impl Identity {
    /// The identity `did:<root>:<sub>:<address>` under `method`.
    ///
    /// The key is seeded from the identifier, so the same identifier always
    /// gets the same key.
    pub fn new(method: &Did, address: &str) -> Self {
        let did = Did::account_of(method, address)
            .unwrap_or_else(|| Did::new(format!("{method}:{address}")));
        let seed = Blake3Hash::hash(did.as_str().as_bytes());
        Self {
            caller: Caller::from_did(did),
            keypair: Keypair::from_seed(seed.as_bytes()),
        }
    }

    pub fn did(&self) -> &Did {
        &self.caller.did
    }

    /// The caller with a signature over the operation message attached.
    pub fn signed(&self, registry: &str, function: &str, args: &[&str]) -> Caller {
        let message = operation_message(registry, function, &self.caller.did, args);
        self.caller
            .clone()
            .with_signature(self.keypair.sign(&message))
    }
}

/// `count` distinct identities under `method`.
pub fn identities(method: &Did, count: usize) -> Vec<Identity> {
    (0..count)
        .map(|i| Identity::new(method, &format!("0xuser{i}")))
        .collect()
}

/// An anchor whose hash is derived from the address.
pub fn anchor(address: &str) -> DocAnchor {
    DocAnchor::placeholder(address)
}

/// A shared store and relay plus an admin under the relay root.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub relay: Arc<MemoryRelay>,
    pub admin: Identity,
    pub config: RegistryConfig,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            relay: MemoryRelay::new(),
            admin: Identity::new(&Did::relay_root(), "0xadmin"),
            config,
        }
    }

    /// A user under the relay root.
    pub fn user(&self, address: &str) -> Identity {
        Identity::new(&Did::relay_root(), address)
    }

    pub fn registry<K: IdentifierKind>(&self) -> TestRegistry<K> {
        Registry::with_shared_store(self.store.clone(), self.relay.clone(), self.config.clone())
    }

    pub fn method_registry(&self) -> TestRegistry<MethodKind> {
        self.registry()
    }

    pub fn chain_registry(&self) -> TestRegistry<ChainKind> {
        self.registry()
    }

    pub fn account_registry(&self) -> TestRegistry<AccountKind> {
        self.registry()
    }

    /// A method registry initialized by the fixture admin.
    pub async fn initialized_method_registry(&self) -> Result<TestRegistry<MethodKind>> {
        let registry = self.method_registry();
        registry.init(&self.admin.caller).await?;
        Ok(registry)
    }

    /// Walk `id` through Apply, AuditApply and Register for `owner`.
    pub async fn register<K: IdentifierKind>(
        &self,
        registry: &TestRegistry<K>,
        owner: &Identity,
        id: &Did,
    ) -> Result<IdentifierRecord> {
        registry.apply(&owner.caller, id).await?;
        registry.audit_apply(&self.admin.caller, id, true).await?;
        let registration = registry
            .register(&owner.caller, id, anchor(&format!("ipfs://{id}")))
            .await?;
        Ok(registration.record)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A parent method registry and children that mirror it.
///
/// Every registry runs on its own store. The children are initialized by the
/// parent's admin, so their genesis records match the parent's and a fully
/// synchronized federation converges.
pub struct Federation {
    pub admin: Identity,
    pub parent: TestRegistry<MethodKind>,
    pub parent_relay: Arc<MemoryRelay>,
    /// `(identifier, transport address, registry)` per child.
    pub children: Vec<(Did, String, TestRegistry<MethodKind>)>,
}

impl Federation {
    pub async fn new(child_count: usize) -> Result<Self> {
        let admin = Identity::new(&Did::relay_root(), "0xadmin");
        let parent_relay = MemoryRelay::new();
        let parent: TestRegistry<MethodKind> = Registry::new(
            MemoryStore::new(),
            parent_relay.clone(),
            RegistryConfig::default(),
        );
        parent.init(&admin.caller).await?;
        parent
            .set_convert_map(&admin.caller, &Did::relay_root(), "relay-root")
            .await?;

        let mut children = Vec::with_capacity(child_count);
        for i in 0..child_count {
            let id = Did::method_of("bitxhub", &format!("relay{i}"));
            let address = format!("relay-{i}");
            let child: TestRegistry<MethodKind> = Registry::new(
                MemoryStore::new(),
                MemoryRelay::new(),
                RegistryConfig::default(),
            );
            child.init(&admin.caller).await?;
            parent.add_child(&admin.caller, &id).await?;
            parent.set_convert_map(&admin.caller, &id, &address).await?;
            children.push((id, address, child));
        }

        Ok(Self {
            admin,
            parent,
            parent_relay,
            children,
        })
    }

    pub fn child(&self, address: &str) -> Option<&TestRegistry<MethodKind>> {
        self.children
            .iter()
            .find(|(_, a, _)| a == address)
            .map(|(_, _, registry)| registry)
    }

    /// Hand every pending message to its child. Returns the number applied.
    pub async fn deliver(&self) -> Result<usize> {
        let mut applied = 0;
        for (_, batch) in self.parent_relay.take().await {
            for message in batch.iter() {
                let child = self.child(&message.to).ok_or_else(|| {
                    RegistryError::InvalidFormat(format!("no child at {}", message.to))
                })?;
                child.receive(message).await?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Whether every child holds the parent's anchored records.
    pub async fn converged(&self) -> Result<bool> {
        let digest = self.parent.digest().await?;
        for (_, _, child) in &self.children {
            if !child.verify_convergence(&digest).await?.is_converged() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = Identity::new(&Did::relay_root(), "0xalice");
        let b = Identity::new(&Did::relay_root(), "0xalice");
        assert_eq!(a.did(), &Did::new("did:bitxhub:relayroot:0xalice"));
        assert_eq!(a.keypair.public_key(), b.keypair.public_key());
        assert!(a.caller.verify_derivation().is_ok());
    }

    #[test]
    fn test_identities_distinct() {
        let users = identities(&Did::relay_root(), 3);
        assert_ne!(users[0].did(), users[1].did());
        assert_ne!(
            users[1].keypair.public_key(),
            users[2].keypair.public_key()
        );
    }

    #[tokio::test]
    async fn test_fixture_registers() {
        let fixture = TestFixture::new();
        let registry = fixture.initialized_method_registry().await.unwrap();
        let alice = fixture.user("0xalice");
        let record = fixture
            .register(&registry, &alice, &Did::new("did:bitxhub:app:."))
            .await
            .unwrap();
        assert_eq!(record.owner, *alice.did());
        assert_eq!(record.status, didhub_core::Status::Registered);
    }

    #[tokio::test]
    async fn test_federation_starts_converged() {
        let federation = Federation::new(2).await.unwrap();
        assert_eq!(federation.children.len(), 2);
        assert!(federation.converged().await.unwrap());
        assert_eq!(federation.deliver().await.unwrap(), 0);
    }
}
