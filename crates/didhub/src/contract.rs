//! String-method contract surface.
//!
//! A host invokes a registry by function name with positional byte-string
//! arguments and gets back a [`Response`]. [`RegistryContract`] decodes the
//! arguments, builds the [`Caller`] from the invoking address, and turns any
//! [`RegistryError`] into a failed response carrying its message.
//!
//! Signed operations accept an optional trailing 64-byte Ed25519 signature.

use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use didhub_core::{Did, DocAnchor, Ed25519Signature, IdentifierRecord, Status};
use didhub_governance::Caller;
use didhub_store::Store;
use didhub_sync::Relay;

use crate::error::{RegistryError, Result};
use crate::kind::{AccountKind, ChainKind, IdentifierKind, MethodKind};
use crate::registry::Registry;

/// Result of one contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub ok: bool,
    /// Return value on success, error message on failure.
    pub result: Bytes,
}

impl Response {
    pub fn success(result: impl Into<Bytes>) -> Self {
        Self {
            ok: true,
            result: result.into(),
        }
    }

    pub fn empty() -> Self {
        Self::success(Bytes::new())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: Bytes::from(message.into()),
        }
    }

    /// The result as text.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.result).into_owned()
    }
}

impl From<Result<Bytes>> for Response {
    fn from(result: Result<Bytes>) -> Self {
        match result {
            Ok(bytes) => Response::success(bytes),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

/// Public view of a record, as returned by Resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: String,
    pub owner: String,
    pub doc_addr: String,
    /// Hex-encoded document hash; empty when nothing is anchored.
    pub doc_hash: String,
    pub status: String,
}

impl From<&IdentifierRecord> for RecordInfo {
    fn from(record: &IdentifierRecord) -> Self {
        Self {
            id: record.id.to_string(),
            owner: record.owner.to_string(),
            doc_addr: record.doc_address().unwrap_or_default().to_string(),
            doc_hash: record.doc_hash().map(hex::encode).unwrap_or_default(),
            status: record.status.as_str().to_string(),
        }
    }
}

/// A contract a host can invoke by name.
#[async_trait]
pub trait Contract: Send + Sync {
    /// Registry name, for logs and routing.
    fn name(&self) -> &'static str;

    /// Run `function` on behalf of the account at `invoker`.
    async fn invoke(&self, invoker: &str, function: &str, args: &[Bytes]) -> Response;
}

/// Positional argument reader.
struct Args<'a> {
    function: &'a str,
    args: &'a [Bytes],
    pos: usize,
}

impl<'a> Args<'a> {
    fn new(function: &'a str, args: &'a [Bytes]) -> Self {
        Self {
            function,
            args,
            pos: 0,
        }
    }

    fn raw(&mut self) -> Result<&'a [u8]> {
        let arg = self.args.get(self.pos).ok_or_else(|| {
            RegistryError::InvalidFormat(format!(
                "{}: missing argument {}",
                self.function,
                self.pos + 1
            ))
        })?;
        self.pos += 1;
        Ok(arg)
    }

    fn text(&mut self) -> Result<&'a str> {
        let pos = self.pos + 1;
        let raw = self.raw()?;
        std::str::from_utf8(raw).map_err(|_| {
            RegistryError::InvalidFormat(format!(
                "{}: argument {pos} is not utf-8",
                self.function
            ))
        })
    }

    fn did(&mut self) -> Result<Did> {
        Ok(Did::new(self.text()?))
    }

    /// Optional trailing signature; absent or empty means unsigned.
    fn signature(&mut self) -> Result<Option<Ed25519Signature>> {
        match self.args.get(self.pos) {
            None => Ok(None),
            Some(raw) if raw.is_empty() => {
                self.pos += 1;
                Ok(None)
            }
            Some(raw) => {
                self.pos += 1;
                Ok(Some(Ed25519Signature::from_slice(raw)?))
            }
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.args.len() {
            Ok(())
        } else {
            Err(RegistryError::InvalidFormat(format!(
                "{}: expected {} arguments, got {}",
                self.function,
                self.pos,
                self.args.len()
            )))
        }
    }
}

/// Contract adapter over a [`Registry`].
pub struct RegistryContract<K: IdentifierKind, S: Store, R: Relay> {
    registry: Registry<K, S, R>,
}

/// Method registry contract.
pub type MethodManager<S, R> = RegistryContract<MethodKind, S, R>;
/// Chain identifier registry contract.
pub type ChainDidManager<S, R> = RegistryContract<ChainKind, S, R>;
/// Account identifier registry contract.
pub type DidManager<S, R> = RegistryContract<AccountKind, S, R>;

impl<K: IdentifierKind, S: Store, R: Relay> RegistryContract<K, S, R> {
    pub fn new(registry: Registry<K, S, R>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry<K, S, R> {
        &self.registry
    }

    async fn dispatch(&self, invoker: &str, function: &str, args: &[Bytes]) -> Result<Bytes> {
        let mut args = Args::new(function, args);
        let registry = &self.registry;

        let out = match function {
            "Init" => {
                let caller = Caller::new(invoker, args.did()?);
                args.finish()?;
                registry.init(&caller).await?;
                Bytes::new()
            }
            "SetParent" => {
                let caller = Caller::new(invoker, args.did()?);
                let parent = args.did()?;
                args.finish()?;
                registry.set_parent(&caller, &parent).await?;
                Bytes::new()
            }
            "AddChild" => {
                let caller = Caller::new(invoker, args.did()?);
                let child = args.did()?;
                args.finish()?;
                registry.add_child(&caller, &child).await?;
                Bytes::new()
            }
            "RemoveChild" => {
                let caller = Caller::new(invoker, args.did()?);
                let child = args.did()?;
                args.finish()?;
                registry.remove_child(&caller, &child).await?;
                Bytes::new()
            }
            "SetConvertMap" => {
                let caller = Caller::new(invoker, args.did()?);
                let id = args.did()?;
                let address = args.text()?;
                args.finish()?;
                registry.set_convert_map(&caller, &id, address).await?;
                Bytes::new()
            }
            "GetConvertMap" => {
                let id = args.did()?;
                args.finish()?;
                Bytes::from(registry.get_convert_map(&id).await?.unwrap_or_default())
            }
            "Apply" => {
                let (caller, id) = self.signed_target(invoker, &mut args)?;
                registry.apply(&caller, &id).await?;
                Bytes::new()
            }
            "AuditApply" => {
                let did = args.did()?;
                let id = args.did()?;
                let approve = match args.text()? {
                    "1" => true,
                    "0" => false,
                    other => {
                        return Err(RegistryError::InvalidFormat(format!(
                            "AuditApply: result must be 1 or 0, got {other}"
                        )))
                    }
                };
                let caller = signed(invoker, did, &mut args)?;
                registry.audit_apply(&caller, &id, approve).await?;
                Bytes::new()
            }
            "Audit" => {
                let did = args.did()?;
                let id = args.did()?;
                let status = Status::from_str(args.text()?)?;
                let caller = signed(invoker, did, &mut args)?;
                registry.audit(&caller, &id, status).await?;
                Bytes::new()
            }
            "Register" | "Update" => {
                let did = args.did()?;
                let id = args.did()?;
                let address = args.text()?;
                let hash = args.raw()?;
                let caller = signed(invoker, did, &mut args)?;
                let anchor = DocAnchor::new(address, hash)?;
                if function == "Register" {
                    registry.register(&caller, &id, anchor).await?;
                } else {
                    registry.update(&caller, &id, anchor).await?;
                }
                Bytes::new()
            }
            "Resolve" => {
                let id = args.did()?;
                args.finish()?;
                let record = registry
                    .resolve(&id)
                    .await?
                    .ok_or_else(|| RegistryError::RecordNotFound(id.clone()))?;
                Bytes::from(serde_json::to_vec(&RecordInfo::from(&record))?)
            }
            "Freeze" => {
                let (caller, id) = self.signed_target(invoker, &mut args)?;
                registry.freeze(&caller, &id).await?;
                Bytes::new()
            }
            "UnFreeze" => {
                let (caller, id) = self.signed_target(invoker, &mut args)?;
                registry.unfreeze(&caller, &id).await?;
                Bytes::new()
            }
            "Delete" => {
                let (caller, id) = self.signed_target(invoker, &mut args)?;
                registry.delete(&caller, &id).await?;
                Bytes::new()
            }
            "Synchronize" => {
                let from = args.text()?;
                let record = args.raw()?;
                args.finish()?;
                registry.synchronize(from, record).await?;
                Bytes::new()
            }
            "HasAdmin" => {
                let did = args.did()?;
                args.finish()?;
                let flag = if registry.has_admin(&did).await? { "1" } else { "0" };
                Bytes::from_static(flag.as_bytes())
            }
            "GetAdmins" => {
                args.finish()?;
                Bytes::from(serde_json::to_vec(&registry.get_admins().await?)?)
            }
            "AddAdmin" => {
                let caller = Caller::new(invoker, args.did()?);
                let admin = args.did()?;
                args.finish()?;
                registry.add_admin(&caller, &admin).await?;
                Bytes::new()
            }
            "RemoveAdmin" => {
                let caller = Caller::new(invoker, args.did()?);
                let admin = args.did()?;
                args.finish()?;
                registry.remove_admin(&caller, &admin).await?;
                Bytes::new()
            }
            "GetMethodID" if K::RETARGETABLE => {
                args.finish()?;
                Bytes::from(registry.get_method_id().await?.into_string())
            }
            "SetMethodID" if K::RETARGETABLE => {
                let caller = Caller::new(invoker, args.did()?);
                let method = args.did()?;
                args.finish()?;
                registry.set_method_id(&caller, &method).await?;
                Bytes::new()
            }
            _ => {
                return Err(RegistryError::InvalidFormat(format!(
                    "{} has no method {function}",
                    K::NAME
                )))
            }
        };
        Ok(out)
    }

    /// `(caller, id, [signature])`
    fn signed_target(&self, invoker: &str, args: &mut Args<'_>) -> Result<(Caller, Did)> {
        let did = args.did()?;
        let id = args.did()?;
        Ok((signed(invoker, did, args)?, id))
    }
}

fn signed(invoker: &str, did: Did, args: &mut Args<'_>) -> Result<Caller> {
    let signature = args.signature()?;
    args.finish()?;
    let caller = Caller::new(invoker, did);
    Ok(match signature {
        Some(signature) => caller.with_signature(signature),
        None => caller,
    })
}

#[async_trait]
impl<K: IdentifierKind, S: Store, R: Relay> Contract for RegistryContract<K, S, R> {
    fn name(&self) -> &'static str {
        K::NAME
    }

    async fn invoke(&self, invoker: &str, function: &str, args: &[Bytes]) -> Response {
        let response = Response::from(self.dispatch(invoker, function, args).await);
        debug!(
            registry = K::NAME,
            function,
            invoker,
            ok = response.ok,
            "contract invoked"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use didhub_store::MemoryStore;
    use didhub_sync::NullRelay;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    const ADMIN: &str = "did:bitxhub:relayroot:0xadmin";
    const ALICE: &str = "did:bitxhub:relayroot:0xalice";
    const APP: &str = "did:bitxhub:app:.";

    async fn method_manager() -> MethodManager<MemoryStore, NullRelay> {
        let contract = RegistryContract::new(Registry::new(
            MemoryStore::new(),
            NullRelay,
            RegistryConfig::default(),
        ));
        let r = contract.invoke("0xadmin", "Init", &[b(ADMIN)]).await;
        assert!(r.ok, "{}", r.message());
        contract
    }

    #[tokio::test]
    async fn test_full_surface() {
        let c = method_manager().await;
        assert!(c.invoke("0xalice", "Apply", &[b(ALICE), b(APP)]).await.ok);
        assert!(
            c.invoke("0xadmin", "AuditApply", &[b(ADMIN), b(APP), b("1")])
                .await
                .ok
        );
        let hash = Bytes::from(vec![0x11; 32]);
        let r = c
            .invoke(
                "0xalice",
                "Register",
                &[b(ALICE), b(APP), b("ipfs://app"), hash, Bytes::new()],
            )
            .await;
        assert!(r.ok, "{}", r.message());

        let r = c.invoke("0xanyone", "Resolve", &[b(APP)]).await;
        assert!(r.ok);
        let info: RecordInfo = serde_json::from_slice(&r.result).unwrap();
        assert_eq!(info.id, APP);
        assert_eq!(info.owner, ALICE);
        assert_eq!(info.doc_addr, "ipfs://app");
        assert_eq!(info.doc_hash, "11".repeat(32));
        assert_eq!(info.status, "registered");

        assert!(c.invoke("0xadmin", "Freeze", &[b(ADMIN), b(APP)]).await.ok);
        let r = c.invoke("0xadmin", "Freeze", &[b(ADMIN), b(APP)]).await;
        assert!(!r.ok);
        assert!(r.message().contains("already frozen"));
        assert!(c.invoke("0xadmin", "UnFreeze", &[b(ADMIN), b(APP)]).await.ok);
        assert!(c.invoke("0xalice", "Delete", &[b(ALICE), b(APP)]).await.ok);
        let r = c.invoke("0xanyone", "Resolve", &[b(APP)]).await;
        assert!(!r.ok);
        assert!(r.message().contains(APP));
    }

    #[tokio::test]
    async fn test_admin_queries() {
        let c = method_manager().await;
        assert_eq!(c.invoke("x", "HasAdmin", &[b(ADMIN)]).await.result, b("1"));
        assert_eq!(c.invoke("x", "HasAdmin", &[b(ALICE)]).await.result, b("0"));
        assert!(c.invoke("0xadmin", "AddAdmin", &[b(ADMIN), b(ALICE)]).await.ok);
        let admins: Vec<Did> =
            serde_json::from_slice(&c.invoke("x", "GetAdmins", &[]).await.result).unwrap();
        assert_eq!(admins, vec![Did::new(ADMIN), Did::new(ALICE)]);

        let r = c.invoke("0xadmin", "RemoveAdmin", &[b(ADMIN), b(ADMIN)]).await;
        assert!(!r.ok);
        assert!(r.message().contains("cannot be removed"));
    }

    #[tokio::test]
    async fn test_caller_mismatch_message() {
        let c = method_manager().await;
        let r = c.invoke("0xmallory", "Apply", &[b(ALICE), b(APP)]).await;
        assert!(!r.ok);
        assert!(r.message().contains("0xmallory"));
        assert!(r.message().contains(ALICE));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let c = method_manager().await;
        assert!(!c.invoke("0xalice", "Apply", &[b(ALICE)]).await.ok);
        assert!(
            !c.invoke("0xalice", "Apply", &[b(ALICE), b(APP), b("short-signature")])
                .await
                .ok
        );
        assert!(
            !c.invoke("0xadmin", "AuditApply", &[b(ADMIN), b(APP), b("yes")])
                .await
                .ok
        );
        assert!(!c.invoke("x", "Resolve", &[b(APP), b(APP)]).await.ok);
        let r = c.invoke("x", "NoSuchMethod", &[]).await;
        assert!(r.message().contains("NoSuchMethod"));
    }

    #[tokio::test]
    async fn test_method_id_only_on_accounts() {
        let c = method_manager().await;
        assert!(!c.invoke("x", "GetMethodID", &[]).await.ok);

        let accounts: DidManager<MemoryStore, NullRelay> = RegistryContract::new(Registry::new(
            MemoryStore::new(),
            NullRelay,
            RegistryConfig::default(),
        ));
        let admin = "did:bitxhub:appchain1:0xadmin";
        assert!(accounts.invoke("0xadmin", "Init", &[b(admin)]).await.ok);
        let r = accounts.invoke("x", "GetMethodID", &[]).await;
        assert_eq!(r.result, b("did:bitxhub:appchain1:."));
        assert!(
            accounts
                .invoke("0xadmin", "SetMethodID", &[b(admin), b("did:bitxhub:appchain2:.")])
                .await
                .ok
        );
        assert_eq!(
            accounts.invoke("x", "GetMethodID", &[]).await.result,
            b("did:bitxhub:appchain2:.")
        );
    }

    #[tokio::test]
    async fn test_synchronize_surface() {
        let c = method_manager().await;
        let record = IdentifierRecord::registered(
            Did::new(APP),
            Did::new(ALICE),
            DocAnchor::new("ipfs://app", vec![1; 32]).unwrap(),
        );
        let bytes = Bytes::from(didhub_core::record_bytes(&record));
        assert!(
            c.invoke("relay", "Synchronize", &[b(didhub_core::RELAY_ROOT), bytes])
                .await
                .ok
        );
        let r = c
            .invoke("relay", "Synchronize", &[b(didhub_core::RELAY_ROOT), b("junk")])
            .await;
        assert!(r.message().contains("deserialization"));
    }
}
