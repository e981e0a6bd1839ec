//! The registry engine.
//!
//! One generic [`Registry`] implements every operation for all three
//! identifier kinds. Each operation authenticates the caller, runs inside a
//! [`Txn`], and commits once. Register additionally fans the new record out to
//! every child registry through the [`Relay`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use didhub_core::{
    validate_mirrored_record, Blake3Hash, Did, DocAnchor, Document, IdentifierRecord, Status,
};
use didhub_governance::{
    operation_message, require_admin, require_admin_or_owner, require_owner, require_super_admin,
    AcceptAll, Caller, SignatureCheck,
};
use didhub_store::{RecordTable, Store};
use didhub_sync::{
    compute_registry_digest, decode_inbound, decode_synchronize_args, ConvergenceResult,
    MessageBatch, Propagator, Relay, SyncMessage,
};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::kind::IdentifierKind;
use crate::state::{Hierarchy, RegistryState};
use crate::txn::Txn;

/// Outcome of a successful Register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The record as committed.
    pub record: IdentifierRecord,
    /// Messages handed to the relay, one per child.
    pub batch: MessageBatch,
}

/// A governed identifier registry.
pub struct Registry<K: IdentifierKind, S: Store, R: Relay> {
    store: Arc<S>,
    relay: R,
    signatures: Box<dyn SignatureCheck>,
    config: RegistryConfig,
    propagator: Propagator,
    table: RecordTable,
    /// Serializes operations, as the host would.
    lock: Mutex<()>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: IdentifierKind, S: Store, R: Relay> Registry<K, S, R> {
    /// Create a registry over its own store.
    pub fn new(store: S, relay: R, config: RegistryConfig) -> Self {
        Self::with_shared_store(Arc::new(store), relay, config)
    }

    /// Create a registry over a store shared with other registries.
    pub fn with_shared_store(store: Arc<S>, relay: R, config: RegistryConfig) -> Self {
        Self {
            store,
            relay,
            signatures: Box::new(AcceptAll),
            propagator: Propagator::new(config.sync.clone()),
            config,
            table: RecordTable::new(K::NAME),
            lock: Mutex::new(()),
            _kind: PhantomData,
        }
    }

    /// Replace the signature hook.
    pub fn with_signature_check(mut self, check: impl SignatureCheck + 'static) -> Self {
        self.signatures = Box::new(check);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Contract address used in outbound payloads.
    pub fn contract_address(&self) -> &str {
        self.config.contract_address_or(K::CONTRACT_ADDRESS)
    }

    async fn begin(&self) -> Result<Txn<'_, S>> {
        Txn::begin(&*self.store, &self.table, K::NAME, K::STATE_KEY).await
    }

    fn authenticate(&self, caller: &Caller, function: &str, args: &[&str]) -> Result<()> {
        caller.verify_derivation()?;
        if self.config.verify_signatures {
            let message = operation_message(K::NAME, function, &caller.did, args);
            self.signatures.check(caller, &message)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Set up the registry with the caller as super admin.
    pub async fn init(&self, caller: &Caller) -> Result<()> {
        let _guard = self.lock.lock().await;
        caller.verify_derivation()?;

        let mut txn = self.begin().await?;
        if txn.is_initialized() {
            return Err(RegistryError::AlreadyInitialized { registry: K::NAME });
        }
        let admin = caller.did.clone();
        let self_id = K::self_id(&admin).ok_or_else(|| {
            RegistryError::InvalidFormat(format!("{admin} does not name a method"))
        })?;
        let genesis = IdentifierRecord::registered(
            K::genesis_id(&admin, &self_id),
            admin.clone(),
            DocAnchor::placeholder(self.config.genesis_doc_address.clone()),
        );

        txn.initialize(RegistryState::new(
            admin.clone(),
            self_id.clone(),
            self.config.default_parent.clone(),
        ))?;
        txn.put_record(&genesis)?;
        txn.commit().await?;

        info!(registry = K::NAME, admin = %admin, self_id = %self_id, "registry initialized");
        Ok(())
    }

    /// Claim an identifier.
    pub async fn apply(&self, caller: &Caller, id: &Did) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        self.authenticate(caller, "Apply", &[id.as_str()])?;

        let mut txn = self.begin().await?;
        K::validate_id(id, &txn.state()?.hierarchy.self_id)?;

        let record = match txn.record(id).await? {
            Some(existing) if !existing.status.is_claimable() => {
                return Err(RegistryError::AlreadyClaimed {
                    id: id.clone(),
                    status: existing.status,
                });
            }
            _ => IdentifierRecord::applied(id.clone(), caller.did.clone(), now_millis()),
        };
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, caller = %caller.did, "applied");
        Ok(record)
    }

    /// Approve or reject a pending claim.
    pub async fn audit_apply(
        &self,
        caller: &Caller,
        id: &Did,
        approve: bool,
    ) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        let verdict = if approve { "1" } else { "0" };
        self.authenticate(caller, "AuditApply", &[id.as_str(), verdict])?;

        let mut txn = self.begin().await?;
        require_admin(&txn.state()?.admins, &caller.did)?;

        let mut record = txn.require_record(id).await?;
        if record.status != Status::Applied {
            return Err(RegistryError::NotInApplicationState {
                id: id.clone(),
                status: record.status,
            });
        }
        let to = if approve {
            Status::Approved
        } else {
            Status::Rejected
        };
        record.transition(to)?;
        record.note_auditor(caller.did.clone());
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, auditor = %caller.did, status = %to, "audited claim");
        Ok(record)
    }

    /// Force a status, along a legal edge only.
    pub async fn audit(&self, caller: &Caller, id: &Did, to: Status) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        self.authenticate(caller, "Audit", &[id.as_str(), to.as_str()])?;

        let mut txn = self.begin().await?;
        require_admin(&txn.state()?.admins, &caller.did)?;

        let mut record = txn.require_record(id).await?;
        let from = record.transition(to)?;
        if record.status.is_claim_phase() {
            record.note_auditor(caller.did.clone());
        }
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, from = %from, to = %to, "audited");
        Ok(record)
    }

    /// Anchor a document and mark the identifier registered, then notify
    /// every child.
    ///
    /// The local commit stands even if the relay refuses the batch; the
    /// failure comes back as [`RegistryError::DownstreamDeliveryFailure`].
    pub async fn register(
        &self,
        caller: &Caller,
        id: &Did,
        doc: DocAnchor,
    ) -> Result<Registration> {
        let _guard = self.lock.lock().await;
        let hash = doc.hash_hex();
        self.authenticate(caller, "Register", &[id.as_str(), &doc.address, &hash])?;

        let mut txn = self.begin().await?;
        let state = txn.state()?;
        let record = match txn.record(id).await? {
            Some(mut record) => {
                self.require_writer(&state.admins, &record, &caller.did)?;
                record.register(doc)?;
                record
            }
            None if K::SELF_REGISTRATION && id == &caller.did => {
                K::validate_id(id, &state.hierarchy.self_id)?;
                IdentifierRecord::registered(id.clone(), caller.did.clone(), doc)
            }
            None => return Err(RegistryError::RecordNotFound(id.clone())),
        };
        let batch = self
            .propagator
            .build(&state.hierarchy.route(self.contract_address()), &record)?;

        txn.put_record(&record)?;
        txn.commit().await?;
        info!(
            registry = K::NAME,
            id = %id,
            owner = %record.owner,
            children = batch.len(),
            "registered"
        );

        self.deliver(id, &batch).await?;
        Ok(Registration { record, batch })
    }

    /// Register with a full document, anchoring its digest.
    pub async fn register_document(
        &self,
        caller: &Caller,
        address: &str,
        document: &K::Document,
    ) -> Result<Registration> {
        let id = document.subject().clone();
        let anchor = document.anchor(address)?;
        self.register(caller, &id, anchor).await
    }

    /// Replace the anchored document of a registered identifier.
    pub async fn update(
        &self,
        caller: &Caller,
        id: &Did,
        doc: DocAnchor,
    ) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        let hash = doc.hash_hex();
        self.authenticate(caller, "Update", &[id.as_str(), &doc.address, &hash])?;

        let mut txn = self.begin().await?;
        let mut record = txn.require_record(id).await?;
        self.require_writer(&txn.state()?.admins, &record, &caller.did)?;
        if record.status != Status::Registered {
            return Err(RegistryError::NotRegistered {
                id: id.clone(),
                status: record.status,
            });
        }
        record.doc = Some(doc);
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, "updated document");
        Ok(record)
    }

    /// Update with a full document, anchoring its digest.
    pub async fn update_document(
        &self,
        caller: &Caller,
        address: &str,
        document: &K::Document,
    ) -> Result<IdentifierRecord> {
        let id = document.subject().clone();
        let anchor = document.anchor(address)?;
        self.update(caller, &id, anchor).await
    }

    fn require_writer(
        &self,
        admins: &didhub_governance::AdminSet,
        record: &IdentifierRecord,
        caller: &Did,
    ) -> Result<()> {
        if K::OWNER_ONLY {
            require_owner(record, caller)?;
        } else {
            require_admin_or_owner(admins, record, caller)?;
        }
        Ok(())
    }

    /// Look up an identifier.
    pub async fn resolve(&self, id: &Did) -> Result<Option<IdentifierRecord>> {
        let txn = self.begin().await?;
        txn.state()?;
        txn.record(id).await
    }

    /// Check a fetched document against the anchored hash.
    pub async fn verify_document(&self, document: &K::Document) -> Result<bool> {
        let id = document.subject();
        let record = self
            .resolve(id)
            .await?
            .ok_or_else(|| RegistryError::RecordNotFound(id.clone()))?;
        let anchor = record.doc.ok_or_else(|| RegistryError::DocumentMismatch {
            id: id.clone(),
            reason: format!("no document anchored ({})", record.status),
        })?;
        Ok(document.verify_against(&anchor)?)
    }

    pub async fn freeze(&self, caller: &Caller, id: &Did) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        self.authenticate(caller, "Freeze", &[id.as_str()])?;

        let mut txn = self.begin().await?;
        require_admin(&txn.state()?.admins, &caller.did)?;
        let mut record = txn.require_record(id).await?;
        if record.status == Status::Frozen {
            return Err(RegistryError::AlreadyFrozen(id.clone()));
        }
        record.transition(Status::Frozen)?;
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, admin = %caller.did, "frozen");
        Ok(record)
    }

    pub async fn unfreeze(&self, caller: &Caller, id: &Did) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        self.authenticate(caller, "UnFreeze", &[id.as_str()])?;

        let mut txn = self.begin().await?;
        require_admin(&txn.state()?.admins, &caller.did)?;
        let mut record = txn.require_record(id).await?;
        if record.status != Status::Frozen {
            return Err(RegistryError::NotFrozen(id.clone()));
        }
        record.transition(Status::Registered)?;
        txn.put_record(&record)?;
        txn.commit().await?;

        debug!(registry = K::NAME, id = %id, admin = %caller.did, "unfrozen");
        Ok(record)
    }

    /// Remove an identifier. Only its owner may do so.
    pub async fn delete(&self, caller: &Caller, id: &Did) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.authenticate(caller, "Delete", &[id.as_str()])?;

        let mut txn = self.begin().await?;
        let state = txn.state()?;
        let record = txn.require_record(id).await?;
        require_owner(&record, &caller.did)?;
        if state.admins.contains(id) {
            return Err(RegistryError::AdminMustBeRemovedFirst(id.clone()));
        }
        if id == &state.hierarchy.self_id {
            return Err(RegistryError::SelfIdentifier(id.clone()));
        }
        if !record.status.is_deletable() {
            return Err(RegistryError::IllegalTransition {
                id: id.clone(),
                from: record.status,
                to: Status::Unclaimed,
            });
        }
        txn.delete_record(id);
        txn.commit().await?;

        info!(registry = K::NAME, id = %id, owner = %caller.did, "deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronization
    // ─────────────────────────────────────────────────────────────────────────

    async fn deliver(&self, id: &Did, batch: &MessageBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let broker = &self.config.relay_broker;
        self.relay
            .record_messages(broker, batch)
            .await
            .map_err(|e| {
                warn!(registry = K::NAME, id = %id, broker = %broker, error = %e, "relay delivery failed");
                RegistryError::DownstreamDeliveryFailure {
                    id: id.clone(),
                    broker: broker.clone(),
                    reason: e.to_string(),
                }
            })
    }

    /// Mirror a record announced by another registry.
    ///
    /// Skips caller authorization. The record must decode, be anchored, and
    /// land on the local state along an accepted edge; the last synchronize
    /// wins.
    pub async fn synchronize(&self, from: &str, record: &[u8]) -> Result<IdentifierRecord> {
        let (from, record) = decode_synchronize_args(from, record)?;
        self.apply_mirror(&from, record).await
    }

    /// Mirror the record carried by a propagate message.
    pub async fn receive(&self, message: &SyncMessage) -> Result<IdentifierRecord> {
        let (from, record) = decode_inbound(message)?;
        self.apply_mirror(&from, record).await
    }

    async fn apply_mirror(&self, from: &Did, record: IdentifierRecord) -> Result<IdentifierRecord> {
        let _guard = self.lock.lock().await;
        let mut txn = self.begin().await?;
        let self_id = txn.state()?.hierarchy.self_id.clone();

        if let Err(e) = validate_mirrored_record(&record) {
            warn!(registry = K::NAME, from = %from, id = %record.id, error = %e, "rejected mirrored record");
            return Err(e.into());
        }
        if let Err(e) = K::validate_id(&record.id, &self_id) {
            warn!(registry = K::NAME, from = %from, id = %record.id, error = %e, "rejected mirrored record");
            return Err(e);
        }
        let local = txn.record(&record.id).await?.map(|r| r.status);
        if !Status::accepts_mirror(local, record.status) {
            let from_status = local.unwrap_or(Status::Unclaimed);
            warn!(
                registry = K::NAME,
                from = %from,
                id = %record.id,
                local = %from_status,
                incoming = %record.status,
                "rejected mirrored record"
            );
            return Err(RegistryError::IllegalTransition {
                id: record.id.clone(),
                from: from_status,
                to: record.status,
            });
        }
        txn.put_record(&record)?;
        txn.commit().await?;

        info!(registry = K::NAME, from = %from, id = %record.id, status = %record.status, "synchronized");
        Ok(record)
    }

    /// Digest of the anchored records, for convergence checks.
    pub async fn digest(&self) -> Result<Blake3Hash> {
        Ok(compute_registry_digest(&*self.store, &self.table).await?)
    }

    /// Compare the anchored records against a peer's digest.
    pub async fn verify_convergence(&self, remote: &Blake3Hash) -> Result<ConvergenceResult> {
        Ok(didhub_sync::verify_convergence(&*self.store, &self.table, remote).await?)
    }

    /// Every record, in identifier order.
    pub async fn records(&self) -> Result<Vec<IdentifierRecord>> {
        Ok(self.table.list(&*self.store).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn hierarchy(&self) -> Result<Hierarchy> {
        let txn = self.begin().await?;
        Ok(txn.state()?.hierarchy.clone())
    }

    async fn edit_hierarchy<T>(
        &self,
        caller: &Caller,
        edit: impl FnOnce(&mut Hierarchy) -> T,
    ) -> Result<T> {
        let _guard = self.lock.lock().await;
        caller.verify_derivation()?;
        let mut txn = self.begin().await?;
        require_admin(&txn.state()?.admins, &caller.did)?;
        let out = edit(&mut txn.state_mut()?.hierarchy);
        txn.commit().await?;
        Ok(out)
    }

    pub async fn set_parent(&self, caller: &Caller, parent: &Did) -> Result<()> {
        require_valid(parent)?;
        self.edit_hierarchy(caller, |h| h.set_parent(parent.clone()))
            .await?;
        info!(registry = K::NAME, parent = %parent, "parent set");
        Ok(())
    }

    /// Add a child registry. Adding a present child changes nothing.
    pub async fn add_child(&self, caller: &Caller, child: &Did) -> Result<bool> {
        require_valid(child)?;
        let added = self
            .edit_hierarchy(caller, |h| h.add_child(child.clone()))
            .await?;
        info!(registry = K::NAME, child = %child, added, "child added");
        Ok(added)
    }

    /// Remove a child registry. Removing an absent child changes nothing.
    pub async fn remove_child(&self, caller: &Caller, child: &Did) -> Result<bool> {
        let removed = self
            .edit_hierarchy(caller, |h| h.remove_child(child))
            .await?;
        info!(registry = K::NAME, child = %child, removed, "child removed");
        Ok(removed)
    }

    /// Map an identifier to the transport address used in outbound messages.
    pub async fn set_convert_map(&self, caller: &Caller, id: &Did, address: &str) -> Result<()> {
        let address = address.to_string();
        self.edit_hierarchy(caller, |h| h.set_converter(id.clone(), address))
            .await?;
        info!(registry = K::NAME, id = %id, "converter entry set");
        Ok(())
    }

    pub async fn get_convert_map(&self, id: &Did) -> Result<Option<String>> {
        let hierarchy = self.hierarchy().await?;
        Ok(hierarchy.converter(id).map(str::to_string))
    }

    /// The method this registry serves.
    pub async fn get_method_id(&self) -> Result<Did> {
        Ok(self.hierarchy().await?.self_id)
    }

    /// Retarget the method this registry serves.
    pub async fn set_method_id(&self, caller: &Caller, method: &Did) -> Result<()> {
        if !method.is_method_form() {
            return Err(RegistryError::InvalidFormat(format!(
                "{method} is not a method identifier"
            )));
        }
        self.edit_hierarchy(caller, |h| h.self_id = method.clone())
            .await?;
        info!(registry = K::NAME, method = %method, "method id set");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admins
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `did` is an admin. An uninitialized registry has none.
    pub async fn has_admin(&self, did: &Did) -> Result<bool> {
        let txn = self.begin().await?;
        Ok(txn
            .state()
            .map(|s| s.admins.contains(did))
            .unwrap_or(false))
    }

    /// Admins, super admin first.
    pub async fn get_admins(&self) -> Result<Vec<Did>> {
        let txn = self.begin().await?;
        Ok(txn.state()?.admins.list().to_vec())
    }

    /// Add an admin. Adding a present admin changes nothing.
    pub async fn add_admin(&self, caller: &Caller, admin: &Did) -> Result<bool> {
        let _guard = self.lock.lock().await;
        caller.verify_derivation()?;
        require_valid(admin)?;

        let mut txn = self.begin().await?;
        require_super_admin(&txn.state()?.admins, &caller.did)?;
        let added = txn.state_mut()?.admins.add(admin.clone());
        if added {
            txn.commit().await?;
        }
        info!(registry = K::NAME, admin = %admin, added, "admin added");
        Ok(added)
    }

    pub async fn remove_admin(&self, caller: &Caller, admin: &Did) -> Result<()> {
        let _guard = self.lock.lock().await;
        caller.verify_derivation()?;

        let mut txn = self.begin().await?;
        require_super_admin(&txn.state()?.admins, &caller.did)?;
        txn.state_mut()?.admins.remove(admin)?;
        txn.commit().await?;

        info!(registry = K::NAME, admin = %admin, "admin removed");
        Ok(())
    }
}

fn require_valid(did: &Did) -> Result<()> {
    if did.is_valid_format() {
        Ok(())
    } else {
        Err(RegistryError::InvalidFormat(format!("{did} is not a valid identifier")))
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
