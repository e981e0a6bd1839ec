//! Load, mutate, persist.
//!
//! Every registry operation runs inside one [`Txn`]: it loads the aggregate
//! state, reads records through the staged writes, and commits everything
//! with a single batch. A transaction dropped without [`Txn::commit`] writes
//! nothing.

use didhub_core::{validate_record, Did, IdentifierRecord};
use didhub_store::{encode_object, RecordTable, Store, StoreExt, WriteBatch};

use crate::error::{RegistryError, Result};
use crate::state::RegistryState;

pub(crate) struct Txn<'a, S: Store + ?Sized> {
    store: &'a S,
    table: &'a RecordTable,
    registry: &'static str,
    state_key: &'static str,
    state: Option<RegistryState>,
    state_dirty: bool,
    batch: WriteBatch,
}

impl<'a, S: Store + ?Sized> Txn<'a, S> {
    pub async fn begin(
        store: &'a S,
        table: &'a RecordTable,
        registry: &'static str,
        state_key: &'static str,
    ) -> Result<Self> {
        let state = store.get_object::<RegistryState>(state_key).await?;
        Ok(Self {
            store,
            table,
            registry,
            state_key,
            state,
            state_dirty: false,
            batch: WriteBatch::new(),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Result<&RegistryState> {
        self.state.as_ref().ok_or(RegistryError::NotInitialized {
            registry: self.registry,
        })
    }

    pub fn state_mut(&mut self) -> Result<&mut RegistryState> {
        let registry = self.registry;
        let state = self
            .state
            .as_mut()
            .ok_or(RegistryError::NotInitialized { registry })?;
        self.state_dirty = true;
        Ok(state)
    }

    /// Install the state of a fresh registry.
    pub fn initialize(&mut self, state: RegistryState) -> Result<()> {
        if self.state.is_some() {
            return Err(RegistryError::AlreadyInitialized {
                registry: self.registry,
            });
        }
        self.state = Some(state);
        self.state_dirty = true;
        Ok(())
    }

    /// Read a record, seeing this transaction's own writes.
    pub async fn record(&self, id: &Did) -> Result<Option<IdentifierRecord>> {
        let key = self.table.key(id);
        match self.batch.staged(&key) {
            Some(Some(bytes)) => Ok(Some(self.table.decode(&key, bytes)?)),
            Some(None) => Ok(None),
            None => Ok(self.table.get(self.store, id).await?),
        }
    }

    pub async fn require_record(&self, id: &Did) -> Result<IdentifierRecord> {
        self.record(id)
            .await?
            .ok_or_else(|| RegistryError::RecordNotFound(id.clone()))
    }

    pub fn put_record(&mut self, record: &IdentifierRecord) -> Result<()> {
        validate_record(record)?;
        self.table.stage_put(&mut self.batch, record);
        Ok(())
    }

    pub fn delete_record(&mut self, id: &Did) {
        self.table.stage_delete(&mut self.batch, id);
    }

    /// Write everything staged in one batch. Returns the number of writes.
    pub async fn commit(mut self) -> Result<usize> {
        if self.state_dirty {
            if let Some(state) = &self.state {
                self.batch.put(self.state_key, encode_object(state)?);
            }
        }
        let count = self.batch.len();
        if count > 0 {
            self.store.write_batch(self.batch).await?;
        }
        Ok(count)
    }
}
