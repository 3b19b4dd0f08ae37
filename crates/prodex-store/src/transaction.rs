//! Optimistic transactions over [`JsonStorage`].
//!
//! A transaction collects pending add/update/delete intents plus an
//! in-memory read cache; nothing touches disk until `commit`, which applies
//! the intents as batch operations in the order saves → updates → deletes.
//! Any failure rolls the transaction back and surfaces the error.
//!
//! Transactions do not lock the storage directory. Concurrent transactions
//! over disjoint ids commit independently; when they touch the same id the
//! last writer wins at commit time.

use std::collections::HashMap;

use futures::future::BoxFuture;

use prodex_core::ProductData;

use crate::engine::JsonStorage;
use crate::error::StorageError;

pub struct Transaction<'s> {
    storage: &'s JsonStorage,
    added: Vec<ProductData>,
    updated: Vec<(String, ProductData)>,
    deleted: Vec<String>,
    cache: HashMap<String, ProductData>,
    committed: bool,
    active: bool,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(storage: &'s JsonStorage) -> Self {
        Self {
            storage,
            added: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            cache: HashMap::new(),
            committed: false,
            active: true,
        }
    }

    fn check_active(&self) -> Result<(), StorageError> {
        if self.committed {
            return Err(StorageError::TransactionCommitted);
        }
        if !self.active {
            return Err(StorageError::TransactionInactive);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active && !self.committed
    }

    /// Queues a product for insertion and returns the id it will get.
    ///
    /// # Errors
    ///
    /// Returns a transaction-state error after commit or rollback.
    pub fn add_product(&mut self, product: ProductData) -> Result<String, StorageError> {
        self.check_active()?;
        let id = self.storage.product_id(&product, None);
        self.cache.insert(id.clone(), product.clone());
        self.added.push(product);
        Ok(id)
    }

    /// Reads a product through the transaction: pending deletes hide it,
    /// pending adds/updates are visible, otherwise storage is consulted and
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns a transaction-state error after commit or rollback; storage
    /// read failures other than not-found are surfaced.
    pub async fn get_product(&mut self, id: &str) -> Result<Option<ProductData>, StorageError> {
        self.check_active()?;
        if self.deleted.iter().any(|d| d == id) {
            return Ok(None);
        }
        if let Some(product) = self.cache.get(id) {
            return Ok(Some(product.clone()));
        }
        match self.storage.get_product(id).await {
            Ok(record) => {
                self.cache.insert(id.to_owned(), record.product.clone());
                Ok(Some(record.product))
            }
            Err(StorageError::ProductNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Queues an update. Returns `false` when the product was deleted
    /// earlier in this transaction.
    ///
    /// # Errors
    ///
    /// Returns a transaction-state error after commit or rollback.
    pub fn update_product(
        &mut self,
        id: &str,
        product: ProductData,
    ) -> Result<bool, StorageError> {
        self.check_active()?;
        if self.deleted.iter().any(|d| d == id) {
            return Ok(false);
        }
        self.cache.insert(id.to_owned(), product.clone());
        match self.updated.iter_mut().find(|(uid, _)| uid == id) {
            Some((_, pending)) => *pending = product,
            None => self.updated.push((id.to_owned(), product)),
        }
        Ok(true)
    }

    /// Queues a deletion, discarding any pending add or update for the id.
    ///
    /// # Errors
    ///
    /// Returns a transaction-state error after commit or rollback.
    pub fn delete_product(&mut self, id: &str) -> Result<bool, StorageError> {
        self.check_active()?;
        self.cache.remove(id);
        let storage = self.storage;
        self.added
            .retain(|product| storage.product_id(product, None) != id);
        self.updated.retain(|(uid, _)| uid != id);
        if !self.deleted.iter().any(|d| d == id) {
            self.deleted.push(id.to_owned());
        }
        Ok(true)
    }

    /// Applies pending intents as batch operations: saves, then updates,
    /// then deletes. Any failure triggers rollback and surfaces the error.
    ///
    /// # Errors
    ///
    /// Returns the failing batch operation's error, or a transaction-state
    /// error after commit or rollback.
    pub async fn commit(&mut self) -> Result<(), StorageError> {
        self.check_active()?;

        let result = self.apply().await;
        match result {
            Ok(()) => {
                self.committed = true;
                self.active = false;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "transaction commit failed, rolling back");
                self.rollback()?;
                Err(err)
            }
        }
    }

    async fn apply(&mut self) -> Result<(), StorageError> {
        if !self.added.is_empty() {
            let ids = self.storage.save_products(&self.added).await?;
            tracing::info!(count = ids.len(), "committed added products");
        }
        if !self.updated.is_empty() {
            let ids = self.storage.update_products(&self.updated).await?;
            tracing::info!(count = ids.len(), "committed updated products");
        }
        if !self.deleted.is_empty() {
            let count = self.storage.delete_products(&self.deleted).await?;
            tracing::info!(count, "committed deleted products");
        }
        Ok(())
    }

    /// Discards every pending intent and deactivates the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TransactionCommitted`] after a successful
    /// commit and [`StorageError::TransactionInactive`] when called twice.
    pub fn rollback(&mut self) -> Result<(), StorageError> {
        if self.committed {
            return Err(StorageError::TransactionCommitted);
        }
        if !self.active {
            return Err(StorageError::TransactionInactive);
        }
        self.added.clear();
        self.updated.clear();
        self.deleted.clear();
        self.cache.clear();
        self.active = false;
        tracing::info!("transaction rolled back");
        Ok(())
    }
}

impl JsonStorage {
    /// Starts a new transaction over this storage.
    #[must_use]
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Scoped transaction use: commits when the closure returns `Ok`,
    /// rolls back when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Surfaces the closure's error (after rollback) or the commit error.
    pub async fn with_transaction<'s, T, F>(&'s self, f: F) -> Result<T, StorageError>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'s>) -> BoxFuture<'t, Result<T, StorageError>>,
    {
        let mut tx = self.transaction();
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if tx.is_active() {
                    tx.rollback()?;
                }
                Err(err)
            }
        }
    }
}
