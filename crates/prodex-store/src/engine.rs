//! JSON file storage engine.
//!
//! One pretty-printed JSON file per product under the storage directory,
//! an `index.json` sidecar for lookups and filtering, and (when enabled) a
//! `versions/<id>/v<n>.json` history written before every overwrite.
//!
//! The index mutex is the single write-serialization point: every mutating
//! operation holds it across its load-modify-save sequence, so per-file
//! writes never interleave with index reads. Plain reads take no lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use prodex_core::{now_rfc3339, ProductData};

use crate::error::StorageError;

/// A product as it lives on disk: the product record flattened together
/// with storage metadata. The `version` field rides on [`ProductData`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: String,
    #[serde(flatten)]
    pub product: ProductData,
    pub metadata: Map<String, Value>,
}

impl StoredProduct {
    #[must_use]
    pub fn version(&self) -> u32 {
        self.product.version
    }
}

/// One `index.json` entry: enough to filter and sort without opening the
/// per-product file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    pub version: u32,
}

type Index = BTreeMap<String, IndexEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filtering, sorting, and pagination parameters for [`JsonStorage::list_products`].
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Exact-match filters on top-level index keys or `metadata.<key>`.
    pub filters: Map<String, Value>,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Map::new(),
            page: 1,
            page_size: 100,
            sort_by: None,
            sort_order: SortOrder::Ascending,
        }
    }
}

/// One page of [`JsonStorage::list_products`] output.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<StoredProduct>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Directory-backed JSON product storage.
pub struct JsonStorage {
    directory: PathBuf,
    versioning: bool,
    /// Used for `<store_name>_<sku>` product ids and recorded in the index.
    store_name: Option<String>,
    index_lock: Mutex<()>,
}

impl JsonStorage {
    /// Opens (and creates, if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] when the directory or index
    /// file cannot be created.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        let storage = Self {
            directory,
            versioning: false,
            store_name: None,
            index_lock: Mutex::new(()),
        };
        if tokio::fs::try_exists(storage.index_path()).await? {
            return Ok(storage);
        }
        storage.write_index(&Index::new()).await?;
        Ok(storage)
    }

    /// Enables per-product version history.
    #[must_use]
    pub fn with_versioning(mut self, versioning: bool) -> Self {
        self.versioning = versioning;
        self
    }

    /// Sets the store name used in generated product ids.
    #[must_use]
    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = Some(store_name.into());
        self
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Product identity: caller-supplied id, `<store_name>_<sku>`,
    /// `url_<hash>`, then a fresh UUID — first non-empty wins.
    #[must_use]
    pub fn product_id(&self, product: &ProductData, explicit: Option<&str>) -> String {
        if let Some(id) = explicit {
            if !id.is_empty() {
                return id.to_owned();
            }
        }
        if let (Some(store_name), Some(sku)) = (&self.store_name, &product.sku) {
            if !sku.is_empty() {
                return format!("{store_name}_{sku}");
            }
        }
        if let Some(url) = &product.url {
            if !url.is_empty() {
                let digest = Sha256::digest(url.as_bytes());
                let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
                return format!("url_{}", &hex[..16]);
            }
        }
        uuid::Uuid::new_v4().to_string()
    }

    // -- paths --------------------------------------------------------------

    fn index_path(&self) -> PathBuf {
        self.directory.join("index.json")
    }

    fn product_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{id}.json"))
    }

    fn version_path(&self, id: &str, version: u32) -> PathBuf {
        self.directory
            .join("versions")
            .join(id)
            .join(format!("v{version}.json"))
    }

    // -- index --------------------------------------------------------------

    async fn read_index(&self) -> Result<Index, StorageError> {
        let path = self.index_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Index::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Index::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    async fn write_index(&self, index: &Index) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(index).map_err(StorageError::Serialize)?;
        tokio::fs::write(self.index_path(), body).await?;
        Ok(())
    }

    fn index_entry(record: &StoredProduct) -> IndexEntry {
        IndexEntry {
            id: record.id.clone(),
            metadata: record.metadata.clone(),
            title: Some(record.product.title.clone()),
            sku: record.product.sku.clone(),
            url: record.product.url.clone(),
            store_name: None,
            version: record.product.version,
        }
    }

    fn stamp_store_name(&self, entry: &mut IndexEntry) {
        entry.store_name = self.store_name.clone();
    }

    // -- files --------------------------------------------------------------

    async fn write_record(&self, record: &StoredProduct) -> Result<(), StorageError> {
        let body = serde_json::to_string_pretty(record).map_err(StorageError::Serialize)?;
        tokio::fs::write(self.product_path(&record.id), body).await?;
        Ok(())
    }

    async fn read_record(&self, path: &Path, id: &str) -> Result<StoredProduct, StorageError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::ProductNotFound { id: id.to_owned() })
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    fn prepare_record(&self, product: &ProductData, id: String) -> StoredProduct {
        let now = now_rfc3339();
        let mut metadata = Map::new();
        metadata.insert("created_at".to_owned(), Value::String(now.clone()));
        metadata.insert("updated_at".to_owned(), Value::String(now));
        let mut product = product.clone();
        product.version = 1;
        StoredProduct {
            id,
            product,
            metadata,
        }
    }

    // -- single operations --------------------------------------------------

    /// Saves a new product and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateProduct`] when the id already exists.
    pub async fn save_product(&self, product: &ProductData) -> Result<String, StorageError> {
        self.save_product_with_id(product, None).await
    }

    /// Saves a new product under an explicit id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateProduct`] when the id already exists.
    pub async fn save_product_with_id(
        &self,
        product: &ProductData,
        explicit_id: Option<&str>,
    ) -> Result<String, StorageError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;

        let id = self.product_id(product, explicit_id);
        if index.contains_key(&id) {
            return Err(StorageError::DuplicateProduct { id });
        }

        let record = self.prepare_record(product, id.clone());
        self.write_record(&record).await?;

        let mut entry = Self::index_entry(&record);
        self.stamp_store_name(&mut entry);
        index.insert(id.clone(), entry);
        self.write_index(&index).await?;

        tracing::debug!(id = %id, "product saved");
        Ok(id)
    }

    /// Saves a batch of products with an all-or-nothing duplicate check:
    /// if any id already exists, nothing is written. File writes run in
    /// parallel; the index is updated once at the end.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateProduct`] on the first conflicting id.
    pub async fn save_products(
        &self,
        products: &[ProductData],
    ) -> Result<Vec<String>, StorageError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;

        let mut records = Vec::with_capacity(products.len());
        let mut ids = Vec::with_capacity(products.len());
        for product in products {
            let id = self.product_id(product, None);
            if index.contains_key(&id) || ids.contains(&id) {
                return Err(StorageError::DuplicateProduct { id });
            }
            ids.push(id.clone());
            records.push(self.prepare_record(product, id));
        }

        futures::future::try_join_all(records.iter().map(|record| self.write_record(record)))
            .await?;

        for record in &records {
            let mut entry = Self::index_entry(record);
            self.stamp_store_name(&mut entry);
            index.insert(record.id.clone(), entry);
        }
        self.write_index(&index).await?;

        tracing::debug!(count = ids.len(), "product batch saved");
        Ok(ids)
    }

    /// Retrieves a product by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] when the id is unknown.
    pub async fn get_product(&self, id: &str) -> Result<StoredProduct, StorageError> {
        self.read_record(&self.product_path(id), id).await
    }

    /// Retrieves a batch of products, validating that every id exists
    /// before reading anything.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] naming the first missing id.
    pub async fn get_products(&self, ids: &[String]) -> Result<Vec<StoredProduct>, StorageError> {
        for id in ids {
            if !tokio::fs::try_exists(self.product_path(id)).await? {
                return Err(StorageError::ProductNotFound { id: id.clone() });
            }
        }
        futures::future::try_join_all(
            ids.iter()
                .map(|id| self.read_record_owned(self.product_path(id), id.clone())),
        )
        .await
    }

    async fn read_record_owned(
        &self,
        path: PathBuf,
        id: String,
    ) -> Result<StoredProduct, StorageError> {
        self.read_record(&path, &id).await
    }

    /// Merges `updates` into the stored record, refreshes `updated_at`,
    /// bumps the version, and archives the previous content when
    /// versioning is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] when the id is unknown.
    pub async fn update_product(
        &self,
        id: &str,
        updates: &ProductData,
    ) -> Result<StoredProduct, StorageError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        if !index.contains_key(id) {
            return Err(StorageError::ProductNotFound { id: id.to_owned() });
        }

        let record = self.apply_update(id, updates, now_rfc3339()).await?;

        let mut entry = Self::index_entry(&record);
        self.stamp_store_name(&mut entry);
        index.insert(id.to_owned(), entry);
        self.write_index(&index).await?;
        Ok(record)
    }

    /// Batched updates: all merges and version bumps happen under a single
    /// index update. Every id is validated before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] naming the first missing id.
    pub async fn update_products(
        &self,
        updates: &[(String, ProductData)],
    ) -> Result<Vec<String>, StorageError> {
        if updates.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        for (id, _) in updates {
            if !index.contains_key(id) {
                return Err(StorageError::ProductNotFound { id: id.clone() });
            }
        }

        let now = now_rfc3339();
        let mut ids = Vec::with_capacity(updates.len());
        for (id, product) in updates {
            let record = self.apply_update(id, product, now.clone()).await?;
            let mut entry = Self::index_entry(&record);
            self.stamp_store_name(&mut entry);
            index.insert(id.clone(), entry);
            ids.push(id.clone());
        }
        self.write_index(&index).await?;
        Ok(ids)
    }

    async fn apply_update(
        &self,
        id: &str,
        updates: &ProductData,
        now: String,
    ) -> Result<StoredProduct, StorageError> {
        let path = self.product_path(id);
        let existing = self.read_record(&path, id).await?;
        let previous_version = existing.product.version;

        if self.versioning {
            self.archive_version(id, previous_version, &path).await?;
        }

        let mut merged_value =
            serde_json::to_value(&existing.product).map_err(StorageError::Serialize)?;
        let updates_value = serde_json::to_value(updates).map_err(StorageError::Serialize)?;
        if let (Value::Object(base), Value::Object(incoming)) = (&mut merged_value, updates_value) {
            for (key, value) in incoming {
                if !value.is_null() {
                    base.insert(key, value);
                }
            }
        }
        let mut product: ProductData =
            serde_json::from_value(merged_value).map_err(StorageError::Serialize)?;
        product.version = previous_version + 1;

        let mut metadata = existing.metadata;
        metadata.insert("updated_at".to_owned(), Value::String(now));

        let record = StoredProduct {
            id: id.to_owned(),
            product,
            metadata,
        };
        self.write_record(&record).await?;
        Ok(record)
    }

    async fn archive_version(
        &self,
        id: &str,
        version: u32,
        current_path: &Path,
    ) -> Result<(), StorageError> {
        let archive_path = self.version_path(id, version);
        if let Some(parent) = archive_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = tokio::fs::read(current_path).await?;
        tokio::fs::write(&archive_path, raw).await?;
        Ok(())
    }

    /// Deletes a product file and its index entry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] when the id is unknown.
    pub async fn delete_product(&self, id: &str) -> Result<(), StorageError> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        if index.remove(id).is_none() {
            return Err(StorageError::ProductNotFound { id: id.to_owned() });
        }
        let path = self.product_path(id);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }
        self.write_index(&index).await?;
        Ok(())
    }

    /// Deletes a batch of products; every id is validated first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] naming the first missing id.
    pub async fn delete_products(&self, ids: &[String]) -> Result<usize, StorageError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let _guard = self.index_lock.lock().await;
        let mut index = self.read_index().await?;
        for id in ids {
            if !index.contains_key(id) {
                return Err(StorageError::ProductNotFound { id: id.clone() });
            }
        }
        futures::future::try_join_all(ids.iter().map(|id| self.remove_file_if_present(id)))
            .await?;
        for id in ids {
            index.remove(id);
        }
        self.write_index(&index).await?;
        Ok(ids.len())
    }

    async fn remove_file_if_present(&self, id: &str) -> Result<(), StorageError> {
        let path = self.product_path(id);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    /// Scans the index with exact-match filters, sorts, paginates, then
    /// loads the matching records.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] for I/O failures.
    pub async fn list_products(&self, query: &ListQuery) -> Result<ProductPage, StorageError> {
        let index = self.read_index().await?;

        let mut matching: Vec<&IndexEntry> = index
            .values()
            .filter(|entry| matches_filters(entry, &query.filters))
            .collect();

        if let Some(sort_by) = &query.sort_by {
            matching.sort_by_key(|entry| sort_key(entry, sort_by));
            if query.sort_order == SortOrder::Descending {
                matching.reverse();
            }
        }

        let total = matching.len();
        let page_size = query.page_size.max(1);
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(page_size)
        };
        let start = (query.page.max(1) - 1) * page_size;
        let ids: Vec<String> = matching
            .into_iter()
            .skip(start)
            .take(page_size)
            .map(|entry| entry.id.clone())
            .collect();

        let products = self.get_products(&ids).await?;
        Ok(ProductPage {
            products,
            total,
            page: query.page.max(1),
            page_size,
            total_pages,
        })
    }

    /// Number of products currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] for I/O failures.
    pub async fn count_products(&self) -> Result<usize, StorageError> {
        Ok(self.read_index().await?.len())
    }

    /// Retrieves one historical (or the current) version of a product.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::VersionNotFound`] when that version was never
    /// recorded.
    pub async fn get_product_version(
        &self,
        id: &str,
        version: u32,
    ) -> Result<StoredProduct, StorageError> {
        let current = self.get_product(id).await?;
        if current.product.version == version {
            return Ok(current);
        }
        let path = self.version_path(id, version);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                path: path.display().to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                StorageError::VersionNotFound {
                    id: id.to_owned(),
                    version,
                },
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists all recorded version numbers for a product, ascending; the
    /// current version is included.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ProductNotFound`] when the id is unknown.
    pub async fn list_product_versions(&self, id: &str) -> Result<Vec<u32>, StorageError> {
        let current = self.get_product(id).await?;
        let mut versions = vec![current.product.version];

        let dir = self.directory.join("versions").join(id);
        match tokio::fs::read_dir(&dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    if let Some(number) = name
                        .strip_prefix('v')
                        .and_then(|rest| rest.strip_suffix(".json"))
                    {
                        if let Ok(version) = number.parse::<u32>() {
                            versions.push(version);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }
}

fn matches_filters(entry: &IndexEntry, filters: &Map<String, Value>) -> bool {
    if filters.is_empty() {
        return true;
    }
    let Ok(Value::Object(entry_map)) = serde_json::to_value(entry) else {
        return false;
    };
    for (key, expected) in filters {
        let actual = if let Some(meta_key) = key.strip_prefix("metadata.") {
            entry_map
                .get("metadata")
                .and_then(|m| m.as_object())
                .and_then(|m| m.get(meta_key))
        } else {
            entry_map.get(key)
        };
        if actual != Some(expected) {
            return false;
        }
    }
    true
}

fn sort_key(entry: &IndexEntry, sort_by: &str) -> String {
    if sort_by == "id" {
        return entry.id.clone();
    }
    if let Some(meta_key) = sort_by.strip_prefix("metadata.") {
        return entry
            .metadata
            .get(meta_key)
            .map(value_as_sort_string)
            .unwrap_or_default();
    }
    let Ok(Value::Object(entry_map)) = serde_json::to_value(entry) else {
        return String::new();
    };
    entry_map
        .get(sort_by)
        .map(value_as_sort_string)
        .unwrap_or_default()
}

fn value_as_sort_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
