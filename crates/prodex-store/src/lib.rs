pub mod engine;
pub mod error;
pub mod transaction;

pub use engine::{IndexEntry, JsonStorage, ListQuery, ProductPage, SortOrder, StoredProduct};
pub use error::StorageError;
pub use transaction::Transaction;
