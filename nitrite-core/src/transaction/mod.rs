//! Atomic multi-operation writes over one collection.
//!
//! A transaction records its writes in a private shadow map and a journal.
//! Reads through the transaction see its own writes; nobody else does until
//! `commit` replays the journal against the collection under its write lock.
//! A failed replay is undone in full.
//!
//! ```rust,ignore
//! let txn = users.begin_transaction()?;
//! let id = txn.insert(doc! { name: "Alice" })?;
//! assert!(users.get_by_id(id)?.is_none());
//! txn.commit()?;
//! assert!(users.get_by_id(id)?.is_some());
//! ```

mod core;
mod nitrite_transaction;
mod shadow_map;

pub use self::core::TransactionState;
pub(crate) use self::core::JournalEntry;
pub use nitrite_transaction::*;
