use crate::collection::{Document, NitriteId};

/// Lifecycle of a transaction.
///
/// `Active` until `commit` or `rollback`. A commit passes through
/// `PartiallyCommitted` while its journal is replayed and ends in
/// `Committed` or, if the replay fails and is undone, `Failed`. A rollback
/// ends in `Aborted`. `Closed` is the terminal state after `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Active,
    PartiallyCommitted,
    Committed,
    Failed,
    Aborted,
    Closed,
}

/// One operation issued inside a transaction, replayed on commit in issue
/// order. Filters are resolved to ids when the operation is issued.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JournalEntry {
    Insert { document: Document },
    Update { id: NitriteId, update: Document },
    Remove { id: NitriteId },
}
