use super::index_manager::{IndexManager, IndexRecord};
use crate::collection::{Document, NitriteId};
use crate::common::Value;
use crate::errors::NitriteResult;
use crate::index::FieldValues;

/// Keeps index entries in step with document writes.
#[derive(Clone)]
pub(crate) struct DocumentIndexWriter {
    index_manager: IndexManager,
}

struct AppliedChange {
    record: IndexRecord,
    old_values: Option<FieldValues>,
    new_values: Option<FieldValues>,
}

impl DocumentIndexWriter {
    pub fn new(index_manager: IndexManager) -> Self {
        DocumentIndexWriter { index_manager }
    }

    /// Moves the entries of document `id` from `old` to `new` in every index
    /// tracking it. `None` on either side means the document does not exist
    /// there.
    ///
    /// Either every index is updated or, on the first failure, every index
    /// is put back as it was and the error is returned.
    pub fn maintain(
        &self,
        id: NitriteId,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> NitriteResult<()> {
        let key = Value::NitriteId(id);
        let mut applied: Vec<AppliedChange> = Vec::new();

        for record in self.index_manager.records() {
            if !record.tracks(&key) {
                continue;
            }

            let fields = record.descriptor.fields();
            let extracted = old
                .map(|doc| FieldValues::extract(id, doc, fields))
                .transpose()
                .and_then(|old_values| {
                    new.map(|doc| FieldValues::extract(id, doc, fields))
                        .transpose()
                        .map(|new_values| (old_values, new_values))
                });
            let (old_values, new_values) = match extracted {
                Ok(values) => values,
                Err(e) => {
                    undo(applied);
                    return Err(e);
                }
            };

            if old_values == new_values {
                continue;
            }

            if let Err(e) = apply(&record, old_values.as_ref(), new_values.as_ref()) {
                undo(applied);
                return Err(e);
            }
            applied.push(AppliedChange {
                record,
                old_values,
                new_values,
            });
        }
        Ok(())
    }
}

fn apply(
    record: &IndexRecord,
    old_values: Option<&FieldValues>,
    new_values: Option<&FieldValues>,
) -> NitriteResult<()> {
    if let Some(old_values) = old_values {
        record.index.remove(old_values)?;
    }

    if let Some(new_values) = new_values {
        if let Err(e) = record.index.write(new_values) {
            if let Some(old_values) = old_values {
                if let Err(restore) = record.index.write(old_values) {
                    log::error!(
                        "Failed to restore entries of {} in {}: {}",
                        old_values.nitrite_id(),
                        record.descriptor,
                        restore
                    );
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

fn undo(applied: Vec<AppliedChange>) {
    for change in applied.into_iter().rev() {
        let restored = apply(
            &change.record,
            change.new_values.as_ref(),
            change.old_values.as_ref(),
        );
        if let Err(e) = restored {
            log::error!("Failed to undo index change in {}: {}", change.record.descriptor, e);
        }
    }
}
