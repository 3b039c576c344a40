use crate::collection::NitriteId;

/// The ids a write operation affected, in the order it touched them.
///
/// # Examples
///
/// ```rust,ignore
/// let result = collection.insert(doc! { name: "Alice" })?;
/// for id in result.affected_nitrite_ids() {
///     println!("Inserted document with ID: {}", id);
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteResult {
    nitrite_ids: Vec<NitriteId>,
}

impl WriteResult {
    pub fn new(nitrite_ids: Vec<NitriteId>) -> Self {
        Self { nitrite_ids }
    }

    pub fn affected_nitrite_ids(&self) -> &[NitriteId] {
        &self.nitrite_ids
    }

    pub fn affected_count(&self) -> usize {
        self.nitrite_ids.len()
    }

    /// The first affected id, if any. Handy for single-document writes.
    pub fn first(&self) -> Option<NitriteId> {
        self.nitrite_ids.first().copied()
    }

    pub(crate) fn extend(&mut self, other: WriteResult) {
        self.nitrite_ids.extend(other.nitrite_ids);
    }
}

impl IntoIterator for WriteResult {
    type Item = NitriteId;
    type IntoIter = std::vec::IntoIter<NitriteId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nitrite_ids.into_iter()
    }
}
