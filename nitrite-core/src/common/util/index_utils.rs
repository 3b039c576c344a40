use crate::common::{Fields, INDEX_META_PREFIX, INDEX_PREFIX, INTERNAL_NAME_SEPARATOR};
use crate::index::IndexKind;

/// Name of the map holding the entries of one index.
pub(crate) fn derive_index_map_name(collection: &str, fields: &Fields, kind: IndexKind) -> String {
    [INDEX_PREFIX, collection, &fields.encoded_names(), kind.as_str()].join(INTERNAL_NAME_SEPARATOR)
}

/// Key prefix shared by all descriptor records of a collection in the meta map.
pub(crate) fn derive_index_meta_prefix(collection: &str) -> String {
    format!("{}{}{}{}", INDEX_META_PREFIX, INTERNAL_NAME_SEPARATOR, collection, INTERNAL_NAME_SEPARATOR)
}

/// Meta map key of one descriptor record.
pub(crate) fn derive_index_meta_key(collection: &str, fields: &Fields) -> String {
    format!("{}{}", derive_index_meta_prefix(collection), fields.encoded_names())
}
