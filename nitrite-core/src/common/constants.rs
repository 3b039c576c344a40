// Reserved document fields
pub const DOC_ID: &str = "_id";
pub const DOC_REVISION: &str = "_revision";
pub const DOC_MODIFIED: &str = "_modified";
pub const DOC_SOURCE: &str = "_source";
pub const RESERVED_FIELDS: [&str; 4] = [DOC_ID, DOC_REVISION, DOC_MODIFIED, DOC_SOURCE];

/// Source tag carried by replicated writes; such documents keep their own metadata.
pub const REPLICATOR: &str = "Replicator.NO\u{2082}";

pub const DEFAULT_FIELD_SEPARATOR: &str = ".";

// Attribute keys
pub const CREATED_TIME: &str = "created_at";
pub const LAST_MODIFIED_TIME: &str = "last_modified_at";
pub const OWNER: &str = "owner";
pub const UNIQUE_ID: &str = "uuid";

// Store layout
pub const RESERVED_NAME_PREFIX: &str = "$nitrite";
pub const META_MAP_NAME: &str = "$nitrite_meta_map";
pub const INDEX_PREFIX: &str = "$nitrite_index";
pub const INDEX_META_PREFIX: &str = "$nitrite_index_meta";
pub const INTERNAL_NAME_SEPARATOR: &str = "|";

// Index kinds
pub const UNIQUE_INDEX: &str = "unique";
pub const NON_UNIQUE_INDEX: &str = "non-unique";
pub const FULL_TEXT_INDEX: &str = "full-text";

// Index descriptor document keys
pub const TAG_COLLECTION: &str = "collection";
pub const TAG_FIELDS: &str = "fields";
pub const TAG_INDEX_KIND: &str = "kind";
pub const TAG_INDEX_STATE: &str = "state";

pub const DEFAULT_BACKFILL_BATCH_SIZE: usize = 512;
pub const EXECUTOR_THREAD_PREFIX: &str = "nitrite-worker";
