use redb::TableDefinition;

/// File records: file id -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Object key index: object key -> file id (uniqueness of stored blobs)
pub const OBJECT_KEYS: TableDefinition<&str, &str> = TableDefinition::new("object_keys");

/// Public key index: public key -> file id (for anonymous download lookups)
pub const PUBLIC_KEYS: TableDefinition<&str, &str> = TableDefinition::new("public_keys");

/// Owner index: owner id -> msgpack Vec of file ids
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");
