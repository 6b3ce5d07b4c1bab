use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::mapping::ColumnMapping;
use crate::util::fold_header;

/// Mappings confirmed for earlier documents, keyed by header signature.
///
/// Owned by the caller; the pipeline only reads from it and writes through
/// [`crate::ImportSession`] once a mapping has been confirmed.
pub trait MappingHistory {
    fn recall(&self, signature: &str) -> Option<ColumnMapping>;
    fn remember(&mut self, signature: &str, mapping: ColumnMapping);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryMappingHistory {
    entries: HashMap<String, ColumnMapping>,
}

impl InMemoryMappingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MappingHistory for InMemoryMappingHistory {
    fn recall(&self, signature: &str) -> Option<ColumnMapping> {
        self.entries.get(signature).cloned()
    }

    fn remember(&mut self, signature: &str, mapping: ColumnMapping) {
        self.entries.insert(signature.to_string(), mapping);
    }
}

/// Lowercase hex SHA-256 over the folded header cells.
///
/// Case, punctuation and spacing differences do not change the signature;
/// column order does.
pub fn header_signature(header: &[String]) -> String {
    let mut hasher = Sha256::new();
    for cell in header {
        hasher.update(fold_header(cell).as_bytes());
        hasher.update([0x1f]);
    }
    let hash: [u8; 32] = hasher.finalize().into();
    to_hex(&hash)
}

/// Lowercase hex SHA-256 of raw bytes.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let hash: [u8; 32] = hasher.finalize().into();
    to_hex(&hash)
}

fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}
