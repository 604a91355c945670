use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::compiler::CompileOptions;
use crate::ir::CompilationResult;

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `(sha256(raw text), sha256(options json))`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: String,
    pub options_hash: String,
}

impl CacheKey {
    pub fn new(raw_text: &str, options: &CompileOptions) -> Self {
        Self {
            content_hash: compute_hash(raw_text),
            options_hash: options.fingerprint(),
        }
    }
}

/// Compilation results shared between callers.
///
/// Holds at most one result per key; concurrent writers for the same key
/// overwrite each other, which is harmless because compilation is
/// deterministic for identical input.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: DashMap<CacheKey, Arc<CompilationResult>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CompilationResult>> {
        let hit = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        if hit.is_some() {
            tracing::trace!(content_hash = %key.content_hash, "result cache hit");
        }
        hit
    }

    pub fn set(&self, key: CacheKey, result: Arc<CompilationResult>) {
        self.entries.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
