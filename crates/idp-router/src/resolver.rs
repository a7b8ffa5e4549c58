//! Content resolution: produces document bytes from inline message payloads or
//! an object store, trying each configured resolver in order until one
//! succeeds. A resolver returning `None` or erroring is "not found here", not
//! a routing failure.

use crate::mime::extract_inline_bytes;
use crate::model::DocumentDescriptor;
use async_trait::async_trait;

/// Default range-get size for the object-store resolver: the first 20 MiB.
pub const DEFAULT_RANGE_BYTES: usize = 20 * 1024 * 1024;

/// Produces raw document bytes for a descriptor, or `None` if this resolver
/// has nothing to offer for it.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn fetch(&self, descriptor: &DocumentDescriptor) -> Option<Vec<u8>>;
}

/// Retrieves base64-encoded or raw inline payloads embedded in the message body.
#[derive(Debug, Default)]
pub struct InlineContentResolver;

#[async_trait]
impl ContentResolver for InlineContentResolver {
    async fn fetch(&self, descriptor: &DocumentDescriptor) -> Option<Vec<u8>> {
        extract_inline_bytes(&descriptor.body)
    }
}

/// Capability trait for an object-store range-get. No production backend is
/// shipped in this crate (per Non-goals); wire a real client by implementing
/// this trait. Missing objects must be tolerated: return `None`, never error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_range(&self, bucket: &str, key: &str, max_bytes: usize) -> Option<Vec<u8>>;
}

/// A null-object [`ObjectStore`] that never has anything to offer. Used when
/// no object-store backend has been wired at construction time.
#[derive(Debug, Default)]
pub struct NullObjectStore;

#[async_trait]
impl ObjectStore for NullObjectStore {
    async fn get_range(&self, _bucket: &str, _key: &str, _max_bytes: usize) -> Option<Vec<u8>> {
        None
    }
}

/// Resolves document content by range-getting `(bucket, object_key)` from a
/// configured [`ObjectStore`], bounded to [`DEFAULT_RANGE_BYTES`].
pub struct ObjectStoreContentResolver {
    store: Box<dyn ObjectStore>,
    max_bytes: usize,
}

impl ObjectStoreContentResolver {
    #[must_use]
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self {
            store,
            max_bytes: DEFAULT_RANGE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl ContentResolver for ObjectStoreContentResolver {
    async fn fetch(&self, descriptor: &DocumentDescriptor) -> Option<Vec<u8>> {
        let bucket = descriptor.bucket.as_deref()?;
        if bucket.is_empty() || descriptor.object_key.is_empty() {
            return None;
        }
        self.store.get_range(bucket, &descriptor.object_key, self.max_bytes).await
    }
}

/// Tries each resolver in order; the first to return `Some` wins. A resolver
/// panic is not caught here (panics indicate a programming error, not "not
/// found"); resolvers are expected to return `None` for ordinary misses.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn ContentResolver>>,
}

impl ResolverChain {
    #[must_use]
    pub fn new(resolvers: Vec<Box<dyn ContentResolver>>) -> Self {
        Self { resolvers }
    }

    /// The default chain: inline content only, matching the reference
    /// implementation's default when no resolvers are supplied.
    #[must_use]
    pub fn with_inline_default() -> Self {
        Self::new(vec![Box::new(InlineContentResolver)])
    }

    pub async fn resolve(&self, descriptor: &DocumentDescriptor) -> Option<Vec<u8>> {
        for resolver in &self.resolvers {
            if let Some(content) = resolver.fetch(descriptor).await {
                return Some(content);
            }
        }
        log::debug!("no content resolver produced bytes for {}", descriptor.object_key);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn descriptor(body: Value) -> DocumentDescriptor {
        DocumentDescriptor {
            object_key: "k".into(),
            bucket: Some("b".into()),
            body,
            mime_type: "application/octet-stream".into(),
            request_override: None,
        }
    }

    #[tokio::test]
    async fn inline_resolver_decodes_base64_payload() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"hello");
        let d = descriptor(json!({"documentBytes": encoded}));
        let resolved = InlineContentResolver.fetch(&d).await;
        assert_eq!(resolved.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn chain_falls_through_to_next_resolver() {
        struct Empty;
        #[async_trait]
        impl ContentResolver for Empty {
            async fn fetch(&self, _descriptor: &DocumentDescriptor) -> Option<Vec<u8>> {
                None
            }
        }
        let chain = ResolverChain::new(vec![Box::new(Empty), Box::new(InlineContentResolver)]);
        let d = descriptor(json!({"payload": "raw-text"}));
        let resolved = chain.resolve(&d).await;
        assert_eq!(resolved.as_deref(), Some(&b"raw-text"[..]));
    }

    #[tokio::test]
    async fn null_object_store_always_misses() {
        let resolver = ObjectStoreContentResolver::new(Box::new(NullObjectStore));
        let d = descriptor(json!({}));
        assert!(resolver.fetch(&d).await.is_none());
    }
}
