//! Revocable image handles.
//!
//! Image bytes extracted from a book are parked in a [`ResourceRegistry`] and
//! referenced by lightweight [`ImageHandle`]s, the way a browser hands out
//! `blob:` URLs. Eviction and `clear()` in the chapter cache are the only
//! release points; `revoke` reports `true` exactly once per handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Reference to image bytes held by a [`ResourceRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle {
    id: u64,
    media_type: Arc<str>,
}

impl ImageHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Renderer-facing URL for this handle.
    pub fn url(&self) -> String {
        format!("blob:layerbook/{}", self.id)
    }
}

/// Shared store of live image resources.
///
/// Cloning the registry yields another view of the same store.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Arc<[u8]>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `data` and hand out a handle to it.
    pub fn mint(&self, data: Vec<u8>, media_type: impl Into<Arc<str>>) -> ImageHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.live().insert(id, Arc::from(data));
        ImageHandle {
            id,
            media_type: media_type.into(),
        }
    }

    /// Bytes behind a handle, or `None` once it has been revoked.
    pub fn resolve(&self, handle: &ImageHandle) -> Option<Arc<[u8]>> {
        self.live().get(&handle.id).cloned()
    }

    /// Release a handle's bytes. Returns `false` if it was already released.
    pub fn revoke(&self, handle: &ImageHandle) -> bool {
        self.live().remove(&handle.id).is_some()
    }

    pub fn is_live(&self, handle: &ImageHandle) -> bool {
        self.live().contains_key(&handle.id)
    }

    /// Number of handles not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<u64, Arc<[u8]>>> {
        self.inner
            .live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
