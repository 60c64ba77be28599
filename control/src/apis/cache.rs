//! Resource caches
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   Apply/Delete    ┌──────────────────────┐
//! │ watch subscription │ ────────────────▶ │ StoreCache<K>        │
//! │ (single writer)    │                   │ reflector::Store<K>  │
//! └────────────────────┘                   │ + synced flag        │
//!                                          └──────────┬───────────┘
//!                                                     │ list()/get()
//!                                          ┌──────────▼───────────┐
//!                                          │ PayloadBuilder       │
//!                                          │ (many readers)       │
//!                                          └──────────────────────┘
//! ```
//!
//! Reads never touch the network. A cache may briefly lag the API server;
//! every pass rebuilds from whatever the cache holds at that moment.

use crate::error::WatcherError;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// Recover a read guard from a poisoned lock
///
/// A panic while holding the lock leaves the map itself intact, so readers
/// keep going after logging the event.
#[inline]
pub(crate) fn safe_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned in resource cache, recovering");
        poisoned.into_inner()
    })
}

#[inline]
pub(crate) fn safe_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("RwLock poisoned in resource cache, recovering");
        poisoned.into_inner()
    })
}

// =============================================================================
// ResourceKind / ObjectKey
// =============================================================================

/// The three watched collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Ingress,
    Service,
    Secret,
}

impl ResourceKind {
    /// Lowercase label used in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Ingress => "ingress",
            ResourceKind::Service => "service",
            ResourceKind::Secret => "secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Ingress => write!(f, "Ingress"),
            ResourceKind::Service => write!(f, "Service"),
            ResourceKind::Secret => write!(f, "Secret"),
        }
    }
}

/// Identity of a namespaced object: (namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[inline]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object as seen by the cache
    pub fn from_resource<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Sort objects by (namespace, name) so passes are reproducible
fn sort_by_key<K: Resource>(objects: &mut [Arc<K>]) {
    objects.sort_by(|a, b| {
        ObjectKey::from_resource(a.as_ref()).cmp(&ObjectKey::from_resource(b.as_ref()))
    });
}

// =============================================================================
// ResourceCache
// =============================================================================

/// Locally queryable mirror of one resource collection
pub trait ResourceCache<K>: Send + Sync {
    /// Current contents, ordered by (namespace, name)
    fn list(&self) -> Result<Vec<Arc<K>>, WatcherError>;

    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>>;

    /// Whether the initial listing has landed; lookups before that are unreliable
    fn is_synced(&self) -> bool {
        true
    }
}

/// Cache backed by a kube-runtime reflector store
///
/// The store is written by exactly one subscription task. `list()` fails
/// until that task has seen the initial listing complete.
pub struct StoreCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    kind: ResourceKind,
    store: Store<K>,
    synced: Arc<AtomicBool>,
}

impl<K> StoreCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    pub fn new(kind: ResourceKind, store: Store<K>) -> Self {
        Self {
            kind,
            store,
            synced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag flipped by the subscription task once the initial list is in
    pub fn synced_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.synced)
    }
}

impl<K> ResourceCache<K> for StoreCache<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn list(&self) -> Result<Vec<Arc<K>>, WatcherError> {
        if !self.is_synced() {
            return Err(WatcherError::CacheNotSynced(self.kind));
        }
        let mut objects = self.store.state();
        sort_by_key(&mut objects);
        Ok(objects)
    }

    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.store.get(&ObjectRef::new(name).within(namespace))
    }

    fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

/// In-memory cache seeded directly by the caller
///
/// Clones share the same underlying map.
pub struct StaticCache<K> {
    inner: Arc<RwLock<HashMap<ObjectKey, Arc<K>>>>,
}

impl<K: Resource> StaticCache<K> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Seed a cache from a list of objects
    pub fn from_objects(objects: impl IntoIterator<Item = K>) -> Self {
        let cache = Self::new();
        for obj in objects {
            cache.insert(obj);
        }
        cache
    }

    /// Insert or replace an object; returns `true` if it was new
    pub fn insert(&self, obj: K) -> bool {
        let key = ObjectKey::from_resource(&obj);
        safe_write(&self.inner).insert(key, Arc::new(obj)).is_none()
    }

    /// Remove an object; returns `true` if it was present
    pub fn remove(&self, namespace: &str, name: &str) -> bool {
        safe_write(&self.inner)
            .remove(&ObjectKey::new(namespace, name))
            .is_some()
    }

    pub fn len(&self) -> usize {
        safe_read(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Resource> Default for StaticCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for StaticCache<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> ResourceCache<K> for StaticCache<K>
where
    K: Resource + Send + Sync,
{
    fn list(&self) -> Result<Vec<Arc<K>>, WatcherError> {
        let mut objects: Vec<Arc<K>> = safe_read(&self.inner).values().cloned().collect();
        sort_by_key(&mut objects);
        Ok(objects)
    }

    fn get(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        safe_read(&self.inner)
            .get(&ObjectKey::new(namespace, name))
            .cloned()
    }
}
