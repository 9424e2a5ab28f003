//! Process-wide cache of body serializers.
//!
//! Serializers are keyed by serializer kind, body type and root element
//! name/namespace. Lookups take a shared read lock; a miss re-checks under an
//! upgradable lock and only then upgrades to insert, so concurrent hits never
//! wait on each other and population is serialized.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::payload::serializer::{RawXmlSerializer, RootName, SerializerKind, XmlBodySerializer};

/// Cache key: (kind, target type, root name, root namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializerKey {
    kind: SerializerKind,
    type_id: TypeId,
    root_name: String,
    root_namespace: Option<String>,
}

impl SerializerKey {
    pub fn new<T: 'static>(kind: SerializerKind, root: &RootName) -> Self {
        Self {
            kind,
            type_id: TypeId::of::<T>(),
            root_name: root.local_name().to_string(),
            root_namespace: root.namespace().map(str::to_string),
        }
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Thread-safe serializer cache.
#[derive(Default)]
pub struct SerializerCache {
    entries: RwLock<HashMap<SerializerKey, Entry>>,
}

impl SerializerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every payload in the process.
    pub fn global() -> &'static SerializerCache {
        static GLOBAL: OnceLock<SerializerCache> = OnceLock::new();
        GLOBAL.get_or_init(SerializerCache::new)
    }

    /// Returns the cached value for `key`, creating it with `create` on a miss.
    ///
    /// An entry stored under the same key with a different type is replaced.
    pub fn get_or_insert_with<S, F>(&self, key: SerializerKey, create: F) -> Arc<S>
    where
        S: Send + Sync + 'static,
        F: FnOnce() -> S,
    {
        if let Some(found) = Self::lookup::<S>(&self.entries.read(), &key) {
            return found;
        }

        let entries = self.entries.upgradable_read();
        if let Some(found) = Self::lookup::<S>(&entries, &key) {
            return found;
        }
        let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
        let created = Arc::new(create());
        debug!(
            kind = ?key.kind,
            root = %key.root_name,
            "Caching body serializer"
        );
        entries.insert(key, created.clone() as Entry);
        created
    }

    fn lookup<S: Send + Sync + 'static>(
        entries: &HashMap<SerializerKey, Entry>,
        key: &SerializerKey,
    ) -> Option<Arc<S>> {
        entries
            .get(key)
            .and_then(|entry| entry.clone().downcast::<S>().ok())
    }

    /// The serde serializer for `T` under `root`.
    pub fn xml<T>(&self, root: &RootName) -> Arc<XmlBodySerializer<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let key = SerializerKey::new::<T>(SerializerKind::Xml, root);
        self.get_or_insert_with(key, || XmlBodySerializer::<T>::new(root.clone()))
    }

    /// The raw XML serializer for `root`.
    pub fn raw(&self, root: &RootName) -> Arc<RawXmlSerializer> {
        let key = SerializerKey::new::<crate::xml::XmlElement>(SerializerKind::Raw, root);
        self.get_or_insert_with(key, || RawXmlSerializer::new(root.clone()))
    }

    /// Number of cached serializers.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for SerializerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_same_key_shares_serializer() {
        let cache = SerializerCache::new();
        let a = cache.xml::<i32>(&RootName::new("value"));
        let b = cache.xml::<i32>(&RootName::new("value"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_distinguishes_type_root_and_namespace() {
        let cache = SerializerCache::new();
        cache.xml::<i32>(&RootName::new("value"));
        cache.xml::<i64>(&RootName::new("value"));
        cache.xml::<i32>(&RootName::new("count"));
        cache.xml::<i32>(&RootName::with_namespace("value", "urn:hl7-org:v3"));
        cache.raw(&RootName::new("value"));
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_concurrent_lookups_populate_once() {
        let cache = Arc::new(SerializerCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.xml::<String>(&RootName::new("text")))
            })
            .collect();
        let serializers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        assert!(serializers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
