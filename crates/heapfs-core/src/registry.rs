//! Live instances by name, for resolving `heapfs://` URIs.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::Configuration;
use crate::error::{StoreError, StoreResult};
use crate::fs::HeapFileSystem;
use crate::path::{HeapPath, URI_SCHEME};

/// Tracks instances without keeping them alive.
///
/// An instance drops out of the registry once the last `Arc` to it is gone.
#[derive(Debug, Default)]
pub struct FileSystemRegistry {
    instances: DashMap<String, Weak<HeapFileSystem>>,
}

impl FileSystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register an instance with a random name.
    pub fn create(&self, config: Configuration) -> StoreResult<Arc<HeapFileSystem>> {
        let fs = Arc::new(HeapFileSystem::new(config)?);
        self.prune();
        self.instances
            .insert(fs.name().to_string(), Arc::downgrade(&fs));
        Ok(fs)
    }

    /// Create and register an instance under `name`.
    ///
    /// Fails with `AlreadyExists` while another live instance holds the name.
    pub fn create_named(
        &self,
        name: &str,
        config: Configuration,
    ) -> StoreResult<Arc<HeapFileSystem>> {
        let fs = Arc::new(HeapFileSystem::with_name(name, config)?);
        self.prune();
        match self.instances.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().strong_count() > 0 {
                    return Err(StoreError::already_exists(format!(
                        "{URI_SCHEME}://{name}"
                    )));
                }
                entry.insert(Arc::downgrade(&fs));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(&fs));
            }
        }
        Ok(fs)
    }

    /// The live instance named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<HeapFileSystem>> {
        let upgraded = self.instances.get(name).map(|weak| weak.upgrade());
        match upgraded {
            Some(Some(fs)) => Some(fs),
            Some(None) => {
                self.instances
                    .remove_if(name, |_, weak| weak.strong_count() == 0);
                None
            }
            None => None,
        }
    }

    /// Forget `name`; returns whether it was registered.
    pub fn remove(&self, name: &str) -> bool {
        self.instances.remove(name).is_some()
    }

    /// Names of live instances, sorted.
    pub fn names(&self) -> Vec<String> {
        self.prune();
        let mut names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered entries, dead or alive.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Drop entries whose instance is gone.
    fn prune(&self) {
        self.instances.retain(|_, weak| weak.strong_count() > 0);
    }

    /// The instance and path named by a `heapfs://` URI.
    pub fn resolve_uri(&self, uri: &str) -> StoreResult<(Arc<HeapFileSystem>, HeapPath)> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| {
                StoreError::invalid_argument(format!(
                    "URI {uri:?} does not use the {URI_SCHEME} scheme"
                ))
            })?;
        let authority = rest.split('/').next().unwrap_or_default();
        let fs = self
            .get(authority)
            .ok_or_else(|| StoreError::not_found(format!("{URI_SCHEME}://{authority}")))?;
        let path = fs.parse_uri(uri)?;
        Ok((fs, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uri() {
        let registry = FileSystemRegistry::new();
        let fs = registry.create_named("alpha", Configuration::unix()).unwrap();

        let (found, path) = registry.resolve_uri("heapfs://alpha/work/notes").unwrap();
        assert!(Arc::ptr_eq(&found, &fs));
        assert_eq!(path.to_string(), "/work/notes");

        assert!(matches!(
            registry.resolve_uri("heapfs://beta/work"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            registry.resolve_uri("file:///work"),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_names_are_exclusive_while_alive() {
        let registry = FileSystemRegistry::new();
        let fs = registry.create_named("alpha", Configuration::unix()).unwrap();
        assert!(matches!(
            registry.create_named("alpha", Configuration::unix()),
            Err(StoreError::AlreadyExists(_))
        ));

        drop(fs);
        assert!(registry.get("alpha").is_none());
        let again = registry.create_named("alpha", Configuration::unix()).unwrap();
        assert_eq!(registry.names(), vec!["alpha".to_string()]);
        assert!(registry.remove("alpha"));
        drop(again);
    }

    #[test]
    fn test_dropped_instances_are_pruned_on_create() {
        let registry = FileSystemRegistry::new();
        for _ in 0..20 {
            drop(registry.create(Configuration::unix()).unwrap());
        }
        assert_eq!(registry.len(), 1);

        let named = registry.create_named("kept", Configuration::unix()).unwrap();
        assert_eq!(registry.len(), 1);
        for _ in 0..5 {
            drop(registry.create(Configuration::unix()).unwrap());
        }
        assert_eq!(registry.len(), 2);
        assert!(registry.get("kept").is_some_and(|fs| Arc::ptr_eq(&fs, &named)));
    }

    #[test]
    fn test_random_names() {
        let registry = FileSystemRegistry::new();
        let a = registry.create(Configuration::unix()).unwrap();
        let b = registry.create(Configuration::unix()).unwrap();
        assert_ne!(a.name(), b.name());
        assert_eq!(registry.names().len(), 2);
    }
}
