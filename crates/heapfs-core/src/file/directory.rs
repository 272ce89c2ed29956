//! Directory: a name-to-file table with a parent back-reference.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::path::Name;

use super::File;

/// One named entry in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// The name as it was linked, display form preserved.
    pub name: Name,
    pub file: Arc<File>,
}

/// Directory contents.
///
/// Entries are keyed by [`Name`], whose identity is its canonical form, so
/// `FOO` and `foo` collide whenever their canonical forms do. Iteration
/// follows insertion order.
#[derive(Debug)]
pub struct Directory {
    entries: RwLock<IndexMap<Name, Arc<File>>>,
    /// The `File` that owns this directory.
    this: Weak<File>,
    /// The parent directory's `File`; a root points at itself.
    parent: RwLock<Weak<File>>,
}

impl Directory {
    /// Create a directory owned by `this`, initially its own parent.
    pub(crate) fn new(this: Weak<File>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            parent: RwLock::new(this.clone()),
            this,
        }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &Name) -> Option<Arc<File>> {
        self.entries.read().get(name).cloned()
    }

    /// Look up an entry, returning the name as it was linked.
    pub fn get_entry(&self, name: &Name) -> Option<DirectoryEntry> {
        self.entries
            .read()
            .get_key_value(name)
            .map(|(name, file)| DirectoryEntry {
                name: name.clone(),
                file: Arc::clone(file),
            })
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<DirectoryEntry> {
        self.entries
            .read()
            .iter()
            .map(|(name, file)| DirectoryEntry {
                name: name.clone(),
                file: Arc::clone(file),
            })
            .collect()
    }

    /// Snapshot of entry names in insertion order.
    pub fn names(&self) -> Vec<Name> {
        self.entries.read().keys().cloned().collect()
    }

    /// The parent directory; a root returns itself.
    pub fn parent(&self) -> Option<Arc<File>> {
        self.parent.read().upgrade()
    }

    /// The file owning this directory.
    pub fn this(&self) -> Option<Arc<File>> {
        self.this.upgrade()
    }

    /// True if this directory is its own parent.
    pub fn is_root(&self) -> bool {
        Weak::ptr_eq(&self.parent.read(), &self.this)
    }

    /// Link `file` under `name`, incrementing its link count.
    ///
    /// A linked directory gets this directory as its parent.
    pub fn link(&self, name: Name, file: Arc<File>) -> StoreResult<()> {
        if name.is_special() || name.is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "cannot link an entry named {name:?}"
            )));
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(StoreError::already_exists(name.to_string()));
        }
        if let Some(dir) = file.as_directory() {
            *dir.parent.write() = self.this.clone();
        }
        let links = file.increment_link_count();
        tracing::trace!(name = %name, file = %file.id(), links, "linked entry");
        entries.insert(name, file);
        Ok(())
    }

    /// Remove the entry for `name`, decrementing its link count.
    ///
    /// A file left with no links is marked deleted.
    pub fn unlink(&self, name: &Name) -> StoreResult<Arc<File>> {
        let file = self
            .entries
            .write()
            .shift_remove(name)
            .ok_or_else(|| StoreError::not_found(name.to_string()))?;
        let links = file.decrement_link_count();
        tracing::trace!(name = %name, file = %file.id(), links, "unlinked entry");
        if links == 0 {
            file.deleted();
        }
        Ok(file)
    }
}
