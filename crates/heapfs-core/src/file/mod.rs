//! Files: the nodes of the directory graph.
//!
//! Every node is a [`File`] carrying the fields all variants share (id,
//! timestamps, link count, attribute bag) plus a [`FilePayload`] holding the
//! variant-specific state. Files are shared as `Arc<File>` between the
//! directories that link them and any open handles.
//!
//! ## Design Decisions
//!
//! - **Closed variant set**: regular files, directories and symbolic links
//!   are an enum, not a trait, since nothing outside the crate adds kinds.
//! - **Link count on the file**: hard links are just more directory entries
//!   pointing at the same `Arc<File>`.
//! - **Deletion is deferred**: dropping the last link marks a regular file
//!   deleted; its blocks go back to the disk once no handle has it open.

mod directory;
mod factory;
mod regular;
mod symlink;

pub use directory::{Directory, DirectoryEntry};
pub use factory::FileFactory;
pub use regular::RegularFile;
pub use symlink::SymbolicLink;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::attribute::AttributeValue;

/// Unique identifier of a file within one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum FileKind {
    Regular,
    Directory,
    SymbolicLink,
}

/// Creation, modification and access times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    pub creation: SystemTime,
    pub last_modified: SystemTime,
    pub last_access: SystemTime,
}

impl FileTimes {
    /// All three times set to `now`.
    pub fn at(now: SystemTime) -> Self {
        Self {
            creation: now,
            last_modified: now,
            last_access: now,
        }
    }
}

/// Variant-specific state.
#[derive(Debug)]
pub enum FilePayload {
    Regular(RegularFile),
    Directory(Directory),
    SymbolicLink(SymbolicLink),
}

type AttributeBag = HashMap<String, HashMap<String, AttributeValue>>;

/// A node in the file graph.
pub struct File {
    id: FileId,
    times: Mutex<FileTimes>,
    links: AtomicU32,
    attributes: RwLock<AttributeBag>,
    payload: FilePayload,
}

impl File {
    pub(crate) fn new(id: FileId, now: SystemTime, payload: FilePayload) -> Self {
        Self {
            id,
            times: Mutex::new(FileTimes::at(now)),
            links: AtomicU32::new(0),
            attributes: RwLock::new(HashMap::new()),
            payload,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn kind(&self) -> FileKind {
        match self.payload {
            FilePayload::Regular(_) => FileKind::Regular,
            FilePayload::Directory(_) => FileKind::Directory,
            FilePayload::SymbolicLink(_) => FileKind::SymbolicLink,
        }
    }

    pub fn payload(&self) -> &FilePayload {
        &self.payload
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self.payload, FilePayload::Regular(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.payload, FilePayload::Directory(_))
    }

    pub fn is_symbolic_link(&self) -> bool {
        matches!(self.payload, FilePayload::SymbolicLink(_))
    }

    pub fn as_regular(&self) -> Option<&RegularFile> {
        match &self.payload {
            FilePayload::Regular(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_directory(&self) -> Option<&Directory> {
        match &self.payload {
            FilePayload::Directory(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_symbolic_link(&self) -> Option<&SymbolicLink> {
        match &self.payload {
            FilePayload::SymbolicLink(s) => Some(s),
            _ => None,
        }
    }

    /// Size in bytes: content length for regular files, 0 otherwise.
    pub fn size(&self) -> u64 {
        match &self.payload {
            FilePayload::Regular(r) => r.size(),
            _ => 0,
        }
    }

    /// Number of directory entries referring to this file.
    pub fn links(&self) -> u32 {
        self.links.load(Ordering::Acquire)
    }

    pub(crate) fn increment_link_count(&self) -> u32 {
        self.links.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn decrement_link_count(&self) -> u32 {
        let previous = self
            .links
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    pub fn times(&self) -> FileTimes {
        *self.times.lock()
    }

    pub fn creation_time(&self) -> SystemTime {
        self.times.lock().creation
    }

    pub fn last_modified_time(&self) -> SystemTime {
        self.times.lock().last_modified
    }

    pub fn last_access_time(&self) -> SystemTime {
        self.times.lock().last_access
    }

    pub fn set_creation_time(&self, t: SystemTime) {
        self.times.lock().creation = t;
    }

    pub fn set_last_modified_time(&self, t: SystemTime) {
        self.times.lock().last_modified = t;
    }

    pub fn set_last_access_time(&self, t: SystemTime) {
        self.times.lock().last_access = t;
    }

    /// Record a handle opening on this file.
    pub fn opened(&self) {
        if let FilePayload::Regular(r) = &self.payload {
            r.opened();
        }
    }

    /// Record a handle closing on this file.
    pub fn closed(&self) {
        if let FilePayload::Regular(r) = &self.payload {
            r.closed();
        }
    }

    /// Called when a link to this file is removed.
    ///
    /// Only takes effect once no links remain.
    pub fn deleted(&self) {
        if self.links() > 0 {
            return;
        }
        if let FilePayload::Regular(r) = &self.payload {
            r.deleted();
        }
    }

    /// Read one attribute from the bag.
    pub fn get_attribute(&self, view: &str, attribute: &str) -> Option<AttributeValue> {
        self.attributes
            .read()
            .get(view)
            .and_then(|attrs| attrs.get(attribute))
            .cloned()
    }

    /// Store one attribute in the bag.
    pub fn set_attribute(&self, view: &str, attribute: &str, value: AttributeValue) {
        self.attributes
            .write()
            .entry(view.to_string())
            .or_default()
            .insert(attribute.to_string(), value);
    }

    /// Remove one attribute from the bag.
    pub fn delete_attribute(&self, view: &str, attribute: &str) -> Option<AttributeValue> {
        let mut bag = self.attributes.write();
        let attrs = bag.get_mut(view)?;
        let removed = attrs.remove(attribute);
        if attrs.is_empty() {
            bag.remove(view);
        }
        removed
    }

    /// Names of the attributes stored for a view, sorted.
    pub fn attribute_names(&self, view: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .attributes
            .read()
            .get(view)
            .map(|attrs| attrs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Replace this file's attribute bag with a copy of `other`'s.
    pub fn copy_attributes_from(&self, other: &File) {
        let bag = other.attributes.read().clone();
        *self.attributes.write() = bag;
    }

    /// Copy timestamps from `other`.
    pub fn copy_times_from(&self, other: &File) {
        let times = other.times();
        *self.times.lock() = times;
    }

    /// A new file of the same kind with no content, no links and a copy of
    /// this file's attribute bag.
    ///
    /// Regular files get an empty block list on the same disk; directories
    /// start empty; symbolic links keep their target.
    pub fn copy_without_content(&self, id: FileId, now: SystemTime) -> Arc<File> {
        let copy = match &self.payload {
            FilePayload::Regular(r) => Arc::new(File::new(
                id,
                now,
                FilePayload::Regular(r.copy_without_content()),
            )),
            FilePayload::SymbolicLink(s) => Arc::new(File::new(
                id,
                now,
                FilePayload::SymbolicLink(s.clone()),
            )),
            FilePayload::Directory(_) => Arc::new_cyclic(|this| {
                File::new(id, now, FilePayload::Directory(Directory::new(this.clone())))
            }),
        };
        copy.copy_attributes_from(self);
        copy
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("links", &self.links())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::Disk;
    use crate::time::{FakeTimeSource, FileTimeSource};
    use std::time::Duration;

    fn regular(id: u64, clock: &FakeTimeSource) -> File {
        let disk = Arc::new(Disk::new(4, 64, 64).unwrap());
        File::new(
            FileId(id),
            clock.now(),
            FilePayload::Regular(RegularFile::new(disk)),
        )
    }

    #[test]
    fn test_kind_and_accessors() {
        let clock = FakeTimeSource::new();
        let file = regular(1, &clock);
        assert_eq!(file.kind(), FileKind::Regular);
        assert_eq!(file.kind().to_string(), "regular");
        assert!(file.is_regular_file());
        assert!(file.as_directory().is_none());
        assert_eq!(file.id().to_string(), "1");
    }

    #[test]
    fn test_deleted_waits_for_last_link() {
        let clock = FakeTimeSource::new();
        let file = regular(1, &clock);
        let content = file.as_regular().unwrap();
        content.write(0, b"data").unwrap();

        file.increment_link_count();
        file.increment_link_count();
        assert_eq!(file.decrement_link_count(), 1);
        file.deleted();
        assert!(!content.is_deleted());

        assert_eq!(file.decrement_link_count(), 0);
        file.deleted();
        assert!(content.is_deleted());
        assert_eq!(content.size(), 0);
        assert_eq!(file.decrement_link_count(), 0);
    }

    #[test]
    fn test_times() {
        let clock = FakeTimeSource::new();
        let file = regular(1, &clock);
        let start = clock.now();
        assert_eq!(file.times(), FileTimes::at(start));

        clock.advance(Duration::from_secs(3));
        file.set_last_modified_time(clock.now());
        assert_eq!(file.creation_time(), start);
        assert_eq!(file.last_modified_time(), start + Duration::from_secs(3));
    }

    #[test]
    fn test_attribute_bag() {
        let clock = FakeTimeSource::new();
        let file = regular(1, &clock);
        file.set_attribute("dos", "hidden", AttributeValue::Bool(true));
        file.set_attribute("dos", "archive", AttributeValue::Bool(false));
        assert_eq!(
            file.get_attribute("dos", "hidden"),
            Some(AttributeValue::Bool(true))
        );
        assert_eq!(file.attribute_names("dos"), vec!["archive", "hidden"]);

        assert!(file.delete_attribute("dos", "hidden").is_some());
        assert!(file.delete_attribute("dos", "archive").is_some());
        assert!(file.attribute_names("dos").is_empty());
        assert!(file.delete_attribute("dos", "archive").is_none());
    }

    #[test]
    fn test_copy_without_content() {
        let clock = FakeTimeSource::new();
        let file = regular(1, &clock);
        file.as_regular().unwrap().write(0, b"abc").unwrap();
        file.set_attribute("owner", "owner", AttributeValue::Text("alice".into()));
        file.increment_link_count();

        clock.advance(Duration::from_secs(10));
        let copy = file.copy_without_content(FileId(2), clock.now());
        assert_eq!(copy.id(), FileId(2));
        assert_eq!(copy.size(), 0);
        assert_eq!(copy.links(), 0);
        assert_eq!(copy.creation_time(), clock.now());
        assert_eq!(
            copy.get_attribute("owner", "owner"),
            Some(AttributeValue::Text("alice".into()))
        );
    }
}
