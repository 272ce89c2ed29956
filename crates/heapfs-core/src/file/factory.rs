use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::disk::Disk;
use crate::path::HeapPath;
use crate::time::FileTimeSource;

use super::{Directory, File, FileId, FilePayload, RegularFile, SymbolicLink};

/// Creates files with unique ids and timestamps from the instance clock.
#[derive(Debug)]
pub struct FileFactory {
    next_id: AtomicU64,
    disk: Arc<Disk>,
    time_source: Arc<dyn FileTimeSource>,
}

impl FileFactory {
    pub fn new(disk: Arc<Disk>, time_source: Arc<dyn FileTimeSource>) -> Self {
        Self {
            next_id: AtomicU64::new(0),
            disk,
            time_source,
        }
    }

    pub fn disk(&self) -> &Arc<Disk> {
        &self.disk
    }

    /// Current time from the instance clock.
    pub fn now(&self) -> SystemTime {
        self.time_source.now()
    }

    fn next_id(&self) -> FileId {
        FileId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// A new, empty directory that is its own parent until linked.
    pub fn create_directory(&self) -> Arc<File> {
        let id = self.next_id();
        let now = self.now();
        Arc::new_cyclic(|this| File::new(id, now, FilePayload::Directory(Directory::new(this.clone()))))
    }

    /// A new, empty regular file.
    pub fn create_regular_file(&self) -> Arc<File> {
        let content = RegularFile::new(Arc::clone(&self.disk));
        Arc::new(File::new(self.next_id(), self.now(), FilePayload::Regular(content)))
    }

    /// A new symbolic link to `target`.
    pub fn create_symbolic_link(&self, target: HeapPath) -> Arc<File> {
        let link = SymbolicLink::new(target);
        Arc::new(File::new(self.next_id(), self.now(), FilePayload::SymbolicLink(link)))
    }

    /// Copy `file` without content under a fresh id.
    pub fn copy_without_content(&self, file: &File) -> Arc<File> {
        file.copy_without_content(self.next_id(), self.now())
    }
}
