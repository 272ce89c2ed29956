//! A live file-system instance.
//!
//! [`HeapFileSystem`] wires a [`Configuration`] into the pieces that do the
//! work: one [`Disk`], one [`PathService`], a [`FileFactory`], an
//! [`AttributeService`] and the [`FileTree`] of roots. The working
//! directory and its ancestors are created up front.
//!
//! ## Locking
//!
//! Tree mutations (create, link, unlink, copy, rename) hold the instance
//! lock for writing; lookups hold it for reading. File content is guarded
//! by each file's own lock, so open handles never touch the instance lock.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{IoSlice, IoSliceMut, Read, Write};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::attribute::{AttributeService, AttributeValue};
use crate::config::{Configuration, Feature};
use crate::disk::{Disk, DiskStats};
use crate::error::{StoreError, StoreResult};
use crate::file::{DirectoryEntry, File, FileFactory, FilePayload, RegularFile};
use crate::path::{HeapPath, PathMatcher, PathService};
use crate::time::FileTimeSource;
use crate::tree::{FileTree, LinkHandling, LookupResult};

/// Options for [`HeapFileSystem::copy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing target (an empty directory or any other file).
    pub replace_existing: bool,
    /// Carry the source's attributes and timestamps to the copy.
    pub copy_attributes: bool,
    /// Copy a symbolic link itself instead of the file it points to.
    pub no_follow_links: bool,
}

/// An in-memory file system.
pub struct HeapFileSystem {
    name: String,
    config: Configuration,
    disk: Arc<Disk>,
    paths: Arc<PathService>,
    factory: FileFactory,
    attributes: AttributeService,
    tree: FileTree,
    working_directory: HeapPath,
    working_directory_file: Arc<File>,
    lock: RwLock<()>,
}

impl fmt::Debug for HeapFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapFileSystem")
            .field("name", &self.name)
            .field("roots", &self.config.roots())
            .field("working_directory", &self.config.working_directory())
            .finish_non_exhaustive()
    }
}

impl HeapFileSystem {
    /// Create an instance with a random (UUID v4) name.
    pub fn new(config: Configuration) -> StoreResult<Self> {
        Self::with_name(Uuid::new_v4().to_string(), config)
    }

    /// Create an instance with the given name, used as its URI authority.
    pub fn with_name(name: impl Into<String>, config: Configuration) -> StoreResult<Self> {
        let name = name.into();
        let disk = Arc::new(config.create_disk()?);
        let paths = Arc::new(config.create_path_service().with_authority(name.clone()));
        let factory = FileFactory::new(Arc::clone(&disk), Arc::clone(config.time_source()));
        let attributes =
            AttributeService::new(config.attribute_views(), config.default_attribute_values())?;

        let mut roots = IndexMap::new();
        for root in config.roots() {
            let path = paths.parse_path(root, &[])?;
            let root_name = path
                .root_name()
                .cloned()
                .ok_or_else(|| StoreError::invalid_argument(format!("invalid root: {root:?}")))?;
            if roots.contains_key(&root_name) {
                return Err(StoreError::invalid_argument(format!(
                    "duplicate root: {root:?}"
                )));
            }
            let dir = factory.create_directory();
            attributes.set_initial_attributes(&dir, &[])?;
            roots.insert(root_name, dir);
        }
        let tree = FileTree::new(roots);

        let working_directory = paths.parse_path(config.working_directory(), &[])?.normalize();
        let working_directory_file =
            create_directories(&tree, &factory, &attributes, &working_directory)?;

        tracing::info!(
            name = %name,
            roots = ?config.roots(),
            working_directory = %working_directory,
            block_size = config.block_size(),
            max_size = config.max_size(),
            "created heap file system"
        );

        Ok(Self {
            name,
            config,
            disk,
            paths,
            factory,
            attributes,
            tree,
            working_directory,
            working_directory_file,
            lock: RwLock::new(()),
        })
    }

    /// Instance name; the authority of its URIs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn path_service(&self) -> &Arc<PathService> {
        &self.paths
    }

    pub fn disk(&self) -> &Arc<Disk> {
        &self.disk
    }

    pub fn attribute_service(&self) -> &AttributeService {
        &self.attributes
    }

    pub fn working_directory(&self) -> &HeapPath {
        &self.working_directory
    }

    /// One path per configured root, in configuration order.
    pub fn root_directories(&self) -> Vec<HeapPath> {
        self.tree
            .root_names()
            .map(|name| self.paths.create_root(name.clone()))
            .collect()
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.config.supports(feature)
    }

    pub fn disk_stats(&self) -> DiskStats {
        self.disk.stats()
    }

    /// Parse path strings joined by the separator.
    pub fn parse_path(&self, first: &str, more: &[&str]) -> StoreResult<HeapPath> {
        self.paths.parse_path(first, more)
    }

    /// Compile a `glob:` or `regex:` matcher using this instance's name rules.
    pub fn path_matcher(&self, syntax_and_pattern: &str) -> StoreResult<PathMatcher> {
        self.paths.create_path_matcher(syntax_and_pattern)
    }

    /// The URI of `path`, made absolute against the working directory.
    ///
    /// Paths naming an existing directory get a trailing separator.
    pub fn to_uri(&self, path: &HeapPath) -> StoreResult<String> {
        self.check_path(path)?;
        let absolute = self.working_directory.resolve(path).normalize();
        let directory = {
            let _guard = self.lock.read();
            self.lookup_locked(&absolute, LinkHandling::Follow)
                .ok()
                .and_then(|r| r.file)
                .is_some_and(|f| f.is_directory())
        };
        self.paths.to_uri(&absolute, directory)
    }

    /// The path named by a URI of this instance.
    pub fn parse_uri(&self, uri: &str) -> StoreResult<HeapPath> {
        self.paths.parse_uri(uri)
    }

    /// Resolve a path.
    pub fn lookup(&self, path: &HeapPath, links: LinkHandling) -> StoreResult<LookupResult> {
        self.check_path(path)?;
        let _guard = self.lock.read();
        self.lookup_locked(path, links)
    }

    /// Create an empty directory.
    #[tracing::instrument(skip(self, path, initial), fields(path = %path), name = "fs.create_directory")]
    pub fn create_directory(
        &self,
        path: &HeapPath,
        initial: &[(&str, AttributeValue)],
    ) -> StoreResult<Arc<File>> {
        self.create_entry(path, initial, || self.factory.create_directory())
    }

    /// Create an empty regular file.
    #[tracing::instrument(skip(self, path, initial), fields(path = %path), name = "fs.create_file")]
    pub fn create_file(
        &self,
        path: &HeapPath,
        initial: &[(&str, AttributeValue)],
    ) -> StoreResult<Arc<File>> {
        self.create_entry(path, initial, || self.factory.create_regular_file())
    }

    /// Create a symbolic link at `link` pointing to `target`.
    #[tracing::instrument(skip(self, link, target, initial), fields(link = %link, target = %target), name = "fs.create_symbolic_link")]
    pub fn create_symbolic_link(
        &self,
        link: &HeapPath,
        target: &HeapPath,
        initial: &[(&str, AttributeValue)],
    ) -> StoreResult<Arc<File>> {
        self.require_feature(Feature::SymbolicLinks)?;
        self.check_path(target)?;
        self.create_entry(link, initial, || {
            self.factory.create_symbolic_link(target.clone())
        })
    }

    /// Add a hard link at `link` to the regular file at `existing`.
    #[tracing::instrument(skip(self, link, existing), fields(link = %link, existing = %existing), name = "fs.link")]
    pub fn link(&self, link: &HeapPath, existing: &HeapPath) -> StoreResult<()> {
        self.require_feature(Feature::Links)?;
        self.check_path(link)?;
        self.check_path(existing)?;
        let _guard = self.lock.write();

        let file = Arc::clone(
            self.lookup_locked(existing, LinkHandling::Follow)?
                .require_exists(existing)?,
        );
        if !file.is_regular_file() {
            return Err(StoreError::invalid_argument(format!(
                "cannot link {existing}: not a regular file"
            )));
        }
        let result = self.lookup_locked(link, LinkHandling::NoFollow)?;
        result.require_does_not_exist(link)?;
        self.link_in(&result, file)
    }

    /// Remove the entry at `path`; the final name is not followed.
    ///
    /// Directories must be empty. A regular file left without links stays
    /// usable through open handles until the last one closes.
    #[tracing::instrument(skip(self, path), fields(path = %path), name = "fs.unlink")]
    pub fn unlink(&self, path: &HeapPath) -> StoreResult<()> {
        self.check_path(path)?;
        let _guard = self.lock.write();

        let result = self.lookup_locked(path, LinkHandling::NoFollow)?;
        let file = Arc::clone(result.require_exists(path)?);
        check_removable(&result, path)?;
        if let Some(dir) = file.as_directory() {
            if !dir.is_empty() {
                return Err(StoreError::directory_not_empty(path.to_string()));
            }
        }
        self.unlink_in(&result)?;
        Ok(())
    }

    /// Snapshot of a directory's entries in insertion order.
    #[tracing::instrument(skip(self, path), fields(path = %path), name = "fs.read_directory")]
    pub fn read_directory(&self, path: &HeapPath) -> StoreResult<Vec<DirectoryEntry>> {
        self.check_path(path)?;
        let _guard = self.lock.read();

        let result = self.lookup_locked(path, LinkHandling::Follow)?;
        let dir = result.require_directory(path)?;
        dir.set_last_access_time(self.factory.now());
        Ok(dir
            .as_directory()
            .map(|d| d.entries())
            .unwrap_or_default())
    }

    /// Copy the file at `source` to `target`.
    ///
    /// Regular file content is duplicated block by block; a directory copy
    /// is empty; a symbolic link copy points where the original does.
    #[tracing::instrument(skip(self, source, target), fields(source = %source, target = %target), name = "fs.copy")]
    pub fn copy(
        &self,
        source: &HeapPath,
        target: &HeapPath,
        options: CopyOptions,
    ) -> StoreResult<Arc<File>> {
        self.check_path(source)?;
        self.check_path(target)?;
        let _guard = self.lock.write();

        let links = if options.no_follow_links {
            LinkHandling::NoFollow
        } else {
            LinkHandling::Follow
        };
        let source_file = Arc::clone(self.lookup_locked(source, links)?.require_exists(source)?);
        let target_result = self.lookup_locked(target, LinkHandling::NoFollow)?;
        if let Some(existing) = &target_result.file {
            if Arc::ptr_eq(existing, &source_file) {
                return Ok(Arc::clone(existing));
            }
            check_replaceable(&target_result, existing, target, options.replace_existing)?;
        }

        let copy = if options.copy_attributes {
            let copy = self.factory.copy_without_content(&source_file);
            copy.copy_times_from(&source_file);
            copy
        } else {
            let copy = match source_file.payload() {
                FilePayload::Regular(_) => self.factory.create_regular_file(),
                FilePayload::Directory(_) => self.factory.create_directory(),
                FilePayload::SymbolicLink(link) => {
                    self.factory.create_symbolic_link(link.target().clone())
                }
            };
            self.attributes.set_initial_attributes(&copy, &[])?;
            copy
        };
        if let (Some(from), Some(to)) = (source_file.as_regular(), copy.as_regular()) {
            from.copy_content_to(to)?;
        }

        if target_result.exists() {
            self.unlink_in(&target_result)?;
        }
        self.link_in(&target_result, Arc::clone(&copy))?;
        Ok(copy)
    }

    /// Move the entry at `source` to `target`; neither final name is
    /// followed.
    #[tracing::instrument(skip(self, source, target), fields(source = %source, target = %target), name = "fs.rename")]
    pub fn rename(
        &self,
        source: &HeapPath,
        target: &HeapPath,
        replace_existing: bool,
    ) -> StoreResult<()> {
        self.check_path(source)?;
        self.check_path(target)?;
        let _guard = self.lock.write();

        let source_result = self.lookup_locked(source, LinkHandling::NoFollow)?;
        let file = Arc::clone(source_result.require_exists(source)?);
        check_removable(&source_result, source)?;

        let target_result = self.lookup_locked(target, LinkHandling::NoFollow)?;
        if let Some(existing) = &target_result.file {
            if Arc::ptr_eq(existing, &file) {
                return Ok(());
            }
            check_replaceable(&target_result, existing, target, replace_existing)?;
        }
        if file.is_directory() && is_ancestor_or_self(&file, &target_result.directory) {
            return Err(StoreError::invalid_argument(format!(
                "cannot move {source} into its own subtree"
            )));
        }

        if target_result.exists() {
            self.unlink_in(&target_result)?;
        }
        self.link_in(&target_result, Arc::clone(&file))?;
        self.unlink_in(&source_result)?;
        Ok(())
    }

    /// Open the regular file at `path`, following symbolic links.
    pub fn open(&self, path: &HeapPath) -> StoreResult<FileHandle> {
        self.check_path(path)?;
        let _guard = self.lock.read();

        let result = self.lookup_locked(path, LinkHandling::Follow)?;
        let file = result.require_exists(path)?;
        if file.is_directory() {
            return Err(StoreError::is_a_directory(path.to_string()));
        }
        FileHandle::open(Arc::clone(file), Arc::clone(self.config.time_source()))
    }

    /// Read one attribute, `view:name` or just `name` for `basic`.
    pub fn get_attribute(&self, path: &HeapPath, attribute: &str) -> StoreResult<AttributeValue> {
        let file = self.existing_file(path)?;
        self.attributes.get_attribute(&file, attribute)
    }

    /// Write one attribute.
    #[tracing::instrument(skip(self, path, value), fields(path = %path), name = "fs.set_attribute")]
    pub fn set_attribute(
        &self,
        path: &HeapPath,
        attribute: &str,
        value: AttributeValue,
    ) -> StoreResult<()> {
        let file = self.existing_file(path)?;
        self.attributes.set_attribute(&file, attribute, value, false)
    }

    /// Read several attributes of one view: `view:a,b` or `view:*`.
    pub fn read_attributes(
        &self,
        path: &HeapPath,
        attributes: &str,
    ) -> StoreResult<BTreeMap<String, AttributeValue>> {
        let file = self.existing_file(path)?;
        self.attributes.read_attributes(&file, attributes)
    }

    fn existing_file(&self, path: &HeapPath) -> StoreResult<Arc<File>> {
        self.check_path(path)?;
        let _guard = self.lock.read();
        let result = self.lookup_locked(path, LinkHandling::Follow)?;
        Ok(Arc::clone(result.require_exists(path)?))
    }

    fn lookup_locked(&self, path: &HeapPath, links: LinkHandling) -> StoreResult<LookupResult> {
        self.tree.lookup(&self.working_directory_file, path, links)
    }

    fn check_path(&self, path: &HeapPath) -> StoreResult<()> {
        if !Arc::ptr_eq(path.service(), &self.paths) {
            return Err(StoreError::invalid_argument(format!(
                "path {path} belongs to a different file system"
            )));
        }
        Ok(())
    }

    fn require_feature(&self, feature: Feature) -> StoreResult<()> {
        if !self.config.supports(feature) {
            return Err(StoreError::unsupported(format!(
                "{feature} not supported by file system {}",
                self.name
            )));
        }
        Ok(())
    }

    fn create_entry(
        &self,
        path: &HeapPath,
        initial: &[(&str, AttributeValue)],
        make: impl FnOnce() -> Arc<File>,
    ) -> StoreResult<Arc<File>> {
        self.check_path(path)?;
        let _guard = self.lock.write();

        let result = self.lookup_locked(path, LinkHandling::NoFollow)?;
        result.require_does_not_exist(path)?;
        let file = make();
        self.attributes.set_initial_attributes(&file, initial)?;
        self.link_in(&result, Arc::clone(&file))?;
        Ok(file)
    }

    fn link_in(&self, at: &LookupResult, file: Arc<File>) -> StoreResult<()> {
        let dir = at
            .directory
            .as_directory()
            .ok_or_else(|| StoreError::not_a_directory(at.name.to_string()))?;
        dir.link(at.name.clone(), file)?;
        at.directory.set_last_modified_time(self.factory.now());
        Ok(())
    }

    fn unlink_in(&self, at: &LookupResult) -> StoreResult<Arc<File>> {
        let dir = at
            .directory
            .as_directory()
            .ok_or_else(|| StoreError::not_a_directory(at.name.to_string()))?;
        let file = dir.unlink(&at.name)?;
        at.directory.set_last_modified_time(self.factory.now());
        Ok(file)
    }
}

/// Create every missing directory along an absolute, normalized path.
fn create_directories(
    tree: &FileTree,
    factory: &FileFactory,
    attributes: &AttributeService,
    path: &HeapPath,
) -> StoreResult<Arc<File>> {
    let root_name = path
        .root_name()
        .ok_or_else(|| StoreError::invalid_argument(format!("{path} is not absolute")))?;
    let mut dir = Arc::clone(
        tree.root(root_name)
            .ok_or_else(|| StoreError::not_found(path.to_string()))?,
    );
    for name in path.names() {
        let current = dir
            .as_directory()
            .ok_or_else(|| StoreError::not_a_directory(path.to_string()))?;
        dir = match current.get(name) {
            Some(existing) if existing.is_directory() => existing,
            Some(_) => return Err(StoreError::not_a_directory(path.to_string())),
            None => {
                let child = factory.create_directory();
                attributes.set_initial_attributes(&child, &[])?;
                current.link(name.clone(), Arc::clone(&child))?;
                child
            }
        };
    }
    Ok(dir)
}

/// Roots, `.` and `..` cannot be removed or moved.
fn check_removable(result: &LookupResult, path: &HeapPath) -> StoreResult<()> {
    let is_root = result
        .file
        .as_ref()
        .and_then(|f| f.as_directory())
        .is_some_and(|d| d.is_root());
    if result.name.is_special() || is_root {
        return Err(StoreError::invalid_argument(format!(
            "cannot remove {path}"
        )));
    }
    Ok(())
}

fn check_replaceable(
    result: &LookupResult,
    existing: &File,
    path: &HeapPath,
    replace_existing: bool,
) -> StoreResult<()> {
    if !replace_existing {
        return Err(StoreError::already_exists(path.to_string()));
    }
    check_removable(result, path)?;
    if existing.as_directory().is_some_and(|d| !d.is_empty()) {
        return Err(StoreError::directory_not_empty(path.to_string()));
    }
    Ok(())
}

/// True if `ancestor` is `dir` or one of its parents.
fn is_ancestor_or_self(ancestor: &Arc<File>, dir: &Arc<File>) -> bool {
    let mut current = Arc::clone(dir);
    loop {
        if Arc::ptr_eq(&current, ancestor) {
            return true;
        }
        let Some(directory) = current.as_directory() else {
            return false;
        };
        if directory.is_root() {
            return false;
        }
        match directory.parent() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// An open regular file.
///
/// Holding a handle keeps the file's content alive after its last link is
/// removed. Reads update the access time and writes the modification time.
pub struct FileHandle {
    file: Arc<File>,
    time_source: Arc<dyn FileTimeSource>,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle").field("file", &self.file).finish()
    }
}

impl FileHandle {
    fn open(file: Arc<File>, time_source: Arc<dyn FileTimeSource>) -> StoreResult<Self> {
        if !file.is_regular_file() {
            return Err(StoreError::invalid_argument(format!(
                "file {} is not a regular file",
                file.id()
            )));
        }
        file.opened();
        Ok(Self { file, time_source })
    }

    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    fn content(&self) -> StoreResult<&RegularFile> {
        self.file.as_regular().ok_or_else(|| {
            StoreError::invalid_argument(format!("file {} is not a regular file", self.file.id()))
        })
    }

    fn accessed(&self) {
        self.file.set_last_access_time(self.time_source.now());
    }

    fn modified(&self) {
        self.file.set_last_modified_time(self.time_source.now());
    }

    /// Read at `pos`; `None` at end of file.
    pub fn read(&self, pos: u64, dst: &mut [u8]) -> StoreResult<Option<usize>> {
        let read = self.content()?.read(pos, dst);
        self.accessed();
        Ok(read)
    }

    pub fn read_vectored(&self, pos: u64, bufs: &mut [IoSliceMut<'_>]) -> StoreResult<Option<usize>> {
        let read = self.content()?.read_vectored(pos, bufs);
        self.accessed();
        Ok(read)
    }

    /// Read the whole file.
    pub fn read_to_vec(&self) -> StoreResult<Vec<u8>> {
        let content = self.content()?;
        let mut buf = vec![0u8; usize::try_from(content.size()).unwrap_or(usize::MAX)];
        let n = content.read(0, &mut buf).unwrap_or(0);
        buf.truncate(n);
        self.accessed();
        Ok(buf)
    }

    pub fn write(&self, pos: u64, src: &[u8]) -> StoreResult<usize> {
        let written = self.content()?.write(pos, src)?;
        self.modified();
        Ok(written)
    }

    pub fn write_vectored(&self, pos: u64, bufs: &[IoSlice<'_>]) -> StoreResult<usize> {
        let written = self.content()?.write_vectored(pos, bufs)?;
        self.modified();
        Ok(written)
    }

    pub fn transfer_from<R: Read + ?Sized>(
        &self,
        src: &mut R,
        pos: u64,
        count: u64,
    ) -> StoreResult<u64> {
        let transferred = self.content()?.transfer_from(src, pos, count)?;
        self.modified();
        Ok(transferred)
    }

    pub fn transfer_to<W: Write + ?Sized>(
        &self,
        pos: u64,
        count: u64,
        dst: &mut W,
    ) -> StoreResult<u64> {
        let transferred = self.content()?.transfer_to(pos, count, dst)?;
        self.accessed();
        Ok(transferred)
    }

    /// Set the size; the modification time changes only if the size does.
    pub fn truncate(&self, size: u64) -> StoreResult<()> {
        if self.content()?.truncate(size)? {
            self.modified();
        }
        Ok(())
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.file.closed();
    }
}
