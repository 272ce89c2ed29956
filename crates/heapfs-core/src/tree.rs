//! Path lookup over the directory graph.
//!
//! A [`FileTree`] holds the root directories of an instance and resolves
//! [`HeapPath`]s against them. Relative paths start at a caller-supplied
//! working directory. `.` and `..` are resolved against the directory being
//! walked (a root is its own parent), and symbolic links are followed for
//! every intermediate name and, unless told otherwise, for the last one.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{StoreError, StoreResult};
use crate::file::File;
use crate::path::{HeapPath, Name};

/// Symbolic links followed in one lookup before giving up.
pub const MAX_SYMBOLIC_LINK_DEPTH: usize = 40;

/// Whether the final name of a path is followed if it is a symbolic link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkHandling {
    #[default]
    Follow,
    NoFollow,
}

/// Where a lookup ended.
///
/// The directory always exists; `file` is `None` when the final name is not
/// linked in it.
#[derive(Debug, Clone)]
pub struct LookupResult {
    /// Directory holding the final name.
    pub directory: Arc<File>,
    pub name: Name,
    pub file: Option<Arc<File>>,
}

impl LookupResult {
    pub fn exists(&self) -> bool {
        self.file.is_some()
    }

    /// The file, or `NotFound` naming `path`.
    pub fn require_exists(&self, path: &HeapPath) -> StoreResult<&Arc<File>> {
        self.file
            .as_ref()
            .ok_or_else(|| StoreError::not_found(path.to_string()))
    }

    /// `AlreadyExists` naming `path` if the file exists.
    pub fn require_does_not_exist(&self, path: &HeapPath) -> StoreResult<()> {
        match self.file {
            Some(_) => Err(StoreError::already_exists(path.to_string())),
            None => Ok(()),
        }
    }

    /// The file, which must be a directory.
    pub fn require_directory(&self, path: &HeapPath) -> StoreResult<&Arc<File>> {
        let file = self.require_exists(path)?;
        if !file.is_directory() {
            return Err(StoreError::not_a_directory(path.to_string()));
        }
        Ok(file)
    }
}

/// The roots of one instance.
#[derive(Debug)]
pub struct FileTree {
    roots: IndexMap<Name, Arc<File>>,
}

impl FileTree {
    pub fn new(roots: IndexMap<Name, Arc<File>>) -> Self {
        Self { roots }
    }

    /// Root names in configuration order.
    pub fn root_names(&self) -> impl Iterator<Item = &Name> {
        self.roots.keys()
    }

    pub fn root(&self, name: &Name) -> Option<&Arc<File>> {
        self.roots.get(name)
    }

    /// Resolve `path`, starting at `working_directory` if it is relative.
    ///
    /// Fails with `NotFound` if an intermediate name is missing,
    /// `NotADirectory` if one is not a directory, and `TooManySymlinks`
    /// after [`MAX_SYMBOLIC_LINK_DEPTH`] links.
    pub fn lookup(
        &self,
        working_directory: &Arc<File>,
        path: &HeapPath,
        links: LinkHandling,
    ) -> StoreResult<LookupResult> {
        self.lookup_at_depth(working_directory, path, links, 0)
    }

    fn lookup_at_depth(
        &self,
        working_directory: &Arc<File>,
        path: &HeapPath,
        links: LinkHandling,
        depth: usize,
    ) -> StoreResult<LookupResult> {
        let dir = match path.root_name() {
            Some(root_name) => {
                let root = self
                    .roots
                    .get(root_name)
                    .ok_or_else(|| StoreError::not_found(path.to_string()))?;
                if path.names().is_empty() {
                    return Ok(LookupResult {
                        directory: Arc::clone(root),
                        name: root_name.clone(),
                        file: Some(Arc::clone(root)),
                    });
                }
                Arc::clone(root)
            }
            None => Arc::clone(working_directory),
        };

        let Some((last, intermediate)) = path.names().split_last() else {
            return Self::entry(&dir, &Name::self_name(), path);
        };

        let mut dir = dir;
        for name in intermediate {
            let entry = Self::entry(&dir, name, path)?;
            let entry = self.follow(entry, LinkHandling::Follow, depth, path)?;
            dir = match entry.file {
                Some(file) if file.is_directory() => file,
                Some(_) => return Err(StoreError::not_a_directory(path.to_string())),
                None => return Err(StoreError::not_found(path.to_string())),
            };
        }

        let entry = Self::entry(&dir, last, path)?;
        self.follow(entry, links, depth, path)
    }

    /// One step: `name` in `dir`, with `.` and `..` resolved.
    fn entry(dir: &Arc<File>, name: &Name, path: &HeapPath) -> StoreResult<LookupResult> {
        let directory = dir
            .as_directory()
            .ok_or_else(|| StoreError::not_a_directory(path.to_string()))?;
        let file = match name.canonical() {
            "." => Some(Arc::clone(dir)),
            ".." => directory.parent(),
            _ => directory.get(name),
        };
        Ok(LookupResult {
            directory: Arc::clone(dir),
            name: name.clone(),
            file,
        })
    }

    fn follow(
        &self,
        entry: LookupResult,
        links: LinkHandling,
        depth: usize,
        path: &HeapPath,
    ) -> StoreResult<LookupResult> {
        if links == LinkHandling::NoFollow {
            return Ok(entry);
        }
        let Some(link) = entry.file.as_ref().and_then(|f| f.as_symbolic_link()) else {
            return Ok(entry);
        };
        if depth >= MAX_SYMBOLIC_LINK_DEPTH {
            return Err(StoreError::too_many_symlinks(path.to_string()));
        }
        let target = link.target().clone();
        tracing::trace!(link = %entry.name, target = %target, depth, "following symbolic link");
        self.lookup_at_depth(&entry.directory, &target, LinkHandling::Follow, depth + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::Disk;
    use crate::file::FileFactory;
    use crate::path::{NormalizationSet, PathService, UnixPathType};
    use crate::time::FakeTimeSource;

    struct Fixture {
        service: Arc<PathService>,
        factory: FileFactory,
        tree: FileTree,
        root: Arc<File>,
    }

    impl Fixture {
        fn new() -> Self {
            let service = Arc::new(PathService::new(
                Arc::new(UnixPathType),
                NormalizationSet::none(),
                NormalizationSet::none(),
                false,
            ));
            let factory = FileFactory::new(
                Arc::new(Disk::new(8, 64, 64).unwrap()),
                Arc::new(FakeTimeSource::new()),
            );
            let root = factory.create_directory();
            let mut roots = IndexMap::new();
            roots.insert(Name::simple("/"), Arc::clone(&root));
            Self {
                service,
                factory,
                tree: FileTree::new(roots),
                root,
            }
        }

        fn path(&self, s: &str) -> HeapPath {
            self.service.parse_path(s, &[]).unwrap()
        }

        fn mkdir(&self, parent: &Arc<File>, name: &str) -> Arc<File> {
            let dir = self.factory.create_directory();
            parent
                .as_directory()
                .unwrap()
                .link(Name::simple(name), Arc::clone(&dir))
                .unwrap();
            dir
        }

        fn touch(&self, parent: &Arc<File>, name: &str) -> Arc<File> {
            let file = self.factory.create_regular_file();
            parent
                .as_directory()
                .unwrap()
                .link(Name::simple(name), Arc::clone(&file))
                .unwrap();
            file
        }

        fn symlink(&self, parent: &Arc<File>, name: &str, target: &str) -> Arc<File> {
            let link = self.factory.create_symbolic_link(self.path(target));
            parent
                .as_directory()
                .unwrap()
                .link(Name::simple(name), Arc::clone(&link))
                .unwrap();
            link
        }

        fn lookup(&self, from: &Arc<File>, path: &str) -> StoreResult<LookupResult> {
            self.tree.lookup(from, &self.path(path), LinkHandling::Follow)
        }
    }

    fn same(a: &Option<Arc<File>>, b: &Arc<File>) -> bool {
        a.as_ref().is_some_and(|a| Arc::ptr_eq(a, b))
    }

    #[test]
    fn test_absolute_and_relative_lookup() {
        let fx = Fixture::new();
        let work = fx.mkdir(&fx.root, "work");
        let file = fx.touch(&work, "a.txt");

        assert!(same(&fx.lookup(&fx.root, "/work/a.txt").unwrap().file, &file));
        assert!(same(&fx.lookup(&work, "a.txt").unwrap().file, &file));
        assert!(same(&fx.lookup(&work, "").unwrap().file, &work));
        assert!(same(&fx.lookup(&work, "/").unwrap().file, &fx.root));

        let missing = fx.lookup(&work, "b.txt").unwrap();
        assert!(!missing.exists());
        assert!(Arc::ptr_eq(&missing.directory, &work));
        assert_eq!(missing.name.to_string(), "b.txt");
    }

    #[test]
    fn test_dot_and_dot_dot() {
        let fx = Fixture::new();
        let a = fx.mkdir(&fx.root, "a");
        let b = fx.mkdir(&a, "b");

        assert!(same(&fx.lookup(&b, "..").unwrap().file, &a));
        assert!(same(&fx.lookup(&b, "../..").unwrap().file, &fx.root));
        assert!(same(&fx.lookup(&b, "../../..").unwrap().file, &fx.root));
        assert!(same(&fx.lookup(&fx.root, "/a/./b/.").unwrap().file, &b));
    }

    #[test]
    fn test_intermediate_errors() {
        let fx = Fixture::new();
        fx.touch(&fx.root, "file");

        assert!(matches!(
            fx.lookup(&fx.root, "/missing/x"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            fx.lookup(&fx.root, "/file/x"),
            Err(StoreError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_symbolic_links() {
        let fx = Fixture::new();
        let dir = fx.mkdir(&fx.root, "dir");
        let file = fx.touch(&dir, "file");
        let link = fx.symlink(&fx.root, "link", "dir/file");
        fx.symlink(&fx.root, "dirlink", "/dir");

        assert!(same(&fx.lookup(&fx.root, "/link").unwrap().file, &file));
        assert!(same(&fx.lookup(&fx.root, "/dirlink/file").unwrap().file, &file));

        let no_follow = fx
            .tree
            .lookup(&fx.root, &fx.path("/link"), LinkHandling::NoFollow)
            .unwrap();
        assert!(same(&no_follow.file, &link));

        fx.symlink(&fx.root, "dangling", "/dir/nothing");
        let dangling = fx.lookup(&fx.root, "/dangling").unwrap();
        assert!(!dangling.exists());
        assert!(Arc::ptr_eq(&dangling.directory, &dir));
    }

    #[test]
    fn test_symbolic_link_loop() {
        let fx = Fixture::new();
        fx.symlink(&fx.root, "a", "/b");
        fx.symlink(&fx.root, "b", "/a");

        assert!(matches!(
            fx.lookup(&fx.root, "/a"),
            Err(StoreError::TooManySymlinks(_))
        ));
        assert!(matches!(
            fx.lookup(&fx.root, "/a/x"),
            Err(StoreError::TooManySymlinks(_))
        ));
    }

    #[test]
    fn test_unknown_root() {
        let fx = Fixture::new();
        let service = Arc::new(PathService::new(
            Arc::new(crate::path::WindowsPathType),
            NormalizationSet::none(),
            NormalizationSet::none(),
            false,
        ));
        let path = service.parse_path("D:\\x", &[]).unwrap();
        assert!(matches!(
            fx.tree.lookup(&fx.root, &path, LinkHandling::Follow),
            Err(StoreError::NotFound(_))
        ));
    }
}
