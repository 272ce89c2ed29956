//! # heapfs-core
//!
//! A volatile, block-backed file storage engine that lives entirely on the
//! heap.
//!
//! The engine is built bottom-up:
//! - a [`Disk`] hands out fixed-size blocks under a global capacity limit
//!   and keeps freed blocks in a bounded cache
//! - a [`RegularFile`] stores bytes in those blocks with random-access,
//!   scatter/gather and bulk-transfer I/O
//! - [`Directory`] entries form the graph of [`File`]s, with hard links,
//!   symbolic links and deferred deletion
//! - the [`path`] module decides when two names are the same (display vs
//!   canonical forms) and matches them against globs and regexes
//!
//! [`HeapFileSystem`] assembles all of it from a [`Configuration`].
//!
//! ```no_run
//! use heapfs_core::{Configuration, HeapFileSystem};
//!
//! # fn main() -> heapfs_core::StoreResult<()> {
//! let fs = HeapFileSystem::new(Configuration::unix())?;
//! let path = fs.parse_path("notes.txt", &[])?;
//! fs.create_file(&path, &[])?;
//! fs.open(&path)?.write(0, b"hello")?;
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod config;
pub mod disk;
pub mod error;
pub mod file;
pub mod fs;
pub mod path;
pub mod registry;
pub mod time;
pub mod tree;

pub use attribute::{AttributeProvider, AttributeService, AttributeValue, PosixPermissions};
pub use config::{ConfigFile, Configuration, ConfigurationBuilder, Feature, Preset};
pub use disk::{Block, Disk, DiskStats};
pub use error::{StoreError, StoreResult};
pub use file::{
    Directory, DirectoryEntry, File, FileFactory, FileId, FileKind, FilePayload, FileTimes,
    RegularFile, SymbolicLink,
};
pub use fs::{CopyOptions, FileHandle, HeapFileSystem};
pub use path::{
    HeapPath, Name, NormalizationSet, PathMatcher, PathNormalization, PathService, PathType,
    PathTypeKind,
};
pub use registry::FileSystemRegistry;
pub use time::{FileTimeSource, SystemTimeSource};
pub use tree::{FileTree, LinkHandling, LookupResult};

#[cfg(any(test, feature = "test-util"))]
pub use time::FakeTimeSource;
