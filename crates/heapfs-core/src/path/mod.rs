//! Names, paths and the rules that decide when two of them are the same.
//!
//! - [`Name`]: one segment with display and canonical forms
//! - [`NormalizationSet`]: the normalizations that derive those forms
//! - [`PathType`]: pluggable syntax (Unix, Windows)
//! - [`PathService`] and [`HeapPath`]: path construction, identity, URIs
//! - [`PathMatcher`]: `glob:` and `regex:` matching

mod heap_path;
mod matcher;
mod name;
mod normalization;
mod path_type;
mod service;

pub use heap_path::HeapPath;
pub use matcher::{MatcherSyntax, PathMatcher, glob_to_regex};
pub use name::Name;
pub use normalization::{NormalizationSet, PathNormalization};
pub use path_type::{ParseResult, PathType, PathTypeKind, UnixPathType, WindowsPathType};
pub use service::{PathService, URI_SCHEME};
