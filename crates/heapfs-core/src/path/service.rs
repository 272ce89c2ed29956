//! Name-aware path facade.
//!
//! [`PathService`] owns everything an instance needs to turn strings into
//! [`HeapPath`]s and back: the path syntax, the two normalization sets, and
//! the flag that decides whether path identity uses display or canonical
//! names.
//!
//! ## Design Decisions
//!
//! - Names are built from the *original* string twice, once per set, so the
//!   display form never leaks into the canonical form or vice versa.
//! - Equality, hashing and ordering of paths all read the same form, chosen
//!   once per instance. Equal paths therefore always hash equal.
//! - Matchers use the set that governs equality, so `glob:foo` matches `FOO`
//!   exactly when `foo` and `FOO` would be the same path.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::error::{StoreError, StoreResult};

use super::heap_path::HeapPath;
use super::matcher::PathMatcher;
use super::name::Name;
use super::normalization::NormalizationSet;
use super::path_type::{ParseResult, PathType};

/// URI scheme for instance paths.
pub const URI_SCHEME: &str = "heapfs";

/// Bytes escaped in the path part of a URI. Non-ASCII is always escaped.
const URI_PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Path construction, rendering, comparison and matching for one instance.
#[derive(Debug)]
pub struct PathService {
    path_type: Arc<dyn PathType>,
    display: NormalizationSet,
    canonical: NormalizationSet,
    equality_uses_canonical: bool,
    authority: String,
}

impl PathService {
    /// Create a service. The URI authority defaults to `default`.
    pub fn new(
        path_type: Arc<dyn PathType>,
        display: NormalizationSet,
        canonical: NormalizationSet,
        equality_uses_canonical: bool,
    ) -> Self {
        Self {
            path_type,
            display,
            canonical,
            equality_uses_canonical,
            authority: "default".to_string(),
        }
    }

    /// Set the URI authority, normally the instance name.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn path_type(&self) -> &Arc<dyn PathType> {
        &self.path_type
    }

    pub fn separator(&self) -> char {
        self.path_type.separator()
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn display_normalizations(&self) -> &NormalizationSet {
        &self.display
    }

    pub fn canonical_normalizations(&self) -> &NormalizationSet {
        &self.canonical
    }

    pub fn equality_uses_canonical_form(&self) -> bool {
        self.equality_uses_canonical
    }

    /// The set whose semantics path identity follows.
    pub fn governing_normalizations(&self) -> &NormalizationSet {
        if self.equality_uses_canonical {
            &self.canonical
        } else {
            &self.display
        }
    }

    /// Build a name from a raw segment.
    pub fn name(&self, raw: &str) -> Name {
        match raw {
            "" => Name::empty(),
            "." => Name::self_name(),
            ".." => Name::parent_name(),
            _ => Name::create(&self.display.normalize(raw), &self.canonical.normalize(raw)),
        }
    }

    /// Build names from raw segments.
    pub fn names<'a>(&self, raw: impl IntoIterator<Item = &'a str>) -> Vec<Name> {
        raw.into_iter().map(|s| self.name(s)).collect()
    }

    /// The empty path: no root, no names.
    pub fn empty_path(self: &Arc<Self>) -> HeapPath {
        HeapPath::new(Arc::clone(self), None, Vec::new())
    }

    /// A path that is only a root.
    pub fn create_root(self: &Arc<Self>, root: Name) -> HeapPath {
        HeapPath::new(Arc::clone(self), Some(root), Vec::new())
    }

    /// A relative path of one name.
    pub fn create_file_name(self: &Arc<Self>, name: Name) -> HeapPath {
        HeapPath::new(Arc::clone(self), None, vec![name])
    }

    /// A relative path from names.
    pub fn create_relative_path(self: &Arc<Self>, names: Vec<Name>) -> HeapPath {
        HeapPath::new(Arc::clone(self), None, names)
    }

    /// A path from an optional root and names.
    pub fn create_path(self: &Arc<Self>, root: Option<Name>, names: Vec<Name>) -> HeapPath {
        HeapPath::new(Arc::clone(self), root, names)
    }

    /// Parse one or more strings joined by the separator.
    ///
    /// Empty parts are skipped before joining, so `("", "foo")` is `foo`.
    pub fn parse_path(self: &Arc<Self>, first: &str, more: &[&str]) -> StoreResult<HeapPath> {
        let joined = if more.is_empty() {
            first.to_string()
        } else {
            let parts: Vec<&str> = std::iter::once(first)
                .chain(more.iter().copied())
                .filter(|p| !p.is_empty())
                .collect();
            self.path_type.join(&parts)
        };
        let parsed = self.path_type.parse_path(&joined)?;
        Ok(self.from_parse_result(parsed))
    }

    fn from_parse_result(self: &Arc<Self>, parsed: ParseResult) -> HeapPath {
        let root = parsed.root.as_deref().map(|r| self.name(r));
        let names = self.names(parsed.names.iter().map(String::as_str));
        self.create_path(root, names)
    }

    /// Render a path using display names.
    pub fn to_display_string(&self, path: &HeapPath) -> String {
        let names: Vec<&str> = path.names().iter().map(Name::display).collect();
        self.path_type
            .to_display_string(path.root_name().map(Name::display), &names)
    }

    /// Render an absolute path as a `heapfs://` URI.
    pub fn to_uri(&self, path: &HeapPath, directory: bool) -> StoreResult<String> {
        if !path.is_absolute() {
            return Err(StoreError::invalid_argument(format!(
                "path {path} must be absolute to convert to a URI"
            )));
        }
        let names: Vec<&str> = path.names().iter().map(Name::display).collect();
        let uri_path = self
            .path_type
            .to_uri_path(path.root_name().map(Name::display), &names, directory);
        Ok(format!(
            "{URI_SCHEME}://{}{}",
            self.authority,
            utf8_percent_encode(&uri_path, URI_PATH_ESCAPES)
        ))
    }

    /// Parse a `heapfs://` URI belonging to this instance.
    pub fn parse_uri(self: &Arc<Self>, uri: &str) -> StoreResult<HeapPath> {
        let rest = uri
            .strip_prefix(URI_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| {
                StoreError::invalid_argument(format!("URI {uri:?} does not use the {URI_SCHEME} scheme"))
            })?;
        let (authority, raw_path) = match rest.find('/') {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        if authority != self.authority {
            return Err(StoreError::invalid_argument(format!(
                "URI {uri:?} does not belong to instance {}",
                self.authority
            )));
        }
        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|e| StoreError::invalid_argument(format!("URI {uri:?} is not UTF-8: {e}")))?;
        let parsed = self.path_type.parse_uri_path(&decoded)?;
        if !parsed.is_absolute() {
            return Err(StoreError::invalid_argument(format!(
                "URI {uri:?} does not name an absolute path"
            )));
        }
        Ok(self.from_parse_result(parsed))
    }

    fn form<'a>(&self, name: &'a Name) -> &'a str {
        if self.equality_uses_canonical {
            name.canonical()
        } else {
            name.display()
        }
    }

    /// Feed the identity form of a path into a hasher.
    pub(crate) fn hash_into<H: Hasher>(&self, path: &HeapPath, state: &mut H) {
        path.root_name().map(|r| self.form(r)).hash(state);
        for name in path.names() {
            self.form(name).hash(state);
        }
    }

    /// Hash a path by its identity form.
    pub fn hash(&self, path: &HeapPath) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(path, &mut hasher);
        hasher.finish()
    }

    /// Order paths by root (rootless first), then names lexicographically.
    pub fn compare(&self, a: &HeapPath, b: &HeapPath) -> Ordering {
        let root_a = a.root_name().map(|r| self.form(r));
        let root_b = b.root_name().map(|r| self.form(r));
        root_a.cmp(&root_b).then_with(|| {
            let names_a = a.names().iter().map(|n| self.form(n));
            let names_b = b.names().iter().map(|n| self.form(n));
            names_a.cmp(names_b)
        })
    }

    /// Compile a `glob:` or `regex:` matcher.
    pub fn create_path_matcher(&self, syntax_and_pattern: &str) -> StoreResult<PathMatcher> {
        PathMatcher::compile(
            syntax_and_pattern,
            &self.path_type.separators(),
            self.governing_normalizations(),
        )
    }
}
