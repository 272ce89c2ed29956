//! Immutable path values bound to a [`PathService`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::StoreResult;

use super::name::Name;
use super::service::PathService;

/// An optional root plus a sequence of names.
///
/// Identity (equality, hashing, ordering) is delegated to the owning
/// [`PathService`], so it follows the instance's display-or-canonical choice.
/// Paths from different services are never equal.
#[derive(Clone)]
pub struct HeapPath {
    service: Arc<PathService>,
    root: Option<Name>,
    names: Vec<Name>,
}

impl HeapPath {
    pub(crate) fn new(service: Arc<PathService>, root: Option<Name>, names: Vec<Name>) -> Self {
        Self {
            service,
            root,
            names,
        }
    }

    pub fn service(&self) -> &Arc<PathService> {
        &self.service
    }

    /// The root name, if any.
    pub fn root_name(&self) -> Option<&Name> {
        self.root.as_ref()
    }

    /// The root as a path of its own.
    pub fn root(&self) -> Option<HeapPath> {
        self.root
            .clone()
            .map(|r| HeapPath::new(Arc::clone(&self.service), Some(r), Vec::new()))
    }

    pub fn names(&self) -> &[Name] {
        &self.names
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    /// True for the path with no root and no names.
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.names.is_empty()
    }

    /// The last name as a relative path.
    pub fn file_name(&self) -> Option<HeapPath> {
        self.names.last().map(|n| self.with(None, vec![n.clone()]))
    }

    /// Everything but the last name.
    ///
    /// Roots, the empty path and single-name relative paths have no parent.
    pub fn parent(&self) -> Option<HeapPath> {
        match self.names.len() {
            0 => None,
            1 if self.root.is_none() => None,
            n => Some(self.with(self.root.clone(), self.names[..n - 1].to_vec())),
        }
    }

    /// The name at `index` as a relative path.
    pub fn name(&self, index: usize) -> Option<HeapPath> {
        self.names.get(index).map(|n| self.with(None, vec![n.clone()]))
    }

    /// Resolve `other` against this path.
    ///
    /// An absolute `other` wins outright; an empty `other` yields this path.
    pub fn resolve(&self, other: &HeapPath) -> HeapPath {
        if other.is_absolute() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        self.with(self.root.clone(), names)
    }

    /// Parse `other` with this path's service and resolve it.
    pub fn resolve_str(&self, other: &str) -> StoreResult<HeapPath> {
        let other = self.service.parse_path(other, &[])?;
        Ok(self.resolve(&other))
    }

    /// Resolve `other` against this path's parent.
    pub fn resolve_sibling(&self, other: &HeapPath) -> HeapPath {
        match self.parent() {
            Some(parent) => parent.resolve(other),
            None => other.clone(),
        }
    }

    /// Remove `.` names and fold `..` into the preceding name.
    ///
    /// Leading `..` is kept on relative paths and dropped on absolute ones.
    pub fn normalize(&self) -> HeapPath {
        let mut out: Vec<Name> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            match name.display() {
                "." => {}
                ".." => match out.last() {
                    Some(last) if last.display() != ".." => {
                        out.pop();
                    }
                    _ if self.is_absolute() => {}
                    _ => out.push(name.clone()),
                },
                _ => out.push(name.clone()),
            }
        }
        self.with(self.root.clone(), out)
    }

    /// True if this path begins with all of `other`'s components.
    pub fn starts_with(&self, other: &HeapPath) -> bool {
        if !Arc::ptr_eq(&self.service, &other.service)
            || self.is_absolute() != other.is_absolute()
            || other.names.len() > self.names.len()
        {
            return false;
        }
        let prefix = self.with(self.root.clone(), self.names[..other.names.len()].to_vec());
        prefix == *other
    }

    /// Render as a `heapfs://` URI.
    pub fn to_uri(&self, directory: bool) -> StoreResult<String> {
        self.service.to_uri(self, directory)
    }

    fn with(&self, root: Option<Name>, names: Vec<Name>) -> HeapPath {
        HeapPath::new(Arc::clone(&self.service), root, names)
    }
}

impl PartialEq for HeapPath {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.service, &other.service)
            && self.service.compare(self, other) == Ordering::Equal
    }
}

impl Eq for HeapPath {}

impl Hash for HeapPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service.hash_into(self, state);
    }
}

impl PartialOrd for HeapPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.service.compare(self, other)
    }
}

impl fmt::Display for HeapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.service.to_display_string(self))
    }
}

impl fmt::Debug for HeapPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HeapPath({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::normalization::NormalizationSet;
    use crate::path::path_type::UnixPathType;

    fn service() -> Arc<PathService> {
        Arc::new(PathService::new(
            Arc::new(UnixPathType),
            NormalizationSet::none(),
            NormalizationSet::none(),
            false,
        ))
    }

    fn path(service: &Arc<PathService>, s: &str) -> HeapPath {
        service.parse_path(s, &[]).unwrap()
    }

    #[test]
    fn test_parent_and_file_name() {
        let s = service();
        let p = path(&s, "/foo/bar");
        assert_eq!(p.parent().unwrap(), path(&s, "/foo"));
        assert_eq!(p.parent().unwrap().parent().unwrap(), path(&s, "/"));
        assert!(path(&s, "/").parent().is_none());
        assert!(path(&s, "foo").parent().is_none());
        assert_eq!(p.file_name().unwrap(), path(&s, "bar"));
        assert!(path(&s, "/").file_name().is_none());
        assert_eq!(p.root().unwrap(), path(&s, "/"));
    }

    #[test]
    fn test_resolve() {
        let s = service();
        let base = path(&s, "/foo");
        assert_eq!(base.resolve(&path(&s, "bar/baz")), path(&s, "/foo/bar/baz"));
        assert_eq!(base.resolve(&path(&s, "/other")), path(&s, "/other"));
        assert_eq!(base.resolve(&s.empty_path()), base);
        assert_eq!(base.resolve_str("x").unwrap(), path(&s, "/foo/x"));
        assert_eq!(base.resolve_sibling(&path(&s, "sib")), path(&s, "/sib"));
    }

    #[test]
    fn test_normalize() {
        let s = service();
        assert_eq!(path(&s, "/a/./b/../c").normalize(), path(&s, "/a/c"));
        assert_eq!(path(&s, "/../a").normalize(), path(&s, "/a"));
        assert_eq!(path(&s, "../../a/..").normalize(), path(&s, "../.."));
        assert_eq!(path(&s, "a/./.").normalize(), path(&s, "a"));
    }

    #[test]
    fn test_starts_with() {
        let s = service();
        let p = path(&s, "/a/b/c");
        assert!(p.starts_with(&path(&s, "/a/b")));
        assert!(p.starts_with(&path(&s, "/")));
        assert!(!p.starts_with(&path(&s, "a/b")));
        assert!(!p.starts_with(&path(&s, "/a/b/c/d")));
    }

    #[test]
    fn test_paths_from_other_services_differ() {
        let a = service();
        let b = service();
        assert_ne!(path(&a, "/foo"), path(&b, "/foo"));
    }
}
