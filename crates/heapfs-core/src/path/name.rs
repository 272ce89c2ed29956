//! Dual-form file names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One path segment with a display form and a canonical form.
///
/// Equality, hashing and ordering use the canonical form only; the display
/// form is what `Display` prints.
#[derive(Clone)]
pub struct Name {
    display: Arc<str>,
    canonical: Arc<str>,
}

impl Name {
    /// A name whose display and canonical forms are identical.
    pub fn simple(name: &str) -> Self {
        let s: Arc<str> = Arc::from(name);
        Self {
            display: Arc::clone(&s),
            canonical: s,
        }
    }

    /// A name with distinct display and canonical forms.
    pub fn create(display: &str, canonical: &str) -> Self {
        if display == canonical {
            return Self::simple(display);
        }
        Self {
            display: Arc::from(display),
            canonical: Arc::from(canonical),
        }
    }

    /// The empty name, used by the empty path.
    pub fn empty() -> Self {
        Self::simple("")
    }

    /// `.`
    pub fn self_name() -> Self {
        Self::simple(".")
    }

    /// `..`
    pub fn parent_name() -> Self {
        Self::simple("..")
    }

    /// The form used for presentation.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The form used for identity.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Returns true for the empty name.
    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Returns true for `.` or `..`.
    pub fn is_special(&self) -> bool {
        matches!(self.display(), "." | "..")
    }

    /// Compare by display form.
    pub fn display_cmp(&self, other: &Name) -> Ordering {
        self.display.cmp(&other.display)
    }

    /// Compare by canonical form.
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display == self.canonical {
            write!(f, "Name({:?})", &*self.display)
        } else {
            write!(f, "Name({:?} ~ {:?})", &*self.display, &*self.canonical)
        }
    }
}
