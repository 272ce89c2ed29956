use crate::path::HeapPath;

/// A symbolic link: just the path it points at.
///
/// The target is stored as given and resolved lazily by the file tree.
#[derive(Debug, Clone)]
pub struct SymbolicLink {
    target: HeapPath,
}

impl SymbolicLink {
    pub fn new(target: HeapPath) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &HeapPath {
        &self.target
    }
}
