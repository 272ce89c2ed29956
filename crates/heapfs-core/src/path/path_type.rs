//! Pluggable path syntax.
//!
//! A [`PathType`] knows how to split a raw path string into a root and names,
//! and how to render them back, both as a display string and as the path
//! component of a URI. Two syntaxes ship with the crate:
//!
//! - [`UnixPathType`]: `/` separator, single root `/`
//! - [`WindowsPathType`]: `\` separator with `/` accepted, drive roots
//!   (`C:\`) and UNC roots (`\\host\share\`)

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Result of parsing a path string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// Root component, if the path is absolute.
    pub root: Option<String>,
    /// Name components, empty segments removed.
    pub names: Vec<String>,
}

impl ParseResult {
    /// Create a parse result.
    pub fn new(root: Option<String>, names: Vec<String>) -> Self {
        Self { root, names }
    }

    /// Returns true if the path has a root.
    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    /// Returns true if the path is only a root.
    pub fn is_root(&self) -> bool {
        self.root.is_some() && self.names.is_empty()
    }
}

/// A path syntax definition.
pub trait PathType: Send + Sync + fmt::Debug {
    /// The canonical separator.
    fn separator(&self) -> char;

    /// Additional characters accepted as separators when parsing.
    fn other_separators(&self) -> &str;

    /// Parse a path string into root and names.
    fn parse_path(&self, path: &str) -> StoreResult<ParseResult>;

    /// Render a root and names as a display string.
    fn to_display_string(&self, root: Option<&str>, names: &[&str]) -> String;

    /// Render a root and names as the (unescaped) path part of a URI.
    fn to_uri_path(&self, root: Option<&str>, names: &[&str], directory: bool) -> String;

    /// Parse the (unescaped) path part of a URI.
    fn parse_uri_path(&self, uri_path: &str) -> StoreResult<ParseResult>;

    /// Returns true if the character separates names.
    fn is_separator(&self, c: char) -> bool {
        c == self.separator() || self.other_separators().contains(c)
    }

    /// All separator characters, canonical first.
    fn separators(&self) -> String {
        let mut s = String::with_capacity(1 + self.other_separators().len());
        s.push(self.separator());
        s.push_str(self.other_separators());
        s
    }

    /// Split on any separator, dropping empty segments.
    fn split(&self, path: &str) -> Vec<String> {
        path.split(|c| self.is_separator(c))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Join names with the canonical separator.
    fn join(&self, names: &[&str]) -> String {
        let mut sep = [0u8; 4];
        names.join(self.separator().encode_utf8(&mut sep))
    }
}

/// The built-in path syntaxes, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathTypeKind {
    /// See [`UnixPathType`].
    Unix,
    /// See [`WindowsPathType`].
    Windows,
}

impl PathTypeKind {
    /// Instantiate the syntax.
    pub fn build(self) -> Arc<dyn PathType> {
        match self {
            PathTypeKind::Unix => Arc::new(UnixPathType),
            PathTypeKind::Windows => Arc::new(WindowsPathType),
        }
    }
}

/// Unix-style paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixPathType;

impl PathType for UnixPathType {
    fn separator(&self) -> char {
        '/'
    }

    fn other_separators(&self) -> &str {
        ""
    }

    fn parse_path(&self, path: &str) -> StoreResult<ParseResult> {
        if path.contains('\0') {
            return Err(StoreError::invalid_path(path, "nul character not allowed"));
        }
        let root = path.starts_with('/').then(|| "/".to_string());
        Ok(ParseResult::new(root, self.split(path)))
    }

    fn to_display_string(&self, root: Option<&str>, names: &[&str]) -> String {
        let mut out = String::new();
        if let Some(root) = root {
            out.push_str(root);
        }
        out.push_str(&self.join(names));
        out
    }

    fn to_uri_path(&self, _root: Option<&str>, names: &[&str], directory: bool) -> String {
        let mut out = String::new();
        for name in names {
            out.push('/');
            out.push_str(name);
        }
        if directory || out.is_empty() {
            out.push('/');
        }
        out
    }

    fn parse_uri_path(&self, uri_path: &str) -> StoreResult<ParseResult> {
        if !uri_path.starts_with('/') {
            return Err(StoreError::invalid_path(uri_path, "URI path must start with /"));
        }
        self.parse_path(uri_path)
    }
}

/// Windows-style paths.
///
/// Relative paths on a specific drive (`C:foo`) and absolute paths on the
/// current drive (`\foo`) are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPathType;

/// Characters not allowed anywhere in a Windows name.
const WINDOWS_RESERVED: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

impl WindowsPathType {
    /// `\\host\share\` prefix.
    fn parse_unc_root<'a>(&self, original: &str, path: &'a str) -> StoreResult<(String, &'a str)> {
        let rest = &path[2..];
        let mut parts = rest.splitn(3, '\\');
        let host = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if host.is_empty() || share.is_empty() {
            return Err(StoreError::invalid_path(
                original,
                "UNC path is missing host or share name",
            ));
        }
        let remainder = parts.next().unwrap_or_default();
        Ok((format!("\\\\{host}\\{share}\\"), remainder))
    }

    fn check_name(&self, original: &str, name: &str) -> StoreResult<()> {
        if let Some(c) = name
            .chars()
            .find(|c| WINDOWS_RESERVED.contains(c) || (*c as u32) < 32)
        {
            return Err(StoreError::invalid_path(
                original,
                format!("illegal char {c:?} in name {name:?}"),
            ));
        }
        Ok(())
    }
}

impl PathType for WindowsPathType {
    fn separator(&self) -> char {
        '\\'
    }

    fn other_separators(&self) -> &str {
        "/"
    }

    fn parse_path(&self, original: &str) -> StoreResult<ParseResult> {
        let path = original.replace('/', "\\");
        let bytes = path.as_bytes();
        let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';

        let (root, rest) = if path.starts_with("\\\\") {
            let (root, rest) = self.parse_unc_root(original, &path)?;
            (Some(root), rest)
        } else if has_drive {
            if bytes.len() > 2 && bytes[2] != b'\\' {
                return Err(StoreError::invalid_path(
                    original,
                    "drive-relative paths (e.g. C:foo) are not supported",
                ));
            }
            let letter = (bytes[0] as char).to_ascii_uppercase();
            (Some(format!("{letter}:\\")), path.get(3..).unwrap_or_default())
        } else if path.starts_with('\\') {
            return Err(StoreError::invalid_path(
                original,
                "absolute paths on the current drive (e.g. \\foo) are not supported",
            ));
        } else {
            (None, path.as_str())
        };

        let names = self.split(rest);
        for name in &names {
            self.check_name(original, name)?;
        }
        Ok(ParseResult::new(root, names))
    }

    fn to_display_string(&self, root: Option<&str>, names: &[&str]) -> String {
        let mut out = String::new();
        if let Some(root) = root {
            out.push_str(root);
        }
        out.push_str(&self.join(names));
        out
    }

    fn to_uri_path(&self, root: Option<&str>, names: &[&str], directory: bool) -> String {
        let mut out = String::new();
        if let Some(root) = root {
            if !root.starts_with("\\\\") {
                out.push('/');
            }
            out.push_str(&root.replace('\\', "/"));
        }
        for name in names {
            out.push_str(name);
            out.push('/');
        }
        if !directory && out.ends_with('/') && !names.is_empty() {
            out.pop();
        }
        out
    }

    fn parse_uri_path(&self, uri_path: &str) -> StoreResult<ParseResult> {
        let bytes = uri_path.as_bytes();
        let drive = bytes.len() >= 3
            && bytes[0] == b'/'
            && bytes[1].is_ascii_alphabetic()
            && bytes[2] == b':';
        if drive {
            self.parse_path(&uri_path[1..])
        } else if uri_path.starts_with("//") {
            self.parse_path(uri_path)
        } else {
            Err(StoreError::invalid_path(
                uri_path,
                "URI path must start with a drive (/C:/) or a UNC host (//host/share)",
            ))
        }
    }
}
