//! File attributes.
//!
//! Attributes are addressed as `view:name` (the view defaults to `basic`).
//! Each view is served by an [`AttributeProvider`]; the [`AttributeService`]
//! routes requests to providers, following view inheritance (`posix`
//! exposes `basic` and `owner` attributes too).
//!
//! Derived attributes (`basic:size`, the timestamps) are read straight from
//! the [`File`]. Everything else lives in the file's attribute bag.

mod providers;
mod service;

pub use providers::{
    BasicAttributeProvider, DosAttributeProvider, OwnerAttributeProvider, PosixAttributeProvider,
    UserDefinedAttributeProvider, standard_provider,
};
pub use service::AttributeService;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::file::{File, FileId};

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Time(SystemTime),
    FileKey(FileId),
    Permissions(PosixPermissions),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Short name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Text(_) => "text",
            AttributeValue::Time(_) => "time",
            AttributeValue::FileKey(_) => "file key",
            AttributeValue::Permissions(_) => "permissions",
            AttributeValue::Bytes(_) => "bytes",
        }
    }
}

/// POSIX permission bits, written as `rwxr-x---`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PosixPermissions(u16);

impl PosixPermissions {
    /// From the low nine bits of a mode.
    pub fn from_mode(mode: u16) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(self) -> u16 {
        self.0
    }
}

impl FromStr for PosixPermissions {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 9 {
            return Err(StoreError::invalid_argument(format!(
                "invalid permission string {s:?}"
            )));
        }
        let mut mode = 0u16;
        for (i, &b) in bytes.iter().enumerate() {
            let expected = b"rwx"[i % 3];
            mode <<= 1;
            if b == expected {
                mode |= 1;
            } else if b != b'-' {
                return Err(StoreError::invalid_argument(format!(
                    "invalid permission string {s:?}"
                )));
            }
        }
        Ok(Self(mode))
    }
}

impl fmt::Display for PosixPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..9 {
            let set = self.0 & (1 << (8 - i)) != 0;
            let c = if set { b"rwx"[i % 3] as char } else { '-' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for PosixPermissions {
    type Error = StoreError;

    fn try_from(value: String) -> StoreResult<Self> {
        value.parse()
    }
}

impl From<PosixPermissions> for String {
    fn from(p: PosixPermissions) -> Self {
        p.to_string()
    }
}

/// Serves the attributes of one view.
pub trait AttributeProvider: Send + Sync + fmt::Debug {
    /// The view name.
    fn name(&self) -> &'static str;

    /// Views whose attributes this view also exposes.
    fn inherits(&self) -> &'static [&'static str] {
        &[]
    }

    /// Attributes this view defines itself.
    fn fixed_attributes(&self) -> &'static [&'static str];

    /// Whether this view defines `attribute`.
    fn supports(&self, attribute: &str) -> bool {
        self.fixed_attributes().contains(&attribute)
    }

    /// Attributes this view defines that are present on `file`.
    fn attributes(&self, _file: &File) -> Vec<String> {
        self.fixed_attributes().iter().map(|a| a.to_string()).collect()
    }

    /// Initial values for new files, by attribute name.
    ///
    /// `user_defaults` is keyed by `view:attribute` and overrides built-in
    /// defaults.
    fn default_values(
        &self,
        _user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Vec<(String, AttributeValue)>> {
        Ok(Vec::new())
    }

    /// Read an attribute this view defines.
    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue>;

    /// Write an attribute this view defines.
    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        on_create: bool,
    ) -> StoreResult<()>;
}

pub(crate) fn unsettable(view: &str, attribute: &str) -> StoreError {
    StoreError::unsupported(format!("cannot set attribute '{view}:{attribute}'"))
}

pub(crate) fn unsettable_on_create(view: &str, attribute: &str) -> StoreError {
    StoreError::unsupported(format!(
        "cannot set attribute '{view}:{attribute}' during file creation"
    ))
}

pub(crate) fn invalid_type(
    view: &str,
    attribute: &str,
    expected: &str,
    got: &AttributeValue,
) -> StoreError {
    StoreError::invalid_argument(format!(
        "invalid type {} for attribute '{view}:{attribute}': expected {expected}",
        got.type_name()
    ))
}
