//! Standard attribute views.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StoreResult;
use crate::file::File;

use super::{
    AttributeProvider, AttributeValue, PosixPermissions, invalid_type, unsettable,
    unsettable_on_create,
};

/// Look up a built-in provider by view name.
pub fn standard_provider(view: &str) -> Option<Arc<dyn AttributeProvider>> {
    match view {
        "basic" => Some(Arc::new(BasicAttributeProvider)),
        "owner" => Some(Arc::new(OwnerAttributeProvider)),
        "posix" => Some(Arc::new(PosixAttributeProvider)),
        "dos" => Some(Arc::new(DosAttributeProvider)),
        "user" => Some(Arc::new(UserDefinedAttributeProvider)),
        _ => None,
    }
}

/// A user default for `view:attribute`, or `fallback`.
fn user_default(
    user_defaults: &HashMap<String, AttributeValue>,
    view: &str,
    attribute: &str,
    fallback: AttributeValue,
) -> AttributeValue {
    user_defaults
        .get(&format!("{view}:{attribute}"))
        .cloned()
        .unwrap_or(fallback)
}

/// `basic`: size, kind flags, file key and timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAttributeProvider;

impl AttributeProvider for BasicAttributeProvider {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn fixed_attributes(&self) -> &'static [&'static str] {
        &[
            "size",
            "fileKey",
            "isDirectory",
            "isRegularFile",
            "isSymbolicLink",
            "isOther",
            "creationTime",
            "lastModifiedTime",
            "lastAccessTime",
        ]
    }

    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue> {
        let value = match attribute {
            "size" => AttributeValue::Int(file.size() as i64),
            "fileKey" => AttributeValue::FileKey(file.id()),
            "isDirectory" => AttributeValue::Bool(file.is_directory()),
            "isRegularFile" => AttributeValue::Bool(file.is_regular_file()),
            "isSymbolicLink" => AttributeValue::Bool(file.is_symbolic_link()),
            "isOther" => AttributeValue::Bool(false),
            "creationTime" => AttributeValue::Time(file.creation_time()),
            "lastModifiedTime" => AttributeValue::Time(file.last_modified_time()),
            "lastAccessTime" => AttributeValue::Time(file.last_access_time()),
            _ => return None,
        };
        Some(value)
    }

    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        on_create: bool,
    ) -> StoreResult<()> {
        let setter: fn(&File, std::time::SystemTime) = match attribute {
            "creationTime" => File::set_creation_time,
            "lastModifiedTime" => File::set_last_modified_time,
            "lastAccessTime" => File::set_last_access_time,
            _ => return Err(unsettable(self.name(), attribute)),
        };
        if on_create {
            return Err(unsettable_on_create(self.name(), attribute));
        }
        match value {
            AttributeValue::Time(t) => {
                setter(file, t);
                Ok(())
            }
            other => Err(invalid_type(self.name(), attribute, "time", &other)),
        }
    }
}

/// `owner`: the owning principal's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerAttributeProvider;

impl AttributeProvider for OwnerAttributeProvider {
    fn name(&self) -> &'static str {
        "owner"
    }

    fn fixed_attributes(&self) -> &'static [&'static str] {
        &["owner"]
    }

    fn default_values(
        &self,
        user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Vec<(String, AttributeValue)>> {
        let owner = user_default(user_defaults, "owner", "owner", AttributeValue::Text("user".into()));
        if !matches!(owner, AttributeValue::Text(_)) {
            return Err(invalid_type("owner", "owner", "text", &owner));
        }
        Ok(vec![("owner".to_string(), owner)])
    }

    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue> {
        file.get_attribute(self.name(), attribute)
    }

    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        _on_create: bool,
    ) -> StoreResult<()> {
        if attribute != "owner" {
            return Err(unsettable(self.name(), attribute));
        }
        match value {
            AttributeValue::Text(_) => {
                file.set_attribute(self.name(), attribute, value);
                Ok(())
            }
            other => Err(invalid_type(self.name(), attribute, "text", &other)),
        }
    }
}

/// `posix`: group and permission bits, plus `basic` and `owner`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixAttributeProvider;

impl PosixAttributeProvider {
    fn permissions(attribute: &str, value: AttributeValue) -> StoreResult<AttributeValue> {
        match value {
            AttributeValue::Permissions(_) => Ok(value),
            AttributeValue::Text(s) => Ok(AttributeValue::Permissions(s.parse()?)),
            other => Err(invalid_type("posix", attribute, "permissions", &other)),
        }
    }
}

impl AttributeProvider for PosixAttributeProvider {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn inherits(&self) -> &'static [&'static str] {
        &["basic", "owner"]
    }

    fn fixed_attributes(&self) -> &'static [&'static str] {
        &["group", "permissions"]
    }

    fn default_values(
        &self,
        user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Vec<(String, AttributeValue)>> {
        let group = user_default(user_defaults, "posix", "group", AttributeValue::Text("group".into()));
        if !matches!(group, AttributeValue::Text(_)) {
            return Err(invalid_type("posix", "group", "text", &group));
        }
        let permissions = Self::permissions(
            "permissions",
            user_default(
                user_defaults,
                "posix",
                "permissions",
                AttributeValue::Permissions(PosixPermissions::from_mode(0o644)),
            ),
        )?;
        Ok(vec![
            ("group".to_string(), group),
            ("permissions".to_string(), permissions),
        ])
    }

    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue> {
        file.get_attribute(self.name(), attribute)
    }

    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        _on_create: bool,
    ) -> StoreResult<()> {
        let value = match attribute {
            "group" => match value {
                AttributeValue::Text(_) => value,
                other => return Err(invalid_type(self.name(), attribute, "text", &other)),
            },
            "permissions" => Self::permissions(attribute, value)?,
            _ => return Err(unsettable(self.name(), attribute)),
        };
        file.set_attribute(self.name(), attribute, value);
        Ok(())
    }
}

/// `dos`: the four DOS flags, plus `basic`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DosAttributeProvider;

impl AttributeProvider for DosAttributeProvider {
    fn name(&self) -> &'static str {
        "dos"
    }

    fn inherits(&self) -> &'static [&'static str] {
        &["basic"]
    }

    fn fixed_attributes(&self) -> &'static [&'static str] {
        &["readonly", "hidden", "archive", "system"]
    }

    fn default_values(
        &self,
        user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Vec<(String, AttributeValue)>> {
        self.fixed_attributes()
            .iter()
            .map(|attr| {
                let value = user_default(user_defaults, "dos", attr, AttributeValue::Bool(false));
                match value {
                    AttributeValue::Bool(_) => Ok((attr.to_string(), value)),
                    other => Err(invalid_type("dos", attr, "bool", &other)),
                }
            })
            .collect()
    }

    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue> {
        file.get_attribute(self.name(), attribute)
    }

    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        _on_create: bool,
    ) -> StoreResult<()> {
        if !self.supports(attribute) {
            return Err(unsettable(self.name(), attribute));
        }
        match value {
            AttributeValue::Bool(_) => {
                file.set_attribute(self.name(), attribute, value);
                Ok(())
            }
            other => Err(invalid_type(self.name(), attribute, "bool", &other)),
        }
    }
}

/// `user`: arbitrary named byte values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserDefinedAttributeProvider;

impl AttributeProvider for UserDefinedAttributeProvider {
    fn name(&self) -> &'static str {
        "user"
    }

    fn fixed_attributes(&self) -> &'static [&'static str] {
        &[]
    }

    fn supports(&self, attribute: &str) -> bool {
        !attribute.is_empty()
    }

    fn attributes(&self, file: &File) -> Vec<String> {
        file.attribute_names(self.name())
    }

    fn get(&self, file: &File, attribute: &str) -> Option<AttributeValue> {
        file.get_attribute(self.name(), attribute)
    }

    fn set(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        on_create: bool,
    ) -> StoreResult<()> {
        if on_create {
            return Err(unsettable_on_create(self.name(), attribute));
        }
        let bytes = match value {
            AttributeValue::Bytes(b) => b,
            AttributeValue::Text(s) => s.into_bytes(),
            other => return Err(invalid_type(self.name(), attribute, "bytes", &other)),
        };
        file.set_attribute(self.name(), attribute, AttributeValue::Bytes(bytes));
        Ok(())
    }
}
