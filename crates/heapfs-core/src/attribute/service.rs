use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{StoreError, StoreResult};
use crate::file::File;

use super::{AttributeProvider, AttributeValue, standard_provider};

/// Routes attribute requests to the providers of the enabled views.
#[derive(Debug)]
pub struct AttributeService {
    providers: IndexMap<&'static str, Arc<dyn AttributeProvider>>,
    /// `(view, attribute, value)` applied to every new file.
    defaults: Vec<(&'static str, String, AttributeValue)>,
}

impl AttributeService {
    /// Build from standard view names.
    ///
    /// `basic` is always enabled, and every view brings the views it
    /// inherits.
    pub fn new(
        views: &[String],
        user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Self> {
        let mut pending: Vec<String> = vec!["basic".to_string()];
        pending.extend(views.iter().cloned());
        let mut providers: Vec<Arc<dyn AttributeProvider>> = Vec::new();
        while let Some(view) = pending.pop() {
            if providers.iter().any(|p| p.name() == view) {
                continue;
            }
            let provider = standard_provider(&view).ok_or_else(|| {
                StoreError::unsupported_attribute(format!("unknown attribute view {view:?}"))
            })?;
            pending.extend(provider.inherits().iter().map(|v| v.to_string()));
            providers.push(provider);
        }
        // Stable order: basic first, then as requested.
        providers.reverse();
        Self::with_providers(providers, user_defaults)
    }

    /// Build from explicit providers. Every inherited view must be present.
    pub fn with_providers(
        providers: impl IntoIterator<Item = Arc<dyn AttributeProvider>>,
        user_defaults: &HashMap<String, AttributeValue>,
    ) -> StoreResult<Self> {
        let providers: IndexMap<&'static str, Arc<dyn AttributeProvider>> =
            providers.into_iter().map(|p| (p.name(), p)).collect();
        for provider in providers.values() {
            for inherited in provider.inherits() {
                if !providers.contains_key(inherited) {
                    return Err(StoreError::invalid_argument(format!(
                        "view {:?} inherits {inherited:?}, which is not enabled",
                        provider.name()
                    )));
                }
            }
        }
        let mut defaults = Vec::new();
        for provider in providers.values() {
            for (attribute, value) in provider.default_values(user_defaults)? {
                defaults.push((provider.name(), attribute, value));
            }
        }
        Ok(Self {
            providers,
            defaults,
        })
    }

    /// Names of the enabled views.
    pub fn supported_views(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    pub fn supports_view(&self, view: &str) -> bool {
        self.providers.contains_key(view)
    }

    /// Apply defaults to a new file, then the caller's initial attributes.
    pub fn set_initial_attributes(
        &self,
        file: &File,
        initial: &[(&str, AttributeValue)],
    ) -> StoreResult<()> {
        for (view, attribute, value) in &self.defaults {
            file.set_attribute(view, attribute, value.clone());
        }
        for (attribute, value) in initial {
            self.set_attribute(file, attribute, value.clone(), true)?;
        }
        Ok(())
    }

    /// Read one attribute, `view:name` or bare `name` for `basic`.
    pub fn get_attribute(&self, file: &File, attribute: &str) -> StoreResult<AttributeValue> {
        let (view, name) = parse_attribute(attribute)?;
        let provider = self.owner_of(view, name)?;
        provider
            .get(file, name)
            .ok_or_else(|| StoreError::invalid_argument(format!("attribute {attribute:?} is not set")))
    }

    /// Write one attribute.
    pub fn set_attribute(
        &self,
        file: &File,
        attribute: &str,
        value: AttributeValue,
        on_create: bool,
    ) -> StoreResult<()> {
        let (view, name) = parse_attribute(attribute)?;
        let provider = self.owner_of(view, name)?;
        provider.set(file, name, value, on_create)
    }

    /// Read several attributes: `view:a,b,c` or `view:*`.
    ///
    /// Keys in the result are bare attribute names.
    pub fn read_attributes(
        &self,
        file: &File,
        attributes: &str,
    ) -> StoreResult<BTreeMap<String, AttributeValue>> {
        let (view, list) = parse_attribute(attributes)?;
        let names: Vec<&str> = list.split(',').map(str::trim).collect();
        if names.iter().any(|n| n.is_empty()) {
            return Err(StoreError::invalid_argument(format!(
                "invalid attributes {attributes:?}"
            )));
        }
        self.provider(view)?;

        let mut out = BTreeMap::new();
        if names.contains(&"*") {
            if names.len() > 1 {
                return Err(StoreError::invalid_argument(format!(
                    "invalid attributes {attributes:?}: '*' must appear alone"
                )));
            }
            for provider in self.lineage(view) {
                for name in provider.attributes(file) {
                    if let Some(value) = provider.get(file, &name) {
                        out.entry(name).or_insert(value);
                    }
                }
            }
        } else {
            for name in names {
                let provider = self.owner_of(view, name)?;
                if let Some(value) = provider.get(file, name) {
                    out.insert(name.to_string(), value);
                }
            }
        }
        Ok(out)
    }

    fn provider(&self, view: &str) -> StoreResult<&Arc<dyn AttributeProvider>> {
        self.providers.get(view).ok_or_else(|| {
            StoreError::unsupported_attribute(format!("view {view:?} is not supported"))
        })
    }

    /// The view and everything it inherits, depth first, each once.
    fn lineage(&self, view: &str) -> Vec<&Arc<dyn AttributeProvider>> {
        let mut out: Vec<&Arc<dyn AttributeProvider>> = Vec::new();
        let mut stack = vec![view];
        while let Some(v) = stack.pop() {
            let Some(provider) = self.providers.get(v) else {
                continue;
            };
            if out.iter().any(|p| p.name() == provider.name()) {
                continue;
            }
            stack.extend(provider.inherits().iter().rev());
            out.push(provider);
        }
        out
    }

    /// The provider in `view`'s lineage that defines `attribute`.
    fn owner_of(&self, view: &str, attribute: &str) -> StoreResult<&Arc<dyn AttributeProvider>> {
        self.provider(view)?;
        self.lineage(view)
            .into_iter()
            .find(|p| p.supports(attribute))
            .ok_or_else(|| {
                StoreError::invalid_argument(format!(
                    "invalid attribute '{attribute}' for view '{view}'"
                ))
            })
    }
}

/// Split `view:name`, defaulting the view to `basic`.
fn parse_attribute(attribute: &str) -> StoreResult<(&str, &str)> {
    let (view, name) = attribute.split_once(':').unwrap_or(("basic", attribute));
    if view.is_empty() || name.is_empty() || name.contains(':') {
        return Err(StoreError::invalid_argument(format!(
            "invalid attribute {attribute:?}"
        )));
    }
    Ok((view, name))
}
