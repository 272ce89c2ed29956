//! Instance configuration.
//!
//! A [`Configuration`] is immutable once built. Build one with
//! [`ConfigurationBuilder`], start from a preset ([`Configuration::unix`],
//! [`Configuration::os_x`], [`Configuration::windows`]) and adjust it via
//! [`Configuration::to_builder`], or load a RON description with
//! [`Configuration::from_ron`]:
//!
//! ```ron
//! (
//!     preset: Some(unix),
//!     block_size: Some(4096),
//!     max_size: Some(1048576),
//!     attribute_views: Some(["basic", "posix"]),
//!     supported_features: Some([LINKS, SYMBOLIC_LINKS]),
//! )
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::attribute::AttributeValue;
use crate::disk::Disk;
use crate::error::{StoreError, StoreResult};
use crate::path::{
    NormalizationSet, PathNormalization, PathService, PathType, PathTypeKind, UnixPathType,
    WindowsPathType,
};
use crate::time::{FileTimeSource, SystemTimeSource};

/// Default block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Default maximum store size in bytes (4 GiB).
pub const DEFAULT_MAX_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Optional behavior an instance may support.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    /// Hard links.
    Links,
    /// Symbolic links.
    SymbolicLinks,
    /// Directory streams relative to an open directory.
    SecureDirectoryStream,
    /// Channel-style random access to regular files.
    FileChannel,
}

/// Immutable settings for one file-system instance.
#[derive(Debug, Clone)]
pub struct Configuration {
    path_type: Arc<dyn PathType>,
    display_normalization: NormalizationSet,
    canonical_normalization: NormalizationSet,
    path_equality_uses_canonical_form: bool,
    block_size: usize,
    max_size: u64,
    max_cache_size: Option<u64>,
    attribute_views: Vec<String>,
    default_attribute_values: HashMap<String, AttributeValue>,
    time_source: Arc<dyn FileTimeSource>,
    roots: Vec<String>,
    working_directory: String,
    supported_features: BTreeSet<Feature>,
    display_name: Option<String>,
}

impl Configuration {
    /// Start a builder for the given path syntax.
    pub fn builder(path_type: Arc<dyn PathType>) -> ConfigurationBuilder {
        ConfigurationBuilder::new(path_type)
    }

    /// Unix-like: root `/`, working directory `/work`, no normalization.
    pub fn unix() -> Self {
        Self::preset(
            Arc::new(UnixPathType),
            "Unix",
            NormalizationSet::none(),
            NormalizationSet::none(),
            false,
            &["/"],
            "/work",
            [
                Feature::Links,
                Feature::SymbolicLinks,
                Feature::SecureDirectoryStream,
                Feature::FileChannel,
            ],
        )
    }

    /// macOS-like: Unix syntax, NFC display names, NFD and ASCII case
    /// folding for lookup.
    pub fn os_x() -> Self {
        Self::preset(
            Arc::new(UnixPathType),
            "OSX",
            NormalizationSet::from_parts(Some(PathNormalization::Nfc), None),
            NormalizationSet::from_parts(
                Some(PathNormalization::Nfd),
                Some(PathNormalization::CaseFoldAscii),
            ),
            false,
            &["/"],
            "/work",
            [Feature::Links, Feature::SymbolicLinks, Feature::FileChannel],
        )
    }

    /// Windows-like: root `C:\`, working directory `C:\work`, ASCII case
    /// folding, and path equality on canonical forms.
    pub fn windows() -> Self {
        Self::preset(
            Arc::new(WindowsPathType),
            "Windows",
            NormalizationSet::none(),
            NormalizationSet::from_parts(None, Some(PathNormalization::CaseFoldAscii)),
            true,
            &["C:\\"],
            "C:\\work",
            [Feature::Links, Feature::SymbolicLinks, Feature::FileChannel],
        )
    }

    /// The preset matching the host platform.
    pub fn for_current_platform() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else if cfg!(target_os = "macos") {
            Self::os_x()
        } else {
            Self::unix()
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn preset(
        path_type: Arc<dyn PathType>,
        display_name: &str,
        display_normalization: NormalizationSet,
        canonical_normalization: NormalizationSet,
        path_equality_uses_canonical_form: bool,
        roots: &[&str],
        working_directory: &str,
        features: impl IntoIterator<Item = Feature>,
    ) -> Self {
        Self {
            path_type,
            display_normalization,
            canonical_normalization,
            path_equality_uses_canonical_form,
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            max_cache_size: None,
            attribute_views: vec!["basic".to_string()],
            default_attribute_values: HashMap::new(),
            time_source: Arc::new(SystemTimeSource),
            roots: roots.iter().map(|r| r.to_string()).collect(),
            working_directory: working_directory.to_string(),
            supported_features: features.into_iter().collect(),
            display_name: Some(display_name.to_string()),
        }
    }

    /// Load a configuration from a RON document.
    ///
    /// Every field of [`ConfigFile`] is optional; unset fields keep the
    /// values of the chosen preset (Unix when none is named).
    pub fn from_ron(text: &str) -> StoreResult<Self> {
        let file: ConfigFile = ron::from_str(text)?;
        file.into_configuration()
    }

    /// A builder holding this configuration's settings, minus the display
    /// name.
    pub fn to_builder(&self) -> ConfigurationBuilder {
        ConfigurationBuilder {
            path_type: Arc::clone(&self.path_type),
            display_normalization: self.display_normalization.clone(),
            canonical_normalization: self.canonical_normalization.clone(),
            path_equality_uses_canonical_form: self.path_equality_uses_canonical_form,
            block_size: self.block_size,
            max_size: self.max_size,
            max_cache_size: self.max_cache_size,
            attribute_views: self.attribute_views.clone(),
            default_attribute_values: self.default_attribute_values.clone(),
            time_source: Arc::clone(&self.time_source),
            roots: self.roots.clone(),
            working_directory: Some(self.working_directory.clone()),
            supported_features: self.supported_features.clone(),
            display_name: None,
        }
    }

    pub fn path_type(&self) -> &Arc<dyn PathType> {
        &self.path_type
    }

    pub fn display_normalization(&self) -> &NormalizationSet {
        &self.display_normalization
    }

    pub fn canonical_normalization(&self) -> &NormalizationSet {
        &self.canonical_normalization
    }

    pub fn path_equality_uses_canonical_form(&self) -> bool {
        self.path_equality_uses_canonical_form
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Maximum bytes of freed blocks kept for reuse; defaults to the
    /// maximum store size.
    pub fn max_cache_size(&self) -> u64 {
        self.max_cache_size.unwrap_or(self.max_size)
    }

    /// Maximum store size in whole blocks.
    pub fn max_block_count(&self) -> u64 {
        self.max_size / self.block_size as u64
    }

    /// Maximum cache size in whole blocks.
    pub fn max_cached_block_count(&self) -> u64 {
        self.max_cache_size() / self.block_size as u64
    }

    pub fn attribute_views(&self) -> &[String] {
        &self.attribute_views
    }

    pub fn default_attribute_values(&self) -> &HashMap<String, AttributeValue> {
        &self.default_attribute_values
    }

    pub fn time_source(&self) -> &Arc<dyn FileTimeSource> {
        &self.time_source
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    pub fn supported_features(&self) -> &BTreeSet<Feature> {
        &self.supported_features
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.supported_features.contains(&feature)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// A disk sized by this configuration.
    pub fn create_disk(&self) -> StoreResult<Disk> {
        Disk::with_sizes(self.block_size, self.max_size, self.max_cache_size())
    }

    /// A path service with this configuration's syntax and name rules.
    pub fn create_path_service(&self) -> PathService {
        PathService::new(
            Arc::clone(&self.path_type),
            self.display_normalization.clone(),
            self.canonical_normalization.clone(),
            self.path_equality_uses_canonical_form,
        )
    }
}

/// Mutable configuration under construction.
///
/// Setters validate their input immediately; [`build`](Self::build) checks
/// the settings that depend on each other.
#[derive(Debug, Clone)]
pub struct ConfigurationBuilder {
    path_type: Arc<dyn PathType>,
    display_normalization: NormalizationSet,
    canonical_normalization: NormalizationSet,
    path_equality_uses_canonical_form: bool,
    block_size: usize,
    max_size: u64,
    max_cache_size: Option<u64>,
    attribute_views: Vec<String>,
    default_attribute_values: HashMap<String, AttributeValue>,
    time_source: Arc<dyn FileTimeSource>,
    roots: Vec<String>,
    working_directory: Option<String>,
    supported_features: BTreeSet<Feature>,
    display_name: Option<String>,
}

impl ConfigurationBuilder {
    /// A builder with default sizes, no roots and no features.
    pub fn new(path_type: Arc<dyn PathType>) -> Self {
        Self {
            path_type,
            display_normalization: NormalizationSet::none(),
            canonical_normalization: NormalizationSet::none(),
            path_equality_uses_canonical_form: false,
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            max_cache_size: None,
            attribute_views: vec!["basic".to_string()],
            default_attribute_values: HashMap::new(),
            time_source: Arc::new(SystemTimeSource),
            roots: Vec::new(),
            working_directory: None,
            supported_features: BTreeSet::new(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Normalizations applied to names for display.
    pub fn with_name_display_normalization(
        mut self,
        normalizations: impl IntoIterator<Item = PathNormalization>,
    ) -> StoreResult<Self> {
        self.display_normalization = NormalizationSet::new(normalizations)?;
        Ok(self)
    }

    /// Normalizations applied to names for lookup.
    pub fn with_name_canonical_normalization(
        mut self,
        normalizations: impl IntoIterator<Item = PathNormalization>,
    ) -> StoreResult<Self> {
        self.canonical_normalization = NormalizationSet::new(normalizations)?;
        Ok(self)
    }

    /// Whether path equality, hashing and ordering use canonical forms.
    pub fn with_path_equality_uses_canonical_form(mut self, canonical: bool) -> Self {
        self.path_equality_uses_canonical_form = canonical;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> StoreResult<Self> {
        if block_size == 0 {
            return Err(StoreError::invalid_argument(
                "block size must be positive",
            ));
        }
        self.block_size = block_size;
        Ok(self)
    }

    /// Maximum bytes of file content, rounded down to a block multiple.
    pub fn with_max_size(mut self, max_size: u64) -> StoreResult<Self> {
        if max_size == 0 {
            return Err(StoreError::invalid_argument("max size must be positive"));
        }
        self.max_size = max_size;
        Ok(self)
    }

    /// Maximum bytes of freed blocks kept for reuse. Zero disables caching.
    pub fn with_max_cache_size(mut self, max_cache_size: u64) -> Self {
        self.max_cache_size = Some(max_cache_size);
        self
    }

    /// Attribute views to support. `basic` is always supported.
    pub fn with_attribute_views<S: Into<String>>(
        mut self,
        views: impl IntoIterator<Item = S>,
    ) -> Self {
        self.attribute_views = views.into_iter().map(Into::into).collect();
        self
    }

    /// Default value for a `view:attribute` on new files.
    pub fn with_default_attribute_value(
        mut self,
        attribute: &str,
        value: AttributeValue,
    ) -> StoreResult<Self> {
        if !is_attribute_key(attribute) {
            return Err(StoreError::invalid_argument(format!(
                "attribute {attribute:?} is not of the form 'view:attribute'"
            )));
        }
        self.default_attribute_values
            .insert(attribute.to_string(), value);
        Ok(self)
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn FileTimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Root directories; each must parse as a bare root.
    pub fn with_roots<S: AsRef<str>>(
        mut self,
        roots: impl IntoIterator<Item = S>,
    ) -> StoreResult<Self> {
        let mut parsed = Vec::new();
        for root in roots {
            let root = root.as_ref();
            let result = self.path_type.parse_path(root)?;
            if !result.is_root() {
                return Err(StoreError::invalid_argument(format!(
                    "invalid root: {root:?}"
                )));
            }
            parsed.push(root.to_string());
        }
        self.roots = parsed;
        Ok(self)
    }

    /// Working directory; must be absolute.
    pub fn with_working_directory(mut self, working_directory: &str) -> StoreResult<Self> {
        let result = self.path_type.parse_path(working_directory)?;
        if !result.is_absolute() {
            return Err(StoreError::invalid_argument(format!(
                "working directory must be an absolute path: {working_directory:?}"
            )));
        }
        self.working_directory = Some(working_directory.to_string());
        Ok(self)
    }

    pub fn with_supported_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.supported_features = features.into_iter().collect();
        self
    }

    /// Validate and freeze.
    ///
    /// At least one root is required, and the working directory must live
    /// under one of the roots. Without a working directory the first root
    /// is used.
    pub fn build(self) -> StoreResult<Configuration> {
        let Some(first_root) = self.roots.first() else {
            return Err(StoreError::invalid_argument(
                "at least one root is required",
            ));
        };
        let working_directory = self
            .working_directory
            .clone()
            .unwrap_or_else(|| first_root.clone());

        let work_root = self.path_type.parse_path(&working_directory)?.root;
        let mut root_found = false;
        for root in &self.roots {
            if self.path_type.parse_path(root)?.root == work_root {
                root_found = true;
                break;
            }
        }
        if !root_found {
            return Err(StoreError::invalid_argument(format!(
                "working directory {working_directory:?} is not under any configured root"
            )));
        }

        Ok(Configuration {
            path_type: self.path_type,
            display_normalization: self.display_normalization,
            canonical_normalization: self.canonical_normalization,
            path_equality_uses_canonical_form: self.path_equality_uses_canonical_form,
            block_size: self.block_size,
            max_size: self.max_size,
            max_cache_size: self.max_cache_size,
            attribute_views: self.attribute_views,
            default_attribute_values: self.default_attribute_values,
            time_source: self.time_source,
            roots: self.roots,
            working_directory,
            supported_features: self.supported_features,
            display_name: self.display_name,
        })
    }
}

/// `view:attribute` with both parts non-empty and no further colon.
fn is_attribute_key(s: &str) -> bool {
    matches!(
        s.split_once(':'),
        Some((view, attr)) if !view.is_empty() && !attr.is_empty() && !attr.contains(':')
    )
}

/// Named starting points for a [`ConfigFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Unix,
    OsX,
    Windows,
}

impl Preset {
    pub fn configuration(self) -> Configuration {
        match self {
            Preset::Unix => Configuration::unix(),
            Preset::OsX => Configuration::os_x(),
            Preset::Windows => Configuration::windows(),
        }
    }
}

/// Serialized description of a [`Configuration`].
///
/// Either `preset` or `path_type` picks the starting point; the remaining
/// fields override it. The time source is not part of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub preset: Option<Preset>,
    pub path_type: Option<PathTypeKind>,
    pub display_name: Option<String>,
    pub name_display_normalization: Option<Vec<PathNormalization>>,
    pub name_canonical_normalization: Option<Vec<PathNormalization>>,
    pub path_equality_uses_canonical_form: Option<bool>,
    pub block_size: Option<usize>,
    pub max_size: Option<u64>,
    pub max_cache_size: Option<u64>,
    pub attribute_views: Option<Vec<String>>,
    pub default_attribute_values: HashMap<String, AttributeValue>,
    pub roots: Option<Vec<String>>,
    pub working_directory: Option<String>,
    pub supported_features: Option<Vec<Feature>>,
}

impl ConfigFile {
    /// Validate through a [`ConfigurationBuilder`].
    pub fn into_configuration(self) -> StoreResult<Configuration> {
        let mut builder = match (self.preset, self.path_type) {
            (Some(_), Some(_)) => {
                return Err(StoreError::invalid_argument(
                    "set either preset or path_type, not both",
                ));
            }
            (Some(preset), None) => preset.configuration().to_builder(),
            (None, Some(kind)) => ConfigurationBuilder::new(kind.build()),
            (None, None) => Configuration::unix().to_builder(),
        };

        if let Some(name) = self.display_name {
            builder = builder.with_display_name(name);
        }
        if let Some(n) = self.name_display_normalization {
            builder = builder.with_name_display_normalization(n)?;
        }
        if let Some(n) = self.name_canonical_normalization {
            builder = builder.with_name_canonical_normalization(n)?;
        }
        if let Some(canonical) = self.path_equality_uses_canonical_form {
            builder = builder.with_path_equality_uses_canonical_form(canonical);
        }
        if let Some(size) = self.block_size {
            builder = builder.with_block_size(size)?;
        }
        if let Some(size) = self.max_size {
            builder = builder.with_max_size(size)?;
        }
        if let Some(size) = self.max_cache_size {
            builder = builder.with_max_cache_size(size);
        }
        if let Some(views) = self.attribute_views {
            builder = builder.with_attribute_views(views);
        }
        for (attribute, value) in self.default_attribute_values {
            builder = builder.with_default_attribute_value(&attribute, value)?;
        }
        if let Some(roots) = self.roots {
            builder = builder.with_roots(roots)?;
        }
        if let Some(dir) = self.working_directory {
            builder = builder.with_working_directory(&dir)?;
        }
        if let Some(features) = self.supported_features {
            builder = builder.with_supported_features(features);
        }
        builder.build()
    }
}
