//! Name normalizations and validated normalization sets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use unicode_normalization::UnicodeNormalization;

use crate::error::{StoreError, StoreResult};

/// A normalization applied to a file name string.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathNormalization {
    /// No normalization; clears any set it appears in.
    None,
    /// Unicode composed form.
    Nfc,
    /// Unicode decomposed form.
    Nfd,
    /// Full Unicode case folding.
    CaseFoldUnicode,
    /// Case folding for ASCII letters only.
    CaseFoldAscii,
}

impl PathNormalization {
    /// Apply this normalization to a string.
    pub fn apply(self, s: &str) -> String {
        match self {
            PathNormalization::None => s.to_string(),
            PathNormalization::Nfc => s.nfc().collect(),
            PathNormalization::Nfd => s.nfd().collect(),
            PathNormalization::CaseFoldUnicode => caseless::default_case_fold_str(s),
            PathNormalization::CaseFoldAscii => s.to_ascii_lowercase(),
        }
    }

    /// Returns true for the case-folding normalizations.
    pub fn is_case_fold(self) -> bool {
        matches!(
            self,
            PathNormalization::CaseFoldUnicode | PathNormalization::CaseFoldAscii
        )
    }

    /// Returns true for the Unicode form normalizations.
    pub fn is_unicode_form(self) -> bool {
        matches!(self, PathNormalization::Nfc | PathNormalization::Nfd)
    }
}

/// A conflict-free set of normalizations.
///
/// Holds at most one Unicode form and at most one case folding. Unicode form
/// is applied before case folding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathNormalization>", into = "Vec<PathNormalization>")]
pub struct NormalizationSet {
    form: Option<PathNormalization>,
    case_fold: Option<PathNormalization>,
}

impl NormalizationSet {
    /// The empty set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Validate a list of normalizations.
    ///
    /// `None` yields the empty set, and nothing may follow it. Two Unicode
    /// forms or two case foldings are rejected.
    pub fn new(normalizations: impl IntoIterator<Item = PathNormalization>) -> StoreResult<Self> {
        let mut set = Self::default();
        let mut none: Option<PathNormalization> = None;
        for n in normalizations {
            Self::check_not_set(n, none)?;
            let slot = match n {
                PathNormalization::None => {
                    none = Some(n);
                    continue;
                }
                PathNormalization::Nfc | PathNormalization::Nfd => &mut set.form,
                PathNormalization::CaseFoldUnicode | PathNormalization::CaseFoldAscii => {
                    &mut set.case_fold
                }
            };
            Self::check_not_set(n, *slot)?;
            *slot = Some(n);
        }
        if none.is_some() {
            return Ok(Self::default());
        }
        Ok(set)
    }

    fn check_not_set(n: PathNormalization, existing: Option<PathNormalization>) -> StoreResult<()> {
        match existing {
            Some(existing) => Err(StoreError::invalid_argument(format!(
                "can't set normalization {n}: normalization {existing} already set"
            ))),
            None => Ok(()),
        }
    }

    /// A set known to be conflict-free.
    pub(crate) const fn from_parts(
        form: Option<PathNormalization>,
        case_fold: Option<PathNormalization>,
    ) -> Self {
        Self { form, case_fold }
    }

    /// Returns true if no normalization is applied.
    pub fn is_empty(&self) -> bool {
        self.form.is_none() && self.case_fold.is_none()
    }

    /// Returns true if the given normalization is part of the set.
    pub fn contains(&self, n: PathNormalization) -> bool {
        self.form == Some(n) || self.case_fold == Some(n)
    }

    /// The case folding in effect, if any.
    pub fn case_fold(&self) -> Option<PathNormalization> {
        self.case_fold
    }

    /// The Unicode form in effect, if any.
    pub fn unicode_form(&self) -> Option<PathNormalization> {
        self.form
    }

    /// Members in application order.
    pub fn iter(&self) -> impl Iterator<Item = PathNormalization> + '_ {
        self.form.into_iter().chain(self.case_fold)
    }

    /// Normalize a string.
    pub fn normalize(&self, s: &str) -> String {
        let mut out = match self.form {
            Some(form) => form.apply(s),
            None => s.to_string(),
        };
        if let Some(fold) = self.case_fold {
            out = fold.apply(&out);
        }
        out
    }

    /// Apply only the Unicode form, leaving case untouched.
    pub fn normalize_form(&self, s: &str) -> String {
        match self.form {
            Some(form) => form.apply(s),
            None => s.to_string(),
        }
    }
}

impl TryFrom<Vec<PathNormalization>> for NormalizationSet {
    type Error = StoreError;

    fn try_from(value: Vec<PathNormalization>) -> StoreResult<Self> {
        Self::new(value)
    }
}

impl From<NormalizationSet> for Vec<PathNormalization> {
    fn from(set: NormalizationSet) -> Self {
        set.iter().collect()
    }
}
