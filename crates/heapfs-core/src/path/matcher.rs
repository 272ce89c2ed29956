//! Glob and regex path matchers.
//!
//! Patterns take the form `syntax:pattern` where syntax is `glob` or `regex`
//! (case-insensitive). Both compile to an anchored [`Regex`]; globs go
//! through [`glob_to_regex`] first.
//!
//! Matching applies the governing normalization set to the pattern and to
//! the candidate path string, and compiles case-insensitively when that set
//! folds case. For `regex:` only the Unicode form is applied to the pattern
//! text, since folding would change the meaning of escapes like `\S`.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use strum::{Display, EnumString};

use crate::error::{StoreError, StoreResult};

use super::heap_path::HeapPath;
use super::normalization::NormalizationSet;

/// Pattern language of a matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatcherSyntax {
    Glob,
    Regex,
}

/// A compiled path matcher.
#[derive(Clone)]
pub struct PathMatcher {
    syntax: MatcherSyntax,
    pattern: String,
    regex: Regex,
    normalization: NormalizationSet,
}

impl PathMatcher {
    /// Compile `syntax:pattern` for paths using the given separators.
    pub fn compile(
        syntax_and_pattern: &str,
        separators: &str,
        normalization: &NormalizationSet,
    ) -> StoreResult<Self> {
        let (syntax, pattern) = syntax_and_pattern.split_once(':').ok_or_else(|| {
            StoreError::invalid_argument(format!(
                "must be of the form 'syntax:pattern': {syntax_and_pattern:?}"
            ))
        })?;
        let syntax = MatcherSyntax::from_str(syntax)
            .map_err(|_| StoreError::unsupported(format!("path matcher syntax {syntax:?}")))?;

        let regex_source = match syntax {
            MatcherSyntax::Glob => glob_to_regex(&normalization.normalize(pattern), separators)?,
            MatcherSyntax::Regex => normalization.normalize_form(pattern),
        };
        let regex = RegexBuilder::new(&format!(r"\A(?:{regex_source})\z"))
            .case_insensitive(normalization.case_fold().is_some())
            .build()
            .map_err(|e| StoreError::invalid_argument(format!("bad pattern {pattern:?}: {e}")))?;

        Ok(Self {
            syntax,
            pattern: pattern.to_string(),
            regex,
            normalization: normalization.clone(),
        })
    }

    pub fn syntax(&self) -> MatcherSyntax {
        self.syntax
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test a path's display string.
    pub fn matches(&self, path: &HeapPath) -> bool {
        self.matches_str(&path.to_string())
    }

    /// Test a raw string.
    pub fn matches_str(&self, candidate: &str) -> bool {
        self.regex.is_match(&self.normalization.normalize(candidate))
    }
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("syntax", &self.syntax)
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Translate a glob into an unanchored regex.
///
/// - `*` matches within one name, `**` across names
/// - `?` matches one non-separator character
/// - `[abc]`, `[a-z]`, `[!a]` are character classes that never match a separator
/// - `{a,b}` is alternation, not nestable
/// - `\` escapes the next character
pub fn glob_to_regex(glob: &str, separators: &str) -> StoreResult<String> {
    let seps: String = separators
        .chars()
        .map(|c| regex::escape(c.encode_utf8(&mut [0u8; 4])))
        .collect();
    let not_sep = format!("[^{seps}]");
    let error = |msg: &str| StoreError::invalid_argument(format!("{msg} in glob {glob:?}"));

    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| error("dangling escape"))?;
                out.push_str(&regex::escape(escaped.encode_utf8(&mut [0u8; 4])));
            }
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str(&not_sep);
                    out.push('*');
                }
            }
            '?' => out.push_str(&not_sep),
            '[' => {
                let negated = chars.next_if_eq(&'!').is_some();
                let mut body = String::new();
                loop {
                    let member = chars.next().ok_or_else(|| error("unclosed character class"))?;
                    match member {
                        ']' if !body.is_empty() => break,
                        ']' => return Err(error("empty character class")),
                        c if separators.contains(c) => {
                            return Err(error("separator in character class"));
                        }
                        '-' => body.push('-'),
                        '[' | '\\' | '&' | '~' | '^' => {
                            body.push('\\');
                            body.push(member);
                        }
                        other => body.push(other),
                    }
                }
                // A negated class still must not cross a name boundary.
                if negated {
                    out.push_str(&format!("[^{body}{seps}]"));
                } else {
                    out.push_str(&format!("[{body}]"));
                }
            }
            '{' => {
                if in_group {
                    return Err(error("nested group"));
                }
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            c if separators.contains(c) => {
                out.push('[');
                out.push_str(&seps);
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }

    if in_group {
        return Err(error("unclosed group"));
    }
    Ok(out)
}
