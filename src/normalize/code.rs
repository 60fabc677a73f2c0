//! Administrative code and name canonicalization
//!
//! Source files disagree on code conventions (integer vs. zero-padded string,
//! differing column names by vintage). Everything entering the staged schema
//! goes through `pad_code`, so a district coded `7`, `"7"`, or `"07"` is the
//! same district everywhere downstream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Canonical width of district and neighbourhood codes
pub const CODE_WIDTH: usize = 2;

/// A code that cannot be canonicalized
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeFormatError {
    #[error("empty code")]
    Empty,

    #[error("non-numeric code: '{0}'")]
    NonNumeric(String),
}

/// A name with no entry in the static resolution table.
///
/// Resolution is exact-match only — accents, casing, and alternate spellings
/// are hard misses, recorded as errors rather than silently dropped.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown name: '{0}'")]
pub struct UnknownNameError(pub String);

/// Canonicalize an administrative code: trim, require non-empty numeric,
/// left-zero-pad to [`CODE_WIDTH`]. Codes already wider pass through.
pub fn pad_code(raw: &str) -> Result<String, CodeFormatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CodeFormatError::Empty);
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(CodeFormatError::NonNumeric(trimmed.to_string()));
    }
    Ok(format!("{:0>width$}", trimmed, width = CODE_WIDTH))
}

/// A static many-to-one name table, loaded from versioned configuration
/// rather than embedded as code constants.
///
/// Used for locale-specific district-name variants and for free-text
/// point-feature categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameTable(BTreeMap<String, String>);

impl NameTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact-match resolution. Any miss is an [`UnknownNameError`].
    pub fn resolve(&self, raw: &str) -> Result<&str, UnknownNameError> {
        self.0
            .get(raw)
            .map(String::as_str)
            .ok_or_else(|| UnknownNameError(raw.to_string()))
    }

    /// Alias-or-identity: map `raw` through the table when present,
    /// otherwise keep it. Used where the table only lists variants and the
    /// authoritative universe lives in a lookup cache.
    pub fn canonicalize<'a>(&'a self, raw: &'a str) -> &'a str {
        self.0.get(raw).map(String::as_str).unwrap_or(raw)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for NameTable {
    fn from(entries: [(&str, &str); N]) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}
