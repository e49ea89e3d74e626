// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Sanitizer Domain Service
//!
//! Tenant identifiers and cluster names are joined onto the project root to
//! build service directories and per-tenant store paths. This module makes
//! sure such identifiers can only ever name a single directory below the
//! root.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Reject identifiers that would escape the project root

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest identifier accepted as a path segment
pub const MAX_SEGMENT_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains invalid character {found:?}; allowed: letters, digits, '-' and '_'")]
    InvalidCharacter { field: &'static str, found: char },
}

/// Validate that `value` is a single safe path segment.
pub fn validate_segment(field: &'static str, value: &str) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { field });
    }
    if value.len() > MAX_SEGMENT_LEN {
        return Err(IdentifierError::TooLong { field, max: MAX_SEGMENT_LEN });
    }
    if let Some(found) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        tracing::warn!(field, value, "Rejected unsafe path segment");
        return Err(IdentifierError::InvalidCharacter { field, found });
    }
    Ok(())
}

/// Join already-validated segments onto `root`.
pub fn join_segments(root: &Path, segments: &[&str]) -> Result<PathBuf, IdentifierError> {
    let mut path = root.to_path_buf();
    for segment in segments {
        validate_segment("path segment", segment)?;
        path.push(segment);
    }
    Ok(path)
}
