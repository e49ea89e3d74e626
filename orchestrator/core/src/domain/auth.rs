// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Caller authentication contract.
//!
//! Every request carries `Authorization: Bearer <token>`. A verifier turns
//! the token into the tenant identifier encoded in its signed claims.

use thiserror::Error;

use crate::domain::service::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must use the `Bearer <token>` scheme")]
    MalformedHeader,

    #[error("cannot validate empty token")]
    EmptyToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

pub trait TokenVerifier: Send + Sync {
    /// Verify the token's signature and return the tenant it was issued to.
    fn verify(&self, token: &str) -> Result<TenantId, AuthError>;
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}
