// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::domain::auth::{AuthError, TokenVerifier};
use crate::domain::service::TenantId;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Failed to read key {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid RSA key: {0}")]
    Parse(#[from] jsonwebtoken::errors::Error),

    #[error("System clock is before the Unix epoch")]
    Clock,
}

/// Claims carried by a caller's bearer token. The tenant is the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClaims {
    pub sub: String,
    pub exp: u64,
}

fn read_pem(path: &Path) -> Result<Vec<u8>, KeyError> {
    std::fs::read(path).map_err(|source| KeyError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// RS256 verifier for tenant tokens
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
}

impl JwtTokenVerifier {
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        Ok(Self {
            decoding_key: DecodingKey::from_rsa_pem(pem)?,
        })
    }

    /// Load the public key once at startup
    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        Self::from_pem(&read_pem(path)?)
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<TenantId, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TenantClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if data.claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        Ok(TenantId::new(data.claims.sub))
    }
}

/// RS256 signer used by `spinup token issue`
pub struct JwtTokenIssuer {
    encoding_key: EncodingKey,
}

impl JwtTokenIssuer {
    pub fn from_pem(pem: &[u8]) -> Result<Self, KeyError> {
        Ok(Self {
            encoding_key: EncodingKey::from_rsa_pem(pem)?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, KeyError> {
        Self::from_pem(&read_pem(path)?)
    }

    pub fn issue(&self, tenant_id: &TenantId, lifetime: Duration) -> Result<String, KeyError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| KeyError::Clock)?;
        let claims = TenantClaims {
            sub: tenant_id.to_string(),
            exp: (now + lifetime).as_secs(),
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?)
    }
}
