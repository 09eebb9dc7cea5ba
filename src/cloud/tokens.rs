//! Personal access token issuance and verification (spec.md 4.8, "Token
//! issuance"): `espat_<hex6>.<hex18>` raw tokens, hashed at rest under an
//! HMAC-SHA256 pepper the same way local state's key-check tag is computed
//! (`core::crypto::key_check`).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{CloudError, Result};

use super::models::PersonalAccessToken;

type HmacSha256 = Hmac<Sha256>;

pub const ALLOWED_SCOPES: &[&str] = &["profile:read", "store:read", "store:write", "tokens:write", "*"];

pub struct IssuedToken {
    pub record: PersonalAccessToken,
    /// The raw secret, returned to the caller exactly once.
    pub raw: String,
}

fn hash_token(raw: &str, pepper: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(raw.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Extract the lookup prefix from a presented token: everything up to `.`
/// if present, else the first 12 characters.
pub fn prefix_of(raw: &str) -> &str {
    match raw.split_once('.') {
        Some((prefix, _)) => prefix,
        None => &raw[..raw.len().min(12)],
    }
}

pub fn issue(user_id: Uuid, scopes: Vec<String>, expires_at: Option<DateTime<Utc>>, pepper: &str) -> Result<IssuedToken> {
    for scope in &scopes {
        if !ALLOWED_SCOPES.contains(&scope.as_str()) {
            return Err(crate::error::Error::Other(format!(
                "unknown scope '{scope}': expected one of {ALLOWED_SCOPES:?}"
            )));
        }
    }

    let mut prefix_bytes = [0u8; 6];
    let mut secret_bytes = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut prefix_bytes);
    rand::thread_rng().fill_bytes(&mut secret_bytes);

    let prefix = format!("espat_{}", hex::encode(prefix_bytes));
    let raw = format!("{prefix}.{}", hex::encode(secret_bytes));
    let hash_hex = hash_token(&raw, pepper);

    let record = PersonalAccessToken {
        id: Uuid::new_v4(),
        user_id,
        prefix,
        hash_hex,
        scopes,
        expires_at,
        revoked_at: None,
        last_used_at: None,
        created_at: Utc::now(),
    };

    Ok(IssuedToken { record, raw })
}

/// Verify a presented raw token against its stored record: constant-time
/// hash comparison, then revocation/expiry checks (spec.md 4.8, "PAT
/// validation").
pub fn verify(raw: &str, record: &PersonalAccessToken, pepper: &str) -> Result<()> {
    let computed = hash_token(raw, pepper);
    let matches: bool = computed.as_bytes().ct_eq(record.hash_hex.as_bytes()).into();
    if !matches {
        return Err(crate::error::AuthError::Unauthorized.into());
    }
    if record.revoked_at.is_some() {
        return Err(crate::error::AuthError::TokenRevoked.into());
    }
    if record.expires_at.is_some_and(|exp| exp < Utc::now()) {
        return Err(crate::error::AuthError::TokenExpired.into());
    }
    Ok(())
}

pub fn has_scope(record: &PersonalAccessToken, required: &str) -> bool {
    record.scopes.iter().any(|s| s == "*" || s == required)
}

pub fn not_found(id: Uuid) -> crate::error::Error {
    CloudError::TokenNotFound(id.to_string()).into()
}
