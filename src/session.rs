use chrono::Utc;
use tracing::debug;

use crate::error::CredentialError;
use crate::storage::{Storage, TOKEN_KEY};
use crate::token::{decode_claims, Claims};

/// Values some clients write in place of a missing credential.
const ABSENCE_MARKERS: [&str; 3] = ["", "undefined", "null"];

/// Decides whether the stored credential can back a session at `now`
/// (seconds since the epoch). Reads storage only; no network I/O.
pub fn validate_at(storage: &dyn Storage, now: i64) -> Result<Claims, CredentialError> {
    let credential = storage
        .get(TOKEN_KEY)
        .filter(|value| !ABSENCE_MARKERS.contains(&value.trim()))
        .ok_or(CredentialError::Missing)?;

    let claims = decode_claims(&credential)?;
    if let Some(exp) = claims.expiry()? {
        if exp < now {
            return Err(CredentialError::Expired { exp, now });
        }
    }
    Ok(claims)
}

pub fn validate(storage: &dyn Storage) -> Result<Claims, CredentialError> {
    validate_at(storage, Utc::now().timestamp())
}

/// Boolean form of [`validate`], logging why a session was refused.
pub fn is_valid(storage: &dyn Storage) -> bool {
    match validate(storage) {
        Ok(_) => true,
        Err(reason) => {
            debug!(%reason, "session invalid");
            false
        }
    }
}
