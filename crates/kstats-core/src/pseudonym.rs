//! Deterministic salted pseudonymization of nicknames.
//!
//! Argon2id over the lowercased nick, keyed by the channel salt. The
//! cost parameters are fixed for the operational lifetime of the
//! system: changing any of them (or rotating a channel salt)
//! desynchronizes every digest stored for unchanged nicks.

use argon2::{Algorithm, Argon2, Params, Version};
use thiserror::Error;

use kstats_types::models::Digest;

const M_COST_KIB: u32 = 19_456;
const T_COST: u32 = 2;
const P_COST: u32 = 1;
const DIGEST_LEN: usize = 32;

#[derive(Debug, Error)]
#[error("pseudonymization failed: {0}")]
pub struct PseudonymError(String);

/// Derive the pseudonymous digest for `nick` under a channel salt.
///
/// The nick is lowercased first, so identity is case-insensitive.
/// Output is always 64 lowercase hex characters. Fails only on an
/// unusable salt (shorter than the KDF minimum of 8 bytes).
pub fn digest(salt: &str, nick: &str) -> Result<Digest, PseudonymError> {
    let params = Params::new(M_COST_KIB, T_COST, P_COST, Some(DIGEST_LEN))
        .map_err(|e| PseudonymError(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; DIGEST_LEN];
    argon2
        .hash_password_into(nick.to_lowercase().as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| PseudonymError(e.to_string()))?;

    Ok(Digest::from(hex::encode(out)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &str = "test-salt-alpha";

    #[test]
    fn identical_inputs_yield_identical_digests() {
        assert_eq!(digest(SALT, "carol").unwrap(), digest(SALT, "carol").unwrap());
    }

    #[test]
    fn nick_case_is_ignored() {
        let lower = digest(SALT, "carol").unwrap();
        assert_eq!(lower, digest(SALT, "Carol").unwrap());
        assert_eq!(lower, digest(SALT, "CAROL").unwrap());
    }

    #[test]
    fn different_salts_yield_unrelated_digests() {
        let a = digest("test-salt-alpha", "carol").unwrap();
        let b = digest("test-salt-bravo", "carol").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn output_is_fixed_length_lowercase_hex() {
        let d = digest(SALT, "Carol").unwrap();
        assert_eq!(d.as_str().len(), 64);
        assert!(d.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn short_salt_is_rejected() {
        assert!(digest("ab", "carol").is_err());
    }
}
