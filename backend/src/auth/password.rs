use pbkdf2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::distributions::Alphanumeric;
use rand::Rng;

#[cfg(not(test))]
const ROUNDS: u32 = 600_000;
#[cfg(test)]
const ROUNDS: u32 = 1_000;

const SALT_LEN: usize = 16;
const OUTPUT_LEN: usize = 32;

/// Hash a password with PBKDF2-HMAC-SHA256 and a fresh random salt.
///
/// The result is a PHC string (`$pbkdf2-sha256$i=...,l=32$<salt>$<hash>`)
/// carrying its own parameters, so the round count can change without
/// invalidating stored hashes.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt)?;
    let params = Params {
        rounds: ROUNDS,
        output_length: OUTPUT_LEN,
    };
    let hash = Pbkdf2.hash_password_customized(password.as_bytes(), None, None, params, &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Malformed or foreign
/// hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Random alphanumeric password for seeded accounts.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
