//! Password hashing and verification.
//!
//! Records are self-describing strings:
//! `pbkdf2_sha256$<iterations>$<salt>$<derived-key>`, with salt and key in
//! unpadded base64url.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub const ALGORITHM_TAG: &str = "pbkdf2_sha256";
pub const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 32;

/// Unpadded on encode; tolerates `=` padding on decode.
const B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Hash a password with a fresh random salt.
///
/// Fails only when the OS entropy source does; callers must treat that as
/// fatal for the request since nothing can be stored safely without it.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_iterations(password, PBKDF2_ITERATIONS)
}

pub(crate) fn hash_password_with_iterations(
    password: &str,
    iterations: u32,
) -> Result<String, AppError> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| AppError::InternalError(format!("Entropy source unavailable: {}", e)))?;

    let key = derive_key(password.as_bytes(), &salt, iterations);

    Ok(format!(
        "{}${}${}${}",
        ALGORITHM_TAG,
        iterations,
        B64.encode(salt),
        B64.encode(key)
    ))
}

/// Verify a password against a stored record.
///
/// Any malformed record is a mismatch, never an error.
pub fn verify_password(plain: &str, record: &str) -> bool {
    let Some(parsed) = ParsedRecord::parse(record) else {
        return false;
    };

    let computed = derive_key(plain.as_bytes(), &parsed.salt, parsed.iterations);
    computed.as_slice().ct_eq(parsed.key.as_slice()).into()
}

fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    key
}

struct ParsedRecord {
    iterations: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl ParsedRecord {
    fn parse(record: &str) -> Option<Self> {
        let mut fields = record.split('$');
        let (Some(tag), Some(iterations), Some(salt), Some(key), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return None;
        };

        if tag != ALGORITHM_TAG {
            return None;
        }

        let iterations: u32 = iterations.parse().ok().filter(|n| *n > 0)?;
        let salt = B64.decode(salt).ok()?;
        let key = B64.decode(key).ok()?;

        Some(Self { iterations, salt, key })
    }
}
