//! Bearer secret generation.

use rand::{rngs::OsRng, RngCore};

/// Characters a secret is drawn from.
pub const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// Largest multiple of the alphabet size that fits in a byte; bytes at or above
// it are redrawn so every character stays equally likely.
const ACCEPT_BELOW: u8 = 248;

/// Draw `length` characters from [`ALPHABET`] using the operating system RNG.
///
/// # Errors
/// Returns the RNG error if the OS random source fails.
pub fn generate(length: usize) -> Result<String, rand::Error> {
    generate_with(&mut OsRng, length)
}

pub(crate) fn generate_with<R: RngCore>(rng: &mut R, length: usize) -> Result<String, rand::Error> {
    let mut secret = String::with_capacity(length);
    let mut buffer = vec![0u8; length.max(1) * 2];

    while secret.len() < length {
        rng.try_fill_bytes(&mut buffer)?;
        for &byte in &buffer {
            if secret.len() == length {
                break;
            }
            if byte < ACCEPT_BELOW {
                secret.push(char::from(ALPHABET[usize::from(byte) % ALPHABET.len()]));
            }
        }
    }

    Ok(secret)
}
