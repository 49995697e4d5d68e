//! Access credentials and credential generation.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a generated access key, in characters.
const ACCESS_KEY_LEN: usize = 20;

/// Length of a generated secret key, in characters.
const SECRET_KEY_LEN: usize = 40;

/// Alphabet used for access keys. Uppercase alphanumeric only, matching the
/// character set AWS access key IDs draw from.
const ACCESS_KEY_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Alphabet used for secret keys.
const SECRET_KEY_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// An access key / secret key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// The public access key identifier.
    pub access_key: String,
    /// The private secret key.
    pub secret_key: String,
}

impl Credential {
    /// Generate a fresh random credential pair: a 20-character access key
    /// and a 40-character secret key.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        Self {
            access_key: random_string(&mut rng, ACCESS_KEY_ALPHABET, ACCESS_KEY_LEN),
            secret_key: random_string(&mut rng, SECRET_KEY_ALPHABET, SECRET_KEY_LEN),
        }
    }

    /// Return `true` if both keys have their expected generated lengths.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.access_key.len() == ACCESS_KEY_LEN && self.secret_key.len() == SECRET_KEY_LEN
    }
}

fn random_string(rng: &mut impl Rng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}
