use sha2::{Digest, Sha256};
use std::fmt;

const ROUNDS: u32 = 10_000;
pub(crate) const MIN_PASSWORD_LENGTH: usize = 8;

/// Salted, iterated SHA-256 digest of an account password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: String,
    digest: String,
}

impl PasswordHash {
    pub fn create(password: &str) -> Self {
        let salt = ulid::Ulid::new().to_string();
        let digest = derive(&salt, password);
        Self { salt, digest }
    }

    pub fn verify(&self, password: &str) -> bool {
        let candidate = derive(&self.salt, password);
        constant_time_eq(candidate.as_bytes(), self.digest.as_bytes())
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

fn derive(salt: &str, password: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    hex::encode(digest)
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0u8, |acc, (l, r)| acc | (l ^ r))
            == 0
}

/// Random bearer token: two ULIDs hashed together.
pub(crate) fn session_token() -> String {
    let digest = Sha256::new()
        .chain_update(ulid::Ulid::new().to_bytes())
        .chain_update(ulid::Ulid::new().to_bytes())
        .finalize();
    hex::encode(digest)
}
