//! Hash-based issue ID generation.
//!
//! New local issues (for example ones pulled in from GitHub) get IDs of the
//! form `{prefix}-{hash}`, where the hash is a base36 rendering of a SHA-256
//! digest over the title, description, a timestamp, and a nonce. The hash
//! grows from 4 to 6 characters as the store gets larger.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MAX_LENGTH: usize = 8;

/// Hash-based ID generator with collision avoidance.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    existing: HashSet<String>,
}

impl IdGenerator {
    /// Create a generator for `prefix`, aware of the given existing IDs.
    pub fn new<I, S>(prefix: impl Into<String>, existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            existing: existing.into_iter().map(Into::into).collect(),
        }
    }

    /// Generate a new ID not yet known to this generator.
    ///
    /// Collisions are retried with an incrementing nonce; every `MAX_NONCE`
    /// attempts the hash length grows by one character, up to `MAX_LENGTH`.
    pub fn generate(&mut self, title: &str, description: &str) -> String {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let base_length = self.adaptive_length();

        for nonce in 0u32.. {
            let grow = usize::try_from(nonce / MAX_NONCE).unwrap_or(MAX_LENGTH);
            let length = (base_length + grow).min(MAX_LENGTH);
            let id = self.hash_id(title, description, timestamp, nonce, length);
            if self.existing.insert(id.clone()) {
                if nonce > 0 {
                    debug!(nonce, length, "Generated unique ID after collisions");
                }
                return id;
            }
        }
        unreachable!("u32 nonce space exhausted")
    }

    fn hash_id(
        &self,
        title: &str,
        description: &str,
        timestamp: i64,
        nonce: u32,
        length: usize,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{title}|{description}|{timestamp}|{nonce}").as_bytes());
        let digest = hasher.finalize();

        let mut num = digest[..8]
            .iter()
            .fold(0u64, |acc, &b| acc.wrapping_shl(8).wrapping_add(u64::from(b)));
        let mut chars = Vec::with_capacity(length);
        for _ in 0..length {
            chars.push(BASE36_CHARS[(num % 36) as usize] as char);
            num /= 36;
        }
        chars.reverse();

        format!("{}-{}", self.prefix, chars.into_iter().collect::<String>())
    }

    /// 4 chars up to 500 issues, 5 up to 1500, then 6.
    fn adaptive_length(&self) -> usize {
        match self.existing.len() {
            0..=500 => 4,
            501..=1500 => 5,
            _ => 6,
        }
    }
}
