//! Challenge generation and validation.

use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::{ChallengePolicy, PolicySet};
use crate::models::OperationKind;

/// Generates one-time codes and resolves the per-kind challenge policy.
#[derive(Debug, Clone)]
pub struct ChallengeService {
    policies: PolicySet,
}

impl ChallengeService {
    pub fn new(policies: PolicySet) -> Self {
        Self { policies }
    }

    pub fn policy_for(&self, kind: OperationKind) -> &ChallengePolicy {
        self.policies.for_kind(kind)
    }

    /// Generate a random numeric code. The thread RNG is a CSPRNG; codes
    /// are never reused across instances.
    pub fn generate_code(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| rng.gen_range(0..10).to_string())
            .collect()
    }
}

/// Hash a code for storage.
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Timing-safe comparison of a submitted code against a stored hash.
pub fn verify_code(stored_hash: &str, submitted: &str) -> bool {
    let submitted_hash = hash_code(submitted);
    stored_hash
        .as_bytes()
        .ct_eq(submitted_hash.as_bytes())
        .into()
}
