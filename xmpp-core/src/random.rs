//! Random identifier sources.
//!
//! Request identifiers and server-assigned resourceparts must be
//! unguessable, so production code draws them from the operating system's
//! CSPRNG. The source is a trait object so tests can swap in a seeded one.

use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

/// Number of random bytes in a generated identifier.
pub const ID_BYTES: usize = 12;

/// Generator of short opaque identifiers.
pub trait IdSource: Send + Sync {
    /// Produce a fresh identifier. Never returns an empty string.
    fn random_id(&self) -> String;
}

/// Identifiers from the operating system's secure random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRngIds;

impl IdSource for OsRngIds {
    fn random_id(&self) -> String {
        let mut bytes = [0u8; ID_BYTES];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Deterministic identifiers from a seeded generator.
///
/// Not unguessable; meant for reproducible tests.
#[derive(Debug)]
pub struct SeededIds {
    rng: Mutex<StdRng>,
}

impl SeededIds {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdSource for SeededIds {
    fn random_id(&self) -> String {
        let mut bytes = [0u8; ID_BYTES];
        // Poisoning leaves the generator state intact.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}
