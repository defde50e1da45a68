//! Seeded random data generation
//!
//! Provides reproducible random data for tests. The same seed produces the
//! same sequence, so visitor identities and payloads in failing tests can be
//! regenerated exactly.
//!
//! `PseudoGenerator` implements [`RngCore`], so it can be handed to any code
//! that takes a `rand::Rng`.
//!
//! # Example
//!
//! ```rust
//! use turnstile_testkit::random::PseudoGenerator;
//!
//! let mut rng1 = PseudoGenerator::new(42);
//! let mut rng2 = PseudoGenerator::new(42);
//!
//! // Same seed produces same output
//! assert_eq!(rng1.digits(10), rng2.digits(10));
//! ```

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

const LOWER_ALPHANUMERIC: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Seeded pseudo-random generator for reproducible test data
#[derive(Debug)]
pub struct PseudoGenerator {
    rng: StdRng,
}

impl PseudoGenerator {
    /// Create a new generator with the given seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Lowercase `[0-9a-z]` string of `len` characters
    pub fn alphanumeric(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| LOWER_ALPHANUMERIC[self.rng.random_range(0..LOWER_ALPHANUMERIC.len())] as char)
            .collect()
    }

    /// String of `len` decimal digits
    pub fn digits(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(b'0' + self.rng.random_range(0..10u8)))
            .collect()
    }
}

impl RngCore for PseudoGenerator {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        self.rng.fill_bytes(dst)
    }
}
