//! Turnstile Test Kit
//!
//! Test infrastructure for turnstile scenarios.
//!
//! This crate provides:
//! - Seeded random data generation for reproducible tests
//! - An in-process mock of the visitor-management API
//!
//! # Example
//!
//! ```rust
//! use turnstile_testkit::random::PseudoGenerator;
//!
//! // Create reproducible random generator
//! let mut rng = PseudoGenerator::new(12345);
//!
//! // Generate a test identifier
//! let id = rng.alphanumeric(6);
//! assert_eq!(id.len(), 6);
//! ```

pub mod mock;
pub mod random;

// Re-exports for convenience
pub use mock::{MockServer, MockVisitorApi, RecordedRequest, unreachable_url};
pub use random::PseudoGenerator;
