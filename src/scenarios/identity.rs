//! Per-iteration visitor identity

use rand::Rng;

use crate::client::VisitorRecord;
use crate::config::{MOBILE_NUMBER_LEN, VisitorConfig};

/// Length of the random test identifier
pub const TEST_ID_LEN: usize = 6;

const TEST_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random `[0-9a-z]` identifier of `TEST_ID_LEN` characters
pub fn test_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TEST_ID_LEN)
        .map(|_| TEST_ID_ALPHABET[rng.random_range(0..TEST_ID_ALPHABET.len())] as char)
        .collect()
}

/// `prefix` followed by a number in `1000..=9999`
///
/// Random, not unique: 9000 values per prefix, so numbers repeat on long runs.
pub fn mobile_number<R: Rng + ?Sized>(rng: &mut R, prefix: &str) -> String {
    format!("{prefix}{}", rng.random_range(1000..=9999u32))
}

/// Whether `mobile` is a 10-digit number
pub fn is_valid_mobile(mobile: &str) -> bool {
    mobile.len() == MOBILE_NUMBER_LEN && mobile.chars().all(|c| c.is_ascii_digit())
}

/// Visitor identity for one iteration
///
/// The test id is distinct with high probability; the mobile number is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub test_id: String,
    pub mobile: String,
}

impl Identity {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, mobile_prefix: &str) -> Self {
        Self {
            test_id: test_id(rng),
            mobile: mobile_number(rng, mobile_prefix),
        }
    }

    /// Visitor record registered by this identity
    pub fn record(&self, settings: &VisitorConfig) -> VisitorRecord {
        let id = &self.test_id;
        VisitorRecord {
            visitor_name: format!("Visitor-{id}"),
            organisation_institution: format!("Org-{id}"),
            image: None,
            email: format!("visitor{id}@test.com"),
            mobile_number: self.mobile.clone(),
            location: settings.location.clone(),
            type_of_visit: settings.type_of_visit.clone(),
            referral_name: settings.referral_name.clone(),
            reason: settings.reason.clone(),
        }
    }
}
