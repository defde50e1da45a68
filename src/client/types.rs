//! Visitor-management API types
//!
//! Endpoints live under `/api/method/visitor_management.custom_api.*`.
//! Response bodies are never decoded; only the request side is typed.

use serde::{Deserialize, Serialize};

/// Path prefix shared by every visitor-management method
pub const API_METHOD_PREFIX: &str = "api/method/visitor_management.custom_api";

/// Endpoints hit by the visitor registration flow, in call order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// POST entry_exit.security_login
    SecurityLogin,
    /// GET visitor.get_org
    GetOrganizations,
    /// GET visitor.get_referral
    GetReferrals,
    /// GET visitor.generate_and_send_otp?mobile=
    GenerateOtp,
    /// GET visitor.verify_otp?mobile=&otp=
    VerifyOtp,
    /// POST visitor.create_visitor_record
    CreateVisitorRecord,
    /// GET visitor.get_visitors?location=
    GetVisitors,
}

impl Endpoint {
    /// All flow endpoints in the order they are called
    pub const FLOW: [Endpoint; 7] = [
        Endpoint::SecurityLogin,
        Endpoint::GetOrganizations,
        Endpoint::GetReferrals,
        Endpoint::GenerateOtp,
        Endpoint::VerifyOtp,
        Endpoint::CreateVisitorRecord,
        Endpoint::GetVisitors,
    ];

    /// `<module>.<method>` under the API prefix
    pub fn method_path(&self) -> &'static str {
        match self {
            Endpoint::SecurityLogin => "entry_exit.security_login",
            Endpoint::GetOrganizations => "visitor.get_org",
            Endpoint::GetReferrals => "visitor.get_referral",
            Endpoint::GenerateOtp => "visitor.generate_and_send_otp",
            Endpoint::VerifyOtp => "visitor.verify_otp",
            Endpoint::CreateVisitorRecord => "visitor.create_visitor_record",
            Endpoint::GetVisitors => "visitor.get_visitors",
        }
    }

    /// Short tag used in logs
    pub fn tag(&self) -> &'static str {
        match self {
            Endpoint::SecurityLogin => "security_login",
            Endpoint::GetOrganizations => "get_organizations",
            Endpoint::GetReferrals => "get_referrals",
            Endpoint::GenerateOtp => "generate_otp",
            Endpoint::VerifyOtp => "verify_otp",
            Endpoint::CreateVisitorRecord => "create_visitor",
            Endpoint::GetVisitors => "get_visitors",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Visitor record submitted by `create_visitor_record`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorRecord {
    pub visitor_name: String,
    pub organisation_institution: String,
    /// Always sent as `null`
    pub image: Option<String>,
    pub email: String,
    pub mobile_number: String,
    pub location: String,
    pub type_of_visit: String,
    pub referral_name: String,
    pub reason: String,
}

/// Request envelope for `create_visitor_record`
///
/// The API expects the record as a JSON *string* under `data`, so the record
/// is encoded once into `data` and the envelope is encoded again as the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorEnvelope {
    pub data: String,
}

impl VisitorEnvelope {
    /// Encode a record into the envelope's `data` field
    pub fn wrap(record: &VisitorRecord) -> serde_json::Result<Self> {
        Ok(Self {
            data: serde_json::to_string(record)?,
        })
    }

    /// Decode the inner record
    pub fn record(&self) -> serde_json::Result<VisitorRecord> {
        serde_json::from_str(&self.data)
    }

    /// Encode a record as the full request body
    pub fn encode_body(record: &VisitorRecord) -> serde_json::Result<String> {
        serde_json::to_string(&Self::wrap(record)?)
    }

    /// Decode a request body back to the record
    pub fn decode_body(body: &str) -> serde_json::Result<VisitorRecord> {
        serde_json::from_str::<Self>(body)?.record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VisitorRecord {
        VisitorRecord {
            visitor_name: "Visitor-k3j9xq".into(),
            organisation_institution: "Org-k3j9xq".into(),
            image: None,
            email: "visitork3j9xq@test.com".into(),
            mobile_number: "8925944821".into(),
            location: "Open Work Space 2 - IITMRP E Block".into(),
            type_of_visit: "Meeting".into(),
            referral_name: "EMP4_FH".into(),
            reason: "Performance Test".into(),
        }
    }

    #[test]
    fn test_body_is_double_encoded() {
        let body = VisitorEnvelope::encode_body(&sample()).unwrap();
        let outer: serde_json::Value = serde_json::from_str(&body).unwrap();
        let outer = outer.as_object().unwrap();

        assert_eq!(outer.len(), 1);
        let data = outer["data"].as_str().expect("data must be a JSON string");

        let inner: serde_json::Value = serde_json::from_str(data).unwrap();
        assert!(inner["image"].is_null());
        assert_eq!(inner["visitor_name"], "Visitor-k3j9xq");
    }

    #[test]
    fn test_decode_twice_yields_record() {
        let record = sample();
        let body = VisitorEnvelope::encode_body(&record).unwrap();
        assert_eq!(VisitorEnvelope::decode_body(&body).unwrap(), record);
    }

    #[test]
    fn test_field_order_matches_wire() {
        let data = VisitorEnvelope::wrap(&sample()).unwrap().data;
        assert!(data.starts_with(r#"{"visitor_name":"#));
        assert!(data.find("\"image\":null").unwrap() < data.find("\"email\"").unwrap());
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Endpoint::FLOW.len(), 7);
        assert_eq!(
            Endpoint::SecurityLogin.method_path(),
            "entry_exit.security_login"
        );
        assert!(
            Endpoint::FLOW[1..]
                .iter()
                .all(|e| e.method_path().starts_with("visitor."))
        );
    }
}
