//! # Authorizations
//!
//! A Speed Boost purchase is proven by a signed authorization issued by the
//! ledger. The client never verifies the signature (the network side does);
//! it only decodes the envelope to read the id, access type and expiry.
//!
//! ## Envelope Format
//! ```text
//! base64( {
//!   "Authorization": { "ID": "...", "AccessType": "speed-boost", "Expires": "RFC3339" },
//!   "SigningKeyID":  "...",
//!   "Signature":     "..."
//! } )
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// The decoded, unsigned part of an authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "AccessType")]
    pub access_type: String,
    #[serde(rename = "Expires")]
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "Authorization")]
    authorization: Authorization,
    #[serde(rename = "SigningKeyID")]
    signing_key_id: String,
    #[serde(rename = "Signature")]
    signature: String,
}

/// An opaque signed authorization exactly as the ledger handed it out.
///
/// This is the form exported to the shared store for the tunnel process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedAuthorization(String);

impl SignedAuthorization {
    /// Wraps an encoded token without inspecting it.
    pub fn new(encoded: impl Into<String>) -> Self {
        SignedAuthorization(encoded.into())
    }

    /// Builds the encoded envelope for an authorization.
    pub fn encode(
        authorization: &Authorization,
        signing_key_id: &str,
        signature: &str,
    ) -> CoreResult<Self> {
        let envelope = Envelope {
            authorization: authorization.clone(),
            signing_key_id: signing_key_id.to_string(),
            signature: signature.to_string(),
        };
        let json = serde_json::to_vec(&envelope)
            .map_err(|e| CoreError::AuthorizationPayload(e.to_string()))?;
        Ok(SignedAuthorization(STANDARD.encode(json)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the envelope and returns the authorization it carries.
    pub fn decode(&self) -> CoreResult<Authorization> {
        let bytes = STANDARD
            .decode(self.0.trim())
            .map_err(|e| CoreError::AuthorizationEncoding(e.to_string()))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::AuthorizationPayload(e.to_string()))?;
        Ok(envelope.authorization)
    }

    /// Decodes and checks that the access type is `expected`.
    pub fn validate(&self, expected_access_type: &str) -> CoreResult<Authorization> {
        let authorization = self.decode()?;
        if authorization.access_type != expected_access_type {
            return Err(CoreError::AccessTypeMismatch {
                expected: expected_access_type.to_string(),
                actual: authorization.access_type,
            });
        }
        Ok(authorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(access_type: &str) -> Authorization {
        Authorization {
            id: "auth-1".into(),
            access_type: access_type.into(),
            expires: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_decode_encoded_envelope() {
        let signed = SignedAuthorization::encode(&sample("speed-boost"), "key", "sig").unwrap();
        let decoded = signed.decode().unwrap();
        assert_eq!(decoded.id, "auth-1");
        assert_eq!(decoded.access_type, "speed-boost");
    }

    #[test]
    fn test_decode_reads_wire_field_names() {
        let json = r#"{"Authorization":{"ID":"x9","AccessType":"speed-boost","Expires":"2030-01-01T00:00:00Z"},"SigningKeyID":"k","Signature":"s"}"#;
        let signed = SignedAuthorization::new(STANDARD.encode(json));
        assert_eq!(signed.decode().unwrap().id, "x9");
    }

    #[test]
    fn test_validate_rejects_other_access_type() {
        let signed = SignedAuthorization::encode(&sample("other"), "key", "sig").unwrap();
        let err = signed.validate("speed-boost").unwrap_err();
        assert!(matches!(err, CoreError::AccessTypeMismatch { .. }));
    }

    #[test]
    fn test_garbage_is_an_encoding_error() {
        let err = SignedAuthorization::new("not base64 !!").decode().unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationEncoding(_)));

        let err = SignedAuthorization::new(STANDARD.encode("{}"))
            .decode()
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationPayload(_)));
    }
}
