use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::canonical::to_canonical_json;

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying the digest algorithm in a signature token
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 signer for webhook payloads.
///
/// Tokens have the form `sha256=<lowercase hex>` and are computed over the
/// canonical JSON rendering of the payload, so they depend only on its
/// logical content.
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    /// New HMAC signer with the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign a payload after canonicalizing it
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, serde_json::Error> {
        let canonical = to_canonical_json(payload)?;
        Ok(self.sign_bytes(canonical.as_bytes()))
    }

    /// Sign bytes that are already in canonical form
    pub fn sign_bytes(&self, message: &[u8]) -> String {
        format_signature_header(&self.hmac_sha256(message))
    }

    /// Verify a token against a payload.
    ///
    /// A payload that cannot be canonicalized never verifies.
    pub fn verify<T: Serialize + ?Sized>(&self, payload: &T, signature: &str) -> bool {
        match to_canonical_json(payload) {
            Ok(canonical) => self.verify_bytes(canonical.as_bytes(), signature),
            Err(_) => false,
        }
    }

    /// Verify a token against canonical bytes in constant time
    pub fn verify_bytes(&self, message: &[u8], signature: &str) -> bool {
        let expected = self.sign_bytes(message);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    /// Compute HMAC-SHA256
    fn hmac_sha256(&self, message: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC key can be of any size, as per crate documentation"),
        };

        mac.update(message);

        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }
}

/// Helper function to format signature for HTTP header
pub fn format_signature_header(signature: &str) -> String {
    format!("{SIGNATURE_PREFIX}{signature}")
}

/// Helper function to parse signature from HTTP header
pub fn parse_signature_header(header: &str) -> Result<&str, String> {
    header
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| format!("Invalid signature header format: {header}"))
}
