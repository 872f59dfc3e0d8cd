/// Signature verification for transcoder callbacks
///
/// The pipeline signs every callback with the shared secret:
/// `x-webhook-signature: t=<unix-seconds>,v1=<hex hmac-sha256 of "{t}.{body}">`.
/// More than one `v1` entry may appear (the sender rotates secrets by
/// double-signing); any one match passes. The timestamp bounds replay.
use crate::error::{ApiError, ApiResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub struct EventAuthenticator {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl EventAuthenticator {
    pub fn new(secret: &str, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            tolerance_secs: tolerance_secs as i64,
        }
    }

    /// Verify a raw callback body against its signature header.
    /// Any failure is an authentication error; nothing downstream may run.
    pub fn verify(&self, raw_body: &[u8], signature_header: &str) -> ApiResult<()> {
        self.verify_at(raw_body, signature_header, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, raw_body: &[u8], signature_header: &str, now_secs: i64) -> ApiResult<()> {
        let parsed = parse_header(signature_header)?;

        let timestamp: i64 = parsed.timestamp.parse().map_err(|_| {
            ApiError::Authentication("Malformed signature timestamp".to_string())
        })?;
        if (now_secs - timestamp).abs() > self.tolerance_secs {
            return Err(ApiError::Authentication(
                "Signature timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| ApiError::Internal("Webhook secret unusable as HMAC key".to_string()))?;
        // signed message is the raw timestamp text, a dot, and the raw body
        mac.update(parsed.timestamp.as_bytes());
        mac.update(b".");
        mac.update(raw_body);

        for candidate in &parsed.signatures {
            let Ok(bytes) = hex::decode(candidate) else {
                continue;
            };
            if mac.clone().verify_slice(&bytes).is_ok() {
                return Ok(());
            }
        }

        Err(ApiError::Authentication("Signature mismatch".to_string()))
    }
}

struct ParsedHeader<'a> {
    timestamp: &'a str,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> ApiResult<ParsedHeader<'_>> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            // unknown scheme entries are skipped, not rejected
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        ApiError::Authentication("Signature header missing timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(ApiError::Authentication(
            "Signature header missing v1 signature".to_string(),
        ));
    }

    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";
    const NOW: i64 = 1_755_600_000;

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    fn authenticator() -> EventAuthenticator {
        EventAuthenticator::new(SECRET, 300)
    }

    #[test]
    fn accepts_a_valid_signature() {
        let body = br#"{"type":"asset.ready"}"#;
        let header = sign(SECRET, NOW, body);
        assert!(authenticator().verify_at(body, &header, NOW).is_ok());
    }

    #[test]
    fn rejects_a_tampered_body() {
        let header = sign(SECRET, NOW, br#"{"type":"asset.ready"}"#);
        let err = authenticator()
            .verify_at(br#"{"type":"asset.deleted"}"#, &header, NOW)
            .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[test]
    fn rejects_a_signature_from_the_wrong_secret() {
        let body = b"payload";
        let header = sign("some-other-secret", NOW, body);
        let err = authenticator().verify_at(body, &header, NOW).unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[test]
    fn rejects_a_replay_outside_tolerance() {
        let body = b"payload";
        let header = sign(SECRET, NOW - 301, body);
        let err = authenticator().verify_at(body, &header, NOW).unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[test]
    fn accepts_clock_skew_within_tolerance() {
        let body = b"payload";
        // slightly in the future is fine too
        let header = sign(SECRET, NOW + 120, body);
        assert!(authenticator().verify_at(body, &header, NOW).is_ok());
    }

    #[test]
    fn rejects_headers_missing_parts() {
        let auth = authenticator();
        assert!(auth.verify_at(b"x", "", NOW).is_err());
        assert!(auth.verify_at(b"x", "v1=deadbeef", NOW).is_err());
        assert!(auth.verify_at(b"x", &format!("t={}", NOW), NOW).is_err());
        assert!(auth.verify_at(b"x", "t=notanumber,v1=deadbeef", NOW).is_err());
    }

    #[test]
    fn any_matching_v1_entry_passes() {
        let body = b"payload";
        let good = sign(SECRET, NOW, body);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1=0000,v1={}", NOW, good_sig);
        assert!(authenticator().verify_at(body, &header, NOW).is_ok());
    }
}
