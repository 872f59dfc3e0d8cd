/// Transcoder callback signature contract tests
///
/// The transcoding pipeline signs every callback with
/// `x-webhook-signature: t=<unix-seconds>,v1=<hex hmac-sha256>` over the
/// canonical string `{t}.{body}`. These vectors pin that wire format so
/// the canonical string can never drift silently on either side.
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SECRET: &str = "test-webhook-secret-0123456789ab";

/// Sign the canonical string the way the pipeline does
fn signature_hex(secret: &str, timestamp: i64, body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Assemble the full header value
fn header_value(secret: &str, timestamp: i64, body: &str) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        signature_hex(secret, timestamp, body)
    )
}

#[test]
fn known_vector_for_a_ready_event() {
    let body = r#"{"type":"video.asset.ready","data":{"upload_id":"up-1"}}"#;
    assert_eq!(
        signature_hex(SECRET, 1_700_000_000, body),
        "6da4206de540dba507d7908fd26af442d52717c41a46dcc93f75cbbfbc3d2f28"
    );
}

#[test]
fn known_vector_for_an_errored_event() {
    let body = r#"{"type":"video.asset.errored","data":{"upload_id":"up-2"}}"#;
    assert_eq!(
        signature_hex(SECRET, 1_700_000_060, body),
        "7d521d53d7426d5286019e297436419f7e2a82ce704b61ec4b117c1ece6727c0"
    );
}

#[test]
fn timestamp_is_part_of_the_signed_message() {
    let body = r#"{"type":"video.asset.ready","data":{"upload_id":"up-1"}}"#;
    // one second of drift must change the digest completely
    assert_eq!(
        signature_hex(SECRET, 1_700_000_001, body),
        "f5809aac25d4ffbabb12a04222ba6dd3179624572c00ad19e8b44add234c50c6"
    );
    assert_ne!(
        signature_hex(SECRET, 1_700_000_000, body),
        signature_hex(SECRET, 1_700_000_001, body)
    );
}

#[test]
fn empty_body_still_signs_the_dotted_form() {
    // the canonical string is "1700000000." here, dot included
    assert_eq!(
        signature_hex(SECRET, 1_700_000_000, ""),
        "8b59249fe9da5d23cd537dc1f3d63d8e633cbb1b7db2422aba756e1b7eda37a2"
    );
}

#[test]
fn header_carries_timestamp_then_signature() {
    let body = r#"{"type":"video.asset.created"}"#;
    let header = header_value(SECRET, 1_700_000_000, body);

    let mut parts = header.split(',');
    let t = parts.next().expect("timestamp entry");
    let v1 = parts.next().expect("signature entry");
    assert!(parts.next().is_none());

    assert_eq!(t, "t=1700000000");
    let sig = v1.strip_prefix("v1=").expect("v1-prefixed signature");
    assert_eq!(sig, signature_hex(SECRET, 1_700_000_000, body));
}

#[test]
fn signatures_are_lowercase_hex_of_thirty_two_bytes() {
    let sig = signature_hex(SECRET, 1_700_000_000, "payload");
    assert_eq!(sig.len(), 64);
    assert!(sig
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn rotation_appends_a_second_v1_entry() {
    // during secret rotation the sender double-signs; receivers accept
    // the header when any one entry verifies
    let body = r#"{"type":"video.asset.ready"}"#;
    let old = signature_hex("retiring-secret-0123456789abcdef", 1_700_000_000, body);
    let new = signature_hex(SECRET, 1_700_000_000, body);
    let header = format!("t=1700000000,v1={},v1={}", old, new);

    let entries: Vec<&str> = header
        .split(',')
        .filter_map(|p| p.strip_prefix("v1="))
        .collect();
    assert_eq!(entries.len(), 2);
    assert!(entries.contains(&new.as_str()));
    assert_ne!(old, new);
}
