use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha1::Sha1;

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

type HmacSha1 = Hmac<Sha1>;

/// MAC over the full URL followed by every form key and value, sorted by key.
fn signing_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> Option<HmacSha1> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let mut data = url.to_string();
    for (key, value) in sorted {
        data.push_str(key);
        data.push_str(value);
    }
    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes()).ok()?;
    mac.update(data.as_bytes());
    Some(mac)
}

/// Base64 signature the provider attaches to a webhook request.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    signing_mac(auth_token, url, params)
        .map(|mac| BASE64_STANDARD.encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    expected: &str,
) -> bool {
    let Ok(expected) = BASE64_STANDARD.decode(expected.trim()) else {
        return false;
    };
    signing_mac(auth_token, url, params).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}
