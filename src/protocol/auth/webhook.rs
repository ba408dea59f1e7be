use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header the carrier signs every webhook with.
pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// The URL the carrier signed: `https://<host><path>` plus the query
/// exactly as it arrived on the wire.
pub fn webhook_url(host: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("https://{}{}", host, path);
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Same URL with the query percent-decoded. Some carrier configurations
/// sign the decoded form of callback URLs.
pub fn decoded_webhook_url(host: &str, path: &str, query: Option<&str>) -> String {
    let decoded = query.map(|q| {
        urlencoding::decode(q)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| q.to_string())
    });
    webhook_url(host, path, decoded.as_deref())
}

/// Checks a received webhook: first against the URL as received, then
/// against its decoded form when that differs.
pub fn verify_webhook_request(
    host: &str,
    path: &str,
    raw_query: Option<&str>,
    params: &[(String, String)],
    provided_signature: Option<&str>,
    secret: Option<&str>,
) -> bool {
    let exact = webhook_url(host, path, raw_query);
    if verify_webhook_signature(&exact, params, provided_signature, secret) {
        return true;
    }
    let decoded = decoded_webhook_url(host, path, raw_query);
    decoded != exact && verify_webhook_signature(&decoded, params, provided_signature, secret)
}

/// Base64 HMAC-SHA1 over the URL followed by every form pair as
/// `key + value`, pairs sorted by key then value.
pub fn compute_webhook_signature(
    full_url: &str,
    params: &[(String, String)],
    secret: &str,
) -> Option<String> {
    let mac = signing_mac(full_url, params, secret)?;
    Some(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Fails closed: absent signature, absent secret, undecodable signature and
/// mismatch all return `false`. The comparison is constant time.
pub fn verify_webhook_signature(
    full_url: &str,
    params: &[(String, String)],
    provided_signature: Option<&str>,
    secret: Option<&str>,
) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return false;
    };
    let Some(provided) = provided_signature.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let Ok(expected_bytes) = STANDARD.decode(provided) else {
        return false;
    };
    let Some(mac) = signing_mac(full_url, params, secret) else {
        return false;
    };
    mac.verify_slice(&expected_bytes).is_ok()
}

fn signing_mac(full_url: &str, params: &[(String, String)], secret: &str) -> Option<HmacSha1> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(full_url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Some(mac)
}
