use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::shared::error::SignatureError;

type HmacSha1 = Hmac<Sha1>;

/// `chat_id=<>&call_sid=<>&mobile=<>`, exactly as signed.
pub fn canonical_payload(chat_id: &str, call_sid: &str, mobile: &str) -> String {
    format!("chat_id={}&call_sid={}&mobile={}", chat_id, call_sid, mobile)
}

/// Lowercase hex HMAC-SHA1 of the canonical payload.
///
/// # Errors
///
/// `MissingField` when any of the three inputs is empty, `MissingSecret`
/// when no signing secret is configured.
///
/// # Examples
///
/// ```
/// use voicecall_gateway::auth::session_token::{generate_session_token, verify_session_token};
///
/// let token = generate_session_token("ChatID", "CA123", "+15551234567", Some("secret")).unwrap();
/// assert!(verify_session_token("ChatID", "CA123", "+15551234567", &token, Some("secret")).unwrap());
/// ```
pub fn generate_session_token(
    chat_id: &str,
    call_sid: &str,
    mobile: &str,
    secret: Option<&str>,
) -> Result<String, SignatureError> {
    let mac = session_mac(chat_id, call_sid, mobile, secret)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Regenerates the token and compares in constant time. A token that is not
/// valid hex is simply a mismatch.
pub fn verify_session_token(
    chat_id: &str,
    call_sid: &str,
    mobile: &str,
    token: &str,
    secret: Option<&str>,
) -> Result<bool, SignatureError> {
    let mac = session_mac(chat_id, call_sid, mobile, secret)?;
    let token = token.trim();
    if token.is_empty() {
        return Err(SignatureError::MissingField("session_token"));
    }
    let Ok(provided) = hex::decode(token) else {
        return Ok(false);
    };
    Ok(mac.verify_slice(&provided).is_ok())
}

fn session_mac(
    chat_id: &str,
    call_sid: &str,
    mobile: &str,
    secret: Option<&str>,
) -> Result<HmacSha1, SignatureError> {
    for (name, value) in [("chat_id", chat_id), ("call_sid", call_sid), ("mobile", mobile)] {
        if value.is_empty() {
            return Err(SignatureError::MissingField(name));
        }
    }
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::MissingSecret)?;
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingSecret)?;
    mac.update(canonical_payload(chat_id, call_sid, mobile).as_bytes());
    Ok(mac)
}
