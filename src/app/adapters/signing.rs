//! Legacy AWS Signature Version 2
//!
//! Older S3-compatible gateways only accept V2 signatures, which the
//! `object_store` clients do not produce. Only body-less `GET` requests are
//! signed, so the content hash and type lines stay empty.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// S3 access key pair
#[derive(Debug, Clone, Copy)]
pub struct AwsCredentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

pub type Headers = Vec<(&'static str, String)>;

/// Signature Version 2 headers for a request
///
/// `resource` is the canonicalized resource, `/<bucket>/` for a listing.
pub fn sigv2_headers(
    method: &str,
    resource: &str,
    creds: &AwsCredentials<'_>,
    now: DateTime<Utc>,
) -> Result<Headers, InvalidLength> {
    let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let string_to_sign = format!("{}\n\n\n{}\n{}", method, date, resource);

    let mut mac = Hmac::<Sha1>::new_from_slice(creds.secret_key.as_bytes())?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    Ok(vec![
        ("date", date),
        (
            "authorization",
            format!("AWS {}:{}", creds.access_key, signature),
        ),
    ])
}
