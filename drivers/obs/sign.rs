//! OBS request signing / OBS签名
//!
//! Header signature: `Authorization: OBS {AK}:{Signature}`
//! Query signature (temporary URL): `AccessKeyId`, `Expires`, `Signature`
//!
//! Signature = base64(hmac-sha1(SK, StringToSign))
//! StringToSign = VERB + "\n" + Content-MD5 + "\n" + Content-Type + "\n" + Date|Expires + "\n" + CanonicalizedResource

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 1123 日期，用于 Date 头
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 对象键按路径段编码，保留 `/`
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// CanonicalizedResource: `/bucket/` 或 `/bucket/key`
pub fn canonical_resource(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("/{}/{}", bucket, encode_key(key)),
        None => format!("/{}/", bucket),
    }
}

pub fn string_to_sign(
    method: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    resource: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        method, content_md5, content_type, date, resource
    )
}

pub fn sign(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Authorization 头
pub fn authorization(access_key: &str, secret_key: &str, string_to_sign: &str) -> String {
    format!("OBS {}:{}", access_key, sign(secret_key, string_to_sign))
}

/// Content-MD5 头（base64编码的MD5）
pub fn content_md5(body: &[u8]) -> String {
    BASE64.encode(md5::compute(body).0)
}

/// 临时授权URL的查询串，`expires` 为Unix秒
pub fn presign_query(
    access_key: &str,
    secret_key: &str,
    method: &str,
    resource: &str,
    expires: i64,
) -> String {
    let to_sign = string_to_sign(method, "", "", &expires.to_string(), resource);
    format!(
        "AccessKeyId={}&Expires={}&Signature={}",
        urlencoding::encode(access_key),
        expires,
        urlencoding::encode(&sign(secret_key, &to_sign))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(http_date(now), "Tue, 05 Mar 2024 07:08:09 GMT");
    }

    #[test]
    fn test_string_to_sign_layout() {
        let resource = canonical_resource("docs", Some("a b/c.txt"));
        assert_eq!(resource, "/docs/a%20b/c.txt");

        let s = string_to_sign("PUT", "md5", "text/plain", "DATE", &resource);
        assert_eq!(s, "PUT\nmd5\ntext/plain\nDATE\n/docs/a%20b/c.txt");
        assert_eq!(canonical_resource("docs", None), "/docs/");
    }

    #[test]
    fn test_signature_is_stable_base64_sha1() {
        let sig = sign("secret", "GET\n\n\n1700000000\n/docs/a.txt");
        // 20字节的SHA1摘要编码后为28个字符
        assert_eq!(sig.len(), 28);
        assert_eq!(sig, sign("secret", "GET\n\n\n1700000000\n/docs/a.txt"));
        assert_ne!(sig, sign("other", "GET\n\n\n1700000000\n/docs/a.txt"));

        let auth = authorization("AK", "secret", "GET\n\n\n1700000000\n/docs/a.txt");
        assert_eq!(auth, format!("OBS AK:{}", sig));
    }

    #[test]
    fn test_content_md5() {
        // md5("") = d41d8cd98f00b204e9800998ecf8427e
        assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
    }

    #[test]
    fn test_presign_query() {
        let query = presign_query("AK", "secret", "GET", "/docs/a.txt", 1_700_000_000);
        assert!(query.starts_with("AccessKeyId=AK&Expires=1700000000&Signature="));

        let signature = query.rsplit("Signature=").next().unwrap();
        let decoded = urlencoding::decode(signature).unwrap();
        assert_eq!(decoded, sign("secret", "GET\n\n\n1700000000\n/docs/a.txt"));
    }
}
