//! VAPID (RFC 8292) request authentication.
//!
//! A callback carries two headers:
//! - `Authorization: WebPush <jwt>`
//! - `Crypto-Key: ...;p256ecdsa=<base64url public key>;...`
//!
//! The asserted key must equal the key registered for the client, and the
//! JWT must be an ES256 token signed by it. An `exp` claim is optional but
//! must not have passed when present.

use crate::key_codec::{decode_wire_base64, public_key_pem};
use http::StatusCode;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

const AUTH_SCHEME: &str = "WebPush";
const SIGNING_KEY_PARAM: &str = "p256ecdsa=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VapidHeader {
    Authorization,
    CryptoKey,
}

impl VapidHeader {
    pub fn as_str(&self) -> &'static str {
        match self {
            VapidHeader::Authorization => "Authorization",
            VapidHeader::CryptoKey => "Crypto-Key",
        }
    }
}

/// Reasons a callback fails authentication.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("missing Authorization or Crypto-Key header")]
    MissingHeaders,

    #[error("malformed {} header", .0.as_str())]
    MalformedHeader(VapidHeader),

    #[error("signing key does not match the registered server key")]
    KeyMismatch,

    #[error("no server key registered for this client")]
    UnregisteredClient,

    #[error("token verification failed: {0}")]
    BadSignature(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MissingHeaders
            | Rejection::MalformedHeader(_)
            | Rejection::KeyMismatch
            | Rejection::UnregisteredClient => StatusCode::BAD_REQUEST,
            Rejection::BadSignature(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::MissingHeaders => "missing_headers",
            Rejection::MalformedHeader(VapidHeader::Authorization) => "malformed_authorization",
            Rejection::MalformedHeader(VapidHeader::CryptoKey) => "malformed_crypto_key",
            Rejection::KeyMismatch => "key_mismatch",
            Rejection::UnregisteredClient => "unregistered_client",
            Rejection::BadSignature(_) => "bad_signature",
        }
    }
}

/// The token and asserted signing key extracted from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VapidCredentials<'a> {
    pub token: &'a str,
    /// Still base64-encoded, as sent.
    pub signing_key: &'a str,
}

impl<'a> VapidCredentials<'a> {
    pub fn parse(
        authorization: Option<&'a str>,
        crypto_key: Option<&'a str>,
    ) -> Result<Self, Rejection> {
        let (Some(authorization), Some(crypto_key)) = (authorization, crypto_key) else {
            return Err(Rejection::MissingHeaders);
        };

        let token = parse_authorization(authorization)
            .ok_or(Rejection::MalformedHeader(VapidHeader::Authorization))?;
        let signing_key = parse_crypto_key(crypto_key)
            .ok_or(Rejection::MalformedHeader(VapidHeader::CryptoKey))?;

        Ok(Self { token, signing_key })
    }
}

/// Token from `WebPush <token>`. The scheme is case-sensitive and must be
/// followed by whitespace.
pub fn parse_authorization(value: &str) -> Option<&str> {
    let rest = value.strip_prefix(AUTH_SCHEME)?;
    let token = rest.trim_start();
    if token.len() == rest.len() {
        return None;
    }
    token.split_whitespace().next()
}

/// Value of the first non-empty `p256ecdsa=` parameter, ending at `;`,
/// whitespace or end of input.
pub fn parse_crypto_key(value: &str) -> Option<&str> {
    value.match_indices(SIGNING_KEY_PARAM).find_map(|(start, param)| {
        let rest = &value[start + param.len()..];
        let end = rest
            .find(|c: char| c == ';' || c.is_whitespace())
            .unwrap_or(rest.len());
        Some(&rest[..end]).filter(|key| !key.is_empty())
    })
}

/// Claims of a verified VAPID token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VapidClaims {
    #[serde(default)]
    pub aud: Option<String>,
    #[serde(default)]
    pub exp: Option<u64>,
    #[serde(default)]
    pub sub: Option<String>,
}

#[derive(Clone)]
pub struct VapidVerifier {
    validation: Validation,
}

impl VapidVerifier {
    pub fn new() -> Self {
        // ES256 only; the token header cannot negotiate another algorithm.
        let mut validation = Validation::new(Algorithm::ES256);
        // The audience is the push service origin, which the relay does not know.
        validation.validate_aud = false;
        // `exp` is still checked when the token carries one.
        validation.required_spec_claims.clear();
        Self { validation }
    }

    /// Verifies a request's VAPID headers against the key registered for its client.
    pub fn verify(
        &self,
        authorization: Option<&str>,
        crypto_key: Option<&str>,
        registered_key: &[u8],
    ) -> Result<VapidClaims, Rejection> {
        let credentials = VapidCredentials::parse(authorization, crypto_key)?;

        let asserted_key = decode_wire_base64(credentials.signing_key)
            .map_err(|_| Rejection::MalformedHeader(VapidHeader::CryptoKey))?;
        if asserted_key != registered_key {
            return Err(Rejection::KeyMismatch);
        }

        let pem =
            public_key_pem(&asserted_key).map_err(|e| Rejection::BadSignature(e.to_string()))?;
        let key = DecodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| Rejection::BadSignature(e.to_string()))?;

        let data = jsonwebtoken::decode::<VapidClaims>(credentials.token, &key, &self.validation)
            .map_err(|e| Rejection::BadSignature(e.to_string()))?;

        Ok(data.claims)
    }
}

impl Default for VapidVerifier {
    fn default() -> Self {
        Self::new()
    }
}
