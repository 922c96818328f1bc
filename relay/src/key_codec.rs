//! Conversions between wire-format VAPID keys and the encodings consumed by
//! signature libraries.
//!
//! Clients send P-256 public keys as base64url-encoded uncompressed points
//! (`0x04 || X || Y`). Verification needs them as an X.509
//! SubjectPublicKeyInfo.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::NistP256;
use p256::elliptic_curve::ALGORITHM_OID;
use p256::pkcs8::AssociatedOid;
use p256::pkcs8::der::asn1::{BitStringRef, ObjectIdentifier};
use p256::pkcs8::der::pem::LineEnding;
use p256::pkcs8::der::{Encode, EncodePem};
use p256::pkcs8::spki::{AlgorithmIdentifier, SubjectPublicKeyInfo};

const UNCOMPRESSED_POINT_TAG: u8 = 0x04;
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

type EcPublicKeyInfo<'a> = SubjectPublicKeyInfo<ObjectIdentifier, BitStringRef<'a>>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum KeyCodecError {
    #[error("invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("expected a {UNCOMPRESSED_POINT_LEN}-byte uncompressed P-256 point, got {len} bytes")]
    NotUncompressedPoint { len: usize },

    #[error("failed to encode public key: {0}")]
    Encode(#[from] p256::pkcs8::der::Error),
}

/// Decodes base64 as clients actually send it.
///
/// Accepts both the URL-safe and standard alphabets, with or without padding.
pub fn decode_wire_base64(value: &str) -> Result<Vec<u8>, KeyCodecError> {
    let normalized: String = value
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    Ok(URL_SAFE_NO_PAD.decode(normalized)?)
}

/// Wraps an uncompressed P-256 point as an id-ecPublicKey/secp256r1 SubjectPublicKeyInfo.
///
/// Only the length and leading tag of the point are checked. Whether it lies
/// on the curve is left to the signature library.
fn subject_public_key_info(raw_point: &[u8]) -> Result<EcPublicKeyInfo<'_>, KeyCodecError> {
    if raw_point.len() != UNCOMPRESSED_POINT_LEN || raw_point[0] != UNCOMPRESSED_POINT_TAG {
        return Err(KeyCodecError::NotUncompressedPoint {
            len: raw_point.len(),
        });
    }

    Ok(SubjectPublicKeyInfo {
        algorithm: AlgorithmIdentifier {
            oid: ALGORITHM_OID,
            parameters: Some(NistP256::OID),
        },
        subject_public_key: BitStringRef::from_bytes(raw_point)?,
    })
}

/// DER-encoded SubjectPublicKeyInfo for an uncompressed P-256 point.
pub fn public_key_der(raw_point: &[u8]) -> Result<Vec<u8>, KeyCodecError> {
    Ok(subject_public_key_info(raw_point)?.to_der()?)
}

/// The SubjectPublicKeyInfo of [`public_key_der`] as a `PUBLIC KEY` PEM block.
pub fn public_key_pem(raw_point: &[u8]) -> Result<String, KeyCodecError> {
    Ok(subject_public_key_info(raw_point)?.to_pem(LineEnding::LF)?)
}
