//! Key material for application servers that sign callbacks.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};

const AUTH_SECRET_LEN: usize = 16;

/// A fresh P-256 key pair and auth secret, each base64url-encoded without padding.
pub struct GeneratedKeys {
    /// Uncompressed point; this is what gets registered as `server_key`.
    pub public_key: String,
    pub private_key: String,
    pub auth_secret: String,
}

pub fn generate() -> GeneratedKeys {
    let signing_key = SigningKey::random(&mut OsRng);
    let public_point = signing_key.verifying_key().to_encoded_point(false);

    let mut auth_secret = [0u8; AUTH_SECRET_LEN];
    OsRng.fill_bytes(&mut auth_secret);

    GeneratedKeys {
        public_key: URL_SAFE_NO_PAD.encode(public_point.as_bytes()),
        private_key: URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
        auth_secret: URL_SAFE_NO_PAD.encode(auth_secret),
    }
}
