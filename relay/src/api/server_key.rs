use crate::api::utils::FormFields;
use crate::errors::{RelayError, Result};
use crate::key_codec::decode_wire_base64;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Response, StatusCode};
use hyper::body::Bytes;
use registry::ServerKeyRegistry;
use shared::http::make_text_response;

/// `POST /webpushserverkey`: registers the VAPID public key a client signs callbacks with.
///
/// Unauthenticated; the registry is last-write-wins.
pub struct ServerKeyHandler {
    registry: ServerKeyRegistry,
}

impl ServerKeyHandler {
    pub fn new(registry: ServerKeyRegistry) -> Self {
        Self { registry }
    }

    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<Response<Bytes>> {
        let form = FormFields::parse(headers.get(CONTENT_TYPE), body).await?;
        let client_id = form.required("client_id")?;
        let server_key = form.required("server_key")?;

        let public_key =
            decode_wire_base64(server_key).map_err(|e| RelayError::InvalidField {
                field: "server_key",
                reason: e.to_string(),
            })?;

        self.registry.upsert(client_id, &public_key).await?;
        Ok(make_text_response(StatusCode::OK, "ok"))
    }
}
