use crate::api::utils::FormFields;
use crate::errors::{RelayError, Result};
use crate::metrics_defs::TOKEN_CHECK;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Response, StatusCode};
use hyper::body::Bytes;
use registry::{TokenCheck, TokenRegistry};
use shared::http::make_text_response;

/// `POST /webpushtokencheck`: binds a token digest to the installation presenting it.
pub struct TokenCheckHandler {
    registry: TokenRegistry,
}

impl TokenCheckHandler {
    pub fn new(registry: TokenRegistry) -> Self {
        Self { registry }
    }

    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Result<Response<Bytes>> {
        let form = FormFields::parse(headers.get(CONTENT_TYPE), body).await?;
        let token_digest = form.required("token_digest")?;
        let install_id = form.required("install_id")?;

        let result = self
            .registry
            .check_or_register(token_digest, install_id)
            .await?;
        shared::counter!(TOKEN_CHECK, "result" => result.as_str()).increment(1);

        match result {
            TokenCheck::Registered | TokenCheck::Refreshed => {
                Ok(make_text_response(StatusCode::OK, "ok"))
            }
            TokenCheck::IdentityMismatch { .. } => Err(RelayError::IdentityMismatch),
        }
    }
}
