//! `POST /webpushcallback/{device_id}/{acct}[/{flags}[/{client_id}]]`
//!
//! Authenticates the push-sending server when a key is registered for the
//! client named in the path, then forwards the body to the device.

use crate::config::AuthMode;
use crate::delivery::{Notification, PushGateway};
use crate::errors::{RelayError, Result};
use crate::metrics_defs::VAPID_REJECTED;
use crate::vapid::{Rejection, VapidHeader, VapidVerifier};
use http::header::{AUTHORIZATION, HeaderName};
use http::{HeaderMap, Response};
use hyper::body::Bytes;
use registry::ServerKeyRegistry;
use shared::http::make_error_response;
use shared::routing::RouteMatch;
use std::sync::Arc;

const CRYPTO_KEY: HeaderName = HeaderName::from_static("crypto-key");

/// Addressing decoded from the callback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub device_id: String,
    pub acct: String,
    pub client_id: Option<String>,
}

impl CallbackTarget {
    pub fn from_route<A>(route: &RouteMatch<'_, A>) -> Result<Self> {
        let device_id = route.param("device_id")?.unwrap_or_default();
        let acct = route.param("acct")?.unwrap_or_default();
        if device_id.is_empty() || acct.is_empty() {
            return Err(RelayError::NoRouteMatched);
        }

        let client_id = route.param("client_id")?.filter(|id| !id.is_empty());

        Ok(Self {
            device_id,
            acct,
            client_id,
        })
    }
}

pub struct CallbackHandler {
    server_keys: ServerKeyRegistry,
    verifier: VapidVerifier,
    gateway: Arc<dyn PushGateway>,
    auth_mode: AuthMode,
}

impl CallbackHandler {
    pub fn new(
        server_keys: ServerKeyRegistry,
        gateway: Arc<dyn PushGateway>,
        auth_mode: AuthMode,
    ) -> Self {
        Self {
            server_keys,
            verifier: VapidVerifier::new(),
            gateway,
            auth_mode,
        }
    }

    pub async fn handle(
        &self,
        target: CallbackTarget,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response<Bytes>> {
        tracing::debug!(
            device_id = %target.device_id,
            acct = %target.acct,
            client_id = ?target.client_id,
            body_len = body.len(),
            "callback received"
        );

        if let Err(error) = self.authenticate(target.client_id.as_deref(), headers).await {
            if let RelayError::Rejected(rejection) = &error {
                shared::counter!(VAPID_REJECTED, "reason" => rejection.as_str()).increment(1);
                tracing::warn!(client_id = ?target.client_id, reason = %rejection, "callback rejected");
            }
            return Err(error);
        }

        let notification = Notification {
            acct: target.acct,
            body,
        };
        let outcome = self.gateway.deliver(&target.device_id, &notification).await;
        Ok(make_error_response(outcome.status()))
    }

    async fn authenticate(&self, client_id: Option<&str>, headers: &HeaderMap) -> Result<()> {
        let registered = match client_id {
            Some(client_id) => self.server_keys.lookup(client_id).await?,
            None => None,
        };

        let Some(record) = registered else {
            return match self.auth_mode {
                AuthMode::Optional => {
                    tracing::info!(
                        ?client_id,
                        "no server key registered, delivering unauthenticated"
                    );
                    Ok(())
                }
                AuthMode::Required => Err(Rejection::UnregisteredClient.into()),
            };
        };

        let authorization = header_str(headers, &AUTHORIZATION, VapidHeader::Authorization)?;
        let crypto_key = header_str(headers, &CRYPTO_KEY, VapidHeader::CryptoKey)?;

        let claims = self
            .verifier
            .verify(authorization, crypto_key, &record.public_key)?;
        tracing::debug!(client_id = %record.client_id, sub = ?claims.sub, "callback authenticated");
        Ok(())
    }
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
    which: VapidHeader,
) -> std::result::Result<Option<&'a str>, Rejection> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| Rejection::MalformedHeader(which))
        })
        .transpose()
}
