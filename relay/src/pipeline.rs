use crate::api::callback::{CallbackHandler, CallbackTarget};
use crate::api::server_key::ServerKeyHandler;
use crate::api::token_check::TokenCheckHandler;
use crate::api::utils::read_body;
use crate::config::{AuthMode, Limits};
use crate::delivery::PushGateway;
use crate::errors::{RelayError, Result};
use crate::metrics_defs::REQUEST_DURATION;
use http::{Method, Request, Response, StatusCode};
use hyper::body::{Body, Bytes};
use registry::{ServerKeyRegistry, TokenRegistry};
use shared::http::{make_error_response, make_text_response};
use shared::routing::{Route, RouteActions};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    TokenCheck,
    ServerKey,
    Callback,
}

/// A resolved route together with anything decoded from its path.
enum Dispatch {
    TokenCheck,
    ServerKey,
    Callback(CallbackTarget),
}

impl Dispatch {
    fn name(&self) -> &'static str {
        match self {
            Dispatch::TokenCheck => "token_check",
            Dispatch::ServerKey => "server_key",
            Dispatch::Callback(_) => "callback",
        }
    }
}

/// Routes requests to their handlers and turns every result into a response.
pub struct RelayPipeline {
    routes: RouteActions<Endpoint>,
    limits: Limits,
    token_check: TokenCheckHandler,
    server_key: ServerKeyHandler,
    callback: CallbackHandler,
}

impl RelayPipeline {
    pub fn new(
        auth_mode: AuthMode,
        limits: Limits,
        tokens: TokenRegistry,
        server_keys: ServerKeyRegistry,
        gateway: Arc<dyn PushGateway>,
    ) -> Self {
        let routes = RouteActions::new(vec![
            Route::new(Some(Method::POST), "/webpushtokencheck", Endpoint::TokenCheck),
            Route::new(Some(Method::POST), "/webpushserverkey", Endpoint::ServerKey),
            Route::new(
                Some(Method::POST),
                "/webpushcallback/{device_id}/{acct}",
                Endpoint::Callback,
            ),
            // `flags` is accepted for compatibility and not interpreted.
            Route::new(
                Some(Method::POST),
                "/webpushcallback/{device_id}/{acct}/{flags}",
                Endpoint::Callback,
            ),
            Route::new(
                Some(Method::POST),
                "/webpushcallback/{device_id}/{acct}/{flags}/{client_id}",
                Endpoint::Callback,
            ),
        ]);

        Self {
            routes,
            limits,
            token_check: TokenCheckHandler::new(tokens),
            server_key: ServerKeyHandler::new(server_keys.clone()),
            callback: CallbackHandler::new(server_keys, gateway, auth_mode),
        }
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response<Bytes>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (handler, result) = match self.resolve(&request) {
            Ok(dispatch) => (dispatch.name(), self.execute(dispatch, request).await),
            Err(error) => ("none", Err(error)),
        };

        let response = match result {
            Ok(response) => response,
            Err(error) => error_response(&error),
        };

        let status = response.status();
        let elapsed = started.elapsed();
        tracing::info!(
            %method,
            %path,
            handler,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "request"
        );
        shared::histogram!(
            REQUEST_DURATION,
            "handler" => handler,
            "status" => status.as_str().to_owned()
        )
        .record(elapsed.as_secs_f64());

        response
    }

    fn resolve<B>(&self, request: &Request<B>) -> Result<Dispatch> {
        let route = self
            .routes
            .resolve(request)
            .ok_or(RelayError::NoRouteMatched)?;

        Ok(match route.action {
            Endpoint::TokenCheck => Dispatch::TokenCheck,
            Endpoint::ServerKey => Dispatch::ServerKey,
            Endpoint::Callback => Dispatch::Callback(CallbackTarget::from_route(&route)?),
        })
    }

    async fn execute<B>(&self, dispatch: Dispatch, request: Request<B>) -> Result<Response<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        match dispatch {
            Dispatch::TokenCheck => {
                let body = read_body(body, self.limits.form_body_bytes).await?;
                self.token_check.handle(&parts.headers, &body).await
            }
            Dispatch::ServerKey => {
                let body = read_body(body, self.limits.form_body_bytes).await?;
                self.server_key.handle(&parts.headers, &body).await
            }
            Dispatch::Callback(target) => {
                let body = read_body(body, self.limits.callback_body_bytes).await?;
                self.callback.handle(target, &parts.headers, body).await
            }
        }
    }
}

/// Client errors carry their message; server errors only the canonical reason.
fn error_response(error: &RelayError) -> Response<Bytes> {
    let status = error.status();

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %error, "request failed");
    } else {
        tracing::debug!(error = %error, status = status.as_u16(), "request refused");
    }

    if status.is_server_error() {
        make_error_response(status)
    } else {
        make_text_response(status, error.to_string())
    }
}
