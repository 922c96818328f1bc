use crate::http::{into_boxed, make_error_response, make_text_response};
use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// Answers whether the service can take traffic, e.g. whether its store is reachable.
#[async_trait]
pub trait ReadinessProbe: Send + Sync + 'static {
    async fn is_ready(&self) -> bool;
}

/// Serves `/health` (always ok) and `/ready` (backed by a [`ReadinessProbe`])
/// on the admin listener.
pub struct AdminService<P, E> {
    probe: Arc<P>,
    _error: PhantomData<fn() -> E>,
}

impl<P, E> AdminService<P, E>
where
    P: ReadinessProbe,
{
    pub fn new(probe: Arc<P>) -> Self {
        Self {
            probe,
            _error: PhantomData,
        }
    }
}

async fn respond<P: ReadinessProbe>(probe: &P, method: &Method, path: &str) -> Response<Bytes> {
    if method != Method::GET {
        return make_error_response(StatusCode::NOT_FOUND);
    }

    match path {
        "/health" => make_text_response(StatusCode::OK, "ok"),
        "/ready" => match probe.is_ready().await {
            true => make_text_response(StatusCode::OK, "ok"),
            false => make_error_response(StatusCode::SERVICE_UNAVAILABLE),
        },
        _ => make_error_response(StatusCode::NOT_FOUND),
    }
}

impl<P, E, B> Service<Request<B>> for AdminService<P, E>
where
    P: ReadinessProbe,
    E: Send + 'static,
{
    type Response = Response<BoxBody<Bytes, E>>;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let probe = self.probe.clone();
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        Box::pin(async move {
            let res = respond(probe.as_ref(), &method, &path).await;
            Ok(into_boxed(res))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(bool);

    #[async_trait]
    impl ReadinessProbe for FixedProbe {
        async fn is_ready(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn test_health_ignores_readiness() {
        let res = respond(&FixedProbe(false), &Method::GET, "/health").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"ok\n");
    }

    #[tokio::test]
    async fn test_ready_follows_probe() {
        let res = respond(&FixedProbe(true), &Method::GET, "/ready").await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = respond(&FixedProbe(false), &Method::GET, "/ready").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let res = respond(&FixedProbe(true), &Method::GET, "/metrics").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = respond(&FixedProbe(true), &Method::POST, "/health").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_service_call() {
        let service: AdminService<FixedProbe, std::io::Error> =
            AdminService::new(Arc::new(FixedProbe(true)));
        let req = Request::builder().uri("/ready").body(()).unwrap();
        let res = service.call(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
