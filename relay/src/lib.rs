//! WebPush relay: registers devices and application server keys, and
//! forwards authenticated callbacks to the device through FCM.

pub mod api;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod key_codec;
pub mod metrics_defs;
pub mod pipeline;
pub mod vapid;

#[cfg(test)]
mod testutils;

use crate::delivery::FcmGateway;
use crate::errors::RelayError;
use crate::pipeline::RelayPipeline;
use async_trait::async_trait;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use registry::{ServerKeyRegistry, SqliteStore, TokenRegistry};
use shared::admin_service::{AdminService, ReadinessProbe};
use shared::http::{into_boxed, run_http_service};
use std::pin::Pin;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<(), RelayError> {
    config.validate()?;

    let store = Arc::new(SqliteStore::connect(&config.database).await?);
    let gateway = FcmGateway::new(&config.upstream)?;

    let pipeline = RelayPipeline::new(
        config.auth_mode,
        config.limits.clone(),
        TokenRegistry::new(store.clone()),
        ServerKeyRegistry::new(store.clone()),
        Arc::new(gateway),
    );
    tracing::info!(auth_mode = ?config.auth_mode, "relay configured");

    let relay_service = RelayService {
        pipeline: Arc::new(pipeline),
    };
    let relay_task = run_http_service(&config.listener.host, config.listener.port, relay_service);

    let admin_service = AdminService::<_, RelayError>::new(Arc::new(StoreProbe { store }));
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}

struct RelayService {
    pipeline: Arc<RelayPipeline>,
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<BoxBody<Bytes, Self::Error>>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        Box::pin(async move { Ok(into_boxed(pipeline.handle(req).await)) })
    }
}

/// Ready while the database answers.
struct StoreProbe {
    store: Arc<SqliteStore>,
}

#[async_trait]
impl ReadinessProbe for StoreProbe {
    async fn is_ready(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "database not ready");
                false
            }
        }
    }
}
