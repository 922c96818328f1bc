//! Delivery of notifications through the FCM legacy HTTP API.

use crate::config::UpstreamConfig;
use crate::errors::RelayError;
use crate::metrics_defs::{DELIVERY_DURATION, DELIVERY_OUTCOME};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::StatusCode;
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use url::Url;

const NOT_REGISTERED: &str = "NotRegistered";

/// A push message addressed to one device.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Account identifier passed through to the device.
    pub acct: String,
    /// Raw callback body; may be empty.
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The device token is no longer valid. FCM may name a replacement token.
    Unregistered { canonical_id: Option<String> },
    /// FCM answered with an error code other than `NotRegistered`.
    UpstreamError(String),
    /// No usable answer from FCM: connection failure, timeout or unparseable response.
    TransportFailure(String),
}

impl DeliveryOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            DeliveryOutcome::Delivered => StatusCode::CREATED,
            DeliveryOutcome::Unregistered { .. } => StatusCode::GONE,
            DeliveryOutcome::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            DeliveryOutcome::TransportFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Unregistered { .. } => "unregistered",
            DeliveryOutcome::UpstreamError(_) => "upstream_error",
            DeliveryOutcome::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Sends notifications to a push service.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Never fails: every failure mode is expressed as a [`DeliveryOutcome`].
    async fn deliver(&self, device_id: &str, notification: &Notification) -> DeliveryOutcome;
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    to: &'a str,
    priority: &'static str,
    data: FcmData<'a>,
}

#[derive(Debug, Serialize)]
struct FcmData<'a> {
    acct: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<String>,
}

impl<'a> FcmMessage<'a> {
    fn new(device_id: &'a str, notification: &'a Notification) -> Self {
        let payload = (!notification.body.is_empty())
            .then(|| URL_SAFE_NO_PAD.encode(&notification.body));

        Self {
            to: device_id,
            priority: "high",
            data: FcmData {
                acct: &notification.acct,
                payload,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    failure: u64,
    canonical_ids: u64,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Debug, Deserialize)]
struct FcmResult {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    registration_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn classify(response: FcmResponse) -> DeliveryOutcome {
    if response.failure == 0 && response.canonical_ids == 0 {
        return DeliveryOutcome::Delivered;
    }

    let mut results = response.results;
    if results.len() != 1 {
        return DeliveryOutcome::UpstreamError(format!(
            "unexpected result count {}",
            results.len()
        ));
    }

    match results.remove(0) {
        FcmResult {
            message_id: Some(_),
            registration_id: Some(canonical_id),
            ..
        } => DeliveryOutcome::Unregistered {
            canonical_id: Some(canonical_id),
        },
        FcmResult {
            error: Some(error), ..
        } if error == NOT_REGISTERED => DeliveryOutcome::Unregistered { canonical_id: None },
        FcmResult {
            error: Some(error), ..
        } => DeliveryOutcome::UpstreamError(error),
        FcmResult { .. } => DeliveryOutcome::UpstreamError("missing error code".to_string()),
    }
}

pub struct FcmGateway {
    client: reqwest::Client,
    url: Url,
    authorization: String,
}

impl FcmGateway {
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url()?,
            authorization: format!("key={}", config.server_key()?),
        })
    }

    async fn send(&self, message: &FcmMessage<'_>) -> DeliveryOutcome {
        let response = match self
            .client
            .post(self.url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .json(message)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return DeliveryOutcome::TransportFailure(format!("upstream timed out: {e}"));
            }
            Err(e) => {
                return DeliveryOutcome::TransportFailure(format!("upstream request failed: {e}"));
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return DeliveryOutcome::TransportFailure(format!(
                    "failed to read upstream response: {e}"
                ));
            }
        };

        match serde_json::from_slice::<FcmResponse>(&body) {
            Ok(parsed) => {
                if !status.is_success() {
                    tracing::warn!(%status, "upstream answered with an error status");
                }
                classify(parsed)
            }
            Err(e) if status.is_success() => {
                DeliveryOutcome::TransportFailure(format!("malformed upstream response: {e}"))
            }
            Err(_) => DeliveryOutcome::TransportFailure(format!("upstream returned {status}")),
        }
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn deliver(&self, device_id: &str, notification: &Notification) -> DeliveryOutcome {
        let message = FcmMessage::new(device_id, notification);

        let started = Instant::now();
        let outcome = self.send(&message).await;
        let elapsed = started.elapsed();

        shared::histogram!(DELIVERY_DURATION, "outcome" => outcome.as_str())
            .record(elapsed.as_secs_f64());
        shared::counter!(DELIVERY_OUTCOME, "outcome" => outcome.as_str()).increment(1);

        match &outcome {
            DeliveryOutcome::Delivered => {
                tracing::info!(device_id, acct = %notification.acct, ?elapsed, "delivered");
            }
            DeliveryOutcome::Unregistered { canonical_id } => {
                tracing::info!(device_id, ?canonical_id, "device no longer registered upstream");
            }
            DeliveryOutcome::UpstreamError(code) => {
                tracing::error!(device_id, error = %code, "upstream rejected notification");
            }
            DeliveryOutcome::TransportFailure(reason) => {
                tracing::warn!(device_id, %reason, ?elapsed, "upstream unavailable");
            }
        }

        outcome
    }
}
